//! Memory-mapped I/O devices.
//!
//! The CPU forwards every access inside `IO_START..=IO_END` to an
//! [`IoDevice`], passing the offset relative to the window start. Devices are
//! borrowed for the duration of a single `run` call, so the host keeps
//! ownership and can inspect or update them between ticks.

use crate::warn;

/// Receiver of memory-mapped I/O accesses.
///
/// Implementations must not block; both calls happen inline with
/// instruction execution.
pub trait IoDevice {
    /// Value read at `offset` into the I/O window.
    fn io_get(&mut self, offset: u16) -> u8;
    /// Write of `value` at `offset` into the I/O window.
    fn io_set(&mut self, offset: u16, value: u8);
}

/// Device with nothing mapped: reads yield 0, writes are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullIo;

impl IoDevice for NullIo {
    fn io_get(&mut self, _offset: u16) -> u8 {
        0
    }

    fn io_set(&mut self, _offset: u16, _value: u8) {}
}

pub const SCREEN_WIDTH: usize = 16;
pub const SCREEN_HEIGHT: usize = 16;
/// Offset of the first button register, directly after the framebuffer.
pub const BUTTONS_OFFSET: u16 = (SCREEN_WIDTH * SCREEN_HEIGHT) as u16;

/// Direction buttons, in register order after the framebuffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Button {
    Left = 0,
    Right = 1,
    Up = 2,
    Down = 3,
}

impl Button {
    pub const ALL: [Button; 4] = [Button::Left, Button::Right, Button::Up, Button::Down];

    pub fn parse(name: &str) -> Option<Button> {
        match name {
            "left" => Some(Button::Left),
            "right" => Some(Button::Right),
            "up" => Some(Button::Up),
            "down" => Some(Button::Down),
            _ => None,
        }
    }

    /// I/O offset of this button's register.
    pub const fn offset(&self) -> u16 {
        BUTTONS_OFFSET + *self as u16
    }
}

/// Headless 16x16 screen with four direction buttons.
///
/// Layout of the I/O window:
/// - `0..256`: framebuffer, `offset = y * 16 + x`, write-only
/// - `256..=259`: left, right, up, down buttons, read as 0 or 1
///
/// Pixel values index a small palette (0 black, 1 red, 2 green, 3 blue,
/// 4 aqua); anything else renders as unknown.
#[derive(Clone, Debug)]
pub struct Screen {
    pixels: [u8; SCREEN_WIDTH * SCREEN_HEIGHT],
    buttons: [bool; 4],
    dirty: bool,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    pub fn new() -> Self {
        Self {
            pixels: [0; SCREEN_WIDTH * SCREEN_HEIGHT],
            buttons: [false; 4],
            dirty: false,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * SCREEN_WIDTH + x]
    }

    pub fn framebuffer(&self) -> &[u8] {
        &self.pixels
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.buttons[button as usize] = pressed;
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button as usize]
    }

    /// Returns whether any pixel changed since the last call, and clears the mark.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Renders the framebuffer as text, one row per line.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((SCREEN_WIDTH + 1) * SCREEN_HEIGHT);
        for row in self.pixels.chunks(SCREEN_WIDTH) {
            out.extend(row.iter().map(|&value| palette_char(value)));
            out.push('\n');
        }
        out
    }
}

fn palette_char(value: u8) -> char {
    match value {
        0 => '.',
        1 => 'R',
        2 => 'G',
        3 => 'B',
        4 => 'A',
        _ => '?',
    }
}

impl IoDevice for Screen {
    fn io_get(&mut self, offset: u16) -> u8 {
        if (offset as usize) < self.pixels.len() {
            warn!("read from video memory at offset {offset:#05x}");
            return 0;
        }
        match Button::ALL.iter().find(|b| b.offset() == offset) {
            Some(button) => self.is_pressed(*button) as u8,
            None => {
                warn!("read from unmapped I/O offset {offset:#05x}");
                0
            }
        }
    }

    fn io_set(&mut self, offset: u16, value: u8) {
        match self.pixels.get_mut(offset as usize) {
            Some(pixel) => {
                *pixel = value;
                self.dirty = true;
            }
            None => warn!("write of {value} to unmapped I/O offset {offset:#05x}"),
        }
    }
}
