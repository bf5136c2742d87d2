use crate::toolchain::cpu::memory::STACK_START;
use crate::toolchain::isa::Register;

/// Zero and carry flags, written by `inc dec add sub mul`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Flags {
    pub zero: bool,
    pub carry: bool,
}

/// Register file.
///
/// Holds the five plain 8-bit registers and the 16-bit IP and SP. Indices
/// 5..=8 address the low/high halves of IP and SP directly, so writing
/// `iph` moves the instruction pointer.
#[derive(Clone, Debug)]
pub(super) struct Registers {
    /// a, b, c, d, m
    general: [u8; 5],
    pub(super) ip: u16,
    /// The last fetch read `0xffff`, so IP stands one past the address space.
    pub(super) past_end: bool,
    pub(super) sp: u16,
    pub(super) flags: Flags,
}

impl Registers {
    pub(super) fn new() -> Self {
        Self {
            general: [0; 5],
            ip: 0,
            past_end: false,
            sp: STACK_START,
            flags: Flags::default(),
        }
    }

    /// Moves IP to `target`.
    #[inline]
    pub(super) fn jump(&mut self, target: u16) {
        self.ip = target;
        self.past_end = false;
    }

    /// Reads register `idx`. Indices outside the table read as 0.
    #[inline]
    pub(super) fn get(&self, idx: u8) -> u8 {
        let [ip_lo, ip_hi] = self.ip.to_le_bytes();
        let [sp_lo, sp_hi] = self.sp.to_le_bytes();
        match Register::from_index(idx) {
            Some(Register::Ipl) => ip_lo,
            Some(Register::Iph) => ip_hi,
            Some(Register::Spl) => sp_lo,
            Some(Register::Sph) => sp_hi,
            Some(_) => self.general[idx as usize],
            None => 0,
        }
    }

    /// Writes register `idx`. Writes to indices outside the table are dropped.
    #[inline]
    pub(super) fn set(&mut self, idx: u8, value: u8) {
        match Register::from_index(idx) {
            Some(Register::Ipl) => self.jump((self.ip & 0xff00) | value as u16),
            Some(Register::Iph) => self.jump((self.ip & 0x00ff) | ((value as u16) << 8)),
            Some(Register::Spl) => self.sp = (self.sp & 0xff00) | value as u16,
            Some(Register::Sph) => self.sp = (self.sp & 0x00ff) | ((value as u16) << 8),
            Some(_) => self.general[idx as usize] = value,
            None => {}
        }
    }

    /// Reads a register pair as a little-endian 16-bit value.
    #[inline]
    pub(super) fn pair(&self, lo: u8, hi: u8) -> u16 {
        u16::from_le_bytes([self.get(lo), self.get(hi)])
    }

    /// Writes a 16-bit value across a register pair, low half first.
    #[inline]
    pub(super) fn set_pair(&mut self, lo: u8, hi: u8, value: u16) {
        let [l, h] = value.to_le_bytes();
        self.set(lo, l);
        self.set(hi, h);
    }
}
