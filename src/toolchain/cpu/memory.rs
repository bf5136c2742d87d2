use crate::toolchain::errors::CpuError;
use crate::toolchain::io::IoDevice;
use std::ops::{Index, IndexMut};

/// Size of the flat address space.
pub const MEMORY_SIZE: usize = 0x1_0000;
/// First address of the memory-mapped I/O window.
pub const IO_START: u16 = 0xe000;
/// Last address of the memory-mapped I/O window (inclusive).
pub const IO_END: u16 = 0xefff;
/// Initial stack pointer; the stack grows upward from here.
pub const STACK_START: u16 = 0xf000;
/// Little-endian entry point lives at this address and the next.
pub const ENTRY_POINT_ADDR: u16 = 0x0000;

/// 64 KiB address space.
///
/// Plain indexing reaches RAM only. [`Memory::load`] and [`Memory::store`]
/// route addresses in `IO_START..=IO_END` to the I/O device with the offset
/// relative to `IO_START`.
pub(super) struct Memory {
    ram: Box<[u8]>,
}

impl Memory {
    pub(super) fn new() -> Self {
        Self {
            ram: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    #[inline]
    pub(super) const fn is_io(addr: u16) -> bool {
        IO_START <= addr && addr <= IO_END
    }

    #[inline]
    pub(super) fn load<D: IoDevice + ?Sized>(&self, io: &mut D, addr: u16) -> u8 {
        if Self::is_io(addr) {
            io.io_get(addr - IO_START)
        } else {
            self.ram[addr as usize]
        }
    }

    #[inline]
    pub(super) fn store<D: IoDevice + ?Sized>(&mut self, io: &mut D, addr: u16, value: u8) {
        if Self::is_io(addr) {
            io.io_set(addr - IO_START, value);
        } else {
            self.ram[addr as usize] = value;
        }
    }

    /// Copies `bytes` into RAM at `start`.
    ///
    /// Fails when the image would run past the last address.
    pub(super) fn write_bytes(&mut self, start: u16, bytes: &[u8]) -> Result<(), CpuError> {
        let begin = start as usize;
        let end = begin + bytes.len();
        let slot = self
            .ram
            .get_mut(begin..end)
            .ok_or(CpuError::AddressOutOfRange {
                ip: 0,
                address: end as i64,
            })?;
        slot.copy_from_slice(bytes);
        Ok(())
    }

    pub(super) fn as_slice(&self) -> &[u8] {
        &self.ram
    }
}

impl Index<u16> for Memory {
    type Output = u8;

    fn index(&self, addr: u16) -> &u8 {
        &self.ram[addr as usize]
    }
}

impl IndexMut<u16> for Memory {
    fn index_mut(&mut self, addr: u16) -> &mut u8 {
        &mut self.ram[addr as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::Recorder;

    #[test]
    fn io_window_bounds() {
        assert!(!Memory::is_io(0xdfff));
        assert!(Memory::is_io(IO_START));
        assert!(Memory::is_io(IO_END));
        assert!(!Memory::is_io(0xf000));
    }

    #[test]
    fn io_window_forwards_relative_offsets() {
        let mut mem = Memory::new();
        let mut io = Recorder::default();
        mem.store(&mut io, 0xe010, 7);
        mem.store(&mut io, 0x1000, 9);
        assert_eq!(io.writes, vec![(0x10, 7)]);
        assert_eq!(mem[0x1000], 9);
        assert_eq!(mem[0xe010], 0);
        assert_eq!(mem.load(&mut io, 0xe003), 0x03 ^ 0x5a);
        assert_eq!(io.reads, vec![0x03]);
    }

    #[test]
    fn write_bytes_rejects_overflowing_image() {
        let mut mem = Memory::new();
        assert!(mem.write_bytes(0xfffe, &[1, 2]).is_ok());
        assert_eq!(mem[0xffff], 2);
        assert_eq!(
            mem.write_bytes(0xfffe, &[1, 2, 3]),
            Err(CpuError::AddressOutOfRange {
                ip: 0,
                address: 0x10001
            })
        );
    }
}
