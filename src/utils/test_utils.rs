//! Test utilities shared by the toolchain tests.

#[cfg(test)]
pub mod utils {
    use crate::toolchain::assembler::{DEFAULT_MOUNT_ADDRESS, assemble};
    use crate::toolchain::cpu::Cpu;
    use crate::toolchain::io::IoDevice;

    /// I/O device that logs every access.
    ///
    /// Reads answer `offset ^ 0x5a` so tests can tell which offset was hit.
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub reads: Vec<u16>,
        pub writes: Vec<(u16, u8)>,
    }

    impl IoDevice for Recorder {
        fn io_get(&mut self, offset: u16) -> u8 {
            self.reads.push(offset);
            offset as u8 ^ 0x5a
        }

        fn io_set(&mut self, offset: u16, value: u8) {
            self.writes.push((offset, value));
        }
    }

    /// Assembles `source` at the default mount address and loads it into a
    /// fresh CPU.
    pub fn load_cpu(source: &str) -> Cpu {
        let bytes = assemble(source, DEFAULT_MOUNT_ADDRESS).expect("assembly failed");
        let mut cpu = Cpu::new();
        cpu.load_program(DEFAULT_MOUNT_ADDRESS, &bytes)
            .expect("load failed");
        cpu
    }
}
