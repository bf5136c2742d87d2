//! 8-bit CPU emulator.
//!
//! # Architecture
//!
//! - **Registers**: five 8-bit registers (`a b c d m`) plus the halves of
//!   the 16-bit IP and SP, all addressable by index
//! - **Flags**: `zero` and `carry`, set by `inc dec add sub mul`
//! - **Memory**: flat 64 KiB, with `IO_START..=IO_END` forwarded to an
//!   [`IoDevice`]
//! - **Stack**: starts at `STACK_START` and grows upward
//! - **Execution model**: fetch-decode-execute, optionally bounded by a cycle
//!   budget so a host loop can interleave execution with rendering
//!
//! A stopped CPU (fresh, just loaded, or halted) reseeds IP from the entry
//! point at `ENTRY_POINT_ADDR` on the next [`Cpu::run`] or [`Cpu::step`].
//! A paused CPU resumes exactly where it left off.

mod memory;
mod profile;
mod registers;

pub use memory::{ENTRY_POINT_ADDR, IO_END, IO_START, MEMORY_SIZE, STACK_START};
pub use profile::{CycleCategory, CycleProfile};
pub use registers::Flags;

use crate::toolchain::errors::CpuError;
use crate::toolchain::io::IoDevice;
use crate::toolchain::isa::{Instruction, Register};
use memory::Memory;
use registers::Registers;

/// Why a `run` call returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exit {
    /// A `hlt` executed.
    Halted,
    /// The cycle budget was spent; state is preserved for the next call.
    Paused,
}

macro_rules! exec_cpu {
    // Entry point
    (
        cpu = $cpu:ident,
        io = $io:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => exec_cpu!(@call $cpu, $io, $handler, $args),
            )*
        }
    }};

    // Handler touching memory-mapped I/O (semicolon separator)
    (@call $cpu:ident, $io:ident, $handler:ident,
        (io; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_cpu!(@read $cpu, $io, $kind)?; )*
        $cpu.$handler($io, $( $field ),*)
    }};

    // Register/stack-only handler
    (@call $cpu:ident, $io:ident, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_cpu!(@read $cpu, $io, $kind)?; )*
        $cpu.$handler($( $field ),*)
    }};

    // Register index byte
    (@read $cpu:ident, $io:ident, Reg) => {{
        $cpu.fetch($io)
    }};

    // Immediate byte
    (@read $cpu:ident, $io:ident, Imm) => {{
        $cpu.fetch($io)
    }};
}

/// The emulated machine: registers, flags and 64 KiB of memory.
pub struct Cpu {
    registers: Registers,
    memory: Memory,
    /// IP of the instruction being executed, reported with faults.
    instr_ip: u16,
    /// Set by `hlt`, consumed by `step`.
    halted: bool,
    /// Next `run`/`step` reseeds IP from the entry point.
    stopped: bool,
    profile: CycleProfile,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            memory: Memory::new(),
            instr_ip: 0,
            halted: false,
            stopped: true,
            profile: CycleProfile::new(),
        }
    }

    /// Copies `bytes` into memory at `start` and records `start` as the
    /// entry point.
    ///
    /// The image is written to RAM directly, bypassing the I/O window.
    pub fn load_program(&mut self, start: u16, bytes: &[u8]) -> Result<(), CpuError> {
        self.memory.write_bytes(start, bytes)?;
        let [lo, hi] = start.to_le_bytes();
        self.memory[ENTRY_POINT_ADDR] = lo;
        self.memory[ENTRY_POINT_ADDR + 1] = hi;
        self.stopped = true;
        Ok(())
    }

    /// Executes until `hlt` or until `cycles_limit` instructions have run.
    ///
    /// `None` runs without a budget. A budget of zero returns
    /// [`Exit::Paused`] without executing anything.
    pub fn run<D: IoDevice + ?Sized>(
        &mut self,
        io: &mut D,
        cycles_limit: Option<u64>,
    ) -> Result<Exit, CpuError> {
        if self.stopped {
            self.seed_entry();
        }
        let mut executed = 0u64;
        loop {
            if let Some(limit) = cycles_limit
                && executed >= limit
            {
                return Ok(Exit::Paused);
            }
            executed += 1;
            if self.step(io)? == Exit::Halted {
                return Ok(Exit::Halted);
            }
        }
    }

    /// Executes exactly one instruction.
    ///
    /// Returns [`Exit::Halted`] if it was `hlt`, [`Exit::Paused`] otherwise.
    /// A fault leaves the CPU stopped.
    pub fn step<D: IoDevice + ?Sized>(&mut self, io: &mut D) -> Result<Exit, CpuError> {
        if self.stopped {
            self.seed_entry();
        }
        self.instr_ip = self.registers.ip;
        match self.execute_one(io) {
            Ok(()) if self.halted => {
                self.halted = false;
                self.stopped = true;
                Ok(Exit::Halted)
            }
            Ok(()) => Ok(Exit::Paused),
            Err(err) => {
                self.stopped = true;
                Err(err)
            }
        }
    }

    fn seed_entry(&mut self) {
        self.registers.jump(u16::from_le_bytes([
            self.memory[ENTRY_POINT_ADDR],
            self.memory[ENTRY_POINT_ADDR + 1],
        ]));
        self.stopped = false;
    }

    fn execute_one<D: IoDevice + ?Sized>(&mut self, io: &mut D) -> Result<(), CpuError> {
        let opcode = self.fetch(io)?;
        let instruction = Instruction::try_from(opcode).map_err(|e| e.at(self.instr_ip))?;
        self.profile.add(instruction.category(), 1);
        self.exec(instruction, io)
    }

    /// Reads the byte at IP and advances IP past it.
    ///
    /// Reading `0xffff` itself is valid; the fault comes from the next fetch.
    #[inline]
    fn fetch<D: IoDevice + ?Sized>(&mut self, io: &mut D) -> Result<u8, CpuError> {
        if self.registers.past_end {
            return Err(self.out_of_range(MEMORY_SIZE as i64));
        }
        let ip = self.registers.ip;
        let byte = self.memory.load(io, ip);
        self.registers.ip = ip.wrapping_add(1);
        self.registers.past_end = ip == u16::MAX;
        Ok(byte)
    }

    fn exec<D: IoDevice + ?Sized>(
        &mut self,
        instruction: Instruction,
        io: &mut D,
    ) -> Result<(), CpuError> {
        exec_cpu! {
            cpu = self,
            io = io,
            instr = instruction,
            {
                // Data move
                Num => op_num(reg: Reg, value: Imm),
                Mov => op_mov(dst: Reg, src: Reg),
                // Control flow
                Jmp => op_jmp(lo: Imm, hi: Imm),
                Jin => op_jin(lo: Reg, hi: Reg),
                Jiz => op_jiz(lo: Imm, hi: Imm),
                Jnz => op_jnz(lo: Imm, hi: Imm),
                Jic => op_jic(lo: Imm, hi: Imm),
                Jnc => op_jnc(lo: Imm, hi: Imm),
                Clc => op_clc(lo: Imm, hi: Imm),
                Clr => op_clr(lo: Reg, hi: Reg),
                Ret => op_ret(),
                // Stack frame
                Alc => op_alc(size: Imm),
                Eat => op_eat(size: Imm),
                Ofg => op_ofg(io; reg: Reg, offset: Imm),
                Ofs => op_ofs(io; reg: Reg, offset: Imm),
                Pop => op_pop(reg: Reg),
                Psh => op_psh(reg: Reg),
                // Memory
                Gec => op_gec(io; lo: Imm, hi: Imm),
                Sec => op_sec(io; lo: Imm, hi: Imm),
                Ger => op_ger(io; lo: Reg, hi: Reg),
                Ser => op_ser(io; lo: Reg, hi: Reg),
                // Arithmetic
                Inc => op_inc(reg: Reg),
                Dec => op_dec(reg: Reg),
                Add => op_add(dst: Reg, src: Reg),
                Sub => op_sub(dst: Reg, src: Reg),
                Mul => op_mul(dst: Reg, src: Reg),
                Shl => op_shl(dst: Reg, src: Reg),
                Shr => op_shr(dst: Reg, src: Reg),
                Inl => op_inl(lo: Reg, hi: Reg),
                Del => op_del(lo: Reg, hi: Reg),
                // Halt
                Hlt => op_hlt(),
            }
        }
    }

    fn out_of_range(&self, address: i64) -> CpuError {
        CpuError::AddressOutOfRange {
            ip: self.instr_ip,
            address,
        }
    }

    /// Validates a computed address.
    fn address(&self, address: i64) -> Result<u16, CpuError> {
        u16::try_from(address).map_err(|_| self.out_of_range(address))
    }

    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.registers.sp;
        let next = self.address(sp as i64 + 1)?;
        self.memory[sp] = value;
        self.registers.sp = next;
        Ok(())
    }

    fn pop(&mut self) -> Result<u8, CpuError> {
        let sp = self.address(self.registers.sp as i64 - 1)?;
        self.registers.sp = sp;
        Ok(self.memory[sp])
    }

    /// Pushes the return address (low then high) and jumps.
    fn call(&mut self, target: u16) -> Result<(), CpuError> {
        let [lo, hi] = self.registers.ip.to_le_bytes();
        self.push(lo)?;
        self.push(hi)?;
        self.registers.jump(target);
        Ok(())
    }

    fn jump_if(&mut self, condition: bool, lo: u8, hi: u8) -> Result<(), CpuError> {
        if condition {
            self.registers.jump(u16::from_le_bytes([lo, hi]));
        }
        Ok(())
    }

    /// Stack slot `k` below the top: `SP - k - 1`.
    fn frame_slot(&self, offset: u8) -> Result<u16, CpuError> {
        self.address(self.registers.sp as i64 - offset as i64 - 1)
    }

    fn set_m(&mut self, value: u8) {
        self.registers.set(Register::M.index(), value);
    }

    // ==================== Data move ====================

    fn op_num(&mut self, reg: u8, value: u8) -> Result<(), CpuError> {
        self.registers.set(reg, value);
        Ok(())
    }

    fn op_mov(&mut self, dst: u8, src: u8) -> Result<(), CpuError> {
        let value = self.registers.get(src);
        self.registers.set(dst, value);
        Ok(())
    }

    // ==================== Control flow ====================

    fn op_jmp(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        self.jump_if(true, lo, hi)
    }

    fn op_jin(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        let target = self.registers.pair(lo, hi);
        self.registers.jump(target);
        Ok(())
    }

    fn op_jiz(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        self.jump_if(self.registers.flags.zero, lo, hi)
    }

    fn op_jnz(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        self.jump_if(!self.registers.flags.zero, lo, hi)
    }

    fn op_jic(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        self.jump_if(self.registers.flags.carry, lo, hi)
    }

    fn op_jnc(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        self.jump_if(!self.registers.flags.carry, lo, hi)
    }

    fn op_clc(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        self.call(u16::from_le_bytes([lo, hi]))
    }

    fn op_clr(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        let target = self.registers.pair(lo, hi);
        self.call(target)
    }

    fn op_ret(&mut self) -> Result<(), CpuError> {
        let hi = self.pop()?;
        let lo = self.pop()?;
        self.registers.jump(u16::from_le_bytes([lo, hi]));
        Ok(())
    }

    // ==================== Stack frame ====================

    fn op_alc(&mut self, size: u8) -> Result<(), CpuError> {
        self.registers.sp = self.address(self.registers.sp as i64 + size as i64)?;
        Ok(())
    }

    fn op_eat(&mut self, size: u8) -> Result<(), CpuError> {
        self.registers.sp = self.address(self.registers.sp as i64 - size as i64)?;
        Ok(())
    }

    fn op_ofg<D: IoDevice + ?Sized>(
        &mut self,
        io: &mut D,
        reg: u8,
        offset: u8,
    ) -> Result<(), CpuError> {
        let addr = self.frame_slot(offset)?;
        let value = self.memory.load(io, addr);
        self.registers.set(reg, value);
        Ok(())
    }

    fn op_ofs<D: IoDevice + ?Sized>(
        &mut self,
        io: &mut D,
        reg: u8,
        offset: u8,
    ) -> Result<(), CpuError> {
        let addr = self.frame_slot(offset)?;
        let value = self.registers.get(reg);
        self.memory.store(io, addr, value);
        Ok(())
    }

    fn op_pop(&mut self, reg: u8) -> Result<(), CpuError> {
        let value = self.pop()?;
        self.registers.set(reg, value);
        Ok(())
    }

    fn op_psh(&mut self, reg: u8) -> Result<(), CpuError> {
        self.push(self.registers.get(reg))
    }

    // ==================== Memory ====================

    fn op_gec<D: IoDevice + ?Sized>(&mut self, io: &mut D, lo: u8, hi: u8) -> Result<(), CpuError> {
        let value = self.memory.load(io, u16::from_le_bytes([lo, hi]));
        self.set_m(value);
        Ok(())
    }

    fn op_sec<D: IoDevice + ?Sized>(&mut self, io: &mut D, lo: u8, hi: u8) -> Result<(), CpuError> {
        let value = self.registers.get(Register::M.index());
        self.memory.store(io, u16::from_le_bytes([lo, hi]), value);
        Ok(())
    }

    fn op_ger<D: IoDevice + ?Sized>(&mut self, io: &mut D, lo: u8, hi: u8) -> Result<(), CpuError> {
        let value = self.memory.load(io, self.registers.pair(lo, hi));
        self.set_m(value);
        Ok(())
    }

    fn op_ser<D: IoDevice + ?Sized>(&mut self, io: &mut D, lo: u8, hi: u8) -> Result<(), CpuError> {
        let value = self.registers.get(Register::M.index());
        self.memory.store(io, self.registers.pair(lo, hi), value);
        Ok(())
    }

    // ==================== Arithmetic ====================

    fn op_inc(&mut self, reg: u8) -> Result<(), CpuError> {
        let value = self.registers.get(reg);
        let result = value.wrapping_add(1);
        self.registers.flags.carry = value == u8::MAX;
        self.registers.flags.zero = result == 0;
        self.registers.set(reg, result);
        Ok(())
    }

    fn op_dec(&mut self, reg: u8) -> Result<(), CpuError> {
        let value = self.registers.get(reg);
        let result = value.wrapping_sub(1);
        self.registers.flags.carry = value == 0;
        self.registers.flags.zero = result == 0;
        self.registers.set(reg, result);
        Ok(())
    }

    /// Applies an 8-bit operation, setting carry from the overflow bit and
    /// zero from the wrapped result.
    fn arith(&mut self, dst: u8, src: u8, op: fn(u8, u8) -> (u8, bool)) -> Result<(), CpuError> {
        let (result, carry) = op(self.registers.get(dst), self.registers.get(src));
        self.registers.flags.carry = carry;
        self.registers.flags.zero = result == 0;
        self.registers.set(dst, result);
        Ok(())
    }

    fn op_add(&mut self, dst: u8, src: u8) -> Result<(), CpuError> {
        self.arith(dst, src, u8::overflowing_add)
    }

    fn op_sub(&mut self, dst: u8, src: u8) -> Result<(), CpuError> {
        self.arith(dst, src, u8::overflowing_sub)
    }

    fn op_mul(&mut self, dst: u8, src: u8) -> Result<(), CpuError> {
        self.arith(dst, src, u8::overflowing_mul)
    }

    fn op_shl(&mut self, dst: u8, src: u8) -> Result<(), CpuError> {
        let shift = self.registers.get(src) as u32;
        let value = self.registers.get(dst).checked_shl(shift).unwrap_or(0);
        self.registers.set(dst, value);
        Ok(())
    }

    fn op_shr(&mut self, dst: u8, src: u8) -> Result<(), CpuError> {
        let shift = self.registers.get(src) as u32;
        let value = self.registers.get(dst).checked_shr(shift).unwrap_or(0);
        self.registers.set(dst, value);
        Ok(())
    }

    fn op_inl(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        let value = self.registers.pair(lo, hi).wrapping_add(1);
        self.registers.set_pair(lo, hi, value);
        Ok(())
    }

    fn op_del(&mut self, lo: u8, hi: u8) -> Result<(), CpuError> {
        let value = self.registers.pair(lo, hi).wrapping_sub(1);
        self.registers.set_pair(lo, hi, value);
        Ok(())
    }

    // ==================== Halt ====================

    fn op_hlt(&mut self) -> Result<(), CpuError> {
        self.halted = true;
        Ok(())
    }

    // ==================== Inspection ====================

    /// Current value of a register.
    pub fn register(&self, register: Register) -> u8 {
        self.registers.get(register.index())
    }

    pub fn flags(&self) -> Flags {
        self.registers.flags
    }

    pub fn ip(&self) -> u16 {
        self.registers.ip
    }

    pub fn sp(&self) -> u16 {
        self.registers.sp
    }

    /// Raw RAM byte at `addr`. Does not consult the I/O device.
    pub fn peek(&self, addr: u16) -> u8 {
        self.memory[addr]
    }

    /// The whole address space as backed by RAM.
    pub fn memory(&self) -> &[u8] {
        self.memory.as_slice()
    }

    /// Whether the next `run` starts over from the entry point.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Total instructions executed since creation.
    pub fn cycles(&self) -> u64 {
        self.profile.total()
    }

    pub fn profile(&self) -> &CycleProfile {
        &self.profile
    }
}

#[cfg(test)]
mod tests;
