//! CPU benchmark binary.
//!
//! Measures assembly and execution time for representative programs.
//! Run with: `cargo run --release --bin bench`

use std::time::{Duration, Instant};

use minicpu::toolchain::assembler::{DEFAULT_MOUNT_ADDRESS, assemble};
use minicpu::toolchain::cpu::{Cpu, Exit};
use minicpu::toolchain::io::{IoDevice, NullIo, Screen};

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Instructions executed by the last run (None to omit ns/instr).
    cycles: Option<u64>,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let ns_per_instr = self
            .cycles
            .filter(|&n| n > 0)
            .map(|n| format!("{:>8.1}", ns_per_op as f64 / n as f64))
            .unwrap_or_else(|| "       -".to_string());
        let cycles = self
            .cycles
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>12} cycles  {} ns/instr",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            cycles,
            ns_per_instr,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
///
/// `f` returns the number of instructions it executed, or `None` when the
/// measured work is not execution.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> Option<u64>,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_cycles = None;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_cycles = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        cycles: last_cycles,
    }
}

/// Loads `source` once; each call to the returned closure runs it to `hlt`.
///
/// Halting sends the CPU back to the entry point, so every run repeats the
/// same program. Register state carries over, so programs set up their own.
fn looped<D: IoDevice>(source: &str, mut io: D) -> impl FnMut() -> Option<u64> {
    let bytes = assemble(source, DEFAULT_MOUNT_ADDRESS).expect("asm");
    let mut cpu = Cpu::new();
    cpu.load_program(DEFAULT_MOUNT_ADDRESS, &bytes)
        .expect("load");
    move || {
        let before = cpu.cycles();
        let exit = cpu.run(&mut io, None).expect("run");
        assert_eq!(exit, Exit::Halted);
        Some(cpu.cycles() - before)
    }
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

const TIGHT_LOOP_ASM: &str = r#"
    num c 200
    .outer
        num d 250
        .inner
            inc a
            dec d
            jnz %inner
        dec c
        jnz %outer
    hlt
"#;

const ARITHMETIC_MIX_ASM: &str = r#"
    num c 250
    num a 1
    num b 2
    num d 3
    .loop
        add a b
        mul a d
        sub a b
        shl b d
        shr a d
        mov b a
        inc b
        dec c
        jnz %loop
    hlt
"#;

const CALL_OVERHEAD_ASM: &str = r#"
    num d 40
    .outer
        num c 250
        .inner
            clc %noop
            dec c
            jnz %inner
        dec d
        jnz %outer
    hlt

.noop
    ret
"#;

const MEMORY_ASM: &str = r#"
    num d 40
    .pass
        num a 0
        num b 0x20
        .cell
            mov m a
            ser a b
            ger a b
            inc a
            jnz %cell
        dec d
        jnz %pass
    hlt
"#;

const TREASURE_ASM: &str = include_str!("../../demos/treasure.asm");

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let min = Duration::from_secs(2);

    println!("CPU Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>12}        {:>10}",
        "benchmark", "iters", "avg time", "cycles/run", "ns/instr"
    );
    println!("  {}", "-".repeat(88));

    // 1. Assembler throughput
    bench("assemble(treasure)", min, || {
        let bytes = assemble(TREASURE_ASM, DEFAULT_MOUNT_ADDRESS).expect("asm");
        std::hint::black_box(bytes);
        None
    })
    .print();

    // 2. Tight loop (50K iterations)
    bench("tight_loop(50K)", min, looped(TIGHT_LOOP_ASM, NullIo)).print();

    // 3. Arithmetic mix (250 iterations)
    bench("arithmetic_mix(250)", min, looped(ARITHMETIC_MIX_ASM, NullIo)).print();

    // 4. Call overhead (10K calls)
    bench("call_overhead(10K)", min, looped(CALL_OVERHEAD_ASM, NullIo)).print();

    // 5. Memory load/store (10K cells)
    bench("mem_load_store(10K)", min, looped(MEMORY_ASM, NullIo)).print();

    // 6. One frame of the treasure demo against the screen
    bench("treasure_frame", min, looped(TREASURE_ASM, Screen::new())).print();

    println!();
}
