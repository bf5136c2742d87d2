use super::*;
use crate::toolchain::assembler::{DEFAULT_MOUNT_ADDRESS, assemble_source};
use crate::toolchain::io::{Button, NullIo, Screen};
use crate::utils::test_utils::utils::{Recorder, load_cpu};

const BUDGET: Option<u64> = Some(1_000_000);

const COUNTER: &str = include_str!("../../../demos/counter.asm");
const TREASURE: &str = include_str!("../../../demos/treasure.asm");

fn run_cpu(source: &str) -> Cpu {
    let mut cpu = load_cpu(source);
    let exit = cpu.run(&mut NullIo, BUDGET).expect("cpu run failed");
    assert_eq!(exit, Exit::Halted);
    cpu
}

fn run_and_get(source: &str, reg: Register) -> u8 {
    run_cpu(source).register(reg)
}

fn run_expect_err(source: &str) -> CpuError {
    let mut cpu = load_cpu(source);
    let err = cpu.run(&mut NullIo, BUDGET).expect_err("expected fault");
    assert!(cpu.is_stopped());
    err
}

// ==================== Data move ====================

#[test]
fn num_wraps_literals() {
    assert_eq!(run_and_get("num a 42\nhlt", Register::A), 42);
    assert_eq!(run_and_get("num b 300\nhlt", Register::B), 44);
    assert_eq!(run_and_get("num c -1\nhlt", Register::C), 255);
}

#[test]
fn mov_copies() {
    assert_eq!(run_and_get("num a 7\nmov b a\nhlt", Register::B), 7);
}

#[test]
fn invalid_register_reads_zero_and_drops_writes() {
    let cpu = run_cpu("num a 7\nnum 9 5\nmov a 9\nhlt");
    assert_eq!(cpu.register(Register::A), 0);
    assert!(Register::ALL.iter().take(5).all(|&r| cpu.register(r) == 0));
}

#[test]
fn ip_and_sp_halves_are_registers() {
    let cpu = run_cpu("mov a ipl\nmov b iph\nmov c spl\nmov d sph\nhlt");
    assert_eq!(cpu.register(Register::A), 0x13);
    assert_eq!(cpu.register(Register::B), 0x00);
    assert_eq!(cpu.register(Register::C), 0x00);
    assert_eq!(cpu.register(Register::D), 0xf0);
}

#[test]
fn writing_ipl_jumps() {
    let cpu = run_cpu("num ipl :skip\nnum a 1\n.skip\nnum b 2\nhlt");
    assert_eq!(cpu.register(Register::A), 0);
    assert_eq!(cpu.register(Register::B), 2);
}

// ==================== Arithmetic ====================

#[test]
fn add_sets_carry_and_zero() {
    let cpu = run_cpu("num a 200\nnum b 100\nadd a b\nhlt");
    assert_eq!(cpu.register(Register::A), 44);
    assert_eq!(cpu.flags(), Flags { zero: false, carry: true });

    let cpu = run_cpu("num a 128\nnum b 128\nadd a b\nhlt");
    assert_eq!(cpu.register(Register::A), 0);
    assert_eq!(cpu.flags(), Flags { zero: true, carry: true });

    let cpu = run_cpu("num a 1\nnum b 2\nadd a b\nhlt");
    assert_eq!(cpu.register(Register::A), 3);
    assert_eq!(cpu.flags(), Flags::default());
}

#[test]
fn sub_borrows() {
    let cpu = run_cpu("num a 3\nnum b 5\nsub a b\nhlt");
    assert_eq!(cpu.register(Register::A), 254);
    assert_eq!(cpu.flags(), Flags { zero: false, carry: true });

    let cpu = run_cpu("num a 5\nnum b 5\nsub a b\nhlt");
    assert_eq!(cpu.register(Register::A), 0);
    assert_eq!(cpu.flags(), Flags { zero: true, carry: false });
}

#[test]
fn mul_overflow() {
    let cpu = run_cpu("num a 16\nnum b 16\nmul a b\nhlt");
    assert_eq!(cpu.register(Register::A), 0);
    assert_eq!(cpu.flags(), Flags { zero: true, carry: true });

    assert_eq!(run_and_get("num a 3\nnum b 4\nmul a b\nhlt", Register::A), 12);
}

#[test]
fn inc_and_dec_flags() {
    let cpu = run_cpu("num a 255\ninc a\nhlt");
    assert_eq!(cpu.register(Register::A), 0);
    assert_eq!(cpu.flags(), Flags { zero: true, carry: true });

    let cpu = run_cpu("num a 0\ndec a\nhlt");
    assert_eq!(cpu.register(Register::A), 255);
    assert_eq!(cpu.flags(), Flags { zero: false, carry: true });

    let cpu = run_cpu("num a 1\ndec a\nhlt");
    assert_eq!(cpu.flags(), Flags { zero: true, carry: false });
}

#[test]
fn moves_leave_flags_alone() {
    let cpu = run_cpu("num a 255\ninc a\nnum b 5\nmov c b\npsh c\npop d\nhlt");
    assert_eq!(cpu.flags(), Flags { zero: true, carry: true });
    assert_eq!(cpu.register(Register::D), 5);
}

#[test]
fn shifts() {
    assert_eq!(run_and_get("num a 3\nnum b 2\nshl a b\nhlt", Register::A), 12);
    assert_eq!(run_and_get("num a 0x80\nnum b 7\nshr a b\nhlt", Register::A), 1);
    assert_eq!(run_and_get("num a 0xff\nnum b 8\nshl a b\nhlt", Register::A), 0);
    assert_eq!(run_and_get("num a 0xff\nnum b 200\nshr a b\nhlt", Register::A), 0);
}

#[test]
fn pair_increment_and_decrement_wrap() {
    let cpu = run_cpu("num a 0xff\nnum b 0x12\ninl a b\nhlt");
    assert_eq!(cpu.register(Register::A), 0x00);
    assert_eq!(cpu.register(Register::B), 0x13);

    let cpu = run_cpu("del a b\nhlt");
    assert_eq!(cpu.register(Register::A), 0xff);
    assert_eq!(cpu.register(Register::B), 0xff);
    assert_eq!(cpu.flags(), Flags::default());
}

// ==================== Control flow ====================

#[test]
fn conditional_jumps() {
    let src = "num a 1\ndec a\njiz %yes\nnum b 1\n.yes\njnc %done\nnum c 1\n.done\nhlt";
    let cpu = run_cpu(src);
    assert_eq!(cpu.register(Register::B), 0);
    assert_eq!(cpu.register(Register::C), 0);

    let src = "num a 0\ndec a\njic %yes\nnum b 1\n.yes\njnz %done\nnum c 1\n.done\nhlt";
    let cpu = run_cpu(src);
    assert_eq!(cpu.register(Register::B), 0);
    assert_eq!(cpu.register(Register::C), 0);
}

#[test]
fn jin_jumps_through_registers() {
    let cpu = run_cpu("num a :far\nnum b far:\njin a b\nnum c 1\n.far\nhlt");
    assert_eq!(cpu.register(Register::C), 0);
}

#[test]
fn call_and_return_balance_stack() {
    let cpu = run_cpu("clc %sub\nhlt\n.sub\nnum a 9\nret");
    assert_eq!(cpu.register(Register::A), 9);
    assert_eq!(cpu.sp(), STACK_START);
    // Return address pushed low byte first.
    assert_eq!(cpu.peek(STACK_START), 0x13);
    assert_eq!(cpu.peek(STACK_START + 1), 0x00);
}

#[test]
fn clr_calls_through_registers() {
    let cpu = run_cpu("num c :sub\nnum d sub:\nclr c d\nhlt\n.sub\nnum a 4\nret");
    assert_eq!(cpu.register(Register::A), 4);
    assert_eq!(cpu.sp(), STACK_START);
}

// ==================== Stack frame ====================

#[test]
fn frame_offsets_count_down_from_top() {
    let src = "\
num a 11
num b 22
psh a
psh b
ofg c 0
ofg d 1
num m 99
ofs m 1
pop b
pop a
hlt";
    let cpu = run_cpu(src);
    assert_eq!(cpu.register(Register::C), 22);
    assert_eq!(cpu.register(Register::D), 11);
    assert_eq!(cpu.register(Register::A), 99);
    assert_eq!(cpu.register(Register::B), 22);
    assert_eq!(cpu.sp(), STACK_START);
}

#[test]
fn alc_and_eat_move_sp() {
    assert_eq!(run_cpu("alc 5\nhlt").sp(), STACK_START + 5);
    assert_eq!(run_cpu("alc 5\neat 3\nhlt").sp(), STACK_START + 2);
}

#[test]
fn pop_below_zero_faults() {
    let err = run_expect_err("num spl 0\nnum sph 0\npop a\nhlt");
    assert_eq!(err, CpuError::AddressOutOfRange { ip: 0x16, address: -1 });
}

#[test]
fn alc_past_end_faults() {
    let err = run_expect_err("num sph 0xff\nnum spl 0xff\nalc 1\nhlt");
    assert_eq!(
        err,
        CpuError::AddressOutOfRange {
            ip: 0x16,
            address: 0x10000
        }
    );
}

// ==================== Memory ====================

#[test]
fn constant_and_register_addressing() {
    let cpu = run_cpu("num m 7\nsec 0x00 0x20\nnum a 0x01\nnum b 0x20\nnum m 8\nser a b\ngec 0x00 0x20\nhlt");
    assert_eq!(cpu.peek(0x2000), 7);
    assert_eq!(cpu.peek(0x2001), 8);
    assert_eq!(cpu.register(Register::M), 7);
}

#[test]
fn io_window_reaches_the_screen() {
    let mut cpu = load_cpu("num m 3\nsec 0x25 0xe0\ngec 0x01 0xe1\nmov a m\nhlt");
    let mut screen = Screen::new();
    screen.set_button(Button::Right, true);
    assert_eq!(cpu.run(&mut screen, BUDGET), Ok(Exit::Halted));
    assert_eq!(screen.pixel(5, 2), 3);
    assert_eq!(cpu.register(Register::A), 1);
    assert_eq!(cpu.peek(0xe025), 0);
}

#[test]
fn push_bypasses_io_window() {
    let mut cpu = load_cpu("num a 5\nnum sph 0xe0\npsh a\nofg b 0\nhlt");
    let mut io = Recorder::default();
    assert_eq!(cpu.run(&mut io, BUDGET), Ok(Exit::Halted));
    assert_eq!(cpu.peek(0xe000), 5);
    assert!(io.writes.is_empty());
    // `ofg` reads through the device.
    assert_eq!(io.reads, vec![0x00]);
    assert_eq!(cpu.register(Register::B), 0x5a);
}

// ==================== Faults ====================

#[test]
fn unknown_opcode_faults() {
    let err = run_expect_err("num a 1\ndat 0x42");
    assert_eq!(err, CpuError::InvalidOpcode { ip: 0x13, opcode: 0x42 });
}

#[test]
fn instruction_ending_at_last_address_completes() {
    let mut cpu = Cpu::new();
    cpu.load_program(0xffff, &[0xff]).unwrap();
    assert_eq!(cpu.run(&mut NullIo, BUDGET), Ok(Exit::Halted));

    let mut cpu = Cpu::new();
    cpu.load_program(0xfffd, &[0x00, Register::A.index(), 0x07])
        .unwrap();
    assert_eq!(cpu.step(&mut NullIo), Ok(Exit::Paused));
    assert_eq!(cpu.register(Register::A), 7);
}

#[test]
fn fetch_past_end_faults_on_next_instruction() {
    let mut cpu = Cpu::new();
    cpu.load_program(0xfffd, &[0x00, Register::A.index(), 0x07])
        .unwrap();
    let err = cpu.run(&mut NullIo, BUDGET).unwrap_err();
    assert!(matches!(
        err,
        CpuError::AddressOutOfRange { address, .. } if address == MEMORY_SIZE as i64
    ));
    assert_eq!(cpu.register(Register::A), 7);
    assert!(cpu.is_stopped());
}

#[test]
fn jump_from_last_address_clears_overrun() {
    let mut cpu = Cpu::new();
    cpu.load_program(0x1000, &[0xff]).unwrap();
    cpu.load_program(0xfffd, &[0x02, 0x00, 0x10]).unwrap();
    assert_eq!(cpu.run(&mut NullIo, BUDGET), Ok(Exit::Halted));
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn oversized_image_is_rejected() {
    let mut cpu = Cpu::new();
    assert_eq!(
        cpu.load_program(0xfff0, &[0; 32]),
        Err(CpuError::AddressOutOfRange {
            ip: 0,
            address: 0x10010
        })
    );
}

// ==================== Run loop ====================

#[test]
fn counter_writes_table() {
    let assembly = assemble_source(COUNTER, DEFAULT_MOUNT_ADDRESS).unwrap();
    let table = assembly.lookup("table").unwrap();
    assert_eq!(table, 0x2d);

    let cpu = run_cpu(COUNTER);
    let cells: Vec<_> = (0..10).map(|i| cpu.peek(table + i)).collect();
    assert_eq!(cells, (0..10).collect::<Vec<u8>>());
    assert_eq!(cpu.cycles(), 65);
}

#[test]
fn zero_budget_pauses_immediately() {
    let mut cpu = load_cpu(COUNTER);
    assert_eq!(cpu.run(&mut NullIo, Some(0)), Ok(Exit::Paused));
    assert_eq!(cpu.cycles(), 0);
    assert_eq!(cpu.ip(), DEFAULT_MOUNT_ADDRESS);
}

#[test]
fn budget_resumes_where_it_paused() {
    let mut cpu = load_cpu(COUNTER);
    let mut calls = 0;
    loop {
        calls += 1;
        if cpu.run(&mut NullIo, Some(10)).unwrap() == Exit::Halted {
            break;
        }
    }
    assert_eq!(calls, 7);
    assert_eq!(cpu.cycles(), 65);

    let mut split = load_cpu(COUNTER);
    split.run(&mut NullIo, Some(10)).unwrap();
    split.run(&mut NullIo, Some(10)).unwrap();
    let mut whole = load_cpu(COUNTER);
    whole.run(&mut NullIo, Some(20)).unwrap();
    assert_eq!(split.ip(), whole.ip());
    assert_eq!(split.register(Register::C), 3);
    for reg in Register::ALL {
        assert_eq!(split.register(reg), whole.register(reg));
    }
    assert!(!split.is_stopped());
}

#[test]
fn unit_budget_matches_truncated_run() {
    const PROGRAM: &str = "num a 1\ninc a\ninc a\nmov b a\nhlt";

    let mut cpu = load_cpu(PROGRAM);
    let mut calls = 0u64;
    loop {
        calls += 1;
        let exit = cpu.run(&mut NullIo, Some(1)).unwrap();
        if exit == Exit::Halted {
            break;
        }
        let mut reference = load_cpu(PROGRAM);
        assert_eq!(reference.run(&mut NullIo, Some(calls)), Ok(Exit::Paused));
        for reg in Register::ALL {
            assert_eq!(cpu.register(reg), reference.register(reg), "{reg:?} after {calls}");
        }
        assert_eq!(cpu.ip(), reference.ip());
        assert_eq!(cpu.sp(), reference.sp());
        assert_eq!(cpu.flags(), reference.flags());
        assert_eq!(cpu.cycles(), calls);
    }
    assert_eq!(calls, 5);
    assert_eq!(cpu.register(Register::B), 3);
}

#[test]
fn halt_restarts_from_entry_point() {
    let mut cpu = load_cpu("inc a\npsh a\nhlt");
    assert_eq!(cpu.run(&mut NullIo, BUDGET), Ok(Exit::Halted));
    assert!(cpu.is_stopped());
    assert_eq!(cpu.run(&mut NullIo, BUDGET), Ok(Exit::Halted));
    assert_eq!(cpu.register(Register::A), 2);
    assert_eq!(cpu.sp(), STACK_START + 2);
}

#[test]
fn step_executes_one_instruction() {
    let mut cpu = load_cpu("num a 1\nhlt");
    assert_eq!(cpu.step(&mut NullIo), Ok(Exit::Paused));
    assert_eq!(cpu.register(Register::A), 1);
    assert_eq!(cpu.ip(), 0x13);
    assert_eq!(cpu.step(&mut NullIo), Ok(Exit::Halted));
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn profile_counts_categories() {
    let cpu = run_cpu("num a 1\nadd a a\npsh a\nsec 0 0x20\nclc %f\nhlt\n.f\nret");
    let profile = cpu.profile();
    assert_eq!(profile.get(CycleCategory::DataMove), 1);
    assert_eq!(profile.get(CycleCategory::Arithmetic), 1);
    assert_eq!(profile.get(CycleCategory::Stack), 1);
    assert_eq!(profile.get(CycleCategory::Memory), 1);
    assert_eq!(profile.get(CycleCategory::ControlFlow), 2);
    assert_eq!(profile.get(CycleCategory::Halt), 1);
    assert_eq!(profile.total(), 7);
}

// ==================== Treasure demo ====================

const TREASURES: [(usize, usize); 7] = [(1, 3), (4, 5), (2, 7), (14, 5), (10, 10), (8, 12), (5, 9)];

fn lit_pixels(screen: &Screen) -> usize {
    screen.framebuffer().iter().filter(|&&p| p != 0).count()
}

#[test]
fn treasure_draws_board() {
    let mut cpu = load_cpu(TREASURE);
    let mut screen = Screen::new();
    assert_eq!(cpu.run(&mut screen, BUDGET), Ok(Exit::Halted));
    assert_eq!(screen.pixel(8, 8), 2);
    for (x, y) in TREASURES {
        assert_eq!(screen.pixel(x, y), 1, "treasure at ({x}, {y})");
    }
    assert_eq!(lit_pixels(&screen), 8);
    assert_eq!(cpu.sp(), STACK_START);
}

#[test]
fn treasure_player_moves_and_collects() {
    let player_y = assemble_source(TREASURE, DEFAULT_MOUNT_ADDRESS)
        .unwrap()
        .lookup("Game.Player.y")
        .unwrap();

    let mut cpu = load_cpu(TREASURE);
    let mut screen = Screen::new();
    screen.set_button(Button::Down, true);
    for _ in 0..6 {
        assert_eq!(cpu.run(&mut screen, BUDGET), Ok(Exit::Halted));
    }
    assert_eq!(cpu.peek(player_y), 14);
    assert_eq!(screen.pixel(8, 13), 2);
    assert_eq!(screen.pixel(8, 12), 0);
    for (x, y) in TREASURES.iter().filter(|&&t| t != (8, 12)) {
        assert_eq!(screen.pixel(*x, *y), 1);
    }
    assert_eq!(lit_pixels(&screen), 7);
}

#[test]
fn treasure_player_stops_at_left_edge() {
    let player_x = assemble_source(TREASURE, DEFAULT_MOUNT_ADDRESS)
        .unwrap()
        .lookup("Game.Player.x")
        .unwrap();

    let mut cpu = load_cpu(TREASURE);
    let mut screen = Screen::new();
    screen.set_button(Button::Left, true);
    for _ in 0..12 {
        cpu.run(&mut screen, BUDGET).unwrap();
    }
    assert_eq!(cpu.peek(player_x), 0);
    assert_eq!(screen.pixel(0, 8), 2);
}
