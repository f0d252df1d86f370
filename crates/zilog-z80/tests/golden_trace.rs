//! Golden-trace regression tests.
//!
//! Each fixture in `tests/data/golden_traces.json` gives a program, an
//! initial register/memory state, and the state the CPU must reach when it
//! halts. Registers missing from `final` are not checked. `irq_at` asserts
//! /INT from that step, counted from zero, until the CPU takes it.

use emu_core::SimpleBus;
use serde::Deserialize;
use zilog_z80::Z80;

#[derive(Deserialize)]
struct Trace {
    name: String,
    initial: Initial,
    #[serde(rename = "final")]
    final_state: Expected,
    cycles: u32,
    #[serde(default)]
    irq_at: Option<usize>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Initial {
    pc: u16,
    sp: u16,
    a: u8,
    f: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    ix: u16,
    iy: u16,
    i: u8,
    r: u8,
    im: u8,
    iff: bool,
    /// Byte returned by every port read.
    port: u8,
    ram: Vec<(u16, u8)>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Expected {
    pc: Option<u16>,
    sp: Option<u16>,
    a: Option<u8>,
    f: Option<u8>,
    b: Option<u8>,
    c: Option<u8>,
    d: Option<u8>,
    e: Option<u8>,
    h: Option<u8>,
    l: Option<u8>,
    ix: Option<u16>,
    iy: Option<u16>,
    r: Option<u8>,
    wz: Option<u16>,
    halted: Option<bool>,
    ram: Vec<(u16, u8)>,
    port_writes: Option<Vec<(u16, u8)>>,
}

const MAX_STEPS: usize = 100_000;

fn setup(init: &Initial) -> (Z80, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.port_value = init.port;
    for &(addr, value) in &init.ram {
        bus.load(addr, &[value]);
    }
    let mut cpu = Z80::new();
    let r = cpu.regs_mut();
    r.pc = init.pc;
    r.sp = init.sp;
    r.a = init.a;
    r.f = init.f;
    r.b = init.b;
    r.c = init.c;
    r.d = init.d;
    r.e = init.e;
    r.h = init.h;
    r.l = init.l;
    r.ix = init.ix;
    r.iy = init.iy;
    r.i = init.i;
    r.r = init.r;
    r.im = init.im;
    r.iff1 = init.iff;
    r.iff2 = init.iff;
    (cpu, bus)
}

fn check<T: PartialEq + std::fmt::Debug>(name: &str, reg: &str, expected: Option<T>, actual: T) {
    if let Some(expected) = expected {
        assert_eq!(actual, expected, "{name}: register {reg}");
    }
}

fn run_trace(trace: &Trace) {
    let (mut cpu, mut bus) = setup(&trace.initial);
    let mut cycles = 0;
    let mut steps = 0;
    let mut irq = false;
    while !cpu.regs().halted {
        irq |= trace.irq_at == Some(steps);
        cpu.set_int_line(irq);
        let enabled = cpu.regs().iff1;
        cycles += cpu.step(&mut bus);
        if enabled && !cpu.regs().iff1 {
            irq = false;
        }
        steps += 1;
        assert!(steps < MAX_STEPS, "{}: program never halted", trace.name);
    }

    let name = trace.name.as_str();
    let exp = &trace.final_state;
    let r = *cpu.regs();
    check(name, "pc", exp.pc, r.pc);
    check(name, "sp", exp.sp, r.sp);
    check(name, "a", exp.a, r.a);
    check(name, "f", exp.f, r.f);
    check(name, "b", exp.b, r.b);
    check(name, "c", exp.c, r.c);
    check(name, "d", exp.d, r.d);
    check(name, "e", exp.e, r.e);
    check(name, "h", exp.h, r.h);
    check(name, "l", exp.l, r.l);
    check(name, "ix", exp.ix, r.ix);
    check(name, "iy", exp.iy, r.iy);
    check(name, "r", exp.r, r.r);
    check(name, "wz", exp.wz, r.wz);
    check(name, "halted", exp.halted, r.halted);
    for &(addr, value) in &exp.ram {
        assert_eq!(bus.peek(addr), value, "{name}: ram[{addr:04X}]");
    }
    if let Some(writes) = &exp.port_writes {
        assert_eq!(&bus.port_writes, writes, "{name}: port writes");
    }
    assert_eq!(cycles, trace.cycles, "{name}: cycle count");
}

#[test]
fn golden_traces() {
    let json = include_str!("data/golden_traces.json");
    let traces: Vec<Trace> = serde_json::from_str(json).expect("fixture parses");
    assert!(!traces.is_empty());
    for trace in &traces {
        run_trace(trace);
    }
}

#[test]
fn identical_start_gives_identical_run() {
    let json = include_str!("data/golden_traces.json");
    let traces: Vec<Trace> = serde_json::from_str(json).expect("fixture parses");
    let (mut a, mut bus_a) = setup(&traces[1].initial);
    let (mut b, mut bus_b) = setup(&traces[1].initial);
    for _ in 0..50 {
        assert_eq!(a.step(&mut bus_a), b.step(&mut bus_b));
        assert_eq!(a.state(), b.state());
    }
}
