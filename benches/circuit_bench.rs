use std::{cell::RefCell, rc::Rc};

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use gatesim::{
    circuit_sim::*, components::adder::RippleCarryAdder, import::yosys::YosysModuleImporter,
    CircuitBuilder, GateKind, LogicState, LogicWidth,
};

const SIMPLE_AND_GATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/import_tests/yosys/simple_and_gate.json"
));

pub fn adder_bench(c: &mut Criterion, bits: u32) {
    let name = format!("{bits}-bit adder");
    let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
    let rca = RippleCarryAdder::new(builder.clone(), LogicWidth::new(bits).unwrap()).unwrap();
    let mut circuit = builder.borrow().build().unwrap();
    let mask = u64::MAX >> (64 - bits);
    c.bench_function(&name, |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter_batched(
            || (rng.gen::<u64>() & mask, rng.gen::<u64>() & mask),
            |(x, y)| {
                rca.set(&mut circuit, x, y, false).unwrap();
                circuit.run(10_000)
            },
            criterion::BatchSize::SmallInput,
        )
    });
    println!("steps: {}", circuit.steps());
}

fn adder_benches(c: &mut Criterion) {
    adder_bench(c, 8);
    adder_bench(c, 16);
    adder_bench(c, 32);
    adder_bench(c, 64);
}

/// A layer of independent gates over full-width words
fn wide_gate_bench(c: &mut Criterion, kind: GateKind, gates: usize) {
    let width = LogicWidth::MAX;
    let mut builder = CircuitBuilder::new();
    let a = builder.add_wire(width);
    let b = builder.add_wire(width);
    for _ in 0..gates {
        let out = builder.add_wire(width);
        builder.add_gate(kind, &[a, b], out).unwrap();
    }
    let mut circuit = builder.build().unwrap();

    c.bench_function(&format!("{gates} x 256-line {kind}"), |bench| {
        let mut rng = StdRng::seed_from_u64(2);
        bench.iter_batched(
            || {
                let words: Vec<u32> = (0..16).map(|_| rng.gen()).collect();
                (
                    LogicState::from_big_int(&words[..8]),
                    LogicState::from_big_int(&words[8..]),
                )
            },
            |(x, y)| {
                circuit.set_wire_drive(a, &x).unwrap();
                circuit.set_wire_drive(b, &y).unwrap();
                circuit.run(10)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn wide_gate_benches(c: &mut Criterion) {
    wide_gate_bench(c, GateKind::And, 1000);
    wide_gate_bench(c, GateKind::Xor, 1000);
}

fn import_benches(c: &mut Criterion) {
    c.bench_function("import simple_and_gate", |b| {
        b.iter(|| {
            let importer = YosysModuleImporter::from_json_str(SIMPLE_AND_GATE).unwrap();
            let mut builder = CircuitBuilder::new();
            builder.import_module(&importer).unwrap();
            builder.build().unwrap()
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = adder_benches, wide_gate_benches, import_benches
}
criterion_main!(benches);
