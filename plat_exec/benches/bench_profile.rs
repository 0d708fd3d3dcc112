//! # Profile Compiler Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::plat::{Direction, HighLevelInstruction};
use plat_lib::{
    auto::{ProfileCompiler, ProfileParams},
    drive_ctrl,
};

fn profile_benchmark(c: &mut Criterion) {
    let compiler = ProfileCompiler::new(
        ProfileParams::default(),
        &drive_ctrl::Params::default()
    ).unwrap();

    // A square, driven by distance
    let mut square = Vec::new();
    for _ in 0..4 {
        square.push(HighLevelInstruction::straight_distance(2.0, Direction::Forward));
        square.push(HighLevelInstruction::turn(90.0));
    }

    // A long survey pattern mixing every instruction type
    let mut survey = Vec::new();
    for i in 0..50 {
        survey.push(HighLevelInstruction::straight_distance(0.5 + 0.1 * i as f64, Direction::Forward));
        survey.push(HighLevelInstruction::turn(if i % 2 == 0 { 90.0 } else { -90.0 }));
        survey.push(HighLevelInstruction::straight_time(1.5, Direction::Backward));
    }

    c.bench_function("ProfileCompiler::compile::square", |b| {
        b.iter(|| compiler.compile(black_box(&square)).unwrap())
    });

    c.bench_function("ProfileCompiler::compile::survey", |b| {
        b.iter(|| compiler.compile(black_box(&survey)).unwrap())
    });

    c.bench_function("RampModel::plan", |b| {
        b.iter(|| compiler.model().plan(black_box(10.0), black_box(100.0)))
    });
}

criterion_group!(benches, profile_benchmark);
criterion_main!(benches);
