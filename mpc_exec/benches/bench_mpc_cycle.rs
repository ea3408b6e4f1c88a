//! # MPC Cycle Benchmark

use comms_if::msg::Telemetry;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mpc_lib::ctrl::{Controller, CtrlParams};

fn mpc_cycle_benchmark(c: &mut Criterion) {
    // ---- Build a controller with the long horizon ----

    let mut params = CtrlParams::default();
    params.mpc.horizon.n_steps = 20;
    params.mpc.horizon.dt_s = 0.05;
    params.mpc.solver.max_solve_time_s = 1.0;

    // A lap segment recorded from the simulator
    let telem = Telemetry {
        x: -40.62,
        y: 108.73,
        psi: 3.733651,
        speed: 20.0,
        ptsx: vec![-32.16173, -43.49173, -61.09, -78.29172, -93.05002, -107.7717],
        ptsy: vec![113.361, 105.941, 92.88499, 78.73102, 65.34102, 50.57938],
        steering_angle: Some(0.0),
        throttle: Some(0.0),
    };

    let mut warm = Controller::new(params.clone()).unwrap();
    warm.handle_telemetry(&telem).unwrap();

    // ---- Benchmarks ----

    c.bench_function("mpc_cycle_cold", |b| {
        b.iter(|| {
            let mut ctrl = Controller::new(params.clone()).unwrap();
            black_box(ctrl.handle_telemetry(black_box(&telem)).unwrap())
        })
    });

    c.bench_function("mpc_cycle_warm", |b| {
        b.iter(|| black_box(warm.handle_telemetry(black_box(&telem)).unwrap()))
    });
}

criterion_group!(benches, mpc_cycle_benchmark);
criterion_main!(benches);
