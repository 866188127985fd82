use criterion::{criterion_group, criterion_main, Criterion};
use partonfit::binning::{AnalysisBinning, ChargeResponse, KinematicBin, TransferMatrix};
use partonfit::config::{GridConfig, RunConfig};
use partonfit::pdf::{theta_from_weights, DirichletPdf, PdfParameters, SeaGluonShape};
use partonfit::{ForwardModel, ForwardModelParams};
use std::hint::black_box;

fn setup_pdf() -> PdfParameters {
    let theta = theta_from_weights(&[30.0, 15.0, 12.0, 6.0, 3.6, 0.85, 0.85, 0.85, 0.85])
        .expect("weights on the simplex");
    let shape = SeaGluonShape {
        lambda_g1: 1.5,
        lambda_g2: -0.4,
        k_g: 6.0,
        lambda_q: -0.25,
        k_q: 5.0,
    };
    DirichletPdf::new(theta, 4.0, 4.0, shape)
        .expect("valid point")
        .into()
}

// Diagonal response over a coarse (x, Q²) binning.
fn setup_binning() -> AnalysisBinning {
    let x_edges = [0.005, 0.02, 0.1, 0.4];
    let q2_edges = [150.0, 500.0, 2000.0, 8000.0];
    let mut bins = Vec::new();
    for x in x_edges.windows(2) {
        for q in q2_edges.windows(2) {
            bins.push(KinematicBin::new((x[0], x[1]), (q[0], q[1])));
        }
    }
    let n = bins.len();
    let mut data = vec![0.0; n * n];
    for i in 0..n {
        data[i * n + i] = 1.0;
    }
    let response = ChargeResponse {
        transfer: TransferMatrix::new(n, n, data).expect("square transfer matrix"),
        normalization: vec![0.01; n],
    };
    AnalysisBinning {
        kinematic_bins: bins.clone(),
        detector_bins: bins,
        e_plus: response.clone(),
        e_minus: response,
    }
}

fn setup_model(nx: usize, nq: usize) -> ForwardModel {
    let config = RunConfig {
        grid: GridConfig {
            nx,
            nq,
            ..GridConfig::default()
        },
        ..RunConfig::default()
    };
    ForwardModelParams::builder()
        .config(config)
        .binning(setup_binning())
        .build()
        .build_model()
        .expect("Failed to build forward model")
}

fn bench_forward(c: &mut Criterion) {
    let pdf = setup_pdf();
    let mut group = c.benchmark_group("forward_model");
    group.sample_size(10);
    for (nx, nq) in [(40, 12), (100, 50)] {
        let model = setup_model(nx, nq);
        group.bench_function(format!("grid_{}x{}", nx, nq), |b| {
            b.iter(|| model.forward_model(black_box(&pdf)).expect("forward model"))
        });
    }
    group.finish();
}

fn bench_evolution(c: &mut Criterion) {
    let pdf = setup_pdf();
    let model = setup_model(100, 50);
    c.bench_function("evolve_default_grid", |b| {
        b.iter(|| {
            let mut guard = model.adapter().lock().expect("engine lock");
            guard.evolve(black_box(&pdf)).expect("evolution")
        })
    });
}

criterion_group!(benches, bench_forward, bench_evolution);
criterion_main!(benches);
