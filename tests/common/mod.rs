#![allow(dead_code)]

use partonfit::binning::{AnalysisBinning, ChargeResponse, KinematicBin, TransferMatrix};
use partonfit::config::{GridConfig, RunConfig};
use partonfit::pdf::{theta_from_weights, DirichletPdf, PdfParameters, SeaGluonShape};
use partonfit::{ForwardModel, ForwardModelParams};

pub const SCENARIO_WEIGHTS: [f64; 9] = [30.0, 15.0, 12.0, 6.0, 3.6, 0.85, 0.85, 0.85, 0.85];

pub const X_EDGES: [f64; 9] = [0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.4, 0.6];
pub const Q2_EDGES: [f64; 7] = [150.0, 300.0, 700.0, 1500.0, 4000.0, 10000.0, 25000.0];

pub fn scenario_shape() -> SeaGluonShape {
    SeaGluonShape {
        lambda_g1: 1.5,
        lambda_g2: -0.4,
        k_g: 6.0,
        lambda_q: -0.25,
        k_q: 5.0,
    }
}

pub fn dirichlet(theta: [f64; 9], k_u: f64, k_d: f64) -> PdfParameters {
    DirichletPdf::new(theta, k_u, k_d, scenario_shape())
        .unwrap()
        .into()
}

/// The scenario point: θ at the mean of the Dirichlet weights.
pub fn scenario_pdf() -> PdfParameters {
    dirichlet(theta_from_weights(&SCENARIO_WEIGHTS).unwrap(), 4.0, 4.0)
}

/// Same point with the up and down valence momenta swapped.
pub fn swapped_pdf() -> PdfParameters {
    let mut theta = theta_from_weights(&SCENARIO_WEIGHTS).unwrap();
    theta.swap(0, 1);
    dirichlet(theta, 4.0, 4.0)
}

/// Coarse grid for fast pipeline runs.
pub fn small_config() -> RunConfig {
    RunConfig {
        grid: GridConfig {
            nx: 40,
            nq: 12,
            ..GridConfig::default()
        },
        ..RunConfig::default()
    }
}

/// Bins below the kinematic limit on a 318 GeV collider, with a band
/// transfer matrix onto half as many detector bins.
pub fn synthetic_binning() -> AnalysisBinning {
    let s = 318.0f64 * 318.0;
    let mut kinematic_bins = Vec::new();
    for x in X_EDGES.windows(2) {
        for q in Q2_EDGES.windows(2) {
            if q[0] < 0.8 * x[1] * s {
                kinematic_bins.push(KinematicBin::new((x[0], x[1]), (q[0], q[1])));
            }
        }
    }
    let n_kin = kinematic_bins.len();
    let n_det = n_kin.div_ceil(2);
    let detector_bins: Vec<KinematicBin> = (0..n_det).map(|j| kinematic_bins[2 * j]).collect();

    let mut data = vec![0.0; n_kin * n_det];
    for i in 0..n_kin {
        let j = i / 2;
        data[i * n_det + j] += 0.8;
        data[i * n_det + (j + 1) % n_det] += 0.15;
    }
    let response = |lumi: f64| ChargeResponse {
        transfer: TransferMatrix::new(n_kin, n_det, data.clone()).unwrap(),
        normalization: vec![1.0 / (lumi * 0.9); n_kin],
    };

    AnalysisBinning {
        kinematic_bins,
        detector_bins,
        e_plus: response(185.0),
        e_minus: response(160.0),
    }
}

/// Routes library logs to the test harness; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

pub fn build_model(config: RunConfig) -> ForwardModel {
    init_tracing();
    ForwardModelParams::builder()
        .config(config)
        .binning(synthetic_binning())
        .build()
        .build_model()
        .unwrap()
}
