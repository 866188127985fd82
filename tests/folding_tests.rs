mod common;

use common::synthetic_binning;
use partonfit::binning::{fold, AnalysisBinning, ChargeResponse, TransferMatrix};
use partonfit::PfError;
use proptest::collection::vec;
use proptest::prelude::*;
use tempfile::NamedTempFile;

fn response(rows: usize, cols: usize) -> impl Strategy<Value = ChargeResponse> {
    (
        vec(0.0..1.0f64, rows * cols),
        vec(0.1..10.0f64, rows),
    )
        .prop_map(move |(data, normalization)| ChargeResponse {
            transfer: TransferMatrix::new(rows, cols, data).unwrap(),
            normalization,
        })
}

fn folding_case() -> impl Strategy<Value = (ChargeResponse, Vec<f64>, Vec<f64>, f64)> {
    (1usize..8, 1usize..6).prop_flat_map(|(rows, cols)| {
        (
            response(rows, cols),
            vec(-5.0..100.0f64, rows),
            vec(-5.0..100.0f64, rows),
            -3.0..3.0f64,
        )
    })
}

proptest! {
    #[test]
    fn prop_fold_is_linear((resp, a, b, k) in folding_case()) {
        let combined: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + k * y).collect();
        let lhs = fold(&combined, &resp).unwrap();
        let fa = fold(&a, &resp).unwrap();
        let fb = fold(&b, &resp).unwrap();
        for (j, l) in lhs.iter().enumerate() {
            let rhs = fa[j] + k * fb[j];
            prop_assert!(
                (l - rhs).abs() <= 1e-9 * (1.0 + rhs.abs()),
                "bin {}: {} vs {}",
                j,
                l,
                rhs
            );
        }
    }

    #[test]
    fn prop_fold_output_has_detector_length((resp, a, _b, _k) in folding_case()) {
        let out = fold(&a, &resp).unwrap();
        prop_assert_eq!(out.len(), resp.transfer.cols);
    }
}

#[test]
fn test_fold_by_hand() {
    let resp = ChargeResponse {
        transfer: TransferMatrix::from_rows(&[vec![1.0, 0.0], vec![0.5, 0.5], vec![0.0, 2.0]])
            .unwrap(),
        normalization: vec![1.0, 2.0, 4.0],
    };
    let out = fold(&[2.0, 4.0, -8.0], &resp).unwrap();
    // Negative inputs pass through unclipped.
    assert_eq!(out, vec![3.0, -3.0]);
}

#[test]
fn test_fold_rejects_wrong_length() {
    let binning = synthetic_binning();
    let err = fold(&[1.0], &binning.e_plus).unwrap_err();
    assert!(matches!(err, PfError::Validation(_)));
}

#[test]
fn test_binning_validation() {
    let mut binning = synthetic_binning();
    assert!(binning.validate().is_ok());
    binning.e_minus.normalization.pop();
    assert!(matches!(binning.validate(), Err(PfError::Validation(_))));

    let mut binning = synthetic_binning();
    binning.kinematic_bins[0].x = (0.1, 0.05);
    assert!(binning.validate().is_err());
}

#[test]
fn test_binning_file_round_trip() {
    let binning = synthetic_binning();
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), serde_json::to_string(&binning).unwrap()).unwrap();
    let loaded = AnalysisBinning::load_from_file(file.path()).unwrap();
    assert_eq!(loaded.n_kinematic(), binning.n_kinematic());
    assert_eq!(loaded.n_detector(), binning.n_detector());
    for (a, b) in loaded.e_plus.transfer.data.iter().zip(&binning.e_plus.transfer.data) {
        assert!((a - b).abs() < 1e-15);
    }
}
