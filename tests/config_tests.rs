use partonfit::config::{EvolutionConfig, GridConfig, RunConfig, SplineConfig, WeightTable};
use partonfit::PfError;
use rstest::rstest;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_json(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
fn test_defaults_are_valid() {
    assert!(RunConfig::default().validate().is_ok());
}

#[test]
fn test_partial_file_fills_defaults() {
    let file = write_json(
        r#"{
            "grid": { "nx": 60, "nq": 20 },
            "evolution": { "order": 1, "epsilon_threshold": 0.02, "weight_table": "unpolarized" },
            "spline": { "sqrt_s": 300.0 }
        }"#,
    );
    let cfg = RunConfig::load_from_file(file.path()).unwrap();
    assert_eq!(cfg.grid.nx, 60);
    assert_eq!(cfg.grid.nq, 20);
    assert_eq!(cfg.grid.x_min, GridConfig::default().x_min);
    assert_eq!(cfg.evolution.order, 1);
    assert_eq!(cfg.evolution.epsilon_threshold, 0.02);
    assert_eq!(cfg.evolution.weight_table, WeightTable::Unpolarized);
    assert_eq!(cfg.evolution.q0, EvolutionConfig::default().q0);
    assert_eq!(cfg.spline.sqrt_s, 300.0);
    assert_eq!(cfg.spline.s(), 90000.0);
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let file = write_json(r#"{ "evolution": { "order": 4 } }"#);
    let err = RunConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, PfError::Config(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_malformed_json() {
    let file = write_json("{ not json");
    assert!(matches!(
        RunConfig::load_from_file(file.path()),
        Err(PfError::Json(_))
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        RunConfig::load_from_file("/nonexistent/partonfit.json"),
        Err(PfError::Io(_))
    ));
}

#[test]
fn test_grid_file_load() {
    let file = write_json(r#"{ "x_min": [1e-4, 0.3], "x_weights": [1.0, 3.0], "nx": 50 }"#);
    let grid = GridConfig::load_from_file(file.path()).unwrap();
    assert_eq!(grid.x_min, vec![1e-4, 0.3]);
    assert_eq!(grid.q2_max(), 3e4);
}

#[rstest]
#[case::weights_mismatch(GridConfig { x_weights: vec![1.0], ..GridConfig::default() })]
#[case::too_few_x(GridConfig { nx: 2, ..GridConfig::default() })]
#[case::q2_descending(GridConfig { q2_edges: vec![3e4, 1e2], ..GridConfig::default() })]
#[case::q2_weights(GridConfig { q2_weights: vec![1.0, 1.0], ..GridConfig::default() })]
#[case::bad_order(GridConfig { interpolation_order: 5, ..GridConfig::default() })]
fn test_grid_rejects(#[case] grid: GridConfig) {
    assert!(matches!(grid.validate(), Err(PfError::Config(_))));
}

#[rstest]
#[case::order_zero(EvolutionConfig { order: 0, ..EvolutionConfig::default() })]
#[case::coupling(EvolutionConfig { alpha_s: 1.5, ..EvolutionConfig::default() })]
#[case::q0_above(EvolutionConfig { q0: 5e4, ..EvolutionConfig::default() })]
#[case::flavours(EvolutionConfig { n_fixed_flavors: 2, ..EvolutionConfig::default() })]
#[case::thresholds(EvolutionConfig {
    thresholds_q2: [20.0, 2.0, 3e4],
    ..EvolutionConfig::default()
})]
#[case::epsilon(EvolutionConfig { epsilon_threshold: 0.0, ..EvolutionConfig::default() })]
#[case::substeps(EvolutionConfig { rk_substeps: 0, ..EvolutionConfig::default() })]
fn test_evolution_rejects(#[case] evolution: EvolutionConfig) {
    let err = evolution.validate(&GridConfig::default()).unwrap_err();
    assert!(matches!(err, PfError::Config(_)), "{}", err);
}

#[rstest]
#[case::node_step(SplineConfig { node_step_x: 0, ..SplineConfig::default() })]
#[case::beyond_cut(SplineConfig { sqrt_s: 400.0, ..SplineConfig::default() })]
#[case::gauss(SplineConfig { gauss_points: 0, ..SplineConfig::default() })]
fn test_spline_rejects(#[case] spline: SplineConfig) {
    assert!(matches!(spline.validate(), Err(PfError::Config(_))));
}

#[rstest]
#[case(3)]
#[case(4)]
#[case(6)]
fn test_fixed_flavour_numbers_accepted(#[case] nf: u8) {
    let evolution = EvolutionConfig {
        n_fixed_flavors: nf,
        ..EvolutionConfig::default()
    };
    assert!(evolution.validate(&GridConfig::default()).is_ok());
}
