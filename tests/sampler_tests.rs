mod common;

use approx::assert_abs_diff_eq;
use common::*;
use partonfit::likelihood::simulate_observed;
use partonfit::sampler::{MetropolisOptions, MetropolisSampler, NoProgress};
use partonfit::{ForwardModel, PfError, PoissonLikelihood};
use std::collections::BTreeMap;
use std::sync::Arc;

type Fixture = (
    MetropolisSampler<PoissonLikelihood>,
    Arc<PoissonLikelihood>,
    Arc<ForwardModel>,
);

fn sampler_with_steps(
    steps: &[(&str, f64)],
    chains: usize,
    warmup: usize,
    samples: usize,
) -> Fixture {
    let model = Arc::new(build_model(small_config()));
    let truth = scenario_pdf();
    let observed = simulate_observed(&model.forward_model(&truth).unwrap(), 7);
    let lik = Arc::new(PoissonLikelihood::new(model.clone(), observed, &truth).unwrap());

    let step_scales: BTreeMap<String, f64> =
        steps.iter().map(|&(n, s)| (n.to_string(), s)).collect();
    let options = MetropolisOptions {
        chains,
        warmup,
        samples,
        step_scales,
        seed: Some(2024),
        ..Default::default()
    };
    (MetropolisSampler::new(lik.clone(), options), lik, model)
}

fn sampler(chains: usize, warmup: usize, samples: usize) -> Fixture {
    sampler_with_steps(&[("K_u", 0.05), ("K_d", 0.05)], chains, warmup, samples)
}

#[test]
fn test_sampler_drives_forward_model() {
    let (sampler, _lik, model) = sampler(2, 2, 5);
    let start = scenario_pdf().to_sampling_record().values;
    let result = sampler.run(&start, &NoProgress).unwrap();

    assert_eq!(result.chains.len(), 2);
    assert_eq!(result.parameter_names.len(), 16);
    for chain in &result.chains {
        assert_eq!(chain.draws.len(), 5);
        assert!(chain.log_density.iter().all(|v| v.is_finite()));
    }

    // Unscaled parameters stay at the start value.
    let log_w_uv = start["log_w_uv"];
    assert!(result.column("log_w_uv").unwrap().iter().all(|&v| v == log_w_uv));
    assert!(result.column("K_u").unwrap().iter().all(|v| v.is_finite()));

    // One evolution for the pseudo-data, then a start plus one per proposal in each chain.
    assert_eq!(model.log().len(), 1 + 2 * (1 + 2 + 5));
}

#[test]
fn test_inadmissible_start_is_rejected() {
    let (sampler, _lik, _model) = sampler(1, 0, 1);
    let start = swapped_pdf().to_sampling_record().values;
    let err = sampler.run(&start, &NoProgress).unwrap_err();
    assert!(matches!(err, PfError::Validation(_)));
}

#[test]
fn test_start_must_name_every_parameter() {
    let (sampler, _lik, _model) = sampler(1, 0, 1);
    let mut start = scenario_pdf().to_sampling_record().values;
    start.remove("K_q");
    assert!(matches!(
        sampler.run(&start, &NoProgress),
        Err(PfError::Validation(_))
    ));
}

#[test]
fn test_momentum_fractions_move_on_the_simplex() {
    let steps = [
        ("log_w_uv", 2e-4),
        ("log_w_dv", 2e-4),
        ("log_w_g1", 2e-4),
        ("log_w_g2", 2e-4),
    ];
    let (sampler, lik, _model) = sampler_with_steps(&steps, 1, 0, 12);
    let start = scenario_pdf().to_sampling_record().values;
    let result = sampler.run(&start, &NoProgress).unwrap();

    let chain = &result.chains[0];
    assert!(chain.accepted > 0, "no theta proposal accepted");
    assert!(chain.log_density.iter().all(|v| v.is_finite()));

    let theta0 = scenario_pdf().theta();
    let mut moved = false;
    for draw in &chain.draws {
        let point = result.parameter_names.iter().cloned().zip(draw.iter().copied()).collect();
        let theta = lik.pdf_at(&point).unwrap().theta();
        assert_abs_diff_eq!(theta.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        moved |= theta[0] != theta0[0];
    }
    assert!(moved);
}
