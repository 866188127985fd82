use crate::error::{PfError, PfResult};
use crate::forward::{ForwardModel, PredictedCounts};
use crate::pdf::{ParameterRecord, PdfParameters, PdfRecord};
use crate::spline::BeamCharge;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::debug;

/// Observed detector counts for both beam charges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedCounts {
    pub e_plus: Vec<u64>,
    pub e_minus: Vec<u64>,
}

impl ObservedCounts {
    pub fn get(&self, charge: BeamCharge) -> &[u64] {
        match charge {
            BeamCharge::EPlus => &self.e_plus,
            BeamCharge::EMinus => &self.e_minus,
        }
    }
}

/// A log density over a flat named-parameter record, as seen by a sampler.
pub trait LogDensity: Send + Sync {
    fn parameter_names(&self) -> Vec<String>;

    fn dim(&self) -> usize {
        self.parameter_names().len()
    }

    /// ln p(params), `-inf` for points outside the support.
    fn log_density(&self, params: &ParameterRecord) -> PfResult<f64>;
}

/// ln P(k | λ). A zero rate gives 0 for k = 0 and -inf otherwise.
pub fn ln_poisson(k: u64, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    let kf = k as f64;
    kf * lambda.ln() - lambda - ln_gamma(kf + 1.0)
}

/// Σ over both charges and all detector bins of ln P(observed | max(predicted, 0)).
pub fn poisson_log_likelihood(observed: &ObservedCounts, predicted: &PredictedCounts) -> f64 {
    let mut total = 0.0;
    for charge in BeamCharge::iter() {
        for (j, (&k, &rate)) in observed
            .get(charge)
            .iter()
            .zip(predicted.get(charge))
            .enumerate()
        {
            let lambda = if rate < 0.0 {
                debug!("Clipped negative prediction {:.3e} in {} bin {}", rate, charge, j);
                0.0
            } else {
                rate
            };
            total += ln_poisson(k, lambda);
        }
    }
    total
}

/// Seeded Poisson pseudo-data around a prediction; non-positive rates give 0.
pub fn simulate_observed(predicted: &PredictedCounts, seed: u64) -> ObservedCounts {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut draw = |rates: &[f64]| -> Vec<u64> {
        rates
            .iter()
            .map(|&lam| {
                if !lam.is_finite() || lam <= 0.0 {
                    return 0;
                }
                match Poisson::new(lam) {
                    Ok(pois) => pois.sample(&mut rng) as u64,
                    Err(_) => 0,
                }
            })
            .collect()
    };
    let e_plus = draw(&predicted.e_plus);
    let e_minus = draw(&predicted.e_minus);
    ObservedCounts { e_plus, e_minus }
}

/// Poisson likelihood of observed counts under the forward model.
pub struct PoissonLikelihood {
    model: Arc<ForwardModel>,
    observed: ObservedCounts,
    template: PdfRecord,
}

impl PoissonLikelihood {
    /// `template` fixes the family and supplies values for parameters a record leaves out.
    /// Parameter names are those of [`PdfParameters::to_sampling_record`].
    pub fn new(
        model: Arc<ForwardModel>,
        observed: ObservedCounts,
        template: &PdfParameters,
    ) -> PfResult<Self> {
        let n = model.binning().n_detector();
        if observed.e_plus.len() != n || observed.e_minus.len() != n {
            return Err(PfError::Validation(format!(
                "observed counts ({}, {}) do not match {} detector bins",
                observed.e_plus.len(),
                observed.e_minus.len(),
                n
            )));
        }
        Ok(Self {
            model,
            observed,
            template: template.to_sampling_record(),
        })
    }

    pub fn model(&self) -> &Arc<ForwardModel> {
        &self.model
    }

    pub fn observed(&self) -> &ObservedCounts {
        &self.observed
    }

    /// -inf for inadmissible points; otherwise runs the forward model under its lock.
    pub fn log_likelihood(&self, pdf: &PdfParameters) -> PfResult<f64> {
        if !pdf.is_admissible() {
            return Ok(f64::NEG_INFINITY);
        }
        let predicted = {
            let mut session = self.model.lock()?;
            session.run(pdf)?
        };
        Ok(poisson_log_likelihood(&self.observed, &predicted))
    }

    /// Template record with `params` laid over it.
    pub fn merge(&self, params: &ParameterRecord) -> PfResult<PdfRecord> {
        let mut record = self.template.clone();
        for (name, &value) in params {
            match record.values.get_mut(name) {
                Some(slot) => *slot = value,
                None => {
                    return Err(PfError::Validation(format!(
                        "unknown parameter '{}' for family {}",
                        name, record.family
                    )))
                }
            }
        }
        Ok(record)
    }

    /// The parametrization a sampling-record point stands for.
    pub fn pdf_at(&self, params: &ParameterRecord) -> PfResult<PdfParameters> {
        PdfParameters::from_sampling_record(&self.merge(params)?)
    }
}

impl LogDensity for PoissonLikelihood {
    fn parameter_names(&self) -> Vec<String> {
        self.template.values.keys().cloned().collect()
    }

    fn log_density(&self, params: &ParameterRecord) -> PfResult<f64> {
        match self.pdf_at(params) {
            Ok(pdf) => self.log_likelihood(&pdf),
            Err(PfError::InvalidParameters(reason)) => {
                debug!("Rejected parameter point: {}", reason);
                Ok(f64::NEG_INFINITY)
            }
            Err(e) => Err(e),
        }
    }
}
