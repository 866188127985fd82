//! Random-walk Metropolis over a [`LogDensity`], one chain per rayon task.
//!
//! Chains run in parallel; a density backed by the forward model serializes the
//! expensive part itself, so proposals and acceptance stay concurrent.

use crate::error::{PfError, PfResult};
use crate::likelihood::LogDensity;
use crate::pdf::ParameterRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetropolisOptions {
    pub chains: usize,
    pub warmup: usize,
    pub samples: usize,
    /// Gaussian proposal width per parameter.
    pub step_scales: BTreeMap<String, f64>,
    /// Width for parameters not listed; 0 keeps them fixed.
    pub default_step: f64,
    pub seed: Option<u64>,
    /// Iterations between progress reports.
    pub report_every: usize,
}

impl Default for MetropolisOptions {
    fn default() -> Self {
        Self {
            chains: 4,
            warmup: 200,
            samples: 1000,
            step_scales: BTreeMap::new(),
            default_step: 0.0,
            seed: None,
            report_every: 100,
        }
    }
}

/// A trait for receiving updates during sampling.
/// Boolean return value indicates if the chain should continue (true) or stop (false).
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, chain: usize, iteration: usize, acceptance: f64) -> bool;
}

pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _chain: usize, _iteration: usize, _acceptance: f64) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    /// Post-warmup draws in `parameter_names` order.
    pub draws: Vec<Vec<f64>>,
    pub log_density: Vec<f64>,
    pub accepted: usize,
    pub proposed: usize,
}

impl Chain {
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerResult {
    pub parameter_names: Vec<String>,
    pub chains: Vec<Chain>,
}

impl SamplerResult {
    /// Post-warmup draws of one parameter across all chains.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let k = self.parameter_names.iter().position(|n| n == name)?;
        Some(
            self.chains
                .iter()
                .flat_map(|c| c.draws.iter().map(move |d| d[k]))
                .collect(),
        )
    }
}

pub struct MetropolisSampler<D: LogDensity> {
    density: Arc<D>,
    options: MetropolisOptions,
}

impl<D: LogDensity> MetropolisSampler<D> {
    pub fn new(density: Arc<D>, options: MetropolisOptions) -> Self {
        Self { density, options }
    }

    pub fn run<CB: ProgressCallback>(
        &self,
        start: &ParameterRecord,
        callback: &CB,
    ) -> PfResult<SamplerResult> {
        let names = self.density.parameter_names();
        let x0: Vec<f64> = names
            .iter()
            .map(|n| {
                start.get(n).copied().ok_or_else(|| {
                    PfError::Validation(format!("start point lacks parameter '{}'", n))
                })
            })
            .collect::<PfResult<_>>()?;
        let scales: Vec<f64> = names
            .iter()
            .map(|n| {
                self.options
                    .step_scales
                    .get(n)
                    .copied()
                    .unwrap_or(self.options.default_step)
            })
            .collect();
        if let Some(unknown) = self.options.step_scales.keys().find(|k| !names.contains(k)) {
            return Err(PfError::Validation(format!(
                "step scale given for unknown parameter '{}'",
                unknown
            )));
        }

        let chains = (0..self.options.chains)
            .into_par_iter()
            .map(|c| {
                let rng = match self.options.seed {
                    Some(s) => StdRng::seed_from_u64(s.wrapping_add(c as u64)),
                    None => StdRng::from_os_rng(),
                };
                self.run_chain(c, rng, &names, x0.clone(), &scales, callback)
            })
            .collect::<PfResult<Vec<_>>>()?;

        Ok(SamplerResult {
            parameter_names: names,
            chains,
        })
    }

    fn to_record(names: &[String], x: &[f64]) -> ParameterRecord {
        names.iter().cloned().zip(x.iter().copied()).collect()
    }

    fn run_chain<CB: ProgressCallback>(
        &self,
        chain: usize,
        mut rng: StdRng,
        names: &[String],
        mut current: Vec<f64>,
        scales: &[f64],
        callback: &CB,
    ) -> PfResult<Chain> {
        let opts = &self.options;
        let mut lp = self.density.log_density(&Self::to_record(names, &current))?;
        if lp == f64::NEG_INFINITY {
            return Err(PfError::Validation(
                "start point has zero posterior density".into(),
            ));
        }

        let mut out = Chain {
            draws: Vec::with_capacity(opts.samples),
            log_density: Vec::with_capacity(opts.samples),
            accepted: 0,
            proposed: 0,
        };
        let mut proposal = current.clone();

        for it in 0..opts.warmup + opts.samples {
            for ((p, &c), &s) in proposal.iter_mut().zip(&current).zip(scales) {
                *p = if s > 0.0 {
                    c + s * rng.sample::<f64, _>(StandardNormal)
                } else {
                    c
                };
            }
            let lp_new = self.density.log_density(&Self::to_record(names, &proposal))?;
            out.proposed += 1;

            let delta = lp_new - lp;
            if delta >= 0.0 || rng.random::<f64>() < delta.exp() {
                current.copy_from_slice(&proposal);
                lp = lp_new;
                out.accepted += 1;
            }

            if it >= opts.warmup {
                out.draws.push(current.clone());
                out.log_density.push(lp);
            }

            if opts.report_every > 0
                && (it + 1) % opts.report_every == 0
                && !callback.on_progress(chain, it + 1, out.acceptance_rate())
            {
                break;
            }
        }

        debug!(
            "Chain {} finished: {} draws, acceptance {:.3}",
            chain,
            out.draws.len(),
            out.acceptance_rate()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Independent unit normals.
    struct Gaussian {
        names: Vec<String>,
    }

    impl LogDensity for Gaussian {
        fn parameter_names(&self) -> Vec<String> {
            self.names.clone()
        }

        fn log_density(&self, params: &ParameterRecord) -> PfResult<f64> {
            Ok(-0.5 * params.values().map(|v| v * v).sum::<f64>())
        }
    }

    fn sampler(seed: u64) -> MetropolisSampler<Gaussian> {
        let density = Arc::new(Gaussian {
            names: vec!["a".into(), "b".into()],
        });
        let options = MetropolisOptions {
            chains: 2,
            warmup: 100,
            samples: 2000,
            default_step: 1.0,
            seed: Some(seed),
            ..Default::default()
        };
        MetropolisSampler::new(density, options)
    }

    fn start() -> ParameterRecord {
        [("a".to_string(), 0.0), ("b".to_string(), 0.0)].into_iter().collect()
    }

    #[test]
    fn test_seeded_chains_are_reproducible() {
        let r1 = sampler(11).run(&start(), &NoProgress).unwrap();
        let r2 = sampler(11).run(&start(), &NoProgress).unwrap();
        assert_eq!(r1, r2);
        assert_ne!(r1.chains[0].draws, r1.chains[1].draws);
    }

    #[test]
    fn test_gaussian_moments() {
        let r = sampler(3).run(&start(), &NoProgress).unwrap();
        let a = r.column("a").unwrap();
        let mean = a.iter().sum::<f64>() / a.len() as f64;
        assert!(mean.abs() < 0.3, "mean {}", mean);
        let rate = r.chains[0].acceptance_rate();
        assert!(rate > 0.2 && rate < 0.9, "acceptance {}", rate);
    }

    #[test]
    fn test_gaussian_variance() {
        let r = sampler(9).run(&start(), &NoProgress).unwrap();
        for name in ["a", "b"] {
            let v = r.column(name).unwrap();
            let n = v.len() as f64;
            let mean = v.iter().sum::<f64>() / n;
            let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            assert!((var - 1.0).abs() < 0.3, "{} variance {}", name, var);
        }
    }

    #[test]
    fn test_frozen_parameter_never_moves() {
        let density = Arc::new(Gaussian {
            names: vec!["a".into(), "b".into()],
        });
        let mut step_scales = BTreeMap::new();
        step_scales.insert("a".to_string(), 0.5);
        let options = MetropolisOptions {
            chains: 1,
            warmup: 0,
            samples: 50,
            step_scales,
            seed: Some(1),
            ..Default::default()
        };
        let r = MetropolisSampler::new(density, options)
            .run(&start(), &NoProgress)
            .unwrap();
        assert!(r.column("b").unwrap().iter().all(|&v| v == 0.0));
    }

    struct StopEarly;

    impl ProgressCallback for StopEarly {
        fn on_progress(&self, _: usize, _: usize, _: f64) -> bool {
            false
        }
    }

    #[test]
    fn test_callback_stops_chain() {
        let r = sampler(5).run(&start(), &StopEarly).unwrap();
        // Stopped at the first report, still inside warmup.
        assert!(r.chains.iter().all(|c| c.draws.is_empty() && c.proposed == 100));
    }
}
