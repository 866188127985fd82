use crate::binning::{fold, AnalysisBinning};
use crate::config::RunConfig;
use crate::error::PfResult;
use crate::evolution::{DiagnosticLog, EngineGuard, EvolutionAdapter, EvolutionEngine};
use crate::pdf::PdfParameters;
use crate::spline::BeamCharge;
use crate::structure::QuarkCouplings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Expected detector counts for both beam charges, in detector-bin order.
///
/// Values come straight from the folding and may be slightly negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedCounts {
    pub e_plus: Vec<f64>,
    pub e_minus: Vec<f64>,
}

impl PredictedCounts {
    pub fn get(&self, charge: BeamCharge) -> &[f64] {
        match charge {
            BeamCharge::EPlus => &self.e_plus,
            BeamCharge::EMinus => &self.e_minus,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            e_plus: self.e_plus.iter().map(|v| v * factor).collect(),
            e_minus: self.e_minus.iter().map(|v| v * factor).collect(),
        }
    }
}

/// Parameters → predicted counts, with the engine behind a single lock.
pub struct ForwardModel {
    adapter: Arc<EvolutionAdapter>,
    couplings: Arc<QuarkCouplings>,
    binning: Arc<AnalysisBinning>,
}

impl ForwardModel {
    /// Wraps an adapter that is (or will be) initialized elsewhere.
    pub fn new(
        adapter: Arc<EvolutionAdapter>,
        couplings: Arc<QuarkCouplings>,
        binning: Arc<AnalysisBinning>,
    ) -> PfResult<Self> {
        binning.validate()?;
        Ok(Self {
            adapter,
            couplings,
            binning,
        })
    }

    pub fn adapter(&self) -> &Arc<EvolutionAdapter> {
        &self.adapter
    }

    pub fn log(&self) -> &Arc<DiagnosticLog> {
        self.adapter.log()
    }

    pub fn binning(&self) -> &AnalysisBinning {
        &self.binning
    }

    /// Enters the critical section; the whole pipeline runs under this guard.
    pub fn lock(&self) -> PfResult<ForwardSession<'_>> {
        Ok(ForwardSession {
            guard: self.adapter.lock()?,
            couplings: &self.couplings,
            binning: &self.binning,
        })
    }

    /// evolve → build splines → integrate → fold, all under one lock.
    pub fn forward_model(&self, pdf: &PdfParameters) -> PfResult<PredictedCounts> {
        self.lock()?.run(pdf)
    }
}

/// A held lock on the engine, able to run the pipeline.
pub struct ForwardSession<'a> {
    guard: EngineGuard<'a>,
    couplings: &'a QuarkCouplings,
    binning: &'a AnalysisBinning,
}

impl ForwardSession<'_> {
    pub fn run(&mut self, pdf: &PdfParameters) -> PfResult<PredictedCounts> {
        let evolved = self.guard.evolve(pdf)?;
        self.guard.build_splines(&evolved, self.couplings)?;
        let xsec = self.guard.integrate(&self.binning.kinematic_bins)?;
        let folded = |charge: BeamCharge| fold(xsec.get(charge), self.binning.response(charge));
        let e_plus = folded(BeamCharge::EPlus)?;
        let e_minus = folded(BeamCharge::EMinus)?;
        debug!(
            "Forward model: handle={} epsilon={:.3e} total e+={:.1} e-={:.1}",
            evolved.handle,
            evolved.epsilon,
            e_plus.iter().sum::<f64>(),
            e_minus.iter().sum::<f64>()
        );
        Ok(PredictedCounts { e_plus, e_minus })
    }
}

#[derive(TypedBuilder)]
pub struct ForwardModelParams {
    #[builder(default)]
    pub config: RunConfig,
    #[builder(default)]
    pub couplings: QuarkCouplings,
    pub binning: AnalysisBinning,
    #[builder(default = Arc::new(DiagnosticLog::new()))]
    pub log: Arc<DiagnosticLog>,
    /// Engine to drive; the DGLAP solver when unset.
    #[builder(default, setter(strip_option))]
    pub engine: Option<Box<dyn EvolutionEngine>>,
}

impl ForwardModelParams {
    /// Creates the adapter, initializes it once, and wires up the model.
    ///
    /// Fails if a kinematic bin reaches outside the evolved grid.
    pub fn build_model(self) -> PfResult<ForwardModel> {
        self.binning.validate()?;
        let adapter = match self.engine {
            Some(engine) => EvolutionAdapter::new(engine, self.log),
            None => EvolutionAdapter::with_dglap(self.log),
        };
        adapter.initialize(&self.config.grid, &self.config.evolution, &self.config.spline)?;
        adapter.lock()?.check_bins(&self.binning.kinematic_bins)?;
        ForwardModel::new(
            Arc::new(adapter),
            Arc::new(self.couplings),
            Arc::new(self.binning),
        )
    }
}
