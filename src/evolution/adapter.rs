use super::{DglapEngine, DiagnosticLog, EvolutionEngine, EvolvedPdf, GridLayout};
use crate::binning::KinematicBin;
use crate::config::{EvolutionConfig, GridConfig, SplineConfig};
use crate::error::{PfError, PfResult};
use crate::pdf::{Parton, PdfParameters};
use crate::spline::SplineStore;
use crate::structure::{self, QuarkCouplings, SplineTables};
use crate::xsec::{self, IntegratedXsec};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Everything fixed by `initialize`.
#[derive(Debug)]
struct EngineSetup {
    layout: GridLayout,
    evolution: EvolutionConfig,
    spline: SplineConfig,
    store: SplineStore,
    tables: SplineTables,
}

struct EngineState {
    engine: Box<dyn EvolutionEngine>,
    setup: Option<EngineSetup>,
}

/// Sole owner of the evolution engine and its spline tables.
///
/// All access goes through [`EvolutionAdapter::lock`], so at most one caller
/// touches the engine at a time.
pub struct EvolutionAdapter {
    state: Mutex<EngineState>,
    log: Arc<DiagnosticLog>,
}

impl EvolutionAdapter {
    pub fn new(engine: Box<dyn EvolutionEngine>, log: Arc<DiagnosticLog>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                engine,
                setup: None,
            }),
            log,
        }
    }

    pub fn with_dglap(log: Arc<DiagnosticLog>) -> Self {
        Self::new(Box::new(DglapEngine::new()), log)
    }

    pub fn log(&self) -> &Arc<DiagnosticLog> {
        &self.log
    }

    /// Sets up grid, weight tables and spline tables. Allowed exactly once.
    pub fn initialize(
        &self,
        grid: &GridConfig,
        evolution: &EvolutionConfig,
        spline: &SplineConfig,
    ) -> PfResult<SplineTables> {
        let mut state = self.state.lock()?;
        if state.setup.is_some() {
            return Err(PfError::AlreadyInitialized);
        }
        grid.validate()?;
        evolution.validate(grid)?;
        spline.validate()?;

        let layout = state.engine.init_grid(grid, evolution)?;
        let mut store = SplineStore::new(&layout, spline);
        let tables = SplineTables::register(&mut store)?;
        let (nu, nt) = store.node_shape();
        info!(
            "Evolution initialized: {}x{} grid, {}x{} spline nodes, start index {}",
            layout.nx(),
            layout.nq(),
            nu,
            nt,
            layout.iq0
        );

        state.setup = Some(EngineSetup {
            layout,
            evolution: evolution.clone(),
            spline: spline.clone(),
            store,
            tables,
        });
        Ok(tables)
    }

    /// Whether `initialize` has succeeded. A poisoned lock is an error, not `false`.
    pub fn is_initialized(&self) -> PfResult<bool> {
        Ok(self.state.lock()?.setup.is_some())
    }

    /// Enters the critical section.
    pub fn lock(&self) -> PfResult<EngineGuard<'_>> {
        Ok(EngineGuard {
            state: self.state.lock()?,
            log: &self.log,
        })
    }
}

/// Exclusive access to the engine for the lifetime of the guard.
pub struct EngineGuard<'a> {
    state: MutexGuard<'a, EngineState>,
    log: &'a DiagnosticLog,
}

impl EngineGuard<'_> {
    fn setup(&self) -> PfResult<&EngineSetup> {
        self.state.setup.as_ref().ok_or(PfError::NotInitialized)
    }

    /// Evolves an arbitrary input from grid index `iq0`.
    ///
    /// The diagnostic is always logged; an ε above the configured threshold only
    /// warns, with `describe()` naming the input.
    pub fn evolve_with(
        &mut self,
        input: &dyn Fn(Parton, f64) -> f64,
        iq0: usize,
        describe: &dyn Fn() -> String,
    ) -> PfResult<EvolvedPdf> {
        let threshold = self.setup()?.evolution.epsilon_threshold;
        let evolved = self.state.engine.evolve(input, iq0)?;
        let diag = self.log.record(evolved.handle, evolved.epsilon, threshold);
        if diag.exceeded {
            warn!(
                "Evolution accuracy epsilon={:.4} exceeds {} for {}",
                evolved.epsilon,
                threshold,
                describe()
            );
        }
        Ok(evolved)
    }

    /// Evolves a parametrization from the configured starting scale.
    pub fn evolve(&mut self, pdf: &PdfParameters) -> PfResult<EvolvedPdf> {
        let iq0 = self.setup()?.layout.iq0;
        self.evolve_with(&|p, x| pdf.xf(p, x), iq0, &|| {
            format!("{:?}", pdf.to_record())
        })
    }

    /// Fills structure-function and cross-section tables for `evolved`.
    pub fn build_splines(
        &mut self,
        evolved: &EvolvedPdf,
        couplings: &QuarkCouplings,
    ) -> PfResult<()> {
        let state = &mut *self.state;
        let setup = state.setup.as_mut().ok_or(PfError::NotInitialized)?;
        structure::build_splines(
            state.engine.as_ref(),
            &mut setup.store,
            &setup.tables,
            evolved,
            couplings,
            &setup.spline,
        )
    }

    /// Rejects bins that reach outside the evolved grid below the kinematic limit.
    pub fn check_bins(&self, bins: &[KinematicBin]) -> PfResult<()> {
        let setup = self.setup()?;
        let s = setup.spline.s();
        bins.iter()
            .try_for_each(|bin| setup.store.check_coverage(bin.x, bin.q2, Some(s)))
    }

    /// Integrates both cross-section tables over `bins`.
    pub fn integrate(&self, bins: &[KinematicBin]) -> PfResult<IntegratedXsec> {
        let setup = self.setup()?;
        xsec::integrate(&setup.store, &setup.tables, bins, setup.spline.s())
    }
}
