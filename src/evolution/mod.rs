pub mod adapter;
pub mod alpha;
pub mod dglap;
pub mod diagnostics;
pub mod grid;
pub mod tables;

pub use adapter::{EngineGuard, EvolutionAdapter};
pub use dglap::DglapEngine;
pub use diagnostics::{DiagnosticLog, EvolutionDiagnostic};
pub use grid::GridLayout;

use crate::config::{EvolutionConfig, GridConfig};
use crate::consts::PARTON_COUNT;
use crate::error::PfResult;
use crate::pdf::Parton;
use crate::structure::StructureFunction;

/// Result of one evolution: a handle to the engine's current tables and the
/// interpolation accuracy estimate ε.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolvedPdf {
    pub handle: u64,
    pub epsilon: f64,
}

/// A scale-evolution solver with process-wide mutable tables.
///
/// Implementations are not reentrant; callers go through [`EvolutionAdapter`],
/// which serializes every access.
pub trait EvolutionEngine: Send {
    /// One-time grid and weight-table setup.
    fn init_grid(&mut self, grid: &GridConfig, evolution: &EvolutionConfig) -> PfResult<GridLayout>;

    /// Evolves `input` (x·f at the starting scale) from grid index `iq0` over the whole grid.
    fn evolve(&mut self, input: &dyn Fn(Parton, f64) -> f64, iq0: usize) -> PfResult<EvolvedPdf>;

    /// Structure function profile over the x nodes at Q² index `iq`.
    ///
    /// `weights` selects and weights the quark species; the gluon entry is ignored.
    fn structure_function(
        &self,
        pdf: &EvolvedPdf,
        kind: StructureFunction,
        weights: &[f64; PARTON_COUNT],
        iq: usize,
    ) -> PfResult<Vec<f64>>;

    /// Interpolated x·f(x, Q²).
    fn xf(&self, pdf: &EvolvedPdf, parton: Parton, x: f64, q2: f64) -> PfResult<f64>;

    fn alpha_s(&self, q2: f64) -> PfResult<f64>;
}
