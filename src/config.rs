use crate::consts::{
    DEFAULT_EPSILON_THRESHOLD, DEFAULT_SQRT_S, MASS_BOTTOM, MASS_CHARM, MASS_TOP, M_Z,
};
use crate::error::{PfError, PfResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::{Display, EnumIter, EnumString};

/// Weight tables the engine knows how to build.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WeightTable {
    #[default]
    Unpolarized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    // === x grid ===
    /// Lower edge of each x region; region k ends where region k+1 starts, the last ends at 1.
    pub x_min: Vec<f64>,
    /// Relative point density per x region.
    pub x_weights: Vec<f64>,
    pub nx: usize,

    // === Q² grid ===
    /// Q² region edges in GeV², ascending.
    pub q2_edges: Vec<f64>,
    /// Relative point density per Q² region (one less than the number of edges).
    pub q2_weights: Vec<f64>,
    pub nq: usize,

    /// 2 = linear, 3 = quadratic interpolation when reading densities off the grid.
    pub interpolation_order: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            x_min: vec![1e-3, 1e-1, 5e-1],
            x_weights: vec![1.0, 2.0, 2.0],
            nx: 100,
            q2_edges: vec![1e2, 3e4],
            q2_weights: vec![1.0],
            nq: 50,
            interpolation_order: 2,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> PfResult<()> {
        if self.x_min.is_empty() || self.x_min.len() != self.x_weights.len() {
            return Err(PfError::Config(format!(
                "x grid needs one weight per region ({} edges, {} weights)",
                self.x_min.len(),
                self.x_weights.len()
            )));
        }
        if self.x_min.iter().any(|&x| !(x > 0.0 && x < 1.0)) {
            return Err(PfError::Config("x region edges must lie in (0, 1)".into()));
        }
        if !strictly_increasing(&self.x_min) {
            return Err(PfError::Config("x region edges must be strictly increasing".into()));
        }
        if self.q2_edges.len() < 2 || self.q2_weights.len() != self.q2_edges.len() - 1 {
            return Err(PfError::Config(format!(
                "Q2 grid needs at least two edges and one weight per region ({} edges, {} weights)",
                self.q2_edges.len(),
                self.q2_weights.len()
            )));
        }
        if self.q2_edges[0] <= 0.0 || !strictly_increasing(&self.q2_edges) {
            return Err(PfError::Config(
                "Q2 edges must be positive and strictly increasing".into(),
            ));
        }
        if self
            .x_weights
            .iter()
            .chain(self.q2_weights.iter())
            .any(|&w| !(w > 0.0 && w.is_finite()))
        {
            return Err(PfError::Config("grid region weights must be positive".into()));
        }
        if self.nx < self.x_min.len() + 2 || self.nq < self.q2_weights.len() + 1 {
            return Err(PfError::Config(format!(
                "grid too coarse: nx={} nq={}",
                self.nx, self.nq
            )));
        }
        if !(2..=3).contains(&self.interpolation_order) {
            return Err(PfError::Config(format!(
                "interpolation order must be 2 or 3, got {}",
                self.interpolation_order
            )));
        }
        Ok(())
    }

    pub fn q2_min(&self) -> f64 {
        self.q2_edges.first().copied().unwrap_or(f64::NAN)
    }

    pub fn q2_max(&self) -> f64 {
        self.q2_edges.last().copied().unwrap_or(f64::NAN)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> PfResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Loop order of the running coupling (1 = LO, 2 = NLO, 3 = NNLO).
    pub order: u8,
    pub alpha_s: f64,
    /// Scale (GeV²) at which `alpha_s` is given.
    pub alpha_s_ref_q2: f64,
    /// Scale (GeV²) of the input parametrization.
    pub q0: f64,
    /// Fixed number of active flavours, 0 for a variable flavour number.
    pub n_fixed_flavors: u8,
    /// Charm, bottom and top thresholds in GeV² (variable flavour number only).
    pub thresholds_q2: [f64; 3],
    pub weight_table: WeightTable,
    pub epsilon_threshold: f64,
    /// Runge-Kutta steps between neighbouring Q² grid points.
    pub rk_substeps: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            order: 2,
            alpha_s: 0.118,
            alpha_s_ref_q2: M_Z * M_Z,
            q0: 100.0,
            n_fixed_flavors: 0,
            thresholds_q2: [
                MASS_CHARM * MASS_CHARM,
                MASS_BOTTOM * MASS_BOTTOM,
                MASS_TOP * MASS_TOP,
            ],
            weight_table: WeightTable::Unpolarized,
            epsilon_threshold: DEFAULT_EPSILON_THRESHOLD,
            rk_substeps: 2,
        }
    }
}

impl EvolutionConfig {
    /// Checks the evolution settings against the grid they will run on.
    pub fn validate(&self, grid: &GridConfig) -> PfResult<()> {
        if !(1..=3).contains(&self.order) {
            return Err(PfError::Config(format!(
                "evolution order must be 1, 2 or 3, got {}",
                self.order
            )));
        }
        if !(self.alpha_s > 0.0 && self.alpha_s < 1.0) || !(self.alpha_s_ref_q2 > 0.0) {
            return Err(PfError::Config(format!(
                "invalid strong coupling alpha_s={} at Q2={}",
                self.alpha_s, self.alpha_s_ref_q2
            )));
        }
        if !(self.q0 >= grid.q2_min() && self.q0 <= grid.q2_max()) {
            return Err(PfError::Config(format!(
                "initial scale {} outside Q2 grid [{}, {}]",
                self.q0,
                grid.q2_min(),
                grid.q2_max()
            )));
        }
        if self.n_fixed_flavors > 6 || (self.n_fixed_flavors > 0 && self.n_fixed_flavors < 3) {
            return Err(PfError::Config(format!(
                "fixed flavour number must be 0 or 3..=6, got {}",
                self.n_fixed_flavors
            )));
        }
        if self.thresholds_q2.iter().any(|&t| !(t > 0.0))
            || !strictly_increasing(&self.thresholds_q2)
        {
            return Err(PfError::Config(
                "flavour thresholds must be positive and increasing".into(),
            ));
        }
        if !(self.epsilon_threshold > 0.0) {
            return Err(PfError::Config("epsilon threshold must be positive".into()));
        }
        if self.rk_substeps == 0 {
            return Err(PfError::Config("rk_substeps must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineConfig {
    /// Use every n-th x grid point as a spline node.
    pub node_step_x: usize,
    /// Use every n-th Q² grid point as a spline node.
    pub node_step_q: usize,
    /// √s (GeV) bounding the filled region: Q² ≤ x·rs_cut².
    pub rs_cut: f64,
    /// Centre-of-mass energy (GeV) used for integration.
    pub sqrt_s: f64,
    /// Gauss-Legendre points per node interval and direction.
    pub gauss_points: usize,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            node_step_x: 2,
            node_step_q: 2,
            rs_cut: 370.0,
            sqrt_s: DEFAULT_SQRT_S,
            gauss_points: 4,
        }
    }
}

impl SplineConfig {
    pub fn validate(&self) -> PfResult<()> {
        if self.node_step_x == 0 || self.node_step_q == 0 {
            return Err(PfError::Config("spline node steps must be at least 1".into()));
        }
        if !(self.rs_cut > 0.0 && self.sqrt_s > 0.0) {
            return Err(PfError::Config("rs_cut and sqrt_s must be positive".into()));
        }
        if self.sqrt_s > self.rs_cut {
            return Err(PfError::Config(format!(
                "sqrt_s={} exceeds the filled region rs_cut={}",
                self.sqrt_s, self.rs_cut
            )));
        }
        if self.gauss_points == 0 {
            return Err(PfError::Config("gauss_points must be at least 1".into()));
        }
        Ok(())
    }

    pub fn s(&self) -> f64 {
        self.sqrt_s * self.sqrt_s
    }
}

/// All configuration needed to initialize the evolution engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub grid: GridConfig,
    pub evolution: EvolutionConfig,
    pub spline: SplineConfig,
}

impl RunConfig {
    pub fn validate(&self) -> PfResult<()> {
        self.grid.validate()?;
        self.evolution.validate(&self.grid)?;
        self.spline.validate()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> PfResult<Self> {
        let content = fs::read_to_string(path)?;
        let cfg: RunConfig = serde_json::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn strictly_increasing(v: &[f64]) -> bool {
    v.iter().tuple_windows().all(|(a, b)| a < b)
}
