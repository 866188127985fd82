//! Named interpolation tables over (ln 1/x, ln Q²).
//!
//! Tables live on a sub-sampled copy of the evolution grid. Filling replaces the
//! previous contents without warning, and the selected beam charge is shared
//! state read by whoever fills next.

use crate::config::SplineConfig;
use crate::error::{PfError, PfResult};
use crate::evolution::grid::{locate, GridLayout};
use crate::numeric::GaussRule;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BeamCharge {
    #[default]
    EPlus,
    EMinus,
}

impl BeamCharge {
    /// +1 for positrons, -1 for electrons.
    pub fn sign(self) -> f64 {
        match self {
            BeamCharge::EPlus => 1.0,
            BeamCharge::EMinus => -1.0,
        }
    }
}

/// Rounding allowance, in ln x and ln Q², when comparing bins to the node range.
const COVERAGE_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SplineHandle(usize);

impl SplineHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One spline node as seen by a fill closure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePoint {
    /// Node position in the table.
    pub ix: usize,
    pub iq: usize,
    /// Position on the evolution grid.
    pub grid_ix: usize,
    pub grid_iq: usize,
    pub x: f64,
    pub q2: f64,
}

#[derive(Debug, Clone)]
struct SplineTable {
    name: String,
    // FLATTENED (size = nq_nodes * nx_nodes, Q² major)
    values: Vec<f64>,
    filled: bool,
}

#[derive(Debug, Clone)]
pub struct SplineStore {
    u_nodes: Vec<f64>,
    t_nodes: Vec<f64>,
    grid_x: Vec<usize>,
    grid_q: Vec<usize>,
    tables: Vec<SplineTable>,
    charge: BeamCharge,
    rule: GaussRule,
}

fn subsample(n: usize, step: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).step_by(step.max(1)).collect();
    if idx.last() != Some(&(n - 1)) {
        idx.push(n - 1);
    }
    idx
}

impl SplineStore {
    pub fn new(layout: &GridLayout, cfg: &SplineConfig) -> Self {
        let grid_x = subsample(layout.nx(), cfg.node_step_x);
        let grid_q = subsample(layout.nq(), cfg.node_step_q);
        Self {
            u_nodes: grid_x.iter().map(|&i| layout.u[i]).collect(),
            t_nodes: grid_q.iter().map(|&i| layout.t[i]).collect(),
            grid_x,
            grid_q,
            tables: Vec::new(),
            charge: BeamCharge::default(),
            rule: GaussRule::new(cfg.gauss_points),
        }
    }

    pub fn register(&mut self, name: &str) -> PfResult<SplineHandle> {
        if self.handle(name).is_some() {
            return Err(PfError::Validation(format!(
                "spline table '{}' is already registered",
                name
            )));
        }
        self.tables.push(SplineTable {
            name: name.to_string(),
            values: vec![0.0; self.u_nodes.len() * self.t_nodes.len()],
            filled: false,
        });
        Ok(SplineHandle(self.tables.len() - 1))
    }

    pub fn handle(&self, name: &str) -> Option<SplineHandle> {
        self.tables
            .iter()
            .position(|t| t.name == name)
            .map(SplineHandle)
    }

    pub fn select_charge(&mut self, charge: BeamCharge) {
        self.charge = charge;
    }

    pub fn charge(&self) -> BeamCharge {
        self.charge
    }

    pub fn node_shape(&self) -> (usize, usize) {
        (self.u_nodes.len(), self.t_nodes.len())
    }

    fn table(&self, handle: SplineHandle) -> PfResult<&SplineTable> {
        self.tables
            .get(handle.0)
            .ok_or_else(|| PfError::Validation(format!("unknown spline handle {}", handle.0)))
    }

    /// Fills a table from whole x profiles, one per Q² node.
    ///
    /// `profile(grid_iq)` returns values on every evolution-grid x node.
    pub fn fill_profiles<F>(&mut self, handle: SplineHandle, mut profile: F) -> PfResult<()>
    where
        F: FnMut(usize) -> PfResult<Vec<f64>>,
    {
        let nu = self.u_nodes.len();
        let mut values = Vec::with_capacity(nu * self.t_nodes.len());
        for &giq in &self.grid_q {
            let row = profile(giq)?;
            for &gix in &self.grid_x {
                let v = row.get(gix).copied().ok_or_else(|| {
                    PfError::Validation(format!(
                        "profile of length {} lacks x node {}",
                        row.len(),
                        gix
                    ))
                })?;
                values.push(v);
            }
        }
        let table = self
            .tables
            .get_mut(handle.0)
            .ok_or_else(|| PfError::Validation(format!("unknown spline handle {}", handle.0)))?;
        table.values = values;
        table.filled = true;
        Ok(())
    }

    /// Fills a table node by node; the closure may read other tables and the selected charge.
    pub fn fill_nodes<F>(&mut self, handle: SplineHandle, f: F) -> PfResult<()>
    where
        F: Fn(&SplineStore, NodePoint) -> f64,
    {
        self.table(handle)?;
        let mut values = std::mem::take(&mut self.tables[handle.0].values);
        let nu = self.u_nodes.len();
        values.resize(nu * self.t_nodes.len(), 0.0);
        for (iq, &giq) in self.grid_q.iter().enumerate() {
            for (ix, &gix) in self.grid_x.iter().enumerate() {
                let point = NodePoint {
                    ix,
                    iq,
                    grid_ix: gix,
                    grid_iq: giq,
                    x: (-self.u_nodes[ix]).exp(),
                    q2: self.t_nodes[iq].exp(),
                };
                values[iq * nu + ix] = f(self, point);
            }
        }
        let table = &mut self.tables[handle.0];
        table.values = values;
        table.filled = true;
        Ok(())
    }

    pub fn node_value(&self, handle: SplineHandle, ix: usize, iq: usize) -> f64 {
        let nu = self.u_nodes.len();
        self.tables
            .get(handle.0)
            .and_then(|t| t.values.get(iq * nu + ix))
            .copied()
            .unwrap_or(0.0)
    }

    fn bilinear(&self, values: &[f64], u: f64, t: f64) -> f64 {
        let nu = self.u_nodes.len();
        let i = locate(&self.u_nodes, u);
        let j = locate(&self.t_nodes, t);
        let wu = ((u - self.u_nodes[i]) / (self.u_nodes[i + 1] - self.u_nodes[i])).clamp(0.0, 1.0);
        let wt = ((t - self.t_nodes[j]) / (self.t_nodes[j + 1] - self.t_nodes[j])).clamp(0.0, 1.0);
        let v00 = values[j * nu + i];
        let v10 = values[j * nu + i + 1];
        let v01 = values[(j + 1) * nu + i];
        let v11 = values[(j + 1) * nu + i + 1];
        (1.0 - wt) * ((1.0 - wu) * v00 + wu * v10) + wt * ((1.0 - wu) * v01 + wu * v11)
    }

    /// Fails when the part of an (x, Q²) rectangle below the kinematic limit
    /// reaches outside the node range, where the tables hold no evolved values.
    pub fn check_coverage(
        &self,
        (x_lo, x_hi): (f64, f64),
        (q2_lo, q2_hi): (f64, f64),
        s: Option<f64>,
    ) -> PfResult<()> {
        let t_lo = q2_lo.ln();
        let t_hi = match s {
            Some(s) => q2_hi.min(x_hi * s).ln(),
            None => q2_hi.ln(),
        };
        if t_hi <= t_lo {
            return Ok(());
        }
        let (u_first, u_last) = (self.u_nodes[0], self.u_nodes[self.u_nodes.len() - 1]);
        let (t_first, t_last) = (self.t_nodes[0], self.t_nodes[self.t_nodes.len() - 1]);
        let inside = (1.0 / x_hi).ln() >= u_first - COVERAGE_SLACK
            && (1.0 / x_lo).ln() <= u_last + COVERAGE_SLACK
            && t_lo >= t_first - COVERAGE_SLACK
            && t_hi <= t_last + COVERAGE_SLACK;
        if !inside {
            return Err(PfError::Validation(format!(
                "bin x=[{}, {}] Q2=[{}, {}] leaves the grid x >= {:.3e}, Q2 in [{:.3e}, {:.3e}]",
                x_lo,
                x_hi,
                q2_lo,
                q2_hi,
                (-u_last).exp(),
                t_first.exp(),
                t_last.exp()
            )));
        }
        Ok(())
    }

    /// ∫∫ table · jacobian over x ∈ [x_lo, x_hi], Q² ∈ [q2_lo, q2_hi], with the
    /// measure du dt (u = ln 1/x, t = ln Q²).
    ///
    /// With `s = Some(s)` the Q² range at each x is cut at the kinematic limit x·s.
    pub fn integrate<J>(
        &self,
        handle: SplineHandle,
        (x_lo, x_hi): (f64, f64),
        (q2_lo, q2_hi): (f64, f64),
        s: Option<f64>,
        jacobian: J,
    ) -> PfResult<f64>
    where
        J: Fn(f64, f64) -> f64,
    {
        let table = self.table(handle)?;
        if !table.filled {
            return Err(PfError::Validation(format!(
                "spline table '{}' read before it was filled",
                table.name
            )));
        }
        if !(x_lo > 0.0 && x_lo < x_hi && x_hi <= 1.0 && q2_lo > 0.0 && q2_lo < q2_hi) {
            return Err(PfError::Validation(format!(
                "bad integration rectangle x=[{}, {}] Q2=[{}, {}]",
                x_lo, x_hi, q2_lo, q2_hi
            )));
        }

        self.check_coverage((x_lo, x_hi), (q2_lo, q2_hi), s)?;

        let u_pieces = pieces(&self.u_nodes, (1.0 / x_hi).ln(), (1.0 / x_lo).ln());
        let t_lo = q2_lo.ln();
        let mut total = 0.0;
        for (ua, ub) in u_pieces {
            for (u, wu) in self.rule.on(ua, ub) {
                let x = (-u).exp();
                let t_hi = match s {
                    Some(s) => q2_hi.min(x * s).ln(),
                    None => q2_hi.ln(),
                };
                if t_hi <= t_lo {
                    continue;
                }
                for (ta, tb) in pieces(&self.t_nodes, t_lo, t_hi) {
                    for (t, wt) in self.rule.on(ta, tb) {
                        let q2 = t.exp();
                        total += wu * wt * self.bilinear(&table.values, u, t) * jacobian(x, q2);
                    }
                }
            }
        }
        Ok(total)
    }
}

/// Splits [a, b] at every node strictly inside it.
fn pieces(nodes: &[f64], a: f64, b: f64) -> Vec<(f64, f64)> {
    let mut cuts = vec![a];
    cuts.extend(nodes.iter().copied().filter(|&n| n > a && n < b));
    cuts.push(b);
    cuts.windows(2).map(|w| (w[0], w[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvolutionConfig, GridConfig};

    fn store() -> SplineStore {
        let grid = GridConfig {
            nx: 40,
            nq: 12,
            ..Default::default()
        };
        let layout = GridLayout::build(&grid, &EvolutionConfig::default()).unwrap();
        SplineStore::new(&layout, &SplineConfig::default())
    }

    #[test]
    fn test_subsample_keeps_last() {
        assert_eq!(subsample(5, 2), vec![0, 2, 4]);
        assert_eq!(subsample(6, 2), vec![0, 2, 4, 5]);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut s = store();
        let h = s.register("a").unwrap();
        assert_eq!(s.handle("a"), Some(h));
        assert!(s.register("a").is_err());
    }

    #[test]
    fn test_integrate_linear_in_t() {
        // f = t is reproduced exactly by bilinear interpolation:
        // ∫_{x}∫_{t} t du dt over x∈[0.01,0.1], Q²∈[200,2000].
        let mut s = store();
        let h = s.register("t").unwrap();
        s.fill_nodes(h, |_, p| p.q2.ln()).unwrap();
        let v = s
            .integrate(h, (0.01, 0.1), (200.0, 2000.0), None, |_, _| 1.0)
            .unwrap();
        let du = (0.1f64 / 0.01).ln();
        let (ta, tb) = (200f64.ln(), 2000f64.ln());
        let expected = du * 0.5 * (tb * tb - ta * ta);
        assert!((v - expected).abs() < 1e-9 * expected.abs(), "{} vs {}", v, expected);
    }

    #[test]
    fn test_unfilled_table_cannot_be_integrated() {
        let mut s = store();
        let h = s.register("empty").unwrap();
        assert!(s
            .integrate(h, (0.01, 0.1), (200.0, 2000.0), None, |_, _| 1.0)
            .is_err());
    }

    #[test]
    fn test_rectangle_outside_grid_is_rejected() {
        let mut s = store();
        let h = s.register("one").unwrap();
        s.fill_nodes(h, |_, _| 1.0).unwrap();
        // Default grid: x >= 1e-3, Q2 in [1e2, 3e4].
        let s_cm = 318.0 * 318.0;
        for (x, q2) in [
            ((0.6, 0.9), (4e4, 6e4)),
            ((1e-4, 1e-2), (200.0, 500.0)),
            ((0.01, 0.1), (50.0, 500.0)),
        ] {
            let err = s.integrate(h, x, q2, Some(s_cm), |_, _| 1.0).unwrap_err();
            assert!(matches!(err, PfError::Validation(_)), "{:?} {:?}", x, q2);
        }
        // Above the grid only beyond the kinematic limit, so nothing is extrapolated.
        assert!(s.check_coverage((0.1, 0.2), (1e4, 5e4), Some(s_cm)).is_ok());
        assert!(s.check_coverage((0.1, 0.2), (1e4, 5e4), None).is_err());
    }

    #[test]
    fn test_kinematic_limit_cuts_area() {
        let mut s = store();
        let h = s.register("one").unwrap();
        s.fill_nodes(h, |_, _| 1.0).unwrap();
        let full = s
            .integrate(h, (0.01, 0.1), (200.0, 2000.0), None, |_, _| 1.0)
            .unwrap();
        let cut = s
            .integrate(h, (0.01, 0.1), (200.0, 2000.0), Some(1e4), |_, _| 1.0)
            .unwrap();
        assert!(cut < full);
        assert!(cut > 0.0);
    }
}
