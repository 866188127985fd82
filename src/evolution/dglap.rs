use super::alpha::AlphaS;
use super::grid::GridLayout;
use super::tables::WeightTables;
use super::{EvolutionEngine, EvolvedPdf};
use crate::config::{EvolutionConfig, GridConfig, WeightTable};
use crate::consts::PARTON_COUNT;
use crate::error::{PfError, PfResult};
use crate::pdf::Parton;
use crate::structure::StructureFunction;
use std::f64::consts::PI;
use tracing::{debug, info};

const GLUON: usize = Parton::Gluon as usize;

/// Leading-order DGLAP solver on a fixed (x, Q²) grid.
///
/// Holds exactly one evolved PDF at a time; each evolution bumps the
/// generation so handles from earlier runs are rejected.
#[derive(Debug, Default)]
pub struct DglapEngine {
    layout: Option<GridLayout>,
    tables: Option<WeightTables>,
    alpha: Option<AlphaS>,
    substeps: usize,

    // FLATTENED STORAGE (size = nq * PARTON_COUNT * nx)
    values: Vec<f64>,
    generation: u64,
    has_result: bool,
}

/// Borrowed view of everything an evolution needs.
struct Solver<'a> {
    layout: &'a GridLayout,
    tables: &'a WeightTables,
    alpha: &'a AlphaS,
}

impl Solver<'_> {
    fn nx(&self) -> usize {
        self.layout.nx()
    }

    /// dF/dt at fixed αs and flavour number.
    fn derivative(&self, f: &[f64], alpha_s: f64, nf: usize, out: &mut [f64]) {
        let nx = self.nx();
        let tab = self.tables;
        let a = alpha_s / (2.0 * PI);

        let gluon = &f[GLUON * nx..(GLUON + 1) * nx];
        let mut qg = vec![0.0; nx];
        tab.apply(&tab.pqg, gluon, &mut qg);

        let mut singlet = vec![0.0; nx];
        let mut buf = vec![0.0; nx];
        for p in 0..PARTON_COUNT {
            let dst = &mut out[p * nx..(p + 1) * nx];
            let active = Parton::from_index(p).map(|q| q.flavor()).unwrap_or(0);
            if p == GLUON || active > nf {
                dst.fill(0.0);
                continue;
            }
            let fp = &f[p * nx..(p + 1) * nx];
            for (s, v) in singlet.iter_mut().zip(fp) {
                *s += v;
            }
            tab.apply(&tab.pqq, fp, &mut buf);
            for ((d, b), g) in dst.iter_mut().zip(&buf).zip(&qg) {
                *d = a * (b + g);
            }
        }

        let mut gq = vec![0.0; nx];
        tab.apply(&tab.pgq, &singlet, &mut gq);
        tab.apply(&tab.pgg, gluon, &mut buf);
        let delta = nf as f64 / 3.0;
        let dst = &mut out[GLUON * nx..(GLUON + 1) * nx];
        for i in 0..nx {
            let drop = if i > 0 { delta * gluon[i] } else { 0.0 };
            dst[i] = a * (gq[i] + buf[i] - drop);
        }
    }

    /// Runge-Kutta from t_from to t_to in `substeps` steps.
    fn step(&self, f: &mut [f64], t_from: f64, t_to: f64, substeps: usize) {
        let n = f.len();
        let nf = self.layout.nf_at((0.5 * (t_from + t_to)).exp());
        let h = (t_to - t_from) / substeps as f64;
        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut tmp = vec![0.0; n];

        for s in 0..substeps {
            let t = t_from + h * s as f64;
            let a0 = self.alpha.value(t.exp());
            let a_mid = self.alpha.value((t + 0.5 * h).exp());
            let a1 = self.alpha.value((t + h).exp());

            self.derivative(f, a0, nf, &mut k1);
            for i in 0..n {
                tmp[i] = f[i] + 0.5 * h * k1[i];
            }
            self.derivative(&tmp, a_mid, nf, &mut k2);
            for i in 0..n {
                tmp[i] = f[i] + 0.5 * h * k2[i];
            }
            self.derivative(&tmp, a_mid, nf, &mut k3);
            for i in 0..n {
                tmp[i] = f[i] + h * k3[i];
            }
            self.derivative(&tmp, a1, nf, &mut k4);
            for i in 0..n {
                f[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            }
        }
    }
}

/// Value at `u` from the nodes of one species, linear or quadratic in u.
fn interpolate(u_nodes: &[f64], f: &[f64], u: f64, order: usize) -> f64 {
    let n = u_nodes.len();
    let k = super::grid::locate(u_nodes, u);
    if order < 3 || n < 3 {
        let w = (u - u_nodes[k]) / (u_nodes[k + 1] - u_nodes[k]);
        return f[k] * (1.0 - w) + f[k + 1] * w;
    }
    let j = if k == 0 { 0 } else { (k - 1).min(n - 3) };
    let (u0, u1, u2) = (u_nodes[j], u_nodes[j + 1], u_nodes[j + 2]);
    f[j] * (u - u1) * (u - u2) / ((u0 - u1) * (u0 - u2))
        + f[j + 1] * (u - u0) * (u - u2) / ((u1 - u0) * (u1 - u2))
        + f[j + 2] * (u - u0) * (u - u1) / ((u2 - u0) * (u2 - u1))
}

impl DglapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn solver(&self) -> PfResult<Solver<'_>> {
        match (&self.layout, &self.tables, &self.alpha) {
            (Some(layout), Some(tables), Some(alpha)) => Ok(Solver {
                layout,
                tables,
                alpha,
            }),
            _ => Err(PfError::NotInitialized),
        }
    }

    fn check_handle(&self, pdf: &EvolvedPdf) -> PfResult<()> {
        if !self.has_result || pdf.handle != self.generation {
            return Err(PfError::StaleHandle {
                handle: pdf.handle,
                current: self.generation,
            });
        }
        Ok(())
    }

    fn slice(&self, nx: usize, iq: usize, p: usize) -> &[f64] {
        let start = (iq * PARTON_COUNT + p) * nx;
        &self.values[start..start + nx]
    }

    /// Largest |quadratic - linear| at x-interval midpoints on the highest Q² slice.
    fn accuracy(&self, layout: &GridLayout) -> f64 {
        let nx = layout.nx();
        let top = layout.nq() - 1;
        let mut eps: f64 = 0.0;
        for p in 0..PARTON_COUNT {
            let f = self.slice(nx, top, p);
            for k in 0..nx - 1 {
                let um = 0.5 * (layout.u[k] + layout.u[k + 1]);
                let lin = 0.5 * (f[k] + f[k + 1]);
                let quad = interpolate(&layout.u, f, um, 3);
                eps = eps.max((quad - lin).abs());
            }
        }
        eps
    }
}

impl EvolutionEngine for DglapEngine {
    fn init_grid(
        &mut self,
        grid: &GridConfig,
        evolution: &EvolutionConfig,
    ) -> PfResult<GridLayout> {
        if self.layout.is_some() {
            return Err(PfError::AlreadyInitialized);
        }
        let layout = GridLayout::build(grid, evolution)?;
        let tables = match evolution.weight_table {
            WeightTable::Unpolarized => WeightTables::build(&layout.u),
        };
        let alpha = AlphaS::new(evolution);

        info!(
            "DGLAP engine ready: nx={} nq={} order={} alpha_s({})={} table={}",
            layout.nx(),
            layout.nq(),
            evolution.order,
            evolution.alpha_s_ref_q2,
            evolution.alpha_s,
            evolution.weight_table
        );

        self.values = vec![0.0; layout.nq() * PARTON_COUNT * layout.nx()];
        self.substeps = evolution.rk_substeps;
        self.layout = Some(layout.clone());
        self.tables = Some(tables);
        self.alpha = Some(alpha);
        Ok(layout)
    }

    fn evolve(&mut self, input: &dyn Fn(Parton, f64) -> f64, iq0: usize) -> PfResult<EvolvedPdf> {
        let solver = self.solver()?;
        let layout = solver.layout;
        let (nx, nq) = (layout.nx(), layout.nq());
        if iq0 >= nq {
            return Err(PfError::Validation(format!(
                "start index {} outside Q2 grid of {} points",
                iq0, nq
            )));
        }
        let block = PARTON_COUNT * nx;

        let mut start = vec![0.0; block];
        for p in 0..PARTON_COUNT {
            let parton = Parton::from_index(p).ok_or_else(|| {
                PfError::Computation(format!("no parton with index {}", p))
            })?;
            // x = 1 stays zero.
            for ix in 1..nx {
                start[p * nx + ix] = input(parton, layout.x[ix]);
            }
        }
        if start.iter().any(|v| !v.is_finite()) {
            return Err(PfError::Computation("input densities are not finite".into()));
        }

        let mut values = vec![0.0; nq * block];
        values[iq0 * block..(iq0 + 1) * block].copy_from_slice(&start);

        let mut f = start.clone();
        for iq in iq0..nq - 1 {
            solver.step(&mut f, layout.t[iq], layout.t[iq + 1], self.substeps);
            values[(iq + 1) * block..(iq + 2) * block].copy_from_slice(&f);
        }
        let mut f = start;
        for iq in (1..=iq0).rev() {
            solver.step(&mut f, layout.t[iq], layout.t[iq - 1], self.substeps);
            values[(iq - 1) * block..iq * block].copy_from_slice(&f);
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(PfError::Computation("evolution produced non-finite densities".into()));
        }

        self.values = values;
        self.generation += 1;
        self.has_result = true;
        let layout = self.layout.as_ref().ok_or(PfError::NotInitialized)?;
        let epsilon = self.accuracy(layout);
        debug!("Evolution #{} done, epsilon={:.3e}", self.generation, epsilon);

        Ok(EvolvedPdf {
            handle: self.generation,
            epsilon,
        })
    }

    fn structure_function(
        &self,
        pdf: &EvolvedPdf,
        kind: StructureFunction,
        weights: &[f64; PARTON_COUNT],
        iq: usize,
    ) -> PfResult<Vec<f64>> {
        self.check_handle(pdf)?;
        let solver = self.solver()?;
        let layout = solver.layout;
        let nx = layout.nx();
        if iq >= layout.nq() {
            return Err(PfError::Validation(format!("Q2 index {} outside grid", iq)));
        }

        let mut combined = vec![0.0; nx];
        for (p, &w) in weights.iter().enumerate() {
            if w == 0.0 || p == GLUON {
                continue;
            }
            for (c, v) in combined.iter_mut().zip(self.slice(nx, iq, p)) {
                *c += w * v;
            }
        }

        match kind {
            StructureFunction::F2 | StructureFunction::F3 => Ok(combined),
            StructureFunction::FL => {
                let q2 = layout.q2[iq];
                let nf = layout.nf_at(q2);
                let gluon_weight: f64 = weights
                    .iter()
                    .enumerate()
                    .filter_map(|(p, &w)| Parton::from_index(p).map(|q| (q, w)))
                    .filter(|(q, _)| q.is_quark() && q.flavor() <= nf)
                    .map(|(_, w)| w)
                    .sum::<f64>()
                    * 0.5;

                let tab = solver.tables;
                let mut quark = vec![0.0; nx];
                let mut gluon = vec![0.0; nx];
                tab.apply(&tab.cl_q, &combined, &mut quark);
                tab.apply(&tab.cl_g, self.slice(nx, iq, GLUON), &mut gluon);

                let a = solver.alpha.value(q2) / PI;
                Ok(quark
                    .iter()
                    .zip(&gluon)
                    .map(|(q, g)| a * (4.0 / 3.0 * q + 2.0 * gluon_weight * g))
                    .collect())
            }
        }
    }

    fn xf(&self, pdf: &EvolvedPdf, parton: Parton, x: f64, q2: f64) -> PfResult<f64> {
        self.check_handle(pdf)?;
        let layout = self.solver()?.layout;
        if x >= 1.0 {
            return Ok(0.0);
        }
        let x_min = layout.x.last().copied().unwrap_or(1.0);
        let (q2_lo, q2_hi) = (layout.q2[0], layout.q2[layout.nq() - 1]);
        let q2_inside = q2 >= q2_lo * (1.0 - 1e-12) && q2 <= q2_hi * (1.0 + 1e-12);
        if !(x >= x_min && x > 0.0) || !q2_inside {
            return Err(PfError::Validation(format!(
                "point (x={}, Q2={}) outside grid [{}, 1] x [{}, {}]",
                x, q2, x_min, q2_lo, q2_hi
            )));
        }

        let nx = layout.nx();
        let u = (1.0 / x).ln();
        let t = q2.ln();
        let iq = layout.locate_t(t);
        let w = ((t - layout.t[iq]) / (layout.t[iq + 1] - layout.t[iq])).clamp(0.0, 1.0);
        let order = layout.interpolation_order;
        let p = parton.index();
        let lo = interpolate(&layout.u, self.slice(nx, iq, p), u, order);
        let hi = interpolate(&layout.u, self.slice(nx, iq + 1, p), u, order);
        Ok(lo * (1.0 - w) + hi * w)
    }

    fn alpha_s(&self, q2: f64) -> PfResult<f64> {
        Ok(self.solver()?.alpha.value(q2))
    }
}
