use crate::consts::{C_A, C_F, T_R};
use crate::numeric::GaussRule;

/// Leading-order convolution weights on a u = ln(1/x) grid.
///
/// For F(u) = x·f(x) expanded in linear hat functions φ_j, row i of each
/// matrix gives x_i (P ⊗ f)(x_i) = Σ_j K_ij F_j. With z = exp(u' - u_i) the
/// convolution becomes ∫₀^{u_i} du' z P(z) F(u'). Rows are lower triangular.
///
/// FLATTENED MATRICES (size = nx * nx, row-major)
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTables {
    pub nx: usize,
    pub pqq: Vec<f64>,
    pub pqg: Vec<f64>,
    pub pgq: Vec<f64>,
    /// P_gg without the -n_f/3 δ(1-z) term, which depends on the scale.
    pub pgg: Vec<f64>,
    /// ∫ z² F: quark coefficient of F_L.
    pub cl_q: Vec<f64>,
    /// ∫ z²(1-z) F: gluon coefficient of F_L.
    pub cl_g: Vec<f64>,
}

const GAUSS_POINTS: usize = 8;

impl WeightTables {
    pub fn build(u: &[f64]) -> Self {
        let nx = u.len();
        let rule = GaussRule::new(GAUSS_POINTS);
        let mut pqq = vec![0.0; nx * nx];
        let mut pqg = vec![0.0; nx * nx];
        let mut pgq = vec![0.0; nx * nx];
        let mut pgg_soft = vec![0.0; nx * nx];
        let mut pgg_reg = vec![0.0; nx * nx];
        let mut cl_q = vec![0.0; nx * nx];
        let mut cl_g = vec![0.0; nx * nx];

        // Row 0 is x = 1 where every convolution vanishes.
        for i in 1..nx {
            let ui = u[i];
            let xi = (-ui).exp();
            let row = i * nx;
            let diag = row + i;

            for k in 0..i {
                let (lo, hi) = (u[k], u[k + 1]);
                let h = hi - lo;
                for (up, w) in rule.on(lo, hi) {
                    let z = (up - ui).exp();
                    let omz = 1.0 - z;
                    let phi = [(hi - up) / h, (up - lo) / h];
                    let cols = [row + k, row + k + 1];

                    // [(1+z²)/(1-z)]_+ : subtract F(u_i) under the integral.
                    let wqq = w * z * (1.0 + z * z) / omz;
                    let wqg = w * z * (z * z + omz * omz);
                    let wgq = w * (1.0 + omz * omz);
                    // z/(1-z)_+ acting on z·F(x/z).
                    let wsoft = w * z / omz;
                    let wreg = w * z * (omz / z + z * omz);
                    let wcq = w * z * z;
                    let wcg = w * z * z * omz;

                    for (&c, &p) in cols.iter().zip(phi.iter()) {
                        pqq[c] += wqq * p;
                        pqg[c] += wqg * p;
                        pgq[c] += wgq * p;
                        pgg_soft[c] += wsoft * z * p;
                        pgg_reg[c] += wreg * p;
                        cl_q[c] += wcq * p;
                        cl_g[c] += wcg * p;
                    }
                    pqq[diag] -= wqq;
                    pgg_soft[diag] -= wsoft;
                }
            }

            // Plus-prescription remainders from ∫₀^{x_i}.
            let big_g = -xi - 0.5 * xi * xi - 2.0 * (1.0 - xi).ln();
            pqq[diag] -= big_g;
            pgg_soft[diag] += (1.0 - xi).ln();
        }

        for v in pqq.iter_mut() {
            *v *= C_F;
        }
        for v in pqg.iter_mut() {
            *v *= T_R;
        }
        for v in pgq.iter_mut() {
            *v *= C_F;
        }
        let mut pgg: Vec<f64> = pgg_soft
            .iter()
            .zip(pgg_reg.iter())
            .map(|(s, r)| 2.0 * C_A * (s + r))
            .collect();
        for i in 1..nx {
            pgg[i * nx + i] += 11.0 * C_A / 6.0;
        }

        Self {
            nx,
            pqq,
            pqg,
            pgq,
            pgg,
            cl_q,
            cl_g,
        }
    }

    /// out = K · f over the lower triangle.
    pub fn apply(&self, matrix: &[f64], f: &[f64], out: &mut [f64]) {
        let n = self.nx;
        for i in 0..n {
            let row = &matrix[i * n..i * n + i + 1];
            out[i] = row.iter().zip(&f[..=i]).map(|(k, v)| k * v).sum();
        }
    }
}
