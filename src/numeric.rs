//! Small numerical helpers shared by the PDF, evolution and integration code.

use crate::error::{PfError, PfResult};
use statrs::function::beta::ln_beta;

/// Gauss-Legendre nodes and weights on `[-1, 1]`.
///
/// Newton iteration on P_n(x) with the Chebyshev initial guess; only half of the
/// roots are computed and mirrored.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0f64; n];
    let mut weights = vec![0.0f64; n];

    if n == 0 {
        return (nodes, weights);
    }
    if n == 1 {
        weights[0] = 2.0;
        return (nodes, weights);
    }

    let nf = n as f64;
    let m = n.div_ceil(2);

    for i in 0..m {
        let mut x = ((std::f64::consts::PI * (i as f64 + 0.75)) / (nf + 0.5)).cos();

        for _ in 0..100 {
            let (p1, p0) = legendre_pair(n, x);
            let dp = nf * (x * p1 - p0) / (x * x - 1.0);
            let dx = p1 / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }

        let (p1, p0) = legendre_pair(n, x);
        let dp = nf * (x * p1 - p0) / (x * x - 1.0);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }

    (nodes, weights)
}

/// Returns (P_n(x), P_{n-1}(x)).
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0f64;
    let mut p1 = x;
    for j in 2..=n {
        let jf = j as f64;
        let p2 = ((2.0 * jf - 1.0) * x * p1 - (jf - 1.0) * p0) / jf;
        p0 = p1;
        p1 = p2;
    }
    (p1, p0)
}

/// A Gauss-Legendre rule that can be mapped onto any interval.
#[derive(Debug, Clone)]
pub struct GaussRule {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussRule {
    pub fn new(n: usize) -> Self {
        let (nodes, weights) = gauss_legendre(n);
        Self { nodes, weights }
    }

    /// Mapped (node, weight) pairs on `[a, b]`.
    pub fn on(&self, a: f64, b: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.nodes
            .iter()
            .zip(self.weights.iter())
            .map(move |(&x, &w)| (mid + half * x, w * half))
    }

    pub fn integrate<F: FnMut(f64) -> f64>(&self, a: f64, b: f64, mut f: F) -> f64 {
        self.on(a, b).map(|(x, w)| w * f(x)).sum()
    }
}

/// Euler Beta function B(a, b) for a, b > 0.
pub fn beta(a: f64, b: f64) -> f64 {
    ln_beta(a, b).exp()
}

/// Binomial coefficient C(n, k) as a float.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Bernstein basis polynomial b_{k,n}(x).
pub fn bernstein(k: usize, n: usize, x: f64) -> f64 {
    binomial(n, k) * x.powi(k as i32) * (1.0 - x).powi((n - k) as i32)
}

/// Root of a monotone function on `[lo, hi]` by bisection.
pub fn bisect<F: Fn(f64) -> f64>(f: F, mut lo: f64, mut hi: f64, tol: f64) -> PfResult<f64> {
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo * f_hi > 0.0 {
        return Err(PfError::Computation(format!(
            "bisection bracket [{}, {}] does not enclose a root (f = {}, {})",
            lo, hi, f_lo, f_hi
        )));
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) < tol {
            return Ok(mid);
        }
        if f_lo * f_mid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// Momentum integral ∫₀¹ g(x) dx of a density x·f(x) that may be integrably
/// singular at x → 0, computed in y = -ln x.
pub fn momentum_integral<F: Fn(f64) -> f64>(g: F) -> f64 {
    let rule = GaussRule::new(32);
    // ∫₀¹ g(x) dx = ∫₀^∞ g(e^{-y}) e^{-y} dy, split into growing panels.
    let edges = [0.0, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0];
    edges
        .windows(2)
        .map(|w| {
            rule.integrate(w[0], w[1], |y| {
                let x = (-y).exp();
                g(x) * x
            })
        })
        .sum()
}
