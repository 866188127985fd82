use super::{theta, validate_simplex, Parton, SeaGluon, SeaGluonShape};
use crate::consts::THETA_LEN;
use crate::error::{PfError, PfResult};
use crate::numeric::{bernstein, beta, binomial, bisect};

fn validate_weights(name: &str, w: &[f64]) -> PfResult<()> {
    if w.is_empty() {
        return Err(PfError::InvalidParameters(format!("{} has no basis weights", name)));
    }
    if w.iter().any(|&v| !v.is_finite() || v < 0.0) || w.iter().all(|&v| v == 0.0) {
        return Err(PfError::InvalidParameters(format!(
            "{} weights must be non-negative and not all zero: {:?}",
            name, w
        )));
    }
    Ok(())
}

/// Pure Bernstein valence: x·q_v = A Σ_{k=1..n} w_k b_{k,n}(x).
///
/// The valence momenta follow from the weights, using ∫b_{k,n} = 1/(n+1) and
/// ∫b_{k,n}/x = 1/k. The other seven θ components share what remains.
#[derive(Debug, Clone, PartialEq)]
pub struct BernsteinPdf {
    w_u: Vec<f64>,
    w_d: Vec<f64>,
    rest: [f64; 7],
    sea: SeaGluon,

    // Derived
    theta: [f64; THETA_LEN],
    a_u: f64,
    a_d: f64,
}

impl BernsteinPdf {
    /// `w_u[k-1]`, `w_d[k-1]` weight b_{k,n} with n = len; `rest` is the
    /// relative split of (g1, g2, ū, d̄, s, c, b).
    pub fn new(
        w_u: Vec<f64>,
        w_d: Vec<f64>,
        rest: [f64; 7],
        shape: SeaGluonShape,
    ) -> PfResult<Self> {
        validate_weights("w_u", &w_u)?;
        validate_weights("w_d", &w_d)?;
        if w_u.len() != w_d.len() {
            return Err(PfError::InvalidParameters(format!(
                "valence bases differ in degree: {} vs {}",
                w_u.len(),
                w_d.len()
            )));
        }
        let rest_total: f64 = rest.iter().sum();
        if rest.iter().any(|&r| !r.is_finite() || r < 0.0) || rest_total <= 0.0 {
            return Err(PfError::InvalidParameters(format!(
                "non-valence split must be non-negative: {:?}",
                rest
            )));
        }

        let n = w_u.len();
        let (mom_u, num_u) = Self::moments(&w_u, n);
        let (mom_d, num_d) = Self::moments(&w_d, n);
        let a_u = 2.0 / num_u;
        let a_d = 1.0 / num_d;
        let t_u = a_u * mom_u;
        let t_d = a_d * mom_d;
        if t_u + t_d >= 1.0 {
            return Err(PfError::InvalidParameters(format!(
                "valence momentum {} leaves nothing for gluon and sea",
                t_u + t_d
            )));
        }

        let mut theta = [0.0; THETA_LEN];
        theta[theta::UV] = t_u;
        theta[theta::DV] = t_d;
        let scale = (1.0 - t_u - t_d) / rest_total;
        for (slot, r) in theta[theta::G1..].iter_mut().zip(rest.iter()) {
            *slot = r * scale;
        }
        validate_simplex(&theta)?;

        Ok(Self {
            w_u,
            w_d,
            rest,
            sea: SeaGluon::new(shape)?,
            theta,
            a_u,
            a_d,
        })
    }

    /// (Σ w_k/(n+1), Σ w_k/k) for basis indices k = 1..=n.
    fn moments(w: &[f64], n: usize) -> (f64, f64) {
        let mom = w.iter().sum::<f64>() / (n + 1) as f64;
        let num = w
            .iter()
            .enumerate()
            .map(|(i, &wk)| wk / (i + 1) as f64)
            .sum();
        (mom, num)
    }

    fn basis(w: &[f64], x: f64) -> f64 {
        let n = w.len();
        w.iter()
            .enumerate()
            .map(|(i, &wk)| wk * bernstein(i + 1, n, x))
            .sum()
    }

    pub fn w_u(&self) -> &[f64] {
        &self.w_u
    }

    pub fn w_d(&self) -> &[f64] {
        &self.w_d
    }

    pub fn rest(&self) -> [f64; 7] {
        self.rest
    }

    pub fn shape(&self) -> &SeaGluonShape {
        self.sea.shape()
    }

    pub fn theta(&self) -> [f64; THETA_LEN] {
        self.theta
    }

    pub fn xuv(&self, x: f64) -> f64 {
        self.a_u * Self::basis(&self.w_u, x)
    }

    pub fn xdv(&self, x: f64) -> f64 {
        self.a_d * Self::basis(&self.w_d, x)
    }

    pub fn xf(&self, parton: Parton, x: f64) -> f64 {
        let sea = self.sea.xf(&self.theta, parton, x);
        match parton {
            Parton::Up => self.xuv(x) + sea,
            Parton::Down => self.xdv(x) + sea,
            _ => sea,
        }
    }
}

/// Hybrid valence: x·q_v = A x^λ Σ_{k=0..n} w_k b_{k,n}(x) with θ given on the
/// simplex and λ solved so that the valence carries exactly its θ share.
#[derive(Debug, Clone, PartialEq)]
pub struct BernsteinDirichletPdf {
    theta: [f64; THETA_LEN],
    w_u: Vec<f64>,
    w_d: Vec<f64>,
    sea: SeaGluon,

    // Derived
    lambda_u: f64,
    lambda_d: f64,
    a_u: f64,
    a_d: f64,
}

impl BernsteinDirichletPdf {
    pub fn new(
        theta: [f64; THETA_LEN],
        w_u: Vec<f64>,
        w_d: Vec<f64>,
        shape: SeaGluonShape,
    ) -> PfResult<Self> {
        validate_simplex(&theta)?;
        validate_weights("w_u", &w_u)?;
        validate_weights("w_d", &w_d)?;
        let (t_u, t_d) = (theta[theta::UV], theta[theta::DV]);
        if t_u <= 0.0 || t_d <= 0.0 || t_u >= 1.0 || t_d >= 1.0 {
            return Err(PfError::InvalidParameters(format!(
                "valence momenta must lie in (0, 1): uv={} dv={}",
                t_u, t_d
            )));
        }

        let lambda_u = Self::solve_lambda(&w_u, 0.5 * t_u)?;
        let lambda_d = Self::solve_lambda(&w_d, t_d)?;
        let a_u = 2.0 / Self::number(&w_u, lambda_u);
        let a_d = 1.0 / Self::number(&w_d, lambda_d);

        Ok(Self {
            theta,
            w_u,
            w_d,
            sea: SeaGluon::new(shape)?,
            lambda_u,
            lambda_d,
            a_u,
            a_d,
        })
    }

    /// N(λ) = ∫ x^{λ-1} Σ w_k b_{k,n}(x) dx
    fn number(w: &[f64], lambda: f64) -> f64 {
        Self::moment(w, lambda, 0.0)
    }

    /// M(λ) = ∫ x^λ Σ w_k b_{k,n}(x) dx
    fn momentum(w: &[f64], lambda: f64) -> f64 {
        Self::moment(w, lambda, 1.0)
    }

    fn moment(w: &[f64], lambda: f64, shift: f64) -> f64 {
        let n = w.len() - 1;
        w.iter()
            .enumerate()
            .filter(|(_, &wk)| wk > 0.0)
            .map(|(k, &wk)| {
                wk * binomial(n, k) * beta(lambda + k as f64 + shift, (n - k) as f64 + 1.0)
            })
            .sum()
    }

    /// M(λ)/N(λ) rises monotonically from 0 to 1; find where it equals `target`.
    fn solve_lambda(w: &[f64], target: f64) -> PfResult<f64> {
        let k_min = w.iter().position(|&v| v > 0.0).unwrap_or(0) as f64;
        let lo = -k_min + 1e-6;
        let hi = 200.0;
        bisect(
            |l| Self::momentum(w, l) / Self::number(w, l) - target,
            lo,
            hi,
            1e-12,
        )
        .map_err(|e| PfError::InvalidParameters(format!("valence exponent: {}", e)))
    }

    pub fn theta(&self) -> [f64; THETA_LEN] {
        self.theta
    }

    pub fn w_u(&self) -> &[f64] {
        &self.w_u
    }

    pub fn w_d(&self) -> &[f64] {
        &self.w_d
    }

    pub fn shape(&self) -> &SeaGluonShape {
        self.sea.shape()
    }

    pub fn lambda_u(&self) -> f64 {
        self.lambda_u
    }

    pub fn lambda_d(&self) -> f64 {
        self.lambda_d
    }

    fn valence(w: &[f64], a: f64, lambda: f64, x: f64) -> f64 {
        let n = w.len() - 1;
        let poly: f64 = w
            .iter()
            .enumerate()
            .map(|(k, &wk)| wk * bernstein(k, n, x))
            .sum();
        a * x.powf(lambda) * poly
    }

    pub fn xuv(&self, x: f64) -> f64 {
        Self::valence(&self.w_u, self.a_u, self.lambda_u, x)
    }

    pub fn xdv(&self, x: f64) -> f64 {
        Self::valence(&self.w_d, self.a_d, self.lambda_d, x)
    }

    pub fn xf(&self, parton: Parton, x: f64) -> f64 {
        let sea = self.sea.xf(&self.theta, parton, x);
        match parton {
            Parton::Up => self.xuv(x) + sea,
            Parton::Down => self.xdv(x) + sea,
            _ => sea,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::momentum_integral;

    fn shape() -> SeaGluonShape {
        SeaGluonShape {
            lambda_g1: 0.5,
            lambda_g2: -0.3,
            k_g: 5.0,
            lambda_q: -0.2,
            k_q: 6.0,
        }
    }

    #[test]
    fn test_bernstein_valence_sum_rules() {
        let pdf = BernsteinPdf::new(
            vec![1.0, 3.0, 2.0, 0.5, 0.1],
            vec![1.0, 2.0, 1.0, 0.2, 0.05],
            [4.0, 1.0, 0.5, 0.5, 0.3, 0.1, 0.05],
            shape(),
        )
        .unwrap();
        let nu = momentum_integral(|x| pdf.xuv(x) / x);
        let nd = momentum_integral(|x| pdf.xdv(x) / x);
        assert!((nu - 2.0).abs() < 1e-6);
        assert!((nd - 1.0).abs() < 1e-6);
        let t = pdf.theta();
        assert!((t.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        let mu = momentum_integral(|x| pdf.xuv(x));
        assert!((mu - t[theta::UV]).abs() < 1e-6);
    }

    #[test]
    fn test_hybrid_solves_lambda_for_theta() {
        let theta = [0.35, 0.15, 0.3, 0.05, 0.06, 0.05, 0.03, 0.008, 0.002];
        let pdf =
            BernsteinDirichletPdf::new(theta, vec![1.0, 0.5, 0.2], vec![1.0, 0.3, 0.1], shape())
                .unwrap();
        let mu = momentum_integral(|x| pdf.xuv(x));
        let md = momentum_integral(|x| pdf.xdv(x));
        assert!((mu - 0.35).abs() < 1e-6, "uv momentum {}", mu);
        assert!((md - 0.15).abs() < 1e-6, "dv momentum {}", md);
        assert!(pdf.lambda_u() > 0.0);
    }

    #[test]
    fn test_rejects_valence_overflow() {
        // Weights concentrated at high x push the valence momentum above one.
        let res = BernsteinPdf::new(
            vec![0.0, 0.0, 0.0, 0.0, 1.0],
            vec![0.0, 0.0, 0.0, 0.0, 1.0],
            [1.0; 7],
            shape(),
        );
        assert!(matches!(res, Err(PfError::InvalidParameters(_))));
    }
}
