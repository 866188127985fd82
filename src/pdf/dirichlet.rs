use super::{theta, validate_simplex, Parton, SeaGluon, SeaGluonShape};
use crate::consts::THETA_LEN;
use crate::error::{PfError, PfResult};
use crate::numeric::beta;

/// Power-law family: x·q_v = A x^λ (1-x)^K with λ fixed by the valence momentum.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletPdf {
    theta: [f64; THETA_LEN],
    k_u: f64,
    k_d: f64,
    sea: SeaGluon,

    // Derived
    lambda_u: f64,
    lambda_d: f64,
    a_u: f64,
    a_d: f64,
}

impl DirichletPdf {
    pub fn new(
        theta: [f64; THETA_LEN],
        k_u: f64,
        k_d: f64,
        shape: SeaGluonShape,
    ) -> PfResult<Self> {
        validate_simplex(&theta)?;
        for (name, k) in [("K_u", k_u), ("K_d", k_d)] {
            if !k.is_finite() || k <= -1.0 {
                return Err(PfError::InvalidParameters(format!(
                    "{} = {} must be finite and > -1",
                    name, k
                )));
            }
        }
        let (t_u, t_d) = (theta[theta::UV], theta[theta::DV]);
        if t_u <= 0.0 || t_d <= 0.0 || t_u >= 1.0 || t_d >= 1.0 {
            return Err(PfError::InvalidParameters(format!(
                "valence momenta must lie in (0, 1): uv={} dv={}",
                t_u, t_d
            )));
        }

        // ∫x q_v / ∫q_v = λ / (λ + K + 1) equals θ/2 (u) or θ (d).
        let lambda_u = t_u * (k_u + 1.0) / (2.0 - t_u);
        let lambda_d = t_d * (k_d + 1.0) / (1.0 - t_d);

        Ok(Self {
            theta,
            k_u,
            k_d,
            sea: SeaGluon::new(shape)?,
            lambda_u,
            lambda_d,
            a_u: 2.0 / beta(lambda_u, k_u + 1.0),
            a_d: 1.0 / beta(lambda_d, k_d + 1.0),
        })
    }

    pub fn theta(&self) -> [f64; THETA_LEN] {
        self.theta
    }

    pub fn k_u(&self) -> f64 {
        self.k_u
    }

    pub fn k_d(&self) -> f64 {
        self.k_d
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

    pub fn xuv(&self, x: f64) -> f64 {
        self.a_u * x.powf(self.lambda_u) * (1.0 - x).powf(self.k_u)
    }

    pub fn xdv(&self, x: f64) -> f64 {
        self.a_d * x.powf(self.lambda_d) * (1.0 - x).powf(self.k_d)
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
