//! Input parton densities at the starting scale.
//!
//! Every family maps a handful of free numbers onto x·f(x) for the 13 parton
//! species. The momentum fractions θ = (uv, dv, g1, g2, ū, d̄, s, c, b) always sum
//! to one; the valence shapes are derived so that the number sum rules
//! ∫u_v = 2 and ∫d_v = 1 hold exactly.

pub mod bernstein;
pub mod dirichlet;
pub mod record;

pub use bernstein::{BernsteinDirichletPdf, BernsteinPdf};
pub use dirichlet::DirichletPdf;
pub use record::{ParameterRecord, PdfRecord, LOG_WEIGHT_NAMES};

use crate::consts::{SIMPLEX_TOLERANCE, THETA_LEN};
use crate::error::{PfError, PfResult};
use crate::numeric::{beta, momentum_integral};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Parton species in evolution order. The discriminant is the storage index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Parton {
    TopBar = 0,
    BottomBar = 1,
    CharmBar = 2,
    StrangeBar = 3,
    UpBar = 4,
    DownBar = 5,
    Gluon = 6,
    Down = 7,
    Up = 8,
    Strange = 9,
    Charm = 10,
    Bottom = 11,
    Top = 12,
}

impl Parton {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Parton> {
        Parton::iter().nth(i)
    }

    /// Flavour number 1..=6 (d, u, s, c, b, t), 0 for the gluon.
    pub fn flavor(self) -> usize {
        let i = self as usize;
        i.abs_diff(6)
    }

    pub fn is_quark(self) -> bool {
        self != Parton::Gluon
    }
}

/// Parametrization families.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PdfFamily {
    Dirichlet,
    Bernstein,
    BernsteinDirichlet,
}

/// Index of each θ component.
pub mod theta {
    pub const UV: usize = 0;
    pub const DV: usize = 1;
    pub const G1: usize = 2;
    pub const G2: usize = 3;
    pub const UBAR: usize = 4;
    pub const DBAR: usize = 5;
    pub const S: usize = 6;
    pub const C: usize = 7;
    pub const B: usize = 8;

    pub const NAMES: [&str; super::THETA_LEN] = [
        "theta_uv",
        "theta_dv",
        "theta_g1",
        "theta_g2",
        "theta_ubar",
        "theta_dbar",
        "theta_s",
        "theta_c",
        "theta_b",
    ];
}

/// Gluon and sea exponents shared by all families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeaGluonShape {
    pub lambda_g1: f64,
    pub lambda_g2: f64,
    pub k_g: f64,
    pub lambda_q: f64,
    pub k_q: f64,
}

impl SeaGluonShape {
    pub const NAMES: [&'static str; 5] = ["lambda_g1", "lambda_g2", "K_g", "lambda_q", "K_q"];

    fn validate(&self) -> PfResult<()> {
        for (name, v) in Self::NAMES.iter().zip(self.values()) {
            if !v.is_finite() || v <= -1.0 {
                return Err(PfError::InvalidParameters(format!(
                    "{} = {} must be finite and > -1",
                    name, v
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn values(&self) -> [f64; 5] {
        [self.lambda_g1, self.lambda_g2, self.k_g, self.lambda_q, self.k_q]
    }

    pub(crate) fn from_values(v: [f64; 5]) -> Self {
        Self {
            lambda_g1: v[0],
            lambda_g2: v[1],
            k_g: v[2],
            lambda_q: v[3],
            k_q: v[4],
        }
    }
}

/// Gluon and sea densities built from θ and the shared exponents.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SeaGluon {
    shape: SeaGluonShape,
    norm_g1: f64,
    norm_g2: f64,
    norm_q: f64,
}

impl SeaGluon {
    pub(crate) fn new(shape: SeaGluonShape) -> PfResult<Self> {
        shape.validate()?;
        Ok(Self {
            shape,
            norm_g1: 1.0 / beta(shape.lambda_g1 + 1.0, shape.k_g + 1.0),
            norm_g2: 1.0 / beta(shape.lambda_g2 + 1.0, shape.k_q + 1.0),
            norm_q: 1.0 / beta(shape.lambda_q + 1.0, shape.k_q + 1.0),
        })
    }

    pub(crate) fn shape(&self) -> &SeaGluonShape {
        &self.shape
    }

    fn gluon(&self, theta: &[f64; THETA_LEN], x: f64) -> f64 {
        let s = &self.shape;
        theta[theta::G1] * self.norm_g1 * x.powf(s.lambda_g1) * (1.0 - x).powf(s.k_g)
            + theta[theta::G2] * self.norm_g2 * x.powf(s.lambda_g2) * (1.0 - x).powf(s.k_q)
    }

    /// One member of a sea pair carrying half of `weight`.
    fn sea(&self, weight: f64, x: f64) -> f64 {
        let s = &self.shape;
        0.5 * weight * self.norm_q * x.powf(s.lambda_q) * (1.0 - x).powf(s.k_q)
    }

    /// x·f for everything except the valence part of u and d.
    pub(crate) fn xf(&self, theta: &[f64; THETA_LEN], parton: Parton, x: f64) -> f64 {
        match parton {
            Parton::Gluon => self.gluon(theta, x),
            Parton::Up | Parton::UpBar => self.sea(theta[theta::UBAR], x),
            Parton::Down | Parton::DownBar => self.sea(theta[theta::DBAR], x),
            Parton::Strange | Parton::StrangeBar => self.sea(theta[theta::S], x),
            Parton::Charm | Parton::CharmBar => self.sea(theta[theta::C], x),
            Parton::Bottom | Parton::BottomBar => self.sea(theta[theta::B], x),
            Parton::Top | Parton::TopBar => 0.0,
        }
    }
}

/// Normalizes non-negative weights onto the simplex (the mean of a Dirichlet
/// distribution with these concentrations).
pub fn theta_from_weights(weights: &[f64; THETA_LEN]) -> PfResult<[f64; THETA_LEN]> {
    if weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
        return Err(PfError::InvalidParameters(
            "simplex weights must be finite and non-negative".into(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(PfError::InvalidParameters("simplex weights sum to zero".into()));
    }
    Ok(weights.map(|w| w / total))
}

pub(crate) fn validate_simplex(theta: &[f64]) -> PfResult<()> {
    if theta.iter().any(|&t| !t.is_finite() || t < 0.0) {
        return Err(PfError::InvalidParameters(format!(
            "momentum fractions must be non-negative: {:?}",
            theta
        )));
    }
    let total: f64 = theta.iter().sum();
    if (total - 1.0).abs() > SIMPLEX_TOLERANCE {
        return Err(PfError::InvalidParameters(format!(
            "momentum fractions sum to {} instead of 1",
            total
        )));
    }
    Ok(())
}

/// A complete input parametrization.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfParameters {
    Dirichlet(DirichletPdf),
    Bernstein(BernsteinPdf),
    BernsteinDirichlet(BernsteinDirichletPdf),
}

impl PdfParameters {
    pub fn family(&self) -> PdfFamily {
        match self {
            PdfParameters::Dirichlet(_) => PdfFamily::Dirichlet,
            PdfParameters::Bernstein(_) => PdfFamily::Bernstein,
            PdfParameters::BernsteinDirichlet(_) => PdfFamily::BernsteinDirichlet,
        }
    }

    /// x·f(x) for one species. Zero outside (0, 1).
    pub fn xf(&self, parton: Parton, x: f64) -> f64 {
        if !(x > 0.0 && x < 1.0) {
            return 0.0;
        }
        match self {
            PdfParameters::Dirichlet(p) => p.xf(parton, x),
            PdfParameters::Bernstein(p) => p.xf(parton, x),
            PdfParameters::BernsteinDirichlet(p) => p.xf(parton, x),
        }
    }

    pub fn theta(&self) -> [f64; THETA_LEN] {
        match self {
            PdfParameters::Dirichlet(p) => p.theta(),
            PdfParameters::Bernstein(p) => p.theta(),
            PdfParameters::BernsteinDirichlet(p) => p.theta(),
        }
    }

    /// Physical ordering: the up valence carries strictly more momentum than the down valence.
    pub fn is_admissible(&self) -> bool {
        let t = self.theta();
        t[theta::UV] > t[theta::DV]
    }

    /// ∫₀¹ Σ x·f(x) dx over all species, computed numerically.
    pub fn momentum_sum(&self) -> f64 {
        Parton::iter()
            .map(|p| momentum_integral(|x| self.xf(p, x)))
            .sum()
    }

    /// ∫₀¹ (f_q - f_q̄) dx.
    pub fn number_sum(&self, quark: Parton, antiquark: Parton) -> f64 {
        momentum_integral(|x| (self.xf(quark, x) - self.xf(antiquark, x)) / x)
    }
}

impl From<DirichletPdf> for PdfParameters {
    fn from(p: DirichletPdf) -> Self {
        PdfParameters::Dirichlet(p)
    }
}

impl From<BernsteinPdf> for PdfParameters {
    fn from(p: BernsteinPdf) -> Self {
        PdfParameters::Bernstein(p)
    }
}

impl From<BernsteinDirichletPdf> for PdfParameters {
    fn from(p: BernsteinDirichletPdf) -> Self {
        PdfParameters::BernsteinDirichlet(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parton_flavors() {
        assert_eq!(Parton::Gluon.flavor(), 0);
        assert_eq!(Parton::Down.flavor(), 1);
        assert_eq!(Parton::DownBar.flavor(), 1);
        assert_eq!(Parton::Top.flavor(), 6);
        assert_eq!(Parton::TopBar.flavor(), 6);
        assert_eq!(Parton::from_index(8), Some(Parton::Up));
        assert_eq!(Parton::from_index(13), None);
    }

    #[test]
    fn test_theta_from_weights() {
        let t = theta_from_weights(&[1.0, 1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(t[2], 0.5);
        assert!(theta_from_weights(&[0.0; THETA_LEN]).is_err());
    }
}
