//! Neutral-current e±p cross section and its integration over analysis bins.

use crate::binning::KinematicBin;
use crate::consts::{ALPHA_EM, GEV2_TO_PB, M_Z, SIN2_THETA_W};
use crate::error::PfResult;
use crate::spline::{BeamCharge, SplineStore};
use crate::structure::{QuarkClass, SplineTables};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Electroweak parameters of the γ/Z exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Electroweak {
    pub sin2_theta_w: f64,
    pub m_z: f64,
    pub alpha_em: f64,
}

impl Default for Electroweak {
    fn default() -> Self {
        Self {
            sin2_theta_w: SIN2_THETA_W,
            m_z: M_Z,
            alpha_em: ALPHA_EM,
        }
    }
}

/// DIS kinematics at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub x: f64,
    pub q2: f64,
    pub y: f64,
}

impl Kinematics {
    pub fn new(x: f64, q2: f64, s: f64) -> Self {
        Self {
            x,
            q2,
            y: q2 / (x * s),
        }
    }

    pub fn y_plus(&self) -> f64 {
        1.0 + (1.0 - self.y).powi(2)
    }

    pub fn y_minus(&self) -> f64 {
        1.0 - (1.0 - self.y).powi(2)
    }
}

impl Electroweak {
    /// κ P_Z(Q²) with κ = 1 / (4 sin²θ cos²θ).
    pub fn propagator(&self, q2: f64) -> f64 {
        let s2 = self.sin2_theta_w;
        let kappa = 1.0 / (4.0 * s2 * (1.0 - s2));
        kappa * q2 / (q2 + self.m_z * self.m_z)
    }

    /// (charge, vector, axial) couplings of a quark class.
    fn quark(&self, class: QuarkClass) -> (f64, f64, f64) {
        let s2 = self.sin2_theta_w;
        match class {
            QuarkClass::Up => (2.0 / 3.0, 0.5 - 4.0 / 3.0 * s2, 0.5),
            QuarkClass::Down => (-1.0 / 3.0, -0.5 + 2.0 / 3.0 * s2, -0.5),
        }
    }

    /// Coefficients (A_q, B_q) multiplying the F2/FL and xF3 combinations of a class.
    pub fn coefficients(&self, class: QuarkClass, q2: f64) -> (f64, f64) {
        let s2 = self.sin2_theta_w;
        let (e_q, v_q, a_q) = self.quark(class);
        let (v_e, a_e) = (-0.5 + 2.0 * s2, -0.5);
        let p = self.propagator(q2);

        let a = e_q * e_q - 2.0 * e_q * v_e * v_q * p
            + (v_e * v_e + a_e * a_e) * (v_q * v_q + a_q * a_q) * p * p;
        let b = -2.0 * e_q * a_e * a_q * p + 4.0 * v_e * a_e * v_q * a_q * p * p;
        (a, b)
    }

    /// σ_r = F̃2 ∓ (Y₋/Y₊) xF̃3 - (y²/Y₊) F̃L for e±.
    pub fn reduced(&self, charge: BeamCharge, kin: &Kinematics, f2: f64, xf3: f64, fl: f64) -> f64 {
        let yp = kin.y_plus();
        f2 - charge.sign() * kin.y_minus() / yp * xf3 - kin.y * kin.y / yp * fl
    }

    /// x·Q⁴·d²σ/dxdQ² in GeV⁻² units of α², i.e. 2πα² Y₊ σ_r.
    pub fn reduced_differential(
        &self,
        charge: BeamCharge,
        kin: &Kinematics,
        f2: f64,
        xf3: f64,
        fl: f64,
    ) -> f64 {
        2.0 * PI * self.alpha_em * self.alpha_em * kin.y_plus()
            * self.reduced(charge, kin, f2, xf3, fl)
    }
}

/// Integrated cross sections (pb), one per kinematic bin and beam charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedXsec {
    pub e_plus: Vec<f64>,
    pub e_minus: Vec<f64>,
}

impl IntegratedXsec {
    pub fn get(&self, charge: BeamCharge) -> &[f64] {
        match charge {
            BeamCharge::EPlus => &self.e_plus,
            BeamCharge::EMinus => &self.e_minus,
        }
    }
}

/// Integrates the filled cross-section tables over each bin, keeping bin order.
pub fn integrate(
    store: &SplineStore,
    tables: &SplineTables,
    bins: &[KinematicBin],
    s: f64,
) -> PfResult<IntegratedXsec> {
    let per_charge = |charge: BeamCharge| -> PfResult<Vec<f64>> {
        let handle = tables.xsec(charge);
        bins.par_iter()
            .map(|bin| {
                // x Q⁴ d²σ times the du dt measure (x Q²) over x Q⁴.
                store.integrate(handle, bin.x, bin.q2, Some(s), |_, q2| GEV2_TO_PB / q2)
            })
            .collect()
    };
    Ok(IntegratedXsec {
        e_plus: per_charge(BeamCharge::EPlus)?,
        e_minus: per_charge(BeamCharge::EMinus)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photon_limit() {
        // Far below M_Z the coefficients reduce to e_q² and 0.
        let ew = Electroweak::default();
        let (a_u, b_u) = ew.coefficients(QuarkClass::Up, 1e-3);
        let (a_d, _) = ew.coefficients(QuarkClass::Down, 1e-3);
        assert!((a_u - 4.0 / 9.0).abs() < 1e-6);
        assert!((a_d - 1.0 / 9.0).abs() < 1e-6);
        assert!(b_u.abs() < 1e-6);
    }

    #[test]
    fn test_charge_asymmetry_sign() {
        let ew = Electroweak::default();
        let kin = Kinematics::new(0.1, 5000.0, 318.0 * 318.0);
        let plus = ew.reduced(BeamCharge::EPlus, &kin, 1.0, 0.2, 0.0);
        let minus = ew.reduced(BeamCharge::EMinus, &kin, 1.0, 0.2, 0.0);
        assert!(minus > plus);
        assert!((plus + minus - 2.0).abs() < 1e-12);
    }
}
