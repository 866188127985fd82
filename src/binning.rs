use crate::error::{PfError, PfResult};
use crate::spline::BeamCharge;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A rectangle in (x, Q²).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicBin {
    pub x: (f64, f64),
    pub q2: (f64, f64),
}

impl KinematicBin {
    pub fn new(x: (f64, f64), q2: (f64, f64)) -> Self {
        Self { x, q2 }
    }

    fn is_valid(&self) -> bool {
        self.x.0 > 0.0
            && self.x.0 < self.x.1
            && self.x.1 <= 1.0
            && self.q2.0 > 0.0
            && self.q2.0 < self.q2.1
    }
}

/// Dense bin-migration matrix, rows = kinematic bins, columns = detector bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferMatrix {
    pub rows: usize,
    pub cols: usize,
    // FLATTENED (size = rows * cols, row-major)
    pub data: Vec<f64>,
}

impl TransferMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> PfResult<Self> {
        let m = Self { rows, cols, data };
        m.validate()?;
        Ok(m)
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> PfResult<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(PfError::Validation("transfer matrix rows differ in length".into()));
        }
        Self::new(rows.len(), cols, rows.concat())
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    fn validate(&self) -> PfResult<()> {
        if self.data.len() != self.rows * self.cols {
            return Err(PfError::Validation(format!(
                "transfer matrix is {}x{} but holds {} entries",
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(PfError::Validation("transfer matrix has non-finite entries".into()));
        }
        Ok(())
    }
}

/// Detector response for one beam charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub transfer: TransferMatrix,
    /// One per kinematic bin; the integrated cross section is divided by it.
    pub normalization: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBinning {
    pub kinematic_bins: Vec<KinematicBin>,
    pub detector_bins: Vec<KinematicBin>,
    pub e_plus: ChargeResponse,
    pub e_minus: ChargeResponse,
}

impl AnalysisBinning {
    pub fn response(&self, charge: BeamCharge) -> &ChargeResponse {
        match charge {
            BeamCharge::EPlus => &self.e_plus,
            BeamCharge::EMinus => &self.e_minus,
        }
    }

    pub fn n_kinematic(&self) -> usize {
        self.kinematic_bins.len()
    }

    pub fn n_detector(&self) -> usize {
        self.detector_bins.len()
    }

    pub fn validate(&self) -> PfResult<()> {
        if self.kinematic_bins.is_empty() || self.detector_bins.is_empty() {
            return Err(PfError::Validation("binning has no bins".into()));
        }
        if let Some(i) = self.kinematic_bins.iter().position(|b| !b.is_valid()) {
            return Err(PfError::Validation(format!(
                "kinematic bin {} is not a proper rectangle: {:?}",
                i, self.kinematic_bins[i]
            )));
        }
        for (name, r) in [("e_plus", &self.e_plus), ("e_minus", &self.e_minus)] {
            r.transfer.validate()?;
            if r.transfer.rows != self.n_kinematic() || r.transfer.cols != self.n_detector() {
                return Err(PfError::Validation(format!(
                    "{} transfer matrix is {}x{}, expected {}x{}",
                    name,
                    r.transfer.rows,
                    r.transfer.cols,
                    self.n_kinematic(),
                    self.n_detector()
                )));
            }
            if r.normalization.len() != self.n_kinematic() {
                return Err(PfError::Validation(format!(
                    "{} has {} normalizations for {} kinematic bins",
                    name,
                    r.normalization.len(),
                    self.n_kinematic()
                )));
            }
            if r.normalization.iter().any(|&n| !(n.is_finite() && n > 0.0)) {
                return Err(PfError::Validation(format!(
                    "{} normalizations must be positive",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> PfResult<Self> {
        let content = fs::read_to_string(path)?;
        let binning: AnalysisBinning = serde_json::from_str(&content)?;
        binning.validate()?;
        Ok(binning)
    }
}

/// count_j = Σ_i T[i, j] · xsec[i] / norm[i]. Linear; negative inputs pass through.
pub fn fold(xsec: &[f64], response: &ChargeResponse) -> PfResult<Vec<f64>> {
    let t = &response.transfer;
    if xsec.len() != t.rows || response.normalization.len() != t.rows {
        return Err(PfError::Validation(format!(
            "cannot fold {} cross sections through a {}x{} response with {} normalizations",
            xsec.len(),
            t.rows,
            t.cols,
            response.normalization.len()
        )));
    }
    let mut counts = vec![0.0; t.cols];
    for (i, (&sigma, &norm)) in xsec.iter().zip(&response.normalization).enumerate() {
        let scaled = sigma / norm;
        for (j, c) in counts.iter_mut().enumerate() {
            *c += t.get(i, j) * scaled;
        }
    }
    Ok(counts)
}
