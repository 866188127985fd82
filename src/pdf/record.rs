use super::{
    theta, theta_from_weights, BernsteinDirichletPdf, BernsteinPdf, DirichletPdf, PdfFamily,
    PdfParameters, SeaGluonShape,
};
use crate::consts::THETA_LEN;
use crate::error::{PfError, PfResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat named parameter values, as exchanged with samplers and storage.
pub type ParameterRecord = BTreeMap<String, f64>;

const REST_NAMES: [&str; 7] = [
    "rest_g1", "rest_g2", "rest_ubar", "rest_dbar", "rest_s", "rest_c", "rest_b",
];

/// Unconstrained stand-ins for θ in sampling records: θ_i ∝ exp(log_w_i).
pub const LOG_WEIGHT_NAMES: [&str; THETA_LEN] = [
    "log_w_uv",
    "log_w_dv",
    "log_w_g1",
    "log_w_g2",
    "log_w_ubar",
    "log_w_dbar",
    "log_w_s",
    "log_w_c",
    "log_w_b",
];

/// A parametrization as a plain record: the family tag plus its free values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRecord {
    pub family: PdfFamily,
    pub values: ParameterRecord,
}

fn get(values: &ParameterRecord, key: &str) -> PfResult<f64> {
    values
        .get(key)
        .copied()
        .ok_or_else(|| PfError::InvalidParameters(format!("missing parameter '{}'", key)))
}

fn put_theta(values: &mut ParameterRecord, t: &[f64; THETA_LEN]) {
    for (name, v) in theta::NAMES.iter().zip(t.iter()) {
        values.insert(name.to_string(), *v);
    }
}

fn get_theta(values: &ParameterRecord) -> PfResult<[f64; THETA_LEN]> {
    let mut t = [0.0; THETA_LEN];
    for (slot, name) in t.iter_mut().zip(theta::NAMES.iter()) {
        *slot = get(values, name)?;
    }
    Ok(t)
}

fn put_shape(values: &mut ParameterRecord, s: &SeaGluonShape) {
    for (name, v) in SeaGluonShape::NAMES.iter().zip(s.values()) {
        values.insert(name.to_string(), v);
    }
}

fn get_shape(values: &ParameterRecord) -> PfResult<SeaGluonShape> {
    let mut v = [0.0; 5];
    for (slot, name) in v.iter_mut().zip(SeaGluonShape::NAMES.iter()) {
        *slot = get(values, name)?;
    }
    Ok(SeaGluonShape::from_values(v))
}

fn put_weights(values: &mut ParameterRecord, prefix: &str, first: usize, w: &[f64]) {
    for (i, v) in w.iter().enumerate() {
        values.insert(format!("{}_{}", prefix, i + first), *v);
    }
}

/// Reads `prefix_first`, `prefix_{first+1}`, … until the first missing index.
fn get_weights(values: &ParameterRecord, prefix: &str, first: usize) -> Vec<f64> {
    (first..)
        .map_while(|k| values.get(&format!("{}_{}", prefix, k)).copied())
        .collect()
}

impl PdfParameters {
    pub fn to_record(&self) -> PdfRecord {
        let mut values = ParameterRecord::new();
        match self {
            PdfParameters::Dirichlet(p) => {
                put_theta(&mut values, &p.theta());
                values.insert("K_u".into(), p.k_u());
                values.insert("K_d".into(), p.k_d());
                put_shape(&mut values, p.shape());
            }
            PdfParameters::Bernstein(p) => {
                put_weights(&mut values, "w_u", 1, p.w_u());
                put_weights(&mut values, "w_d", 1, p.w_d());
                for (name, v) in REST_NAMES.iter().zip(p.rest()) {
                    values.insert(name.to_string(), v);
                }
                put_shape(&mut values, p.shape());
            }
            PdfParameters::BernsteinDirichlet(p) => {
                put_theta(&mut values, &p.theta());
                put_weights(&mut values, "w_u", 0, p.w_u());
                put_weights(&mut values, "w_d", 0, p.w_d());
                put_shape(&mut values, p.shape());
            }
        }
        PdfRecord {
            family: self.family(),
            values,
        }
    }

    /// Like [`to_record`](Self::to_record), but θ is written as log-weights so every
    /// coordinate is free. Families that derive θ are unchanged.
    pub fn to_sampling_record(&self) -> PdfRecord {
        let mut record = self.to_record();
        let theta = match self {
            PdfParameters::Dirichlet(p) => p.theta(),
            PdfParameters::BernsteinDirichlet(p) => p.theta(),
            PdfParameters::Bernstein(_) => return record,
        };
        for name in theta::NAMES {
            record.values.remove(name);
        }
        for (name, t) in LOG_WEIGHT_NAMES.iter().zip(theta) {
            record.values.insert(name.to_string(), t.ln());
        }
        record
    }

    /// Inverse of [`to_sampling_record`](Self::to_sampling_record). θ is the
    /// normalized exp of the log-weights, so any finite values land on the simplex.
    pub fn from_sampling_record(record: &PdfRecord) -> PfResult<Self> {
        if record.family == PdfFamily::Bernstein {
            return Self::from_record(record);
        }
        let mut weights = [0.0; THETA_LEN];
        for (slot, name) in weights.iter_mut().zip(LOG_WEIGHT_NAMES.iter()) {
            *slot = get(&record.values, name)?.exp();
        }
        let mut values = record.values.clone();
        for name in LOG_WEIGHT_NAMES {
            values.remove(name);
        }
        put_theta(&mut values, &theta_from_weights(&weights)?);
        Self::from_record(&PdfRecord {
            family: record.family,
            values,
        })
    }

    pub fn from_record(record: &PdfRecord) -> PfResult<Self> {
        let values = &record.values;
        let shape = get_shape(values)?;
        let params = match record.family {
            PdfFamily::Dirichlet => DirichletPdf::new(
                get_theta(values)?,
                get(values, "K_u")?,
                get(values, "K_d")?,
                shape,
            )?
            .into(),
            PdfFamily::Bernstein => {
                let mut rest = [0.0; 7];
                for (slot, name) in rest.iter_mut().zip(REST_NAMES.iter()) {
                    *slot = get(values, name)?;
                }
                BernsteinPdf::new(
                    get_weights(values, "w_u", 1),
                    get_weights(values, "w_d", 1),
                    rest,
                    shape,
                )?
                .into()
            }
            PdfFamily::BernsteinDirichlet => BernsteinDirichletPdf::new(
                get_theta(values)?,
                get_weights(values, "w_u", 0),
                get_weights(values, "w_d", 0),
                shape,
            )?
            .into(),
        };
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_invalid_parameters() {
        let record = PdfRecord {
            family: PdfFamily::Dirichlet,
            values: ParameterRecord::new(),
        };
        assert!(matches!(
            PdfParameters::from_record(&record),
            Err(PfError::InvalidParameters(_))
        ));
    }
}
