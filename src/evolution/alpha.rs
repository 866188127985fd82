use crate::config::EvolutionConfig;
use std::f64::consts::PI;

/// Running strong coupling from the truncated β function.
///
/// With a = αs/4π: da/dt = -(β0 a² + β1 a³ + β2 a⁴), t = ln Q², truncated at
/// the configured loop order. The coupling is continuous across flavour thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaS {
    order: u8,
    a_ref: f64,
    t_ref: f64,
    n_fixed_flavors: usize,
    t_thresholds: [f64; 3],
}

const MAX_STEP: f64 = 0.02;

impl AlphaS {
    pub fn new(cfg: &EvolutionConfig) -> Self {
        Self {
            order: cfg.order,
            a_ref: cfg.alpha_s / (4.0 * PI),
            t_ref: cfg.alpha_s_ref_q2.ln(),
            n_fixed_flavors: cfg.n_fixed_flavors as usize,
            t_thresholds: cfg.thresholds_q2.map(f64::ln),
        }
    }

    fn nf_at(&self, t: f64) -> usize {
        if self.n_fixed_flavors > 0 {
            return self.n_fixed_flavors;
        }
        3 + self.t_thresholds.iter().filter(|&&m| t >= m).count()
    }

    fn beta(&self, nf: usize) -> [f64; 3] {
        let nf = nf as f64;
        let b0 = 11.0 - 2.0 / 3.0 * nf;
        let b1 = if self.order >= 2 { 102.0 - 38.0 / 3.0 * nf } else { 0.0 };
        let b2 = if self.order >= 3 {
            2857.0 / 2.0 - 5033.0 / 18.0 * nf + 325.0 / 54.0 * nf * nf
        } else {
            0.0
        };
        [b0, b1, b2]
    }

    fn rhs(b: &[f64; 3], a: f64) -> f64 {
        -a * a * (b[0] + a * (b[1] + a * b[2]))
    }

    /// αs(Q²).
    pub fn value(&self, q2: f64) -> f64 {
        let t_target = q2.ln();
        let mut a = self.a_ref;
        let mut t = self.t_ref;

        // Segment boundaries: thresholds crossed on the way, then the target.
        let mut stops: Vec<f64> = self
            .t_thresholds
            .iter()
            .copied()
            .filter(|&m| self.n_fixed_flavors == 0 && m > t.min(t_target) && m < t.max(t_target))
            .collect();
        if t_target < t {
            stops.sort_by(|p, q| q.total_cmp(p));
        } else {
            stops.sort_by(|p, q| p.total_cmp(q));
        }
        stops.push(t_target);

        for stop in stops {
            let span = stop - t;
            if span == 0.0 {
                continue;
            }
            let nf = self.nf_at(t + 0.5 * span);
            let b = self.beta(nf);
            let steps = (span.abs() / MAX_STEP).ceil().max(1.0) as usize;
            let h = span / steps as f64;
            for _ in 0..steps {
                let k1 = Self::rhs(&b, a);
                let k2 = Self::rhs(&b, a + 0.5 * h * k1);
                let k3 = Self::rhs(&b, a + 0.5 * h * k2);
                let k4 = Self::rhs(&b, a + h * k3);
                a += h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
            }
            t = stop;
        }
        4.0 * PI * a
    }
}
