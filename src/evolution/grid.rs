use crate::config::{EvolutionConfig, GridConfig};
use crate::error::{PfError, PfResult};
use tracing::debug;

/// Resolved grid: x nodes in u = ln(1/x) and Q² nodes in t = ln Q², both ascending.
///
/// `u[0] = 0` is the x = 1 end point; `u[nx-1]` is the smallest x.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub u: Vec<f64>,
    pub x: Vec<f64>,
    pub t: Vec<f64>,
    pub q2: Vec<f64>,
    /// Grid index closest to the input scale.
    pub iq0: usize,
    pub interpolation_order: usize,
    /// Fixed flavour number, or 0 when thresholds apply.
    pub n_fixed_flavors: usize,
    pub thresholds_q2: [f64; 3],
}

impl GridLayout {
    pub fn build(grid: &GridConfig, evolution: &EvolutionConfig) -> PfResult<Self> {
        grid.validate()?;
        evolution.validate(grid)?;

        // x regions in u, ordered from x = 1 downwards.
        let mut u_edges = vec![0.0];
        let mut u_weights = Vec::with_capacity(grid.x_min.len());
        for (x, w) in grid.x_min.iter().zip(grid.x_weights.iter()).rev() {
            u_edges.push((1.0 / x).ln());
            u_weights.push(*w);
        }
        let u = distribute(&u_edges, &u_weights, grid.nx)?;
        let x: Vec<f64> = u.iter().map(|v| (-v).exp()).collect();

        let t_edges: Vec<f64> = grid.q2_edges.iter().map(|q| q.ln()).collect();
        let t = distribute(&t_edges, &grid.q2_weights, grid.nq)?;
        let q2: Vec<f64> = t.iter().map(|v| v.exp()).collect();

        let t0 = evolution.q0.ln();
        let iq0 = t
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - t0).abs().total_cmp(&(b.1 - t0).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);

        debug!(
            "Grid: {} x nodes down to x={:.3e}, {} Q2 nodes in [{}, {}], iq0={}",
            x.len(),
            x.last().copied().unwrap_or(f64::NAN),
            q2.len(),
            grid.q2_min(),
            grid.q2_max(),
            iq0
        );

        Ok(Self {
            u,
            x,
            t,
            q2,
            iq0,
            interpolation_order: grid.interpolation_order,
            n_fixed_flavors: evolution.n_fixed_flavors as usize,
            thresholds_q2: evolution.thresholds_q2,
        })
    }

    pub fn nx(&self) -> usize {
        self.u.len()
    }

    pub fn nq(&self) -> usize {
        self.t.len()
    }

    /// Active flavours at a scale.
    pub fn nf_at(&self, q2: f64) -> usize {
        if self.n_fixed_flavors > 0 {
            return self.n_fixed_flavors;
        }
        3 + self.thresholds_q2.iter().filter(|&&m2| q2 >= m2).count()
    }

    /// Lower node of the Q² interval holding `t`, clamped to the grid.
    pub fn locate_t(&self, t: f64) -> usize {
        locate(&self.t, t)
    }
}

pub(crate) fn locate(nodes: &[f64], v: f64) -> usize {
    let n = nodes.len();
    if n < 2 {
        return 0;
    }
    let k = nodes.partition_point(|&a| a <= v);
    k.saturating_sub(1).min(n - 2)
}

/// Places `n` nodes over the regions bounded by `edges`, with the number of
/// intervals in each region proportional to its length times its weight.
fn distribute(edges: &[f64], weights: &[f64], n: usize) -> PfResult<Vec<f64>> {
    let regions = weights.len();
    let intervals = n - 1;
    if intervals < regions {
        return Err(PfError::Config(format!(
            "{} points cannot cover {} regions",
            n, regions
        )));
    }

    let lengths: Vec<f64> = edges.windows(2).map(|w| w[1] - w[0]).collect();
    let total: f64 = lengths.iter().zip(weights).map(|(l, w)| l * w).sum();
    let share: Vec<f64> = lengths
        .iter()
        .zip(weights)
        .map(|(l, w)| intervals as f64 * l * w / total)
        .collect();
    let mut count: Vec<usize> = share.iter().map(|s| (s.floor() as usize).max(1)).collect();

    // Largest remainder, never dropping a region below one interval.
    loop {
        let assigned: usize = count.iter().sum();
        if assigned == intervals {
            break;
        }
        if assigned < intervals {
            let k = (0..regions)
                .max_by(|&a, &b| {
                    (share[a] - count[a] as f64).total_cmp(&(share[b] - count[b] as f64))
                })
                .unwrap_or(0);
            count[k] += 1;
        } else {
            let k = (0..regions)
                .filter(|&r| count[r] > 1)
                .max_by(|&a, &b| {
                    (count[a] as f64 - share[a]).total_cmp(&(count[b] as f64 - share[b]))
                })
                .ok_or_else(|| PfError::Config("cannot balance grid regions".into()))?;
            count[k] -= 1;
        }
    }

    let mut nodes = Vec::with_capacity(n);
    nodes.push(edges[0]);
    for (r, &m) in count.iter().enumerate() {
        let step = lengths[r] / m as f64;
        for j in 1..=m {
            nodes.push(if j == m {
                edges[r + 1]
            } else {
                edges[r] + step * j as f64
            });
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_layout() {
        let layout =
            GridLayout::build(&GridConfig::default(), &EvolutionConfig::default()).unwrap();
        assert_eq!(layout.nx(), 100);
        assert_eq!(layout.nq(), 50);
        assert_eq!(layout.u[0], 0.0);
        assert!((layout.x[99] - 1e-3).abs() < 1e-12);
        assert!((layout.q2[0] - 100.0).abs() < 1e-9);
        assert!((layout.q2[49] - 3e4).abs() < 1e-6);
        assert_eq!(layout.iq0, 0);
        assert!(layout.u.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_region_weights_shape_density() {
        let layout =
            GridLayout::build(&GridConfig::default(), &EvolutionConfig::default()).unwrap();
        // Spacing above x = 0.1 (weight 2) is finer than below (weight 1).
        let fine = layout.u[1] - layout.u[0];
        let coarse = layout.u[99] - layout.u[98];
        assert!(fine < coarse);
    }

    #[test]
    fn test_variable_flavours() {
        let layout =
            GridLayout::build(&GridConfig::default(), &EvolutionConfig::default()).unwrap();
        assert_eq!(layout.nf_at(100.0), 5);
        assert_eq!(layout.nf_at(3e4), 6);
        assert_eq!(layout.nf_at(2.0), 3);
    }

    #[test]
    fn test_thresholds_are_scales_not_indices() {
        let evolution = EvolutionConfig {
            thresholds_q2: [150.0, 500.0, 5000.0],
            ..EvolutionConfig::default()
        };
        let layout = GridLayout::build(&GridConfig::default(), &evolution).unwrap();
        assert_eq!(layout.nf_at(120.0), 3);
        assert_eq!(layout.nf_at(150.0), 4);
        assert_eq!(layout.nf_at(1000.0), 5);
        assert_eq!(layout.nf_at(1e4), 6);
    }

    #[test]
    fn test_locate_clamps() {
        let nodes = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(locate(&nodes, -1.0), 0);
        assert_eq!(locate(&nodes, 1.5), 1);
        assert_eq!(locate(&nodes, 3.0), 2);
        assert_eq!(locate(&nodes, 9.0), 2);
    }
}
