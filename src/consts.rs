/// Number of parton species tracked by the evolution (t̄ … t).
pub const PARTON_COUNT: usize = 13;

/// Number of momentum-carrying weights in θ (uv, dv, g1, g2, ū, d̄, s, c, b).
pub const THETA_LEN: usize = 9;

/// Z boson mass in GeV.
pub const M_Z: f64 = 91.1876;

/// Weak mixing angle, sin²θ_W.
pub const SIN2_THETA_W: f64 = 0.2315;

/// Fine-structure constant at low scale.
pub const ALPHA_EM: f64 = 7.297_352_57e-3;

/// Conversion from GeV⁻² to picobarn.
pub const GEV2_TO_PB: f64 = 0.389_379_4e9;

/// HERA centre-of-mass energy in GeV.
pub const DEFAULT_SQRT_S: f64 = 318.0;

/// Default ε above which an evolution is flagged as inaccurate.
pub const DEFAULT_EPSILON_THRESHOLD: f64 = 0.05;

/// Tolerance on Σθ = 1.
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

// === QCD colour factors ===
pub const C_F: f64 = 4.0 / 3.0;
pub const C_A: f64 = 3.0;
pub const T_R: f64 = 0.5;

// === Quark masses used for flavour thresholds (GeV) ===
pub const MASS_CHARM: f64 = 1.43;
pub const MASS_BOTTOM: f64 = 4.3;
pub const MASS_TOP: f64 = 172.5;
