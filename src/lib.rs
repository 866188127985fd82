//! Forward model from parton-density parameters to predicted DIS detector
//! counts, and the Poisson likelihood that lets a sampler drive it.

pub mod binning;
pub mod config;
pub mod consts;
pub mod error;
pub mod evolution;
pub mod forward;
pub mod likelihood;
pub mod numeric;
pub mod pdf;
pub mod sampler;
pub mod spline;
pub mod structure;
pub mod xsec;

pub use error::{PfError, PfResult};
pub use forward::{ForwardModel, ForwardModelParams, PredictedCounts};
pub use likelihood::{LogDensity, ObservedCounts, PoissonLikelihood};
pub use pdf::{Parton, PdfParameters};
