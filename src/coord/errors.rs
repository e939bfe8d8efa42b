//! Coordinate transform errors

use thiserror::Error;

/// Result type for coordinate operations
pub type CoordResult<T> = Result<T, CoordError>;

/// Errors produced while validating a coordinate specification
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Cone search unit not in the supported set
    #[error("unknown cone search unit '{0}', must be one of deg, rad, arcmin, arcsec")]
    UnknownUnit(String),

    /// Input could not be read as an ra/dec specification
    #[error("unrecognized ra/dec format: {0}")]
    BadFormat(String),

    /// A coordinate pair did not have exactly two elements
    #[error("coordinate pair must have exactly two elements, got {0}")]
    BadPair(usize),

    /// A coordinate parsed to NaN or infinity
    #[error("coordinate value is not finite: {0}")]
    NonFinite(String),

    /// Right ascension outside [0, 360) degrees
    #[error("right ascension {0} out of range [0, 360)")]
    RaOutOfRange(f64),

    /// Declination outside [-90, 90] degrees
    #[error("declination {0} out of range [-90, 90]")]
    DecOutOfRange(f64),
}
