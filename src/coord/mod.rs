//! # Coordinate Transform
//!
//! Parses right-ascension/declination specifications in their several
//! textual and numeric forms, converts angular units, and emits the
//! canonical geospatial representation used to build cone search
//! predicates: `[lon, lat]` in radians, lon in [0, 2π), lat in
//! [-π/2, π/2].

pub mod distance;
pub mod errors;
pub mod parse;

pub use distance::{great_circle_distance, nearest_match};
pub use errors::{CoordError, CoordResult};
pub use parse::{deg2dms, deg2hms, parse_coordinates, ConeSearchUnit, SkyCoord};
