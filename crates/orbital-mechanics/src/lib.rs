//! Orbital Mechanics Library
//!
//! Keplerian propagation, WGS-84 geodetic transforms, and TLE parsing for
//! LEO constellation simulation. Satellites are propagated directly in the
//! ECI frame; ground stations are converted to ECEF and rotated with the
//! Earth into the same frame.

use thiserror::Error;

pub mod constants;
pub mod geodetic;
pub mod kepler;
#[cfg(test)]
mod property_tests;
pub mod tle;
pub mod vector;
pub mod walker;

pub use kepler::KeplerianElements;
pub use tle::TleRecord;
pub use vector::Vector;

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Invalid epoch: {0}")]
    InvalidEpoch(String),
    #[error("I/O error reading orbital data: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;
