//! WGS-84 geodetic positions and Earth rotation.

use crate::constants::{EARTH_ROTATION_RAD_S, WGS84_A_M, WGS84_B_M};
use crate::vector::{degrees_to_radians, Vector};

/// Converts a geodetic coordinate to ECEF on the WGS-84 ellipsoid.
pub fn geodetic_to_ecef(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Vector {
    let e2 = 1.0 - (WGS84_B_M * WGS84_B_M) / (WGS84_A_M * WGS84_A_M);
    let lat = degrees_to_radians(latitude_deg);
    let lon = degrees_to_radians(longitude_deg);

    let n = WGS84_A_M / (1.0 - e2 * lat.sin() * lat.sin()).sqrt();

    Vector::new(
        (n + altitude_m) * lat.cos() * lon.cos(),
        (n + altitude_m) * lat.cos() * lon.sin(),
        ((WGS84_B_M * WGS84_B_M) / (WGS84_A_M * WGS84_A_M) * n + altitude_m) * lat.sin(),
    )
}

/// Rotates an ECEF position about the z axis by the Earth rotation accrued
/// over `elapsed_s` seconds, yielding the ECI position.
pub fn rotate_with_earth(position: Vector, elapsed_s: f64) -> Vector {
    let theta = EARTH_ROTATION_RAD_S * elapsed_s;
    Vector::new(
        position.x * theta.cos() - position.y * theta.sin(),
        position.x * theta.sin() + position.y * theta.cos(),
        position.z,
    )
}

/// Ground-station position after `elapsed_s` seconds of simulation.
pub fn ground_position(latitude_deg: f64, longitude_deg: f64, elapsed_s: f64) -> Vector {
    rotate_with_earth(geodetic_to_ecef(latitude_deg, longitude_deg, 0.0), elapsed_s)
}
