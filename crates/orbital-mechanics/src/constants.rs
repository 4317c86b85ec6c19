//! Physics constants shared across the simulation.

/// Earth's gravitational parameter in m^3/s^2.
pub const MU: f64 = 3.986_004_418e14;

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_000.0;

/// Earth's rotation speed in radians per second.
pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115_10e-5;

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_000.0;

/// Maximal distance at which two satellites can hold an ISL, in meters.
pub const MAX_ISL_DISTANCE_M: f64 = EARTH_RADIUS_M / 3.0;

/// Semi-major axis assumed for every LEO satellite, in meters.
///
/// The TLE mean motion is kept for the anomaly rate, but the orbit radius is
/// pinned to this value. `KeplerianElements::with_derived_semi_major_axis`
/// derives the radius from the mean motion instead.
pub const SEMI_MAJOR_AXIS_M: f64 = 6_790_000.0;

/// WGS-84 ellipsoid semi-major axis in meters.
pub const WGS84_A_M: f64 = 6_378_137.0;

/// WGS-84 ellipsoid semi-minor axis in meters.
pub const WGS84_B_M: f64 = 6_356_752.314_245;
