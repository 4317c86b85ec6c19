//! Keplerian two-body propagation.
//!
//! Positions are derived deterministically from the orbital elements and the
//! simulation time: identical inputs produce bit-identical vectors, which the
//! link protocols rely on for their position-keyed caches.

use chrono::{DateTime, Utc};
use std::f64::consts::PI;

use crate::constants::{MU, SEMI_MAJOR_AXIS_M};
use crate::vector::{degrees_to_radians, Vector};

const KEPLER_TOLERANCE: f64 = 1e-6;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Classical orbital elements as read from a TLE record.
///
/// Angles are kept in degrees as parsed; the radian forms used by the
/// propagator are precomputed once at construction.
#[derive(Debug, Clone)]
pub struct KeplerianElements {
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub arg_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    /// Revolutions per solar day (TLE convention).
    pub mean_motion_rev_day: f64,
    pub epoch: DateTime<Utc>,
    pub semi_major_axis_m: f64,

    inclination_rad: f64,
    raan_rad: f64,
    arg_perigee_rad: f64,
    mean_anomaly_rad: f64,
}

impl KeplerianElements {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inclination_deg: f64,
        raan_deg: f64,
        eccentricity: f64,
        arg_perigee_deg: f64,
        mean_anomaly_deg: f64,
        mean_motion_rev_day: f64,
        epoch: DateTime<Utc>,
    ) -> Self {
        Self {
            inclination_deg,
            raan_deg,
            eccentricity,
            arg_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_day,
            epoch,
            semi_major_axis_m: SEMI_MAJOR_AXIS_M,
            inclination_rad: degrees_to_radians(inclination_deg),
            raan_rad: degrees_to_radians(raan_deg),
            arg_perigee_rad: degrees_to_radians(arg_perigee_deg),
            mean_anomaly_rad: degrees_to_radians(mean_anomaly_deg),
        }
    }

    /// Replaces the fixed LEO semi-major axis with `a = (mu / n^2)^(1/3)`
    /// derived from the mean motion.
    pub fn with_derived_semi_major_axis(mut self) -> Self {
        let n_rad_s = self.mean_motion_rad_s();
        self.semi_major_axis_m = (MU / (n_rad_s * n_rad_s)).cbrt();
        self
    }

    /// Mean motion in radians per second.
    fn mean_motion_rad_s(&self) -> f64 {
        self.mean_motion_rev_day * 2.0 * PI / SECONDS_PER_DAY
    }

    /// Position in the ECI frame at the given simulation time.
    pub fn propagate(&self, sim_time: DateTime<Utc>) -> Vector {
        let delta_t = (sim_time - self.epoch).num_milliseconds() as f64 / 1_000.0;
        let mean_anomaly = normalize_angle(self.mean_anomaly_rad + self.mean_motion_rad_s() * delta_t);
        let eccentric_anomaly = solve_keplers_equation(mean_anomaly, self.eccentricity);
        let true_anomaly = compute_true_anomaly(eccentric_anomaly, self.eccentricity);

        let radius = self.semi_major_axis_m * (1.0 - self.eccentricity * eccentric_anomaly.cos());
        let xp = radius * true_anomaly.cos();
        let yp = radius * true_anomaly.sin();

        perifocal_to_eci(xp, yp, self.inclination_rad, self.arg_perigee_rad, self.raan_rad)
    }
}

/// Wraps an angle in radians into [0, 2*pi).
fn normalize_angle(rad: f64) -> f64 {
    rad.rem_euclid(2.0 * PI)
}

/// Newton-Raphson solve of `E - e*sin(E) = M` for the eccentric anomaly.
/// Converges for any e < 1.
fn solve_keplers_equation(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut e_anom = mean_anomaly;
    let mut delta = 1.0_f64;
    while delta.abs() > KEPLER_TOLERANCE {
        delta = (e_anom - eccentricity * e_anom.sin() - mean_anomaly)
            / (1.0 - eccentricity * e_anom.cos());
        e_anom -= delta;
    }
    e_anom
}

fn compute_true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let sqrt_1me2 = (1.0 - eccentricity * eccentricity).sqrt();
    (sqrt_1me2 * eccentric_anomaly.sin()).atan2(eccentric_anomaly.cos() - eccentricity)
}

/// Rotates perifocal coordinates into ECI by the composite
/// RAAN * inclination * argument-of-perigee rotation.
fn perifocal_to_eci(x: f64, y: f64, incl_rad: f64, arg_p_rad: f64, raan_rad: f64) -> Vector {
    let cos_raan = raan_rad.cos();
    let sin_raan = raan_rad.sin();
    let cos_incl = incl_rad.cos();
    let sin_incl = incl_rad.sin();
    let cos_arg_p = arg_p_rad.cos();
    let sin_arg_p = arg_p_rad.sin();

    let x_eci = (cos_raan * cos_arg_p - sin_raan * sin_arg_p * cos_incl) * x
        + (-cos_raan * sin_arg_p - sin_raan * cos_arg_p * cos_incl) * y;
    let y_eci = (sin_raan * cos_arg_p + cos_raan * sin_arg_p * cos_incl) * x
        + (-sin_raan * sin_arg_p + cos_raan * cos_arg_p * cos_incl) * y;
    let z_eci = sin_incl * sin_arg_p * x + sin_incl * cos_arg_p * y;

    Vector::new(x_eci, y_eci, z_eci)
}
