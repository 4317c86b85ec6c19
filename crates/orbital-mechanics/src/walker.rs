//! Walker Delta constellation generation.
//!
//! Produces the Keplerian elements of an evenly phased `T/P/F` shell:
//! `planes` orbital planes spread over 360 degrees of RAAN, satellites
//! evenly spaced in mean anomaly within each plane, and a phase offset of
//! `phasing * 360 / total` degrees between adjacent planes.

use std::f64::consts::PI;

use chrono::{DateTime, Utc};

use crate::constants::{EARTH_RADIUS_M, MU};
use crate::kepler::KeplerianElements;

#[derive(Debug, Clone)]
pub struct WalkerDelta {
    pub total_satellites: u32,
    pub planes: u32,
    pub phasing: u32,
    pub altitude_m: f64,
    pub inclination_deg: f64,
}

impl WalkerDelta {
    pub fn satellites_per_plane(&self) -> u32 {
        self.total_satellites / self.planes
    }

    pub fn plane_spacing_deg(&self) -> f64 {
        360.0 / self.planes as f64
    }

    pub fn in_plane_spacing_deg(&self) -> f64 {
        360.0 / self.satellites_per_plane() as f64
    }

    pub fn semi_major_axis_m(&self) -> f64 {
        EARTH_RADIUS_M + self.altitude_m
    }

    /// Mean motion in revolutions per day for the shell altitude.
    pub fn mean_motion_rev_day(&self) -> f64 {
        let a = self.semi_major_axis_m();
        let n_rad_s = (MU / (a * a * a)).sqrt();
        n_rad_s * 86_400.0 / (2.0 * PI)
    }

    /// Elements for every slot, named `<prefix>-<plane>-<slot>`. The orbit
    /// radius is pinned to the shell altitude rather than the LEO default.
    pub fn generate_elements(
        &self,
        prefix: &str,
        epoch: DateTime<Utc>,
    ) -> Vec<(String, KeplerianElements)> {
        let sats_per_plane = self.satellites_per_plane();
        let plane_spacing = self.plane_spacing_deg();
        let in_plane_spacing = self.in_plane_spacing_deg();
        let phase_offset = self.phasing as f64 * 360.0 / self.total_satellites as f64;
        let mean_motion = self.mean_motion_rev_day();

        let mut shell = Vec::with_capacity(self.total_satellites as usize);
        for plane in 0..self.planes {
            let raan = plane as f64 * plane_spacing;
            for slot in 0..sats_per_plane {
                let mean_anomaly =
                    (slot as f64 * in_plane_spacing + plane as f64 * phase_offset) % 360.0;
                let mut elements = KeplerianElements::new(
                    self.inclination_deg,
                    raan,
                    0.0,
                    0.0,
                    mean_anomaly,
                    mean_motion,
                    epoch,
                );
                elements.semi_major_axis_m = self.semi_major_axis_m();
                shell.push((format!("{prefix}-{plane}-{slot}"), elements));
            }
        }
        shell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn shell() -> WalkerDelta {
        WalkerDelta {
            total_satellites: 12,
            planes: 3,
            phasing: 1,
            altitude_m: 550_000.0,
            inclination_deg: 53.0,
        }
    }

    #[test]
    fn spacing_follows_the_walker_pattern() {
        let walker = shell();
        assert_eq!(walker.satellites_per_plane(), 4);
        assert_eq!(walker.plane_spacing_deg(), 120.0);
        assert_eq!(walker.in_plane_spacing_deg(), 90.0);
    }

    #[test]
    fn generates_one_element_set_per_slot() {
        let walker = shell();
        let elements = walker.generate_elements("LEO", epoch());
        assert_eq!(elements.len(), 12);
        assert_eq!(elements[0].0, "LEO-0-0");
        assert_eq!(elements[11].0, "LEO-2-3");

        // Second plane is rotated in RAAN and phased in mean anomaly.
        let (_, first_plane) = &elements[0];
        let (_, second_plane) = &elements[4];
        assert_eq!(first_plane.raan_deg, 0.0);
        assert_eq!(second_plane.raan_deg, 120.0);
        assert_eq!(second_plane.mean_anomaly_deg, 30.0);
    }

    #[test]
    fn mean_motion_matches_the_shell_altitude() {
        // ~550 km is the Starlink regime, just over 15 revolutions per day.
        let mean_motion = shell().mean_motion_rev_day();
        assert!(mean_motion > 15.0 && mean_motion < 15.7, "{mean_motion}");
    }

    #[test]
    fn generated_satellites_orbit_at_shell_radius() {
        let walker = shell();
        for (_, elements) in walker.generate_elements("LEO", epoch()) {
            let radius = elements.propagate(epoch()).magnitude();
            assert!((radius - walker.semi_major_axis_m()).abs() < 1.0);
        }
    }
}
