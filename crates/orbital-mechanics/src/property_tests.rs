//! Property-based tests for the propagator.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use crate::kepler::KeplerianElements;

fn arb_elements() -> impl Strategy<Value = KeplerianElements> {
    (
        0.0f64..180.0,
        0.0f64..360.0,
        0.0f64..0.3,
        0.0f64..360.0,
        0.0f64..360.0,
        11.0f64..16.0,
    )
        .prop_map(|(incl, raan, ecc, argp, ma, mm)| {
            let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            KeplerianElements::new(incl, raan, ecc, argp, ma, mm, epoch)
        })
}

proptest! {
    /// Identical elements and time yield bit-identical positions.
    #[test]
    fn propagation_is_pure(elements in arb_elements(), offset_s in 0i64..604_800) {
        let t = elements.epoch + chrono::Duration::seconds(offset_s);
        prop_assert_eq!(elements.propagate(t), elements.propagate(t));
    }

    /// The orbit radius stays inside the ellipse bounds a(1-e)..a(1+e).
    #[test]
    fn radius_respects_ellipse_bounds(elements in arb_elements(), offset_s in 0i64..604_800) {
        let t = elements.epoch + chrono::Duration::seconds(offset_s);
        let r = elements.propagate(t).magnitude();
        let a = elements.semi_major_axis_m;
        let e = elements.eccentricity;
        prop_assert!(r >= a * (1.0 - e) - 1.0);
        prop_assert!(r <= a * (1.0 + e) + 1.0);
    }
}
