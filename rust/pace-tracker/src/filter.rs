//! GPS signal filtering.
//!
//! Fixes with NaN or out-of-range coordinates are dropped before anything
//! else. Two gates then decide whether a fix contributes distance:
//! - **Accuracy**: fixes with a large reported error radius are dropped and
//!   never become the reference point.
//! - **Jitter**: movement smaller than the minimum step since the last
//!   reference is treated as noise. The fix is discarded entirely, so slow
//!   drift cannot sneak in through many tiny increments. Genuinely slow
//!   movement is under-counted as a consequence.

use crate::geo_utils::haversine_distance;
use crate::{GpsFix, TrackerConfig};

/// Why a fix was or wasn't credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// First fix with no reference to compare against; zero distance
    Reference,
    /// Passed both gates; distance credited
    Credited,
    /// Latitude/longitude not finite or out of range
    InvalidRejected,
    /// Accuracy radius above the threshold
    InaccurateRejected,
    /// Moved less than the jitter threshold
    JitterRejected,
}

/// Result of running one fix through the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOutcome {
    /// The fix becomes the new reference point
    pub accepted: bool,
    /// Distance to add to the running total (0 unless credited)
    pub distance_increment_meters: f64,
    pub verdict: FilterVerdict,
}

impl FilterOutcome {
    fn rejected(verdict: FilterVerdict) -> Self {
        Self {
            accepted: false,
            distance_increment_meters: 0.0,
            verdict,
        }
    }
}

/// Accuracy + jitter gate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFilter {
    pub max_accuracy_meters: f64,
    pub min_distance_meters: f64,
}

impl SignalFilter {
    pub fn new(max_accuracy_meters: f64, min_distance_meters: f64) -> Self {
        Self {
            max_accuracy_meters,
            min_distance_meters,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.max_accuracy_meters, config.min_distance_meters)
    }

    /// Run `fix` through both gates against the last accepted fix.
    pub fn accept(&self, fix: &GpsFix, previous: Option<&GpsFix>) -> FilterOutcome {
        if !fix.point().is_valid() {
            return FilterOutcome::rejected(FilterVerdict::InvalidRejected);
        }

        // NaN accuracy fails the comparison below, so test for the pass case
        if !(fix.accuracy_meters <= self.max_accuracy_meters) {
            return FilterOutcome::rejected(FilterVerdict::InaccurateRejected);
        }

        let Some(previous) = previous else {
            return FilterOutcome {
                accepted: true,
                distance_increment_meters: 0.0,
                verdict: FilterVerdict::Reference,
            };
        };

        let d = haversine_distance(previous, fix);
        if d >= self.min_distance_meters {
            FilterOutcome {
                accepted: true,
                distance_increment_meters: d,
                verdict: FilterVerdict::Credited,
            }
        } else {
            FilterOutcome::rejected(FilterVerdict::JitterRejected)
        }
    }
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::EARTH_RADIUS_METERS;

    /// Meters of latitude per degree on the tracker's sphere.
    fn meters_to_lat(m: f64) -> f64 {
        (m / EARTH_RADIUS_METERS).to_degrees()
    }

    fn fix_at(north_m: f64, accuracy: f64) -> GpsFix {
        GpsFix::new(meters_to_lat(north_m), 0.0, 0, accuracy)
    }

    #[test]
    fn test_first_fix_is_reference() {
        let filter = SignalFilter::new(20.0, 3.0);
        let outcome = filter.accept(&fix_at(0.0, 5.0), None);
        assert!(outcome.accepted);
        assert_eq!(outcome.distance_increment_meters, 0.0);
        assert_eq!(outcome.verdict, FilterVerdict::Reference);
    }

    #[test]
    fn test_inaccurate_fix_rejected() {
        let filter = SignalFilter::new(20.0, 3.0);
        let prev = fix_at(0.0, 5.0);

        let outcome = filter.accept(&fix_at(50.0, 25.0), Some(&prev));
        assert!(!outcome.accepted);
        assert_eq!(outcome.distance_increment_meters, 0.0);
        assert_eq!(outcome.verdict, FilterVerdict::InaccurateRejected);

        // Even without a reference, a bad first fix is not taken
        let outcome = filter.accept(&fix_at(0.0, 25.0), None);
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let filter = SignalFilter::new(20.0, 3.0);
        let prev = fix_at(0.0, 5.0);

        for bad in [
            GpsFix::new(f64::NAN, 0.0, 0, 5.0),
            GpsFix::new(0.0, f64::NAN, 0, 5.0),
            GpsFix::new(91.0, 0.0, 0, 5.0),
            GpsFix::new(0.0, -181.0, 0, 5.0),
        ] {
            // Never a reference, never credited
            let outcome = filter.accept(&bad, None);
            assert!(!outcome.accepted);
            assert_eq!(outcome.verdict, FilterVerdict::InvalidRejected);

            let outcome = filter.accept(&bad, Some(&prev));
            assert!(!outcome.accepted);
            assert_eq!(outcome.distance_increment_meters, 0.0);
        }
    }

    #[test]
    fn test_accuracy_at_threshold_passes() {
        let filter = SignalFilter::new(20.0, 3.0);
        assert!(filter.accept(&fix_at(0.0, 20.0), None).accepted);
    }

    #[test]
    fn test_nan_accuracy_rejected() {
        let filter = SignalFilter::new(20.0, 3.0);
        let outcome = filter.accept(&fix_at(0.0, f64::NAN), None);
        assert_eq!(outcome.verdict, FilterVerdict::InaccurateRejected);
    }

    #[test]
    fn test_jitter_rejected() {
        let filter = SignalFilter::new(20.0, 3.0);
        let prev = fix_at(0.0, 5.0);
        let outcome = filter.accept(&fix_at(2.0, 5.0), Some(&prev));
        assert!(!outcome.accepted);
        assert_eq!(outcome.verdict, FilterVerdict::JitterRejected);
    }

    #[test]
    fn test_movement_credited() {
        let filter = SignalFilter::new(20.0, 3.0);
        let prev = fix_at(0.0, 5.0);
        let outcome = filter.accept(&fix_at(4.0, 5.0), Some(&prev));
        assert!(outcome.accepted);
        assert_eq!(outcome.verdict, FilterVerdict::Credited);
        assert!((outcome.distance_increment_meters - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_increment_sequence_sums_only_credited() {
        // Steps of 1, 4, 2, 6 m measured from the current reference
        let filter = SignalFilter::new(20.0, 3.0);
        let positions = [0.0, 1.0, 4.0, 6.0, 10.0];
        let mut reference: Option<GpsFix> = None;
        let mut total = 0.0;

        for north in positions {
            let fix = fix_at(north, 5.0);
            let outcome = filter.accept(&fix, reference.as_ref());
            if outcome.accepted {
                total += outcome.distance_increment_meters;
                reference = Some(fix);
            }
        }

        // 0 -> 1 jitter, 0 -> 4 credited, 4 -> 6 jitter, 4 -> 10 credited
        assert!((total - 10.0).abs() < 1e-6, "got {}", total);
    }
}
