//! Distance milestone announcements.
//!
//! A milestone fires when the running total crosses a multiple of the
//! interval (500 m by default). The spoken cue carries the distance, the
//! smoothed pace and a motivational line chosen from how far the runner is
//! from goal pace.

use serde::{Deserialize, Serialize};

use crate::format::spoken_pace;

/// Default distance between announcements.
pub const DEFAULT_MILESTONE_INTERVAL_METERS: f64 = 500.0;

/// Returns true when a milestone boundary lies in `(last_announced, new_total]`.
///
/// Skipping several boundaries in one step still counts as a single firing.
///
/// ```
/// use pace_tracker::check_milestone;
/// assert!(check_milestone(520.0, 480.0, 500.0));
/// assert!(!check_milestone(520.0, 520.0, 500.0));
/// ```
pub fn check_milestone(
    new_total_meters: f64,
    last_announced_meters: f64,
    interval_meters: f64,
) -> bool {
    if !(interval_meters > 0.0) {
        return false;
    }
    (new_total_meters / interval_meters).floor() > (last_announced_meters / interval_meters).floor()
}

/// How the current pace compares with the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MotivationTier {
    /// More than 10 s/km faster than goal
    WellAhead,
    /// Up to 10 s/km faster than goal
    OnPace,
    /// Up to 10 s/km slower than goal
    SlightlyBehind,
    /// 10 s/km or more slower than goal
    PickUp,
}

impl MotivationTier {
    /// Classify `current_pace - goal_pace` (seconds per km; negative is faster).
    pub fn from_delta(delta_seconds_per_km: f64) -> Self {
        if delta_seconds_per_km < -10.0 {
            MotivationTier::WellAhead
        } else if delta_seconds_per_km < 0.0 {
            MotivationTier::OnPace
        } else if delta_seconds_per_km < 10.0 {
            MotivationTier::SlightlyBehind
        } else {
            MotivationTier::PickUp
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            MotivationTier::WellAhead => "You're well ahead of pace. Excellent work!",
            MotivationTier::OnPace => "You're on pace. Keep it up!",
            MotivationTier::SlightlyBehind => "You're slightly behind. Stay strong!",
            MotivationTier::PickUp => "Pick up the pace!",
        }
    }
}

/// A composed coaching cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Announcement {
    /// Distance covered, rounded to 0.1 km
    pub distance_km: f64,
    pub pace_seconds_per_km: f64,
    pub tier: MotivationTier,
    pub text: String,
}

impl Announcement {
    pub fn compose(total_distance_meters: f64, pace_seconds_per_km: f64, goal_pace_seconds_per_km: f64) -> Self {
        let distance_km = (total_distance_meters / 100.0).round() / 10.0;
        let tier = MotivationTier::from_delta(pace_seconds_per_km - goal_pace_seconds_per_km);
        let text = format!(
            "{:.1} kilometers. Current pace {} per kilometer. {}",
            distance_km,
            spoken_pace(pace_seconds_per_km),
            tier.phrase()
        );
        Self {
            distance_km,
            pace_seconds_per_km,
            tier,
            text,
        }
    }
}

/// Milestone edge detector bound to an interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnouncementTrigger {
    pub interval_meters: f64,
}

impl AnnouncementTrigger {
    pub fn new(interval_meters: f64) -> Self {
        Self { interval_meters }
    }

    /// Compose an announcement if a boundary was crossed and a pace reading
    /// exists. Without a reading the crossing stays pending: the caller's
    /// marker is not supposed to move, so the next tick fires instead.
    pub fn evaluate(
        &self,
        total_distance_meters: f64,
        last_announced_meters: f64,
        pace_seconds_per_km: Option<f64>,
        goal_pace_seconds_per_km: f64,
    ) -> Option<Announcement> {
        if !check_milestone(total_distance_meters, last_announced_meters, self.interval_meters) {
            return None;
        }
        let pace = pace_seconds_per_km?;
        Some(Announcement::compose(total_distance_meters, pace, goal_pace_seconds_per_km))
    }
}

impl Default for AnnouncementTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_MILESTONE_INTERVAL_METERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_crossing() {
        assert!(check_milestone(520.0, 480.0, 500.0));
        assert!(check_milestone(500.0, 499.9, 500.0));
        assert!(!check_milestone(499.9, 0.0, 500.0));
    }

    #[test]
    fn test_no_refire_without_progress() {
        assert!(check_milestone(520.0, 480.0, 500.0));
        // Marker moved to the actual total after firing
        assert!(!check_milestone(520.0, 520.0, 500.0));
        assert!(!check_milestone(990.0, 520.0, 500.0));
        assert!(check_milestone(1001.0, 520.0, 500.0));
    }

    #[test]
    fn test_skipped_boundaries_fire_once() {
        // 400 -> 1600 skips 500, 1000 and 1500; one firing per call
        assert!(check_milestone(1600.0, 400.0, 500.0));
        assert!(!check_milestone(1600.0, 1600.0, 500.0));
    }

    #[test]
    fn test_invalid_interval_never_fires() {
        assert!(!check_milestone(1000.0, 0.0, 0.0));
        assert!(!check_milestone(1000.0, 0.0, -5.0));
        assert!(!check_milestone(1000.0, 0.0, f64::NAN));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(MotivationTier::from_delta(-30.0), MotivationTier::WellAhead);
        assert_eq!(MotivationTier::from_delta(-10.0), MotivationTier::OnPace);
        assert_eq!(MotivationTier::from_delta(-0.5), MotivationTier::OnPace);
        assert_eq!(MotivationTier::from_delta(0.0), MotivationTier::SlightlyBehind);
        assert_eq!(MotivationTier::from_delta(9.9), MotivationTier::SlightlyBehind);
        assert_eq!(MotivationTier::from_delta(10.0), MotivationTier::PickUp);
    }

    #[test]
    fn test_compose_message() {
        let a = Announcement::compose(1_040.0, 330.0, 345.0);
        assert_eq!(a.distance_km, 1.0);
        assert_eq!(a.tier, MotivationTier::WellAhead);
        assert_eq!(
            a.text,
            "1.0 kilometers. Current pace 5 minutes 30 seconds per kilometer. \
             You're well ahead of pace. Excellent work!"
        );
    }

    #[test]
    fn test_evaluate_needs_pace() {
        let trigger = AnnouncementTrigger::default();
        assert!(trigger.evaluate(520.0, 480.0, None, 300.0).is_none());

        let a = trigger.evaluate(520.0, 480.0, Some(320.0), 300.0).unwrap();
        assert_eq!(a.tier, MotivationTier::PickUp);
        assert_eq!(a.distance_km, 0.5);

        assert!(trigger.evaluate(520.0, 520.0, Some(320.0), 300.0).is_none());
    }
}
