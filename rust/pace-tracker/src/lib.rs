//! # Pace Tracker
//!
//! Real-time run tracking core: turns a noisy stream of GPS fixes into a
//! trustworthy distance, a smoothed pace and spoken coaching cues, and keeps
//! a local history of finished runs.
//!
//! This library provides:
//! - Haversine geodesy
//! - A two-gate GPS signal filter (accuracy + jitter)
//! - A rolling pace estimator
//! - The run session state machine (idle → setup → running ⇄ paused → finished)
//! - Milestone announcements
//! - A fault-tolerant run history over any key-value store
//!
//! ## Features
//!
//! - **`persistence`** - SQLite-backed key-value store
//! - **`runtime`** - tokio driver feeding GPS fixes and timer ticks into one session task
//! - **`ffi`** - FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use pace_tracker::{GpsFix, RunConfig, RunSession, TrackerConfig};
//! use pace_tracker::platform::{Collaborators, ManualClock};
//!
//! let clock = ManualClock::new(0);
//! let mut session = RunSession::new(
//!     TrackerConfig::default(),
//!     Collaborators::headless(clock.clone()),
//! );
//!
//! session.begin_setup().unwrap();
//! session.start(RunConfig::new(330.0, 5.0)).unwrap();
//!
//! clock.advance_ms(30_000);
//! session.on_timer_tick();
//! assert_eq!(session.elapsed_seconds(), 30);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Geographic utilities (haversine distance)
pub mod geo_utils;

// GPS accuracy + jitter gates
pub mod filter;
pub use filter::{FilterOutcome, FilterVerdict, SignalFilter};

// Rolling pace estimate
pub mod pace;
pub use pace::{PaceEstimator, PaceWindow};

// Milestone detection and coaching messages
pub mod announce;
pub use announce::{check_milestone, Announcement, MotivationTier};

// Display formatting (pace, durations, distances)
pub mod format;

// Collaborator seams (location, voice, wake lock, clock, storage)
pub mod platform;

// Run lifecycle state machine
pub mod session;
pub use session::{GpsStatus, RunSession, RunState, RunSummary, SessionSnapshot};

// Key-value store backends
pub mod store;
pub use store::{JsonFileStore, MemoryStore};
#[cfg(feature = "persistence")]
pub use store::SqliteStore;

// Saved run history
pub mod history;
pub use history::{HistoryStats, RunHistory, SavedRun};

// Async event driver
#[cfg(feature = "runtime")]
pub mod driver;
#[cfg(feature = "runtime")]
pub use driver::{DriverEvent, SessionCommand, SessionDriver};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PaceTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Anything with a latitude and longitude in degrees.
pub trait HasCoordinates {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use pace_tracker::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl HasCoordinates for GpsPoint {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// One location sample as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Reported horizontal accuracy radius in meters
    pub accuracy_meters: f64,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            accuracy_meters,
        }
    }

    /// Position without timing and accuracy.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

impl HasCoordinates for GpsFix {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Fastest goal pace accepted from the setup form (1:00 /km).
pub const MIN_GOAL_PACE_SECONDS_PER_KM: f64 = 60.0;

/// Smallest target distance accepted from the setup form.
pub const MIN_TARGET_DISTANCE_KM: f64 = 0.1;

/// Goal and target for one run, captured when the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RunConfig {
    pub goal_pace_seconds_per_km: f64,
    pub target_distance_km: f64,
}

impl RunConfig {
    /// Create a run config, clamping out-of-range values to the minimums.
    pub fn new(goal_pace_seconds_per_km: f64, target_distance_km: f64) -> Self {
        Self {
            goal_pace_seconds_per_km: clamp_min(goal_pace_seconds_per_km, MIN_GOAL_PACE_SECONDS_PER_KM),
            target_distance_km: clamp_min(target_distance_km, MIN_TARGET_DISTANCE_KM),
        }
    }

    /// Build a config from the raw setup-form fields.
    ///
    /// Unparseable input counts as zero and is then clamped like any other
    /// out-of-range value; this never fails.
    ///
    /// ```
    /// use pace_tracker::RunConfig;
    /// let cfg = RunConfig::from_form("5", "30", "10");
    /// assert_eq!(cfg.goal_pace_seconds_per_km, 330.0);
    /// assert_eq!(cfg.target_distance_km, 10.0);
    /// ```
    pub fn from_form(pace_minutes: &str, pace_seconds: &str, target_distance_km: &str) -> Self {
        let minutes = parse_or_zero(pace_minutes).max(0.0).trunc();
        let seconds = parse_or_zero(pace_seconds).clamp(0.0, 59.0).trunc();
        Self::new(minutes * 60.0 + seconds, parse_or_zero(target_distance_km))
    }

    /// Target distance in meters.
    pub fn target_distance_meters(&self) -> f64 {
        self.target_distance_km * 1000.0
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        // 6:00 /km over 5 km
        Self::new(360.0, 5.0)
    }
}

fn clamp_min(value: f64, min: f64) -> f64 {
    if value.is_finite() {
        value.max(min)
    } else {
        min
    }
}

fn parse_or_zero(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Tunable thresholds for the tracking pipeline.
///
/// Every field has a default, so a partial JSON document is enough to
/// override a single threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackerConfig {
    /// Fixes reporting a worse accuracy radius are dropped outright.
    /// Default: 20.0 meters
    pub max_accuracy_meters: f64,

    /// Movement below this between fixes is treated as GPS jitter.
    /// Default: 3.0 meters
    pub min_distance_meters: f64,

    /// Distance between coaching announcements.
    /// Default: 500.0 meters
    pub milestone_interval_meters: f64,

    /// Number of pace samples averaged for the displayed pace.
    /// Default: 5
    pub pace_window_size: u32,

    /// No pace is reported until the run covers this distance.
    /// Default: 10.0 meters
    pub min_pace_distance_meters: f64,

    /// Timer cadence.
    /// Default: 1000 ms
    pub timer_interval_ms: u64,

    /// Options passed to the location source on subscribe.
    pub location: platform::LocationOptions,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_accuracy_meters: 20.0,
            min_distance_meters: 3.0,
            milestone_interval_meters: 500.0,
            pace_window_size: 5,
            min_pace_distance_meters: 10.0,
            timer_interval_ms: 1000,
            location: platform::LocationOptions::default(),
        }
    }
}

impl TrackerConfig {
    /// Parse a config from a JSON object; missing fields keep their defaults.
    ///
    /// Anything other than an object is rejected, including arrays that
    /// serde would otherwise map onto the fields by position.
    pub fn from_json(json: &str) -> Result<Self> {
        use serde::de::Error as _;

        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("tracker config must be a JSON object").into());
        }
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
