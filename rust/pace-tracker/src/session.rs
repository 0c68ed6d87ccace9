//! # Run Session
//!
//! The stateful heart of the tracker. One `RunSession` owns a run from setup
//! to finish: the lifecycle state, the timer reference, the accumulated
//! distance, the pace window and the announcement marker.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> Setup -> Running <-> Paused -> Finished -> Idle
//!          |                     |
//!          +-> Idle (cancel)     +-> Finished
//! ```
//!
//! ## Events
//!
//! Two independent sources drive a running session, and the host must
//! deliver them one at a time:
//! - GPS fixes via [`RunSession::on_fix`], tagged with the subscription
//!   handle they arrived on
//! - timer ticks via [`RunSession::on_timer_tick`], nominally once a second
//!
//! Elapsed time is always recomputed from a single reference instant
//! (`now - reference`), never summed tick by tick, so late or dropped ticks
//! do not drift. Pausing freezes the value; resuming moves the reference to
//! `now - frozen`.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::announce::{Announcement, AnnouncementTrigger};
use crate::filter::{FilterOutcome, SignalFilter};
use crate::pace::{PaceEstimator, PaceWindow};
use crate::platform::{Collaborators, LocationError, SubscriptionHandle, WakeLockHandle};
use crate::{GpsFix, Result, RunConfig, TrackerConfig, TrackerError};

// ============================================================================
// Core Types
// ============================================================================

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RunState {
    Idle,
    Setup,
    Running,
    Paused,
    Finished,
}

/// What the location side is currently doing, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum GpsStatus {
    /// Not subscribed
    Inactive,
    /// Subscribed, no fix yet
    Acquiring,
    /// Fixes are arriving
    Tracking,
    Unsupported,
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl GpsStatus {
    pub fn message(&self) -> &'static str {
        match self {
            GpsStatus::Inactive => "GPS off",
            GpsStatus::Acquiring => "Acquiring GPS...",
            GpsStatus::Tracking => "GPS active",
            GpsStatus::Unsupported => "GPS not supported on this device",
            GpsStatus::PermissionDenied => "Location permission denied",
            GpsStatus::PositionUnavailable => "Position unavailable",
            GpsStatus::Timeout => "GPS timed out",
        }
    }

    /// True for the conditions that stop fixes from arriving.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            GpsStatus::Unsupported
                | GpsStatus::PermissionDenied
                | GpsStatus::PositionUnavailable
                | GpsStatus::Timeout
        )
    }
}

impl From<LocationError> for GpsStatus {
    fn from(error: LocationError) -> Self {
        match error {
            LocationError::Unsupported => GpsStatus::Unsupported,
            LocationError::PermissionDenied => GpsStatus::PermissionDenied,
            LocationError::PositionUnavailable => GpsStatus::PositionUnavailable,
            LocationError::Timeout => GpsStatus::Timeout,
        }
    }
}

/// Immutable result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RunSummary {
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    /// Elapsed / distance in seconds per km; None when no distance was covered
    pub average_pace: Option<f64>,
    /// Wall-clock instant the run was finished, ms since epoch
    pub finished_at_ms: i64,
    pub config: RunConfig,
}

impl RunSummary {
    /// Distance in km rounded to two decimals.
    pub fn distance_km_rounded(&self) -> f64 {
        crate::format::km_two_decimals(self.distance_meters)
    }
}

/// Read-only view for display consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SessionSnapshot {
    pub state: RunState,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub current_pace: Option<f64>,
    pub goal_pace: Option<f64>,
    pub gps_status: GpsStatus,
    /// Fraction of target distance covered, 0..=1
    pub progress: f64,
    pub projected_finish_seconds: Option<f64>,
    pub last_announcement: Option<String>,
}

// ============================================================================
// Run Session
// ============================================================================

/// One run attempt, from setup to finish.
pub struct RunSession {
    // Pipeline stages
    tracker: TrackerConfig,
    filter: SignalFilter,
    estimator: PaceEstimator,
    trigger: AnnouncementTrigger,

    // Host services
    collaborators: Collaborators,

    // Lifecycle
    state: RunState,
    config: Option<RunConfig>,
    summary: Option<RunSummary>,

    // Distance
    last_accepted_fix: Option<GpsFix>,
    route: Vec<GpsFix>,
    total_distance_meters: f64,

    // Timer: reference instant is Some only while the timer runs
    start_reference_ms: Option<i64>,
    elapsed_seconds: u64,

    // Pace
    pace_window: PaceWindow,
    current_pace: Option<f64>,

    // Coaching
    last_announced_distance_meters: f64,
    last_announcement: Option<Announcement>,
    voice_enabled: bool,

    // Platform handles
    gps_status: GpsStatus,
    subscription: Option<SubscriptionHandle>,
    wake_lock: Option<WakeLockHandle>,
}

impl RunSession {
    /// Create an idle session.
    pub fn new(tracker: TrackerConfig, collaborators: Collaborators) -> Self {
        Self {
            filter: SignalFilter::from_config(&tracker),
            estimator: PaceEstimator::from_config(&tracker),
            trigger: AnnouncementTrigger::new(tracker.milestone_interval_meters),
            pace_window: PaceWindow::new(tracker.pace_window_size as usize),
            tracker,
            collaborators,
            state: RunState::Idle,
            config: None,
            summary: None,
            last_accepted_fix: None,
            route: Vec::new(),
            total_distance_meters: 0.0,
            start_reference_ms: None,
            elapsed_seconds: 0,
            current_pace: None,
            last_announced_distance_meters: 0.0,
            last_announcement: None,
            voice_enabled: true,
            gps_status: GpsStatus::Inactive,
            subscription: None,
            wake_lock: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Idle -> Setup.
    pub fn begin_setup(&mut self) -> Result<()> {
        self.expect_state(&[RunState::Idle], "begin setup")?;
        self.state = RunState::Setup;
        info!("[PaceTracker] Setup started");
        Ok(())
    }

    /// Setup -> Idle, discarding any config.
    pub fn cancel_setup(&mut self) -> Result<()> {
        self.expect_state(&[RunState::Setup], "cancel setup")?;
        self.config = None;
        self.state = RunState::Idle;
        info!("[PaceTracker] Setup cancelled");
        Ok(())
    }

    /// Setup -> Running: capture config, start GPS and timer.
    pub fn start(&mut self, config: RunConfig) -> Result<()> {
        self.expect_state(&[RunState::Setup], "start")?;

        self.config = Some(config);
        self.last_announced_distance_meters = 0.0;
        self.elapsed_seconds = 0;
        self.start_reference_ms = Some(self.now_ms());
        self.state = RunState::Running;

        self.start_location();
        self.acquire_wake_lock();

        info!(
            "[PaceTracker] Run started: goal {:.0}s/km over {:.2}km",
            config.goal_pace_seconds_per_km, config.target_distance_km
        );
        Ok(())
    }

    /// Running -> Paused: stop GPS and timer, freeze elapsed time.
    pub fn pause(&mut self) -> Result<()> {
        self.expect_state(&[RunState::Running], "pause")?;

        self.stop_location();
        self.stop_timer();
        self.release_wake_lock();
        self.state = RunState::Paused;

        info!(
            "[PaceTracker] Paused at {}s, {:.1}m",
            self.elapsed_seconds, self.total_distance_meters
        );
        Ok(())
    }

    /// Paused -> Running: restart GPS and timer from the frozen elapsed time.
    pub fn resume(&mut self) -> Result<()> {
        self.expect_state(&[RunState::Paused], "resume")?;

        // Whatever we moved while paused is not credited
        self.last_accepted_fix = None;
        self.start_reference_ms = Some(self.now_ms() - self.elapsed_seconds as i64 * 1000);
        self.state = RunState::Running;

        self.start_location();
        self.acquire_wake_lock();

        info!("[PaceTracker] Resumed at {}s", self.elapsed_seconds);
        Ok(())
    }

    /// Running/Paused -> Finished: stop everything and capture the summary.
    pub fn finish(&mut self) -> Result<&RunSummary> {
        self.expect_state(&[RunState::Running, RunState::Paused], "finish")?;

        self.stop_location();
        self.stop_timer();
        self.release_wake_lock();
        self.state = RunState::Finished;

        let average_pace = if self.total_distance_meters > 0.0 {
            Some(self.elapsed_seconds as f64 / (self.total_distance_meters / 1000.0))
        } else {
            None
        };

        let summary = RunSummary {
            elapsed_seconds: self.elapsed_seconds,
            distance_meters: self.total_distance_meters,
            average_pace,
            finished_at_ms: self.now_ms(),
            config: self.config.unwrap_or_default(),
        };

        info!(
            "[PaceTracker] Finished: {:.2}km in {}s",
            summary.distance_meters / 1000.0,
            summary.elapsed_seconds
        );

        Ok(self.summary.insert(summary))
    }

    /// Finished -> Idle: full reset, whether or not the run was saved.
    pub fn new_run(&mut self) -> Result<()> {
        self.expect_state(&[RunState::Finished], "start a new run")?;
        self.reset();
        info!("[PaceTracker] Session reset");
        Ok(())
    }

    fn reset(&mut self) {
        self.state = RunState::Idle;
        self.config = None;
        self.summary = None;
        self.last_accepted_fix = None;
        self.route.clear();
        self.total_distance_meters = 0.0;
        self.start_reference_ms = None;
        self.elapsed_seconds = 0;
        self.pace_window.clear();
        self.current_pace = None;
        self.last_announced_distance_meters = 0.0;
        self.last_announcement = None;
        self.gps_status = GpsStatus::Inactive;
        self.subscription = None;
        self.wake_lock = None;
    }

    fn expect_state(&self, allowed: &[RunState], action: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            warn!("[PaceTracker] Rejected '{}' in state {:?}", action, self.state);
            Err(TrackerError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Handle one GPS fix delivered on `subscription`.
    ///
    /// Returns `None` when the fix was ignored outright (not running, or a
    /// stale subscription), otherwise the filter outcome.
    pub fn on_fix(&mut self, subscription: SubscriptionHandle, fix: GpsFix) -> Option<FilterOutcome> {
        if self.state != RunState::Running || self.subscription != Some(subscription) {
            debug!(
                "[PaceTracker] Dropping fix on {:?} (state {:?}, live {:?})",
                subscription, self.state, self.subscription
            );
            return None;
        }

        self.gps_status = GpsStatus::Tracking;

        let outcome = self.filter.accept(&fix, self.last_accepted_fix.as_ref());
        if !outcome.accepted {
            debug!(
                "[PaceTracker] Fix not accepted: {:?} (accuracy {:.1}m)",
                outcome.verdict, fix.accuracy_meters
            );
            return Some(outcome);
        }

        self.total_distance_meters += outcome.distance_increment_meters;
        self.last_accepted_fix = Some(fix);
        self.route.push(fix);

        self.refresh_elapsed();
        // Exactly one estimator call per accepted fix
        self.current_pace = self.estimator.current_pace(
            self.total_distance_meters,
            self.elapsed_seconds,
            &mut self.pace_window,
        );

        debug!(
            "[PaceTracker] +{:.1}m -> {:.1}m, pace {:?}",
            outcome.distance_increment_meters, self.total_distance_meters, self.current_pace
        );

        self.check_announcement();
        Some(outcome)
    }

    /// Handle a location error reported on `subscription`.
    ///
    /// The subscription stays registered; the platform may recover and
    /// resume delivering fixes.
    pub fn on_location_error(&mut self, subscription: SubscriptionHandle, error: LocationError) {
        if self.subscription != Some(subscription) {
            return;
        }
        warn!("[PaceTracker] Location error: {:?}", error);
        self.gps_status = error.into();
    }

    /// Handle one timer tick. Returns the elapsed seconds after the tick.
    pub fn on_timer_tick(&mut self) -> u64 {
        if self.state == RunState::Running {
            self.refresh_elapsed();
        }
        self.elapsed_seconds
    }

    fn refresh_elapsed(&mut self) {
        if let Some(reference) = self.start_reference_ms {
            let delta = (self.now_ms() - reference).max(0);
            self.elapsed_seconds = (delta / 1000) as u64;
        }
    }

    fn check_announcement(&mut self) {
        let Some(config) = self.config else {
            return;
        };
        let Some(announcement) = self.trigger.evaluate(
            self.total_distance_meters,
            self.last_announced_distance_meters,
            self.current_pace,
            config.goal_pace_seconds_per_km,
        ) else {
            return;
        };

        info!("[PaceTracker] Milestone: {}", announcement.text);
        self.last_announced_distance_meters = self.total_distance_meters;
        if self.voice_enabled {
            self.collaborators.voice.speak(&announcement.text);
        }
        self.last_announcement = Some(announcement);
    }

    // ========================================================================
    // Platform handles
    // ========================================================================

    fn now_ms(&self) -> i64 {
        self.collaborators.clock.now_ms()
    }

    fn start_location(&mut self) {
        self.stop_location();
        match self.collaborators.location.start(&self.tracker.location) {
            Ok(handle) => {
                self.subscription = Some(handle);
                self.gps_status = GpsStatus::Acquiring;
            }
            Err(error) => {
                warn!(
                    "[PaceTracker] Location unavailable ({:?}), timer only",
                    error
                );
                self.gps_status = error.into();
            }
        }
    }

    fn stop_location(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.collaborators.location.stop(handle);
            self.gps_status = GpsStatus::Inactive;
        }
    }

    fn stop_timer(&mut self) {
        self.refresh_elapsed();
        self.start_reference_ms = None;
    }

    fn acquire_wake_lock(&mut self) {
        if self.wake_lock.is_none() {
            self.wake_lock = self.collaborators.wake_lock.request();
        }
    }

    fn release_wake_lock(&mut self) {
        if let Some(handle) = self.wake_lock.take() {
            self.collaborators.wake_lock.release(handle);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> Option<&RunConfig> {
        self.config.as_ref()
    }

    pub fn tracker_config(&self) -> &TrackerConfig {
        &self.tracker
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.total_distance_meters
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Smoothed pace from the last accepted fix. Reading it has no side
    /// effects on the pace window.
    pub fn current_pace(&self) -> Option<f64> {
        self.current_pace
    }

    pub fn pace_window(&self) -> &PaceWindow {
        &self.pace_window
    }

    pub fn last_accepted_fix(&self) -> Option<&GpsFix> {
        self.last_accepted_fix.as_ref()
    }

    /// Fixes that became reference points, in order.
    pub fn route(&self) -> &[GpsFix] {
        &self.route
    }

    pub fn last_announced_distance_meters(&self) -> f64 {
        self.last_announced_distance_meters
    }

    pub fn last_announcement(&self) -> Option<&Announcement> {
        self.last_announcement.as_ref()
    }

    pub fn gps_status(&self) -> GpsStatus {
        self.gps_status
    }

    /// The live location subscription, if GPS is acquiring.
    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscription
    }

    pub fn timer_running(&self) -> bool {
        self.start_reference_ms.is_some()
    }

    pub fn holds_wake_lock(&self) -> bool {
        self.wake_lock.is_some()
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.voice_enabled = enabled;
    }

    /// Fraction of the target distance covered, clamped to 0..=1.
    pub fn progress_fraction(&self) -> f64 {
        match self.config {
            Some(config) => (self.total_distance_meters / config.target_distance_meters()).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Expected total time at the current pace for the target distance.
    pub fn projected_finish_seconds(&self) -> Option<f64> {
        let config = self.config?;
        let pace = self.current_pace?;
        let remaining_km = (config.target_distance_meters() - self.total_distance_meters).max(0.0) / 1000.0;
        Some(self.elapsed_seconds as f64 + remaining_km * pace)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds,
            distance_meters: self.total_distance_meters,
            current_pace: self.current_pace,
            goal_pace: self.config.map(|c| c.goal_pace_seconds_per_km),
            gps_status: self.gps_status,
            progress: self.progress_fraction(),
            projected_finish_seconds: self.projected_finish_seconds(),
            last_announcement: self.last_announcement.as_ref().map(|a| a.text.clone()),
        }
    }
}

impl std::fmt::Debug for RunSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSession")
            .field("state", &self.state)
            .field("elapsed_seconds", &self.elapsed_seconds)
            .field("total_distance_meters", &self.total_distance_meters)
            .field("current_pace", &self.current_pace)
            .field("gps_status", &self.gps_status)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
