//! FFI bindings for mobile platforms (iOS/Android).
//!
//! The host app owns the platform services and implements [`HostBridge`];
//! Rust owns the single active session. Location fixes and timer ticks are
//! pushed in from the host's callbacks, which the host serializes on its
//! main thread. All FFI functions are prefixed with `tracker_`.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use once_cell::sync::Lazy;

use crate::history::{HistoryStats, RunHistory, SavedRun};
use crate::platform::{
    Clock, Collaborators, KeyValueStore, LocationError, LocationOptions, LocationSource,
    SubscriptionHandle, SystemClock, VoiceOutput, WakeLock, WakeLockHandle,
};
use crate::{
    init_logging, GpsFix, Result, RunConfig, RunSession, RunSummary, SessionSnapshot,
    TrackerConfig, TrackerError,
};

// ============================================================================
// Host Callback Interface
// ============================================================================

/// Platform services implemented in Kotlin/Swift.
#[uniffi::export(callback_interface)]
pub trait HostBridge: Send + Sync {
    /// Begin location updates tagged with `subscription_id`.
    /// Return the reason if updates cannot start (no service, permission
    /// refused, ...), `None` once they are requested.
    fn start_location(&self, subscription_id: u64, options: LocationOptions)
        -> Option<LocationError>;
    fn stop_location(&self, subscription_id: u64);
    /// Speak `text`, interrupting anything still being spoken.
    fn speak(&self, text: String);
    /// Return false if wake locks are unsupported.
    fn request_wake_lock(&self) -> bool;
    fn release_wake_lock(&self);
    fn store_get(&self, key: String) -> Option<String>;
    /// Return false if the write failed (quota, etc.).
    fn store_set(&self, key: String, value: String) -> bool;
}

type SharedBridge = Arc<dyn HostBridge>;

struct BridgeLocation {
    bridge: SharedBridge,
    next_id: u64,
}

impl LocationSource for BridgeLocation {
    fn start(
        &mut self,
        options: &LocationOptions,
    ) -> std::result::Result<SubscriptionHandle, LocationError> {
        self.next_id += 1;
        match self.bridge.start_location(self.next_id, *options) {
            None => Ok(SubscriptionHandle(self.next_id)),
            Some(error) => Err(error),
        }
    }

    fn stop(&mut self, handle: SubscriptionHandle) {
        self.bridge.stop_location(handle.0);
    }
}

struct BridgeVoice(SharedBridge);

impl VoiceOutput for BridgeVoice {
    fn speak(&mut self, text: &str) {
        self.0.speak(text.to_string());
    }
}

struct BridgeWakeLock(SharedBridge);

impl WakeLock for BridgeWakeLock {
    fn request(&mut self) -> Option<WakeLockHandle> {
        self.0.request_wake_lock().then_some(WakeLockHandle(0))
    }

    fn release(&mut self, _handle: WakeLockHandle) {
        self.0.release_wake_lock();
    }
}

/// History storage backed by the host's key-value API.
pub struct BridgeStore(SharedBridge);

impl KeyValueStore for BridgeStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.0.store_get(key.to_string()))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.0.store_set(key.to_string(), value.to_string()) {
            Ok(())
        } else {
            Err(TrackerError::storage(format!("host rejected write to '{}'", key)))
        }
    }
}

fn bridge_collaborators(bridge: &SharedBridge, clock: impl Clock + 'static) -> Collaborators {
    Collaborators::new(
        BridgeLocation {
            bridge: bridge.clone(),
            next_id: 0,
        },
        BridgeVoice(bridge.clone()),
        BridgeWakeLock(bridge.clone()),
        clock,
    )
}

// ============================================================================
// Global Tracker
// ============================================================================

/// The one active session plus its history.
pub struct Tracker {
    pub session: RunSession,
    pub history: RunHistory<BridgeStore>,
}

/// Global tracker instance, set by [`tracker_init`].
pub static TRACKER: Lazy<Mutex<Option<Tracker>>> = Lazy::new(|| Mutex::new(None));

/// Run `f` against the tracker. `None` before init or if the lock is poisoned.
pub fn with_tracker<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut Tracker) -> R,
{
    let mut guard = match TRACKER.lock() {
        Ok(guard) => guard,
        Err(_) => {
            warn!("[PaceTracker] Tracker lock poisoned");
            return None;
        }
    };
    let result = guard.as_mut().map(f);
    if result.is_none() {
        warn!("[PaceTracker] Tracker used before tracker_init");
    }
    result
}

fn log_rejected(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            info!("[PaceTracker] {}", e);
            false
        }
    }
}

// ============================================================================
// FFI Exports
// ============================================================================

/// Create (or replace) the tracker. Call once at app startup.
#[uniffi::export]
pub fn tracker_init(config: TrackerConfig, bridge: Box<dyn HostBridge>) {
    init_logging();
    let bridge: SharedBridge = Arc::from(bridge);

    let tracker = Tracker {
        session: RunSession::new(config, bridge_collaborators(&bridge, SystemClock)),
        history: RunHistory::new(BridgeStore(bridge)),
    };

    match TRACKER.lock() {
        Ok(mut guard) => {
            *guard = Some(tracker);
            info!("[PaceTracker] Initialized");
        }
        Err(_) => warn!("[PaceTracker] Tracker lock poisoned, init skipped"),
    }
}

#[uniffi::export]
pub fn tracker_begin_setup() -> bool {
    with_tracker(|t| log_rejected(t.session.begin_setup())).unwrap_or(false)
}

#[uniffi::export]
pub fn tracker_cancel_setup() -> bool {
    with_tracker(|t| log_rejected(t.session.cancel_setup())).unwrap_or(false)
}

/// Start the run from the raw setup-form values.
#[uniffi::export]
pub fn tracker_start(
    pace_minutes: String,
    pace_seconds: String,
    target_distance_km: String,
) -> bool {
    let config = RunConfig::from_form(&pace_minutes, &pace_seconds, &target_distance_km);
    with_tracker(|t| log_rejected(t.session.start(config))).unwrap_or(false)
}

#[uniffi::export]
pub fn tracker_pause() -> bool {
    with_tracker(|t| log_rejected(t.session.pause())).unwrap_or(false)
}

#[uniffi::export]
pub fn tracker_resume() -> bool {
    with_tracker(|t| log_rejected(t.session.resume())).unwrap_or(false)
}

#[uniffi::export]
pub fn tracker_finish() -> Option<RunSummary> {
    with_tracker(|t| match t.session.finish() {
        Ok(summary) => Some(summary.clone()),
        Err(e) => {
            info!("[PaceTracker] {}", e);
            None
        }
    })
    .flatten()
}

#[uniffi::export]
pub fn tracker_new_run() -> bool {
    with_tracker(|t| log_rejected(t.session.new_run())).unwrap_or(false)
}

/// Feed a fix from the subscription `subscription_id`.
/// Returns true if it was accepted as the new reference point.
#[uniffi::export]
pub fn tracker_on_fix(subscription_id: u64, fix: GpsFix) -> bool {
    with_tracker(|t| {
        t.session
            .on_fix(SubscriptionHandle(subscription_id), fix)
            .is_some_and(|outcome| outcome.accepted)
    })
    .unwrap_or(false)
}

#[uniffi::export]
pub fn tracker_on_location_error(subscription_id: u64, error: LocationError) {
    with_tracker(|t| {
        t.session
            .on_location_error(SubscriptionHandle(subscription_id), error)
    });
}

/// Timer callback; returns elapsed seconds.
#[uniffi::export]
pub fn tracker_tick() -> u64 {
    with_tracker(|t| t.session.on_timer_tick()).unwrap_or(0)
}

#[uniffi::export]
pub fn tracker_snapshot() -> Option<SessionSnapshot> {
    with_tracker(|t| t.session.snapshot())
}

#[uniffi::export]
pub fn tracker_set_voice_enabled(enabled: bool) {
    with_tracker(|t| t.session.set_voice_enabled(enabled));
}

/// Save the finished run with `notes`. `None` unless the session is finished.
#[uniffi::export]
pub fn tracker_save_run(notes: String) -> Option<SavedRun> {
    with_tracker(|t| {
        let summary = t.session.summary()?.clone();
        Some(t.history.save_summary(&summary, &notes))
    })
    .flatten()
}

#[uniffi::export]
pub fn tracker_history() -> Vec<SavedRun> {
    with_tracker(|t| t.history.list()).unwrap_or_default()
}

/// History as a JSON array string.
#[uniffi::export]
pub fn tracker_history_json() -> String {
    with_tracker(|t| t.history.list_json()).unwrap_or_else(|| "[]".to_string())
}

#[uniffi::export]
pub fn tracker_history_stats() -> HistoryStats {
    with_tracker(|t| t.history.stats()).unwrap_or_default()
}

#[uniffi::export]
pub fn tracker_delete_run(id: String) {
    with_tracker(|t| t.history.delete(&id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualClock;
    use crate::GpsStatus;

    /// Host that records location calls and refuses with a fixed reason.
    #[derive(Default)]
    struct FakeHost {
        refusal: Mutex<Option<LocationError>>,
        started: Mutex<Vec<u64>>,
        stopped: Mutex<Vec<u64>>,
    }

    impl HostBridge for FakeHost {
        fn start_location(&self, subscription_id: u64, _options: LocationOptions) -> Option<LocationError> {
            let refusal = *self.refusal.lock().unwrap();
            if refusal.is_none() {
                self.started.lock().unwrap().push(subscription_id);
            }
            refusal
        }

        fn stop_location(&self, subscription_id: u64) {
            self.stopped.lock().unwrap().push(subscription_id);
        }

        fn speak(&self, _text: String) {}

        fn request_wake_lock(&self) -> bool {
            false
        }

        fn release_wake_lock(&self) {}

        fn store_get(&self, _key: String) -> Option<String> {
            None
        }

        fn store_set(&self, _key: String, _value: String) -> bool {
            false
        }
    }

    fn session_over(host: &Arc<FakeHost>) -> RunSession {
        let bridge: SharedBridge = host.clone();
        RunSession::new(
            TrackerConfig::default(),
            bridge_collaborators(&bridge, ManualClock::new(0)),
        )
    }

    #[test]
    fn test_host_refusal_reason_reported() {
        for reason in [
            LocationError::PermissionDenied,
            LocationError::Unsupported,
            LocationError::PositionUnavailable,
        ] {
            let host = Arc::new(FakeHost::default());
            *host.refusal.lock().unwrap() = Some(reason);
            let mut session = session_over(&host);

            session.begin_setup().unwrap();
            session.start(RunConfig::default()).unwrap();
            assert_eq!(session.gps_status(), GpsStatus::from(reason));
            assert_eq!(session.subscription(), None);
            assert!(host.started.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn test_host_subscriptions_follow_pause() {
        let host = Arc::new(FakeHost::default());
        let mut session = session_over(&host);

        session.begin_setup().unwrap();
        session.start(RunConfig::default()).unwrap();
        assert_eq!(session.gps_status(), GpsStatus::Acquiring);
        assert_eq!(session.subscription(), Some(SubscriptionHandle(1)));

        session.pause().unwrap();
        session.resume().unwrap();
        assert_eq!(*host.started.lock().unwrap(), vec![1, 2]);
        assert_eq!(*host.stopped.lock().unwrap(), vec![1]);

        // The host store refuses writes, which surfaces as a storage error
        let mut store = BridgeStore(host.clone());
        assert!(matches!(
            store.set("runHistory", "[]"),
            Err(TrackerError::Storage { .. })
        ));
    }
}
