//! Collaborator seams.
//!
//! The session talks to the host platform only through these traits:
//! location acquisition, speech, screen wake lock, wall clock and a
//! key-value blob store. Null implementations let any of them be omitted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::Result;

// ============================================================================
// Location
// ============================================================================

/// Identifies one location subscription. Fixes tagged with an older handle
/// are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionHandle(pub u64);

/// Why the platform cannot deliver fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LocationError {
    /// The host has no location service at all
    Unsupported,
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

/// Options passed when subscribing to location updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationOptions {
    /// Ask for GPS-grade accuracy
    pub high_accuracy: bool,
    /// Maximum age of a cached position; 0 forces a fresh fix
    pub maximum_age_ms: u64,
    /// How long to wait for a fix before reporting a timeout
    pub timeout_ms: u64,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age_ms: 0,
            timeout_ms: 10_000,
        }
    }
}

/// Platform location service.
pub trait LocationSource: Send {
    /// Begin delivering fixes. Delivery itself happens out of band: the host
    /// hands each fix to [`RunSession::on_fix`](crate::RunSession::on_fix)
    /// together with the handle returned here.
    fn start(&mut self, options: &LocationOptions) -> std::result::Result<SubscriptionHandle, LocationError>;

    /// Stop delivering fixes for `handle`. Must be idempotent.
    fn stop(&mut self, handle: SubscriptionHandle);
}

/// A host without any location service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocation;

impl LocationSource for NoLocation {
    fn start(&mut self, _options: &LocationOptions) -> std::result::Result<SubscriptionHandle, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn stop(&mut self, _handle: SubscriptionHandle) {}
}

#[derive(Debug, Default)]
struct PushState {
    next_id: u64,
    active: Option<SubscriptionHandle>,
    failure: Option<LocationError>,
}

/// Location source for hosts that push fixes in themselves.
///
/// Hands out a fresh handle per subscription and records which one is live,
/// so the pushing side can ask [`PushLocation::active`] before forwarding a
/// fix. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct PushLocation {
    state: Arc<Mutex<PushState>>,
}

impl PushLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live subscription, if acquisition is currently wanted.
    pub fn active(&self) -> Option<SubscriptionHandle> {
        self.state.lock().map(|s| s.active).unwrap_or(None)
    }

    /// Make the next `start` fail with `error` (e.g. permission revoked).
    pub fn fail_next_start(&self, error: LocationError) {
        if let Ok(mut state) = self.state.lock() {
            state.failure = Some(error);
        }
    }
}

impl LocationSource for PushLocation {
    fn start(&mut self, _options: &LocationOptions) -> std::result::Result<SubscriptionHandle, LocationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LocationError::PositionUnavailable)?;
        if let Some(error) = state.failure.take() {
            return Err(error);
        }
        state.next_id += 1;
        let handle = SubscriptionHandle(state.next_id);
        state.active = Some(handle);
        Ok(handle)
    }

    fn stop(&mut self, handle: SubscriptionHandle) {
        if let Ok(mut state) = self.state.lock() {
            if state.active == Some(handle) {
                state.active = None;
            }
        }
    }
}

// ============================================================================
// Voice
// ============================================================================

/// Text-to-speech output. Fire-and-forget; implementations cancel any
/// unfinished utterance before speaking the new one.
pub trait VoiceOutput: Send {
    fn speak(&mut self, text: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentVoice;

impl VoiceOutput for SilentVoice {
    fn speak(&mut self, _text: &str) {}
}

// ============================================================================
// Wake lock
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeLockHandle(pub u64);

/// Keeps the display awake while running.
pub trait WakeLock: Send {
    /// `None` when the platform does not support wake locks.
    fn request(&mut self) -> Option<WakeLockHandle>;
    fn release(&mut self, handle: WakeLockHandle);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn request(&mut self) -> Option<WakeLockHandle> {
        None
    }

    fn release(&mut self, _handle: WakeLockHandle) {}
}

// ============================================================================
// Clock
// ============================================================================

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock: Send {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Generic string blob store keyed by name. Either call may fail
/// (quota, corruption, missing backend).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

// ============================================================================
// Bundle
// ============================================================================

/// Everything a session needs from the host.
pub struct Collaborators {
    pub location: Box<dyn LocationSource>,
    pub voice: Box<dyn VoiceOutput>,
    pub wake_lock: Box<dyn WakeLock>,
    pub clock: Box<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        location: impl LocationSource + 'static,
        voice: impl VoiceOutput + 'static,
        wake_lock: impl WakeLock + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            location: Box::new(location),
            voice: Box::new(voice),
            wake_lock: Box::new(wake_lock),
            clock: Box::new(clock),
        }
    }

    /// Push-fed location, no speech, no wake lock.
    pub fn headless(clock: impl Clock + 'static) -> Self {
        Self::new(PushLocation::new(), SilentVoice, NoWakeLock, clock)
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::headless(SystemClock)
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
