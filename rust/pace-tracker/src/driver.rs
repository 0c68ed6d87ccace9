//! # Session Driver
//!
//! Runs a [`RunSession`] inside a single tokio task. GPS fixes, location
//! errors and user commands arrive over one channel; the one-second timer
//! is a `tokio::time::interval` polled only while the session's timer is
//! running. Every event is handled to completion before the next one is
//! looked at, so the session is never touched concurrently.

use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::platform::{LocationError, SubscriptionHandle};
use crate::{GpsFix, Result, RunConfig, RunSession, SessionSnapshot, TrackerError};

/// User-initiated lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    BeginSetup,
    CancelSetup,
    Start(RunConfig),
    Pause,
    Resume,
    Finish,
    NewRun,
    SetVoiceEnabled(bool),
}

/// Everything the session task reacts to, besides the timer.
#[derive(Debug)]
pub enum DriverEvent {
    Fix {
        subscription: SubscriptionHandle,
        fix: GpsFix,
    },
    LocationError {
        subscription: SubscriptionHandle,
        error: LocationError,
    },
    Command {
        command: SessionCommand,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Handle to a session running in its own task.
pub struct SessionDriver {
    events: mpsc::UnboundedSender<DriverEvent>,
    task: JoinHandle<RunSession>,
}

impl SessionDriver {
    /// Move `session` into a new task on the current runtime.
    pub fn spawn(session: RunSession) -> Self {
        let period = Duration::from_millis(session.tracker_config().timer_interval_ms.max(1));
        let (events, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_loop(session, rx, period));
        Self { events, task }
    }

    /// Sender for platform callbacks (location listener, etc.).
    pub fn events(&self) -> mpsc::UnboundedSender<DriverEvent> {
        self.events.clone()
    }

    /// Queue a fix. Never blocks.
    pub fn push_fix(&self, subscription: SubscriptionHandle, fix: GpsFix) {
        let _ = self.events.send(DriverEvent::Fix { subscription, fix });
    }

    /// Queue a location error. Never blocks.
    pub fn push_location_error(&self, subscription: SubscriptionHandle, error: LocationError) {
        let _ = self.events.send(DriverEvent::LocationError {
            subscription,
            error,
        });
    }

    /// Apply a command after everything queued before it.
    pub async fn command(&self, command: SessionCommand) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(DriverEvent::Command { command, reply })
            .map_err(|_| TrackerError::DriverStopped)?;
        response.await.map_err(|_| TrackerError::DriverStopped)?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(DriverEvent::Snapshot(reply))
            .map_err(|_| TrackerError::DriverStopped)?;
        response.await.map_err(|_| TrackerError::DriverStopped)
    }

    /// Stop the task after draining queued events and hand the session back.
    pub async fn shutdown(self) -> Result<RunSession> {
        let _ = self.events.send(DriverEvent::Shutdown);
        self.task.await.map_err(|_| TrackerError::DriverStopped)
    }
}

async fn run_loop(
    mut session: RunSession,
    mut events: mpsc::UnboundedReceiver<DriverEvent>,
    period: Duration,
) -> RunSession {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("[PaceTracker] Driver started ({:?} tick)", period);

    loop {
        tokio::select! {
            // Queued events first, so a stop request beats a pending tick
            biased;

            event = events.recv() => match event {
                None | Some(DriverEvent::Shutdown) => break,
                Some(event) => handle_event(&mut session, event),
            },

            _ = ticker.tick(), if session.timer_running() => {
                let elapsed = session.on_timer_tick();
                debug!("[PaceTracker] Tick: {}s", elapsed);
            }
        }
    }

    info!("[PaceTracker] Driver stopped");
    session
}

fn handle_event(session: &mut RunSession, event: DriverEvent) {
    match event {
        DriverEvent::Fix { subscription, fix } => {
            session.on_fix(subscription, fix);
        }
        DriverEvent::LocationError {
            subscription,
            error,
        } => session.on_location_error(subscription, error),
        DriverEvent::Command { command, reply } => {
            let result = apply(session, command).map(|_| session.snapshot());
            let _ = reply.send(result);
        }
        DriverEvent::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        DriverEvent::Shutdown => {}
    }
}

fn apply(session: &mut RunSession, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::BeginSetup => session.begin_setup(),
        SessionCommand::CancelSetup => session.cancel_setup(),
        SessionCommand::Start(config) => session.start(config),
        SessionCommand::Pause => session.pause(),
        SessionCommand::Resume => session.resume(),
        SessionCommand::Finish => session.finish().map(|_| ()),
        SessionCommand::NewRun => session.new_run(),
        SessionCommand::SetVoiceEnabled(enabled) => {
            session.set_voice_enabled(enabled);
            Ok(())
        }
    }
}
