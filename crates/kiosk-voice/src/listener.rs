//! **SpeechListener**: continuous recognition that never overlaps the kiosk's own voice.
//!
//! A single task owns the recognition session. It starts a session when listening is
//! requested and output is idle, forwards final transcripts, restarts after transient
//! engine errors with bounded backoff, and runs a reconciliation tick that stops the
//! session whenever output starts playing and restarts it once output has been quiet for
//! `quiet_buffer`.
//!
//! ```text
//!             set_listening(true)          final result          grace elapsed
//!   Idle ───────────────────────→ Session ─────────────→ Finishing ─────────→ Idle (+ListeningEnd)
//!    ↑  ↖ tick: output idle          │ tick: output playing
//!    │    └──────────────────────────┘ / transient error (backoff, cooldown)
//! ```

use crate::engine::{RecognitionEvent, RecognitionOptions, RecognitionStream, SttEngine};
use crate::error::RecognitionError;
use crate::guard::SpokeClock;
use chrono::{DateTime, Utc};
use kiosk_core::ListenerSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Voice,
    /// Typed on the manual entry fallback.
    Manual,
}

/// Events delivered to the listener's consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    SessionStarted {
        request: u64,
    },
    SessionStopped {
        request: u64,
    },
    Interim {
        text: String,
        request: u64,
    },
    /// A finalized transcript, tagged with the listening request it answers.
    Result {
        text: String,
        request: u64,
        source: ResultSource,
    },
    /// Listening finished on its own (after a result) or was force-stopped.
    ListeningEnd {
        request: u64,
    },
    /// One-line message for the visitor; never fatal.
    Advisory {
        error: RecognitionError,
        message: &'static str,
        at: DateTime<Utc>,
    },
}

enum Command {
    Listen(u64),
    Stop,
    Manual(String),
    ForceStop,
    Reset,
    Shutdown,
}

/// Cloneable handle to the listener task.
#[derive(Clone)]
pub struct SpeechListener {
    commands: mpsc::UnboundedSender<Command>,
    next_request: Arc<AtomicU64>,
    active: watch::Receiver<bool>,
    supported: bool,
}

impl SpeechListener {
    /// Start the listener task. `speaking` is the speech output's speaking signal and
    /// `clock` its last-spoke marker.
    pub fn spawn(
        engine: Arc<dyn SttEngine>,
        speaking: watch::Receiver<bool>,
        clock: SpokeClock,
        settings: ListenerSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (active_tx, active) = watch::channel(false);
        let supported = engine.is_supported();

        let task = ListenerTask {
            engine,
            settings,
            speaking,
            clock,
            events,
            active_tx,
            wanted: false,
            request: 0,
            session: None,
            retries: 0,
            resume_at: None,
            stop_at: None,
            unsupported: !supported,
            blocked: false,
        };
        if !supported {
            warn!("SpeechListener: recognition unsupported; manual entry only");
            task.advise(&RecognitionError::Unsupported);
        }
        tokio::spawn(task.run(command_rx));

        let listener = Self {
            commands,
            next_request: Arc::new(AtomicU64::new(0)),
            active,
            supported,
        };
        (listener, event_rx)
    }

    /// Request listening on or off. Turning it on returns a fresh request id; results carry
    /// the id they answer. Turning it off returns the id that was current.
    pub fn set_listening(&self, on: bool) -> u64 {
        if on {
            let id = self.next_request.fetch_add(1, Ordering::SeqCst) + 1;
            self.send(Command::Listen(id));
            id
        } else {
            self.send(Command::Stop);
            self.next_request.load(Ordering::SeqCst)
        }
    }

    /// Manual text entry; bypasses recognition and is delivered as a `Result`.
    pub fn submit_manual(&self, text: impl Into<String>) {
        self.send(Command::Manual(text.into()));
    }

    /// Keyboard "stop listening": abort the session and drop the listening request.
    pub fn force_stop(&self) {
        self.send(Command::ForceStop);
    }

    /// Stop and clear retry and permission state.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// True while a recognition session is running.
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active.clone()
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("SpeechListener: task already stopped");
        }
    }
}

struct Session {
    stream: RecognitionStream,
    request: u64,
    last_transcript: Option<String>,
}

struct ListenerTask {
    engine: Arc<dyn SttEngine>,
    settings: ListenerSettings,
    speaking: watch::Receiver<bool>,
    clock: SpokeClock,
    events: mpsc::UnboundedSender<ListenerEvent>,
    active_tx: watch::Sender<bool>,
    /// Listening requested by the consumer.
    wanted: bool,
    request: u64,
    session: Option<Session>,
    retries: u32,
    /// No session starts before this (retry backoff or cooldown).
    resume_at: Option<Instant>,
    /// Session stops at this point (grace after a final result).
    stop_at: Option<Instant>,
    unsupported: bool,
    /// Permission denied; waits for `reset`.
    blocked: bool,
}

impl ListenerTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut tick = tokio::time::interval(self.settings.reconcile_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = tick.tick() => self.reconcile(),
                event = next_event(&mut self.session) => self.handle_recognition(event),
                _ = sleep_until_opt(self.stop_at) => self.finish_after_result(),
                _ = sleep_until_opt(self.resume_at) => {
                    self.resume_at = None;
                    self.try_start("retry");
                }
            }
        }

        self.abort_session();
        debug!("SpeechListener: task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Listen(id) => {
                self.request = id;
                self.wanted = true;
                self.retries = 0;
                self.resume_at = None;
                self.stop_at = None;
                if let Some(session) = self.session.as_mut() {
                    session.request = id;
                }
                self.try_start("requested");
            }
            Command::Stop => {
                self.wanted = false;
                self.stop_at = None;
                self.resume_at = None;
                self.abort_session();
            }
            Command::Manual(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    info!(text = %text, "⌨️ manual entry");
                    self.emit(ListenerEvent::Result {
                        text,
                        request: self.request,
                        source: ResultSource::Manual,
                    });
                }
            }
            Command::ForceStop => {
                self.wanted = false;
                self.stop_at = None;
                self.resume_at = None;
                self.abort_session();
                info!("🛑 listening force-stopped");
                self.emit(ListenerEvent::ListeningEnd {
                    request: self.request,
                });
            }
            Command::Reset => {
                self.wanted = false;
                self.stop_at = None;
                self.resume_at = None;
                self.retries = 0;
                self.blocked = false;
                self.abort_session();
            }
            Command::Shutdown => {}
        }
    }

    /// Output/input mutual exclusion, checked every `reconcile_interval`.
    fn reconcile(&mut self) {
        if self.session.is_some() && *self.speaking.borrow() {
            debug!("output playing; stopping recognition session");
            self.abort_session();
            return;
        }
        self.try_start("reconcile");
    }

    fn try_start(&mut self, reason: &'static str) {
        if !self.wanted
            || self.session.is_some()
            || self.stop_at.is_some()
            || self.unsupported
            || self.blocked
        {
            return;
        }
        let now = Instant::now();
        if let Some(at) = self.resume_at {
            if now < at {
                return;
            }
            self.resume_at = None;
        }
        if *self.speaking.borrow() {
            return;
        }
        if let Some(quiet) = self.clock.quiet_for(now) {
            if quiet < self.settings.quiet_buffer() {
                return;
            }
        }

        let options = RecognitionOptions {
            language: self.settings.language.clone(),
            continuous: true,
            interim_results: true,
        };
        match self.engine.start(&options) {
            Ok(stream) => {
                info!(request = self.request, reason, "🎤 recognition session started");
                self.session = Some(Session {
                    stream,
                    request: self.request,
                    last_transcript: None,
                });
                self.active_tx.send_replace(true);
                self.emit(ListenerEvent::SessionStarted {
                    request: self.request,
                });
            }
            Err(error) => self.handle_error(error),
        }
    }

    fn handle_recognition(&mut self, event: Option<RecognitionEvent>) {
        match event {
            Some(RecognitionEvent::Interim(text)) => {
                if let Some(session) = &self.session {
                    self.emit(ListenerEvent::Interim {
                        text,
                        request: session.request,
                    });
                }
            }
            Some(RecognitionEvent::Final(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return;
                }
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                session.last_transcript = Some(text.clone());
                let request = session.request;
                self.retries = 0;
                info!(request, text = %text, "📝 final transcript");
                self.emit(ListenerEvent::Result {
                    text,
                    request,
                    source: ResultSource::Voice,
                });
                if self.stop_at.is_none() {
                    self.stop_at = Some(Instant::now() + self.settings.result_grace());
                }
            }
            Some(RecognitionEvent::Error(error)) => self.handle_error(error),
            Some(RecognitionEvent::Ended) | None => {
                if let Some(session) = self.session.take() {
                    debug!(
                        request = session.request,
                        last = ?session.last_transcript,
                        "recognition session ended by engine"
                    );
                    self.active_tx.send_replace(false);
                    self.emit(ListenerEvent::SessionStopped {
                        request: session.request,
                    });
                }
                self.try_start("session ended");
            }
        }
    }

    fn finish_after_result(&mut self) {
        self.stop_at = None;
        self.wanted = false;
        self.abort_session();
        self.emit(ListenerEvent::ListeningEnd {
            request: self.request,
        });
    }

    fn handle_error(&mut self, error: RecognitionError) {
        self.abort_session();
        self.advise(&error);
        if error.is_transient() {
            self.retries += 1;
            let delay = if self.retries > self.settings.max_retries {
                self.retries = 0;
                self.settings.retry_cooldown()
            } else {
                self.settings.retry_backoff() * self.retries
            };
            warn!(error = %error, delay_ms = delay.as_millis() as u64, "recognition error; restarting later");
            self.resume_at = Some(Instant::now() + delay);
        } else if error == RecognitionError::Unsupported {
            warn!("recognition unsupported; manual entry only");
            self.unsupported = true;
            self.wanted = false;
        } else {
            warn!("microphone permission denied; waiting for reset");
            self.blocked = true;
        }
    }

    fn abort_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.engine.abort();
            self.active_tx.send_replace(false);
            self.emit(ListenerEvent::SessionStopped {
                request: session.request,
            });
        }
    }

    fn advise(&self, error: &RecognitionError) {
        if let Some(message) = error.advisory() {
            self.emit(ListenerEvent::Advisory {
                error: error.clone(),
                message,
                at: Utc::now(),
            });
        }
    }

    fn emit(&self, event: ListenerEvent) {
        let _ = self.events.send(event);
    }
}

async fn next_event(session: &mut Option<Session>) -> Option<RecognitionEvent> {
    match session {
        Some(session) => session.stream.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
