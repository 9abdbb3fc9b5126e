//! **SpeechOutput**: the single FIFO queue every spoken prompt goes through.
//!
//! One worker task owns the engine: it pops a request, speaks it (chunked when long), fires
//! the request's `on_start`/`on_end` exactly once, marks the shared [`SpokeClock`] and moves
//! on. `clear_queue()` is the kill-switch used on every screen change.

use crate::chunk::{chunk_text, needs_chunking};
use crate::engine::{select_voice, EngineUtterance, TtsEngine, VoiceInfo};
use crate::guard::SpokeClock;
use crate::lock;
use kiosk_core::SpeechSettings;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback fired at the start or end of one logical utterance.
pub type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Per-request overrides and lifecycle callbacks.
#[derive(Default)]
pub struct SpeakOptions {
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    on_start: Option<Hook>,
    on_end: Option<Hook>,
}

impl SpeakOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn on_start(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_end(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_end = Some(Box::new(hook));
        self
    }
}

/// How a request left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceOutcome {
    Completed,
    /// The engine reported an error; treated as finished, never retried.
    Failed,
    /// Removed by `clear_queue`, muting or shutdown.
    Cancelled,
}

/// Handle returned by [`SpeechOutput::enqueue`].
#[derive(Debug)]
pub struct UtteranceTicket {
    id: u64,
    rx: oneshot::Receiver<UtteranceOutcome>,
}

impl UtteranceTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve once the request has been spoken, failed or been cancelled.
    pub async fn finished(self) -> UtteranceOutcome {
        self.rx.await.unwrap_or(UtteranceOutcome::Cancelled)
    }
}

/// An enqueued request. Immutable once queued.
struct UtteranceRequest {
    id: u64,
    text: String,
    rate: f32,
    pitch: f32,
    volume: f32,
    on_start: Option<Hook>,
    on_end: Option<Hook>,
    done: oneshot::Sender<UtteranceOutcome>,
}

impl UtteranceRequest {
    /// Complete without speaking. Hooks still fire (in order) so nobody waits forever.
    fn skip(self, outcome: UtteranceOutcome) {
        if let Some(hook) = self.on_start {
            hook();
        }
        if let Some(hook) = self.on_end {
            hook();
        }
        let _ = self.done.send(outcome);
    }
}

struct QueueState {
    items: VecDeque<UtteranceRequest>,
    /// Cancels the request being played, if any.
    current: Option<CancellationToken>,
    playing: bool,
    muted: bool,
}

struct Shared {
    engine: Arc<dyn TtsEngine>,
    settings: SpeechSettings,
    voice: Option<VoiceInfo>,
    clock: SpokeClock,
    state: Mutex<QueueState>,
    wake: Notify,
    speaking_tx: watch::Sender<bool>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
}

/// Cloneable handle to the speech output worker.
#[derive(Clone)]
pub struct SpeechOutput {
    shared: Arc<Shared>,
}

impl SpeechOutput {
    /// Select a voice and start the worker task. Must be called inside a Tokio runtime.
    pub fn spawn(engine: Arc<dyn TtsEngine>, settings: SpeechSettings, clock: SpokeClock) -> Self {
        let voice = select_voice(&engine.voices(), &settings.language);
        match &voice {
            Some(v) => info!(voice = %v.name, lang = %v.lang, "SpeechOutput: voice selected"),
            None => info!("SpeechOutput: engine offers no voices, using its default"),
        }
        let (speaking_tx, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            engine,
            settings,
            voice,
            clock,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                current: None,
                playing: false,
                muted: false,
            }),
            wake: Notify::new(),
            speaking_tx,
            shutdown: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        });
        tokio::spawn(run_worker(Arc::clone(&shared)));
        Self { shared }
    }

    /// Append a request to the queue. Empty text completes immediately; while muted the
    /// request is cancelled immediately. Hooks fire in both cases.
    pub fn enqueue(&self, text: impl Into<String>, options: SpeakOptions) -> UtteranceTicket {
        let settings = &self.shared.settings;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (done, rx) = oneshot::channel();
        let request = UtteranceRequest {
            id,
            text: text.into(),
            rate: options.rate.unwrap_or(settings.rate),
            pitch: options.pitch.unwrap_or(settings.pitch),
            volume: options.volume.unwrap_or(settings.volume),
            on_start: options.on_start,
            on_end: options.on_end,
            done,
        };
        let ticket = UtteranceTicket { id, rx };

        if request.text.trim().is_empty() {
            request.skip(UtteranceOutcome::Completed);
            return ticket;
        }

        let mut state = lock(&self.shared.state);
        if state.muted || self.shared.shutdown.is_cancelled() {
            drop(state);
            debug!(id, "speech muted; request skipped");
            request.skip(UtteranceOutcome::Cancelled);
            return ticket;
        }
        state.items.push_back(request);
        self.shared.speaking_tx.send_replace(true);
        drop(state);

        self.shared.wake.notify_one();
        ticket
    }

    /// Drop every queued request and halt the one playing.
    pub fn clear_queue(&self) {
        let (dropped, was_playing) = {
            let mut state = lock(&self.shared.state);
            let dropped: Vec<UtteranceRequest> = state.items.drain(..).collect();
            if let Some(token) = state.current.take() {
                token.cancel();
            }
            if !state.playing {
                self.shared.speaking_tx.send_replace(false);
            }
            (dropped, state.playing)
        };
        if was_playing {
            self.shared.engine.cancel();
        }
        if !dropped.is_empty() || was_playing {
            debug!(dropped = dropped.len(), was_playing, "speech queue cleared");
        }
        for request in dropped {
            let _ = request.done.send(UtteranceOutcome::Cancelled);
        }
    }

    /// True while anything is queued or playing.
    pub fn is_speaking(&self) -> bool {
        *self.shared.speaking_tx.borrow()
    }

    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.shared.speaking_tx.subscribe()
    }

    /// Audio toggle. Muting cancels everything that is queued or playing.
    pub fn set_muted(&self, muted: bool) {
        lock(&self.shared.state).muted = muted;
        if muted {
            self.clear_queue();
        }
        info!(muted, "SpeechOutput: audio toggled");
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.shared.state).muted
    }

    pub fn clock(&self) -> &SpokeClock {
        &self.shared.clock
    }

    pub fn voice(&self) -> Option<&VoiceInfo> {
        self.shared.voice.as_ref()
    }

    /// Cancel everything and stop the worker. Later enqueues are cancelled immediately.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.clear_queue();
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = lock(&shared.state);
            match state.items.pop_front() {
                Some(request) => {
                    let token = CancellationToken::new();
                    state.current = Some(token.clone());
                    state.playing = true;
                    Some((request, token))
                }
                None => {
                    state.current = None;
                    state.playing = false;
                    shared.speaking_tx.send_replace(false);
                    None
                }
            }
        };

        match next {
            Some((request, token)) => {
                let (done, outcome) = play(&shared, request, &token).await;
                let _ = done.send(outcome);
            }
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shared.shutdown.cancelled() => break,
                }
            }
        }
    }
    debug!("SpeechOutput: worker stopped");
}

/// Speak one logical request. Returns the completion channel and outcome.
async fn play(
    shared: &Shared,
    request: UtteranceRequest,
    token: &CancellationToken,
) -> (oneshot::Sender<UtteranceOutcome>, UtteranceOutcome) {
    let UtteranceRequest {
        id,
        text,
        rate,
        pitch,
        volume,
        mut on_start,
        mut on_end,
        done,
    } = request;
    let settings = &shared.settings;

    let chunks = if needs_chunking(&text, settings.chunk_threshold) {
        chunk_text(&text, settings.chunk_max_chars)
    } else {
        vec![text.trim().to_string()]
    };
    let total = chunks.len();

    let mut started = false;
    let mut outcome = UtteranceOutcome::Completed;

    for (index, chunk) in chunks.into_iter().enumerate() {
        if token.is_cancelled() {
            outcome = UtteranceOutcome::Cancelled;
            break;
        }
        if index > 0 {
            tokio::select! {
                _ = tokio::time::sleep(settings.chunk_pause()) => {}
                _ = token.cancelled() => {
                    outcome = UtteranceOutcome::Cancelled;
                    break;
                }
            }
        }

        let utterance = EngineUtterance {
            text: chunk,
            language: settings.language.clone(),
            voice: shared.voice.as_ref().map(|v| v.name.clone()),
            rate,
            pitch,
            volume,
        };

        if !started {
            started = true;
            shared.clock.mark();
            debug!(id, chunks = total, "utterance started");
            if let Some(hook) = on_start.take() {
                hook();
            }
        }

        let result = tokio::select! {
            r = shared.engine.speak(&utterance) => Some(r),
            _ = token.cancelled() => None,
        };
        match result {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!(id, chunk = index, error = %e, "TTS failed; treating utterance as finished");
                outcome = UtteranceOutcome::Failed;
                break;
            }
            None => {
                shared.engine.cancel();
                outcome = UtteranceOutcome::Cancelled;
                break;
            }
        }
    }

    if started {
        shared.clock.mark();
        debug!(id, ?outcome, "utterance ended");
        if let Some(hook) = on_end.take() {
            hook();
        }
    }
    (done, outcome)
}
