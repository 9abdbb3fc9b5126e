//! **DeskController**: the screen state machine.
//!
//! One task owns the current [`Screen`] and everything that depends on it: the epoch used to
//! reject stale callbacks, the listening request id, the countdown and the transition
//! cooldown. Everyone else talks to it through a [`DeskHandle`].
//!
//! Entering a screen always runs the same procedure: bump the epoch, silence speech, stop
//! listening, drop the old countdown, publish the new state, then after `settle_delay` run
//! the screen's entry plan (prompt, listening, countdown).

use crate::countdown::ScreenCountdown;
use kiosk_core::{
    fill_prompt, CameraStatus, Grade, KioskConfig, PresenceSample, Prompts, Screen, ScreenKind,
    SignalBus, StaffDirectory, StaffMember, TransitionCause, TransitionRecord,
};
use kiosk_intent::{affirmation, IntentClassifier, IntentResult, MenuIntent};
use kiosk_voice::{
    wait_for_handoff, ListenerEvent, PresenceDetector, ResultSource, SelfTriggerGuard,
    SpeakOptions, SpeechListener, SpeechOutput, SttEngine, TtsEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Requests from the outside (buttons, keyboard, console).
#[derive(Debug, Clone, PartialEq)]
pub enum DeskCommand {
    /// Back to `Start` from anywhere, ignoring the cooldown.
    Reset,
    ForceStopListening,
    /// Button navigation; subject to the transition rules and the cooldown.
    Navigate(Screen),
    /// Typed answer, handled like a recognized one.
    ManualEntry(String),
    /// Audio on/off.
    SetAudio(bool),
    Shutdown,
}

/// Messages the controller schedules for itself. Each carries the epoch it belongs to.
#[derive(Debug)]
enum Internal {
    Settled {
        epoch: u64,
    },
    Transition {
        epoch: u64,
        screen: Screen,
        cause: TransitionCause,
    },
    Countdown {
        epoch: u64,
    },
    Classified {
        epoch: u64,
        transcript: String,
        result: IntentResult,
    },
}

/// Everything the controller drives.
pub struct DeskParts {
    pub config: KioskConfig,
    pub speech: SpeechOutput,
    pub listener: SpeechListener,
    pub listener_events: mpsc::UnboundedReceiver<ListenerEvent>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub bus: SignalBus,
}

impl DeskParts {
    /// Spawn the speech output and listener tasks over the given engines.
    pub fn new(
        config: KioskConfig,
        tts: Arc<dyn TtsEngine>,
        stt: Arc<dyn SttEngine>,
        classifier: Arc<dyn IntentClassifier>,
        bus: SignalBus,
    ) -> Self {
        let speech = SpeechOutput::spawn(tts, config.speech.clone(), Default::default());
        let (listener, listener_events) = SpeechListener::spawn(
            stt,
            speech.subscribe_speaking(),
            speech.clock().clone(),
            config.listener.clone(),
        );
        Self {
            config,
            speech,
            listener,
            listener_events,
            classifier,
            bus,
        }
    }
}

/// Cloneable handle to a running controller.
#[derive(Clone)]
pub struct DeskHandle {
    commands: mpsc::UnboundedSender<DeskCommand>,
    screen: watch::Receiver<Screen>,
    bus: SignalBus,
}

impl DeskHandle {
    pub fn send(&self, command: DeskCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn reset(&self) -> bool {
        self.send(DeskCommand::Reset)
    }

    pub fn force_stop_listening(&self) -> bool {
        self.send(DeskCommand::ForceStopListening)
    }

    pub fn navigate(&self, screen: Screen) -> bool {
        self.send(DeskCommand::Navigate(screen))
    }

    pub fn manual_entry(&self, text: impl Into<String>) -> bool {
        self.send(DeskCommand::ManualEntry(text.into()))
    }

    pub fn set_audio(&self, on: bool) -> bool {
        self.send(DeskCommand::SetAudio(on))
    }

    pub fn shutdown(&self) -> bool {
        self.send(DeskCommand::Shutdown)
    }

    pub fn screen(&self) -> Screen {
        self.screen.borrow().clone()
    }

    pub fn subscribe_screen(&self) -> watch::Receiver<Screen> {
        self.screen.clone()
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }
}

pub struct DeskController {
    prompts: Prompts,
    directory: StaffDirectory,
    settle_delay: Duration,
    cooldown: Duration,
    countdown_duration: Duration,
    handoff_fallback: Duration,

    speech: SpeechOutput,
    listener: SpeechListener,
    classifier: Arc<dyn IntentClassifier>,
    guard: SelfTriggerGuard,
    presence: PresenceDetector,
    bus: SignalBus,

    screen: Screen,
    screen_tx: watch::Sender<Screen>,
    epoch: u64,
    /// Listening request armed by the current screen.
    listen_request: Option<u64>,
    countdown: Option<ScreenCountdown>,
    cooldown_until: Option<Instant>,
    /// A presence handoff is pending for this epoch.
    greeting: bool,
    contract_reading: bool,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl DeskController {
    /// Start the controller task on `Start`.
    pub fn spawn(parts: DeskParts) -> (DeskHandle, JoinHandle<()>) {
        let DeskParts {
            config,
            speech,
            listener,
            listener_events,
            classifier,
            bus,
        } = parts;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (screen_tx, screen_rx) = watch::channel(Screen::Start);
        let camera_rx = bus.camera.subscribe();
        let presence_rx = bus.presence.subscribe();

        let controller = DeskController {
            guard: SelfTriggerGuard::new(speech.clock().clone(), config.guard.buffer()),
            presence: PresenceDetector::new(config.presence.confirm_threshold),
            settle_delay: config.screens.settle_delay(),
            cooldown: config.screens.transition_cooldown(),
            countdown_duration: config.screens.countdown(),
            handoff_fallback: config.presence.handoff_fallback(),
            prompts: config.prompts,
            directory: config.staff,
            speech,
            listener,
            classifier,
            bus: bus.clone(),
            screen: Screen::Start,
            screen_tx,
            epoch: 0,
            listen_request: None,
            countdown: None,
            cooldown_until: None,
            greeting: false,
            contract_reading: false,
            internal_tx,
        };

        let inputs = Inputs {
            commands: command_rx,
            internal: internal_rx,
            listener: listener_events,
            camera: camera_rx,
            presence: presence_rx,
        };
        let task = tokio::spawn(controller.run(inputs));
        let handle = DeskHandle {
            commands,
            screen: screen_rx,
            bus,
        };
        (handle, task)
    }

    async fn run(mut self, mut inputs: Inputs) {
        info!("🏫 front desk controller started");
        loop {
            tokio::select! {
                command = inputs.commands.recv() => match command {
                    Some(DeskCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(message) = inputs.internal.recv() => self.handle_internal(message),
                Some(event) = inputs.listener.recv() => self.handle_listener(event),
                status = inputs.camera.recv() => match status {
                    Ok(status) => self.handle_camera(status),
                    Err(broadcast::error::RecvError::Lagged(n)) => debug!(missed = n, "camera status lagged"),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                sample = inputs.presence.recv() => match sample {
                    Ok(sample) => self.handle_presence(sample),
                    Err(broadcast::error::RecvError::Lagged(n)) => debug!(missed = n, "presence samples lagged"),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        self.countdown = None;
        self.speech.shutdown();
        self.listener.shutdown();
        info!("🏫 front desk controller stopped");
    }

    // ----- transitions -----

    fn in_cooldown(&self) -> bool {
        self.cooldown_until.is_some_and(|t| Instant::now() < t)
    }

    /// The entry procedure. Callers have already checked the transition rules.
    fn enter(&mut self, screen: Screen, cause: TransitionCause) {
        let from = self.screen.kind();
        let to = screen.kind();
        self.epoch += 1;

        self.speech.clear_queue();
        self.listener.set_listening(false);
        self.listen_request = None;
        self.countdown = None;
        self.greeting = false;
        self.set_contract_reading(false);
        if to == ScreenKind::Start {
            self.presence.reset();
        }

        self.screen = screen.clone();
        self.screen_tx.send_replace(screen);
        self.bus
            .transitions
            .publish(TransitionRecord::now(from, to, cause));
        info!(from = %from, to = %to, ?cause, epoch = self.epoch, "🖥️ screen changed");

        self.cooldown_until = Some(Instant::now() + self.cooldown);
        self.schedule(self.settle_delay, Internal::Settled { epoch: self.epoch });
    }

    /// Button presses and voice answers: dropped during the cooldown.
    fn external_transition(&mut self, screen: Screen, cause: TransitionCause) {
        if self.in_cooldown() {
            debug!(to = %screen.kind(), "transition ignored during cooldown");
            return;
        }
        self.checked_enter(screen, cause);
    }

    /// Timeouts, handoffs and classification results: delayed past the cooldown.
    fn internal_transition(&mut self, epoch: u64, screen: Screen, cause: TransitionCause) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "stale transition dropped");
            return;
        }
        if let Some(until) = self.cooldown_until.filter(|t| Instant::now() < *t) {
            let delay = until.saturating_duration_since(Instant::now());
            self.schedule(delay, Internal::Transition { epoch, screen, cause });
            return;
        }
        self.checked_enter(screen, cause);
    }

    fn checked_enter(&mut self, screen: Screen, cause: TransitionCause) {
        let from = self.screen.kind();
        if !from.can_transition_to(screen.kind()) {
            warn!(from = %from, to = %screen.kind(), "transition not allowed");
            return;
        }
        self.enter(screen, cause);
    }

    fn schedule(&self, delay: Duration, message: Internal) {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
    }

    // ----- entry plans -----

    fn run_entry_plan(&mut self) {
        let epoch = self.epoch;
        match self.screen.clone() {
            Screen::Start => {}
            Screen::PresenceCheck => {
                self.say(&self.prompts.greeting);
                self.handoff(epoch, Screen::Menu, TransitionCause::Handoff);
            }
            Screen::Menu => self.ask(&self.prompts.menu.clone()),
            Screen::AttendanceLookup => self.ask(&self.prompts.attendance_ask.clone()),
            Screen::AttendanceResult { student } => {
                let text = fill_prompt(&self.prompts.attendance_result, &[("student", student.as_str())]);
                self.say(&text);
            }
            Screen::RegistrationContract => {
                self.set_contract_reading(true);
                let bus = self.bus.clone();
                let contract = self.prompts.contract_text.clone();
                self.speech.enqueue(
                    contract,
                    SpeakOptions::new().on_end(move || {
                        bus.contract_reading.publish(false);
                    }),
                );
                self.ask(&self.prompts.contract_ask.clone());
            }
            Screen::RegistrationForm => self.say(&self.prompts.registration_form),
            Screen::GradeSelection => self.ask(&self.prompts.grade_ask.clone()),
            Screen::StaffDirection { grade, staff } => {
                let text = staff_prompt(&self.prompts.staff_direction, &staff, Some(grade));
                self.say(&text);
            }
            Screen::DirectStaffDirection { staff, .. } => {
                let text = staff_prompt(&self.prompts.direct_staff_direction, &staff, None);
                self.say(&text);
            }
        }

        if self.screen.kind().has_countdown() {
            self.countdown = Some(ScreenCountdown::start(
                self.countdown_duration,
                self.internal_tx.clone(),
                Internal::Countdown { epoch },
            ));
        }
    }

    fn say(&self, text: &str) {
        self.speech.enqueue(text, SpeakOptions::new());
    }

    /// Speak a prompt and listen for the answer.
    fn ask(&mut self, prompt: &str) {
        self.say(prompt);
        self.listen();
    }

    fn listen(&mut self) {
        self.listen_request = Some(self.listener.set_listening(true));
    }

    fn not_understood(&mut self) {
        self.ask(&self.prompts.not_understood.clone());
    }

    /// Move on once the current prompt is done (or the fallback fires).
    fn handoff(&self, epoch: u64, screen: Screen, cause: TransitionCause) {
        let speaking = self.speech.subscribe_speaking();
        let fallback = self.handoff_fallback;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let how = wait_for_handoff(speaking, fallback).await;
            debug!(?how, to = %screen.kind(), "handoff released");
            let _ = tx.send(Internal::Transition { epoch, screen, cause });
        });
    }

    fn set_contract_reading(&mut self, reading: bool) {
        if self.contract_reading != reading {
            self.contract_reading = reading;
            self.bus.contract_reading.publish(reading);
        }
    }

    // ----- inputs -----

    fn handle_command(&mut self, command: DeskCommand) {
        match command {
            DeskCommand::Reset => {
                info!("🔄 reset");
                self.listener.reset();
                self.enter(Screen::Start, TransitionCause::Reset);
            }
            DeskCommand::ForceStopListening => {
                self.listen_request = None;
                self.listener.force_stop();
            }
            DeskCommand::Navigate(screen) => {
                self.external_transition(screen, TransitionCause::Navigation)
            }
            DeskCommand::ManualEntry(text) => self.listener.submit_manual(text),
            DeskCommand::SetAudio(on) => self.speech.set_muted(!on),
            DeskCommand::Shutdown => {}
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Settled { epoch } if epoch == self.epoch => self.run_entry_plan(),
            Internal::Transition {
                epoch,
                screen,
                cause,
            } => self.internal_transition(epoch, screen, cause),
            Internal::Countdown { epoch } if epoch == self.epoch => {
                let Some(target) = self.screen.kind().timeout_target() else {
                    return;
                };
                if let Some(screen) = Screen::plain(target) {
                    info!(to = %target, "⏳ screen timed out");
                    self.internal_transition(epoch, screen, TransitionCause::Timeout);
                }
            }
            Internal::Classified {
                epoch,
                transcript,
                result,
            } if epoch == self.epoch => self.apply_classification(epoch, &transcript, result),
            other => debug!(?other, current = self.epoch, "stale message dropped"),
        }
    }

    fn handle_listener(&mut self, event: ListenerEvent) {
        match event {
            ListenerEvent::Result {
                text,
                request,
                source,
            } => self.handle_answer(text, request, source),
            ListenerEvent::Advisory { message, error, .. } => {
                warn!(%error, "🎤 {message}");
            }
            ListenerEvent::ListeningEnd { request } => {
                if self.listen_request == Some(request) {
                    self.listen_request = None;
                }
            }
            ListenerEvent::Interim { text, .. } => debug!(text = %text, "interim transcript"),
            ListenerEvent::SessionStarted { .. } | ListenerEvent::SessionStopped { .. } => {}
        }
    }

    fn handle_answer(&mut self, text: String, request: u64, source: ResultSource) {
        let kind = self.screen.kind();
        if !kind.listens() {
            debug!(screen = %kind, "answer on a screen that does not listen");
            return;
        }
        match source {
            ResultSource::Voice => {
                if self.listen_request != Some(request) {
                    debug!(request, current = ?self.listen_request, "stale recognition result");
                    return;
                }
                if !self.guard.admit(&text) {
                    self.listen();
                    return;
                }
            }
            // Typed text can't be an echo and is never stale.
            ResultSource::Manual => {}
        }
        if self.in_cooldown() {
            debug!(text = %text, "answer ignored during cooldown");
            self.listen();
            return;
        }

        info!(screen = %kind, text = %text, "🗣️ answer");
        match kind {
            ScreenKind::Menu | ScreenKind::GradeSelection => self.classify(text),
            ScreenKind::AttendanceLookup => {
                let student = text.trim().to_string();
                self.external_transition(Screen::AttendanceResult { student }, TransitionCause::Voice);
            }
            ScreenKind::RegistrationContract => match affirmation(&text) {
                Some(true) => self.external_transition(Screen::RegistrationForm, TransitionCause::Voice),
                Some(false) => self.external_transition(Screen::Menu, TransitionCause::Voice),
                None => self.ask(&self.prompts.contract_ask.clone()),
            },
            _ => {}
        }
    }

    fn classify(&self, transcript: String) {
        let classifier = Arc::clone(&self.classifier);
        let tx = self.internal_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = match classifier.classify(&transcript).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(classifier = classifier.name(), error = %e, "classification failed");
                    IntentResult::not_understood()
                }
            };
            let _ = tx.send(Internal::Classified {
                epoch,
                transcript,
                result,
            });
        });
    }

    fn apply_classification(&mut self, epoch: u64, transcript: &str, result: IntentResult) {
        let next = match self.screen.kind() {
            ScreenKind::Menu => self.menu_choice(transcript, &result),
            ScreenKind::GradeSelection => result.grade().and_then(|grade| {
                self.directory
                    .for_grade(grade)
                    .map(|staff| Screen::StaffDirection {
                        grade,
                        staff: staff.clone(),
                    })
            }),
            _ => return,
        };
        match next {
            Some(screen) => self.internal_transition(epoch, screen, TransitionCause::Voice),
            None => {
                debug!(?result, "classification not actionable; asking again");
                self.not_understood();
            }
        }
    }

    fn menu_choice(&self, transcript: &str, result: &IntentResult) -> Option<Screen> {
        match result.menu_intent() {
            Some(MenuIntent::DirectStaff) | None => {
                self.directory
                    .match_transcript(transcript)
                    .map(|staff| Screen::DirectStaffDirection {
                        staff: staff.clone(),
                        reason: result.intent.clone(),
                    })
            }
            Some(intent) => Screen::plain(intent.target()),
        }
    }

    fn handle_camera(&mut self, status: CameraStatus) {
        info!(?status, "📷 camera status");
        self.presence.set_camera(status);
        if status != CameraStatus::Inactive {
            return;
        }
        // The welcome or greeting is for someone the camera can no longer see. Re-entering
        // `Start` silences it and outdates the pending handoff.
        let greeting_pending = self.screen.kind() == ScreenKind::Start && self.greeting;
        if greeting_pending || self.screen.kind() == ScreenKind::PresenceCheck {
            self.enter(Screen::Start, TransitionCause::CameraLost);
        }
    }

    fn handle_presence(&mut self, sample: PresenceSample) {
        if self.screen.kind() != ScreenKind::Start || self.greeting {
            return;
        }
        if self.presence.observe(sample) {
            self.greeting = true;
            self.say(&self.prompts.welcome);
            self.handoff(self.epoch, Screen::PresenceCheck, TransitionCause::Presence);
        }
    }
}

struct Inputs {
    commands: mpsc::UnboundedReceiver<DeskCommand>,
    internal: mpsc::UnboundedReceiver<Internal>,
    listener: mpsc::UnboundedReceiver<ListenerEvent>,
    camera: broadcast::Receiver<CameraStatus>,
    presence: broadcast::Receiver<PresenceSample>,
}

fn staff_prompt(template: &str, staff: &StaffMember, grade: Option<Grade>) -> String {
    let grade = grade.map(|g| g.to_string()).unwrap_or_default();
    fill_prompt(
        template,
        &[
            ("name", staff.name.as_str()),
            ("title", staff.title.as_str()),
            ("office", staff.office.as_str()),
            ("grade", grade.as_str()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_prompt_fills_placeholders() {
        let staff = StaffMember::new("Ayşe Yılmaz", "Müdür Yardımcısı", "zemin kat, 104", &[]);
        let text = staff_prompt(
            "{grade}. sınıflardan {title} {name} sorumlu. Ofisi {office}.",
            &staff,
            Grade::new(9),
        );
        assert_eq!(
            text,
            "9. sınıflardan Müdür Yardımcısı Ayşe Yılmaz sorumlu. Ofisi zemin kat, 104."
        );
    }
}
