//! Kiosk front desk daemon (console edition)
//!
//! Runs the full coordinator with engines that need no hardware: spoken prompts are logged
//! by the placeholder TTS and stdin lines stand in for recognized speech. Camera events and
//! keyboard shortcuts are console commands (`:help`).

mod console;

use anyhow::Context;
use console::{parse_line, ConsoleInput, HELP};
use kiosk_core::{CameraStatus, KioskConfig, PresenceSample, Screen, SignalBus};
use kiosk_flow::{DeskController, DeskHandle, DeskParts};
use kiosk_intent::IntentRouter;
use kiosk_voice::{PlaceholderTts, ScriptedStt};
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Simulated speaking time per character for the placeholder voice.
const DEFAULT_TTS_MS_PER_CHAR: u64 = 40;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[kiosk-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = KioskConfig::load().context("load kiosk configuration")?;
    if std::env::args().any(|a| a == "--print-config") {
        println!("{}", config.to_toml().context("render configuration")?);
        return Ok(());
    }

    let per_char = std::env::var("KIOSK_TTS_MS_PER_CHAR")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TTS_MS_PER_CHAR);
    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(per_char)));
    let stt = Arc::new(ScriptedStt::new());
    let router = Arc::new(IntentRouter::from_settings(&config.intent, &config.speech.language));
    let bus = SignalBus::new();

    tracing::info!(
        app = %config.app_name,
        intent_mode = ?config.intent.mode,
        tts_ms_per_char = per_char,
        "Kiosk daemon started"
    );

    spawn_transition_log(&bus);
    let parts = DeskParts::new(config, tts, stt.clone(), router, bus.clone());
    let (desk, mut controller) = DeskController::spawn(parts);
    bus.camera.publish(CameraStatus::Active);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("read stdin")? {
                Some(line) => {
                    if !handle_line(&line, &desk, &bus, &stt) {
                        break;
                    }
                }
                None => {
                    tracing::info!("stdin closed; shutting down");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down daemon");
                break;
            }
            _ = &mut controller => {
                tracing::warn!("controller stopped unexpectedly");
                return Ok(());
            }
        }
    }

    desk.shutdown();
    controller.await.context("controller task")?;
    Ok(())
}

/// Act on one stdin line. Returns false to quit.
fn handle_line(line: &str, desk: &DeskHandle, bus: &SignalBus, stt: &ScriptedStt) -> bool {
    match parse_line(line) {
        ConsoleInput::Face => {
            bus.presence.publish(PresenceSample::facing());
        }
        ConsoleInput::Away => {
            bus.presence.publish(PresenceSample::absent());
        }
        ConsoleInput::Camera(on) => {
            let status = if on {
                CameraStatus::Active
            } else {
                CameraStatus::Inactive
            };
            bus.camera.publish(status);
        }
        ConsoleInput::Reset => {
            desk.reset();
        }
        ConsoleInput::Stop => {
            desk.force_stop_listening();
        }
        ConsoleInput::Audio(on) => {
            desk.set_audio(on);
        }
        ConsoleInput::Go(kind) => match Screen::plain(kind) {
            Some(screen) => {
                desk.navigate(screen);
            }
            None => println!("{kind} is reached by answering, not by navigation"),
        },
        ConsoleInput::Help => println!("{HELP}"),
        ConsoleInput::Quit => return false,
        ConsoleInput::Answer(text) => {
            // Heard by the microphone when a session is open, typed otherwise.
            if !stt.push_final(text.as_str()) {
                desk.manual_entry(text);
            }
        }
        ConsoleInput::Empty => {}
        ConsoleInput::Invalid(reason) => println!("{reason}"),
    }
    true
}

fn spawn_transition_log(bus: &SignalBus) {
    let mut transitions = bus.transitions.subscribe();
    let mut reading = bus.contract_reading.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                record = transitions.recv() => match record {
                    Ok(record) => match serde_json::to_string(&record) {
                        Ok(json) => tracing::info!(transition = %json, "screen transition"),
                        Err(e) => tracing::warn!(error = %e, "transition not serializable"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                reading = reading.recv() => match reading {
                    Ok(on) => tracing::info!(reading = on, "📜 contract reading"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}
