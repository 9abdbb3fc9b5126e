//! Integration tests for the speech output queue and its interplay with the listener.
//!
//! All timing runs on Tokio's paused clock; no audio hardware is involved.

use kiosk_core::{ListenerSettings, SpeechSettings};
use kiosk_voice::{
    ListenerEvent, PlaceholderTts, ScriptedStt, SpeakOptions, SpeechListener, SpeechOutput,
    SpokeClock, UtteranceOutcome,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{timeout, Instant};

type Log = Arc<Mutex<Vec<String>>>;

fn output(tts: &Arc<PlaceholderTts>) -> SpeechOutput {
    SpeechOutput::spawn(tts.clone(), SpeechSettings::default(), SpokeClock::new())
}

fn hooked(log: &Log, name: &str) -> SpeakOptions {
    let (start_log, end_log) = (log.clone(), log.clone());
    let (start, end) = (format!("{name}:start"), format!("{name}:end"));
    SpeakOptions::new()
        .on_start(move || start_log.lock().unwrap().push(start))
        .on_end(move || end_log.lock().unwrap().push(end))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test(start_paused = true)]
async fn requests_play_in_fifo_order() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(10)));
    let speech = output(&tts);
    let log: Log = Arc::default();

    let a = speech.enqueue("Birinci duyuru.", hooked(&log, "a"));
    let b = speech.enqueue("İkinci duyuru.", hooked(&log, "b"));
    let c = speech.enqueue("Üçüncü duyuru.", hooked(&log, "c"));
    assert!(speech.is_speaking());

    assert_eq!(a.finished().await, UtteranceOutcome::Completed);
    assert_eq!(b.finished().await, UtteranceOutcome::Completed);
    assert_eq!(c.finished().await, UtteranceOutcome::Completed);

    assert_eq!(
        tts.spoken_texts(),
        vec!["Birinci duyuru.", "İkinci duyuru.", "Üçüncü duyuru."]
    );
    assert_eq!(
        entries(&log),
        vec!["a:start", "a:end", "b:start", "b:end", "c:start", "c:end"]
    );

    let mut speaking = speech.subscribe_speaking();
    timeout(Duration::from_secs(1), speaking.wait_for(|s| !*s))
        .await
        .expect("output never went idle")
        .unwrap();
    assert!(speech.clock().last_spoke().is_some());
}

#[tokio::test(start_paused = true)]
async fn long_text_is_one_logical_utterance() {
    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(5)));
    let speech = output(&tts);
    let log: Log = Arc::default();

    let sentence = "Öğrenci ve veli okul yönetmeliğine uymayı kabul eder.";
    let text = vec![sentence; 6].join(" ");
    assert!(text.chars().count() > 300);

    let started = Instant::now();
    let ticket = speech.enqueue(text.clone(), hooked(&log, "contract"));
    assert_eq!(ticket.finished().await, UtteranceOutcome::Completed);

    let chunks = tts.spoken_texts();
    assert!(chunks.len() >= 3);
    assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    assert_eq!(chunks.join(" "), text);
    assert_eq!(entries(&log), vec!["contract:start", "contract:end"]);

    // Inter-chunk pauses are part of the utterance.
    let pauses = Duration::from_millis(250) * (chunks.len() as u32 - 1);
    assert!(started.elapsed() >= pauses);
}

#[tokio::test(start_paused = true)]
async fn engine_error_finishes_the_request_and_the_queue_moves_on() {
    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(10)).failing_on("bozuk"));
    let speech = output(&tts);
    let log: Log = Arc::default();

    let broken = speech.enqueue("Bu bozuk bir cümle.", hooked(&log, "broken"));
    let next = speech.enqueue("Sonraki cümle.", hooked(&log, "next"));

    assert_eq!(broken.finished().await, UtteranceOutcome::Failed);
    assert_eq!(next.finished().await, UtteranceOutcome::Completed);
    assert_eq!(
        entries(&log),
        vec!["broken:start", "broken:end", "next:start", "next:end"]
    );
}

#[tokio::test(start_paused = true)]
async fn clear_queue_halts_current_and_drops_pending() {
    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(50)));
    let speech = output(&tts);
    let log: Log = Arc::default();

    let current = speech.enqueue("Uzun bir karşılama mesajı okunuyor.", hooked(&log, "current"));
    let pending_one = speech.enqueue("Bekleyen bir.", hooked(&log, "one"));
    let pending_two = speech.enqueue("Bekleyen iki.", hooked(&log, "two"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    speech.clear_queue();

    assert_eq!(current.finished().await, UtteranceOutcome::Cancelled);
    assert_eq!(pending_one.finished().await, UtteranceOutcome::Cancelled);
    assert_eq!(pending_two.finished().await, UtteranceOutcome::Cancelled);
    assert_eq!(entries(&log), vec!["current:start", "current:end"]);
    assert_eq!(tts.spoken_texts().len(), 1);

    let mut speaking = speech.subscribe_speaking();
    timeout(Duration::from_millis(50), speaking.wait_for(|s| !*s))
        .await
        .expect("output still speaking after clear_queue")
        .unwrap();

    // The queue keeps working after a clear.
    let after = speech.enqueue("Yeni ekran.", SpeakOptions::new());
    assert_eq!(after.finished().await, UtteranceOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn muted_output_skips_requests_but_fires_hooks() {
    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(10)));
    let speech = output(&tts);
    let log: Log = Arc::default();

    speech.set_muted(true);
    assert!(speech.is_muted());
    let skipped = speech.enqueue("Duyulmayacak.", hooked(&log, "muted"));
    assert_eq!(skipped.finished().await, UtteranceOutcome::Cancelled);
    assert_eq!(entries(&log), vec!["muted:start", "muted:end"]);
    assert!(tts.spoken_texts().is_empty());
    assert!(!speech.is_speaking());

    speech.set_muted(false);
    let heard = speech.enqueue("Duyulacak.", SpeakOptions::new());
    assert_eq!(heard.finished().await, UtteranceOutcome::Completed);
    assert_eq!(tts.spoken_texts(), vec!["Duyulacak."]);
}

#[tokio::test(start_paused = true)]
async fn empty_text_completes_without_speaking() {
    let tts = Arc::new(PlaceholderTts::default());
    let speech = output(&tts);
    let log: Log = Arc::default();

    let ticket = speech.enqueue("   ", hooked(&log, "empty"));
    assert_eq!(ticket.finished().await, UtteranceOutcome::Completed);
    assert_eq!(entries(&log), vec!["empty:start", "empty:end"]);
    assert!(tts.spoken_texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn listener_never_overlaps_output() {
    let tts = Arc::new(PlaceholderTts::new(Duration::from_millis(20)));
    let stt = Arc::new(ScriptedStt::new());
    let clock = SpokeClock::new();
    let speech = SpeechOutput::spawn(tts.clone(), SpeechSettings::default(), clock.clone());
    let (listener, mut events) = SpeechListener::spawn(
        stt.clone(),
        speech.subscribe_speaking(),
        clock,
        ListenerSettings::default(),
    );

    // 50 characters at 20ms each: one second of speech.
    let prompt = "Lütfen öğrencinin adını ve soyadını söyleyiniz....";
    let ticket = speech.enqueue(prompt, SpeakOptions::new());
    listener.set_listening(true);

    assert_eq!(ticket.finished().await, UtteranceOutcome::Completed);
    let finished_at = Instant::now();
    assert_eq!(stt.start_count(), 0, "listener started while the kiosk was talking");

    let started = timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await {
                Some(ListenerEvent::SessionStarted { .. }) => return Instant::now(),
                Some(_) => continue,
                None => panic!("listener stopped"),
            }
        }
    })
    .await
    .expect("listener never started");
    assert!(started - finished_at >= Duration::from_millis(900));

    // Output starting again stops the session within one reconcile tick.
    speech.enqueue("Anlayamadım, tekrar söyler misiniz?", SpeakOptions::new());
    let stopped = timeout(Duration::from_millis(301), async {
        while let Some(event) = events.recv().await {
            if matches!(event, ListenerEvent::SessionStopped { .. }) {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(stopped, Ok(true));
    assert!(!stt.is_active());
}
