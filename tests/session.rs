//! Request and playback lifecycle against a mock Kokoro server.

mod common;

use common::{session, wav_bytes, Call, FakePlayers, FAKE_DURATION};
use kokoro_speak_lib::tts::{PlaybackPhase, PlayerEventKind};
use kokoro_speak_lib::SessionError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_wav(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes(240)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ── Synthesis ──────────────────────────────────────────────────────────

#[tokio::test]
async fn posts_text_once_and_starts_playing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(serde_json::json!({
            "model": "kokoro",
            "input": "Hello from the reader.",
            "voice": "af_sky",
            "response_format": "wav",
            "speed": 1.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes(240)))
        .expect(1)
        .mount(&server)
        .await;

    let players = Arc::new(FakePlayers::default());
    let mut session = session(&server.uri(), players.clone());
    session.set_text("Hello from the reader.");

    session.generate_speech().await.unwrap();

    assert!(session.has_audio());
    assert_eq!(session.live_audio_handles(), 1);
    assert!(session.playback().is_playing());
    assert!(!session.request().is_loading);
    assert_eq!(session.request().error, None);
    assert_eq!(players.count(), 1);
    players.with_last(|p| {
        assert_eq!(p.audio, wav_bytes(240));
        assert_eq!(p.calls(), vec![Call::Play]);
    });

    let events = session.pump_events();
    assert_eq!(events, vec![PlayerEventKind::Metadata { duration: FAKE_DURATION }]);
    assert_eq!(session.playback().duration, FAKE_DURATION);
}

#[tokio::test]
async fn trailing_slash_on_server_url_is_ignored() {
    let server = MockServer::start().await;
    mount_wav(&server, 1).await;

    let players = Arc::new(FakePlayers::default());
    let mut session = session(&format!("{}/", server.uri()), players);
    session.set_text("slash");
    session.generate_speech().await.unwrap();
}

#[tokio::test]
async fn voice_and_speed_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_json(serde_json::json!({
            "model": "kokoro",
            "input": "Cheerio",
            "voice": "bm_george",
            "response_format": "wav",
            "speed": 1.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes(10)))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session(&server.uri(), Arc::new(FakePlayers::default()));
    session.set_voice(kokoro_speak_lib::Voice::BmGeorge);
    session.set_speed(1.5).unwrap();
    session.set_text("Cheerio");
    session.generate_speech().await.unwrap();
}

#[tokio::test]
async fn blank_text_never_reaches_server() {
    let server = MockServer::start().await;
    mount_wav(&server, 0).await;

    let players = Arc::new(FakePlayers::default());
    let mut session = session(&server.uri(), players.clone());

    for text in ["", "   ", "\n\t  \n"] {
        session.set_text(text);
        let err = session.generate_speech().await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyInput));
        assert!(err.is_validation());
        assert_eq!(session.request().error.as_deref(), Some("Please enter some text"));
        assert!(!session.request().is_loading);
    }
    assert_eq!(players.count(), 0);
}

#[tokio::test]
async fn repeated_generation_keeps_one_live_handle() {
    let server = MockServer::start().await;
    mount_wav(&server, 3).await;

    let players = Arc::new(FakePlayers::default());
    let mut session = session(&server.uri(), players.clone());
    session.set_text("Again and again");

    for _ in 0..3 {
        session.generate_speech().await.unwrap();
        assert_eq!(session.live_audio_handles(), 1);
    }

    assert_eq!(players.count(), 3);
    // Earlier players were paused when they were released
    for n in 0..2 {
        players.with_nth(n, |p| assert_eq!(p.calls(), vec![Call::Play, Call::Pause]));
    }
    players.with_nth(2, |p| assert_eq!(p.calls(), vec![Call::Play]));
}

#[tokio::test]
async fn server_error_reports_status_and_clears_loading() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let players = Arc::new(FakePlayers::default());
    let mut session = session(&server.uri(), players.clone());
    session.set_text("This will fail");

    let err = session.generate_speech().await.unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(!session.request().is_loading);
    assert!(session.request().error.as_deref().unwrap().contains("500"));
    assert!(!session.has_audio());
    assert_eq!(session.playback().phase, PlaybackPhase::Idle);
    assert_eq!(players.count(), 0);
}

#[tokio::test]
async fn failed_request_releases_previous_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes(10)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = session(&server.uri(), Arc::new(FakePlayers::default()));
    session.set_text("first works, second fails");
    session.generate_speech().await.unwrap();
    assert_eq!(session.live_audio_handles(), 1);

    let err = session.generate_speech().await.unwrap_err();
    assert_eq!(err.to_string(), "Server error: 503");
    assert_eq!(session.live_audio_handles(), 0);
    assert!(!session.has_audio());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Reserve a port, then free it so nothing is listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut session = session(&format!("http://127.0.0.1:{}", port), Arc::new(FakePlayers::default()));
    session.set_text("anyone there?");

    let err = session.generate_speech().await.unwrap_err();
    assert!(err.to_string().starts_with("Network error"), "{}", err);
    assert!(!session.request().is_loading);
}

#[tokio::test]
async fn loading_clears_when_request_is_abandoned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(wav_bytes(10))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut session = session(&server.uri(), Arc::new(FakePlayers::default()));
    session.set_text("slow");

    let outcome = tokio::time::timeout(Duration::from_millis(100), session.generate_speech()).await;
    assert!(outcome.is_err());
    assert!(!session.request().is_loading);
    assert!(!session.has_audio());
}

#[tokio::test]
async fn undecodable_audio_is_released() {
    let server = MockServer::start().await;
    mount_wav(&server, 1).await;

    let mut session = session(&server.uri(), Arc::new(FakePlayers::failing_open()));
    session.set_text("garbled");

    let err = session.generate_speech().await.unwrap_err();
    assert!(err.to_string().starts_with("Error playing audio"));
    assert_eq!(session.live_audio_handles(), 0);
    assert!(!session.request().is_loading);
}

#[tokio::test]
async fn autoplay_failure_keeps_audio_but_not_playing() {
    let server = MockServer::start().await;
    mount_wav(&server, 1).await;

    let mut session = session(&server.uri(), Arc::new(FakePlayers::failing_play()));
    session.set_text("blocked autoplay");

    let err = session.generate_speech().await.unwrap_err();
    assert!(err.to_string().contains("device busy"));
    assert!(session.has_audio());
    assert_eq!(session.playback().phase, PlaybackPhase::Errored);
    assert!(!session.request().is_loading);
}

// ── Playback ───────────────────────────────────────────────────────────

async fn playing_session(server: &MockServer, players: Arc<FakePlayers>) -> kokoro_speak_lib::SpeechSession {
    mount_wav(server, 1).await;
    let mut session = session(&server.uri(), players);
    session.set_text("Some words to play");
    session.generate_speech().await.unwrap();
    session.pump_events();
    session
}

#[tokio::test]
async fn controls_are_noops_without_audio() {
    let players = Arc::new(FakePlayers::default());
    let mut session = session("http://127.0.0.1:9", players);

    session.toggle_play_pause().unwrap();
    session.stop();
    session.seek(3.0).unwrap();
    assert_eq!(session.download(None).unwrap(), None);
    assert_eq!(session.playback().phase, PlaybackPhase::Idle);
    assert_eq!(session.playback().current_time, 0.0);
}

#[tokio::test]
async fn toggle_pauses_and_resumes() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players.clone()).await;

    session.toggle_play_pause().unwrap();
    assert_eq!(session.playback().phase, PlaybackPhase::Paused);
    session.toggle_play_pause().unwrap();
    assert!(session.playback().is_playing());

    players.with_last(|p| assert_eq!(p.calls(), vec![Call::Play, Call::Pause, Call::Play]));
}

#[tokio::test]
async fn stop_rewinds_from_any_state() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players.clone()).await;

    players.with_last(|p| p.emit(PlayerEventKind::TimeUpdate { position: 6.2 }));
    session.pump_events();
    assert_eq!(session.playback().current_time, 6.2);

    session.stop();
    assert_eq!(session.playback().current_time, 0.0);
    assert!(!session.playback().is_playing());

    // Stopping twice, or while paused, changes nothing
    session.toggle_play_pause().unwrap();
    session.toggle_play_pause().unwrap();
    session.stop();
    session.stop();
    assert_eq!(session.playback().current_time, 0.0);
    assert!(!session.playback().is_playing());

    players.with_last(|p| {
        let calls = p.calls();
        assert!(calls.contains(&Call::Seek(Duration::ZERO)));
    });
}

#[tokio::test]
async fn seek_mirrors_position_and_clamps() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players.clone()).await;

    for target in [0.0, 4.5, FAKE_DURATION] {
        session.seek(target).unwrap();
        assert_eq!(session.playback().current_time, target);
    }

    session.seek(25.0).unwrap();
    assert_eq!(session.playback().current_time, FAKE_DURATION);
    session.seek(-2.0).unwrap();
    assert_eq!(session.playback().current_time, 0.0);

    players.with_last(|p| {
        assert!(p.calls().contains(&Call::Seek(Duration::from_secs_f64(4.5))));
    });
}

#[tokio::test]
async fn track_end_resets_position_but_keeps_duration() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players.clone()).await;

    players.with_last(|p| {
        p.emit(PlayerEventKind::TimeUpdate { position: 9.9 });
        p.emit(PlayerEventKind::Ended);
    });
    session.pump_events();

    let playback = session.playback();
    assert_eq!(playback.phase, PlaybackPhase::Stopped);
    assert_eq!(playback.current_time, 0.0);
    assert_eq!(playback.duration, FAKE_DURATION);
}

#[tokio::test]
async fn player_error_forces_stop_and_reports() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players.clone()).await;

    players.with_last(|p| p.emit(PlayerEventKind::Error("output device lost".to_string())));
    session.pump_events();

    assert_eq!(session.playback().phase, PlaybackPhase::Errored);
    assert!(!session.playback().is_playing());
    assert_eq!(
        session.request().error.as_deref(),
        Some("Error playing audio: output device lost")
    );
}

#[tokio::test]
async fn events_from_released_audio_are_ignored() {
    let server = MockServer::start().await;
    mount_wav(&server, 2).await;

    let players = Arc::new(FakePlayers::default());
    let mut session = common::session(&server.uri(), players.clone());
    session.set_text("twice");
    session.generate_speech().await.unwrap();
    session.generate_speech().await.unwrap();
    session.pump_events();

    players.with_nth(0, |old| {
        old.emit(PlayerEventKind::Ended);
        old.emit(PlayerEventKind::Error("stale".to_string()));
    });
    let applied = session.pump_events();

    assert!(applied.is_empty());
    assert!(session.playback().is_playing());
    assert_eq!(session.request().error, None);
}

#[tokio::test]
async fn stale_ticks_after_pause_are_ignored() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players.clone()).await;

    session.seek(2.0).unwrap();
    session.toggle_play_pause().unwrap();
    players.with_last(|p| p.emit(PlayerEventKind::TimeUpdate { position: 7.0 }));
    session.pump_events();

    assert_eq!(session.playback().current_time, 2.0);
}

#[tokio::test]
async fn download_writes_speech_wav() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let mut session = playing_session(&server, players).await;

    let dir = tempfile::tempdir().unwrap();
    let saved = session.download(Some(dir.path())).unwrap().unwrap();

    assert_eq!(saved, dir.path().join("speech.wav"));
    assert_eq!(std::fs::read(&saved).unwrap(), wav_bytes(240));
}

#[tokio::test]
async fn dropping_session_releases_audio() {
    let server = MockServer::start().await;
    let players = Arc::new(FakePlayers::default());
    let session = playing_session(&server, players.clone()).await;

    drop(session);
    players.with_last(|p| assert_eq!(p.calls().last(), Some(&Call::Pause)));
}
