use super::*;
use crate::audio::{SilentChime, SimulatedBackend};
use crate::config::AudioConfig;

const VOICE: &str = "/sounds/voice-guided.wav";

struct Harness {
    coordinator: Arc<AudioSessionCoordinator>,
    chime: Arc<SilentChime>,
    timer: SessionTimer,
}

fn harness() -> Harness {
    let backend = || Arc::new(SimulatedBackend::new().with_source(VOICE, 600.0));
    let coordinator = Arc::new(AudioSessionCoordinator::new(
        backend(),
        backend(),
        &AudioConfig::default(),
    ));
    let chime = Arc::new(SilentChime::new());
    let timer = SessionTimer::new(
        Arc::clone(&coordinator),
        ChannelKind::Voice,
        chime.clone(),
        &SessionConfig::default(),
    )
    .unwrap();
    Harness {
        coordinator,
        chime,
        timer,
    }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn voice_volume(h: &Harness) -> f32 {
    h.coordinator.volume(ChannelKind::Voice)
}

#[test]
fn test_fade_config_validation() {
    let min = Duration::from_millis(10);
    assert!(matches!(
        FadeConfig::new(Duration::from_secs(3), 0, min),
        Err(SessionError::InvalidFade { .. })
    ));
    assert!(matches!(
        FadeConfig::new(Duration::ZERO, 20, min),
        Err(SessionError::InvalidFade { .. })
    ));

    let fade = FadeConfig::new(Duration::from_secs(3), 20, min).unwrap();
    assert_eq!(fade.step_interval(), Duration::from_millis(150));
}

#[test]
fn test_step_interval_floor() {
    let fade = FadeConfig::new(Duration::from_millis(100), 20, Duration::from_millis(10)).unwrap();
    assert_eq!(fade.step_interval(), Duration::from_millis(10));
}

#[test]
fn test_volume_curve_reaches_zero() {
    let fade = FadeConfig::new(Duration::from_secs(1), 4, Duration::from_millis(10)).unwrap();
    assert_eq!(fade.volume_at(0.8, 0), 0.8);
    assert_eq!(fade.volume_at(0.8, 2), 0.4);
    assert_eq!(fade.volume_at(0.8, 4), 0.0);
}

#[test]
fn test_invalid_session_config_rejected() {
    let h = harness();
    let config = SessionConfig {
        fade_steps: 0,
        ..SessionConfig::default()
    };
    let result = SessionTimer::new(
        Arc::clone(&h.coordinator),
        ChannelKind::Voice,
        h.chime.clone(),
        &config,
    );
    assert!(matches!(result, Err(SessionError::InvalidFade { .. })));
}

#[test]
fn test_start_outside_runtime() {
    let h = harness();
    assert_eq!(h.timer.start(5), Err(SessionError::NoRuntime));
    assert_eq!(h.timer.remaining(), None);
}

#[tokio::test(start_paused = true)]
async fn test_start_zero_is_noop() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();
    let mut rx = h.timer.subscribe();

    h.timer.start(0).unwrap();
    sleep_ms(10_000).await;

    assert_eq!(h.timer.remaining(), None);
    assert_eq!(h.timer.fade_state(), FadeState::Idle);
    assert_eq!(h.chime.count(), 0);
    assert_eq!(voice_volume(&h), 0.9);
    assert!(h.coordinator.is_playing(ChannelKind::Voice));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_down_each_second() {
    let h = harness();
    let mut rx = h.timer.subscribe();

    h.timer.start(3).unwrap();
    sleep_ms(3_100).await;

    let mut ticks = Vec::new();
    while let Ok(update) = rx.try_recv() {
        if let TimerUpdate::Tick { remaining_seconds } = update {
            ticks.push(remaining_seconds);
        }
    }
    assert_eq!(ticks, vec![3, 2, 1, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_one_second_session_fades_and_restores() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();

    h.timer.start(1).unwrap();
    sleep_ms(500).await;
    assert_eq!(h.timer.remaining(), Some(1));
    assert_eq!(h.timer.fade_state(), FadeState::Idle);

    sleep_ms(700).await;
    assert_eq!(h.timer.fade_state(), FadeState::FadingOut);
    assert!(voice_volume(&h) < 0.9);

    sleep_ms(5_000).await;
    assert_eq!(h.timer.fade_state(), FadeState::Complete);
    assert_eq!(h.timer.remaining(), None);
    assert_eq!(voice_volume(&h), 0.9);
    assert!(!h.coordinator.is_playing(ChannelKind::Voice));
    assert_eq!(h.chime.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fade_emits_every_step() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();
    let mut rx = h.timer.subscribe();

    h.timer.start(1).unwrap();
    sleep_ms(5_000).await;

    let mut steps = Vec::new();
    let mut completed = false;
    while let Ok(update) = rx.try_recv() {
        match update {
            TimerUpdate::FadeStep { step, volume } => steps.push((step, volume)),
            TimerUpdate::Completed => completed = true,
            _ => {}
        }
    }
    assert_eq!(steps.len(), 20);
    assert_eq!(steps.last().map(|s| s.1), Some(0.0));
    assert!(steps.windows(2).all(|w| w[1].1 <= w[0].1));
    assert!(completed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_countdown_leaves_volume() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();
    h.coordinator.set_volume(ChannelKind::Voice, 0.6);

    h.timer.start(5).unwrap();
    sleep_ms(2_000).await;
    h.timer.cancel().unwrap();
    sleep_ms(10_000).await;

    assert_eq!(h.timer.remaining(), None);
    assert_eq!(h.timer.fade_state(), FadeState::Idle);
    assert_eq!(voice_volume(&h), 0.6);
    assert!(h.coordinator.is_playing(ChannelKind::Voice));
    assert_eq!(h.chime.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_fade_restores_volume() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();

    h.timer.start(1).unwrap();
    sleep_ms(1_800).await;
    let faded = voice_volume(&h);
    assert!(faded > 0.0 && faded < 0.9, "volume {}", faded);

    h.timer.cancel().unwrap();
    assert_eq!(voice_volume(&h), 0.9);
    assert_eq!(h.timer.fade_state(), FadeState::Idle);

    sleep_ms(5_000).await;
    assert_eq!(voice_volume(&h), 0.9);
    assert!(h.coordinator.is_playing(ChannelKind::Voice));
    assert_eq!(h.chime.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_during_fade_restores_first() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();

    h.timer.start(1).unwrap();
    sleep_ms(1_500).await;
    assert_eq!(h.timer.fade_state(), FadeState::FadingOut);

    h.timer.start(10).unwrap();
    assert_eq!(voice_volume(&h), 0.9);
    assert_eq!(h.timer.fade_state(), FadeState::Idle);
    assert_eq!(h.timer.remaining(), Some(10));

    sleep_ms(5_200).await;
    assert_eq!(voice_volume(&h), 0.9);
    assert_eq!(h.timer.remaining(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_countdown() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();

    h.timer.start(3).unwrap();
    sleep_ms(1_500).await;
    h.timer.pause().unwrap();
    assert_eq!(h.timer.remaining(), Some(2));
    assert!(!h.timer.is_counting());
    assert!(h.timer.is_active());

    sleep_ms(10_000).await;
    assert_eq!(h.timer.remaining(), Some(2));
    assert_eq!(h.timer.fade_state(), FadeState::Idle);

    h.timer.resume().unwrap();
    sleep_ms(1_000).await;
    assert_eq!(h.timer.remaining(), Some(1));

    sleep_ms(5_000).await;
    assert_eq!(h.timer.fade_state(), FadeState::Complete);
    assert_eq!(h.chime.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fade_out_now_uses_manual_duration() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();

    h.timer.start(600).unwrap();
    h.timer.fade_out_now(None).unwrap();

    sleep_ms(600).await;
    assert_eq!(h.timer.fade_state(), FadeState::FadingOut);
    assert!(voice_volume(&h) < 0.9);

    sleep_ms(800).await;
    assert_eq!(h.timer.fade_state(), FadeState::Complete);
    assert_eq!(h.timer.remaining(), None);
    assert_eq!(voice_volume(&h), 0.9);
    assert!(!h.coordinator.is_playing(ChannelKind::Voice));
    assert_eq!(h.chime.count(), 1);
}

#[tokio::test]
async fn test_fade_out_now_rejects_zero_duration() {
    let h = harness();
    assert!(matches!(
        h.timer.fade_out_now(Some(Duration::ZERO)),
        Err(SessionError::InvalidFade { .. })
    ));
    assert_eq!(h.timer.fade_state(), FadeState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_complete_session_can_restart() {
    let h = harness();
    h.coordinator.play_voice(Some(VOICE)).await.unwrap();

    h.timer.start(1).unwrap();
    sleep_ms(5_000).await;
    assert_eq!(h.timer.fade_state(), FadeState::Complete);

    h.timer.start(2).unwrap();
    assert_eq!(h.timer.fade_state(), FadeState::Idle);
    assert_eq!(h.timer.remaining(), Some(2));
}
