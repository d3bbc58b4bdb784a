//! 승패 감지 모니터 통합 테스트.

mod support;

use std::sync::Arc;

use gamsi_core::config::OutcomeMonitorConfig;
use gamsi_core::models::{MonitorEvent, OutcomeKind, Rect};
use gamsi_monitor::start_outcome_monitor;
use gamsi_vision::{codec, PixelBuffer};
use support::{embed, patterned, CollectingObserver, ScriptedFrames, wait_until};
use tempfile::TempDir;

const FRAME_W: u32 = 160;
const FRAME_H: u32 = 120;

fn test_config(base: &TempDir) -> OutcomeMonitorConfig {
    let root = base.path();
    OutcomeMonitorConfig {
        source_name: "Capture1".to_string(),
        win_region: Rect::new(0, 0, 50, 40),
        lose_region: Rect::new(55, 0, 105, 40),
        disconnect_region: Rect::new(110, 0, 160, 40),
        win_template: root.join("templates/win.png"),
        lose_template: root.join("templates/lose.png"),
        disconnect_template: root.join("templates/disconnect.png"),
        threshold: 0.4,
        cooldown_ms: 10_000,
        poll_interval_ms: 20,
        scratch_dir: root.join("work"),
    }
}

fn build_fixtures(config: &OutcomeMonitorConfig) -> (PixelBuffer, PixelBuffer, PixelBuffer) {
    std::fs::create_dir_all(config.win_template.parent().unwrap()).unwrap();

    let win = patterned(16, 12, 31);
    let lose = patterned(16, 12, 32);
    let dc = patterned(16, 12, 33);
    codec::encode(&win, &config.win_template).unwrap();
    codec::encode(&lose, &config.lose_template).unwrap();
    codec::encode(&dc, &config.disconnect_template).unwrap();

    let blank = PixelBuffer::filled(FRAME_W, FRAME_H, [64, 64, 64, 255]);
    let mut win_frame = blank.clone();
    embed(&mut win_frame, &win, 10, 10);
    let mut lose_frame = blank.clone();
    embed(&mut lose_frame, &lose, 65, 10);

    (blank, win_frame, lose_frame)
}

#[test]
fn outcome_counted_once_within_cooldown() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let base = TempDir::new().unwrap();
    let config = test_config(&base);
    let (_blank, win_frame, _lose_frame) = build_fixtures(&config);

    // 승리 오버레이가 여러 프레임 지속 — 쿨다운 안에서는 1회만 집계
    let frames = Arc::new(ScriptedFrames::new(vec![win_frame]));
    let observer = Arc::new(CollectingObserver::default());

    let handle = start_outcome_monitor(config, frames.clone(), observer.clone()).unwrap();
    assert!(wait_until(3_000, || frames.capture_count() >= 5));
    assert!(handle.stop());

    let outcomes: Vec<_> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::OutcomeDetected { kind, counts, .. } => Some((kind, counts)),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes.len(), 1, "쿨다운 내 중복 집계 금지");
    assert_eq!(outcomes[0].0, OutcomeKind::Win);
    assert_eq!(outcomes[0].1.win, 1);
}

#[test]
fn lose_takes_priority_and_counts_accumulate() {
    let base = TempDir::new().unwrap();
    let mut config = test_config(&base);
    // 쿨다운을 짧게 — 두 번째 감지를 허용
    config.cooldown_ms = 50;
    let (blank, win_frame, lose_frame) = build_fixtures(&config);

    let frames = Arc::new(ScriptedFrames::new(vec![
        lose_frame,
        blank.clone(),
        blank.clone(),
        blank.clone(),
        win_frame,
        blank,
    ]));
    let observer = Arc::new(CollectingObserver::default());

    let handle = start_outcome_monitor(config, frames.clone(), observer.clone()).unwrap();
    assert!(wait_until(3_000, || {
        observer
            .events()
            .iter()
            .filter(|e| matches!(e, MonitorEvent::OutcomeDetected { .. }))
            .count()
            >= 2
    }));
    assert!(handle.stop());

    let outcomes: Vec<_> = observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::OutcomeDetected { kind, counts, .. } => Some((kind, counts)),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes[0].0, OutcomeKind::Lose);
    assert_eq!(outcomes[1].0, OutcomeKind::Win);
    // 누적 집계
    assert_eq!(outcomes[1].1.lose, 1);
    assert_eq!(outcomes[1].1.win, 1);
}

#[test]
fn missing_templates_are_tolerated() {
    let base = TempDir::new().unwrap();
    let config = test_config(&base);
    let (_blank, win_frame, _lose_frame) = build_fixtures(&config);
    // 템플릿 전부 제거 — 감지만 일어나지 않아야 한다 (에러 아님)
    std::fs::remove_file(&config.win_template).unwrap();
    std::fs::remove_file(&config.lose_template).unwrap();
    std::fs::remove_file(&config.disconnect_template).unwrap();

    let frames = Arc::new(ScriptedFrames::new(vec![win_frame]));
    let observer = Arc::new(CollectingObserver::default());

    let handle = start_outcome_monitor(config, frames.clone(), observer.clone()).unwrap();
    assert!(wait_until(2_000, || frames.capture_count() >= 3));
    assert!(handle.stop());

    assert!(observer
        .events()
        .iter()
        .all(|e| !matches!(e, MonitorEvent::OutcomeDetected { .. })));
}
