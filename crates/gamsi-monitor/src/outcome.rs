//! 승패 감지 모니터.
//!
//! 승리/패배/회선 끊김 라벨을 고정 영역에서 템플릿 매칭으로 감지해
//! 집계를 누적하고 옵저버로 보고한다. 오버레이가 화면에 남아 있는
//! 동안의 중복 집계는 쿨다운으로 막는다.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use gamsi_core::config::OutcomeMonitorConfig;
use gamsi_core::error::CoreError;
use gamsi_core::models::{MonitorEvent, OutcomeCounts, OutcomeKind, Rect};
use gamsi_core::ports::{FrameSource, MonitorObserver};
use gamsi_vision::{codec, matcher, PixelBuffer};

use crate::handle::{sleep_interruptible, MonitorHandle};

/// 사용자 대면 로그 접두사
const LOG_TAG: &str = "[승패 감지]";

/// 승패 감지 모니터 시작.
pub fn start_outcome_monitor(
    config: OutcomeMonitorConfig,
    frames: Arc<dyn FrameSource>,
    observer: Arc<dyn MonitorObserver>,
) -> Result<MonitorHandle, CoreError> {
    config.validate()?;
    fs::create_dir_all(&config.scratch_dir)?;

    MonitorHandle::spawn("gamsi-outcome", move |stop| {
        OutcomeWorker {
            config,
            frames,
            observer,
            stop,
            counts: OutcomeCounts::default(),
            last_emit: None,
        }
        .run();
    })
}

struct OutcomeWorker {
    config: OutcomeMonitorConfig,
    frames: Arc<dyn FrameSource>,
    observer: Arc<dyn MonitorObserver>,
    stop: Arc<AtomicBool>,
    counts: OutcomeCounts,
    last_emit: Option<Instant>,
}

impl OutcomeWorker {
    fn run(&mut self) {
        self.observer.log(&format!("{LOG_TAG} 워커 시작"));
        info!("승패 감지 워커 시작");

        while !self.stop.load(Ordering::Relaxed) {
            self.iteration();
            if sleep_interruptible(
                &self.stop,
                Duration::from_millis(self.config.poll_interval_ms),
            ) {
                break;
            }
        }

        self.observer.log(&format!("{LOG_TAG} 워커 정지"));
        info!("승패 감지 워커 정지");
    }

    fn iteration(&mut self) {
        let scene = match self.capture_scene() {
            Ok(s) => s,
            Err(e) => {
                debug!("장면 확보 실패, 반복 건너뜀: {e}");
                return;
            }
        };

        // 감지 우선순위: 패배 > 회선 끊김 > 승리
        let checks: [(OutcomeKind, &Rect, &PathBuf); 3] = [
            (
                OutcomeKind::Lose,
                &self.config.lose_region,
                &self.config.lose_template,
            ),
            (
                OutcomeKind::Disconnect,
                &self.config.disconnect_region,
                &self.config.disconnect_template,
            ),
            (
                OutcomeKind::Win,
                &self.config.win_region,
                &self.config.win_template,
            ),
        ];

        let mut detected = None;
        for (kind, region, tpl_path) in checks {
            // 템플릿 부재 허용 — 해당 라벨은 감지 대상에서 빠질 뿐이다
            let Ok(tpl) = codec::decode(tpl_path) else {
                continue;
            };
            if matcher::match_in_region(&scene, region, &tpl, self.config.threshold) {
                detected = Some(kind);
                break;
            }
        }

        let Some(kind) = detected else {
            return;
        };

        // 쿨다운: 오버레이가 사라지기 전의 재감지를 집계하지 않는다
        if let Some(last) = self.last_emit {
            if last.elapsed() < Duration::from_millis(self.config.cooldown_ms) {
                return;
            }
        }
        self.last_emit = Some(Instant::now());

        match kind {
            OutcomeKind::Win => self.counts.win += 1,
            OutcomeKind::Lose => self.counts.lose += 1,
            OutcomeKind::Disconnect => self.counts.disconnect += 1,
        }

        self.observer.on_event(MonitorEvent::OutcomeDetected {
            kind,
            counts: self.counts,
            at: Utc::now(),
        });
        self.observer.log(&format!(
            "{LOG_TAG} {} 감지 → Win {} - Lose {} - DC {}",
            label(kind),
            self.counts.win,
            self.counts.lose,
            self.counts.disconnect
        ));
        info!(?kind, "승패 라벨 감지");
    }

    fn capture_scene(&self) -> Result<PixelBuffer, CoreError> {
        let path = self.config.scratch_dir.join("scene1.png");
        self.frames.capture(&self.config.source_name, &path)?;
        codec::decode(&path)
    }
}

fn label(kind: OutcomeKind) -> &'static str {
    match kind {
        OutcomeKind::Win => "승리",
        OutcomeKind::Lose => "패배",
        OutcomeKind::Disconnect => "회선 끊김",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_distinct() {
        assert_ne!(label(OutcomeKind::Win), label(OutcomeKind::Lose));
        assert_ne!(label(OutcomeKind::Lose), label(OutcomeKind::Disconnect));
    }
}
