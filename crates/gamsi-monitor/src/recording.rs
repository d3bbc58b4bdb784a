//! 녹화 제어 모니터.
//!
//! 상태 기계: `NotRecording` ⇄ `Recording`.
//! 시작/정지 마커를 NCC로 감지해 호스트 녹화 능력을 구동하고,
//! 요청 후에는 3상 상태 질의를 유한 재시도로 확인한다.
//! 요청됨 ≠ 확인됨 — 호스트 질의가 불안정할 수 있다는 전제로 설계됐다.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use gamsi_core::config::RecordingMonitorConfig;
use gamsi_core::error::CoreError;
use gamsi_core::models::{MonitorEvent, RecordingState};
use gamsi_core::ports::{FrameSource, MonitorObserver, RecorderControl};
use gamsi_vision::grayscale::to_grayscale;
use gamsi_vision::{codec, matcher, PixelBuffer};

use crate::handle::{sleep_interruptible, MonitorHandle};

/// 사용자 대면 로그 접두사
const LOG_TAG: &str = "[녹화 제어]";

/// 녹화 제어 모니터 시작.
pub fn start_recording_monitor(
    config: RecordingMonitorConfig,
    frames: Arc<dyn FrameSource>,
    recorder: Arc<dyn RecorderControl>,
    observer: Arc<dyn MonitorObserver>,
) -> Result<MonitorHandle, CoreError> {
    config.validate()?;
    fs::create_dir_all(&config.scratch_dir)?;

    MonitorHandle::spawn("gamsi-recording", move |stop| {
        RecordingWorker {
            config,
            frames,
            recorder,
            observer,
            stop,
            recording: false,
            recording_started_at: None,
        }
        .run();
    })
}

struct RecordingWorker {
    config: RecordingMonitorConfig,
    frames: Arc<dyn FrameSource>,
    recorder: Arc<dyn RecorderControl>,
    observer: Arc<dyn MonitorObserver>,
    stop: Arc<AtomicBool>,
    // 이 워커 스레드만 쓰고 읽는 세션 상태
    recording: bool,
    recording_started_at: Option<DateTime<Utc>>,
}

impl RecordingWorker {
    fn run(&mut self) {
        self.observer.log(&format!("{LOG_TAG} 워커 시작"));
        info!("녹화 제어 워커 시작");

        while !self.stop.load(Ordering::Relaxed) {
            self.iteration();
        }

        // 종료 정리: 녹화를 켠 채로 사라지지 않는다
        if self.recording {
            self.observer
                .log(&format!("{LOG_TAG} 종료 시점에 녹화를 정지합니다"));
            if let Err(e) = self.recorder.stop_recording() {
                warn!("종료 시 녹화 정지 요청 실패: {e}");
            }
            self.observer
                .on_event(MonitorEvent::StoppedOnExit { at: Utc::now() });
            self.recording = false;
        }

        self.observer.log(&format!("{LOG_TAG} 워커 정지"));
        info!("녹화 제어 워커 정지");
    }

    fn iteration(&mut self) {
        let scene = match self.capture_scene() {
            Ok(s) => s,
            Err(e) => {
                debug!("장면 확보 실패, 반복 건너뜀: {e}");
                sleep_interruptible(&self.stop, Duration::from_millis(100));
                return;
            }
        };

        let start_crop = scene.crop(&self.config.start_region);
        let stop_crop = scene.crop(&self.config.stop_region);
        if let Err(e) = codec::encode(&start_crop, &self.config.scratch_dir.join("start_marker.png"))
        {
            debug!("시작 마커 스크래치 기록 실패: {e}");
        }
        if let Err(e) = codec::encode(&stop_crop, &self.config.scratch_dir.join("stop_marker.png")) {
            debug!("정지 마커 스크래치 기록 실패: {e}");
        }

        let (start_tpl, stop_tpl) = match (
            codec::decode(&self.config.start_template),
            codec::decode(&self.config.stop_template),
        ) {
            (Ok(a), Ok(b)) => (a, b),
            _ => {
                self.observer
                    .log(&format!("{LOG_TAG} 템플릿이 없어 대기합니다"));
                sleep_interruptible(&self.stop, Duration::from_millis(1_000));
                return;
            }
        };

        let start_score = matcher::max_ncc(&to_grayscale(&start_crop), &to_grayscale(&start_tpl));
        let stop_score = matcher::max_ncc(&to_grayscale(&stop_crop), &to_grayscale(&stop_tpl));

        if !self.recording && start_score >= self.config.match_threshold {
            self.begin_recording();
        }
        if self.recording && stop_score >= self.config.match_threshold {
            self.finish_recording();
        }

        sleep_interruptible(
            &self.stop,
            Duration::from_millis(self.config.rest_floor_ms),
        );
    }

    fn capture_scene(&self) -> Result<PixelBuffer, CoreError> {
        let path = self.scene_path();
        self.frames.capture(&self.config.source_name, &path)?;
        codec::decode(&path)
    }

    fn scene_path(&self) -> PathBuf {
        self.config.scratch_dir.join("scene2.png")
    }

    /// NotRecording → Recording 전이 시도.
    fn begin_recording(&mut self) {
        self.observer
            .log(&format!("{LOG_TAG} 시작 마커 감지 → 녹화 시작"));
        info!("시작 마커 감지");

        let mut unknowns = 0u32;
        let mut local_ok = match self.recorder.start_recording() {
            Ok(()) => true,
            Err(e) => {
                warn!("녹화 시작 요청 실패: {e}");
                false
            }
        };
        let mut confirmed = self
            .confirm_state(RecordingState::Active, &mut unknowns)
            .is_ok();

        if !confirmed && !self.stop.load(Ordering::Relaxed) {
            // 1회 재시도 후 같은 예산으로 재확인
            match self.recorder.start_recording() {
                Ok(()) => local_ok = true,
                Err(e) => warn!("녹화 시작 재요청 실패: {e}"),
            }
            confirmed = self
                .confirm_state(RecordingState::Active, &mut unknowns)
                .is_ok();
        }

        if !confirmed && local_ok && unknowns >= self.config.unknown_poll_limit {
            // Unknown 응답 휴리스틱: 질의가 계속 판정 불가일 때 로컬 성공을
            // 근거로 시작으로 간주한다. 경험적 완화책이지 정확성 보장이
            // 아니다 — 한도 값(16)은 튜닝 산물이다.
            self.observer.log(&format!(
                "{LOG_TAG} 상태 확인 불가(unknown {unknowns}회) — 시작으로 간주"
            ));
            warn!(unknowns, "상태 질의 판정 불가, 낙관적 시작 수용");
            confirmed = true;
        }

        if confirmed {
            let at = Utc::now();
            self.recording = true;
            self.recording_started_at = Some(at);
            self.observer.on_event(MonitorEvent::Started { at });
            self.observer.log(&format!("{LOG_TAG} 녹화 시작 확인"));
            info!("녹화 시작 확정");
            // 가드 구간: 전이 직후에도 화면에 남아 있는 시작 마커로
            // 재트리거되는 것을 막는다
            sleep_interruptible(
                &self.stop,
                Duration::from_millis(self.config.start_guard_ms),
            );
        } else {
            self.observer
                .log(&format!("{LOG_TAG} 녹화가 시작되지 않았습니다"));
            warn!("녹화 시작 미확인");
            sleep_interruptible(&self.stop, Duration::from_millis(1_000));
        }
    }

    /// Recording → NotRecording 전이 시도.
    fn finish_recording(&mut self) {
        // 확인에 앞서 관측 즉시 이벤트 발행
        self.observer
            .on_event(MonitorEvent::StopObserved { at: Utc::now() });
        self.observer
            .log(&format!("{LOG_TAG} 정지 마커 감지 → 녹화 정지"));
        info!("정지 마커 감지");

        if let Err(e) = self.recorder.stop_recording() {
            warn!("녹화 정지 요청 실패: {e}");
        }
        let mut unknowns = 0u32;
        let mut confirmed = self
            .confirm_state(RecordingState::Inactive, &mut unknowns)
            .is_ok();

        if !confirmed && !self.stop.load(Ordering::Relaxed) {
            if let Err(e) = self.recorder.stop_recording() {
                warn!("녹화 정지 재요청 실패: {e}");
            }
            confirmed = self
                .confirm_state(RecordingState::Inactive, &mut unknowns)
                .is_ok();
        }

        if confirmed {
            self.recording = false;
            match self.recording_started_at.take() {
                Some(started) => {
                    let secs = (Utc::now() - started).num_seconds();
                    self.observer
                        .log(&format!("{LOG_TAG} 녹화 정지 확인 (세션 {secs}초)"));
                }
                None => self.observer.log(&format!("{LOG_TAG} 녹화 정지 확인")),
            }
            info!("녹화 정지 확정");
        } else {
            // 미확인 — Recording 유지, 다음 정지 마커 감지에서 재시도
            warn!("녹화 정지 미확인, 상태 유지");
        }
    }

    /// 상태 질의를 폴링 주기로 반복하여 `want` 도달을 확인.
    ///
    /// 예산 소진 또는 정지 신호면 [`CoreError::ConfirmationTimeout`].
    /// Unknown 응답 횟수는 `unknowns`에 누적한다.
    fn confirm_state(
        &self,
        want: RecordingState,
        unknowns: &mut u32,
    ) -> Result<(), CoreError> {
        let interval = Duration::from_millis(self.config.confirm_poll_interval_ms);
        let polls = (self.config.confirm_budget_ms / self.config.confirm_poll_interval_ms).max(1);

        for _ in 0..polls {
            if self.stop.load(Ordering::Relaxed) {
                return Err(CoreError::ConfirmationTimeout(
                    "정지 신호로 확인 중단".to_string(),
                ));
            }
            match self.recorder.recording_state() {
                state if state == want => return Ok(()),
                RecordingState::Unknown => *unknowns += 1,
                _ => {}
            }
            if sleep_interruptible(&self.stop, interval) {
                return Err(CoreError::ConfirmationTimeout(
                    "정지 신호로 확인 중단".to_string(),
                ));
            }
        }
        Err(CoreError::ConfirmationTimeout(format!(
            "{want:?} 확인 실패 ({polls}회 폴링)"
        )))
    }
}
