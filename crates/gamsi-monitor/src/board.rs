//! 보드 감시 모니터.
//!
//! 상태 기계: `Idle` ⇄ `BoardPresent`.
//! 캡처 프레임의 보드 영역에서 마커 템플릿을 NCC로 찾고, 마커가
//! 지속되는 동안 행 후보 6개에 태그 4개를 탐욕 배정하여 수직 합성
//! 산출물을 기록한다.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use gamsi_core::config::BoardMonitorConfig;
use gamsi_core::error::CoreError;
use gamsi_core::ports::{FrameSource, MonitorObserver};
use gamsi_vision::grayscale::{to_grayscale, GrayscaleBuffer};
use gamsi_vision::{codec, compositor, matcher, PixelBuffer};

use crate::handle::{sleep_interruptible, MonitorHandle};

/// 사용자 대면 로그 접두사
const LOG_TAG: &str = "[보드 감시]";

/// 보드 감시 모니터 시작.
///
/// 설정 검증과 출력 디렉토리 준비에 실패하면 스레드를 띄우지 않고
/// 에러를 돌려준다 — 이것이 유일한 하드 실패 지점이다.
pub fn start_board_monitor(
    config: BoardMonitorConfig,
    frames: Arc<dyn FrameSource>,
    observer: Arc<dyn MonitorObserver>,
) -> Result<MonitorHandle, CoreError> {
    config.validate()?;
    fs::create_dir_all(&config.scratch_dir)?;
    fs::create_dir_all(&config.archive_dir)?;
    if let Some(parent) = config.broadcast_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.composite_path.parent() {
        fs::create_dir_all(parent)?;
    }

    MonitorHandle::spawn("gamsi-board", move |stop| {
        BoardWorker {
            config,
            frames,
            observer,
            stop,
        }
        .run();
    })
}

struct BoardWorker {
    config: BoardMonitorConfig,
    frames: Arc<dyn FrameSource>,
    observer: Arc<dyn MonitorObserver>,
    stop: Arc<AtomicBool>,
}

impl BoardWorker {
    fn run(&self) {
        self.observer.log(&format!("{LOG_TAG} 워커 시작"));
        info!("보드 감시 워커 시작");

        while !self.stop.load(Ordering::Relaxed) {
            match self.capture_scene() {
                Ok(scene) => self.iteration(&scene),
                Err(e) => {
                    // 캡처/디코드 실패는 반복 건너뛰기 — 치명적이지 않다
                    debug!("장면 확보 실패, 반복 건너뜀: {e}");
                    if sleep_interruptible(&self.stop, Duration::from_millis(200)) {
                        break;
                    }
                    continue;
                }
            }
            if sleep_interruptible(
                &self.stop,
                Duration::from_millis(self.config.poll_interval_ms),
            ) {
                break;
            }
        }

        self.observer.log(&format!("{LOG_TAG} 워커 정지"));
        info!("보드 감시 워커 정지");
    }

    fn scene_path(&self) -> PathBuf {
        self.config.scratch_dir.join("scene.png")
    }

    /// 호스트 캡처 → 스냅샷 디코드.
    fn capture_scene(&self) -> Result<PixelBuffer, CoreError> {
        let path = self.scene_path();
        self.frames.capture(&self.config.source_name, &path)?;
        codec::decode(&path)
    }

    /// Idle 상태의 바깥 반복 한 번.
    fn iteration(&self, scene: &PixelBuffer) {
        // 방송 영역 크롭을 스크래치에 보존
        let shot = scene.crop(&self.config.screenshot_region);
        let cropped_path = self.config.scratch_dir.join("screenshot_cropped.png");
        if let Err(e) = codec::encode(&shot, &cropped_path) {
            warn!("스크래치 크롭 기록 실패: {e}");
        }

        let board_tpl = match codec::decode(&self.config.board_template) {
            Ok(t) => to_grayscale(&t),
            Err(e) => {
                self.observer
                    .log(&format!("{LOG_TAG} 보드 템플릿을 읽을 수 없음"));
                debug!("보드 템플릿 디코드 실패: {e}");
                return;
            }
        };

        let score = self.board_score(scene, &board_tpl);
        if score < self.config.board_threshold {
            return;
        }

        // Idle → BoardPresent 진입: 방송 이미지 덮어쓰기 + 보관 사본 1회
        self.observer
            .log(&format!("{LOG_TAG} 보드 마커 감지 (점수 {score:.3})"));
        info!(score, "보드 마커 감지");

        if let Err(e) = codec::encode(&shot, &self.config.broadcast_path) {
            warn!("방송 이미지 기록 실패: {e}");
        }
        let archive = self
            .config
            .archive_dir
            .join(archive_file_name(&self.config.output_ext));
        match codec::encode(&shot, &archive) {
            Ok(()) => self.observer.log(&format!("{LOG_TAG} 보관 이미지 저장")),
            Err(e) => warn!("보관 이미지 기록 실패: {e}"),
        }

        self.track_board(&board_tpl);
    }

    /// 보드 영역 크롭을 스크래치에 남기고 마커 점수를 계산.
    fn board_score(&self, scene: &PixelBuffer, board_tpl: &GrayscaleBuffer) -> f64 {
        let area = scene.crop(&self.config.board_region);
        let area_path = self.config.scratch_dir.join("board_area.png");
        if let Err(e) = codec::encode(&area, &area_path) {
            debug!("보드 영역 스크래치 기록 실패: {e}");
        }
        matcher::max_ncc(&to_grayscale(&area), board_tpl)
    }

    /// BoardPresent 상태의 안쪽 루프.
    ///
    /// 마커가 유지되는 동안 행 식별을 반복 시도한다. 마커 소실,
    /// 캡처/디코드 실패, 정지 신호 중 무엇이든 Idle로 복귀한다.
    fn track_board(&self, board_tpl: &GrayscaleBuffer) {
        while !self.stop.load(Ordering::Relaxed) {
            let scene = match self.capture_scene() {
                Ok(s) => s,
                Err(e) => {
                    debug!("장면 갱신 실패, 보드 추적 종료: {e}");
                    break;
                }
            };
            if self.board_score(&scene, board_tpl) < self.config.board_threshold {
                debug!("보드 마커 소실 — 대기 상태로 복귀");
                break;
            }

            if let Some(rows) = self.identify_rows(&scene) {
                match compositor::vconcat(&rows) {
                    Ok(combined) => match codec::encode(&combined, &self.config.composite_path) {
                        Ok(()) => {
                            self.observer.log(&format!("{LOG_TAG} 추출 이미지 기록"));
                            info!("행 합성 산출물 기록");
                        }
                        Err(e) => warn!("합성 산출물 기록 실패: {e}"),
                    },
                    Err(e) => warn!("행 합성 실패: {e}"),
                }
            }

            if sleep_interruptible(
                &self.stop,
                Duration::from_millis(self.config.inner_interval_ms),
            ) {
                return;
            }
        }
    }

    /// 태그 4개를 행 후보 6개에 탐욕 배정.
    ///
    /// 태그 순서대로 각 태그가 아직 선점되지 않은 후보 중 최고 점수
    /// 행을 차지한다. 어느 태그든 최고 점수가 임계값 미만이면 이번
    /// 시도 전체를 포기한다("아직 준비 안 됨", 에러 아님).
    /// 성공 시 태그 순서(1..4)의 행을 돌려준다.
    fn identify_rows(&self, scene: &PixelBuffer) -> Option<Vec<PixelBuffer>> {
        let rows: Vec<PixelBuffer> = self
            .config
            .row_regions
            .iter()
            .map(|r| scene.crop(r))
            .collect();
        let row_grays: Vec<GrayscaleBuffer> = rows.iter().map(to_grayscale).collect();

        let mut claimed = vec![false; rows.len()];
        let mut picked: Vec<usize> = Vec::with_capacity(self.config.tag_templates.len());

        for (tag_idx, tag_path) in self.config.tag_templates.iter().enumerate() {
            let tag = match codec::decode(tag_path) {
                Ok(t) => to_grayscale(&t),
                Err(e) => {
                    self.observer
                        .log(&format!("{LOG_TAG} 태그 템플릿을 읽을 수 없음"));
                    debug!("태그{} 템플릿 디코드 실패: {e}", tag_idx + 1);
                    return None;
                }
            };

            let mut best = matcher::NCC_NEVER;
            let mut best_row = None;
            for (i, row) in row_grays.iter().enumerate() {
                if claimed[i] {
                    continue;
                }
                let score = matcher::max_ncc(row, &tag);
                if score > best {
                    best = score;
                    best_row = Some(i);
                }
            }

            match best_row {
                Some(i) if best >= self.config.tag_threshold => {
                    claimed[i] = true;
                    picked.push(i);
                }
                _ => {
                    debug!(
                        "태그{} 최고 점수 {best:.3} < 임계값 — 식별 보류",
                        tag_idx + 1
                    );
                    return None;
                }
            }
        }

        Some(picked.into_iter().map(|i| rows[i].clone()).collect())
    }
}

/// 보관 파일 이름: `YYYY-MM-DD_hh-mm-ss.<ext>` (로컬 시각).
fn archive_file_name(ext: &str) -> String {
    format!("{}.{ext}", Local::now().format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_name_has_timestamp_format() {
        let name = archive_file_name("png");
        // YYYY-MM-DD_hh-mm-ss.png = 19 + 4
        assert_eq!(name.len(), 23);
        assert!(name.ends_with(".png"));
        let stem = &name[..19];
        assert_eq!(stem.as_bytes()[4], b'-');
        assert_eq!(stem.as_bytes()[10], b'_');
        assert_eq!(stem.as_bytes()[13], b'-');
    }

    #[test]
    fn archive_name_honors_extension() {
        assert!(archive_file_name("jpg").ends_with(".jpg"));
    }
}
