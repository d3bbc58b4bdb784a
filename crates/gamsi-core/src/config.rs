//! 모니터 설정 구조체.
//!
//! 탐색 영역, 임계값, 폴링 주기, 출력 경로 등 모니터 구성 파라미터를
//! 정의한다. 기본값은 1920×1080 캡처에 맞춰 튜닝된 상수다.
//!
//! 환경변수 오버라이드는 [`EngineConfig::load`] 한 곳에서만 적용된다 —
//! 알고리즘 내부에 흩어진 `getenv` 호출은 없다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::models::Rect;

/// 기본 캡처 소스 이름
const DEFAULT_SOURCE_NAME: &str = "Capture1";

// ============================================================
// 보드 감시 설정
// ============================================================

/// 보드 감시 모니터 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardMonitorConfig {
    /// 캡처 소스 이름
    #[serde(default = "default_source_name")]
    pub source_name: String,
    /// 보드 마커 탐색 영역
    pub board_region: Rect,
    /// 방송용으로 잘라내는 화면 영역
    pub screenshot_region: Rect,
    /// 행 후보 영역 6개 (위에서 아래 순)
    pub row_regions: Vec<Rect>,
    /// 보드 마커 NCC 임계값
    #[serde(default = "default_presence_threshold")]
    pub board_threshold: f64,
    /// 태그 매칭 NCC 임계값
    #[serde(default = "default_presence_threshold")]
    pub tag_threshold: f64,
    /// 바깥 루프 폴링 주기 (ms, 0이면 휴식 없음)
    #[serde(default = "default_board_poll_ms")]
    pub poll_interval_ms: u64,
    /// 보드 지속 중 안쪽 루프 주기 (ms)
    #[serde(default = "default_inner_interval_ms")]
    pub inner_interval_ms: u64,
    /// 보드 마커 참조 템플릿 경로
    pub board_template: PathBuf,
    /// 순서 있는 태그 참조 템플릿 4개
    pub tag_templates: Vec<PathBuf>,
    /// 작업 파일 디렉토리 (장면 스냅샷, 크롭 스크래치)
    pub scratch_dir: PathBuf,
    /// 방송용 이미지 경로 (에피소드마다 덮어씀)
    pub broadcast_path: PathBuf,
    /// 타임스탬프 보관 디렉토리
    pub archive_dir: PathBuf,
    /// 행 합성 결과 출력 경로
    pub composite_path: PathBuf,
    /// 보관 파일 확장자 (png/jpg)
    #[serde(default = "default_output_ext")]
    pub output_ext: String,
}

impl BoardMonitorConfig {
    /// `base_dir` 아래 기본 배치로 설정 생성.
    pub fn default_config(base_dir: &Path) -> Self {
        let templates = base_dir.join("templates");
        Self {
            source_name: default_source_name(),
            board_region: Rect::new(1541, 229, 1651, 843),
            screenshot_region: Rect::new(1221, 150, 1655, 850),
            row_regions: (0..6)
                .map(|i| Rect::new(146, 138 + 117 * i, 933, 255 + 117 * i))
                .collect(),
            board_threshold: default_presence_threshold(),
            tag_threshold: default_presence_threshold(),
            poll_interval_ms: default_board_poll_ms(),
            inner_interval_ms: default_inner_interval_ms(),
            board_template: templates.join("board.png"),
            tag_templates: (1..=4).map(|i| templates.join(format!("tag{i}.png"))).collect(),
            scratch_dir: base_dir.join("work"),
            broadcast_path: base_dir.join("broadcast").join("broadcast.png"),
            archive_dir: base_dir.join("archive"),
            composite_path: base_dir.join("broadcast").join("composite.png"),
            output_ext: default_output_ext(),
        }
    }

    /// 구성 시점 검증 — 실패하면 모니터는 시작되지 않는다.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_name.is_empty() {
            return Err(CoreError::Config("캡처 소스 이름이 비어 있음".into()));
        }
        if self.row_regions.len() != 6 {
            return Err(CoreError::Config(format!(
                "행 후보 영역은 6개여야 함 (현재 {})",
                self.row_regions.len()
            )));
        }
        if self.tag_templates.len() != 4 {
            return Err(CoreError::Config(format!(
                "태그 템플릿은 4개여야 함 (현재 {})",
                self.tag_templates.len()
            )));
        }
        validate_threshold("board_threshold", self.board_threshold)?;
        validate_threshold("tag_threshold", self.tag_threshold)?;
        validate_ext(&self.output_ext)?;
        Ok(())
    }
}

// ============================================================
// 녹화 제어 설정
// ============================================================

/// 녹화 제어 모니터 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMonitorConfig {
    /// 캡처 소스 이름
    #[serde(default = "default_source_name")]
    pub source_name: String,
    /// 시작 마커 탐색 영역
    pub start_region: Rect,
    /// 정지 마커 탐색 영역
    pub stop_region: Rect,
    /// 시작 마커 참조 템플릿 경로
    pub start_template: PathBuf,
    /// 정지 마커 참조 템플릿 경로
    pub stop_template: PathBuf,
    /// 마커 NCC 임계값
    #[serde(default = "default_presence_threshold")]
    pub match_threshold: f64,
    /// 상태 확인 폴링 주기 (ms)
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_interval_ms: u64,
    /// 상태 확인 1회 시도 예산 (ms)
    #[serde(default = "default_confirm_budget_ms")]
    pub confirm_budget_ms: u64,
    /// 시작 확정 후 가드 구간 (ms) — 마커 재검사 중단
    #[serde(default = "default_start_guard_ms")]
    pub start_guard_ms: u64,
    /// Unknown 응답 누적 한도 — 도달 시 낙관적 시작 수용
    #[serde(default = "default_unknown_poll_limit")]
    pub unknown_poll_limit: u32,
    /// 반복 사이 최소 휴식 (ms)
    #[serde(default = "default_rest_floor_ms")]
    pub rest_floor_ms: u64,
    /// 작업 파일 디렉토리
    pub scratch_dir: PathBuf,
}

impl RecordingMonitorConfig {
    /// `base_dir` 아래 기본 배치로 설정 생성.
    pub fn default_config(base_dir: &Path) -> Self {
        let templates = base_dir.join("templates");
        Self {
            source_name: default_source_name(),
            start_region: Rect::new(1541, 229, 1651, 843),
            stop_region: Rect::new(0, 0, 96, 72),
            start_template: templates.join("start.png"),
            stop_template: templates.join("stop.png"),
            match_threshold: default_presence_threshold(),
            confirm_poll_interval_ms: default_confirm_poll_ms(),
            confirm_budget_ms: default_confirm_budget_ms(),
            start_guard_ms: default_start_guard_ms(),
            unknown_poll_limit: default_unknown_poll_limit(),
            rest_floor_ms: default_rest_floor_ms(),
            scratch_dir: base_dir.join("work"),
        }
    }

    /// 구성 시점 검증.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_name.is_empty() {
            return Err(CoreError::Config("캡처 소스 이름이 비어 있음".into()));
        }
        if self.confirm_poll_interval_ms == 0 {
            return Err(CoreError::Config("상태 확인 폴링 주기는 0일 수 없음".into()));
        }
        if self.confirm_budget_ms == 0 {
            return Err(CoreError::Config("상태 확인 예산은 0일 수 없음".into()));
        }
        if self.unknown_poll_limit == 0 {
            return Err(CoreError::Config("Unknown 응답 한도는 1 이상이어야 함".into()));
        }
        validate_threshold("match_threshold", self.match_threshold)?;
        Ok(())
    }
}

// ============================================================
// 승패 감지 설정
// ============================================================

/// 승패 감지 모니터 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeMonitorConfig {
    /// 캡처 소스 이름
    #[serde(default = "default_source_name")]
    pub source_name: String,
    /// 승리 라벨 영역
    pub win_region: Rect,
    /// 패배 라벨 영역
    pub lose_region: Rect,
    /// 회선 끊김 라벨 영역
    pub disconnect_region: Rect,
    /// 승리 라벨 템플릿
    pub win_template: PathBuf,
    /// 패배 라벨 템플릿
    pub lose_template: PathBuf,
    /// 회선 끊김 라벨 템플릿
    pub disconnect_template: PathBuf,
    /// 라벨 NCC 임계값
    #[serde(default = "default_outcome_threshold")]
    pub threshold: f64,
    /// 중복 집계 방지 쿨다운 (ms)
    #[serde(default = "default_outcome_cooldown_ms")]
    pub cooldown_ms: u64,
    /// 폴링 주기 (ms)
    #[serde(default = "default_outcome_poll_ms")]
    pub poll_interval_ms: u64,
    /// 작업 파일 디렉토리
    pub scratch_dir: PathBuf,
}

impl OutcomeMonitorConfig {
    /// `base_dir` 아래 기본 배치로 설정 생성.
    pub fn default_config(base_dir: &Path) -> Self {
        let templates = base_dir.join("templates");
        Self {
            source_name: default_source_name(),
            win_region: Rect::new(450, 990, 696, 1020),
            lose_region: Rect::new(480, 960, 730, 1045),
            disconnect_region: Rect::new(372, 654, 1548, 774),
            win_template: templates.join("win.png"),
            lose_template: templates.join("lose.png"),
            disconnect_template: templates.join("disconnect.png"),
            threshold: default_outcome_threshold(),
            cooldown_ms: default_outcome_cooldown_ms(),
            poll_interval_ms: default_outcome_poll_ms(),
            scratch_dir: base_dir.join("work"),
        }
    }

    /// 구성 시점 검증.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_name.is_empty() {
            return Err(CoreError::Config("캡처 소스 이름이 비어 있음".into()));
        }
        validate_threshold("threshold", self.threshold)?;
        Ok(())
    }
}

// ============================================================
// 최상위 설정 + 환경변수 오버라이드
// ============================================================

/// 엔진 전체 설정 — 모니터별 설정 묶음.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 보드 감시 설정
    pub board: BoardMonitorConfig,
    /// 녹화 제어 설정
    pub recording: RecordingMonitorConfig,
    /// 승패 감지 설정
    pub outcome: OutcomeMonitorConfig,
}

impl EngineConfig {
    /// 기본 설정 생성 (환경변수 미적용).
    pub fn default_config(base_dir: &Path) -> Self {
        Self {
            board: BoardMonitorConfig::default_config(base_dir),
            recording: RecordingMonitorConfig::default_config(base_dir),
            outcome: OutcomeMonitorConfig::default_config(base_dir),
        }
    }

    /// 기본 설정에 `GAMSI_*` 환경변수 오버라이드를 1회 적용하여 로드.
    ///
    /// 오버라이드 지점은 여기뿐이다:
    /// - `GAMSI_BROADCAST_DIR` / `GAMSI_BROADCAST_BASENAME` — 방송 출력 위치
    /// - `GAMSI_ARCHIVE_DIR` — 보관 디렉토리 이름
    /// - `GAMSI_IMAGE_FORMAT` — png/jpg (그 외 값은 png)
    /// - `GAMSI_BOARD_THRESHOLD` / `GAMSI_TAG_THRESHOLD` /
    ///   `GAMSI_MATCH_THRESHOLD` — 임계값 튜닝
    pub fn load(base_dir: &Path) -> Self {
        let mut config = Self::default_config(base_dir);

        let ext = match env_trimmed("GAMSI_IMAGE_FORMAT")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "jpg".to_string(),
            _ => default_output_ext(),
        };
        let broadcast_dir = env_trimmed("GAMSI_BROADCAST_DIR").unwrap_or_else(|| "broadcast".into());
        let basename = env_trimmed("GAMSI_BROADCAST_BASENAME").unwrap_or_else(|| "broadcast".into());
        let archive_dir = env_trimmed("GAMSI_ARCHIVE_DIR").unwrap_or_else(|| "archive".into());

        config.board.output_ext = ext.clone();
        config.board.broadcast_path = base_dir.join(&broadcast_dir).join(format!("{basename}.{ext}"));
        config.board.composite_path = base_dir.join(&broadcast_dir).join(format!("composite.{ext}"));
        config.board.archive_dir = base_dir.join(&archive_dir);

        if let Some(v) = env_threshold("GAMSI_BOARD_THRESHOLD") {
            config.board.board_threshold = v;
        }
        if let Some(v) = env_threshold("GAMSI_TAG_THRESHOLD") {
            config.board.tag_threshold = v;
        }
        if let Some(v) = env_threshold("GAMSI_MATCH_THRESHOLD") {
            config.recording.match_threshold = v;
        }

        config
    }
}

// ============================================================
// 기본값 + 내부 헬퍼
// ============================================================

fn default_source_name() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

fn default_presence_threshold() -> f64 {
    0.4
}

fn default_outcome_threshold() -> f64 {
    0.2
}

fn default_board_poll_ms() -> u64 {
    2_000
}

fn default_inner_interval_ms() -> u64 {
    1_000
}

fn default_confirm_poll_ms() -> u64 {
    200
}

fn default_confirm_budget_ms() -> u64 {
    2_000
}

fn default_start_guard_ms() -> u64 {
    140_000
}

fn default_unknown_poll_limit() -> u32 {
    16
}

fn default_rest_floor_ms() -> u64 {
    100
}

fn default_outcome_cooldown_ms() -> u64 {
    10_000
}

fn default_outcome_poll_ms() -> u64 {
    500
}

fn default_output_ext() -> String {
    "png".to_string()
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_threshold(name: &str) -> Option<f64> {
    env_trimmed(name)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| (0.0..=1.0).contains(v))
}

fn validate_threshold(field: &str, value: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Config(format!(
            "{field}는 0.0..=1.0 범위여야 함 (현재 {value})"
        )));
    }
    Ok(())
}

fn validate_ext(ext: &str) -> Result<(), CoreError> {
    match ext {
        "png" | "jpg" | "jpeg" => Ok(()),
        other => Err(CoreError::Config(format!("지원하지 않는 출력 확장자: {other}"))),
    }
}
