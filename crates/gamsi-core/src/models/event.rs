//! 모니터 이벤트와 녹화 상태.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 호스트 녹화 상태 질의 응답 — 3상.
///
/// 호스트 측 질의는 불안정할 수 있으므로 `Unknown`이 일급 값이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    /// 녹화 중으로 확인됨
    Active,
    /// 녹화 중이 아님으로 확인됨
    Inactive,
    /// 판정 불가 (질의 실패/응답 없음)
    Unknown,
}

/// 승패 판정 결과 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// 승리 라벨 감지
    Win,
    /// 패배 라벨 감지
    Lose,
    /// 회선 끊김 라벨 감지
    Disconnect,
}

/// 승패 누적 집계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub win: u32,
    pub lose: u32,
    pub disconnect: u32,
}

/// 모니터가 옵저버로 내보내는 이벤트.
///
/// 모니터 워커 스레드에서 동기 호출로 전달된다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// 녹화 시작이 확인(또는 낙관적 수용)됨
    Started {
        /// 시작 확정 시각
        at: DateTime<Utc>,
    },
    /// 정지 마커 관측 — 정지 확인 이전에 즉시 발행
    StopObserved {
        /// 마커 관측 시각
        at: DateTime<Utc>,
    },
    /// 모니터 종료 시점에 녹화가 남아 있어 정지시킴
    StoppedOnExit {
        /// 정리 시각
        at: DateTime<Utc>,
    },
    /// 승패 라벨 감지 (집계 포함)
    OutcomeDetected {
        kind: OutcomeKind,
        counts: OutcomeCounts,
        at: DateTime<Utc>,
    },
}
