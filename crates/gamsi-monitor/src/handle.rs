//! 모니터 핸들과 협조적 정지.
//!
//! 크로스 스레드 공유 상태는 원자적 정지 플래그 하나뿐이다.
//! 모든 대기는 짧은 슬라이스로 쪼개 플래그를 자주 확인하므로
//! 종료 지연은 슬라이스 한 개 수준으로 묶인다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gamsi_core::error::CoreError;
use tracing::{debug, warn};

/// 대기 슬라이스 — 정지 플래그 확인 주기.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// 종료 대기 슬라이스 수 × 폭 (40 × 25ms = 1초 상한).
const STOP_WAIT_SLICES: u32 = 40;
const STOP_WAIT_SLICE: Duration = Duration::from_millis(25);

/// 실행 중인 모니터 하나에 대한 핸들.
///
/// `start_*` 호출이 만들고, 짝이 되는 [`MonitorHandle::stop`]이 플래그를
/// 세운 뒤 유한 대기로 워커 종료를 기다린다.
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    name: &'static str,
}

impl MonitorHandle {
    /// 워커 스레드를 띄우고 핸들을 돌려준다.
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Result<Self, CoreError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))
            .map_err(|e| CoreError::Internal(format!("워커 스레드 생성 실패: {e}")))?;

        Ok(Self {
            stop,
            worker: Some(worker),
            name,
        })
    }

    /// 정지 플래그를 세우고 워커의 정상 종료를 유한 대기.
    ///
    /// 워커가 기한(약 1초) 안에 내려오면 true.
    /// 기한을 넘기면 스레드를 버리고(false) 반환한다 — 워커는 다음
    /// 슬라이스 경계에서 플래그를 보고 스스로 종료한다.
    pub fn stop(mut self) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        let Some(worker) = self.worker.take() else {
            return true;
        };
        for _ in 0..STOP_WAIT_SLICES {
            if worker.is_finished() {
                let joined = worker.join().is_ok();
                debug!("{} 워커 정상 종료", self.name);
                return joined;
            }
            thread::sleep(STOP_WAIT_SLICE);
        }
        warn!("{} 워커가 기한 내 종료하지 않음 — 분리", self.name);
        false
    }

    /// 워커가 이미 내려왔는지.
    pub fn is_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        // stop() 없이 버려져도 워커는 플래그를 보고 종료한다
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// 정지 플래그에 반응하는 대기.
///
/// `duration`을 ≤50ms 슬라이스로 쪼개 각 슬라이스 앞에서 플래그를
/// 확인한다. 정지가 관측되면 true.
pub(crate) fn sleep_interruptible(stop: &AtomicBool, duration: Duration) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if stop.load(Ordering::Relaxed) {
            return true;
        }
        let step = remaining.min(SLEEP_SLICE);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    stop.load(Ordering::Relaxed)
}
