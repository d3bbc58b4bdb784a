//! 통합 테스트 공용 스텁 — 대본 기반 프레임 소스, 수집 옵저버, 녹화 스텁.
#![allow(dead_code)] // 테스트 바이너리마다 쓰는 스텁이 다르다

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use gamsi_core::error::CoreError;
use gamsi_core::models::{MonitorEvent, RecordingState};
use gamsi_core::ports::{FrameSource, MonitorObserver, RecorderControl};
use gamsi_vision::{codec, PixelBuffer};

/// 좌표+시드 기반 결정적 의사난수 패턴
pub fn pattern_pixel(x: u32, y: u32, seed: u32) -> u8 {
    let mut v = x
        .wrapping_mul(374_761_393)
        .wrapping_add(y.wrapping_mul(668_265_263))
        .wrapping_add(seed.wrapping_mul(2_246_822_519));
    v ^= v >> 13;
    v = v.wrapping_mul(1_274_126_177);
    v ^= v >> 16;
    (v % 256) as u8
}

/// `seed` 패턴으로 채운 버퍼
pub fn patterned(w: u32, h: u32, seed: u32) -> PixelBuffer {
    let mut buf = PixelBuffer::filled(w, h, [0, 0, 0, 255]);
    for y in 0..h {
        for x in 0..w {
            let v = pattern_pixel(x, y, seed);
            buf.set_pixel(x, y, [v, v, v, 255]);
        }
    }
    buf
}

/// `scene`의 `(ox,oy)`에 `tpl`을 심는다
pub fn embed(scene: &mut PixelBuffer, tpl: &PixelBuffer, ox: u32, oy: u32) {
    for y in 0..tpl.height() {
        for x in 0..tpl.width() {
            scene.set_pixel(ox + x, oy + y, tpl.pixel(x, y));
        }
    }
}

/// 대본 기반 프레임 소스.
///
/// capture 호출마다 대본의 다음 프레임을 PNG로 기록한다.
/// 대본이 끝나면 마지막 프레임을 반복한다.
pub struct ScriptedFrames {
    frames: Vec<PixelBuffer>,
    cursor: Mutex<usize>,
    captures: AtomicU32,
}

impl ScriptedFrames {
    pub fn new(frames: Vec<PixelBuffer>) -> Self {
        assert!(!frames.is_empty(), "대본이 비어 있음");
        Self {
            frames,
            cursor: Mutex::new(0),
            captures: AtomicU32::new(0),
        }
    }

    pub fn capture_count(&self) -> u32 {
        self.captures.load(Ordering::Relaxed)
    }
}

impl FrameSource for ScriptedFrames {
    fn capture(&self, _source_name: &str, dest: &Path) -> Result<(), CoreError> {
        let idx = {
            let mut cursor = self.cursor.lock();
            let idx = (*cursor).min(self.frames.len() - 1);
            *cursor += 1;
            idx
        };
        self.captures.fetch_add(1, Ordering::Relaxed);
        codec::encode(&self.frames[idx], dest)
    }
}

/// 이벤트/로그 수집 옵저버.
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<MonitorEvent>>,
    logs: Mutex<Vec<String>>,
}

impl CollectingObserver {
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().clone()
    }

    pub fn started_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Started { .. }))
            .count()
    }

    pub fn stop_observed_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MonitorEvent::StopObserved { .. }))
            .count()
    }

    pub fn stopped_on_exit_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MonitorEvent::StoppedOnExit { .. }))
            .count()
    }

    pub fn log_count_containing(&self, needle: &str) -> usize {
        self.logs.lock().iter().filter(|l| l.contains(needle)).count()
    }
}

impl MonitorObserver for CollectingObserver {
    fn on_event(&self, event: MonitorEvent) {
        self.events.lock().push(event);
    }

    fn log(&self, message: &str) {
        self.logs.lock().push(message.to_string());
    }
}

/// 녹화 제어 스텁.
///
/// `confirm_on_start`/`confirm_on_stop`이 켜져 있으면 요청 즉시 상태가
/// 바뀌고, 꺼져 있으면 상태가 고정된다 (불안정한 호스트 시뮬레이션).
pub struct StubRecorder {
    state: Mutex<RecordingState>,
    pub start_calls: AtomicU32,
    pub stop_calls: AtomicU32,
    start_succeeds: bool,
    confirm_on_start: bool,
    confirm_on_stop: bool,
}

impl StubRecorder {
    pub fn reliable() -> Self {
        Self::new(RecordingState::Inactive, true, true, true)
    }

    /// 상태 질의가 영원히 Unknown인 호스트
    pub fn always_unknown(start_succeeds: bool) -> Self {
        Self::new(RecordingState::Unknown, start_succeeds, false, false)
    }

    fn new(
        initial: RecordingState,
        start_succeeds: bool,
        confirm_on_start: bool,
        confirm_on_stop: bool,
    ) -> Self {
        Self {
            state: Mutex::new(initial),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            start_succeeds,
            confirm_on_start,
            confirm_on_stop,
        }
    }
}

impl RecorderControl for StubRecorder {
    fn start_recording(&self) -> Result<(), CoreError> {
        self.start_calls.fetch_add(1, Ordering::Relaxed);
        if !self.start_succeeds {
            return Err(CoreError::Internal("녹화 시작 거부".to_string()));
        }
        if self.confirm_on_start {
            *self.state.lock() = RecordingState::Active;
        }
        Ok(())
    }

    fn stop_recording(&self) -> Result<(), CoreError> {
        self.stop_calls.fetch_add(1, Ordering::Relaxed);
        if self.confirm_on_stop {
            *self.state.lock() = RecordingState::Inactive;
        }
        Ok(())
    }

    fn recording_state(&self) -> RecordingState {
        *self.state.lock()
    }
}

/// 조건이 참이 될 때까지 폴링 (상한 `timeout_ms`)
pub fn wait_until(timeout_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
    let begin = std::time::Instant::now();
    while begin.elapsed() < std::time::Duration::from_millis(timeout_ms) {
        if cond() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    cond()
}
