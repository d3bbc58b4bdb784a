//! NCC 템플릿 매칭.
//!
//! 정규화 교차상관(normalized cross-correlation)의 전수 슬라이딩 윈도우.
//! FFT 가속도, 조기 종료도, 스트라이드도 없다 — 이 도메인의 템플릿과
//! 탐색 영역은 수십~수백 픽셀 수준이라 O(이미지 면적 × 템플릿 면적)
//! 전수 탐색이 결정적이고 충분히 빠르다.

use gamsi_core::models::Rect;
use tracing::trace;

use crate::buffer::PixelBuffer;
use crate::grayscale::{to_grayscale, GrayscaleBuffer};

/// "절대 매칭 없음" 센티널. 유효 NCC 범위(≈[-1,1])보다 항상 작다.
pub const NCC_NEVER: f64 = -2.0;

/// 평탄 영역 0-나눗셈 방지용 분산 하한.
const VAR_EPSILON: f64 = 1e-8;

/// 템플릿의 최적 정렬 위치와 점수.
///
/// 템플릿이 어느 축으로든 이미지보다 크면 `None`.
/// 스캔은 행 우선(y 바깥, x 안쪽)이며 동점은 먼저 만난 최대가 이긴다.
/// 누적은 저장 정밀도와 무관하게 전부 `f64`로 수행한다.
pub fn best_alignment(
    image: &GrayscaleBuffer,
    template: &GrayscaleBuffer,
) -> Option<(f64, u32, u32)> {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw > iw || th > ih || tw == 0 || th == 0 {
        return None;
    }

    let img = image.data();
    let tpl = template.data();
    let n = (tw * th) as f64;

    // 템플릿 평균/분산은 한 번만 계산
    let mut sum_t = 0.0;
    let mut sum_t2 = 0.0;
    for &v in tpl {
        let v = f64::from(v);
        sum_t += v;
        sum_t2 += v * v;
    }
    let mean_t = sum_t / n;
    let var_t = (sum_t2 / n - mean_t * mean_t).max(VAR_EPSILON);

    let mut best = NCC_NEVER;
    let mut best_pos = (0u32, 0u32);

    for y in 0..=(ih - th) {
        for x in 0..=(iw - tw) {
            let mut sum_i = 0.0;
            let mut sum_i2 = 0.0;
            let mut sum_it = 0.0;
            for j in 0..th {
                let row = &img[(y + j) * iw + x..(y + j) * iw + x + tw];
                let trow = &tpl[j * tw..(j + 1) * tw];
                for (iv, tv) in row.iter().zip(trow) {
                    let iv = f64::from(*iv);
                    let tv = f64::from(*tv);
                    sum_i += iv;
                    sum_i2 += iv * iv;
                    sum_it += iv * tv;
                }
            }
            let mean_i = sum_i / n;
            let var_i = (sum_i2 / n - mean_i * mean_i).max(VAR_EPSILON);
            let cov = sum_it / n - mean_i * mean_t;
            let ncc = cov / (var_i.sqrt() * var_t.sqrt());
            if ncc > best {
                best = ncc;
                best_pos = (x as u32, y as u32);
            }
        }
    }

    trace!(
        "최적 정렬: ({}, {}) 점수 {:.4}",
        best_pos.0,
        best_pos.1,
        best
    );
    Some((best, best_pos.0, best_pos.1))
}

/// 전체 슬라이딩 윈도우의 최대 NCC 점수.
///
/// 템플릿이 이미지에 들어가지 않으면 [`NCC_NEVER`] — 어떤 임계값도
/// 넘지 못하는 값이다.
pub fn max_ncc(image: &GrayscaleBuffer, template: &GrayscaleBuffer) -> f64 {
    best_alignment(image, template)
        .map(|(score, _, _)| score)
        .unwrap_or(NCC_NEVER)
}

/// 이미지의 부분 영역 안에서 임계값 초과 정렬이 존재하는지 판정.
///
/// `rect`는 이미지 경계로 클램프된다. 클램프 결과 교집합이 비면
/// 에러 없이 "미발견"으로 답한다.
pub fn match_in_region(
    image: &PixelBuffer,
    rect: &Rect,
    template: &PixelBuffer,
    threshold: f64,
) -> bool {
    if rect.is_empty_within(image.width(), image.height()) {
        return false;
    }
    let region = image.crop(rect);
    let score = max_ncc(&to_grayscale(&region), &to_grayscale(template));
    score >= threshold
}
