//! 수직 합성.
//!
//! 같은 폭의 버퍼 열을 위에서 아래로 이어 붙인다. 폭이 다른 입력은
//! 가장 좁은 입력 폭으로 비율 축소한다 (fast_image_resize, 양선형).

use fast_image_resize::{images::Image as FirImage, ResizeAlg, ResizeOptions, Resizer};
use tracing::debug;

use gamsi_core::error::CoreError;

use crate::buffer::{PixelBuffer, BYTES_PER_PIXEL};

/// 버퍼 열을 입력 순서대로 수직 연결.
///
/// - 출력 폭 = 입력 최소 폭
/// - 더 넓은 입력은 비율 유지 축소 (높이도 같은 배율, 최소 1px)
/// - 최소 폭과 같은 입력은 그대로 복사
/// - 출력 높이 = (축소 반영된) 입력 높이의 합
///
/// 입력이 비어 있으면 실패한다.
pub fn vconcat(buffers: &[PixelBuffer]) -> Result<PixelBuffer, CoreError> {
    let min_width = buffers
        .iter()
        .map(PixelBuffer::width)
        .min()
        .ok_or_else(|| CoreError::Internal("합성 입력이 비어 있음".to_string()))?;

    let mut scaled: Vec<PixelBuffer> = Vec::with_capacity(buffers.len());
    for buf in buffers {
        if buf.width() == min_width {
            scaled.push(buf.clone());
        } else {
            let scale = f64::from(min_width) / f64::from(buf.width());
            let target_h = ((f64::from(buf.height()) * scale).round() as u32).max(1);
            scaled.push(resize(buf, min_width, target_h)?);
        }
    }

    let total_height: u32 = scaled.iter().map(PixelBuffer::height).sum();
    let stride = min_width as usize * BYTES_PER_PIXEL;
    let mut data = Vec::with_capacity(stride * total_height as usize);
    for buf in &scaled {
        data.extend_from_slice(buf.data());
    }

    debug!(
        "수직 합성: {}개 입력 → {}x{}",
        buffers.len(),
        min_width,
        total_height
    );
    PixelBuffer::from_bgra(min_width, total_height, data)
}

/// fast_image_resize 양선형 축소.
fn resize(buffer: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer, CoreError> {
    let src = FirImage::from_vec_u8(
        buffer.width(),
        buffer.height(),
        buffer.data().to_vec(),
        fast_image_resize::PixelType::U8x4,
    )
    .map_err(|e| CoreError::Internal(format!("소스 이미지 생성 실패: {e}")))?;

    let mut dst = FirImage::new(width, height, fast_image_resize::PixelType::U8x4);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));
    resizer
        .resize(&src, &mut dst, &options)
        .map_err(|e| CoreError::Internal(format!("리사이즈 실패: {e}")))?;

    PixelBuffer::from_bgra(width, height, dst.into_vec())
}
