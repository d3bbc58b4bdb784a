//! 파일 코덱 — 디코드/인코드.
//!
//! `image` crate 기반. 디코드는 어떤 래스터 컨테이너든 첫 프레임을
//! BGRA로 변환하고, 인코드는 대상 경로의 확장자로 컨테이너를 고른다
//! (대소문자 무시 `.jpg`/`.jpeg` → JPEG, 그 외 전부 PNG).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbImage, RgbaImage};
use tracing::debug;

use gamsi_core::error::CoreError;

use crate::buffer::{PixelBuffer, BYTES_PER_PIXEL};

/// JPEG 고정 품질 상수. 호출 지점에서 조정할 수 없다.
const JPEG_QUALITY: u8 = 90;

/// 파일을 BGRA 버퍼로 디코드.
///
/// 파일 부재, 읽기 불가, 빈 파일, 코덱 거부 모두 [`CoreError::DecodeFailed`].
pub fn decode(path: &Path) -> Result<PixelBuffer, CoreError> {
    let image = image::open(path)
        .map_err(|e| CoreError::DecodeFailed(format!("{}: {e}", path.display())))?;
    let rgba = image.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    if w == 0 || h == 0 {
        return Err(CoreError::DecodeFailed(format!(
            "{}: 크기 0 프레임",
            path.display()
        )));
    }

    let mut data = rgba.into_raw();
    // RGBA → BGRA 채널 교환
    for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }

    debug!("디코드 완료: {} ({}x{})", path.display(), w, h);
    PixelBuffer::from_bgra(w, h, data)
}

/// 버퍼를 파일로 인코드.
///
/// 컨테이너는 확장자로 결정한다: `.jpg`/`.jpeg`(대소문자 무시)면
/// 고정 품질 JPEG, 그 외(`.png` 포함, 확장자 없음 포함)는 PNG.
pub fn encode(buffer: &PixelBuffer, path: &Path) -> Result<(), CoreError> {
    let (w, h) = (buffer.width(), buffer.height());

    // BGRA → RGBA 복원
    let mut data = buffer.data().to_vec();
    for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
    let rgba = RgbaImage::from_raw(w, h, data)
        .ok_or_else(|| CoreError::EncodeFailed(format!("{}: 버퍼 변환 실패", path.display())))?;

    let file = File::create(path)
        .map_err(|e| CoreError::EncodeFailed(format!("{}: {e}", path.display())))?;
    let writer = BufWriter::new(file);

    if is_jpeg_ext(path) {
        // JPEG는 알파 없음 — RGB로 투영
        let rgb: RgbImage = image::DynamicImage::ImageRgba8(rgba).to_rgb8();
        JpegEncoder::new_with_quality(writer, JPEG_QUALITY)
            .write_image(rgb.as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .map_err(|e| CoreError::EncodeFailed(format!("{}: {e}", path.display())))?;
    } else {
        PngEncoder::new(writer)
            .write_image(rgba.as_raw(), w, h, image::ExtendedColorType::Rgba8)
            .map_err(|e| CoreError::EncodeFailed(format!("{}: {e}", path.display())))?;
    }

    debug!("인코드 완료: {} ({}x{})", path.display(), w, h);
    Ok(())
}

fn is_jpeg_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            e == "jpg" || e == "jpeg"
        })
        .unwrap_or(false)
}
