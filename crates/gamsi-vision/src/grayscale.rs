//! 그레이스케일 투영.
//!
//! BGRA 버퍼를 `[0,1]` 정규화 루마 버퍼로 변환한다.
//! 가중치는 BT.601 (0.299 R + 0.587 G + 0.114 B) 고정 —
//! 매처의 정규화 상수와 같은 스케일을 공유한다.

use crate::buffer::{PixelBuffer, BYTES_PER_PIXEL};

/// 단일 채널 루마 버퍼. 생성 후 불변.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleBuffer {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl GrayscaleBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 행 우선(row-major) 루마 값.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// BGRA → 루마 투영. 순수 함수 — 빈 버퍼는 빈 출력.
pub fn to_grayscale(buffer: &PixelBuffer) -> GrayscaleBuffer {
    let mut data = Vec::with_capacity(buffer.width() as usize * buffer.height() as usize);
    for px in buffer.data().chunks_exact(BYTES_PER_PIXEL) {
        let b = f32::from(px[0]);
        let g = f32::from(px[1]);
        let r = f32::from(px[2]);
        data.push((r * 0.299 + g * 0.587 + b * 0.114) / 255.0);
    }
    GrayscaleBuffer {
        data,
        width: buffer.width(),
        height: buffer.height(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights_match_bt601() {
        // 순수 빨강: BGRA = (0,0,255)
        let red = PixelBuffer::filled(1, 1, [0, 0, 255, 255]);
        let g = to_grayscale(&red);
        assert!((g.data()[0] - 0.299).abs() < 1e-4);

        let green = PixelBuffer::filled(1, 1, [0, 255, 0, 255]);
        assert!((to_grayscale(&green).data()[0] - 0.587).abs() < 1e-4);

        let blue = PixelBuffer::filled(1, 1, [255, 0, 0, 255]);
        assert!((to_grayscale(&blue).data()[0] - 0.114).abs() < 1e-4);
    }

    #[test]
    fn white_is_one_black_is_zero() {
        let white = PixelBuffer::filled(2, 2, [255, 255, 255, 255]);
        for v in to_grayscale(&white).data() {
            assert!((v - 1.0).abs() < 1e-4);
        }
        let black = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        for v in to_grayscale(&black).data() {
            assert!(v.abs() < 1e-6);
        }
    }

    #[test]
    fn output_dimensions_match_input() {
        let buf = PixelBuffer::filled(7, 3, [10, 20, 30, 255]);
        let g = to_grayscale(&buf);
        assert_eq!((g.width(), g.height()), (7, 3));
        assert_eq!(g.data().len(), 21);
    }
}
