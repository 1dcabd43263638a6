//! Device-pixel-ratio aware cropping of full-frame captures.
//!
//! The overlay reports its rectangle in logical pixels while the host hands
//! back a frame in physical pixels, so every field of the rectangle is scaled
//! by the device pixel ratio before sampling.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage, imageops};
use thiserror::Error;

use crate::region::Rect;

/// Errors produced while cropping a frame.
#[derive(Debug, Error)]
pub enum CropError {
    #[error("failed to decode captured frame: {0}")]
    DecodeError(#[source] image::ImageError),

    #[error("failed to encode cropped image: {0}")]
    EncodeError(#[source] image::ImageError),

    #[error("selection {width}x{height} at ratio {ratio} has no pixels")]
    EmptyRegion { width: f64, height: f64, ratio: f64 },

    #[error("cropped image {width}x{height} exceeds the canvas pixel limit")]
    TooLarge { width: u32, height: u32 },
}

/// Largest output canvas accepted, in pixels (1 GiB of RGBA).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Crop `frame` (any encoded image the `image` crate can read) to `rect`.
///
/// The result is a PNG whose pixel size is exactly `rect` scaled by
/// `device_pixel_ratio`. Negative source offsets are clamped to zero, and
/// any part of the selection that falls outside the frame stays transparent.
pub fn crop(frame: &[u8], rect: &Rect, device_pixel_ratio: f64) -> Result<Vec<u8>, CropError> {
    let physical = rect
        .to_physical(device_pixel_ratio)
        .ok_or(CropError::EmptyRegion {
            width: rect.width,
            height: rect.height,
            ratio: device_pixel_ratio,
        })?;

    if u64::from(physical.width) * u64::from(physical.height) > MAX_CANVAS_PIXELS {
        return Err(CropError::TooLarge {
            width: physical.width,
            height: physical.height,
        });
    }

    let source = image::load_from_memory(frame)
        .map_err(CropError::DecodeError)?
        .to_rgba8();
    let (frame_w, frame_h) = source.dimensions();

    let src_x = physical.x.clamp(0, frame_w as i64) as u32;
    let src_y = physical.y.clamp(0, frame_h as i64) as u32;
    let copy_w = physical.width.min(frame_w - src_x);
    let copy_h = physical.height.min(frame_h - src_y);

    log::debug!(
        "Cropping {}x{} frame: selection {} -> physical {:?} (copy {}x{} from {},{})",
        frame_w,
        frame_h,
        rect,
        physical,
        copy_w,
        copy_h,
        src_x,
        src_y
    );

    let mut canvas = RgbaImage::new(physical.width, physical.height);
    if copy_w > 0 && copy_h > 0 {
        let region = imageops::crop_imm(&source, src_x, src_y, copy_w, copy_h).to_image();
        imageops::replace(&mut canvas, &region, 0, 0);
    }

    encode_png(canvas)
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>, CropError> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(CropError::EncodeError)?;
    Ok(buffer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    /// Encode a gradient frame where each pixel stores its own coordinates.
    pub(crate) fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory(bytes).unwrap().to_rgba8()
    }

    #[test]
    fn output_size_is_scaled_by_ratio() {
        let frame = gradient_png(400, 300);
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);

        let cropped = decode(&crop(&frame, &rect, 2.0).unwrap());
        assert_eq!(cropped.dimensions(), (200, 100));
        // Top-left pixel comes from the physical offset (20, 40).
        assert_eq!(cropped.get_pixel(0, 0).0, [20, 40, 0, 255]);
    }

    #[test]
    fn ratio_of_one_samples_logical_offset() {
        let frame = gradient_png(64, 64);
        let rect = Rect::new(5.0, 7.0, 10.0, 10.0);

        let cropped = decode(&crop(&frame, &rect, 1.0).unwrap());
        assert_eq!(cropped.dimensions(), (10, 10));
        assert_eq!(cropped.get_pixel(0, 0).0, [5, 7, 0, 255]);
        assert_eq!(cropped.get_pixel(9, 9).0, [14, 16, 0, 255]);
    }

    #[test]
    fn negative_offsets_clamp_to_frame_origin() {
        let frame = gradient_png(50, 50);
        let rect = Rect::new(-10.0, -5.0, 20.0, 20.0);

        let cropped = decode(&crop(&frame, &rect, 1.0).unwrap());
        assert_eq!(cropped.dimensions(), (20, 20));
        assert_eq!(cropped.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn selection_past_frame_edge_is_transparent() {
        let frame = gradient_png(30, 30);
        let rect = Rect::new(20.0, 20.0, 20.0, 20.0);

        let cropped = decode(&crop(&frame, &rect, 1.0).unwrap());
        assert_eq!(cropped.dimensions(), (20, 20));
        assert_eq!(cropped.get_pixel(0, 0).0, [20, 20, 0, 255]);
        assert_eq!(cropped.get_pixel(15, 15).0[3], 0);
    }

    #[test]
    fn garbage_frame_is_a_decode_error() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let err = crop(b"not an image", &rect, 1.0).unwrap_err();
        assert!(matches!(err, CropError::DecodeError(_)), "got {err:?}");
    }

    #[test]
    fn oversized_selection_is_rejected_before_allocating() {
        let frame = gradient_png(10, 10);

        let huge = Rect::new(0.0, 0.0, 3e9, 3e9);
        let err = crop(&frame, &huge, 1.0).unwrap_err();
        assert!(matches!(err, CropError::TooLarge { .. }), "got {err:?}");

        let wide = Rect::new(0.0, 0.0, 100_000.0, 100_000.0);
        let err = crop(&frame, &wide, 1.0).unwrap_err();
        assert!(
            matches!(
                err,
                CropError::TooLarge {
                    width: 100_000,
                    height: 100_000
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn largest_allowed_canvas_passes_the_size_check() {
        // 16384 x 16384 sits exactly on the limit; the garbage frame proves
        // the size check let it through to decoding.
        let rect = Rect::new(0.0, 0.0, 16_384.0, 16_384.0);
        let err = crop(b"not an image", &rect, 1.0).unwrap_err();
        assert!(matches!(err, CropError::DecodeError(_)), "got {err:?}");
    }

    #[test]
    fn zero_sized_selection_is_rejected() {
        let frame = gradient_png(10, 10);
        let rect = Rect::new(0.0, 0.0, 0.0, 10.0);
        let err = crop(&frame, &rect, 1.0).unwrap_err();
        assert!(matches!(err, CropError::EmptyRegion { .. }));
    }
}
