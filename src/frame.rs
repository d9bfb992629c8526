//! Raw frame reconstruction.
//! Platform capture hands over pixel buffers whose rows may carry alignment
//! padding (`row_stride >= pixel_stride * width`). Reconstruction strips the
//! padding and yields a densely packed RGBA image the rest of the pipeline
//! can own and drop freely. Latency goal: well under a frame interval; this
//! is at most two buffer copies.

use image::{Rgba, RgbaImage, imageops};

use crate::error::FrameError;

/// Bytes per pixel in the packed output image.
const BYTES_PER_PIXEL: u32 = 4;

/// One raw captured frame as described by the platform: dimensions, the
/// pixel plane, and its memory layout. Produced once per capture event,
/// consumed immediately by [`reconstruct`], never retained.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// Byte distance between the starts of consecutive rows.
    pub row_stride: u32,
    /// Byte distance between consecutive pixels within a row.
    pub pixel_stride: u32,
}

impl RawFrame {
    /// Wraps an already densely packed RGBA buffer.
    pub fn packed(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            row_stride: width * BYTES_PER_PIXEL,
            pixel_stride: BYTES_PER_PIXEL,
        }
    }
}

/// Converts a raw frame into a `width x height` image with padding removed.
///
/// `row_padding = row_stride - pixel_stride * width`. A dense buffer is
/// copied directly. A padded buffer is rebuilt at its true row width
/// (`width + row_padding / pixel_stride` pixels) and then cropped to the
/// top-left `width x height` rectangle; the pre-crop working image is
/// released as soon as the crop completes.
///
/// Fails with [`FrameError::MalformedFrame`] when the padding is not a
/// whole number of pixels, the dimensions are degenerate, or the buffer is
/// shorter than the declared layout requires. Malformed frames are
/// non-retryable: the caller skips them and keeps capturing.
pub fn reconstruct(frame: &RawFrame) -> Result<RgbaImage, FrameError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(FrameError::MalformedFrame(format!(
            "degenerate dimensions {}x{}",
            frame.width, frame.height
        )));
    }
    if frame.pixel_stride < BYTES_PER_PIXEL {
        return Err(FrameError::MalformedFrame(format!(
            "pixel stride {} smaller than {} bytes per pixel",
            frame.pixel_stride, BYTES_PER_PIXEL
        )));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let row_stride = frame.row_stride as usize;
    let pixel_stride = frame.pixel_stride as usize;

    let row_content = pixel_stride * width;
    if row_stride < row_content {
        return Err(FrameError::MalformedFrame(format!(
            "row stride {row_stride} smaller than row content {row_content}"
        )));
    }
    let row_padding = row_stride - row_content;
    if row_padding % pixel_stride != 0 {
        return Err(FrameError::MalformedFrame(format!(
            "row padding {row_padding} not divisible by pixel stride {pixel_stride}"
        )));
    }

    // Every addressed pixel must be inside the buffer. The platform may
    // omit the trailing padding of the final row.
    let min_len = (height - 1) * row_stride + row_content;
    if frame.data.len() < min_len {
        return Err(FrameError::MalformedFrame(format!(
            "buffer holds {} bytes, layout requires at least {min_len}",
            frame.data.len()
        )));
    }

    if pixel_stride == BYTES_PER_PIXEL as usize {
        let full_len = row_stride * height;
        if row_padding == 0 {
            let pixels = frame.data[..full_len].to_vec();
            return RgbaImage::from_raw(frame.width, frame.height, pixels).ok_or_else(|| {
                FrameError::MalformedFrame("buffer length does not match dimensions".into())
            });
        }
        if frame.data.len() >= full_len {
            // Rebuild at the buffer's true row width, then crop off the
            // padding columns. The working image dies with this scope.
            let full_width = frame.width + (row_padding as u32) / frame.pixel_stride;
            let working = RgbaImage::from_raw(full_width, frame.height, frame.data[..full_len].to_vec())
                .ok_or_else(|| {
                    FrameError::MalformedFrame("buffer length does not match padded dimensions".into())
                })?;
            return Ok(imageops::crop_imm(&working, 0, 0, frame.width, frame.height).to_image());
        }
    }

    // Last-row-truncated or wide-pixel layouts: copy pixel by pixel.
    let mut out = RgbaImage::new(frame.width, frame.height);
    for y in 0..height {
        let row = &frame.data[y * row_stride..];
        for x in 0..width {
            let p = &row[x * pixel_stride..x * pixel_stride + BYTES_PER_PIXEL as usize];
            out.put_pixel(x as u32, y as u32, Rgba([p[0], p[1], p[2], p[3]]));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs a deterministic byte pattern into a raw buffer with the given
    /// layout: the pixel at (x, y) holds bytes starting from
    /// `y * row_stride + x * pixel_stride`.
    fn patterned_buffer(height: u32, row_stride: u32) -> Vec<u8> {
        (0..height * row_stride).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn dense_buffer_copies_directly() {
        let frame = RawFrame::packed(3, 2, patterned_buffer(2, 12));
        let img = reconstruct(&frame).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        for y in 0..2u32 {
            for x in 0..3u32 {
                let offset = (y * 12 + x * 4) as usize;
                let expected = &frame.data[offset..offset + 4];
                assert_eq!(&img.get_pixel(x, y).0, expected, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn padded_rows_are_cropped() {
        // width=3, height=2, pixel_stride=4, row_stride=16: one padding
        // pixel per row, so the true row width is 4 pixels.
        let frame = RawFrame {
            width: 3,
            height: 2,
            data: patterned_buffer(2, 16),
            row_stride: 16,
            pixel_stride: 4,
        };
        let img = reconstruct(&frame).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        for y in 0..2u32 {
            for x in 0..3u32 {
                let offset = (y * 16 + x * 4) as usize;
                let expected = &frame.data[offset..offset + 4];
                assert_eq!(&img.get_pixel(x, y).0, expected, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn padding_roundtrip_reproduces_unpadded_pixels() {
        // Synthetically pad a 5x4 image with 3 padding pixels per row, then
        // reconstruct and compare against the unpadded original.
        let (width, height, pad_pixels) = (5u32, 4u32, 3u32);
        let dense = RawFrame::packed(width, height, patterned_buffer(height, width * 4));
        let original = reconstruct(&dense).unwrap();

        let row_stride = (width + pad_pixels) * 4;
        let mut padded = vec![0xAAu8; (height * row_stride) as usize];
        for y in 0..height {
            let src = (y * width * 4) as usize;
            let dst = (y * row_stride) as usize;
            padded[dst..dst + (width * 4) as usize]
                .copy_from_slice(&dense.data[src..src + (width * 4) as usize]);
        }
        let frame = RawFrame {
            width,
            height,
            data: padded,
            row_stride,
            pixel_stride: 4,
        };
        assert_eq!(reconstruct(&frame).unwrap(), original);
    }

    #[test]
    fn indivisible_padding_is_malformed() {
        // row_stride=14 leaves 2 bytes of padding against a 4-byte pixel.
        let frame = RawFrame {
            width: 3,
            height: 2,
            data: patterned_buffer(2, 14),
            row_stride: 14,
            pixel_stride: 4,
        };
        let err = reconstruct(&frame).unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(_)));
        assert!(err.to_string().contains("not divisible"));
    }

    #[test]
    fn degenerate_dimensions_are_malformed() {
        let frame = RawFrame::packed(0, 2, Vec::new());
        assert!(matches!(
            reconstruct(&frame),
            Err(FrameError::MalformedFrame(_))
        ));
        let frame = RawFrame::packed(3, 0, Vec::new());
        assert!(matches!(
            reconstruct(&frame),
            Err(FrameError::MalformedFrame(_))
        ));
    }

    #[test]
    fn short_buffer_is_malformed() {
        let frame = RawFrame {
            width: 3,
            height: 2,
            data: vec![0u8; 20],
            row_stride: 16,
            pixel_stride: 4,
        };
        let err = reconstruct(&frame).unwrap_err();
        assert!(err.to_string().contains("layout requires"));
    }

    #[test]
    fn truncated_final_row_padding_is_accepted() {
        // Buffer ends right after the last row's content, without its
        // trailing padding.
        let frame = RawFrame {
            width: 3,
            height: 2,
            data: patterned_buffer(2, 16)[..28].to_vec(),
            row_stride: 16,
            pixel_stride: 4,
        };
        let img = reconstruct(&frame).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        let expected = &frame.data[16..20];
        assert_eq!(&img.get_pixel(0, 1).0, expected);
    }

    #[test]
    fn wide_pixel_stride_takes_leading_bytes() {
        // 6-byte pixels: only the first 4 bytes of each cell are color.
        let frame = RawFrame {
            width: 2,
            height: 1,
            data: patterned_buffer(1, 12),
            row_stride: 12,
            pixel_stride: 6,
        };
        let img = reconstruct(&frame).unwrap();
        assert_eq!(&img.get_pixel(1, 0).0, &frame.data[6..10]);
    }
}
