//! Image resampling with OpenCV-compatible sampling grids.
//!
//! Enlarging is bilinear sampling at pixel centers, which is what
//! `image`'s triangle filter computes. Shrinking uses area averaging (each
//! output pixel is the overlap-weighted mean of the source pixels it
//! covers), applied as per-axis `(source index, weight)` taps, horizontally
//! then vertically.

use image::imageops::FilterType;

use crate::shared::pixel_array::{PixelArray, CHANNELS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Area,
    Linear,
}

impl Interpolation {
    /// Area when shrinking, linear when enlarging.
    pub fn for_scale(scale: f64) -> Self {
        if scale < 1.0 {
            Self::Area
        } else {
            Self::Linear
        }
    }
}

type Taps = Vec<Vec<(usize, f32)>>;

pub fn resize(src: &PixelArray, dst_width: u32, dst_height: u32, interp: Interpolation) -> PixelArray {
    if src.width() == dst_width && src.height() == dst_height {
        return src.clone();
    }
    if src.is_empty() || dst_width == 0 || dst_height == 0 {
        return PixelArray::filled(dst_width, dst_height, [0, 0, 0]);
    }
    let shrinking = dst_width <= src.width() && dst_height <= src.height();
    match interp {
        Interpolation::Area if shrinking => area_resize(src, dst_width, dst_height),
        _ => PixelArray::from_rgb_image(image::imageops::resize(
            &src.to_rgb_image(),
            dst_width,
            dst_height,
            FilterType::Triangle,
        )),
    }
}

fn area_resize(src: &PixelArray, dst_width: u32, dst_height: u32) -> PixelArray {
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (dw, dh) = (dst_width as usize, dst_height as usize);
    let x_taps = area_taps(sw, dw);
    let y_taps = area_taps(sh, dh);
    let data = src.data();

    // Horizontal pass: sh rows x dw columns.
    let mut horizontal = vec![0f32; sh * dw * CHANNELS];
    for row in 0..sh {
        let src_row = &data[row * sw * CHANNELS..(row + 1) * sw * CHANNELS];
        let out_row = &mut horizontal[row * dw * CHANNELS..(row + 1) * dw * CHANNELS];
        for (x, col_taps) in x_taps.iter().enumerate() {
            for &(sx, w) in col_taps {
                for c in 0..CHANNELS {
                    out_row[x * CHANNELS + c] += src_row[sx * CHANNELS + c] as f32 * w;
                }
            }
        }
    }

    // Vertical pass.
    let mut out = vec![0u8; dh * dw * CHANNELS];
    let row_len = dw * CHANNELS;
    for (y, row_taps) in y_taps.iter().enumerate() {
        let out_row = &mut out[y * row_len..(y + 1) * row_len];
        for (i, value) in out_row.iter_mut().enumerate() {
            let acc: f32 = row_taps
                .iter()
                .map(|&(sy, w)| horizontal[sy * row_len + i] * w)
                .sum();
            *value = acc.round().clamp(0.0, 255.0) as u8;
        }
    }

    PixelArray::new(out, dst_width, dst_height)
}

/// Overlap-weighted taps for downscaling; `src_len >= dst_len`.
fn area_taps(src_len: usize, dst_len: usize) -> Taps {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let fs1 = d as f64 * scale;
            let fs2 = fs1 + scale;
            let cell = scale.min(src_len as f64 - fs1);
            let s1 = fs1.ceil() as usize;
            let s2 = (fs2.floor() as usize).min(src_len);

            let mut out = Vec::with_capacity(s2.saturating_sub(s1) + 2);
            if s1 as f64 - fs1 > 1e-3 {
                out.push((s1 - 1, ((s1 as f64 - fs1) / cell) as f32));
            }
            for s in s1..s2 {
                out.push((s, (1.0 / cell) as f32));
            }
            if fs2 - s2 as f64 > 1e-3 && s2 < src_len {
                let w = (fs2 - s2 as f64).min(1.0).min(cell) / cell;
                out.push((s2, w as f32));
            }
            out
        })
        .collect()
}
