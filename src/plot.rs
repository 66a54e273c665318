use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use rayon::prelude::*;

use crate::cluster::ClusterInterval;
use crate::error::RenderError;
use crate::matrix::PaeMatrix;

/// AlphaFold PAE values saturate at 31.75 Å; the colormap is anchored there.
const PAE_CEILING: f64 = 31.75;

/// Approximate edge length of the rendered heatmap in pixels; the per-cell
/// scale is the largest integer that stays under this.
const TARGET_EDGE: usize = 600;

/// White border around the heatmap, in pixels.
const PADDING: usize = 8;

const OUTLINE_THICKNESS: usize = 2;
const OUTLINE_COLOR: [u8; 3] = [214, 39, 40];
const LOW_COLOR: [u8; 3] = [0, 68, 27];
const HIGH_COLOR: [u8; 3] = [247, 252, 245];
const BACKGROUND: [u8; 3] = [255, 255, 255];

/// Renders the error matrix as a PNG heatmap with red outline boxes over
/// each cluster interval's diagonal block.
///
/// Low error renders dark green, high error near-white (reversed Greens).
/// The output is a pure function of the matrix and intervals: identical
/// inputs produce identical bytes, which the artifact cache relies on.
pub fn render_pae_plot(
    matrix: &PaeMatrix,
    intervals: &[ClusterInterval],
) -> Result<Vec<u8>, RenderError> {
    let n = matrix.n_residues();
    if n == 0 {
        return Err(RenderError::Encode("matrix has no residues".to_string()));
    }
    let scale = (TARGET_EDGE / n).max(1);
    let edge = n * scale + 2 * PADDING;

    let mut pixels = vec![0u8; edge * edge * 3];
    pixels
        .par_chunks_exact_mut(edge * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..edge {
                let color = heatmap_color(matrix, n, scale, x, y);
                row[x * 3..x * 3 + 3].copy_from_slice(&color);
            }
        });

    for interval in intervals {
        draw_block_outline(&mut pixels, edge, n, scale, interval);
    }

    let image = RgbImage::from_raw(edge as u32, edge as u32, pixels)
        .ok_or_else(|| RenderError::Encode("pixel buffer size mismatch".to_string()))?;
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(bytes)
}

fn heatmap_color(matrix: &PaeMatrix, n: usize, scale: usize, x: usize, y: usize) -> [u8; 3] {
    let inside = |p: usize| p >= PADDING && p < PADDING + n * scale;
    if !inside(x) || !inside(y) {
        return BACKGROUND;
    }
    let row = (y - PADDING) / scale;
    let col = (x - PADDING) / scale;
    let t = (matrix.get(row, col).clamp(0.0, PAE_CEILING) / PAE_CEILING).clamp(0.0, 1.0);
    let lerp = |low: u8, high: u8| (low as f64 + (high as f64 - low as f64) * t).round() as u8;
    [
        lerp(LOW_COLOR[0], HIGH_COLOR[0]),
        lerp(LOW_COLOR[1], HIGH_COLOR[1]),
        lerp(LOW_COLOR[2], HIGH_COLOR[2]),
    ]
}

fn draw_block_outline(
    pixels: &mut [u8],
    edge: usize,
    n: usize,
    scale: usize,
    interval: &ClusterInterval,
) {
    // Intervals come from the external routine untouched; clamp rather than
    // trust them to stay inside the matrix.
    let start = interval.start().min(n - 1);
    let end = interval.end().min(n - 1);
    let x0 = PADDING + start * scale;
    let x1 = PADDING + (end + 1) * scale;
    let thickness = OUTLINE_THICKNESS.min(x1 - x0);

    let mut put = |x: usize, y: usize| {
        let idx = (y * edge + x) * 3;
        pixels[idx..idx + 3].copy_from_slice(&OUTLINE_COLOR);
    };
    for x in x0..x1 {
        for t in 0..thickness {
            put(x, x0 + t);
            put(x, x1 - 1 - t);
        }
    }
    for y in x0..x1 {
        for t in 0..thickness {
            put(x0 + t, y);
            put(x1 - 1 - t, y);
        }
    }
}
