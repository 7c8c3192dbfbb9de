//! Minimal 2-D line-plot rasterizer with a PNG encoder.
//!
//! Output is an 8-bit RGB PNG: grid, axes through the origin when visible,
//! and the curve as a polyline.

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression, Crc};

use crate::{errors::Error, Result};

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 500;
pub const DEFAULT_SAMPLES: usize = 500;

const MARGIN: i64 = 40;
const GRID_DIVISIONS: i64 = 10;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const GRID: [u8; 3] = [228, 228, 228];
const AXIS: [u8; 3] = [90, 90, 90];
const CURVE: [u8; 3] = [31, 119, 180];

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Evenly spaced samples of `f` over `[from, to]`, both ends included.
pub fn sample_curve(range: (f64, f64), samples: usize, f: impl Fn(f64) -> f64) -> Vec<(f64, f64)> {
    let (from, to) = range;
    let n = samples.max(2);
    let step = (to - from) / (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = from + step * i as f64;
            (x, f(x))
        })
        .collect()
}

/// Rasterize `points` (in order) and encode the image as PNG.
pub fn render_curve(points: &[(f64, f64)], width: u32, height: u32) -> Result<Vec<u8>> {
    let finite = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect::<Vec<_>>();
    if finite.len() < 2 {
        return Err(Error::Calculation(
            "need at least two finite points to draw a curve".to_string(),
        ));
    }
    if i64::from(width) <= 2 * MARGIN || i64::from(height) <= 2 * MARGIN {
        return Err(Error::Calculation(format!(
            "canvas {width}x{height} is too small"
        )));
    }

    let (x_min, x_max) = bounds(finite.iter().map(|p| p.0));
    let (y_min, y_max) = bounds(finite.iter().map(|p| p.1));
    let y_pad = (y_max - y_min) * 0.05;
    let view = Viewport {
        x_min,
        x_max,
        y_min: y_min - y_pad,
        y_max: y_max + y_pad,
        width: i64::from(width),
        height: i64::from(height),
    };

    let mut canvas = Canvas::new(width, height, BACKGROUND);
    let (left, top, right, bottom) = view.frame();

    for i in 0..=GRID_DIVISIONS {
        let px = left + (right - left) * i / GRID_DIVISIONS;
        let py = top + (bottom - top) * i / GRID_DIVISIONS;
        canvas.line(px, top, px, bottom, GRID);
        canvas.line(left, py, right, py, GRID);
    }

    if view.x_min <= 0.0 && 0.0 <= view.x_max {
        let px = view.px(0.0);
        canvas.line(px, top, px, bottom, AXIS);
    }
    if view.y_min <= 0.0 && 0.0 <= view.y_max {
        let py = view.py(0.0);
        canvas.line(left, py, right, py, AXIS);
    }

    for pair in finite.windows(2) {
        let (x0, y0) = (view.px(pair[0].0), view.py(pair[0].1));
        let (x1, y1) = (view.px(pair[1].0), view.py(pair[1].1));
        canvas.line(x0, y0, x1, y1, CURVE);
        canvas.line(x0, y0 + 1, x1, y1 + 1, CURVE);
    }

    encode_png(width, height, &canvas.pixels)
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo == hi {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

struct Viewport {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    width: i64,
    height: i64,
}

impl Viewport {
    fn frame(&self) -> (i64, i64, i64, i64) {
        (MARGIN, MARGIN, self.width - MARGIN - 1, self.height - MARGIN - 1)
    }

    fn px(&self, x: f64) -> i64 {
        let span = (self.width - 2 * MARGIN - 1) as f64;
        MARGIN + ((x - self.x_min) / (self.x_max - self.x_min) * span).round() as i64
    }

    fn py(&self, y: f64) -> i64 {
        let span = (self.height - 2 * MARGIN - 1) as f64;
        let offset = ((y - self.y_min) / (self.y_max - self.y_min) * span).round() as i64;
        self.height - MARGIN - 1 - offset
    }
}

struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32, fill: [u8; 3]) -> Self {
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len * 3);
        for _ in 0..len {
            pixels.extend_from_slice(&fill);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn set(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[idx..idx + 3].copy_from_slice(&color);
    }

    /// Bresenham line, clipped per pixel.
    fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;

        loop {
            self.set(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Encode packed RGB rows as a PNG (no filtering, zlib-compressed).
pub fn encode_png(width: u32, height: u32, rgb: &[u8]) -> Result<Vec<u8>> {
    let row_len = width as usize * 3;
    if rgb.len() != row_len * height as usize {
        return Err(Error::Calculation(format!(
            "pixel buffer of {} bytes does not match {width}x{height}",
            rgb.len()
        )));
    }

    let mut raw = Vec::with_capacity((row_len + 1) * height as usize);
    for row in rgb.chunks_exact(row_len.max(1)) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&raw)?;
    let idat = enc.finish()?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth 8, color type RGB, deflate, adaptive filtering, no interlace
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = Vec::with_capacity(idat.len() + 64);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    fn be_u32(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[test]
    fn samples_cover_both_ends() {
        let pts = sample_curve((-10.0, 10.0), 5, |x| x * x);
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[0], (-10.0, 100.0));
        assert_eq!(pts[2], (0.0, 0.0));
        assert_eq!(pts[4], (10.0, 100.0));
    }

    #[test]
    fn png_layout_is_valid() {
        let png = encode_png(2, 1, &[255, 0, 0, 0, 255, 0]).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);

        // IHDR
        assert_eq!(be_u32(&png[8..12]), 13);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(be_u32(&png[16..20]), 2);
        assert_eq!(be_u32(&png[20..24]), 1);

        // IEND with its well-known CRC
        let tail = &png[png.len() - 12..];
        assert_eq!(be_u32(&tail[..4]), 0);
        assert_eq!(&tail[4..8], b"IEND");
        assert_eq!(be_u32(&tail[8..]), 0xAE42_6082);

        // IDAT decompresses to filter byte + RGB row
        let idat_len = be_u32(&png[33..37]) as usize;
        assert_eq!(&png[37..41], b"IDAT");
        let mut raw = Vec::new();
        ZlibDecoder::new(&png[41..41 + idat_len])
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw, vec![0, 255, 0, 0, 0, 255, 0]);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(encode_png(2, 2, &[0; 6]).is_err());
    }

    #[test]
    fn renders_parabola() {
        let pts = sample_curve((-10.0, 10.0), DEFAULT_SAMPLES, |x| x * x);
        let png = render_curve(&pts, DEFAULT_WIDTH, DEFAULT_HEIGHT).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
        assert_eq!(be_u32(&png[16..20]), DEFAULT_WIDTH);
        assert_eq!(be_u32(&png[20..24]), DEFAULT_HEIGHT);
    }

    #[test]
    fn degenerate_input_is_an_error() {
        assert!(render_curve(&[(0.0, 1.0)], 200, 200).is_err());
        assert!(render_curve(&[(0.0, f64::NAN), (1.0, f64::INFINITY)], 200, 200).is_err());
        assert!(render_curve(&[(0.0, 0.0), (1.0, 1.0)], 50, 50).is_err());
        // Flat line still renders.
        assert!(render_curve(&[(0.0, 3.0), (1.0, 3.0)], 200, 200).is_ok());
    }
}
