//! Segmentation subsystem: threshold overlay for an uploaded X-ray.
//!
//! Not a learned model: the image is binarised (Otsu by default), the mask is
//! JET colour-mapped and alpha-blended over the grayscale original, and the
//! result is returned as PNG bytes. A U-Net can replace `mask` later without
//! touching callers.

pub mod colormap;

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::config::SegmentationConfig;

/// Overlay edge length in pixels.
pub const OUTPUT_SIZE: u32 = 224;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode overlay: {0}")]
    Encode(String),
}

/// Produce the PNG overlay for `bytes`.
///
/// `predicted_class` only selects the condition group reported in logs;
/// the threshold itself comes from Otsu unless `config.threshold` is set.
pub fn apply_segmentation(
    bytes: &[u8],
    predicted_class: &str,
    config: &SegmentationConfig,
) -> Result<Vec<u8>, SegmentationError> {
    let rgb = image::load_from_memory(bytes)
        .map_err(|e| SegmentationError::Decode(e.to_string()))?
        .to_rgb8();
    let gray = imageops::resize(&luma_601(&rgb), OUTPUT_SIZE, OUTPUT_SIZE, FilterType::Triangle);

    let threshold = config.threshold.unwrap_or_else(|| otsu_threshold(&gray));
    debug!(
        predicted_class,
        group = condition_group(predicted_class),
        nominal = nominal_threshold(predicted_class),
        threshold,
        "segmenting image"
    );

    let blended = blend(&gray, threshold, config.alpha);

    let mut buf = Cursor::new(Vec::new());
    blended
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| SegmentationError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// ITU-R 601-2 luma in 16-bit fixed point: `L = R*299/1000 + G*587/1000 + B*114/1000`.
///
/// `to_luma8` uses Rec. 709 weights, which darkens red-heavy images.
fn luma_601(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Condition group name used in logs.
fn condition_group(predicted_class: &str) -> &'static str {
    match predicted_class {
        "Pneumonia" | "Tuberculosis" | "Infiltration" => "infectious",
        "Cardiomegaly" | "Effusion" => "cardiac",
        _ => "other",
    }
}

/// Per-group threshold hint. Otsu overrides it; kept for diagnostics.
fn nominal_threshold(predicted_class: &str) -> u8 {
    match condition_group(predicted_class) {
        "infectious" => 150,
        "cardiac" => 100,
        _ => 120,
    }
}

/// Otsu's method: the threshold maximising between-class variance.
/// Pixels strictly above it belong to the foreground.
pub fn otsu_threshold(img: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let total: u64 = hist.iter().sum();
    let sum_all: f64 = hist.iter().enumerate().map(|(i, &h)| i as f64 * h as f64).sum();

    let mut sum_bg = 0.0f64;
    let mut weight_bg = 0u64;
    let mut best = 0u8;
    let mut best_var = 0.0f64;

    for (t, &h) in hist.iter().enumerate() {
        weight_bg += h;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as f64 * h as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;
        let between = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if between > best_var {
            best_var = between;
            best = t as u8;
        }
    }
    best
}

/// `out = gray * (1 - alpha) + jet(mask) * alpha`, rounded and saturated.
fn blend(gray: &GrayImage, threshold: u8, alpha: f32) -> RgbImage {
    let (w, h) = gray.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let g = gray.get_pixel(x, y).0[0];
        let mask = if g > threshold { 255 } else { 0 };
        let heat = colormap::jet(mask);
        let mix = |c: u8| {
            let v = g as f32 * (1.0 - alpha) + c as f32 * alpha;
            v.round().clamp(0.0, 255.0) as u8
        };
        Rgb([mix(heat[0]), mix(heat[1]), mix(heat[2])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: Option<u8>) -> SegmentationConfig {
        SegmentationConfig { threshold, alpha: 0.6 }
    }

    /// Left half dark, right half bright.
    fn two_tone(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            if x < width / 2 { Luma([40]) } else { Luma([200]) }
        })
    }

    fn encode(img: &GrayImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn otsu_separates_two_tones() {
        let t = otsu_threshold(&two_tone(32, 32));
        assert!((40..200).contains(&t), "threshold {t}");
    }

    #[test]
    fn blend_colours_mask_and_background() {
        let out = blend(&two_tone(4, 1), 100, 0.6);
        // dark pixel: 40 * 0.4 + jet(0) * 0.6 = [16, 16, 16 + 76.8]
        assert_eq!(out.get_pixel(0, 0).0, [16, 16, 93]);
        // bright pixel: 200 * 0.4 + jet(255) * 0.6 = [80 + 76.8, 80, 80]
        assert_eq!(out.get_pixel(3, 0).0, [157, 80, 80]);
    }

    #[test]
    fn output_is_224_png() {
        let bytes = encode(&two_tone(300, 200));
        let png = apply_segmentation(&bytes, "Pneumonia", &config(None)).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (OUTPUT_SIZE, OUTPUT_SIZE));
    }

    #[test]
    fn fixed_threshold_overrides_otsu() {
        // Everything is 200; a 250 threshold leaves the mask empty.
        let flat = GrayImage::from_pixel(16, 16, Luma([200]));
        let png = apply_segmentation(&encode(&flat), "Mass", &config(Some(250))).unwrap();
        let rgb = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(rgb.get_pixel(10, 10).0, [80, 80, 157]);
    }

    #[test]
    fn luma_uses_601_weights() {
        let rgb = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let gray = luma_601(&rgb);
        assert_eq!(gray.get_pixel(0, 0).0, [76]);
        assert_eq!(gray.get_pixel(1, 0).0, [150]);
        assert_eq!(gray.get_pixel(2, 0).0, [29]);
        // Gray stays gray.
        let flat = RgbImage::from_pixel(1, 1, Rgb([123, 123, 123]));
        assert_eq!(luma_601(&flat).get_pixel(0, 0).0, [123]);
    }

    #[test]
    fn colour_upload_blends_over_601_luma() {
        // Pure red is luma 76; a 255 threshold leaves the mask empty.
        let red = RgbImage::from_pixel(16, 16, Rgb([255, 0, 0]));
        let mut buf = Cursor::new(Vec::new());
        red.write_to(&mut buf, ImageFormat::Png).unwrap();

        let png = apply_segmentation(&buf.into_inner(), "Mass", &config(Some(255))).unwrap();
        let rgb = image::load_from_memory(&png).unwrap().to_rgb8();
        // 76 * 0.4 = 30.4; blue adds jet(0) = 128 * 0.6.
        assert_eq!(rgb.get_pixel(100, 100).0, [30, 30, 107]);
    }

    #[test]
    fn every_class_gets_an_overlay() {
        let bytes = encode(&two_tone(64, 64));
        for class in ["Pneumonia", "Tuberculosis", "Effusion", "Normal", "Unknown"] {
            assert!(!apply_segmentation(&bytes, class, &config(None)).unwrap().is_empty());
        }
    }

    #[test]
    fn groups_and_nominal_thresholds() {
        assert_eq!(nominal_threshold("Infiltration"), 150);
        assert_eq!(nominal_threshold("Cardiomegaly"), 100);
        assert_eq!(nominal_threshold("Hernia"), 120);
        assert_eq!(condition_group("Tuberculosis"), "infectious");
    }

    #[test]
    fn undecodable_bytes_are_decode_error() {
        let err = apply_segmentation(b"nope", "Normal", &config(None)).unwrap_err();
        assert!(matches!(err, SegmentationError::Decode(_)));
    }
}
