//! Image → input tensor conversion.
//!
//! Decode, RGB, 224×224 bilinear resize, `[0,1]` scaling, ImageNet
//! normalisation, NCHW layout.

use image::imageops::FilterType;

use super::ClassifierError;

/// Model input edge length in pixels.
pub const INPUT_SIZE: u32 = 224;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Input tensor shape: `[batch, channels, height, width]`.
pub const INPUT_SHAPE: [i64; 4] = [1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64];

/// Decode `bytes` and produce a flat NCHW `f32` buffer of length `3 * 224 * 224`.
pub fn preprocess(bytes: &[u8]) -> Result<Vec<f32>, ClassifierError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ClassifierError::Decode(e.to_string()))?;

    let rgb = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut out = vec![0.0f32; 3 * plane];
    for (i, px) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let v = px.0[c] as f32 / 255.0;
            out[c * plane + i] = (v - MEAN[c]) / STD[c];
        }
    }
    Ok(out)
}
