//! JET colormap (blue → cyan → yellow → red), matching the usual
//! OpenCV / MATLAB rendition.

/// RGB colour for intensity `v`.
pub fn jet(v: u8) -> [u8; 3] {
    let x = v as f32 / 255.0;
    let channel = |centre: f32| {
        let c = (1.5 - (4.0 * x - centre).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_dark_blue_and_dark_red() {
        assert_eq!(jet(0), [0, 0, 128]);
        assert_eq!(jet(255), [128, 0, 0]);
    }

    #[test]
    fn midpoint_is_green_dominant() {
        let [r, g, b] = jet(128);
        assert_eq!(g, 255);
        assert!(r > 100 && b > 100);
    }
}
