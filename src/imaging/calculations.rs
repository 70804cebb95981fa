//! Pure calculation functions for image dimensions and size accounting.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions that fit inside a bounding box.
///
/// Images already inside the box keep their dimensions (never upscale).
/// Otherwise both axes are scaled by `min(max_w / w, max_h / h)` and rounded
/// to the nearest integer independently, so the aspect ratio may drift by up
/// to half a pixel per axis. Axes that would round to zero are clamped to 1.
///
/// # Examples
/// ```
/// # use gallery_admin::imaging::calculate_target_dimensions;
/// assert_eq!(calculate_target_dimensions((3000, 2000), (1200, 1200)), (1200, 800));
/// assert_eq!(calculate_target_dimensions((400, 300), (1200, 1200)), (400, 300));
/// ```
pub fn calculate_target_dimensions(original: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (width, height) = original;
    let (max_w, max_h) = max;

    if width <= max_w && height <= max_h {
        return (width, height);
    }

    let ratio = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let scaled_w = ((width as f64 * ratio).round() as u32).max(1);
    let scaled_h = ((height as f64 * ratio).round() as u32).max(1);
    (scaled_w, scaled_h)
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of bytes saved, one decimal place.
///
/// Negative when the encoded output is larger than the original. An empty
/// original reports `0.0`.
pub fn compression_ratio(original_size: u64, optimized_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let saved = original_size as f64 - optimized_size as f64;
    round1(saved / original_size as f64 * 100.0)
}

/// Megapixels, two decimal places.
pub fn megapixels(width: u32, height: u32) -> f64 {
    round2(width as f64 * height as f64 / 1_000_000.0)
}

/// Width / height, two decimal places. Zero-height images report `0.0`.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        return 0.0;
    }
    round2(width as f64 / height as f64)
}

/// Centered square crop region as `(x, y, side)`.
///
/// The side is the shorter edge; the offset centers the square on the longer
/// axis (odd remainders are floored).
pub fn square_crop_region(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_target_dimensions tests
    // =========================================================================

    #[test]
    fn target_keeps_small_image() {
        assert_eq!(calculate_target_dimensions((400, 300), (1200, 1200)), (400, 300));
    }

    #[test]
    fn target_keeps_image_exactly_at_bounds() {
        assert_eq!(
            calculate_target_dimensions((1200, 1200), (1200, 1200)),
            (1200, 1200)
        );
    }

    #[test]
    fn target_scales_landscape() {
        // r = min(1200/3000, 1200/2000) = 0.4
        assert_eq!(calculate_target_dimensions((3000, 2000), (1200, 1200)), (1200, 800));
    }

    #[test]
    fn target_scales_portrait() {
        // r = min(1200/1500, 1200/4000) = 0.3
        assert_eq!(calculate_target_dimensions((1500, 4000), (1200, 1200)), (450, 1200));
    }

    #[test]
    fn target_scales_when_only_height_exceeds() {
        // r = min(1200/1000, 1200/1300) = 0.923..
        assert_eq!(calculate_target_dimensions((1000, 1300), (1200, 1200)), (923, 1200));
    }

    #[test]
    fn target_rounds_each_axis_independently() {
        // r = 1000/3333 → 1333 * r = 399.94 → 400
        let (w, h) = calculate_target_dimensions((3333, 1333), (1000, 1000));
        assert_eq!(w, 1000);
        assert_eq!(h, 400);
    }

    #[test]
    fn target_respects_non_square_box() {
        // r = min(800/2000, 600/1000) = 0.4
        assert_eq!(calculate_target_dimensions((2000, 1000), (800, 600)), (800, 400));
    }

    #[test]
    fn target_clamps_degenerate_axis() {
        assert_eq!(calculate_target_dimensions((10000, 1), (100, 100)), (100, 1));
    }

    #[test]
    fn target_matches_rounding_formula_over_grid() {
        let max = (1200u32, 1200u32);
        for w in (100..5000).step_by(397) {
            for h in (100..5000).step_by(421) {
                let (tw, th) = calculate_target_dimensions((w, h), max);
                if w <= max.0 && h <= max.1 {
                    assert_eq!((tw, th), (w, h));
                } else {
                    let r = (max.0 as f64 / w as f64).min(max.1 as f64 / h as f64);
                    assert_eq!(tw, ((w as f64 * r).round() as u32).max(1));
                    assert_eq!(th, ((h as f64 * r).round() as u32).max(1));
                    assert!(tw.max(th) <= max.0.max(max.1));
                }
            }
        }
    }

    // =========================================================================
    // compression_ratio tests
    // =========================================================================

    #[test]
    fn compression_ratio_one_decimal() {
        // (1000 - 547) / 1000 * 100 = 45.3
        assert_eq!(compression_ratio(1000, 547), 45.3);
        // 1/3 saved → 33.333.. → 33.3
        assert_eq!(compression_ratio(3, 2), 33.3);
    }

    #[test]
    fn compression_ratio_negative_when_larger() {
        assert_eq!(compression_ratio(1000, 1500), -50.0);
    }

    #[test]
    fn compression_ratio_empty_original() {
        assert_eq!(compression_ratio(0, 10), 0.0);
    }

    #[test]
    fn compression_ratio_rederives_exactly() {
        for (original, optimized) in [(2_000_000, 183_211), (51_200, 51_200), (7, 3)] {
            let reported = compression_ratio(original, optimized);
            assert_eq!(reported, compression_ratio(original, optimized));
            assert_eq!(
                reported,
                round1((original as f64 - optimized as f64) / original as f64 * 100.0)
            );
        }
    }

    // =========================================================================
    // analysis helpers
    // =========================================================================

    #[test]
    fn megapixels_two_decimals() {
        assert_eq!(megapixels(3000, 2000), 6.0);
        assert_eq!(megapixels(1920, 1080), 2.07);
    }

    #[test]
    fn aspect_ratio_two_decimals() {
        assert_eq!(aspect_ratio(1920, 1080), 1.78);
        assert_eq!(aspect_ratio(400, 300), 1.33);
        assert_eq!(aspect_ratio(10, 0), 0.0);
    }

    #[test]
    fn square_crop_landscape() {
        assert_eq!(square_crop_region(800, 600), (100, 0, 600));
    }

    #[test]
    fn square_crop_portrait() {
        assert_eq!(square_crop_region(600, 801), (0, 100, 600));
    }

    #[test]
    fn square_crop_square() {
        assert_eq!(square_crop_region(300, 300), (0, 0, 300));
    }
}
