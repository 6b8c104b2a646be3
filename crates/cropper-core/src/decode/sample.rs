//! Integer decode factors that keep decoded buffers bounded.
//!
//! Decoding at `1/factor` resolution is how a very large source gets
//! turned into something that fits in memory. Two questions are answered
//! here:
//!
//! - how coarse the preview decode may be while still filling the viewport
//!   ([`compute_sample_size`]);
//! - how coarse the export region decode may be while still covering the
//!   export size ([`region_sample_size`]).

use serde::{Deserialize, Serialize};

/// How the preview factor grows while the decode is still oversized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStrategy {
    /// `factor *= 2`. Coarser steps, matches decoders that only subsample by
    /// powers of two.
    #[default]
    PowerOfTwo,
    /// `factor += 1`. Tightest fit.
    Linear,
}

impl SampleStrategy {
    #[inline]
    fn next(self, factor: u32) -> u32 {
        match self {
            SampleStrategy::PowerOfTwo => factor * 2,
            SampleStrategy::Linear => factor + 1,
        }
    }
}

/// Compute the preview decode factor for a `source_w x source_h` image shown
/// within `bound_w x bound_h`.
///
/// Returns 1 when the source already fits. Otherwise the axis with the larger
/// excess is matched exactly, the other bound is recomputed proportionally,
/// and the factor grows while half the source (at that factor) still exceeds
/// the bound on both axes.
///
/// # Panics
///
/// Panics if either bound is zero. Bounds come from a validated
/// [`PreviewSize`](crate::preview::PreviewSize), so zero here is a bug.
pub fn compute_sample_size(
    source_w: u32,
    source_h: u32,
    bound_w: u32,
    bound_h: u32,
    strategy: SampleStrategy,
) -> u32 {
    assert!(
        bound_w > 0 && bound_h > 0,
        "sample bounds must be positive, got {bound_w}x{bound_h}"
    );

    if source_w <= bound_w && source_h <= bound_h {
        return 1;
    }

    let (mut bound_w, mut bound_h) = (bound_w as u64, bound_h as u64);
    let (width, height) = (source_w as u64, source_h as u64);

    let excess_x = width as i64 - bound_w as i64;
    let excess_y = height as i64 - bound_h as i64;
    if excess_x > excess_y {
        bound_h = height * bound_w / width;
    } else {
        bound_w = width * bound_h / height;
    }

    let half_w = width / 2;
    let half_h = height / 2;

    let mut factor = 1u32;
    while half_h / factor as u64 > bound_h && half_w / factor as u64 > bound_w {
        factor = strategy.next(factor);
    }
    factor
}

/// Compute the subsample factor for decoding a `crop_w x crop_h` region that
/// will end up as `out_w x out_h`.
///
/// The factor only grows while the next step still leaves the decoded region
/// strictly larger than the output on both axes, so the decode is never
/// coarser than the output and at most one step finer than needed.
pub fn region_sample_size(crop_w: u32, crop_h: u32, out_w: u32, out_h: u32) -> u32 {
    let mut factor = 1u32;
    while crop_w / (factor + 1) > out_w && crop_h / (factor + 1) > out_h {
        factor += 1;
    }
    factor
}

/// Dimensions of a `width x height` image decoded at `1/factor`.
pub fn sampled_dimensions(width: u32, height: u32, factor: u32) -> (u32, u32) {
    let factor = factor.max(1);
    ((width / factor).max(1), (height / factor).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_returns_one() {
        assert_eq!(compute_sample_size(800, 600, 1080, 1080, SampleStrategy::PowerOfTwo), 1);
        assert_eq!(compute_sample_size(1080, 1080, 1080, 1080, SampleStrategy::Linear), 1);
    }

    #[test]
    fn test_landscape_scenario() {
        // Width has the larger excess: bound_h becomes 3000 * 1080 / 4000 = 810.
        // half = 2000x1500; factor 1 exceeds, factor 2 gives 750 <= 810.
        assert_eq!(compute_sample_size(4000, 3000, 1080, 1080, SampleStrategy::PowerOfTwo), 2);
        assert_eq!(compute_sample_size(4000, 3000, 1080, 1080, SampleStrategy::Linear), 2);
    }

    #[test]
    fn test_strategies_diverge() {
        // 12000x9000 into 1000x1000: bound_h = 750, half = 6000x4500.
        // Linear stops at 6 (750 <= 750), power of two overshoots to 8.
        assert_eq!(compute_sample_size(12000, 9000, 1000, 1000, SampleStrategy::Linear), 6);
        assert_eq!(compute_sample_size(12000, 9000, 1000, 1000, SampleStrategy::PowerOfTwo), 8);
    }

    #[test]
    fn test_portrait_matches_height() {
        // Height has the larger excess: bound_w = 3000 * 1000 / 6000 = 500.
        // half = 1500x3000: factor 2 gives 750x1500 > 500x1000, factor 4 gives 375x750.
        assert_eq!(compute_sample_size(3000, 6000, 1000, 1000, SampleStrategy::PowerOfTwo), 4);
        assert_eq!(compute_sample_size(3000, 6000, 1000, 1000, SampleStrategy::Linear), 3);
    }

    #[test]
    fn test_slightly_oversized_stays_one() {
        // Only just over the bound: half the source already fits.
        assert_eq!(compute_sample_size(1200, 900, 1080, 1080, SampleStrategy::PowerOfTwo), 1);
    }

    #[test]
    #[should_panic(expected = "sample bounds must be positive")]
    fn test_zero_bound_panics() {
        compute_sample_size(100, 100, 0, 100, SampleStrategy::Linear);
    }

    #[test]
    fn test_region_sample_size() {
        // 1600x1200 crop into 512x384: /2 = 800x600 > target, /3 = 533x400 > target,
        // /4 = 400x300 would be coarser.
        assert_eq!(region_sample_size(1600, 1200, 512, 384), 3);
        assert_eq!(region_sample_size(500, 500, 500, 500), 1);
        assert_eq!(region_sample_size(100, 100, 200, 200), 1);
    }

    #[test]
    fn test_sampled_dimensions() {
        assert_eq!(sampled_dimensions(4000, 3000, 2), (2000, 1500));
        assert_eq!(sampled_dimensions(5, 3, 4), (1, 1));
        assert_eq!(sampled_dimensions(10, 10, 0), (10, 10));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
