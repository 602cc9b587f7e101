//! Progressive image enhancement between decode attempts.

use std::fmt;

use image::GrayImage;
use imageproc::contrast::equalize_histogram;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;

const BLUR_SIGMA: f32 = 1.0;
const CLOSE_RADIUS: u8 = 1;

/// Named enhancement stages, each including every earlier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnhancementStage {
    Original,
    Equalized,
    Denoised,
    Closed,
}

/// Attempt index to stage. Attempts past the end reuse the last stage.
pub const STAGES: [EnhancementStage; 4] = [
    EnhancementStage::Original,
    EnhancementStage::Equalized,
    EnhancementStage::Denoised,
    EnhancementStage::Closed,
];

impl EnhancementStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Equalized => "equalized",
            Self::Denoised => "denoised",
            Self::Closed => "closed",
        }
    }

    /// Apply this stage (and every stage before it) to `image`.
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        if *self == Self::Original {
            return image.clone();
        }

        let mut enhanced = equalize_histogram(image);
        if *self >= Self::Denoised {
            enhanced = gaussian_blur_f32(&enhanced, BLUR_SIGMA);
        }
        if *self >= Self::Closed {
            enhanced = close(&enhanced, Norm::LInf, CLOSE_RADIUS);
        }
        enhanced
    }
}

impl fmt::Display for EnhancementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn stage_for_attempt(attempt: usize) -> EnhancementStage {
    STAGES[attempt.min(STAGES.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([(100 + x % 20) as u8]))
    }

    #[test]
    fn test_stage_table() {
        assert_eq!(stage_for_attempt(0), EnhancementStage::Original);
        assert_eq!(stage_for_attempt(1), EnhancementStage::Equalized);
        assert_eq!(stage_for_attempt(2), EnhancementStage::Denoised);
        assert_eq!(stage_for_attempt(3), EnhancementStage::Closed);
        assert_eq!(stage_for_attempt(4), EnhancementStage::Closed);
        assert_eq!(stage_for_attempt(100), EnhancementStage::Closed);
    }

    #[test]
    fn test_original_is_identity() {
        let image = gradient(32, 8);
        assert_eq!(EnhancementStage::Original.apply(&image), image);
    }

    #[test]
    fn test_stages_preserve_dimensions() {
        let image = gradient(40, 12);
        for stage in STAGES {
            let out = stage.apply(&image);
            assert_eq!(out.dimensions(), image.dimensions(), "{}", stage);
        }
    }

    #[test]
    fn test_equalization_stretches_contrast() {
        let image = gradient(40, 4);
        let out = EnhancementStage::Equalized.apply(&image);
        let max_in = image.pixels().map(|p| p.0[0]).max().unwrap();
        let max_out = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert!(max_out > max_in);
    }
}
