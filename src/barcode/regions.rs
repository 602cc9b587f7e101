//! Region-candidate heuristic.
//!
//! Counts roughly rectangular, wider-than-tall dark regions. The count only
//! separates "nothing on the page" from "something there but unreadable"; it
//! never supplies marker values.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::close;

use crate::config::RegionConfig;

/// Axis-aligned bounding box of an accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Vertex count after polygon approximation.
    pub vertices: usize,
}

impl Region {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

pub trait RegionDetector: Send + Sync {
    fn find_regions(&self, image: &GrayImage) -> Vec<Region>;

    fn count_regions(&self, image: &GrayImage) -> usize {
        self.find_regions(image).len()
    }
}

/// Contour-based detector built on `imageproc`.
#[derive(Debug, Clone, Default)]
pub struct ContourRegionDetector {
    config: RegionConfig,
}

impl ContourRegionDetector {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    /// Dark pixels become foreground (255) using Otsu's level.
    fn binarize(&self, image: &GrayImage) -> Option<GrayImage> {
        let (min, max) = image
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        if min >= max {
            return None;
        }

        let level = otsu_level(image);
        let binary = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y).0[0] <= level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        if self.config.close_radius > 0 {
            Some(close(&binary, Norm::LInf, self.config.close_radius))
        } else {
            Some(binary)
        }
    }

    fn accept(&self, region: &Region) -> bool {
        let aspect = region.aspect_ratio();
        region.area() > u64::from(self.config.min_area)
            && aspect >= self.config.min_aspect
            && aspect <= self.config.max_aspect
            && region.vertices <= self.config.max_vertices
    }
}

impl RegionDetector for ContourRegionDetector {
    fn find_regions(&self, image: &GrayImage) -> Vec<Region> {
        let Some(binary) = self.binarize(image) else {
            return Vec::new();
        };

        find_contours::<u32>(&binary)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter(|c| c.points.len() > 2)
            .filter_map(|contour| {
                let min_x = contour.points.iter().map(|p| p.x).min()?;
                let max_x = contour.points.iter().map(|p| p.x).max()?;
                let min_y = contour.points.iter().map(|p| p.y).min()?;
                let max_y = contour.points.iter().map(|p| p.y).max()?;

                let perimeter = arc_length(&contour.points, true);
                let epsilon = self.config.approx_epsilon_ratio * perimeter;
                if epsilon <= 0.0 {
                    return None;
                }
                let polygon = approximate_polygon_dp(&contour.points, epsilon, true);

                let region = Region {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                    vertices: polygon.len(),
                };
                self.accept(&region).then_some(region)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn page_with(rects: &[(i32, i32, u32, u32)]) -> GrayImage {
        let mut image = GrayImage::from_pixel(600, 400, Luma([255u8]));
        for &(x, y, w, h) in rects {
            draw_filled_rect_mut(&mut image, Rect::at(x, y).of_size(w, h), Luma([0u8]));
        }
        image
    }

    #[test]
    fn test_blank_page_has_no_regions() {
        let detector = ContourRegionDetector::default();
        let image = GrayImage::from_pixel(300, 200, Luma([255u8]));
        assert_eq!(detector.count_regions(&image), 0);
    }

    #[test]
    fn test_wide_bar_is_candidate() {
        let detector = ContourRegionDetector::default();
        let image = page_with(&[(50, 50, 200, 50)]);
        let regions = detector.find_regions(&image);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].width, 200);
        assert_eq!(regions[0].height, 50);
        assert!(regions[0].vertices <= 6);
    }

    #[test]
    fn test_square_and_tiny_shapes_are_rejected() {
        let detector = ContourRegionDetector::default();
        // square: aspect 1.0; tiny: area below minimum; tall: aspect < 1
        let image = page_with(&[(20, 20, 100, 100), (300, 20, 20, 5), (400, 150, 40, 200)]);
        assert_eq!(detector.count_regions(&image), 0);
    }

    #[test]
    fn test_counts_multiple_bars() {
        let detector = ContourRegionDetector::default();
        let image = page_with(&[(40, 40, 240, 60), (40, 250, 300, 50)]);
        assert_eq!(detector.count_regions(&image), 2);
    }

    #[test]
    fn test_region_geometry() {
        let region = Region {
            x: 0,
            y: 0,
            width: 300,
            height: 60,
            vertices: 4,
        };
        assert_eq!(region.area(), 18_000);
        assert!((region.aspect_ratio() - 5.0).abs() < f32::EPSILON);
    }
}
