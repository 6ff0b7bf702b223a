use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::haar_cascade::{CascadeError, HaarCascade};
use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::rectangle_grouper::group_rectangles;
use crate::shared::constants::{GROUP_EPS, MIN_FACE_SIZE, MIN_NEIGHBORS, SCALE_FACTOR};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Sliding-window Viola-Jones detector over an image pyramid.
///
/// Runs with the stock frontal-face settings: pyramid step 1.1, clusters
/// need more than 5 hits, faces smaller than 30x30 are ignored.
pub struct HaarCascadeDetector {
    cascade: HaarCascade,
    scale_factor: f64,
    min_neighbors: usize,
    min_size: (u32, u32),
}

impl HaarCascadeDetector {
    pub fn new(cascade: HaarCascade) -> Self {
        Self {
            cascade,
            scale_factor: SCALE_FACTOR,
            min_neighbors: MIN_NEIGHBORS,
            min_size: MIN_FACE_SIZE,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CascadeError> {
        HaarCascade::load(path).map(Self::new)
    }

    /// Pyramid factors worth scanning for an image of the given size.
    fn scales(&self, width: u32, height: u32) -> Vec<f64> {
        let (ww, wh) = self.cascade.window_size();
        let mut scales = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let win_w = (ww as f64 * factor).round() as u32;
            let win_h = (wh as f64 * factor).round() as u32;
            let scaled_w = (width as f64 / factor).round() as u32;
            let scaled_h = (height as f64 / factor).round() as u32;

            if scaled_w < ww || scaled_h < wh || win_w > width || win_h > height {
                break;
            }
            if win_w >= self.min_size.0 && win_h >= self.min_size.1 {
                scales.push(factor);
            }
            factor *= self.scale_factor;
        }
        scales
    }

    fn raw_hits(&self, gray: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let image = GrayImage::from_raw(gray.width(), gray.height(), gray.data().to_vec())
            .ok_or("frame buffer does not match its dimensions")?;

        let mut hits = Vec::new();
        for factor in self.scales(gray.width(), gray.height()) {
            let before = hits.len();
            self.scan_scale(&image, factor, &mut hits);
            log::debug!(
                "scale {factor:.3}: {} candidate windows",
                hits.len() - before
            );
        }
        Ok(hits)
    }

    fn scan_scale(&self, image: &GrayImage, factor: f64, hits: &mut Vec<Region>) {
        let (ww, wh) = self.cascade.window_size();
        let scaled_w = (image.width() as f64 / factor).round() as u32;
        let scaled_h = (image.height() as f64 / factor).round() as u32;

        let scaled = if scaled_w == image.width() && scaled_h == image.height() {
            image.clone()
        } else {
            imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle)
        };
        let frame = Frame::new(scaled.into_raw(), scaled_w, scaled_h, 1);
        let integral = IntegralImage::new(frame.as_gray_ndarray());

        let step = if factor > 2.0 { 1 } else { 2 };
        let win_w = (ww as f64 * factor).round() as i32;
        let win_h = (wh as f64 * factor).round() as i32;

        for y in (0..=(scaled_h - wh) as usize).step_by(step) {
            for x in (0..=(scaled_w - ww) as usize).step_by(step) {
                if self.window_passes(&integral, x, y) {
                    hits.push(Region::new(
                        (x as f64 * factor).round() as i32,
                        (y as f64 * factor).round() as i32,
                        win_w,
                        win_h,
                    ));
                }
            }
        }
    }

    /// Runs every stage on the window whose top-left corner is `(x, y)`.
    fn window_passes(&self, integral: &IntegralImage, x: usize, y: usize) -> bool {
        let norm = self.variance_norm(integral, x, y);
        self.cascade.stages().iter().all(|stage| {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| weak.evaluate(|f| self.feature_value(integral, f, x, y) / norm))
                .sum();
            score >= stage.threshold
        })
    }

    /// Standard deviation scaled by area, over the window minus a 1px
    /// border. Flat windows normalise by 1.
    fn variance_norm(&self, integral: &IntegralImage, x: usize, y: usize) -> f64 {
        let (ww, wh) = self.cascade.window_size();
        let (w, h) = ((ww - 2) as usize, (wh - 2) as usize);
        let area = (w * h) as f64;
        let sum = integral.rect_sum(x + 1, y + 1, w, h);
        let sq_sum = integral.rect_sq_sum(x + 1, y + 1, w, h);
        let nf = area * sq_sum - sum * sum;
        if nf > 0.0 {
            nf.sqrt()
        } else {
            1.0
        }
    }

    fn feature_value(&self, integral: &IntegralImage, feature: usize, x: usize, y: usize) -> f64 {
        self.cascade.features()[feature]
            .rects
            .iter()
            .map(|r| {
                r.weight
                    * integral.rect_sum(
                        x + r.x as usize,
                        y + r.y as usize,
                        r.width as usize,
                        r.height as usize,
                    )
            })
            .sum()
    }
}

impl FaceDetector for HaarCascadeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let gray = frame.to_intensity();
        let hits = self.raw_hits(&gray)?;
        let faces = group_rectangles(&hits, self.min_neighbors, GROUP_EPS);
        log::debug!(
            "{}x{} frame: {} raw hits, {} faces",
            frame.width(),
            frame.height(),
            hits.len(),
            faces.len()
        );
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::haar_cascade::fixtures::{
        EDGE_CASCADE_XML, TWO_STAGE_XML,
    };
    use approx::assert_relative_eq;

    fn detector() -> HaarCascadeDetector {
        HaarCascadeDetector::new(HaarCascade::from_xml(EDGE_CASCADE_XML).unwrap())
    }

    fn flat_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(vec![value; (width * height) as usize], width, height, 1)
    }

    /// Black canvas with a white bar at `x0..x1`, `y0..y1`.
    fn bar_frame(width: u32, height: u32, x0: u32, x1: u32, y0: u32, y1: u32) -> Frame {
        let mut data = vec![0u8; (width * height) as usize];
        for y in y0..y1 {
            for x in x0..x1 {
                data[(y * width + x) as usize] = 255;
            }
        }
        Frame::new(data, width, height, 1)
    }

    #[test]
    fn test_first_scale_respects_min_face_size() {
        let scales = detector().scales(100, 100);
        // 24 * 1.1^3 = 31.9 is the first window of at least 30px
        assert_relative_eq!(scales[0], 1.331, epsilon = 1e-9);
    }

    #[test]
    fn test_scales_stop_before_window_outgrows_image() {
        let det = detector();
        for factor in det.scales(100, 80) {
            assert!((24.0 * factor).round() <= 80.0);
        }
    }

    #[test]
    fn test_image_smaller_than_min_face_has_no_scales() {
        assert!(detector().scales(28, 28).is_empty());
    }

    #[test]
    fn test_flat_image_has_no_faces() {
        let faces = detector().detect(&flat_frame(160, 160, 128)).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_tiny_image_has_no_faces() {
        let faces = detector().detect(&flat_frame(20, 20, 0)).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_bright_left_edge_is_detected() {
        let frame = bar_frame(160, 160, 40, 70, 40, 110);
        let faces = detector().detect(&frame).unwrap();
        assert!(!faces.is_empty());
        for face in &faces {
            assert!(face.width >= 30 && face.height >= 30, "{face:?}");
        }
    }

    #[test]
    fn test_color_frame_matches_gray_frame() {
        let gray = bar_frame(160, 160, 40, 70, 40, 110);
        let rgb: Vec<u8> = gray.data().iter().flat_map(|&v| [v, v, v]).collect();
        let color = Frame::new(rgb, 160, 160, 3);

        let mut det = detector();
        assert_eq!(det.detect(&gray).unwrap(), det.detect(&color).unwrap());
    }

    #[test]
    fn test_mirrored_edge_is_not_detected() {
        // Bright bar on the right half only produces dark-left windows.
        let mut data = vec![255u8; 160 * 160];
        for y in 0..160 {
            for x in 0..80 {
                data[y * 160 + x] = 0;
            }
        }
        let faces = detector().detect(&Frame::new(data, 160, 160, 1)).unwrap();
        assert!(faces.is_empty());
    }

    fn two_stage_detector() -> HaarCascadeDetector {
        HaarCascadeDetector::new(HaarCascade::from_xml(TWO_STAGE_XML).unwrap())
    }

    /// 20x20 black canvas with the `x0..x1` by `y0..y1` block set to 255.
    fn block_image(x0: u32, x1: u32, y0: u32, y1: u32) -> GrayImage {
        let frame = bar_frame(20, 20, x0, x1, y0, y1);
        GrayImage::from_raw(20, 20, frame.data().to_vec()).unwrap()
    }

    fn hits_at_unit_scale(det: &HaarCascadeDetector, image: &GrayImage) -> Vec<Region> {
        let mut hits = Vec::new();
        det.scan_scale(image, 1.0, &mut hits);
        hits
    }

    #[test]
    fn test_scan_reaches_last_column_and_row() {
        let xml = EDGE_CASCADE_XML.replace(
            "<stageThreshold>0.</stageThreshold>",
            "<stageThreshold>-5.</stageThreshold>",
        );
        let det = HaarCascadeDetector::new(HaarCascade::from_xml(&xml).unwrap());
        let image = GrayImage::from_pixel(30, 30, image::Luma([128]));

        let hits = hits_at_unit_scale(&det, &image);

        let mut xs: Vec<i32> = hits.iter().map(|r| r.x).collect();
        let mut ys: Vec<i32> = hits.iter().map(|r| r.y).collect();
        xs.sort();
        xs.dedup();
        ys.sort();
        ys.dedup();
        assert_eq!(xs, vec![0, 2, 4, 6]);
        assert_eq!(ys, vec![0, 2, 4, 6]);
        assert_eq!(hits.len(), 16);
    }

    #[test]
    fn test_scales_include_exact_fit() {
        let mut det = detector();
        det.min_size = (0, 0);
        assert_eq!(det.scales(24, 24), vec![1.0]);
    }

    #[test]
    fn test_flat_window_fails_first_stage() {
        // f0 = 0 -> -2, f1 = 0 -> -0.5: sum -2.5 is below -1.5
        let image = GrayImage::from_pixel(20, 20, image::Luma([90]));
        assert!(hits_at_unit_scale(&two_stage_detector(), &image).is_empty());
    }

    #[test]
    fn test_bright_bottom_half_passes_both_stages() {
        // stage 0: f0 = 0 -> -2, f1 = -51000 / 41310 -> +0.5, sum exactly -1.5
        // stage 1: f0 = 0 is not below 0.0 -> leaf 2.0
        let image = block_image(0, 20, 10, 20);
        assert_eq!(
            hits_at_unit_scale(&two_stage_detector(), &image),
            vec![Region::new(0, 0, 20, 20)]
        );
    }

    #[test]
    fn test_bright_bottom_left_block_is_rejected_by_tree() {
        // stage 0: f0 = f1 = -12750 / 25965 (about -0.49) -> -2 + 0.5 passes
        // stage 1: f0 < 0.0 -> node 1, f1 < 3.0 -> leaf 1.0, below 1.5
        let image = block_image(0, 5, 10, 20);
        assert!(hits_at_unit_scale(&two_stage_detector(), &image).is_empty());
    }

    #[test]
    fn test_bright_center_columns_pass_on_first_feature() {
        // stage 0: f0 = 25500 / 37006 (about 0.69) -> +2 regardless of f1
        // stage 1: f0 >= 0.0 -> leaf 2.0
        let image = block_image(5, 10, 0, 20);
        assert_eq!(hits_at_unit_scale(&two_stage_detector(), &image).len(), 1);
    }
}
