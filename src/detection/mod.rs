//! Frame classification for the camera page.
//!
//! Every policy implements [`FaceDetector`] so the request flow can be
//! exercised without a real image pipeline.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, RgbImage};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

use crate::config::DetectionPolicy;

pub mod cascade;

pub use cascade::{Cascade, Region};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid base64 frame: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unreadable image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to read cascade {path}: {source}")]
    CascadeIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid cascade: {0}")]
    Cascade(String),
    #[error("Invalid cascade XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Answers "is there a face in this frame".
pub trait FaceDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// `frame` is a data URL (`data:image/jpeg;base64,...`) or bare base64.
    fn detect(&self, frame: &str) -> Result<bool, DetectionError>;
}

/// Drop a data URL header, keeping only the base64 payload.
pub fn strip_data_url(frame: &str) -> &str {
    match frame.split_once(',') {
        Some((_, data)) => data,
        None => frame,
    }
}

pub fn decode_frame(frame: &str) -> Result<DynamicImage, DetectionError> {
    let bytes = STANDARD.decode(strip_data_url(frame).trim())?;
    Ok(image::load_from_memory(&bytes)?)
}

// ==================== Simulated ====================

/// Reports a face with a fixed probability, ignoring the frame.
pub struct SimulatedDetector {
    probability: f64,
}

impl SimulatedDetector {
    /// `probability` is clamped to `[0, 1]`; `NaN` counts as never.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }
}

impl FaceDetector for SimulatedDetector {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn detect(&self, _frame: &str) -> Result<bool, DetectionError> {
        Ok(rand::thread_rng().gen_bool(self.probability))
    }
}

// ==================== Cascade ====================

pub struct CascadeDetector {
    cascade: Cascade,
    scale_factor: f64,
    min_neighbors: usize,
}

impl CascadeDetector {
    pub fn new(cascade: Cascade, scale_factor: f64, min_neighbors: usize) -> Result<Self, DetectionError> {
        if !(scale_factor > 1.0) {
            return Err(DetectionError::Cascade(format!(
                "scale factor must be greater than 1, got {}",
                scale_factor
            )));
        }
        Ok(Self {
            cascade,
            scale_factor,
            min_neighbors,
        })
    }

    pub fn regions(&self, image: &DynamicImage) -> Vec<Region> {
        self.cascade
            .detect_multi_scale(&image.to_luma8(), self.scale_factor, self.min_neighbors)
    }
}

impl FaceDetector for CascadeDetector {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detect(&self, frame: &str) -> Result<bool, DetectionError> {
        let image = decode_frame(frame)?;
        Ok(!self.regions(&image).is_empty())
    }
}

// ==================== Skin Tone ====================

/// Treats a frame as containing a face when enough pixels look like skin.
pub struct SkinToneDetector {
    threshold_percent: f64,
}

impl SkinToneDetector {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }
}

fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && max - min > 15 && (r - g).abs() > 15 && r > g && r > b
}

/// Percentage of pixels in `image` that pass the skin colour rule.
pub fn skin_percentage(image: &RgbImage) -> f64 {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let skin = image
        .pixels()
        .filter(|p| is_skin(p[0], p[1], p[2]))
        .count();
    skin as f64 * 100.0 / total as f64
}

impl FaceDetector for SkinToneDetector {
    fn name(&self) -> &'static str {
        "skin"
    }

    fn detect(&self, frame: &str) -> Result<bool, DetectionError> {
        let image = decode_frame(frame)?;
        Ok(skin_percentage(&image.to_rgb8()) > self.threshold_percent)
    }
}

/// Build the detector selected by configuration.
pub fn build(policy: &DetectionPolicy) -> Result<Arc<dyn FaceDetector>, DetectionError> {
    let detector: Arc<dyn FaceDetector> = match policy {
        DetectionPolicy::Simulated { probability } => Arc::new(SimulatedDetector::new(*probability)),
        DetectionPolicy::Cascade {
            path,
            scale_factor,
            min_neighbors,
        } => Arc::new(CascadeDetector::new(
            Cascade::load(path)?,
            *scale_factor,
            *min_neighbors,
        )?),
        DetectionPolicy::SkinTone { threshold_percent } => {
            Arc::new(SkinToneDetector::new(*threshold_percent))
        }
    };
    Ok(detector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn data_url(image: RgbImage) -> String {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(buf))
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
    }

    #[test]
    fn test_simulated_extremes() {
        let always = SimulatedDetector::new(1.0);
        let never = SimulatedDetector::new(0.0);
        for _ in 0..20 {
            assert!(always.detect("ignored").unwrap());
            assert!(!never.detect("ignored").unwrap());
        }
        // Out-of-range probabilities are clamped instead of panicking
        assert!(SimulatedDetector::new(3.0).detect("").unwrap());
        assert!(SimulatedDetector::new(f64::INFINITY).detect("").unwrap());
        assert!(!SimulatedDetector::new(f64::NAN).detect("").unwrap());
    }

    #[test]
    fn test_skin_tone_policy() {
        let detector = SkinToneDetector::new(2.0);

        let skin = RgbImage::from_pixel(32, 32, Rgb([200, 140, 110]));
        assert!(detector.detect(&data_url(skin)).unwrap());

        let blue = RgbImage::from_pixel(32, 32, Rgb([20, 40, 200]));
        assert!(!detector.detect(&data_url(blue)).unwrap());
    }

    #[test]
    fn test_decode_failures() {
        let detector = SkinToneDetector::new(2.0);
        assert!(matches!(
            detector.detect("data:image/png;base64,@@@"),
            Err(DetectionError::Base64(_))
        ));
        // Valid base64, not an image
        assert!(matches!(
            detector.detect(&STANDARD.encode(b"hello")),
            Err(DetectionError::Image(_))
        ));
    }

    #[test]
    fn test_cascade_detector_on_frame() {
        let cascade = Cascade::from_xml(cascade::tests::BRIGHT_TOP_CASCADE).unwrap();
        let detector = CascadeDetector::new(cascade, 1.1, 4).unwrap();

        let split = RgbImage::from_fn(96, 96, |_, y| if y < 48 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) });
        assert!(detector.detect(&data_url(split)).unwrap());

        let flat = RgbImage::from_pixel(96, 96, Rgb([90, 90, 90]));
        assert!(!detector.detect(&data_url(flat)).unwrap());
    }

    #[test]
    fn test_cascade_detector_rejects_bad_scale() {
        let cascade = Cascade::from_xml(cascade::tests::BRIGHT_TOP_CASCADE).unwrap();
        assert!(CascadeDetector::new(cascade, 1.0, 4).is_err());
    }

    #[test]
    fn test_build_missing_cascade_file() {
        let policy = DetectionPolicy::Cascade {
            path: "/nonexistent/cascade.xml".into(),
            scale_factor: 1.1,
            min_neighbors: 4,
        };
        assert!(matches!(build(&policy), Err(DetectionError::CascadeIo { .. })));
        assert_eq!(build(&DetectionPolicy::SkinTone { threshold_percent: 2.0 }).unwrap().name(), "skin");
    }
}
