//! Haar cascade evaluation over OpenCV's XML cascade format.
//!
//! Supports the `BOOST` / `HAAR` cascades shipped with OpenCV
//! (e.g. `haarcascade_frontalface_default.xml`): stump or tree weak
//! classifiers over upright rectangle features. Tilted features are
//! rejected at load time.

use image::GrayImage;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

use super::DetectionError;

/// Similarity tolerance used when grouping raw detections.
const GROUP_EPS: f64 = 0.2;

/// A detected region in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f64,
}

#[derive(Debug, Clone)]
struct Feature {
    rects: Vec<WeightedRect>,
}

#[derive(Debug, Clone)]
struct SplitNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct WeakClassifier {
    nodes: Vec<SplitNode>,
    leaves: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// A boosted cascade of Haar-feature classifiers.
#[derive(Debug, Clone)]
pub struct Cascade {
    width: u32,
    height: u32,
    stages: Vec<Stage>,
    features: Vec<Feature>,
}

impl Cascade {
    pub fn load(path: &Path) -> Result<Self, DetectionError> {
        let xml = std::fs::read_to_string(path).map_err(|source| DetectionError::CascadeIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_xml(&xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self, DetectionError> {
        let root = XmlNode::parse(xml)?;
        let cascade = root
            .child("opencv_storage")
            .and_then(|n| n.child("cascade"))
            .ok_or_else(|| invalid("missing <opencv_storage><cascade>"))?;

        if let Some(kind) = cascade.child("featureType") {
            if kind.text.trim() != "HAAR" {
                return Err(invalid(format!("unsupported feature type {}", kind.text.trim())));
            }
        }

        let width: u32 = cascade.required("width")?.scalar()?;
        let height: u32 = cascade.required("height")?.scalar()?;
        if width == 0 || height == 0 {
            return Err(invalid("window size must be positive"));
        }

        let features = cascade
            .required("features")?
            .items()
            .map(parse_feature)
            .collect::<Result<Vec<_>, _>>()?;

        let stages = cascade
            .required("stages")?
            .items()
            .map(|stage| parse_stage(stage, features.len()))
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(invalid("cascade has no stages"));
        }
        for feature in &features {
            for r in &feature.rects {
                if r.x + r.width > width || r.y + r.height > height {
                    return Err(invalid("feature rectangle outside detection window"));
                }
            }
        }

        Ok(Self {
            width,
            height,
            stages,
            features,
        })
    }

    pub fn window(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Slide the detection window over `image` at growing scales and group
    /// the hits. A cluster survives when it holds more than `min_neighbors`
    /// raw detections; with `min_neighbors == 0` raw hits are returned.
    pub fn detect_multi_scale(
        &self,
        image: &GrayImage,
        scale_factor: f64,
        min_neighbors: usize,
    ) -> Vec<Region> {
        let (img_w, img_h) = (image.width() as usize, image.height() as usize);
        let integral = Integral::new(image);
        let scale_factor = scale_factor.max(1.01);

        let mut hits = Vec::new();
        let mut scale = 1.0f64;
        loop {
            let win_w = (self.width as f64 * scale).round() as usize;
            let win_h = (self.height as f64 * scale).round() as usize;
            if win_w > img_w || win_h > img_h {
                break;
            }

            let step = ((if scale > 2.0 { 1.0 } else { 2.0 }) * scale).round().max(1.0) as usize;
            let features = self.scaled_features(scale, win_w, win_h);
            let inv_area = 1.0 / (win_w * win_h) as f64;

            for y in (0..=img_h - win_h).step_by(step) {
                for x in (0..=img_w - win_w).step_by(step) {
                    if self.passes(&integral, &features, x, y, win_w, win_h, inv_area) {
                        hits.push(Region {
                            x: x as u32,
                            y: y as u32,
                            width: win_w as u32,
                            height: win_h as u32,
                        });
                    }
                }
            }

            scale *= scale_factor;
        }

        group_regions(hits, min_neighbors, GROUP_EPS)
    }

    /// Features resized to the current window, with the first rectangle's
    /// weight adjusted so every feature stays zero-sum after rounding.
    fn scaled_features(&self, scale: f64, win_w: usize, win_h: usize) -> Vec<Feature> {
        self.features
            .iter()
            .map(|feature| {
                let mut rects: Vec<WeightedRect> = feature
                    .rects
                    .iter()
                    .map(|r| {
                        let x = ((r.x as f64 * scale).round() as usize).min(win_w - 1);
                        let y = ((r.y as f64 * scale).round() as usize).min(win_h - 1);
                        let w = ((r.width as f64 * scale).round() as usize).clamp(1, win_w - x);
                        let h = ((r.height as f64 * scale).round() as usize).clamp(1, win_h - y);
                        WeightedRect {
                            x: x as u32,
                            y: y as u32,
                            width: w as u32,
                            height: h as u32,
                            weight: r.weight,
                        }
                    })
                    .collect();

                if rects.len() > 1 {
                    let area0 = (rects[0].width * rects[0].height) as f64;
                    let rest: f64 = rects[1..]
                        .iter()
                        .map(|r| r.weight * (r.width * r.height) as f64)
                        .sum();
                    rects[0].weight = -rest / area0;
                }
                Feature { rects }
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn passes(
        &self,
        integral: &Integral,
        features: &[Feature],
        x: usize,
        y: usize,
        win_w: usize,
        win_h: usize,
        inv_area: f64,
    ) -> bool {
        let mean = integral.sum(x, y, win_w, win_h) * inv_area;
        let sq_mean = integral.sq_sum(x, y, win_w, win_h) * inv_area;
        let variance = sq_mean - mean * mean;
        let std_dev = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        let feature_value = |index: usize| -> f64 {
            features[index]
                .rects
                .iter()
                .map(|r| {
                    r.weight
                        * integral.sum(
                            x + r.x as usize,
                            y + r.y as usize,
                            r.width as usize,
                            r.height as usize,
                        )
                })
                .sum::<f64>()
                * inv_area
        };

        self.stages.iter().all(|stage| {
            let total: f64 = stage
                .classifiers
                .iter()
                .map(|weak| {
                    let mut index = 0usize;
                    loop {
                        let node = &weak.nodes[index];
                        let next = if feature_value(node.feature) < node.threshold * std_dev {
                            node.left
                        } else {
                            node.right
                        };
                        if next <= 0 {
                            break weak.leaves[(-next) as usize];
                        }
                        index = next as usize;
                    }
                })
                .sum();
            total >= stage.threshold
        })
    }
}

fn invalid(message: impl Into<String>) -> DetectionError {
    DetectionError::Cascade(message.into())
}

fn parse_feature(node: &XmlNode) -> Result<Feature, DetectionError> {
    if let Some(tilted) = node.child("tilted") {
        if tilted.text.trim() != "0" {
            return Err(invalid("tilted features are not supported"));
        }
    }

    let rects = node
        .required("rects")?
        .items()
        .map(|r| {
            let v: Vec<f64> = r.numbers()?;
            if v.len() != 5 || v[..4].iter().any(|n| *n < 0.0) {
                return Err(invalid(format!("bad feature rectangle '{}'", r.text.trim())));
            }
            Ok(WeightedRect {
                x: v[0] as u32,
                y: v[1] as u32,
                width: v[2] as u32,
                height: v[3] as u32,
                weight: v[4],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if rects.is_empty() || rects.iter().any(|r| r.width == 0 || r.height == 0) {
        return Err(invalid("feature without usable rectangles"));
    }
    Ok(Feature { rects })
}

fn parse_stage(node: &XmlNode, feature_count: usize) -> Result<Stage, DetectionError> {
    let threshold: f64 = node.required("stageThreshold")?.scalar()?;

    let classifiers = node
        .required("weakClassifiers")?
        .items()
        .map(|weak| {
            let raw: Vec<f64> = weak.required("internalNodes")?.numbers()?;
            let leaves: Vec<f64> = weak.required("leafValues")?.numbers()?;
            if raw.is_empty() || raw.len() % 4 != 0 {
                return Err(invalid("internalNodes must hold groups of four values"));
            }

            let nodes: Vec<SplitNode> = raw
                .chunks(4)
                .map(|c| SplitNode {
                    left: c[0] as i32,
                    right: c[1] as i32,
                    feature: c[2] as usize,
                    threshold: c[3],
                })
                .collect();

            // Children must point forward or at a leaf so evaluation terminates
            for (i, n) in nodes.iter().enumerate() {
                if n.feature >= feature_count {
                    return Err(invalid(format!("feature index {} out of range", n.feature)));
                }
                for child in [n.left, n.right] {
                    let ok = if child <= 0 {
                        ((-child) as usize) < leaves.len()
                    } else {
                        (child as usize) > i && (child as usize) < nodes.len()
                    };
                    if !ok {
                        return Err(invalid(format!("bad child reference {}", child)));
                    }
                }
            }

            Ok(WeakClassifier { nodes, leaves })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stage {
        threshold,
        classifiers,
    })
}

// ==================== Grouping ====================

fn similar(a: &Region, b: &Region, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Cluster similar regions, average each cluster and keep clusters with
/// more than `min_neighbors` members that are not nested inside a
/// stronger cluster.
pub fn group_regions(regions: Vec<Region>, min_neighbors: usize, eps: f64) -> Vec<Region> {
    if min_neighbors == 0 || regions.is_empty() {
        return regions;
    }

    let mut parent: Vec<usize> = (0..regions.len()).collect();
    for i in 0..regions.len() {
        for j in (i + 1)..regions.len() {
            if similar(&regions[i], &regions[j], eps) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut totals: std::collections::BTreeMap<usize, ([f64; 4], usize)> = Default::default();
    for (i, r) in regions.iter().enumerate() {
        let root = find(&mut parent, i);
        let entry = totals.entry(root).or_insert(([0.0; 4], 0));
        entry.0[0] += r.x as f64;
        entry.0[1] += r.y as f64;
        entry.0[2] += r.width as f64;
        entry.0[3] += r.height as f64;
        entry.1 += 1;
    }

    let clusters: Vec<(Region, usize)> = totals
        .into_values()
        .filter(|(_, count)| *count > min_neighbors)
        .map(|(sum, count)| {
            let n = count as f64;
            let region = Region {
                x: (sum[0] / n).round() as u32,
                y: (sum[1] / n).round() as u32,
                width: (sum[2] / n).round() as u32,
                height: (sum[3] / n).round() as u32,
            };
            (region, count)
        })
        .collect();

    clusters
        .iter()
        .enumerate()
        .filter(|(i, (r1, n1))| {
            !clusters.iter().enumerate().any(|(j, (r2, n2))| {
                if *i == j {
                    return false;
                }
                let dx = (r2.width as f64 * eps).round();
                let dy = (r2.height as f64 * eps).round();
                let inside = r1.x as f64 >= r2.x as f64 - dx
                    && r1.y as f64 >= r2.y as f64 - dy
                    && (r1.x + r1.width) as f64 <= (r2.x + r2.width) as f64 + dx
                    && (r1.y + r1.height) as f64 <= (r2.y + r2.height) as f64 + dy;
                inside && (*n2 > (*n1).max(3) || *n1 < 3)
            })
        })
        .map(|(_, (r, _))| *r)
        .collect()
}

// ==================== Integral Image ====================

struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq = vec![0.0; stride * (h + 1)];

        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32)[0] as f64;
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
            }
        }

        Self { stride, sum, sq }
    }

    fn rect(&self, table: &[f64], x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        table[(y + h) * s + x + w] - table[y * s + x + w] - table[(y + h) * s + x] + table[y * s + x]
    }

    fn sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        self.rect(&self.sum, x, y, w, h)
    }

    fn sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        self.rect(&self.sq, x, y, w, h)
    }
}

// ==================== XML ====================

/// Minimal element tree; attributes are not needed for cascade files.
#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Default::default()
        }
    }

    fn parse(xml: &str) -> Result<Self, DetectionError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack = vec![XmlNode::default()];
        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(XmlNode::named(e.name().as_ref())),
                Event::Empty(e) => {
                    let node = XmlNode::named(e.name().as_ref());
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                }
                Event::Text(t) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&t.unescape()?);
                    }
                }
                Event::End(_) => {
                    if stack.len() < 2 {
                        return Err(invalid("unbalanced XML"));
                    }
                    if let (Some(node), Some(parent)) = (stack.pop(), stack.last_mut()) {
                        parent.children.push(node);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(invalid("unterminated XML element")),
        }
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn required(&self, name: &str) -> Result<&XmlNode, DetectionError> {
        self.child(name)
            .ok_or_else(|| invalid(format!("<{}> missing <{}>", self.name, name)))
    }

    /// OpenCV stores sequences as repeated `<_>` elements.
    fn items(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter(|c| c.name == "_")
    }

    fn numbers<T: std::str::FromStr>(&self) -> Result<Vec<T>, DetectionError> {
        self.text
            .split_whitespace()
            .map(|tok| {
                tok.parse()
                    .map_err(|_| invalid(format!("<{}>: '{}' is not a number", self.name, tok)))
            })
            .collect()
    }

    fn scalar<T: std::str::FromStr>(&self) -> Result<T, DetectionError> {
        let mut values = self.numbers::<T>()?;
        match values.len() {
            1 => Ok(values.remove(0)),
            _ => Err(invalid(format!("<{}> should hold one number", self.name))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Luma;

    /// One-stage cascade whose single stump fires when the upper half of the
    /// window is clearly brighter than the lower half.
    pub(crate) const BRIGHT_TOP_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 5.0000000000000000e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 24 24 -1.</_>
        <_>
          0 0 24 12 2.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    /// Opening of `haarcascade_frontalface_default.xml` cut down to three
    /// stages and three features, keeping OpenCV's headers and layout.
    const FRONTALFACE_EXCERPT: &str = r#"<?xml version="1.0"?>
<!--
    Stump-based 24x24 discrete(?) adaboost frontal face detector.
    Created by Rainer Lienhart.
-->
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageParams>
    <maxWeakCount>211</maxWeakCount></stageParams>
  <featureParams>
    <maxCatCount>0</maxCatCount></featureParams>
  <stageNum>3</stageNum>
  <stages>
    <_>
      <maxWeakCount>3</maxWeakCount>
      <stageThreshold>-5.0425500869750977e+00</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 -3.1511999666690826e-02</internalNodes>
          <leafValues>
            2.0875380039215088e+00 -2.2172100543975830e+00</leafValues></_>
        <_>
          <internalNodes>
            0 -1 1 1.2396000325679779e-02</internalNodes>
          <leafValues>
            -1.8633940219879150e+00 1.3272049427032471e+00</leafValues></_>
        <_>
          <internalNodes>
            0 -1 2 2.1927999332547188e-02</internalNodes>
          <leafValues>
            -1.5105249881744385e+00 1.0625729560852051e+00</leafValues></_></weakClassifiers></_>
    <!-- stage 1 -->
    <_>
      <maxWeakCount>2</maxWeakCount>
      <stageThreshold>-3.2372770309448242e+00</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 1 1.1749999597668648e-02</internalNodes>
          <leafValues>
            -1.6519439220428467e+00 1.2566410303115845e+00</leafValues></_>
        <_>
          <internalNodes>
            0 -1 2 -1.9412999227643013e-02</internalNodes>
          <leafValues>
            9.2536401748657227e-01 -1.3546690940856934e+00</leafValues></_></weakClassifiers></_>
    <!-- stage 2 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>-3.5466389656066895e+00</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 2.1240000799298286e-02</internalNodes>
          <leafValues>
            -1.1864809989929199e+00 1.2413059473037720e+00</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          6 4 12 9 -1.</_>
        <_>
          6 7 12 3 3.</_></rects></_>
    <_>
      <rects>
        <_>
          6 4 12 7 -1.</_>
        <_>
          10 4 4 7 3.</_></rects></_>
    <_>
      <rects>
        <_>
          3 9 18 9 -1.</_>
        <_>
          3 12 18 3 3.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    fn half_bright(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |_, y| if y < size / 2 { Luma([255]) } else { Luma([0]) })
    }

    #[test]
    fn test_parse_cascade() {
        let cascade = Cascade::from_xml(BRIGHT_TOP_CASCADE).unwrap();
        assert_eq!(cascade.window(), (24, 24));
        assert_eq!(cascade.stages.len(), 1);
        assert_eq!(cascade.features[0].rects.len(), 2);
    }

    #[test]
    fn test_parse_opencv_frontalface_layout() {
        let cascade = Cascade::from_xml(FRONTALFACE_EXCERPT).unwrap();
        assert_eq!(cascade.window(), (24, 24));
        assert_eq!(cascade.stages.len(), 3);
        assert_eq!(cascade.features.len(), 3);

        let sizes: Vec<usize> = cascade.stages.iter().map(|s| s.classifiers.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
        assert!((cascade.stages[0].threshold + 5.04255).abs() < 1e-4);

        let stump = &cascade.stages[0].classifiers[0];
        assert_eq!(stump.nodes.len(), 1);
        assert_eq!((stump.nodes[0].left, stump.nodes[0].right, stump.nodes[0].feature), (0, -1, 0));
        assert!((stump.nodes[0].threshold + 0.031512).abs() < 1e-5);
        assert_eq!(stump.leaves.len(), 2);

        let rects = &cascade.features[2].rects;
        assert_eq!((rects[1].x, rects[1].y, rects[1].width, rects[1].height), (3, 12, 18, 3));
        assert_eq!(rects[1].weight, 3.0);

        // Every stump votes "no face" on a featureless frame, which stays below stage 0
        let flat = GrayImage::from_pixel(48, 48, Luma([128]));
        assert!(cascade.detect_multi_scale(&flat, 1.1, 0).is_empty());
    }

    #[test]
    fn test_detects_matching_pattern() {
        let cascade = Cascade::from_xml(BRIGHT_TOP_CASCADE).unwrap();
        let regions = cascade.detect_multi_scale(&half_bright(96), 1.1, 4);
        assert!(!regions.is_empty());
    }

    #[test]
    fn test_flat_image_has_no_detections() {
        let cascade = Cascade::from_xml(BRIGHT_TOP_CASCADE).unwrap();
        let flat = GrayImage::from_pixel(96, 96, Luma([128]));
        assert!(cascade.detect_multi_scale(&flat, 1.1, 0).is_empty());
    }

    #[test]
    fn test_image_smaller_than_window() {
        let cascade = Cascade::from_xml(BRIGHT_TOP_CASCADE).unwrap();
        assert!(cascade.detect_multi_scale(&half_bright(16), 1.1, 0).is_empty());
    }

    #[test]
    fn test_rejects_bad_cascades() {
        assert!(Cascade::from_xml("<opencv_storage></opencv_storage>").is_err());

        let tilted = BRIGHT_TOP_CASCADE.replace("</rects></_></features>", "</rects><tilted>1</tilted></_></features>");
        assert!(Cascade::from_xml(&tilted).is_err());

        let out_of_range = BRIGHT_TOP_CASCADE.replace("0 -1 0 5.0", "0 -1 7 5.0");
        assert!(Cascade::from_xml(&out_of_range).is_err());
    }

    #[test]
    fn test_group_regions_requires_neighbors() {
        let r = |x, y| Region {
            x,
            y,
            width: 40,
            height: 40,
        };
        let raw = vec![r(10, 10), r(12, 11), r(11, 12), r(200, 200)];

        let grouped = group_regions(raw.clone(), 2, GROUP_EPS);
        assert_eq!(grouped, vec![r(11, 11)]);

        assert!(group_regions(raw.clone(), 3, GROUP_EPS).is_empty());
        assert_eq!(group_regions(raw, 0, GROUP_EPS).len(), 4);
    }
}
