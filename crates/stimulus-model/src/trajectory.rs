//! Dot trajectories and the cloth that groups them.
//!
//! Input arrives as an ordered collection of `(dot, frame, x, y)` tuples,
//! either as CSV (`dot,frame,x,y` header, `#` comments allowed) or as a JSON
//! array of objects. Every dot must cover the same contiguous frame range.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use clothstim_common::error::{StimulusError, StimulusResult};

use crate::geometry::{bounding_box, BoundingBox, Point2D};

/// Dot identifier as it appears in the input data.
pub type DotId = u32;

/// One input tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DotSample {
    pub dot: DotId,
    pub frame: u32,
    pub x: f64,
    pub y: f64,
}

impl DotSample {
    pub fn new(dot: DotId, frame: u32, x: f64, y: f64) -> Self {
        Self { dot, frame, x, y }
    }
}

/// Positions of a single dot, indexed by frame offset.
#[derive(Debug, Clone, PartialEq)]
pub struct DotTrajectory {
    pub id: DotId,
    positions: Vec<Point2D>,
}

impl DotTrajectory {
    pub fn new(id: DotId, positions: Vec<Point2D>) -> Self {
        Self { id, positions }
    }

    /// Position at frame offset `frame`.
    pub fn position(&self, frame: usize) -> Option<Point2D> {
        self.positions.get(frame).copied()
    }

    pub fn positions(&self) -> &[Point2D] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        for p in &mut self.positions {
            *p = p.offset(dx, dy);
        }
    }
}

/// A set of dot trajectories sharing one frame range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cloth {
    trajectories: Vec<DotTrajectory>,
    /// Data frame number of offset 0.
    first_frame: u32,
    frame_count: usize,
}

impl Cloth {
    /// Build a cloth from trajectories that all have the same length.
    pub fn new(trajectories: Vec<DotTrajectory>, first_frame: u32) -> StimulusResult<Self> {
        let frame_count = trajectories.first().map(DotTrajectory::len).unwrap_or(0);
        if let Some(bad) = trajectories.iter().find(|t| t.len() != frame_count) {
            return Err(StimulusError::data(format!(
                "dot {} has {} frames, expected {}",
                bad.id,
                bad.len(),
                frame_count
            )));
        }

        Ok(Self {
            trajectories,
            first_frame,
            frame_count,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a cloth from raw samples.
    ///
    /// Dots keep the order of their first appearance in `samples`.
    pub fn from_samples(samples: &[DotSample]) -> StimulusResult<Self> {
        let Some(first_frame) = samples.iter().map(|s| s.frame).min() else {
            return Ok(Self::empty());
        };
        let last_frame = samples.iter().map(|s| s.frame).max().unwrap_or(first_frame);
        let frame_count = (last_frame - first_frame) as usize + 1;

        let mut order: Vec<DotId> = Vec::new();
        let mut by_dot: HashMap<DotId, BTreeMap<u32, Point2D>> = HashMap::new();

        for sample in samples {
            if !sample.x.is_finite() || !sample.y.is_finite() {
                return Err(StimulusError::data(format!(
                    "dot {} frame {} has a non-finite position",
                    sample.dot, sample.frame
                )));
            }

            let frames = by_dot.entry(sample.dot).or_insert_with(|| {
                order.push(sample.dot);
                BTreeMap::new()
            });
            if frames
                .insert(sample.frame, Point2D::new(sample.x, sample.y))
                .is_some()
            {
                return Err(StimulusError::data(format!(
                    "duplicate sample for dot {} frame {}",
                    sample.dot, sample.frame
                )));
            }
        }

        let mut trajectories = Vec::with_capacity(order.len());
        for id in order {
            let frames = by_dot.remove(&id).unwrap_or_default();
            // Keys are sorted, so the first key off the expected run marks the gap.
            let mut expected = first_frame as u64;
            for &frame in frames.keys() {
                if frame as u64 != expected {
                    break;
                }
                expected += 1;
            }
            if expected <= last_frame as u64 {
                return Err(StimulusError::data(format!(
                    "dot {id} is missing frame {expected}"
                )));
            }
            trajectories.push(DotTrajectory::new(id, frames.into_values().collect()));
        }

        tracing::debug!(
            dots = trajectories.len(),
            frames = frame_count,
            first_frame,
            "Assembled cloth from samples"
        );

        Self::new(trajectories, first_frame)
    }

    pub fn trajectories(&self) -> &[DotTrajectory] {
        &self.trajectories
    }

    pub fn get(&self, id: DotId) -> Option<&DotTrajectory> {
        self.trajectories.iter().find(|t| t.id == id)
    }

    /// Number of dots.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Number of frames each dot covers. Zero for an empty cloth.
    pub fn frame_count(&self) -> usize {
        if self.trajectories.is_empty() {
            0
        } else {
            self.frame_count
        }
    }

    pub fn first_frame(&self) -> u32 {
        self.first_frame
    }

    /// Data frame number for a frame offset.
    pub fn frame_number(&self, offset: usize) -> u32 {
        self.first_frame + offset as u32
    }

    /// All dot positions at frame offset `frame`, in dot order.
    pub fn positions_at(&self, frame: usize) -> Vec<Point2D> {
        self.trajectories
            .iter()
            .filter_map(|t| t.position(frame))
            .collect()
    }

    pub fn bounds_at(&self, frame: usize) -> Option<BoundingBox> {
        bounding_box(&self.positions_at(frame))
    }

    pub fn center_at(&self, frame: usize) -> Option<Point2D> {
        self.bounds_at(frame).map(|b| b.center())
    }

    /// A new cloth holding the given dots, in the given order.
    /// Unknown ids are skipped.
    pub fn select(&self, ids: &[DotId]) -> Cloth {
        let trajectories = ids
            .iter()
            .filter_map(|id| self.get(*id).cloned())
            .collect();
        Cloth {
            trajectories,
            first_frame: self.first_frame,
            frame_count: self.frame_count,
        }
    }

    /// Translate every position of every dot.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for t in &mut self.trajectories {
            t.translate(dx, dy);
        }
    }
}

/// Column names of the optional CSV header row.
const CSV_COLUMNS: [&str; 4] = ["dot", "frame", "x", "y"];

/// Parse CSV samples with columns `dot,frame,x,y`.
///
/// A leading `dot,frame,x,y` header is optional and matched case-insensitively.
/// Blank lines and `#` comments are skipped.
pub fn parse_samples_csv(content: &str) -> StimulusResult<Vec<DotSample>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut samples = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| StimulusError::data(format!("invalid CSV: {e}")))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if index == 0 && is_header(&record) {
            continue;
        }
        if record.len() != CSV_COLUMNS.len() {
            return Err(StimulusError::data(format!(
                "line {line}: expected 4 fields (dot,frame,x,y), found {}",
                record.len()
            )));
        }

        let sample: DotSample = record
            .deserialize(None)
            .map_err(|e| StimulusError::data(format!("line {line}: {e}")))?;
        samples.push(sample);
    }

    Ok(samples)
}

fn is_header(record: &csv::StringRecord) -> bool {
    record.len() == CSV_COLUMNS.len()
        && record
            .iter()
            .zip(CSV_COLUMNS)
            .all(|(field, column)| field.eq_ignore_ascii_case(column))
}

/// Parse a JSON array of `{ "dot", "frame", "x", "y" }` objects.
pub fn parse_samples_json(content: &str) -> StimulusResult<Vec<DotSample>> {
    serde_json::from_str(content)
        .map_err(|e| StimulusError::data(format!("invalid trajectory JSON: {e}")))
}

/// Load samples from disk, choosing the parser by file extension
/// (`.json` for JSON, anything else for CSV).
pub fn load_samples(path: &Path) -> StimulusResult<Vec<DotSample>> {
    if !path.exists() {
        return Err(StimulusError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_samples_json(&content)
    } else {
        parse_samples_csv(&content)
    }
}

/// Load and assemble a cloth from a trajectory file.
pub fn load_cloth(path: &Path) -> StimulusResult<Cloth> {
    let samples = load_samples(path)?;
    Cloth::from_samples(&samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_dots_three_frames() -> Vec<DotSample> {
        vec![
            DotSample::new(7, 1, 0.0, 0.0),
            DotSample::new(3, 1, 10.0, 0.0),
            DotSample::new(7, 2, 1.0, 0.0),
            DotSample::new(3, 2, 11.0, 0.0),
            DotSample::new(7, 3, 2.0, 0.0),
            DotSample::new(3, 3, 12.0, 0.0),
        ]
    }

    #[test]
    fn test_from_samples_keeps_first_appearance_order() {
        let cloth = Cloth::from_samples(&two_dots_three_frames()).unwrap();
        assert_eq!(cloth.len(), 2);
        assert_eq!(cloth.frame_count(), 3);
        assert_eq!(cloth.first_frame(), 1);
        assert_eq!(cloth.trajectories()[0].id, 7);
        assert_eq!(cloth.trajectories()[1].id, 3);
        assert_eq!(cloth.frame_number(2), 3);
        assert_eq!(cloth.get(3).unwrap().position(1), Some(Point2D::new(11.0, 0.0)));
    }

    #[test]
    fn test_from_samples_rejects_missing_frame() {
        let mut samples = two_dots_three_frames();
        samples.remove(3); // dot 3, frame 2
        let err = Cloth::from_samples(&samples).unwrap_err();
        assert!(matches!(err, StimulusError::Data { .. }));
        assert!(err.to_string().contains("dot 3 is missing frame 2"));
    }

    #[test]
    fn test_from_samples_rejects_duplicate() {
        let mut samples = two_dots_three_frames();
        samples.push(DotSample::new(7, 2, 5.0, 5.0));
        let err = Cloth::from_samples(&samples).unwrap_err();
        assert!(err.to_string().contains("duplicate sample"));
    }

    #[test]
    fn test_from_samples_rejects_gap_in_frames() {
        let samples = vec![DotSample::new(1, 0, 0.0, 0.0), DotSample::new(1, 2, 0.0, 0.0)];
        assert!(Cloth::from_samples(&samples).is_err());
    }

    #[test]
    fn test_from_samples_rejects_far_apart_frames() {
        let samples = vec![
            DotSample::new(1, 0, 0.0, 0.0),
            DotSample::new(1, u32::MAX, 0.0, 0.0),
        ];
        let err = Cloth::from_samples(&samples).unwrap_err();
        assert!(matches!(err, StimulusError::Data { .. }));
        assert!(err.to_string().contains("dot 1 is missing frame 1"));
    }

    #[test]
    fn test_from_samples_reports_missing_last_frame() {
        let samples = vec![
            DotSample::new(1, 0, 0.0, 0.0),
            DotSample::new(1, 1, 0.0, 0.0),
            DotSample::new(2, 0, 0.0, 0.0),
        ];
        let err = Cloth::from_samples(&samples).unwrap_err();
        assert!(err.to_string().contains("dot 2 is missing frame 1"));
    }

    #[test]
    fn test_empty_samples_yield_empty_cloth() {
        let cloth = Cloth::from_samples(&[]).unwrap();
        assert!(cloth.is_empty());
        assert_eq!(cloth.frame_count(), 0);
        assert!(cloth.bounds_at(0).is_none());
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let err = Cloth::new(
            vec![
                DotTrajectory::new(1, vec![Point2D::ORIGIN; 2]),
                DotTrajectory::new(2, vec![Point2D::ORIGIN; 3]),
            ],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, StimulusError::Data { .. }));
    }

    #[test]
    fn test_parse_csv_with_header_and_comments() {
        let csv = "# exported cloth\ndot,frame,x,y\n1,0,0.5,1.5\n\n2,0,3,4\n";
        let samples = parse_samples_csv(csv).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1], DotSample::new(2, 0, 3.0, 4.0));
    }

    #[test]
    fn test_parse_csv_reports_line_number() {
        let csv = "dot,frame,x,y\n1,0,0.5\n";
        let err = parse_samples_csv(csv).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_csv_without_header_and_with_uppercase_header() {
        let bare = parse_samples_csv("1,0,0.5,1.5\n").unwrap();
        assert_eq!(bare, vec![DotSample::new(1, 0, 0.5, 1.5)]);

        let upper = parse_samples_csv("DOT, Frame, X, Y\n1,0,0.5,1.5\n").unwrap();
        assert_eq!(upper, bare);
    }

    #[test]
    fn test_parse_csv_rejects_malformed_first_row() {
        for input in ["a,0,1,2\n1,1,1,2\n", "1x,0,1,2\n"] {
            let err = parse_samples_csv(input).unwrap_err();
            assert!(matches!(err, StimulusError::Data { .. }), "{input:?}");
            assert!(err.to_string().contains("line 1"), "{err}");
        }
    }

    #[test]
    fn test_parse_csv_accepts_quoted_fields() {
        let samples = parse_samples_csv("dot,frame,x,y\n\"4\",\"2\",\"1.0\",\"-3.5\"\n").unwrap();
        assert_eq!(samples, vec![DotSample::new(4, 2, 1.0, -3.5)]);
    }

    #[test]
    fn test_parse_json_samples() {
        let json = r#"[{"dot":1,"frame":0,"x":1.0,"y":2.0},{"dot":1,"frame":1,"x":1.5,"y":2.5}]"#;
        let samples = parse_samples_json(json).unwrap();
        let cloth = Cloth::from_samples(&samples).unwrap();
        assert_eq!(cloth.frame_count(), 2);
    }

    #[test]
    fn test_select_preserves_requested_order() {
        let cloth = Cloth::from_samples(&two_dots_three_frames()).unwrap();
        let picked = cloth.select(&[3, 99, 7]);
        let ids: Vec<DotId> = picked.trajectories().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(picked.frame_count(), 3);
    }
}
