use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TransitError;
use crate::frame::{Frame, FrameInfo};
use crate::pipeline::PipelineStage;

/// A recovered per-frame or per-detection problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameWarning {
    pub stage: PipelineStage,
    /// Frame label (source path or timestamp).
    pub frame: String,
    pub message: String,
}

impl FrameWarning {
    pub fn new(stage: PipelineStage, frame: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            stage,
            frame: frame.into(),
            message: message.into(),
        };
        warn!(stage = %warning.stage, frame = %warning.frame, "{}", warning.message);
        warning
    }

    /// Record a recoverable error against a frame.
    pub fn from_error(stage: PipelineStage, frame: impl Into<String>, err: &TransitError) -> Self {
        Self::new(stage, frame, err.to_string())
    }
}

/// Time-ordered frames with usable detections, ready for matching.
#[derive(Clone, Debug, Default)]
pub struct FrameCatalog {
    pub frames: Vec<Frame>,
    pub warnings: Vec<FrameWarning>,
}

impl FrameCatalog {
    /// Normalize raw frames.
    ///
    /// Invalid detections are dropped; frames that end up empty, lack usable
    /// sky positions, or repeat an earlier timestamp are excluded. Nothing
    /// here aborts: every exclusion is recorded as a warning.
    pub fn build(frames: Vec<Frame>) -> Self {
        let stage = PipelineStage::Matching;
        let total = frames.len();
        let mut warnings = Vec::new();
        let mut usable: Vec<Frame> = Vec::with_capacity(total);

        for frame in frames {
            match normalize_frame(frame, &mut warnings) {
                Ok(frame) => usable.push(frame),
                Err((label, err)) => warnings.push(FrameWarning::from_error(stage, label, &err)),
            }
        }

        usable.sort_by(|a, b| a.time.total_cmp(&b.time));
        let mut frames: Vec<Frame> = Vec::with_capacity(usable.len());
        for frame in usable {
            if frames.last().is_some_and(|prev| prev.time == frame.time) {
                warnings.push(FrameWarning::new(
                    stage,
                    frame.label(),
                    format!("duplicate timestamp {}; frame excluded", frame.time),
                ));
                continue;
            }
            frames.push(frame);
        }

        info!(
            usable = frames.len(),
            total,
            warnings = warnings.len(),
            "Frame catalog built"
        );
        Self { frames, warnings }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_infos(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .enumerate()
            .map(|(index, frame)| FrameInfo {
                index,
                time: frame.time,
                detections: frame.detections.len(),
                source: frame.source.clone(),
            })
            .collect()
    }
}

fn normalize_frame(
    mut frame: Frame,
    warnings: &mut Vec<FrameWarning>,
) -> std::result::Result<Frame, (String, TransitError)> {
    let label = frame.label();
    if !frame.time.is_finite() {
        return Err((
            label,
            TransitError::InputFormat(format!("non-finite timestamp {}", frame.time)),
        ));
    }
    if frame.detections.is_empty() {
        return Err((
            label,
            TransitError::InputFormat("frame has zero detections".into()),
        ));
    }

    let before = frame.detections.len();
    frame.detections.retain(|d| d.has_valid_flux());
    let dropped = before - frame.detections.len();
    if dropped > 0 {
        warnings.push(FrameWarning::new(
            PipelineStage::Matching,
            label.clone(),
            format!("{dropped} detection(s) with invalid flux or uncertainty dropped"),
        ));
    }
    if frame.detections.is_empty() {
        return Err((
            label,
            TransitError::InputFormat("no detection has a valid flux".into()),
        ));
    }

    if let Some(projection) = frame.projection.clone() {
        for detection in frame.detections.iter_mut() {
            if !detection.sky.is_finite() {
                detection.sky = projection.pixel_to_sky(detection.pixel);
            }
        }
    }
    let unpositioned = frame.detections.iter().filter(|d| !d.sky.is_finite()).count();
    if unpositioned == frame.detections.len() {
        return Err((
            label,
            TransitError::InputFormat("frame lacks usable sky positions".into()),
        ));
    }
    if unpositioned > 0 {
        debug!(frame = %label, unpositioned, "Dropping detections without sky position");
        frame.detections.retain(|d| d.sky.is_finite());
    }

    Ok(frame)
}
