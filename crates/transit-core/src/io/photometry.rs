use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::FrameWarning;
use crate::error::{Result, TransitError};
use crate::frame::{Detection, Frame, PixelPosition, SkyPosition};
use crate::pipeline::PipelineStage;

/// Columns of a photometry table, in order.
pub const TABLE_COLUMNS: [&str; 8] = ["id", "x", "y", "ra", "dec", "flux", "flux_err", "time"];

/// File extensions picked up when loading a directory.
const TABLE_EXTENSIONS: [&str; 4] = ["txt", "csv", "dat", "phot"];

fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect()
}

fn parse_field(field: &str, column: &str, line_no: usize) -> Result<f64> {
    let value = field.trim();
    match value.to_ascii_lowercase().as_str() {
        "nan" | "" => Ok(f64::NAN),
        _ => value.parse::<f64>().map_err(|_| {
            TransitError::InputFormat(format!(
                "line {line_no}: column '{column}' is not a number: '{value}'"
            ))
        }),
    }
}

/// Parse the contents of one photometry table into a frame.
///
/// Lines starting with `#` are comments, and a first data line whose
/// leading field is not numeric is treated as a header. Every row must
/// carry the same timestamp.
pub fn parse_table(text: &str) -> Result<Frame> {
    let mut detections: Vec<Detection> = Vec::new();
    let mut time: Option<f64> = None;
    let mut seen_data = false;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_fields(line);
        if !seen_data {
            seen_data = true;
            if fields.first().is_some_and(|f| f.parse::<f64>().is_err()) {
                debug!(line = line_no, "Skipping header line");
                continue;
            }
        }
        if fields.len() != TABLE_COLUMNS.len() {
            return Err(TransitError::InputFormat(format!(
                "line {line_no}: expected {} columns, found {}",
                TABLE_COLUMNS.len(),
                fields.len()
            )));
        }

        let mut values = [0.0; 8];
        for (slot, (field, column)) in values.iter_mut().zip(fields.iter().zip(TABLE_COLUMNS)) {
            *slot = parse_field(field, column, line_no)?;
        }
        let [id, x, y, ra, dec, flux, flux_err, t] = values;
        if !id.is_finite() || id < 0.0 || id.fract() != 0.0 {
            return Err(TransitError::InputFormat(format!(
                "line {line_no}: detection id {id} is not a non-negative integer"
            )));
        }
        if !x.is_finite() || !y.is_finite() {
            return Err(TransitError::InputFormat(format!(
                "line {line_no}: pixel position is not finite"
            )));
        }
        if !t.is_finite() {
            return Err(TransitError::InputFormat(format!(
                "line {line_no}: timestamp is not finite"
            )));
        }
        match time {
            None => time = Some(t),
            Some(existing) if existing != t => {
                return Err(TransitError::InputFormat(format!(
                    "line {line_no}: timestamp {t} differs from frame timestamp {existing}"
                )));
            }
            Some(_) => {}
        }

        detections.push(Detection {
            id: id as u64,
            pixel: PixelPosition { x, y },
            sky: SkyPosition::new(ra, dec),
            flux,
            flux_err,
        });
    }

    let time = time.ok_or_else(|| TransitError::InputFormat("table has no detections".into()))?;
    Ok(Frame::new(time, detections))
}

/// Read a single photometry table file.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let text = fs::read_to_string(path)?;
    let frame = parse_table(&text)
        .map_err(|e| match e {
            TransitError::InputFormat(msg) => {
                TransitError::InputFormat(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?
        .with_source(path);
    debug!(path = %path.display(), detections = frame.detections.len(), "Loaded frame");
    Ok(frame)
}

/// Read many table files. A file that cannot be read or parsed is skipped
/// and reported as a warning; the rest still load.
pub fn load_frames(paths: &[PathBuf]) -> (Vec<Frame>, Vec<FrameWarning>) {
    let mut frames = Vec::with_capacity(paths.len());
    let mut warnings = Vec::new();
    for path in paths {
        match load_frame(path) {
            Ok(frame) => frames.push(frame),
            Err(err) => warnings.push(FrameWarning::from_error(
                PipelineStage::Matching,
                path.display().to_string(),
                &err,
            )),
        }
    }
    info!(
        loaded = frames.len(),
        failed = warnings.len(),
        "Photometry tables read"
    );
    (frames, warnings)
}

/// Table files directly inside `dir`, sorted by name.
pub fn table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Expand input paths: directories contribute their table files, files are
/// taken as given.
pub fn resolve_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            paths.extend(table_files(input)?);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}
