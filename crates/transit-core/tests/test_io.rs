#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;

use transit_core::error::TransitError;
use transit_core::io::artifact::{ArtifactStore, RUN_STATE_FILE};
use transit_core::io::photometry::table_files;
use transit_core::io::{load_frame, load_frames, parse_table, resolve_inputs};
use transit_core::pipeline::{PipelineStage, RunState};

const TABLE: &str = "\
# frame 0042
id x y ra dec flux flux_err time
0 10.5 20.25 150.0 2.0 1000 31.6 2460000.5
1 40.0 80.0 150.01 2.01 250.5 15.8 2460000.5
";

// ---------------------------------------------------------------------------
// Table parsing
// ---------------------------------------------------------------------------

#[test]
fn test_parse_table_with_header_and_comments() {
    let frame = parse_table(TABLE).unwrap();
    assert_eq!(frame.detections.len(), 2);
    assert_relative_eq!(frame.time, 2_460_000.5);

    let d = &frame.detections[1];
    assert_eq!(d.id, 1);
    assert_relative_eq!(d.pixel.x, 40.0);
    assert_relative_eq!(d.sky.ra, 150.01);
    assert_relative_eq!(d.flux, 250.5);
    assert_relative_eq!(d.flux_err, 15.8);
}

#[test]
fn test_parse_table_accepts_commas() {
    let text = "0,1.0,2.0,150.0,2.0,500,22,10.0\n1, 3.0, 4.0, 150.1, 2.1, 400, 20, 10.0\n";
    let frame = parse_table(text).unwrap();
    assert_eq!(frame.detections.len(), 2);
    assert_relative_eq!(frame.time, 10.0);
}

#[test]
fn test_parse_table_allows_missing_sky() {
    let frame = parse_table("0 1.0 2.0 nan NaN 500 22 10.0\n").unwrap();
    assert!(!frame.detections[0].sky.is_finite());
}

#[test]
fn test_parse_table_rejects_mixed_timestamps() {
    let text = "0 1 2 150 2 500 22 10.0\n1 3 4 150 2 400 20 10.5\n";
    let err = parse_table(text).unwrap_err();
    assert!(matches!(err, TransitError::InputFormat(ref m) if m.contains("line 2")));
}

#[test]
fn test_parse_table_rejects_wrong_column_count() {
    let err = parse_table("0 1 2 150 2 500 10.0\n").unwrap_err();
    assert!(matches!(err, TransitError::InputFormat(ref m) if m.contains("expected 8 columns")));
}

#[test]
fn test_parse_table_rejects_bad_values() {
    assert!(parse_table("0 1 2 150 2 abc 22 10.0\n").is_err());
    assert!(parse_table("1.5 1 2 150 2 500 22 10.0\n").is_err());
    assert!(parse_table("0 nan 2 150 2 500 22 10.0\n").is_err());
    assert!(parse_table("0 1 2 150 2 500 22 nan\n").is_err());
}

#[test]
fn test_parse_table_without_rows() {
    let err = parse_table("# nothing\nid x y ra dec flux flux_err time\n").unwrap_err();
    assert!(matches!(err, TransitError::InputFormat(_)));
}

// ---------------------------------------------------------------------------
// Files and directories
// ---------------------------------------------------------------------------

#[test]
fn test_load_frame_records_source_and_path_in_errors() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    let bad = dir.path().join("bad.txt");
    std::fs::write(&good, TABLE).unwrap();
    std::fs::write(&bad, "0 1 2\n").unwrap();

    let frame = load_frame(&good).unwrap();
    assert_eq!(frame.source.as_deref(), Some(good.as_path()));

    let err = load_frame(&bad).unwrap_err();
    assert!(err.to_string().contains("bad.txt"));
}

#[test]
fn test_load_frames_skips_unreadable_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    std::fs::write(&good, TABLE).unwrap();
    let missing = dir.path().join("missing.txt");

    let (frames, warnings) = load_frames(&[good, missing]);
    assert_eq!(frames.len(), 1);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].stage, PipelineStage::Matching);
    assert!(warnings[0].frame.ends_with("missing.txt"));
}

#[test]
fn test_resolve_inputs_expands_directories() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.csv", "a.txt", "c.dat", "readme.md"] {
        std::fs::write(dir.path().join(name), TABLE).unwrap();
    }
    std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

    let files = table_files(dir.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.csv", "c.dat"]);

    let extra = dir.path().join("readme.md");
    let resolved = resolve_inputs(&[dir.path().to_path_buf(), extra.clone()]).unwrap();
    assert_eq!(resolved.len(), 4);
    assert_eq!(resolved[3], extra);
}

// ---------------------------------------------------------------------------
// Artifact store
// ---------------------------------------------------------------------------

#[test]
fn test_artifact_store_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("a").join("b");
    let store = ArtifactStore::open(&work).unwrap();
    assert!(work.is_dir());
    assert_eq!(store.dir(), work.as_path());
}

#[test]
fn test_run_state_defaults_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    assert!(!store.exists(RUN_STATE_FILE));
    assert_eq!(store.load_run_state().unwrap(), RunState::default());

    let state = RunState {
        last_completed: Some(PipelineStage::Photometry),
    };
    store.save_run_state(&state).unwrap();
    assert_eq!(store.load_run_state().unwrap(), state);
    assert!(!store.exists(&format!("{RUN_STATE_FILE}.tmp")));
}

#[test]
fn test_corrupt_artifact_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    std::fs::write(store.path(RUN_STATE_FILE), "{ not json").unwrap();
    assert!(matches!(
        store.load_run_state(),
        Err(TransitError::Artifact(_))
    ));
}

#[test]
fn test_missing_artifact_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    assert!(matches!(store.load_matched_stars(), Err(TransitError::Io(_))));
}
