#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;

use transit_core::catalog::FrameCatalog;
use transit_core::error::TransitError;
use transit_core::frame::{Frame, PixelPosition, SkyPosition, SkyProjection};
use transit_core::matching::{match_stars, MatchingParams, ReferenceFrame};
use transit_core::pipeline::PipelineStage;

use common::{detection, four_star_frames, frame, offset};

fn params(tolerance: f64) -> MatchingParams {
    MatchingParams {
        tolerance_arcsec: tolerance,
        min_frames: 1,
        min_stars: 1,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Frame catalog
// ---------------------------------------------------------------------------

#[test]
fn test_catalog_drops_zero_detection_frame_with_warning() {
    let mut frames = four_star_frames(&[1000.0; 5]);
    frames.push(Frame::new(2_460_001.0, Vec::new()));
    let catalog = FrameCatalog::build(frames);

    assert_eq!(catalog.len(), 5);
    assert_eq!(catalog.warnings.len(), 1);
    assert_eq!(catalog.warnings[0].stage, PipelineStage::Matching);
    assert!(catalog.warnings[0].message.contains("zero detections"));
}

#[test]
fn test_catalog_sorts_by_time_and_drops_duplicates() {
    let a = frame(3.0, &[(offset(0.0, 0.0), 100.0)]);
    let b = frame(1.0, &[(offset(0.0, 0.0), 100.0)]);
    let c = frame(1.0, &[(offset(0.0, 0.0), 100.0)]);
    let catalog = FrameCatalog::build(vec![a, b, c]);

    let times: Vec<f64> = catalog.frames.iter().map(|f| f.time).collect();
    assert_eq!(times, vec![1.0, 3.0]);
    assert!(catalog.warnings[0].message.contains("duplicate timestamp"));
}

#[test]
fn test_catalog_drops_invalid_detections() {
    let mut f = frame(1.0, &[(offset(0.0, 0.0), 100.0), (offset(20.0, 0.0), -5.0)]);
    f.detections[0].flux_err = 2.0;
    let catalog = FrameCatalog::build(vec![f]);

    assert_eq!(catalog.frames[0].detections.len(), 1);
    assert_eq!(catalog.warnings.len(), 1);
}

#[test]
fn test_catalog_resolves_sky_through_projection() {
    let projection = SkyProjection {
        reference_pixel: PixelPosition { x: 100.0, y: 100.0 },
        reference_sky: SkyPosition::new(common::FIELD_RA, common::FIELD_DEC),
        cd: [[-1.0 / 3600.0, 0.0], [0.0, 1.0 / 3600.0]],
    };
    let mut d = detection(0, SkyPosition::new(f64::NAN, f64::NAN), 500.0);
    d.pixel = PixelPosition { x: 110.0, y: 100.0 };
    let f = Frame::new(1.0, vec![d]).with_projection(projection.clone());
    let catalog = FrameCatalog::build(vec![f]);

    let sky = catalog.frames[0].detections[0].sky;
    assert!(sky.is_finite());
    let center = SkyPosition::new(common::FIELD_RA, common::FIELD_DEC);
    assert_relative_eq!(sky.separation_arcsec(&center), 10.0, epsilon = 1e-6);

    let back = projection.sky_to_pixel(sky).unwrap();
    assert_relative_eq!(back.x, 110.0, epsilon = 1e-6);
    assert_relative_eq!(back.y, 100.0, epsilon = 1e-6);
}

#[test]
fn test_catalog_drops_frame_without_sky_positions() {
    let d = detection(0, SkyPosition::new(f64::NAN, 2.0), 500.0);
    let catalog = FrameCatalog::build(vec![Frame::new(1.0, vec![d])]);
    assert!(catalog.is_empty());
    assert!(catalog.warnings[0].message.contains("sky positions"));
}

// ---------------------------------------------------------------------------
// Identity across frames
// ---------------------------------------------------------------------------

#[test]
fn test_detections_within_tolerance_share_identity() {
    let frames = vec![
        frame(1.0, &[(offset(0.0, 0.0), 100.0)]),
        frame(2.0, &[(offset(1.0, 0.5), 100.0)]),
        frame(3.0, &[(offset(-0.8, 0.3), 100.0)]),
    ];
    let matched = match_stars(&FrameCatalog::build(frames), &params(2.0)).unwrap();

    assert_eq!(matched.stars.len(), 1);
    assert_eq!(matched.stars[0].id, 1);
    assert_eq!(matched.stars[0].frame_count(), 3);
}

#[test]
fn test_detections_beyond_tolerance_never_share_identity() {
    let frames = vec![
        frame(1.0, &[(offset(0.0, 0.0), 100.0), (offset(5.0, 0.0), 80.0)]),
        frame(2.0, &[(offset(0.0, 0.0), 100.0), (offset(5.0, 0.0), 80.0)]),
        frame(3.0, &[(offset(2.5, 0.0), 90.0)]),
    ];
    let matched = match_stars(&FrameCatalog::build(frames), &params(2.0)).unwrap();

    assert_eq!(matched.stars.len(), 3);
    for star in &matched.stars {
        for m in star.measurements.values() {
            assert!(m.sky.separation_arcsec(&star.position) <= 2.0 + 1e-9);
        }
    }
    for (i, a) in matched.stars.iter().enumerate() {
        for b in &matched.stars[i + 1..] {
            assert!(a.position.separation_arcsec(&b.position) > 2.0);
        }
    }
}

#[test]
fn test_canonical_position_is_centroid() {
    let frames = vec![
        frame(1.0, &[(offset(-0.5, 0.0), 100.0)]),
        frame(2.0, &[(offset(0.5, 0.0), 100.0)]),
    ];
    let matched = match_stars(&FrameCatalog::build(frames), &params(2.0)).unwrap();
    let center = offset(0.0, 0.0);
    assert!(matched.stars[0].position.separation_arcsec(&center) < 1e-6);
}

#[test]
fn test_matching_is_idempotent() {
    let catalog = FrameCatalog::build(four_star_frames(&[1000.0; 5]));
    let first = match_stars(&catalog, &MatchingParams::default()).unwrap();
    let second = match_stars(&catalog, &MatchingParams::default()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.stars.len(), 4);
    assert!(first.stars.iter().all(|s| s.frame_count() == 5));
}

#[test]
fn test_flux_matrix_marks_absent_frames() {
    let frames = vec![
        frame(1.0, &[(offset(0.0, 0.0), 100.0), (offset(30.0, 0.0), 50.0)]),
        frame(2.0, &[(offset(0.0, 0.0), 110.0)]),
    ];
    let matched = match_stars(&FrameCatalog::build(frames), &params(2.0)).unwrap();
    let flux = matched.flux_matrix();

    assert_eq!(flux.dim(), (2, 2));
    assert_relative_eq!(flux[[0, 1]], 110.0);
    assert!(flux[[1, 1]].is_nan());
}

#[test]
fn test_equidistant_detection_goes_to_star_seen_more_often() {
    // Star 1 is older but seen once; star 2 is seen twice. The last
    // detection sits midway between them.
    let frames = vec![
        frame(1.0, &[(offset(0.0, 1.5), 100.0), (offset(0.0, -1.5), 100.0)]),
        frame(2.0, &[(offset(0.0, -1.5), 100.0)]),
        frame(3.0, &[(offset(0.0, 0.0), 100.0)]),
    ];
    let p = MatchingParams {
        reference: ReferenceFrame::Index(0),
        ..params(2.0)
    };
    let matched = match_stars(&FrameCatalog::build(frames), &p).unwrap();

    assert_eq!(matched.stars.len(), 2);
    assert!(matched.stars[0].measurement(2).is_none());
    assert!(matched.stars[1].measurement(2).is_some());
    assert_eq!(matched.stars[1].frame_count(), 3);
}

#[test]
fn test_equidistant_detection_with_equal_history_goes_to_older_star() {
    let frames = vec![
        frame(1.0, &[(offset(0.0, 1.5), 100.0), (offset(0.0, -1.5), 100.0)]),
        frame(2.0, &[(offset(0.0, 1.5), 100.0), (offset(0.0, -1.5), 100.0)]),
        frame(3.0, &[(offset(0.0, 0.0), 100.0)]),
    ];
    let p = MatchingParams {
        reference: ReferenceFrame::Index(0),
        ..params(2.0)
    };
    let matched = match_stars(&FrameCatalog::build(frames), &p).unwrap();

    assert_eq!(matched.stars.len(), 2);
    assert!(matched.stars[0].measurement(2).is_some());
    assert!(matched.stars[1].measurement(2).is_none());
}

// ---------------------------------------------------------------------------
// Spurious and blended detections
// ---------------------------------------------------------------------------

#[test]
fn test_single_frame_stars_are_discarded() {
    let frames = vec![
        frame(1.0, &[(offset(0.0, 0.0), 100.0), (offset(60.0, 0.0), 20.0)]),
        frame(2.0, &[(offset(0.0, 0.0), 100.0)]),
        frame(3.0, &[(offset(0.0, 0.0), 100.0)]),
    ];
    let p = MatchingParams {
        min_frames: 2,
        ..params(2.0)
    };
    let matched = match_stars(&FrameCatalog::build(frames), &p).unwrap();

    assert_eq!(matched.stars.len(), 1);
    assert_eq!(matched.spurious_discarded, 1);
}

#[test]
fn test_blended_detection_is_discarded_with_warning() {
    let frames = vec![
        frame(1.0, &[(offset(0.0, 0.0), 100.0)]),
        frame(2.0, &[(offset(0.2, 0.0), 100.0), (offset(-0.9, 0.0), 40.0)]),
    ];
    let p = MatchingParams {
        reference: ReferenceFrame::Index(0),
        ..params(2.0)
    };
    let matched = match_stars(&FrameCatalog::build(frames), &p).unwrap();

    assert_eq!(matched.stars.len(), 1);
    assert_eq!(matched.blended_discarded, 1);
    // The nearer detection wins the star.
    let m = matched.stars[0].measurement(1).unwrap();
    assert_relative_eq!(m.flux, 100.0);
    assert!(matched.warnings.iter().any(|w| w.message.contains("blended")));
}

#[test]
fn test_new_star_never_seeded_beside_moved_centroid() {
    // The -1.9" detection pulls the first star to about -0.95". The -2.5"
    // detection was out of reach before that move and is within it after.
    let frames = vec![
        frame(1.0, &[(offset(0.0, 0.0), 100.0)]),
        frame(2.0, &[(offset(-1.9, 0.0), 100.0), (offset(-2.5, 0.0), 40.0)]),
        frame(3.0, &[(offset(-1.0, 0.0), 100.0), (offset(-2.5, 0.0), 40.0)]),
    ];
    let p = MatchingParams {
        reference: ReferenceFrame::Index(0),
        ..params(2.0)
    };
    let matched = match_stars(&FrameCatalog::build(frames), &p).unwrap();

    for (i, a) in matched.stars.iter().enumerate() {
        for b in &matched.stars[i + 1..] {
            let separation = a.position.separation_arcsec(&b.position);
            assert!(
                separation > 2.0,
                "stars {} and {} only {separation:.3}\" apart",
                a.id,
                b.id
            );
        }
    }
    assert_eq!(matched.stars.len(), 1);
    assert_eq!(matched.stars[0].frame_count(), 3);
    assert_eq!(matched.blended_discarded, 2);
}

#[test]
fn test_too_few_stars_fails() {
    let frames = vec![frame(1.0, &[(offset(0.0, 0.0), 100.0)])];
    let p = MatchingParams {
        min_frames: 1,
        min_stars: 2,
        ..Default::default()
    };
    let err = match_stars(&FrameCatalog::build(frames), &p).unwrap_err();
    assert!(matches!(err, TransitError::Matching(_)));
}

#[test]
fn test_reference_index_out_of_range() {
    let catalog = FrameCatalog::build(four_star_frames(&[1000.0; 5]));
    let p = MatchingParams {
        reference: ReferenceFrame::Index(9),
        ..Default::default()
    };
    assert!(matches!(
        match_stars(&catalog, &p),
        Err(TransitError::Matching(_))
    ));
}

#[test]
fn test_empty_catalog_fails() {
    let catalog = FrameCatalog::build(Vec::new());
    assert!(match_stars(&catalog, &MatchingParams::default()).is_err());
}
