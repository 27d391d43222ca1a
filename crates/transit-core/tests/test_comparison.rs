#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;

use transit_core::catalog::FrameCatalog;
use transit_core::comparison::{select_comparison_stars, CandidateStatus, ComparisonParams};
use transit_core::error::TransitError;
use transit_core::frame::Frame;
use transit_core::matching::{match_stars, MatchedStars, MatchingParams};
use transit_core::target::{identify_target, resolve_target, TargetConfig, TargetStar};

use common::{four_star_frames, four_star_positions, frame, noise, offset, FIELD_DEC, FIELD_RA};

fn matched_from(frames: Vec<Frame>) -> MatchedStars {
    match_stars(&FrameCatalog::build(frames), &MatchingParams::default()).unwrap()
}

fn field_target(matched: &MatchedStars) -> TargetStar {
    identify_target(matched, &TargetConfig::new(FIELD_RA, FIELD_DEC)).unwrap()
}

fn sorted_members(ids: Vec<usize>) -> Vec<usize> {
    let mut ids = ids;
    ids.sort_unstable();
    ids
}

/// Target plus `quiet` stars with ~0.6% noise and, optionally, one star
/// varying by 30%. Stars sit on a 30" grid; the variable star is last.
fn grid_frames(quiet: usize, with_variable: bool, frames: usize) -> Vec<Frame> {
    let stars = 1 + quiet + usize::from(with_variable);
    (0..frames)
        .map(|k| {
            let entries: Vec<_> = (0..stars)
                .map(|s| {
                    let pos = offset(30.0 * (s % 5) as f64, 30.0 * (s / 5) as f64);
                    let flux = if with_variable && s == stars - 1 {
                        1000.0 * (1.0 + 0.3 * (k as f64 * 1.3).sin())
                    } else {
                        1000.0 + 10.0 * noise(s as u64 * 101, k)
                    };
                    (pos, flux)
                })
                .collect();
            frame(10.0 + k as f64, &entries)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Target identification
// ---------------------------------------------------------------------------

#[test]
fn test_target_is_nearest_star() {
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let target = field_target(&matched);
    assert_eq!(target.star_id, 1);
    assert!(target.separation_arcsec < 0.5);
}

#[test]
fn test_target_not_found_outside_tolerance() {
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let far = offset(20.0, 20.0);
    let err = identify_target(&matched, &TargetConfig::new(far.ra, far.dec)).unwrap_err();
    assert!(matches!(err, TransitError::TargetNotFound { .. }));
}

#[test]
fn test_target_by_star_id() {
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let mut config = TargetConfig::new(FIELD_RA, FIELD_DEC);
    config.star_id = Some(3);
    let target = resolve_target(&matched, &config).unwrap();
    assert_eq!(target.star_id, 3);
    assert_eq!(target.separation_arcsec, 0.0);

    config.star_id = Some(99);
    assert!(matches!(
        resolve_target(&matched, &config),
        Err(TransitError::InvalidConfig(_))
    ));

    config.star_id = None;
    assert_eq!(resolve_target(&matched, &config).unwrap().star_id, 1);
}

// ---------------------------------------------------------------------------
// Ensemble selection
// ---------------------------------------------------------------------------

#[test]
fn test_four_star_scene_selects_all_comparisons() {
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let target = field_target(&matched);
    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();

    assert_eq!(sorted_members(ensemble.member_ids()), vec![2, 3, 4]);
    for m in &ensemble.members {
        assert_relative_eq!(m.weight, 1.0 / 3.0, epsilon = 1e-6);
    }
    assert!(ensemble.combined_variability.unwrap() < 1e-9);
    assert_eq!(ensemble.evaluation_frames, 5);
}

#[test]
fn test_target_is_never_a_member() {
    // The target is the quietest star in the field.
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let target = field_target(&matched);
    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();

    assert!(!ensemble.contains(target.star_id));
    assert!(ensemble.candidates.iter().all(|c| c.star_id != target.star_id));
    assert_eq!(ensemble.target.star_id, target.star_id);
}

#[test]
fn test_weights_sum_to_one() {
    let matched = matched_from(grid_frames(6, false, 8));
    let target = field_target(&matched);
    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();

    let total: f64 = ensemble.members.iter().map(|m| m.weight).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    assert!(ensemble.members.iter().all(|m| m.weight > 0.0));
}

#[test]
fn test_variable_star_is_rejected() {
    let matched = matched_from(grid_frames(12, true, 8));
    let target = field_target(&matched);
    let variable_id = matched.stars.len();
    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();

    assert!(!ensemble.contains(variable_id));
    let row = ensemble
        .candidates
        .iter()
        .find(|c| c.star_id == variable_id)
        .unwrap();
    assert_eq!(row.status, CandidateStatus::Rejected);
    assert!(!ensemble.members.is_empty());
}

#[test]
fn test_ranking_ignores_held_out_frames() {
    // The last star is steady on even frames and swings 30% on odd ones.
    let frames: Vec<Frame> = (0..8)
        .map(|k| {
            let mut entries: Vec<_> = (0..6)
                .map(|s| {
                    let pos = offset(30.0 * s as f64, 0.0);
                    (pos, 1000.0 + 10.0 * noise(s as u64 * 101, k))
                })
                .collect();
            let swing = if k % 2 == 1 { 0.3 * (k as f64 * 1.3).sin() } else { 0.0 };
            entries.push((offset(0.0, 30.0), 1000.0 * (1.0 + swing)));
            frame(10.0 + k as f64, &entries)
        })
        .collect();
    let matched = matched_from(frames);
    let target = field_target(&matched);
    let odd_swinger = matched.stars.len();
    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();

    assert_eq!(ensemble.evaluation_frames, 4);
    let row = ensemble
        .candidates
        .iter()
        .find(|c| c.star_id == odd_swinger)
        .unwrap();
    assert_ne!(row.status, CandidateStatus::Rejected);
    assert!(row.variability.unwrap() < 0.05);
}

#[test]
fn test_candidate_table_is_sorted_and_complete() {
    let matched = matched_from(grid_frames(6, true, 8));
    let target = field_target(&matched);
    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();

    let ids: Vec<usize> = ensemble.candidates.iter().map(|c| c.star_id).collect();
    assert_eq!(ids, (2..=matched.stars.len()).collect::<Vec<_>>());
    for c in &ensemble.candidates {
        assert_eq!(c.status == CandidateStatus::Member, ensemble.contains(c.star_id));
        assert_relative_eq!(c.presence, 1.0);
    }
}

#[test]
fn test_excluded_position_is_not_a_candidate() {
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let target = field_target(&matched);
    let params = ComparisonParams {
        excluded: vec![four_star_positions()[3]],
        ..Default::default()
    };
    let ensemble = select_comparison_stars(&matched, &target, &params).unwrap();

    assert_eq!(sorted_members(ensemble.member_ids()), vec![2, 3]);
    assert!(ensemble.candidates.iter().all(|c| c.star_id != 4));
}

#[test]
fn test_presence_threshold_filters_candidates() {
    let mut frames = four_star_frames(&[1000.0; 5]);
    // Star 4 only in 3 of 5 frames.
    frames[1].detections.truncate(3);
    frames[3].detections.truncate(3);
    let matched = matched_from(frames);
    let target = field_target(&matched);

    let ensemble = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap();
    assert_eq!(sorted_members(ensemble.member_ids()), vec![2, 3]);

    let relaxed = ComparisonParams {
        min_presence: 0.6,
        ..Default::default()
    };
    let ensemble = select_comparison_stars(&matched, &target, &relaxed).unwrap();
    assert!(ensemble.candidates.iter().any(|c| c.star_id == 4));
}

#[test]
fn test_max_ensemble_size_is_respected() {
    let matched = matched_from(four_star_frames(&[1000.0; 5]));
    let target = field_target(&matched);
    let params = ComparisonParams {
        max_ensemble_size: 2,
        ..Default::default()
    };
    let ensemble = select_comparison_stars(&matched, &target, &params).unwrap();

    assert_eq!(ensemble.members.len(), 2);
    assert!(ensemble
        .candidates
        .iter()
        .any(|c| c.status == CandidateStatus::Unused));
}

#[test]
fn test_growth_stops_when_combined_variability_worsens() {
    // Stars 2 and 3 swing together, star 3 twice as far. Star 4 swings the
    // other way so every frame keeps the same total flux.
    let swings = [0.01, -0.01, 0.02, -0.02, 0.0];
    let frames: Vec<Frame> = swings
        .iter()
        .enumerate()
        .map(|(k, &e)| {
            let stars = [
                (offset(0.0, 0.0), 1000.0),
                (offset(30.0, 0.0), 1000.0 * (1.0 + e)),
                (offset(60.0, 0.0), 1000.0 * (1.0 + 2.0 * e)),
                (offset(90.0, 0.0), 1000.0 * (1.0 - 3.0 * e)),
            ];
            frame(10.0 + k as f64, &stars)
        })
        .collect();
    let matched = matched_from(frames);
    let target = field_target(&matched);
    let params = ComparisonParams::default();
    let ensemble = select_comparison_stars(&matched, &target, &params).unwrap();

    assert_eq!(ensemble.member_ids(), vec![2]);
    assert!(ensemble.members.len() < params.max_ensemble_size);

    let status = |id: usize| ensemble.candidates.iter().find(|c| c.star_id == id).unwrap();
    let quietest = status(2).variability.unwrap();
    let runner_up = status(3);
    assert_eq!(runner_up.status, CandidateStatus::Unused);
    assert!(runner_up.variability.unwrap() <= quietest * params.variability_multiplier);
    assert_eq!(status(4).status, CandidateStatus::TooVariable);
    assert_relative_eq!(
        ensemble.combined_variability.unwrap(),
        quietest,
        max_relative = 1e-6
    );
}

#[test]
fn test_no_candidates_is_an_error() {
    let positions = four_star_positions();
    let frames: Vec<Frame> = (0..5)
        .map(|k| {
            let mut stars = vec![(positions[0], 1000.0)];
            if k < 2 {
                stars.push((positions[1], 900.0));
            }
            frame(1.0 + k as f64, &stars)
        })
        .collect();
    let matched = matched_from(frames);
    let target = field_target(&matched);

    let err = select_comparison_stars(&matched, &target, &ComparisonParams::default()).unwrap_err();
    assert!(matches!(err, TransitError::InsufficientComparisonStars(_)));
}
