//! Integration tests: write a synthetic moon transit to CSV, load it back,
//! link it, and check that the planted birds are found, corroborated, labeled
//! and reported, and that a checkpointed run resumes.


use lunatrack::{
    inputs, link, output, CorroborationMode, Detection, DetectionStore, Ellipse, EllipseTable,
    GroundTruth, LinkConfig, ScoredTracklet, TruthInterval,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

fn on_path(d: &Detection, bird: &test_data::Bird) -> bool {
    if d.frame < bird.first_frame || d.frame > bird.last_frame {
        return false;
    }
    let [bx, by] = bird.position(d.frame);
    (d.x - bx).abs() < 2.0 && (d.y - by).abs() < 2.0
}

/// Tracklets anchored at `frame` whose three legs all sit on the bird's path.
fn bird_tracklets<'a>(
    tracklets: &'a [ScoredTracklet],
    bird: &test_data::Bird,
    frame: u32,
) -> Vec<&'a ScoredTracklet> {
    tracklets
        .iter()
        .filter(|t| t.frame() == frame && t.tracklet.legs.iter().all(|d| on_path(d, bird)))
        .collect()
}

#[test]
fn test_synthetic_transit_end_to_end() {
    init_tracing();

    // ── Step 1: Write and reload the fixture ──
    let fixture = test_data::synthetic_flight(7);
    let dir = tempfile::tempdir().unwrap();
    let files = test_data::write_fixture(&fixture, dir.path());

    let detections = inputs::load_detections(&files.detections).unwrap();
    assert_eq!(detections.skipped, 0);
    assert_eq!(detections.rows.len(), fixture.detections.len());
    let ellipses = inputs::load_ellipses(&files.ellipses).unwrap();
    assert_eq!(ellipses.len(), test_data::NUM_FRAMES as usize);
    let truth = GroundTruth::new(inputs::load_ground_truth(&files.truth).unwrap().rows);

    // ── Step 2: Link with checkpoints ──
    let config = LinkConfig {
        chunk_frames: 64,
        checkpoint_dir: Some(dir.path().join("checkpoints")),
        ..Default::default()
    };
    let store = DetectionStore::new(detections.rows.clone());
    let result = link(store, &ellipses, Some(&truth), &config).unwrap();

    println!(
        "{} candidates -> {} consistent -> {} projected in {:.1} ms",
        result.stats.candidates,
        result.stats.consistent,
        result.stats.projected,
        result.link_time_ms
    );
    assert_eq!(result.stats.chunks_resumed, 0);
    assert!(result.stats.candidates >= result.stats.consistent);
    assert!(result.stats.consistent >= result.stats.projected);

    // Tracklets come back in anchor-frame order.
    assert!(result
        .tracklets
        .windows(2)
        .all(|w| w[0].frame() <= w[1].frame()));

    // ── Step 3: Every bird frame is linked, and the path corroborates itself ──
    for bird in &fixture.birds {
        for frame in bird.anchor_frames() {
            let found = bird_tracklets(&result.tracklets, bird, frame);
            assert!(!found.is_empty(), "no bird tracklet at frame {frame}");
            let t = found[0];
            assert!(t.label, "bird tracklet at frame {frame} not labeled");
            assert!(t.kinematics.ellipse_target.is_some());

            // Bird tracklets in the next three frames lie on the heading line.
            if frame + 3 <= bird.last_frame {
                assert!(
                    t.corroboration.count >= 3,
                    "frame {frame}: corroboration {:?}",
                    t.corroboration
                );
            }
        }
    }
    for t in &result.tracklets {
        assert!(t.corroboration.count <= t.corroboration.window);
    }

    // ── Step 4: Hit report ──
    let report = result.report.as_ref().unwrap();
    let bird_frames: u64 = fixture
        .birds
        .iter()
        .map(|b| b.anchor_frames().count() as u64)
        .sum();
    assert_eq!(report.truth_frames, bird_frames + 11);
    assert_eq!(report.detected_frames, bird_frames);
    assert!((report.hit_rate + report.miss_rate - 1.0).abs() < 1e-12);
    assert_eq!(
        report.missed_intervals,
        vec![TruthInterval {
            first_frame: 350,
            last_frame: 360
        }]
    );
    assert_eq!(
        report.labeled_hits + report.labeled_misses,
        result.tracklets.len()
    );

    // ── Step 5: A second run resumes every chunk ──
    let store = DetectionStore::new(detections.rows);
    let resumed = link(store, &ellipses, Some(&truth), &config).unwrap();
    assert_eq!(resumed.stats.chunks_resumed, resumed.stats.chunks);
    assert_eq!(resumed.stats.candidates, result.stats.candidates);
    assert_eq!(resumed.tracklets, result.tracklets);

    // ── Step 6: Output table ──
    let out = dir.path().join("tracklets.csv");
    output::write_tracklets(&out, &resumed.tracklets).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), resumed.tracklets.len() + 1);
}

#[test]
fn test_changed_config_invalidates_checkpoints() {
    init_tracing();
    let fixture = test_data::synthetic_flight(11);
    let dir = tempfile::tempdir().unwrap();
    let ellipses = EllipseTable::from_ellipses(fixture.ellipses.clone()).unwrap();

    let config = LinkConfig {
        chunk_frames: 100,
        checkpoint_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let first = link(
        DetectionStore::new(fixture.detections.clone()),
        &ellipses,
        None,
        &config,
    )
    .unwrap();
    assert_eq!(first.stats.chunks_resumed, 0);

    let stricter = LinkConfig {
        min_speed: 15.0,
        ..config.clone()
    };
    let second = link(
        DetectionStore::new(fixture.detections.clone()),
        &ellipses,
        None,
        &stricter,
    )
    .unwrap();
    assert_eq!(second.stats.chunks_resumed, 0);
    assert!(second.stats.projected <= first.stats.projected);
    assert!(second
        .tracklets
        .iter()
        .all(|t| t.kinematics.avg_dist > 15.0));

    // Scoring settings do not touch the checkpoints.
    let kinematic = LinkConfig {
        corroboration_mode: CorroborationMode::Kinematic,
        ..stricter
    };
    let third = link(
        DetectionStore::new(fixture.detections),
        &ellipses,
        None,
        &kinematic,
    )
    .unwrap();
    assert_eq!(third.stats.chunks_resumed, third.stats.chunks);
    assert!(third.tracklets.iter().all(|t| !t.label));
}

#[test]
fn test_three_frame_scenario() {
    init_tracing();
    let store = DetectionStore::new(vec![
        Detection::new(0, 0.0, 0.0, 2.0),
        Detection::new(1, 1.0, 1.0, 2.0),
        Detection::new(2, 2.0, 2.0, 2.0),
    ]);
    let ellipses = EllipseTable::from_ellipses(
        (0..3)
            .map(|frame| Ellipse {
                frame,
                center_x: 0.0,
                center_y: 0.0,
                semi_major: 50.0,
                semi_minor: 50.0,
                theta_deg: 0.0,
            })
            .collect(),
    )
    .unwrap();
    let truth = GroundTruth::new(vec![TruthInterval {
        first_frame: 2,
        last_frame: 2,
    }]);
    let config = LinkConfig {
        canonicalize_travel_sense: false,
        min_speed: 0.0,
        moon_center: None,
        ..Default::default()
    };
    let result = link(store, &ellipses, Some(&truth), &config).unwrap();
    assert_eq!(result.tracklets.len(), 1);
    let t = &result.tracklets[0];
    assert!((t.kinematics.avg_dist - 2f64.sqrt()).abs() < 1e-12);
    assert!((t.kinematics.avg_dir.to_degrees() - 45.0).abs() < 1e-9);
    assert_eq!(t.corroboration.window, 0);
    assert!(t.label);
    assert_eq!(result.report.unwrap().hit_rate, 1.0);
}

#[test]
fn test_frame_cutoff_beyond_index_width_fails() {
    let store = DetectionStore::new(vec![Detection::new(0, 0.0, 0.0, 2.0)]);
    let config = LinkConfig {
        frame_cutoff: 70000,
        frame_index_limit: 70000,
        ..Default::default()
    };
    // Valid config, but the store still uses the configured width.
    let result = link(store, &EllipseTable::default(), None, &config).unwrap();
    assert!(result.tracklets.is_empty());

    let store = DetectionStore::new(vec![Detection::new(0, 0.0, 0.0, 2.0)]);
    let bad = LinkConfig {
        frame_cutoff: 70000,
        ..Default::default()
    };
    let err = link(store, &EllipseTable::default(), None, &bad).unwrap_err();
    assert_eq!(err.kind(), lunatrack::ErrorKind::Config);
}
