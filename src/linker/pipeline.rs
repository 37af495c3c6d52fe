//! End-to-end linking run: clean, build and filter per chunk in parallel,
//! project, corroborate, label.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use super::builder::{chunk_triples, frame_triple_count};
use super::checkpoint::{input_digest, CheckpointDir, ChunkCheckpoint, CHECKPOINT_VERSION};
use super::filter::link_triple;
use super::kinematics::project;
use super::labeler::{label, GroundTruth, HitReport};
use super::{scorer, LinkConfig, LinkResult, LinkStats};
use crate::error::Result;
use crate::tracklet::ProjectedTracklet;
use crate::{DetectionStore, EllipseTable};

/// A run of anchor frames sharing `frame / chunk_frames`.
#[derive(Debug, Clone, Copy)]
pub struct FrameChunk<'a> {
    pub id: u32,
    pub frames: &'a [u32],
}

/// Split ascending frames into chunks of `chunk_frames` frame numbers.
/// Empty chunks are not produced.
pub fn frame_chunks(frames: &[u32], chunk_frames: u32) -> Vec<FrameChunk<'_>> {
    let n = chunk_frames.max(1);
    frames
        .chunk_by(|a, b| a / n == b / n)
        .map(|frames| FrameChunk {
            id: frames[0] / n,
            frames,
        })
        .collect()
}

struct ChunkOutcome {
    tracklets: Vec<ProjectedTracklet>,
    candidates: u64,
    consistent: u64,
    resumed: bool,
}

fn process_chunk(
    store: &DetectionStore,
    ellipses: &EllipseTable,
    chunk: FrameChunk<'_>,
    checkpoints: Option<&CheckpointDir>,
    fingerprint: u64,
    config: &LinkConfig,
) -> Result<ChunkOutcome> {
    let (first, last) = match (chunk.frames.first(), chunk.frames.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            return Ok(ChunkOutcome {
                tracklets: Vec::new(),
                candidates: 0,
                consistent: 0,
                resumed: false,
            })
        }
    };
    let digest = checkpoints.map(|_| input_digest(store, ellipses, first, last));

    if let (Some(dir), Some(digest)) = (checkpoints, digest) {
        if let Some(ck) = dir.load_current(chunk.id, fingerprint, digest) {
            return Ok(ChunkOutcome {
                tracklets: ck.tracklets,
                candidates: ck.candidates,
                consistent: ck.consistent,
                resumed: true,
            });
        }
    }

    let candidates: u64 = chunk
        .frames
        .iter()
        .map(|&f| frame_triple_count(store, f))
        .sum();
    let mut consistent = 0u64;
    let mut tracklets = Vec::new();
    for triple in chunk_triples(store, chunk.frames) {
        if let Some(t) = link_triple(triple, config) {
            consistent += 1;
            if let Some(p) = project(t, ellipses, config)? {
                tracklets.push(p);
            }
        }
    }
    debug!(
        "Chunk {} (frames {}..={}): {} candidates, {} consistent, {} projected",
        chunk.id,
        first,
        last,
        candidates,
        consistent,
        tracklets.len()
    );

    if let (Some(dir), Some(digest)) = (checkpoints, digest) {
        let ck = ChunkCheckpoint {
            version: CHECKPOINT_VERSION,
            chunk_id: chunk.id,
            first_frame: first,
            last_frame: last,
            config_fingerprint: fingerprint,
            input_digest: digest,
            candidates,
            consistent,
            tracklets,
        };
        dir.save(&ck)?;
        return Ok(ChunkOutcome {
            tracklets: ck.tracklets,
            candidates,
            consistent,
            resumed: false,
        });
    }

    Ok(ChunkOutcome {
        tracklets,
        candidates,
        consistent,
        resumed: false,
    })
}

/// Link raw detections into scored tracklets.
///
/// The store is cleaned with the settings in `config` first. When `truth` is
/// given, tracklets are labeled and a [`HitReport`] is produced; otherwise
/// every label is `false`.
///
/// Fails on invalid configuration, a frame cutoff beyond the frame index
/// width, a tracklet whose anchor frame has no ellipse, or a checkpoint that
/// cannot be written. Chunks already checkpointed stay on disk.
pub fn link(
    detections: DetectionStore,
    ellipses: &EllipseTable,
    truth: Option<&GroundTruth>,
    config: &LinkConfig,
) -> Result<LinkResult> {
    let start = Instant::now();
    config.validate()?;

    let detections_in = detections.len();
    let store = detections.clean(config)?;
    info!(
        "Linking {} detections across {} frames",
        store.len(),
        store.num_frames()
    );

    let checkpoints = match &config.checkpoint_dir {
        Some(dir) => Some(CheckpointDir::create(dir)?),
        None => None,
    };
    let fingerprint = config.projection_fingerprint();
    let chunks = frame_chunks(store.frames(), config.chunk_frames);

    let outcomes = chunks
        .par_iter()
        .map(|&chunk| {
            process_chunk(
                &store,
                ellipses,
                chunk,
                checkpoints.as_ref(),
                fingerprint,
                config,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut stats = LinkStats {
        detections_in,
        detections_cleaned: store.len(),
        chunks: outcomes.len(),
        ..Default::default()
    };
    let mut projected = Vec::new();
    for outcome in outcomes {
        stats.candidates += outcome.candidates;
        stats.consistent += outcome.consistent;
        stats.chunks_resumed += outcome.resumed as usize;
        projected.extend(outcome.tracklets);
    }
    stats.projected = projected.len() as u64;
    info!(
        "{} candidates -> {} consistent -> {} projected ({} of {} chunks resumed)",
        stats.candidates, stats.consistent, stats.projected, stats.chunks_resumed, stats.chunks
    );

    let mut tracklets = scorer::score(projected, config);
    let report = truth.map(|truth| {
        label(&mut tracklets, truth);
        HitReport::compute(&tracklets, truth)
    });

    Ok(LinkResult {
        tracklets,
        report,
        stats,
        link_time_ms: start.elapsed().as_secs_f32() * 1000.0,
    })
}
