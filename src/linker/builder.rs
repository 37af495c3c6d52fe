//! Candidate triple generation.
//!
//! For an anchor frame `f` the candidates are every combination of one
//! detection from `f`, one from `f-1` and one from `f-2`. The combinations are
//! produced lazily so the consistency filter can discard them as they come,
//! and the raw cross product is never held in memory.

use crate::{Detection, DetectionStore};

/// A candidate `[d0, d1, d2]`, newest first.
pub type Triple<'a> = [&'a Detection; 3];

/// Whether frame `f` is skipped outright: `f-1` has no detections while `f-2`
/// does.
///
/// When both predecessors are empty the cross product is already empty, so
/// in effect no frame yields triples unless `f-1` and `f-2` both have
/// detections.
pub fn skips_frame(store: &DetectionStore, frame: u32) -> bool {
    frame >= 2 && !store.has_frame(frame - 1) && store.has_frame(frame - 2)
}

/// Lazily enumerate the candidate triples anchored at `frame`.
pub fn frame_triples(store: &DetectionStore, frame: u32) -> impl Iterator<Item = Triple<'_>> + '_ {
    let (current, prev, prev2): (&[Detection], &[Detection], &[Detection]) =
        if frame < 2 || skips_frame(store, frame) {
            (&[], &[], &[])
        } else {
            (
                store.frame(frame),
                store.frame(frame - 1),
                store.frame(frame - 2),
            )
        };
    current.iter().flat_map(move |d0| {
        prev.iter()
            .flat_map(move |d1| prev2.iter().map(move |d2| [d0, d1, d2]))
    })
}

/// Number of triples `frame_triples` yields for `frame`, without enumerating them.
pub fn frame_triple_count(store: &DetectionStore, frame: u32) -> u64 {
    if frame < 2 || skips_frame(store, frame) {
        return 0;
    }
    store.frame(frame).len() as u64
        * store.frame(frame - 1).len() as u64
        * store.frame(frame - 2).len() as u64
}

/// Lazily enumerate candidate triples for a run of anchor frames.
pub fn chunk_triples<'a>(
    store: &'a DetectionStore,
    frames: &'a [u32],
) -> impl Iterator<Item = Triple<'a>> + 'a {
    frames.iter().flat_map(move |&f| frame_triples(store, f))
}
