//! Per-chunk checkpoints of projected tracklets.
//!
//! Each frame chunk is written as its own rkyv file, `chunk-{id:06}.rkyv`, so a
//! failed or interrupted run keeps every chunk it finished. A file is reused
//! only when its format version, configuration fingerprint and input digest
//! all match the current run; anything else is recomputed and overwritten.

use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::tracklet::ProjectedTracklet;
use crate::{DetectionStore, EllipseTable};

/// Bumped whenever the checkpoint layout or tracklet records change.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct ChunkCheckpoint {
    pub version: u32,
    pub chunk_id: u32,
    /// First and last anchor frame of the chunk, inclusive.
    pub first_frame: u32,
    pub last_frame: u32,
    pub config_fingerprint: u64,
    pub input_digest: u64,
    /// Candidate triples the builder produced for this chunk.
    pub candidates: u64,
    /// Triples that passed the consistency filter.
    pub consistent: u64,
    pub tracklets: Vec<ProjectedTracklet>,
}

impl ChunkCheckpoint {
    /// Serialize the checkpoint to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|b| b.to_vec())
            .map_err(|e| Error::CorruptCheckpoint {
                path: PathBuf::from(format!("<chunk {}>", self.chunk_id)),
                reason: format!("rkyv serialization failed: {e}"),
            })
    }

    /// Write atomically: to a temporary sibling, then rename into place.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.to_rkyv_bytes()?;
        let tmp = path.with_extension("rkyv.tmp");
        fs::write(&tmp, &bytes).map_err(|e| Error::resource(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::resource(path, e))?;
        debug!(
            "Saved chunk {} to {} ({} bytes)",
            self.chunk_id,
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    /// Load a checkpoint from an rkyv file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| Error::resource(path, e))?;
        let mut bytes = rkyv::util::AlignedVec::<16>::with_capacity(raw.len());
        bytes.extend_from_slice(&raw);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&bytes).map_err(|e| {
            Error::CorruptCheckpoint {
                path: path.to_path_buf(),
                reason: format!("rkyv deserialization failed: {e}"),
            }
        })
    }
}

/// Digest of everything a chunk's tracklets are computed from: detections in
/// anchor frames and their two predecessors, plus the ellipses of the anchor
/// frames.
pub fn input_digest(
    store: &DetectionStore,
    ellipses: &EllipseTable,
    first_frame: u32,
    last_frame: u32,
) -> u64 {
    let mut h = DefaultHasher::new();
    for frame in first_frame.saturating_sub(2)..=last_frame {
        for d in store.frame(frame) {
            d.frame.hash(&mut h);
            d.x.to_bits().hash(&mut h);
            d.y.to_bits().hash(&mut h);
            d.radius.to_bits().hash(&mut h);
            d.focus.to_bits().hash(&mut h);
            d.perimeter.to_bits().hash(&mut h);
            d.frame_density.hash(&mut h);
            d.duplicates.hash(&mut h);
        }
    }
    for frame in first_frame..=last_frame {
        if let Ok(e) = ellipses.get(frame) {
            e.frame.hash(&mut h);
            for v in [e.center_x, e.center_y, e.semi_major, e.semi_minor, e.theta_deg] {
                v.to_bits().hash(&mut h);
            }
        }
    }
    h.finish()
}

/// A directory of chunk checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointDir {
    dir: PathBuf,
}

impl CheckpointDir {
    /// Open (creating if needed) a checkpoint directory.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::resource(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn chunk_path(&self, chunk_id: u32) -> PathBuf {
        self.dir.join(format!("chunk-{chunk_id:06}.rkyv"))
    }

    /// The stored chunk, if present and computed from the same inputs.
    ///
    /// Stale and unreadable files are reported and treated as absent.
    pub fn load_current(
        &self,
        chunk_id: u32,
        config_fingerprint: u64,
        input_digest: u64,
    ) -> Option<ChunkCheckpoint> {
        let path = self.chunk_path(chunk_id);
        if !path.exists() {
            return None;
        }
        match ChunkCheckpoint::load_from_file(&path) {
            Ok(ck)
                if ck.version == CHECKPOINT_VERSION
                    && ck.chunk_id == chunk_id
                    && ck.config_fingerprint == config_fingerprint
                    && ck.input_digest == input_digest =>
            {
                debug!("Resuming chunk {} from {}", chunk_id, path.display());
                Some(ck)
            }
            Ok(_) => {
                warn!("Stale checkpoint {}; recomputing", path.display());
                None
            }
            Err(e) => {
                warn!("{}; recomputing", e);
                None
            }
        }
    }

    pub fn save(&self, chunk: &ChunkCheckpoint) -> Result<()> {
        chunk.save_to_file(&self.chunk_path(chunk.chunk_id))
    }
}
