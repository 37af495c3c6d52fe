//! # lunatrack
//!
//! **Tracklet linking and trajectory scoring** for moon-transit bird tracking.
//!
//! Birds crossing the lunar disk are filmed through a telescope; an upstream
//! contour extractor turns each video frame into a noisy list of moving-object
//! candidates. `lunatrack` takes those per-frame detections, links them into
//! short 3-frame motion segments ("tracklets"), keeps only the self-consistent
//! ones, projects each onto the fitted moon disk, and scores it by how many later
//! tracklets continue along the same path. Every tracklet is then labeled
//! against ground-truth bird intervals, giving a feature table for downstream
//! classification plus a hit/miss report.
//!
//! ## Features
//!
//! - **Cleaning**: frame cutoff, radius floor, per-frame crowding cap, hot-pixel
//!   suppression and exact-duplicate collapse
//! - **Lazy linking**: candidate triples are generated and filtered on the fly,
//!   never materializing the full cross product
//! - **Ellipse projection**: closed-form exit point of each heading line on a
//!   rotated ellipse
//! - **Binary-search windows**: corroboration windows come from a frame-sorted
//!   table, not a rescan
//! - **Parallel and resumable**: frame chunks are processed with
//!   [rayon](https://docs.rs/rayon) and checkpointed with [rkyv](https://docs.rs/rkyv)
//!
//! ## Example
//!
//! ```no_run
//! use lunatrack::{inputs, link, DetectionStore, GroundTruth, LinkConfig};
//!
//! let detections = inputs::load_detections("data/contours.csv").unwrap();
//! let ellipses = inputs::load_ellipses("data/moon_ellipses.csv").unwrap();
//! let truth = inputs::load_ground_truth("data/birds.csv").unwrap();
//! let truth = GroundTruth::new(truth.rows);
//!
//! let config = LinkConfig {
//!     checkpoint_dir: Some("data/checkpoints".into()),
//!     ..Default::default()
//! };
//!
//! let store = DetectionStore::new(detections.rows);
//! let result = link(store, &ellipses, Some(&truth), &config).unwrap();
//! lunatrack::output::write_tracklets("data/tracklets.csv", &result.tracklets).unwrap();
//! if let Some(report) = &result.report {
//!     println!("Hit rate {:.1}%", report.hit_rate * 100.0);
//! }
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Clean**: drop late frames, tiny contours and crowded frames; collapse
//!    duplicates keeping the largest radius
//! 2. **Build**: for each frame `f`, pair every detection at `f` with every one
//!    at `f-1` and `f-2`
//! 3. **Filter**: keep triples whose two legs agree in heading and length and
//!    whose radii agree pairwise
//! 4. **Project**: average speed, heading and radius; intersect the heading line
//!    with the moon ellipse for that frame
//! 5. **Corroborate**: count later tracklets, within a few frames, that continue
//!    the heading line
//! 6. **Label**: mark tracklets whose frame falls in a ground-truth interval
//!

pub mod detection;
pub mod ellipse;
pub mod error;
pub mod inputs;
pub mod linker;
pub mod output;
pub mod store;
pub mod tracklet;

pub use detection::*;
pub use ellipse::{Ellipse, EllipseTable};
pub use error::{Error, ErrorKind, Result};
pub use linker::{
    link, CorroborationMode, GroundTruth, HitReport, LinkConfig, LinkResult, LinkStats,
    MaxTravel, Tolerance, TruthInterval,
};
pub use store::DetectionStore;
pub use tracklet::*;

// Geometry is done in 64-bit; detections are stored in 32-bit.
pub type Vector2 = nalgebra::Vector2<f64>;
