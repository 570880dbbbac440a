//! Engagement workflow: trailheads, focus shifts and the Six Fs.

pub mod six_fs;
pub mod trailhead;

pub use six_fs::{SixFs, SixFsResult, SixFsStep};
pub use trailhead::{FocusShift, Trailhead, TrailheadKind, TrailheadLog};
