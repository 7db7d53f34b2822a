//! Paths of the working artifacts for one video.

use std::path::{Path, PathBuf};

/// The on-disk artifacts a job owns under the working root.
///
/// For video id `V` under root `W`: `W/V.mp4`, `W/V.frag` and `W/V/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSet {
    root: PathBuf,
    video_id: String,
}

impl WorkingSet {
    pub fn new(root: impl Into<PathBuf>, video_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            video_id: video_id.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// The downloaded source, `<root>/<id>.mp4`.
    pub fn source_file(&self) -> PathBuf {
        self.root.join(format!("{}.mp4", self.video_id))
    }

    /// The fragmented intermediate, `<root>/<id>.frag`.
    pub fn fragment_file(&self) -> PathBuf {
        self.root.join(format!("{}.frag", self.video_id))
    }

    /// The packaging output directory, `<root>/<id>/`.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.video_id)
    }
}
