//! The per-run output directory.

use super::render::VIDEO_FILE;
use crate::error::{PipelineError, PipelineResult};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

pub const PLAN_FILE: &str = "plan.txt";

/// Directory name used when the caller does not pick one.
pub fn timestamp_dir_name() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `<output_root>/<name>`: plan, one scene file per render attempt, the video
/// and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDir {
    path: PathBuf,
    name: String,
}

impl ArtifactDir {
    pub fn create(output_root: &Path, name: Option<&str>) -> PipelineResult<Self> {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => timestamp_dir_name(),
        };
        let path = output_root.join(&name);
        fs::create_dir_all(&path)
            .map_err(|e| PipelineError::io(format!("create {}: {}", path.display(), e)))?;
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn save_plan(&self, plan: &str) -> PipelineResult<PathBuf> {
        self.write(PLAN_FILE, plan)
    }

    /// Write `scene_v<attempt>.py`.
    pub fn write_scene(&self, source: &str, attempt: usize) -> PipelineResult<PathBuf> {
        self.write(&format!("scene_v{}.py", attempt), source)
    }

    pub fn video_path(&self) -> PathBuf {
        self.path.join(VIDEO_FILE)
    }

    fn write(&self, file: &str, contents: &str) -> PipelineResult<PathBuf> {
        let target = self.path.join(file);
        fs::write(&target, contents)
            .map_err(|e| PipelineError::io(format!("write {}: {}", target.display(), e)))?;
        Ok(target)
    }
}
