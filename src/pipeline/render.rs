//! The external renderer.
//!
//! Rendering is a blocking subprocess with a wall-clock timeout. Failures are
//! plain text (clipped to head and tail) so they can go straight to the
//! classifier.

use crate::config::Config;
use crate::util::{run_command_with_timeout, tail_chars, truncate_error};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

pub const VIDEO_FILE: &str = "video.mp4";
const OUTPUT_TAIL_CHARS: usize = 500;

/// A failed render: the error text and the script that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub message: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Success { artifact: PathBuf },
    Failure { message: String },
}

impl RenderOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Turns a scene file into a video inside `output_dir`.
pub trait Renderer {
    fn render(&self, scene_file: &Path, output_dir: &Path) -> RenderOutcome;
}

/// Runs `<program> <scene_file> <scene_class> -w`.
#[derive(Debug, Clone)]
pub struct ManimRenderer {
    program: String,
    scene_class: String,
    working_dir: PathBuf,
    videos_dir: PathBuf,
    timeout: Duration,
}

impl ManimRenderer {
    pub fn new(
        program: impl Into<String>,
        scene_class: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        videos_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        let working_dir = working_dir.into();
        let videos_dir = videos_dir.into();
        let videos_dir = if videos_dir.is_absolute() {
            videos_dir
        } else {
            working_dir.join(videos_dir)
        };
        Self {
            program: program.into(),
            scene_class: scene_class.into(),
            working_dir,
            videos_dir,
            timeout,
        }
    }

    pub fn from_config(config: &Config, working_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            config.renderer_program.clone(),
            config.scene_class.clone(),
            working_dir,
            config.videos_dir.clone(),
            config.render_timeout(),
        )
    }
}

impl Renderer for ManimRenderer {
    fn render(&self, scene_file: &Path, output_dir: &Path) -> RenderOutcome {
        let started = SystemTime::now();
        let mut cmd = Command::new(&self.program);
        cmd.arg(scene_file)
            .arg(&self.scene_class)
            .arg("-w")
            .current_dir(&self.working_dir);

        tracing::debug!(
            program = %self.program,
            scene = %scene_file.display(),
            "starting renderer"
        );
        let result = match run_command_with_timeout(&mut cmd, self.timeout) {
            Ok(result) => result,
            Err(e) => return RenderOutcome::failure(e),
        };

        if result.timed_out {
            return RenderOutcome::failure(format!(
                "Render timed out after {} seconds.",
                self.timeout.as_secs()
            ));
        }

        if !result.success() {
            let raw = if result.stderr.is_empty() {
                &result.stdout
            } else {
                &result.stderr
            };
            return RenderOutcome::failure(truncate_error(raw));
        }

        match collect_video(&self.videos_dir, started, output_dir) {
            Ok(Some(artifact)) => RenderOutcome::Success { artifact },
            Ok(None) => RenderOutcome::failure(format!(
                "Render exited with code 0 but no new .mp4 found in {}.\nstdout: {}\nstderr: {}",
                self.videos_dir.display(),
                or_empty(tail_chars(&result.stdout, OUTPUT_TAIL_CHARS)),
                or_empty(tail_chars(&result.stderr, OUTPUT_TAIL_CHARS)),
            )),
            Err(e) => RenderOutcome::failure(format!("Failed to collect rendered video: {}", e)),
        }
    }
}

fn or_empty(s: &str) -> &str {
    if s.is_empty() {
        "(empty)"
    } else {
        s
    }
}

/// Newest `.mp4` under `videos_dir` modified after `since`.
pub fn find_new_video(videos_dir: &Path, since: SystemTime) -> Option<PathBuf> {
    WalkDir::new(videos_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|ext| ext == "mp4").unwrap_or(false))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            (modified > since).then(|| (modified, e.into_path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Move the newest new video into `output_dir/video.mp4`.
fn collect_video(
    videos_dir: &Path,
    since: SystemTime,
    output_dir: &Path,
) -> std::io::Result<Option<PathBuf>> {
    let Some(found) = find_new_video(videos_dir, since) else {
        return Ok(None);
    };
    fs::create_dir_all(output_dir)?;
    let dest = output_dir.join(VIDEO_FILE);
    if fs::rename(&found, &dest).is_err() {
        fs::copy(&found, &dest)?;
        fs::remove_file(&found)?;
    }
    Ok(Some(dest))
}
