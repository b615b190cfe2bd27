use std::path::Path;
use std::process::Command;

/// Command that opens `path` with the platform's default player.
fn opener(path: &Path) -> Option<Command> {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        Some(cmd)
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        Some(cmd)
    } else if cfg!(unix) {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        Some(cmd)
    } else {
        None
    }
}

/// Open the video without waiting for the player to exit.
pub fn play_video(path: &Path) -> anyhow::Result<()> {
    let Some(mut cmd) = opener(path) else {
        anyhow::bail!("No default player known for this platform");
    };
    cmd.spawn()
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?;
    Ok(())
}
