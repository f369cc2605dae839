//! One-shot ffmpeg invocations: audio extraction, muxing, ladder transcodes,
//! and NSFW sample-frame extraction.
//!
//! Argument sets follow the service's established encodes (libx264 + mp3);
//! bit-exact output is a non-goal, exit codes decide success.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{ToolError, command};

async fn run(mut cmd: tokio::process::Command, tool: &'static str) -> Result<(), ToolError> {
    let output = cmd
        .output()
        .await
        .map_err(|source| ToolError::Spawn { tool, source })?;
    if !output.status.success() {
        return Err(ToolError::Failed {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Whether the input has an audio stream at all.
async fn has_audio_stream(input: &Path) -> Result<bool, ToolError> {
    let output = command::ffprobe()
        .args(["-v", "error", "-select_streams", "a:0"])
        .args(["-show_entries", "stream=index", "-of", "csv=p=0"])
        .arg(input)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            tool: "ffprobe",
            source,
        })?;
    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
}

/// Extract the first audio track to mp3, or return `None` for silent sources.
pub async fn extract_audio(input: &Path, output: &Path) -> Result<Option<PathBuf>, ToolError> {
    if !has_audio_stream(input).await? {
        debug!(input = %input.display(), "no audio stream to extract");
        return Ok(None);
    }

    let mut cmd = command::ffmpeg();
    cmd.args(["-y", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "mp3", "-f", "mp3", "-loglevel", "error"])
        .arg(output);
    run(cmd, "ffmpeg").await?;
    info!(output = %output.display(), "audio track extracted");
    Ok(Some(output.to_path_buf()))
}

/// Re-encode `video` at the given CRF, muxing `audio` back in when present.
pub async fn mux(
    video: &Path,
    audio: Option<&Path>,
    output: &Path,
    crf: u8,
) -> Result<(), ToolError> {
    let mut cmd = command::ffmpeg();
    cmd.args(["-y", "-i"]).arg(video);
    match audio {
        Some(audio) => {
            cmd.arg("-i")
                .arg(audio)
                .args(["-c:v", "libx264", "-preset", "medium", "-crf"])
                .arg(crf.to_string())
                .args(["-c:a", "mp3", "-b:a", "192k"])
                .args(["-map", "0:v:0", "-map", "1:a:0?"]);
        }
        None => {
            cmd.args(["-c:v", "libx264", "-preset", "medium", "-crf"])
                .arg(crf.to_string())
                .arg("-an");
        }
    }
    cmd.args(["-loglevel", "error"]).arg(output);
    run(cmd, "ffmpeg").await?;
    info!(output = %output.display(), crf, "streams muxed");
    Ok(())
}

/// Scale-and-reencode one quality-ladder rung.
pub async fn transcode_scale(
    src: &Path,
    dst: &Path,
    height: u32,
    crf: u8,
) -> Result<(), ToolError> {
    let mut cmd = command::ffmpeg();
    cmd.args(["-y", "-i"])
        .arg(src)
        .args(["-map", "0:v:0", "-c:v", "libx264", "-crf"])
        .arg(crf.to_string())
        .args(["-vf"])
        .arg(format!("scale=-2:{height}"))
        .args(["-map", "0:a?", "-c:a", "mp3", "-b:a", "128k"])
        .args(["-fflags", "+genpts", "-loglevel", "error"])
        .arg(dst);
    run(cmd, "ffmpeg").await?;
    info!(dst = %dst.display(), height, crf, "rung transcoded");
    Ok(())
}

/// Dump one PNG every `interval_secs` seconds into `dir`, returning the
/// frame paths in presentation order.
pub async fn sample_frames(
    input: &Path,
    dir: &Path,
    interval_secs: f64,
) -> Result<Vec<PathBuf>, ToolError> {
    let interval_secs = if interval_secs > 0.0 { interval_secs } else { 1.0 };
    let pattern = dir.join("frame_%05d.png");
    let mut cmd = command::ffmpeg();
    cmd.args(["-y", "-i"])
        .arg(input)
        .arg("-vf")
        .arg(format!("fps=1/{interval_secs}"))
        .args(["-loglevel", "error"])
        .arg(&pattern);
    run(cmd, "ffmpeg").await?;

    let frames = sorted_pngs(dir).await?;
    debug!(count = frames.len(), "sample frames extracted");
    Ok(frames)
}

/// The `%05d` pattern sorts lexicographically in frame order.
async fn sorted_pngs(dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sorted_pngs_orders_by_frame_number() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_00003.png", "frame_00001.png", "frame_00010.png", "skip.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let frames = sorted_pngs(dir.path()).await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["frame_00001.png", "frame_00003.png", "frame_00010.png"]);
    }
}
