//! Media metadata probing via ffprobe's JSON output.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::{ToolError, command};

/// Fallback when the container reports no usable frame rate.
const DEFAULT_FPS: f64 = 30.0;

/// Source metadata the orchestrator plans a job around.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
    pub has_audio: bool,
}

/// Probe a media file. An unreadable or video-less file is an input error.
pub async fn probe(path: &Path) -> Result<MediaInfo, ToolError> {
    let output = command::ffprobe()
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            tool: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: "ffprobe",
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(?info, path = %path.display(), "probed source");
    Ok(info)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(bytes: &[u8]) -> Result<MediaInfo, ToolError> {
    let parsed: ProbeOutput = serde_json::from_slice(bytes).map_err(|e| ToolError::Probe {
        reason: format!("malformed ffprobe JSON: {e}"),
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ToolError::Probe {
            reason: "no video stream".into(),
        })?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ToolError::Probe {
                reason: "video stream has no dimensions".into(),
            });
        }
    };

    // avg_frame_rate is the container's average; fall back to the declared
    // rate, then to a sane default for streams reporting "0/0".
    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_fraction)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_fraction))
        .filter(|&f| f > 0.0)
        .unwrap_or(DEFAULT_FPS);

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        width,
        height,
        fps,
        duration_secs,
        has_audio,
    })
}

/// Parse an ffprobe rational like `"30000/1001"` (or a plain number).
fn parse_fraction(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => s.trim().parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_parsing() {
        assert_eq!(parse_fraction("25/1"), Some(25.0));
        let ntsc = parse_fraction("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_fraction("0/0"), None);
        assert_eq!(parse_fraction("24"), Some(24.0));
        assert_eq!(parse_fraction("garbage"), None);
    }

    #[test]
    fn parses_video_and_audio_streams() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720,
                 "avg_frame_rate": "30000/1001", "r_frame_rate": "30/1"},
                {"codec_type": "audio", "avg_frame_rate": "0/0", "r_frame_rate": "0/0"}
            ],
            "format": {"duration": "12.500000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!((info.duration_secs - 12.5).abs() < 1e-9);
        assert!(info.has_audio);
    }

    #[test]
    fn zero_frame_rate_falls_back_to_default() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 640, "height": 360,
                 "avg_frame_rate": "0/0", "r_frame_rate": "0/0", "duration": "3.0"}
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.fps, DEFAULT_FPS);
        assert!((info.duration_secs - 3.0).abs() < 1e-9);
        assert!(!info.has_audio);
    }

    #[test]
    fn zero_dimensions_are_a_probe_error() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 0, "height": 0,
                 "avg_frame_rate": "25/1", "r_frame_rate": "25/1"}
            ]
        }"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(ToolError::Probe { .. })
        ));
    }

    #[test]
    fn missing_video_stream_is_probe_error() {
        let json = br#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(ToolError::Probe { .. })
        ));
    }
}
