//! WebVTT rendering for transcripts.

use std::fmt::Write as _;

use crate::collaborators::TranscriptSegment;

/// Render segments as a WebVTT document, one cue per segment.
pub fn to_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for seg in segments {
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timestamp(seg.start_secs),
            format_timestamp(seg.end_secs)
        );
        out.push_str(seg.text.trim());
        out.push_str("\n\n");
    }
    out
}

/// `HH:MM:SS.mmm`, the WebVTT cue timestamp form. Negative inputs clamp to
/// zero rather than producing an invalid cue.
fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_secs: start,
            end_secs: end,
            text: text.to_string(),
        }
    }

    #[test]
    fn timestamps_are_zero_padded() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(1.5), "00:00:01.500");
        assert_eq!(format_timestamp(61.25), "00:01:01.250");
        assert_eq!(format_timestamp(3661.007), "01:01:01.007");
    }

    #[test]
    fn negative_start_clamps_to_zero() {
        assert_eq!(format_timestamp(-0.04), "00:00:00.000");
    }

    #[test]
    fn renders_header_and_cues() {
        let vtt = to_vtt(&[seg(0.0, 2.5, "hello"), seg(2.5, 4.0, " world ")]);
        assert_eq!(
            vtt,
            "WEBVTT\n\n00:00:00.000 --> 00:00:02.500\nhello\n\n00:00:02.500 --> 00:00:04.000\nworld\n\n"
        );
    }

    #[test]
    fn empty_transcript_is_just_the_header() {
        assert_eq!(to_vtt(&[]), "WEBVTT\n\n");
    }
}
