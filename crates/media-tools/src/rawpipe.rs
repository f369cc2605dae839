//! Raw RGB24 frame pipes over ffmpeg stdout/stdin.
//!
//! These are the frame pipeline's source and sink for real media: the decoder
//! streams `-f rawvideo -pix_fmt rgb24` from a child's stdout, the encoder
//! feeds the same layout into a child that writes H.264. Both are driven from
//! blocking pipeline stages, so plain `std::process` pipes fit; the bounded
//! queues upstream keep the pipe buffers from ballooning.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Stdio};

use bytes::Bytes;
use frame_pipeline::{Frame, FrameSink, FrameSource, PipelineError};
use tracing::debug;

use crate::{ToolError, command};

/// Streams decoded frames from a media file, in presentation order.
pub struct RawFrameDecoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    finished: bool,
}

impl RawFrameDecoder {
    /// Spawn the decoder. `width`/`height` come from a prior probe and fix
    /// the frame geometry on the pipe.
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self, ToolError> {
        let mut child = command::ffmpeg_std()
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        // Piped stdout is requested above; take cannot fail.
        let stdout = child.stdout.take().ok_or_else(|| ToolError::Probe {
            reason: "decoder child has no stdout".into(),
        })?;
        debug!(path = %path.display(), width, height, "frame decoder spawned");
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            width,
            height,
            finished: false,
        })
    }
}

impl FrameSource for RawFrameDecoder {
    fn read_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; Frame::byte_len(self.width, self.height)];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => Ok(Some(Frame::from_rgb24(
                self.width,
                self.height,
                Bytes::from(buf),
            )?)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                let status = self.child.wait()?;
                if status.success() {
                    Ok(None)
                } else {
                    Err(PipelineError::Io(std::io::Error::other(format!(
                        "ffmpeg decoder exited with {status}"
                    ))))
                }
            }
            Err(e) => Err(PipelineError::Io(e)),
        }
    }
}

impl Drop for RawFrameDecoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Encodes frames pushed in presentation order into an H.264 file.
pub struct RawFrameEncoder {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    width: u32,
    height: u32,
    finished: bool,
}

impl RawFrameEncoder {
    /// Spawn the encoder for frames of the given (already upscaled) geometry.
    pub fn create(dest: &Path, width: u32, height: u32, fps: f64) -> Result<Self, ToolError> {
        let mut child = command::ffmpeg_std()
            .args(["-y", "-v", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(format!("{fps}"))
            .args(["-i", "pipe:0"])
            .args(["-c:v", "libx264", "-preset", "medium", "-pix_fmt", "yuv420p"])
            .arg(dest)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        let stdin = child.stdin.take().ok_or_else(|| ToolError::Probe {
            reason: "encoder child has no stdin".into(),
        })?;
        debug!(dest = %dest.display(), width, height, fps, "frame encoder spawned");
        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            width,
            height,
            finished: false,
        })
    }
}

impl FrameSink for RawFrameEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(PipelineError::InvalidFrame {
                reason: format!(
                    "encoder expects {}x{}, got {}x{}",
                    self.width,
                    self.height,
                    frame.width(),
                    frame.height()
                ),
            });
        }
        let stdin = self.stdin.as_mut().ok_or(PipelineError::ChannelClosed(
            "encoder stdin already closed",
        ))?;
        stdin.write_all(frame.data())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        // Dropping stdin sends EOF; the child then finalizes the container.
        let status = self.child.wait()?;
        self.finished = true;
        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::Io(std::io::Error::other(format!(
                "ffmpeg encoder exited with {status}"
            ))))
        }
    }
}

impl Drop for RawFrameEncoder {
    fn drop(&mut self) {
        if !self.finished {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
