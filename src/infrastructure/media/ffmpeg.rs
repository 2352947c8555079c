use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::process::Command;
use tracing::{debug, info};

/// Seek offset for the thumbnail frame.
const THUMBNAIL_SEEK: &str = "00:00:10";

/// Lines of encoder stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwAccel {
    Cpu,
    Vaapi,
}

impl FromStr for HwAccel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "none" | "" => Ok(HwAccel::Cpu),
            "vaapi" | "qsv" => Ok(HwAccel::Vaapi),
            other => Err(format!("unknown hardware acceleration mode '{other}'")),
        }
    }
}

/// Thin wrapper over the ffmpeg binary: one frame grab, one encode.
#[derive(Clone, Debug)]
pub struct MediaTools {
    ffmpeg: PathBuf,
    hw_accel: HwAccel,
}

impl MediaTools {
    pub fn new(ffmpeg: impl Into<PathBuf>, hw_accel: HwAccel) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            hw_accel,
        }
    }

    pub async fn extract_frame(&self, input: &Path, output: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-ss".into(),
            THUMBNAIL_SEEK.into(),
            "-i".into(),
            input.into(),
            "-vframes".into(),
            "1".into(),
            "-q:v".into(),
            "2".into(),
            "-y".into(),
            output.into(),
        ];
        self.run(args).await
    }

    /// Encodes `input` into `output`. The encoder writes to a sibling
    /// `.part.mp4` file first so a failed run never leaves a truncated output
    /// behind under the final name.
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let partial = output.with_extension("part.mp4");
        let args = self.transcode_args(input, &partial);

        info!("Encoding {} ({:?})", input.display(), self.hw_accel);
        if let Err(e) = self.run(args).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, output)
            .await
            .with_context(|| format!("Failed to move encoded file into {}", output.display()))?;
        Ok(())
    }

    fn transcode_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self.hw_accel {
            HwAccel::Vaapi => {
                args.extend(["-vaapi_device".into(), "/dev/dri/renderD128".into()]);
                args.extend(["-i".into(), input.into()]);
                args.extend([
                    "-vf".into(),
                    "format=nv12,hwupload,scale_vaapi=w='min(iw,1920)':h='min(ih,1080)'".into(),
                    "-c:v".into(),
                    "h264_vaapi".into(),
                ]);
            }
            HwAccel::Cpu => {
                args.extend(["-i".into(), input.into()]);
                args.extend([
                    "-c:v".into(),
                    "libx264".into(),
                    "-preset".into(),
                    "fast".into(),
                    "-crf".into(),
                    "23".into(),
                    "-vf".into(),
                    "scale=w='min(iw,1920)':h='min(ih,1080)':force_original_aspect_ratio=decrease:force_divisible_by=2".into(),
                ]);
            }
        }
        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "128k".into(),
            "-movflags".into(),
            "+faststart".into(),
            "-y".into(),
            output.into(),
        ]);
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<()> {
        debug!("Running {} {:?}", self.ffmpeg.display(), args);
        let output = Command::new(&self.ffmpeg)
            .arg("-hide_banner")
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", self.ffmpeg.display()))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        Err(anyhow!("ffmpeg exited with {}: {}", output.status, tail))
    }
}
