use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::encode::process::run_tool;
use crate::encode::{EncodeRequest, MediaEngine, Motion, VectorTarget};
use crate::foundation::core::Dimensions;
use crate::foundation::error::StickerResult;

/// `ffmpeg` for raster -> WebP, an external Lottie renderer for vector stickers.
///
/// We shell out to the system binaries instead of linking codec libraries, so nothing native
/// is needed at build time.
#[derive(Clone, Debug)]
pub struct ExternalEngine {
    pub ffmpeg: PathBuf,
    pub renderer: PathBuf,
    pub timeout: Duration,
}

impl ExternalEngine {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            ffmpeg: cfg.ffmpeg_program.clone(),
            renderer: cfg.renderer_program.clone(),
            timeout: cfg.process_timeout(),
        }
    }
}

impl MediaEngine for ExternalEngine {
    fn encode(&self, req: &EncodeRequest<'_>) -> StickerResult<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(encode_args(req));
        debug!(quality = req.quality, motion = ?req.motion, "ffmpeg encode");
        run_tool(cmd, req.output, self.timeout).map(|_| ())
    }

    fn render_vector(
        &self,
        input: &Path,
        output: &Path,
        target: VectorTarget,
    ) -> StickerResult<()> {
        let mut cmd = Command::new(&self.renderer);
        cmd.arg(input).arg(output);
        debug!(?target, "vector render");
        run_tool(cmd, output, self.timeout).map(|_| ())
    }
}

/// Scale to fit, then pad with transparent borders to exactly `target`.
pub fn filter_chain(target: Dimensions, motion: Motion) -> String {
    let Dimensions { width, height } = target;
    let scale = format!("scale={width}:{height}:force_original_aspect_ratio=decrease");
    let pad = format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=#00000000");
    match motion {
        Motion::Still => format!("{scale},format=rgba,{pad}"),
        Motion::Animated { fps: Some(fps) } => format!("{scale},fps={fps},{pad}"),
        Motion::Animated { fps: None } => format!("{scale},{pad}"),
    }
}

pub fn encode_args(req: &EncodeRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(req.input.as_os_str().to_owned());
    args.extend(
        [
            "-vf".to_string(),
            filter_chain(req.target, req.motion),
            "-c:v".into(),
            "libwebp".into(),
            "-loop".into(),
            "0".into(),
            "-fps_mode".into(),
            "vfr".into(),
            "-pix_fmt".into(),
            "yuva420p".into(),
            "-quality".into(),
            req.quality.to_string(),
            "-compression_level".into(),
            "6".into(),
            "-f".into(),
            "webp".into(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(req.output.as_os_str().to_owned());
    args
}

pub fn is_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
