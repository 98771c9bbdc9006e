//! External conversion engine boundary.
//!
//! The transcoder only talks to [`MediaEngine`]; [`ffmpeg::ExternalEngine`] backs it with the
//! system `ffmpeg` plus an external Lottie renderer.

pub mod ffmpeg;
pub mod lottie;
pub mod process;

use std::path::Path;

use crate::foundation::core::Dimensions;
use crate::foundation::error::StickerResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    /// Single frame, RGBA pixel path.
    Still,
    /// Looping animation; `fps` forces an output rate, `None` keeps the source timing.
    Animated { fps: Option<u32> },
}

/// One raster -> WebP conversion.
#[derive(Clone, Copy, Debug)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub target: Dimensions,
    pub quality: u8,
    pub motion: Motion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorTarget {
    /// Intermediate GIF frame sequence, re-encoded afterwards.
    FrameSequence,
    /// Direct single-pass WebP.
    Container,
}

impl VectorTarget {
    pub fn extension(self) -> &'static str {
        match self {
            Self::FrameSequence => "gif",
            Self::Container => "webp",
        }
    }
}

/// A successful call leaves a non-empty file at the requested output path.
pub trait MediaEngine {
    fn encode(&self, req: &EncodeRequest<'_>) -> StickerResult<()>;

    fn render_vector(&self, input: &Path, output: &Path, target: VectorTarget)
    -> StickerResult<()>;
}
