use std::io::Read;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::foundation::error::{StickerError, StickerResult};

/// Decompressed Lottie documents larger than this are refused.
const MAX_DOCUMENT_BYTES: u64 = 16 * 1024 * 1024;

/// Header fields of a Lottie animation. Diagnostics only; rendering does not depend on them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LottieInfo {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub in_point: f64,
    pub out_point: f64,
}

impl LottieInfo {
    pub fn frame_count(&self) -> f64 {
        (self.out_point - self.in_point).max(0.0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.frame_rate > 0.0 {
            self.frame_count() / self.frame_rate
        } else {
            0.0
        }
    }
}

#[derive(Deserialize)]
struct Header {
    fr: Option<f64>,
    w: Option<u32>,
    h: Option<u32>,
    ip: Option<f64>,
    op: Option<f64>,
}

/// Gunzip a `.tgs` payload and read the animation header.
pub fn probe(compressed: &[u8]) -> StickerResult<LottieInfo> {
    let mut json = Vec::new();
    GzDecoder::new(compressed)
        .take(MAX_DOCUMENT_BYTES + 1)
        .read_to_end(&mut json)
        .map_err(|e| StickerError::transcode(format!("gunzip vector sticker: {e}")))?;
    if json.len() as u64 > MAX_DOCUMENT_BYTES {
        return Err(StickerError::transcode("vector sticker document is too large"));
    }

    let h: Header = serde_json::from_slice(&json)
        .map_err(|e| StickerError::transcode(format!("parse vector sticker json: {e}")))?;
    Ok(LottieInfo {
        frame_rate: h.fr.unwrap_or(30.0),
        width: h.w.unwrap_or(512),
        height: h.h.unwrap_or(512),
        in_point: h.ip.unwrap_or(0.0),
        out_point: h.op.unwrap_or(60.0),
    })
}
