#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use stickerkit::config::RetryConfig;
use stickerkit::{
    AnimationFlags, CancelFlag, Credential, Delivery, DeliverySink, EncodeRequest, InMemorySink,
    LifecycleEvent, MediaEngine, Motion, PipelineConfig, PipelineObserver, ProviderError,
    RemotePack, RemoteSticker, StickerError, StickerResult, StickerSource, VectorTarget,
};

/// Small lossless WebP produced by the `image` encoder.
pub fn sample_webp(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 30, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::WebP)
        .unwrap();
    buf
}

/// Valid WebP of roughly `size` bytes: a real image plus an ignorable padding chunk.
pub fn webp_of_size(size: usize) -> Vec<u8> {
    let mut out = sample_webp(2, 2);
    let room = size.saturating_sub(out.len() + 8) & !1;
    out.extend_from_slice(b"PAD ");
    out.extend_from_slice(&(room as u32).to_le_bytes());
    out.resize(out.len() + room, 0);
    let riff = (out.len() - 8) as u32;
    out[4..8].copy_from_slice(&riff.to_le_bytes());
    out
}

pub fn gzip_json(json: &str) -> Vec<u8> {
    use std::io::Write;
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(json.as_bytes()).unwrap();
    enc.finish().unwrap()
}

pub fn tgs_bytes() -> Vec<u8> {
    gzip_json(r#"{"fr":60,"ip":0,"op":120,"w":512,"h":512,"layers":[]}"#)
}

pub fn static_sticker(file_ref: &str, emoji: &str) -> RemoteSticker {
    RemoteSticker {
        file_ref: file_ref.to_string(),
        thumb_ref: None,
        flags: AnimationFlags {
            is_animated: Some(false),
            is_video: Some(false),
            animated: None,
        },
        emojis: vec![emoji.to_string()],
    }
}

pub fn vector_sticker(file_ref: &str) -> RemoteSticker {
    RemoteSticker {
        file_ref: file_ref.to_string(),
        thumb_ref: Some(format!("{file_ref}-thumb")),
        flags: AnimationFlags {
            is_animated: Some(true),
            is_video: Some(false),
            animated: None,
        },
        emojis: vec![],
    }
}

pub fn pack(name: &str, title: &str, stickers: Vec<RemoteSticker>) -> RemotePack {
    RemotePack {
        name: name.to_string(),
        title: Some(title.to_string()),
        stickers,
    }
}

/// No waits between deliveries or retries; 10 KB budget.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        budget_bytes: 10_000,
        container_delay_ms: 0,
        document_delay_ms: 0,
        retry: RetryConfig {
            attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
        },
        ..PipelineConfig::default()
    }
}

/// Provider fake keyed by token (packs) and file reference (files). Every call is logged as
/// `set:<token>`, `locate:<token>:<ref>` or `download:<token>:<location>`.
#[derive(Default)]
pub struct ScriptedSource {
    sets: HashMap<String, Result<RemotePack, ProviderError>>,
    files: HashMap<String, (String, Vec<u8>)>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pack(mut self, token: &str, pack: RemotePack) -> Self {
        self.sets.insert(token.to_string(), Ok(pack));
        self
    }

    pub fn with_set_error(mut self, token: &str, err: ProviderError) -> Self {
        self.sets.insert(token.to_string(), Err(err));
        self
    }

    pub fn with_file(mut self, file_ref: &str, location: &str, bytes: Vec<u8>) -> Self {
        self.files
            .insert(file_ref.to_string(), (location.to_string(), bytes));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn log(&self, entry: String) {
        self.calls.borrow_mut().push(entry);
    }
}

impl StickerSource for ScriptedSource {
    fn sticker_set(&self, credential: &Credential, name: &str) -> Result<RemotePack, ProviderError> {
        self.log(format!("set:{}", credential.expose()));
        let result = match self.sets.get(credential.expose()) {
            Some(result) => result.clone(),
            None => Err(ProviderError::Unauthorized),
        };
        result.map(|mut p| {
            p.name = name.to_string();
            p
        })
    }

    fn file_location(&self, credential: &Credential, file_ref: &str) -> Result<String, ProviderError> {
        self.log(format!("locate:{}:{file_ref}", credential.expose()));
        self.files
            .get(file_ref)
            .map(|(location, _)| location.clone())
            .ok_or_else(|| ProviderError::Malformed(format!("no file '{file_ref}'")))
    }

    fn download(&self, credential: &Credential, location: &str) -> Result<Vec<u8>, ProviderError> {
        self.log(format!("download:{}:{location}", credential.expose()));
        self.files
            .values()
            .find(|(loc, _)| loc == location)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ProviderError::NotFound(location.to_string()))
    }
}

/// Engine fake: every encode writes a valid WebP of `size(quality, motion)` bytes, `None` fails.
pub struct ScriptedEngine {
    size: Box<dyn Fn(u8, Motion) -> Option<usize>>,
    pub render_frames: bool,
    pub render_direct: bool,
    calls: RefCell<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(size: impl Fn(u8, Motion) -> Option<usize> + 'static) -> Self {
        Self {
            size: Box::new(size),
            render_frames: true,
            render_direct: true,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Fails every call.
    pub fn broken() -> Self {
        let mut engine = Self::new(|_, _| None);
        engine.render_frames = false;
        engine.render_direct = false;
        engine
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl MediaEngine for ScriptedEngine {
    fn encode(&self, req: &EncodeRequest<'_>) -> StickerResult<()> {
        let label = match req.motion {
            Motion::Animated { fps: Some(fps) } => format!("encode q{}@{fps}", req.quality),
            Motion::Animated { fps: None } => format!("encode q{}", req.quality),
            Motion::Still => format!("encode q{} still", req.quality),
        };
        self.calls.borrow_mut().push(label);
        match (self.size)(req.quality, req.motion) {
            Some(n) => {
                std::fs::write(req.output, webp_of_size(n))?;
                Ok(())
            }
            None => Err(StickerError::transcode("scripted encoder failure")),
        }
    }

    fn render_vector(&self, input: &Path, output: &Path, target: VectorTarget) -> StickerResult<()> {
        self.calls.borrow_mut().push(format!("render {target:?}"));
        assert!(input.exists(), "vector input must be staged before rendering");
        let ok = match target {
            VectorTarget::FrameSequence => self.render_frames,
            VectorTarget::Container => self.render_direct,
        };
        if !ok {
            return Err(StickerError::transcode("scripted renderer failure"));
        }
        let bytes = match target {
            VectorTarget::FrameSequence => b"GIF89a-frames".to_vec(),
            VectorTarget::Container => webp_of_size(2_000),
        };
        std::fs::write(output, bytes)?;
        Ok(())
    }
}

/// Records every lifecycle event as a short string; optionally trips a cancel flag once
/// `cancel_after` assets have been delivered.
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<String>>,
    cancel: Option<(CancelFlag, usize)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(flag: CancelFlag, delivered: usize) -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            cancel: Some((flag, delivered)),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        let line = match *event {
            LifecycleEvent::FetchStart { asset } => format!("{asset} fetch"),
            LifecycleEvent::Classified { asset, kind } => format!("{asset} classified {kind}"),
            LifecycleEvent::TranscodeAttempt { asset, tier } => format!("{asset} attempt {tier}"),
            LifecycleEvent::Delivered { asset, via, .. } => format!("{asset} delivered {via:?}"),
            LifecycleEvent::Skipped { asset, .. } => format!("{asset} skipped"),
        };
        self.events.borrow_mut().push(line);

        if let (LifecycleEvent::Delivered { .. }, Some((flag, after))) = (event, &self.cancel) {
            let delivered = self
                .events
                .borrow()
                .iter()
                .filter(|e| e.contains("delivered"))
                .count();
            if delivered >= *after {
                flag.cancel();
            }
        }
    }
}

/// In-memory sink that refuses the asset at `fail_at` (0-based) with `error()`.
pub struct FailingSink {
    pub inner: InMemorySink,
    fail_at: usize,
    error: fn() -> StickerError,
}

impl FailingSink {
    pub fn new(fail_at: usize) -> Self {
        Self {
            inner: InMemorySink::new(),
            fail_at,
            error: || StickerError::delivery("upload rejected"),
        }
    }

    pub fn with_error(mut self, error: fn() -> StickerError) -> Self {
        self.error = error;
        self
    }
}

impl DeliverySink for FailingSink {
    fn begin(&mut self, pack_id: &str, total: usize) -> StickerResult<()> {
        self.inner.begin(pack_id, total)
    }

    fn deliver(&mut self, item: Delivery<'_>) -> StickerResult<()> {
        if item.index() == self.fail_at {
            return Err((self.error)());
        }
        self.inner.deliver(item)
    }

    fn end(&mut self) -> StickerResult<()> {
        self.inner.end()
    }
}
