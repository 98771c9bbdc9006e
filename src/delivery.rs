use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::foundation::error::{StickerError, StickerResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryKind {
    Container,
    Document,
}

/// One finished asset handed to a sink. `index` is the 0-based pack position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery<'a> {
    Sticker {
        index: usize,
        bytes: &'a [u8],
    },
    Document {
        index: usize,
        bytes: &'a [u8],
        mime_type: &'a str,
        file_name: &'a str,
    },
}

impl Delivery<'_> {
    pub fn kind(&self) -> DeliveryKind {
        match self {
            Self::Sticker { .. } => DeliveryKind::Container,
            Self::Document { .. } => DeliveryKind::Document,
        }
    }

    pub fn index(&self) -> usize {
        match *self {
            Self::Sticker { index, .. } | Self::Document { index, .. } => index,
        }
    }
}

/// Sink contract for finished assets.
///
/// Ordering contract: `deliver` is called in pack order, between one `begin` and one `end`.
/// A `deliver` error costs only that asset.
pub trait DeliverySink {
    fn begin(&mut self, pack_id: &str, total: usize) -> StickerResult<()>;
    fn deliver(&mut self, item: Delivery<'_>) -> StickerResult<()>;
    fn end(&mut self) -> StickerResult<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveredItem {
    pub index: usize,
    pub kind: DeliveryKind,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pack: Option<(String, usize)>,
    items: Vec<DeliveredItem>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack id and asset count captured in `begin`, if any.
    pub fn pack(&self) -> Option<(&str, usize)> {
        self.pack.as_ref().map(|(id, n)| (id.as_str(), *n))
    }

    pub fn items(&self) -> &[DeliveredItem] {
        &self.items
    }

    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl DeliverySink for InMemorySink {
    fn begin(&mut self, pack_id: &str, total: usize) -> StickerResult<()> {
        self.pack = Some((pack_id.to_string(), total));
        self.items.clear();
        self.ended = false;
        Ok(())
    }

    fn deliver(&mut self, item: Delivery<'_>) -> StickerResult<()> {
        let (kind, index) = (item.kind(), item.index());
        let delivered = match item {
            Delivery::Sticker { bytes, .. } => DeliveredItem {
                index,
                kind,
                bytes: bytes.to_vec(),
                mime_type: None,
                file_name: None,
            },
            Delivery::Document {
                bytes,
                mime_type,
                file_name,
                ..
            } => DeliveredItem {
                index,
                kind,
                bytes: bytes.to_vec(),
                mime_type: Some(mime_type.to_string()),
                file_name: Some(file_name.to_string()),
            },
        };
        self.items.push(delivered);
        Ok(())
    }

    fn end(&mut self) -> StickerResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Writes stickers as `NNN.webp` and documents under their own file name.
///
/// Each file is written to a temporary sibling and renamed into place, so an interrupted run
/// never leaves a truncated file behind.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in delivery order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn file_name(item: &Delivery<'_>) -> StickerResult<String> {
        match *item {
            Delivery::Sticker { index, .. } => Ok(format!("{:03}.webp", index + 1)),
            Delivery::Document { file_name, .. } => {
                let name = Path::new(file_name)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        StickerError::delivery(format!("invalid document name '{file_name}'"))
                    })?;
                Ok(name.to_string())
            }
        }
    }
}

impl DeliverySink for DirectorySink {
    fn begin(&mut self, pack_id: &str, total: usize) -> StickerResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StickerError::delivery(format!("create '{}': {e}", self.dir.display()))
        })?;
        debug!(pack_id, total, dir = %self.dir.display(), "writing pack to directory");
        self.written.clear();
        Ok(())
    }

    fn deliver(&mut self, item: Delivery<'_>) -> StickerResult<()> {
        let path = self.dir.join(Self::file_name(&item)?);
        let bytes = match item {
            Delivery::Sticker { bytes, .. } | Delivery::Document { bytes, .. } => bytes,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| StickerError::delivery(format!("temp file in '{}': {e}", self.dir.display())))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StickerError::delivery(format!("write '{}': {e}", path.display())))?;
        tmp.persist(&path)
            .map_err(|e| StickerError::delivery(format!("rename to '{}': {}", path.display(), e.error)))?;

        debug!(path = %path.display(), bytes = bytes.len(), "written");
        self.written.push(path);
        Ok(())
    }

    fn end(&mut self) -> StickerResult<()> {
        Ok(())
    }
}
