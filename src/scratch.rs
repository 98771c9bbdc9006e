//! Per-run scratch storage.
//!
//! Each asset borrows an [`AssetScratch`] that hands out one path per stage and deletes every
//! path it handed out when dropped, so all exits of the transcoder clean up the same way.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::foundation::error::StickerResult;

pub struct ScratchDir {
    root: TempDir,
}

impl ScratchDir {
    pub fn new() -> StickerResult<Self> {
        Ok(Self {
            root: tempfile::Builder::new().prefix("stickerkit-").tempdir()?,
        })
    }

    pub fn new_in(parent: &Path) -> StickerResult<Self> {
        Ok(Self {
            root: tempfile::Builder::new()
                .prefix("stickerkit-")
                .tempdir_in(parent)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn asset(&self, index: usize) -> AssetScratch<'_> {
        AssetScratch {
            dir: self.root.path(),
            index,
            issued: RefCell::new(Vec::new()),
        }
    }
}

pub struct AssetScratch<'a> {
    dir: &'a Path,
    index: usize,
    issued: RefCell<Vec<PathBuf>>,
}

impl AssetScratch<'_> {
    /// Distinct path for `(asset, stage)`. Nothing is created on disk.
    pub fn path(&self, stage: &str, ext: &str) -> PathBuf {
        let p = self
            .dir
            .join(format!("asset{:04}_{stage}.{ext}", self.index));
        self.issued.borrow_mut().push(p.clone());
        p
    }

    /// Best-effort delete of everything handed out so far.
    pub fn release(&self) {
        for p in self.issued.borrow_mut().drain(..) {
            match std::fs::remove_file(&p) {
                Ok(()) => debug!(path = %p.display(), "scratch file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %p.display(), error = %e, "scratch cleanup failed"),
            }
        }
    }
}

impl Drop for AssetScratch<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
