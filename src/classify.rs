//! Media classification.
//!
//! Descriptor flags decide whether an asset moves; the extension and magic bytes then separate
//! vector animations from raster ones. The declared kind alone is never trusted.

use image::ImageFormat;

use crate::foundation::core::{AssetDescriptor, FetchResult, MediaKind};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extension used by gzip-compressed Lottie stickers.
pub const VECTOR_EXTENSION: &str = "tgs";

/// The reference to download: animated assets need the real file, static ones prefer the
/// thumbnail when the provider offers one.
pub fn fetch_reference(descriptor: &AssetDescriptor) -> &str {
    if descriptor.flags.any_set() {
        &descriptor.file_ref
    } else {
        descriptor
            .thumb_ref
            .as_deref()
            .unwrap_or(&descriptor.file_ref)
    }
}

pub fn classify(descriptor: &AssetDescriptor, fetched: &FetchResult) -> MediaKind {
    if !descriptor.flags.any_set() {
        return MediaKind::StaticRaster;
    }
    if looks_like_vector(fetched) {
        MediaKind::VectorAnimation
    } else {
        MediaKind::AnimatedRaster
    }
}

fn looks_like_vector(fetched: &FetchResult) -> bool {
    fetched.source_extension == VECTOR_EXTENSION || fetched.bytes.starts_with(&GZIP_MAGIC)
}

/// True when the payload is already a WebP container, whatever extension it was served with.
pub fn is_native_container(fetched: &FetchResult) -> bool {
    matches!(image::guess_format(&fetched.bytes), Ok(ImageFormat::WebP))
}
