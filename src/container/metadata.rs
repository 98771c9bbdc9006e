use serde::{Deserialize, Serialize};

use crate::container::WebpContainer;
use crate::foundation::error::{StickerError, StickerResult};

/// Private TIFF tag the messaging client reads sticker pack info from.
pub const STICKER_TAG: u16 = 0x5741;

const TIFF_TYPE_UNDEFINED: u16 = 7;
const HEADER_LEN: usize = 22;
const COUNT_OFFSET: usize = 14;

/// Pack provenance stored in every delivered sticker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBlock {
    #[serde(rename = "sticker-pack-id")]
    pub pack_id: String,
    #[serde(rename = "sticker-pack-name")]
    pub pack_name: String,
    #[serde(
        rename = "sticker-pack-publisher",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub publisher: Option<String>,
    /// Never empty.
    pub emojis: Vec<String>,
}

impl MetadataBlock {
    /// Fresh block with a newly generated pack id.
    pub fn new(pack_name: impl Into<String>, emojis: &[String], placeholder: &str) -> Self {
        Self {
            pack_id: random_pack_id(),
            pack_name: pack_name.into(),
            publisher: None,
            emojis: normalize_emojis(emojis, placeholder),
        }
    }

    pub fn with_publisher(mut self, publisher: Option<String>) -> Self {
        self.publisher = publisher.filter(|p| !p.trim().is_empty());
        self
    }

    /// TIFF-style header (little endian, one IFD entry) followed by the JSON payload.
    pub fn to_exif(&self) -> StickerResult<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| StickerError::container(format!("metadata json: {e}")))?;
        let len = u32::try_from(json.len())
            .map_err(|_| StickerError::container("metadata payload too large"))?;

        let mut out = Vec::with_capacity(HEADER_LEN + json.len());
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&STICKER_TAG.to_le_bytes());
        out.extend_from_slice(&TIFF_TYPE_UNDEFINED.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());
        debug_assert_eq!(out.len(), HEADER_LEN);
        out.extend_from_slice(&json);
        Ok(out)
    }

    pub fn from_exif(exif: &[u8]) -> StickerResult<Self> {
        if exif.len() < HEADER_LEN || &exif[..4] != b"II*\0" {
            return Err(StickerError::container("EXIF payload is not little-endian TIFF"));
        }
        let tag = u16::from_le_bytes([exif[10], exif[11]]);
        if tag != STICKER_TAG {
            return Err(StickerError::container(format!(
                "unexpected EXIF tag {tag:#06x}"
            )));
        }
        let count = u32::from_le_bytes([
            exif[COUNT_OFFSET],
            exif[COUNT_OFFSET + 1],
            exif[COUNT_OFFSET + 2],
            exif[COUNT_OFFSET + 3],
        ]) as usize;
        let json = exif
            .get(HEADER_LEN..HEADER_LEN + count)
            .ok_or_else(|| StickerError::container("EXIF payload shorter than declared"))?;
        serde_json::from_slice(json)
            .map_err(|e| StickerError::container(format!("metadata json: {e}")))
    }
}

/// 32 random bytes, hex encoded.
pub fn random_pack_id() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Trim, drop blanks and repeats, keep first-seen order; fall back to `placeholder`.
pub fn normalize_emojis(emojis: &[String], placeholder: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(emojis.len());
    for e in emojis.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        if !out.iter().any(|seen| seen == e) {
            out.push(e.to_string());
        }
    }
    if out.is_empty() {
        out.push(placeholder.to_string());
    }
    out
}

/// Attach `meta` to `container`, replacing any previous EXIF chunk.
pub fn inject(container: &[u8], meta: &MetadataBlock) -> StickerResult<Vec<u8>> {
    let mut webp = WebpContainer::parse(container)?;
    webp.set_exif(meta.to_exif()?)?;
    Ok(webp.to_bytes())
}

/// Read back the metadata block, if the container carries one.
pub fn read_metadata(container: &[u8]) -> StickerResult<Option<MetadataBlock>> {
    let webp = WebpContainer::parse(container)?;
    webp.exif().map(MetadataBlock::from_exif).transpose()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample_webp() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::WebP)
            .unwrap();
        buf
    }

    #[test]
    fn exif_header_layout() {
        let meta = MetadataBlock::new("Knight Bot", &["🔥".to_string()], "🤖");
        let exif = meta.to_exif().unwrap();
        assert_eq!(
            &exif[..HEADER_LEN],
            &[
                0x49, 0x49, 0x2a, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x41, 0x57, 0x07,
                0x00, exif[14], exif[15], exif[16], exif[17], 0x16, 0x00, 0x00, 0x00,
            ]
        );
        let count = u32::from_le_bytes([exif[14], exif[15], exif[16], exif[17]]) as usize;
        assert_eq!(count, exif.len() - HEADER_LEN);

        let json: serde_json::Value = serde_json::from_slice(&exif[HEADER_LEN..]).unwrap();
        assert_eq!(json["sticker-pack-name"], "Knight Bot");
        assert_eq!(json["emojis"][0], "🔥");
        assert!(json.get("sticker-pack-publisher").is_none());
    }

    #[test]
    fn round_trip_through_container() {
        let meta = MetadataBlock::new("Cats", &["😺".into(), "😺".into(), " ".into()], "🤖")
            .with_publisher(Some("stickerkit".into()));
        let out = inject(&sample_webp(), &meta).unwrap();
        let back = read_metadata(&out).unwrap().unwrap();
        assert_eq!(back, meta);
        assert_eq!(back.emojis, vec!["😺"]);
        assert!(image::load_from_memory(&out).is_ok());
    }

    #[test]
    fn reinjection_replaces_previous_block() {
        let first = inject(&sample_webp(), &MetadataBlock::new("A", &[], "🤖")).unwrap();
        let second_meta = MetadataBlock::new("B", &[], "🤖");
        let second = inject(&first, &second_meta).unwrap();

        let webp = WebpContainer::parse(&second).unwrap();
        let exif_chunks = webp
            .chunks()
            .iter()
            .filter(|c| c.fourcc == crate::container::FOURCC_EXIF)
            .count();
        assert_eq!(exif_chunks, 1);
        assert_eq!(read_metadata(&second).unwrap().unwrap().pack_name, "B");
    }

    #[test]
    fn pack_ids_are_fresh_hex() {
        let a = random_pack_id();
        let b = random_pack_id();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_emojis_get_placeholder() {
        assert_eq!(normalize_emojis(&[], "🤖"), vec!["🤖"]);
        assert_eq!(
            normalize_emojis(&["b".into(), "a".into(), "b".into()], "🤖"),
            vec!["b", "a"]
        );
    }

    #[test]
    fn plain_file_has_no_metadata_and_garbage_fails() {
        assert_eq!(read_metadata(&sample_webp()).unwrap(), None);
        assert!(matches!(
            inject(b"not a webp at all", &MetadataBlock::new("x", &[], "🤖")),
            Err(StickerError::ContainerWrite(_))
        ));
    }
}
