//! WebP (RIFF) chunk-level editing.
//!
//! Only the chunk list is touched; image bitstreams are carried through byte-for-byte. Simple
//! files (`VP8 `/`VP8L` only) are promoted to the extended layout when metadata is attached,
//! which requires reading the canvas size from the bitstream header.

pub mod metadata;

use crate::foundation::core::Dimensions;
use crate::foundation::error::{StickerError, StickerResult};

pub use metadata::{MetadataBlock, inject, read_metadata};

pub const FOURCC_VP8: [u8; 4] = *b"VP8 ";
pub const FOURCC_VP8L: [u8; 4] = *b"VP8L";
pub const FOURCC_VP8X: [u8; 4] = *b"VP8X";
pub const FOURCC_EXIF: [u8; 4] = *b"EXIF";
pub const FOURCC_XMP: [u8; 4] = *b"XMP ";

const FLAG_ANIMATION: u8 = 0x02;
const FLAG_EXIF: u8 = 0x08;
const FLAG_ALPHA: u8 = 0x10;

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const VP8X_LEN: usize = 10;
const VP8L_SIGNATURE: u8 = 0x2f;
const VP8_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub fourcc: [u8; 4],
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(fourcc: [u8; 4], data: Vec<u8>) -> Self {
        Self { fourcc, data }
    }

    fn encoded_len(&self) -> usize {
        CHUNK_HEADER_LEN + self.data.len() + (self.data.len() & 1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebpContainer {
    chunks: Vec<Chunk>,
}

impl WebpContainer {
    pub fn parse(bytes: &[u8]) -> StickerResult<Self> {
        if bytes.len() < RIFF_HEADER_LEN || &bytes[..4] != b"RIFF" || &bytes[8..12] != b"WEBP" {
            return Err(StickerError::container("not a RIFF/WEBP file"));
        }
        let declared = read_u32(bytes, 4) as usize;
        let end = declared
            .checked_add(8)
            .filter(|&e| e <= bytes.len())
            .ok_or_else(|| {
                StickerError::container(format!(
                    "truncated container: RIFF declares {declared} bytes, have {}",
                    bytes.len().saturating_sub(8)
                ))
            })?;

        let mut chunks = Vec::new();
        let mut pos = RIFF_HEADER_LEN;
        while pos < end {
            if end - pos < CHUNK_HEADER_LEN {
                return Err(StickerError::container("dangling bytes after last chunk"));
            }
            let mut fourcc = [0u8; 4];
            fourcc.copy_from_slice(&bytes[pos..pos + 4]);
            let len = read_u32(bytes, pos + 4) as usize;
            let data_start = pos + CHUNK_HEADER_LEN;
            let data_end = data_start
                .checked_add(len)
                .filter(|&e| e <= end)
                .ok_or_else(|| {
                    StickerError::container(format!(
                        "chunk '{}' overruns the container",
                        String::from_utf8_lossy(&fourcc)
                    ))
                })?;
            chunks.push(Chunk::new(fourcc, bytes[data_start..data_end].to_vec()));
            pos = data_end + (len & 1);
        }

        let first = chunks
            .first()
            .ok_or_else(|| StickerError::container("container has no chunks"))?;
        if ![FOURCC_VP8, FOURCC_VP8L, FOURCC_VP8X].contains(&first.fourcc) {
            return Err(StickerError::container(format!(
                "unexpected leading chunk '{}'",
                String::from_utf8_lossy(&first.fourcc)
            )));
        }
        if first.fourcc == FOURCC_VP8X && first.data.len() < VP8X_LEN {
            return Err(StickerError::container("VP8X chunk is too short"));
        }

        Ok(Self { chunks })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body: usize = self.chunks.iter().map(Chunk::encoded_len).sum();
        let mut out = Vec::with_capacity(RIFF_HEADER_LEN + body);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((4 + body) as u32).to_le_bytes());
        out.extend_from_slice(b"WEBP");
        for c in &self.chunks {
            out.extend_from_slice(&c.fourcc);
            out.extend_from_slice(&(c.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&c.data);
            if c.data.len() & 1 == 1 {
                out.push(0);
            }
        }
        out
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, fourcc: [u8; 4]) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.fourcc == fourcc)
    }

    pub fn is_extended(&self) -> bool {
        self.chunks[0].fourcc == FOURCC_VP8X
    }

    pub fn is_animated(&self) -> bool {
        self.is_extended() && self.chunks[0].data[0] & FLAG_ANIMATION != 0
    }

    pub fn canvas(&self) -> StickerResult<Dimensions> {
        let first = &self.chunks[0];
        match first.fourcc {
            FOURCC_VP8X => Ok(Dimensions {
                width: read_u24(&first.data, 4) + 1,
                height: read_u24(&first.data, 7) + 1,
            }),
            FOURCC_VP8L => vp8l_header(&first.data).map(|(dims, _)| dims),
            _ => vp8_dimensions(&first.data),
        }
    }

    pub fn exif(&self) -> Option<&[u8]> {
        self.chunk(FOURCC_EXIF).map(|c| c.data.as_slice())
    }

    /// Attach `payload` as the only EXIF chunk.
    pub fn set_exif(&mut self, payload: Vec<u8>) -> StickerResult<()> {
        self.ensure_extended()?;
        self.chunks.retain(|c| c.fourcc != FOURCC_EXIF);
        self.chunks[0].data[0] |= FLAG_EXIF;

        // EXIF goes after image data and before XMP.
        let at = self
            .chunks
            .iter()
            .position(|c| c.fourcc == FOURCC_XMP)
            .unwrap_or(self.chunks.len());
        self.chunks.insert(at, Chunk::new(FOURCC_EXIF, payload));
        Ok(())
    }

    fn ensure_extended(&mut self) -> StickerResult<()> {
        if self.is_extended() {
            return Ok(());
        }
        let first = &self.chunks[0];
        let (dims, alpha) = if first.fourcc == FOURCC_VP8L {
            vp8l_header(&first.data)?
        } else {
            (vp8_dimensions(&first.data)?, false)
        };

        let mut data = vec![0u8; VP8X_LEN];
        if alpha {
            data[0] |= FLAG_ALPHA;
        }
        write_u24(&mut data, 4, dims.width - 1);
        write_u24(&mut data, 7, dims.height - 1);
        self.chunks.insert(0, Chunk::new(FOURCC_VP8X, data));
        Ok(())
    }
}

fn vp8l_header(data: &[u8]) -> StickerResult<(Dimensions, bool)> {
    if data.len() < 5 || data[0] != VP8L_SIGNATURE {
        return Err(StickerError::container("invalid VP8L bitstream header"));
    }
    let bits = read_u32(data, 1);
    Ok((
        Dimensions {
            width: (bits & 0x3fff) + 1,
            height: ((bits >> 14) & 0x3fff) + 1,
        },
        (bits >> 28) & 1 == 1,
    ))
}

fn vp8_dimensions(data: &[u8]) -> StickerResult<Dimensions> {
    if data.len() < 10 || data[3..6] != VP8_START_CODE {
        return Err(StickerError::container("invalid VP8 key frame header"));
    }
    let width = u32::from(u16::from_le_bytes([data[6], data[7]]) & 0x3fff);
    let height = u32::from(u16::from_le_bytes([data[8], data[9]]) & 0x3fff);
    if width == 0 || height == 0 {
        return Err(StickerError::container("VP8 frame has zero size"));
    }
    Ok(Dimensions { width, height })
}

fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn read_u24(b: &[u8], at: usize) -> u32 {
    u32::from(b[at]) | (u32::from(b[at + 1]) << 8) | (u32::from(b[at + 2]) << 16)
}

fn write_u24(b: &mut [u8], at: usize, v: u32) {
    b[at] = (v & 0xff) as u8;
    b[at + 1] = ((v >> 8) & 0xff) as u8;
    b[at + 2] = ((v >> 16) & 0xff) as u8;
}
