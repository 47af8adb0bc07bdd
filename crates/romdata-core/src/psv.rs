//! PlayStation saves exported by the PS3 (`.psv`).
//!
//! A PS3 wrapper header followed by the PS1 memory card SC block,
//! which carries the title and up to three 16x16 4bpp icon frames.

use serde::Serialize;

use crate::cursor::{slice_at, u8_at};
use crate::error::{Error, ParseError, Result};
use crate::model::Field;
use crate::source::ByteSource;
use crate::text::sjis_field_to_string;

pub const MAGIC: [u8; 8] = [0x00, b'V', b'S', b'P', 0x00, 0x00, 0x00, 0x00];
pub const HEADER_SIZE: usize = 0x284;

const FILENAME_OFFSET: usize = 0x64;
const FILENAME_LEN: usize = 20;
const SC_OFFSET: usize = 0x84;
const SC_MAGIC: [u8; 2] = *b"SC";
const SC_ICON_FLAG: usize = SC_OFFSET + 0x02;
const SC_BLOCKS: usize = SC_OFFSET + 0x03;
const SC_TITLE: usize = SC_OFFSET + 0x04;
const SC_TITLE_LEN: usize = 64;
const SC_PALETTE: usize = SC_OFFSET + 0x60;
const SC_FRAMES: usize = SC_OFFSET + 0x80;

pub const PALETTE_LEN: usize = 32;
pub const FRAME_LEN: usize = 128;
pub const MAX_FRAMES: usize = 3;

/// PAL frames between icon changes, converted to milliseconds.
const TWO_FRAME_DELAY_MS: u32 = 16 * 1000 / 50;
const THREE_FRAME_DELAY_MS: u32 = 11 * 1000 / 50;

pub fn check_header(header: &[u8]) -> bool {
    header.len() >= HEADER_SIZE
        && header[..8] == MAGIC
        && header[SC_OFFSET..SC_OFFSET + 2] == SC_MAGIC
}

/// Icon animation described by the SC icon flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IconAnim {
    pub frames: usize,
    pub delay_ms: u32,
}

impl IconAnim {
    pub fn from_flag(flag: u8) -> Self {
        let (frames, delay_ms) = match flag {
            0x11 | 0x16 => (1, 0),
            0x12 | 0x17 => (2, TWO_FRAME_DELAY_MS),
            0x13 | 0x18 => (3, THREE_FRAME_DELAY_MS),
            _ => (0, 0),
        };
        Self { frames, delay_ms }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PsvInfo {
    pub filename: String,
    pub description: String,
    pub blocks: u8,
    pub icon_flag: u8,
    pub icon: IconAnim,
    /// 16 little-endian RGB555 entries.
    #[serde(skip)]
    pub palette: Vec<u8>,
    /// One 4bpp bitmap per animation frame.
    #[serde(skip)]
    pub frames: Vec<Vec<u8>>,
}

impl PsvInfo {
    pub fn from_header(header: &[u8]) -> Result<Self> {
        if !check_header(header) {
            return Err(Error::Rejected);
        }
        Ok(Self::decode(header)?)
    }

    fn decode(header: &[u8]) -> std::result::Result<Self, ParseError> {
        let icon_flag = u8_at(header, SC_ICON_FLAG)?;
        let icon = IconAnim::from_flag(icon_flag);
        let frames = (0..icon.frames)
            .map(|i| slice_at(header, SC_FRAMES + i * FRAME_LEN, FRAME_LEN).map(<[u8]>::to_vec))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            filename: sjis_field_to_string(slice_at(header, FILENAME_OFFSET, FILENAME_LEN)?),
            description: sjis_field_to_string(slice_at(header, SC_TITLE, SC_TITLE_LEN)?),
            blocks: u8_at(header, SC_BLOCKS)?,
            icon_flag,
            icon,
            palette: slice_at(header, SC_PALETTE, PALETTE_LEN)?.to_vec(),
            frames,
        })
    }

    pub fn fields(&self) -> Vec<Field> {
        let mut out = vec![
            Field::text("Filename", self.filename.as_str()),
            Field::text("Description", self.description.as_str()),
            Field::text("Blocks", self.blocks.to_string()),
        ];
        let icon = match self.icon.frames {
            0 => "None".to_string(),
            1 => "Static".to_string(),
            n => format!("{n} frames, {} ms", self.icon.delay_ms),
        };
        out.push(Field::text("Icon", icon));
        out
    }
}

pub fn read<S: ByteSource + ?Sized>(src: &mut S) -> Result<PsvInfo> {
    let header = src.read_header(0, HEADER_SIZE)?;
    PsvInfo::from_header(&header)
}
