//! Video Game Music (VGM) logs.
//!
//! The header is a fixed 256-byte struct that grew one version at a time.
//! A field exists only if the file's version introduced it and the field
//! lies before the start of the command data; older or trimmed headers
//! reuse those bytes for commands.
//!
//! Optional GD3 tags live in a trailer found through an offset relative to
//! its own header field.

use serde::Serialize;
use tracing::{debug, warn};

use crate::cursor::{le16_at, le32_at, slice_at, u8_at};
use crate::error::{Error, ParseError, Result};
use crate::format::{format_bcd_version, format_bitfield, format_clock_rate, format_samples_as_time, samples_to_ms};
use crate::model::Field;
use crate::source::ByteSource;
use crate::text::utf16le_to_string;

pub const MAGIC: [u8; 4] = *b"Vgm ";
pub const HEADER_LEN: usize = 0x100;
/// All sample counts are at this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Clock bit 31: second variant of the chip (YM2610B, ES5506, FDS on NES).
pub const CLK_ALT_MODE: u32 = 1 << 31;
/// Clock bit 30: two chips of this type.
pub const CLK_DUAL_CHIP: u32 = 1 << 30;
/// Both bits on the SN76489 clock select the T6W28 instead.
pub const PSG_T6W28: u32 = CLK_ALT_MODE | CLK_DUAL_CHIP;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

// Field offsets.
const OFF_VERSION: usize = 0x08;
const OFF_SN76489: usize = 0x0C;
const OFF_GD3: usize = 0x14;
const OFF_TOTAL_SAMPLES: usize = 0x18;
const OFF_LOOP: usize = 0x1C;
const OFF_LOOP_SAMPLES: usize = 0x20;
const OFF_RATE: usize = 0x24;
const OFF_LFSR: usize = 0x28;
const OFF_LFSR_WIDTH: usize = 0x2A;
const OFF_PSG_FLAGS: usize = 0x2B;
const OFF_DATA: usize = 0x34;
const OFF_SEGA_PCM_IF: usize = 0x3C;
const OFF_AY_TYPE: usize = 0x78;
const OFF_AY_FLAGS: usize = 0x79;
const OFF_YM2203_AY_FLAGS: usize = 0x7A;
const OFF_YM2608_AY_FLAGS: usize = 0x7B;
const OFF_ES5503_CH: usize = 0xD4;
const OFF_ES5505_CH: usize = 0xD5;
const OFF_C352_DIV: usize = 0xD6;

/// Header size of versions before 1.50, which have no data offset field.
const LEGACY_DATA_OFFSET: usize = 0x40;

pub fn check_header(header: &[u8]) -> bool {
    header.len() >= HEADER_LEN && header[..4] == MAGIC
}

/// `.vgz` files are gzip streams around a VGM log.
pub fn is_gzip(header: &[u8]) -> bool {
    header.starts_with(&GZIP_MAGIC)
}

/// The fixed header with its version and data offset resolved.
#[derive(Debug, Clone, Copy)]
pub struct HeaderView<'a> {
    data: &'a [u8],
    version: u32,
    data_offset: usize,
}

impl<'a> HeaderView<'a> {
    pub fn new(header: &'a [u8]) -> std::result::Result<Self, ParseError> {
        let data = slice_at(header, 0, HEADER_LEN)?;
        let version = le32_at(data, OFF_VERSION)?;
        let data_offset = if version < 0x0150 {
            LEGACY_DATA_OFFSET
        } else {
            (le32_at(data, OFF_DATA)? as usize).saturating_add(OFF_DATA)
        };
        Ok(Self {
            data,
            version,
            data_offset,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Absolute start of the command data.
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Whether a field group introduced in `min_version` and ending with
    /// the byte at `gate` is part of this header.
    pub fn has(&self, gate: usize, min_version: u32) -> bool {
        if self.version < min_version {
            return false;
        }
        if gate >= self.data_offset {
            debug!(
                offset = gate,
                data_offset = self.data_offset,
                "header field overlaps command data"
            );
            return false;
        }
        true
    }

    pub fn byte(&self, offset: usize, min_version: u32) -> Option<u8> {
        self.has(offset, min_version)
            .then(|| u8_at(self.data, offset).ok())
            .flatten()
    }

    pub fn le16(&self, offset: usize, min_version: u32) -> Option<u16> {
        self.has(offset, min_version)
            .then(|| le16_at(self.data, offset).ok())
            .flatten()
    }

    pub fn le32(&self, offset: usize, min_version: u32) -> Option<u32> {
        self.has(offset, min_version)
            .then(|| le32_at(self.data, offset).ok())
            .flatten()
    }

    /// Ungated read for the base fields every version has.
    fn base32(&self, offset: usize) -> u32 {
        le32_at(self.data, offset).unwrap_or(0)
    }

    /// Absolute address of the GD3 trailer, if the header points to one.
    pub fn gd3_address(&self) -> Option<u64> {
        match self.base32(OFF_GD3) {
            0 => None,
            rel => Some(u64::from(rel) + OFF_GD3 as u64),
        }
    }
}

/// How a chip's clock field names the chip.
#[derive(Debug, Clone, Copy)]
enum Naming {
    Plain,
    /// The alt-mode bit selects the second name.
    AltName(&'static str),
    /// The alt-mode bit flags Famicom Disk System audio.
    NesApu,
    /// The name comes from the sub-model code at 0x78.
    Ay8910,
}

/// Extra header values reported next to the clock.
#[derive(Debug, Clone, Copy)]
enum ExtraField {
    None,
    SegaPcmIfReg,
    AyFlags { offset: usize, label: &'static str },
    Channels(usize),
    C352Divider,
}

#[derive(Debug, Clone, Copy)]
struct ChipDef {
    clock: usize,
    /// Last header byte the chip uses; the chip exists only if it is before
    /// the data offset.
    gate: usize,
    min_version: u32,
    name: &'static str,
    naming: Naming,
    extra: ExtraField,
}

const fn chip(clock: usize, min_version: u32, name: &'static str) -> ChipDef {
    ChipDef {
        clock,
        gate: clock,
        min_version,
        name,
        naming: Naming::Plain,
        extra: ExtraField::None,
    }
}

const fn chip_ext(
    clock: usize,
    gate: usize,
    min_version: u32,
    name: &'static str,
    naming: Naming,
    extra: ExtraField,
) -> ChipDef {
    ChipDef {
        clock,
        gate,
        min_version,
        name,
        naming,
        extra,
    }
}

/// Every chip after the SN76489, in header order.
static CHIPS: &[ChipDef] = &[
    chip(0x10, 0x0100, "YM2413"),
    chip(0x2C, 0x0110, "YM2612"),
    chip(0x30, 0x0110, "YM2151"),
    chip_ext(0x38, OFF_SEGA_PCM_IF, 0x0151, "Sega PCM", Naming::Plain, ExtraField::SegaPcmIfReg),
    chip(0x40, 0x0151, "RF5C68"),
    chip_ext(
        0x44,
        OFF_YM2203_AY_FLAGS,
        0x0151,
        "YM2203",
        Naming::Plain,
        ExtraField::AyFlags { offset: OFF_YM2203_AY_FLAGS, label: "YM2203 (AY8910)" },
    ),
    chip_ext(
        0x48,
        OFF_YM2608_AY_FLAGS,
        0x0151,
        "YM2608",
        Naming::Plain,
        ExtraField::AyFlags { offset: OFF_YM2608_AY_FLAGS, label: "YM2608 (AY8910)" },
    ),
    chip_ext(0x4C, 0x4C, 0x0151, "YM2610", Naming::AltName("YM2610B"), ExtraField::None),
    chip(0x50, 0x0151, "YM3812"),
    chip(0x54, 0x0151, "YM3526"),
    chip(0x58, 0x0151, "Y8950"),
    chip(0x5C, 0x0151, "YMF262"),
    chip(0x60, 0x0151, "YMF278B"),
    chip(0x64, 0x0151, "YMF271"),
    chip(0x68, 0x0151, "YMZ280B"),
    chip(0x6C, 0x0151, "RF5C164"),
    chip(0x70, 0x0151, "PWM"),
    chip_ext(
        0x74,
        OFF_AY_FLAGS,
        0x0151,
        "AY8910",
        Naming::Ay8910,
        ExtraField::AyFlags { offset: OFF_AY_FLAGS, label: "" },
    ),
    chip(0x80, 0x0161, "DMG"),
    chip_ext(0x84, 0x84, 0x0161, "NES APU", Naming::NesApu, ExtraField::None),
    chip(0x88, 0x0161, "MultiPCM"),
    chip(0x8C, 0x0161, "uPD7759"),
    chip(0x90, 0x0161, "OKIM6258"),
    chip(0x98, 0x0161, "OKIM6295"),
    chip(0x9C, 0x0161, "K051649"),
    chip(0xA0, 0x0161, "K054539"),
    chip(0xA4, 0x0161, "HuC6280"),
    chip(0xA8, 0x0161, "C140"),
    chip(0xAC, 0x0161, "K053260"),
    chip(0xB0, 0x0161, "Pokey"),
    chip(0xB4, 0x0161, "QSound"),
    chip(0xB8, 0x0171, "SCSP"),
    chip(0xC0, 0x0171, "WonderSwan"),
    chip(0xC4, 0x0171, "VSU"),
    chip(0xC8, 0x0171, "SAA1099"),
    chip_ext(0xCC, OFF_ES5503_CH, 0x0171, "ES5503", Naming::Plain, ExtraField::Channels(OFF_ES5503_CH)),
    chip_ext(
        0xD0,
        OFF_ES5505_CH,
        0x0171,
        "ES5505",
        Naming::AltName("ES5506"),
        ExtraField::Channels(OFF_ES5505_CH),
    ),
    chip(0xD8, 0x0171, "X1-010"),
    chip_ext(0xDC, 0xDC, 0x0171, "C352", Naming::Plain, ExtraField::C352Divider),
    chip(0xE0, 0x0171, "GA20"),
];

fn ay8910_model(code: u8) -> &'static str {
    match code {
        0x00 => "AY8910",
        0x01 => "AY8912",
        0x02 => "AY8913",
        0x03 => "AY8930",
        0x10 => "YM2149",
        0x11 => "YM3439",
        0x12 => "YMZ284",
        0x13 => "YMZ294",
        _ => "AYxxxx",
    }
}

const PSG_FLAG_NAMES: [&str; 4] = ["Freq 0 is 0x400", "Output Negate", "Stereo", "/8 Clock Divider"];
const AY_FLAG_NAMES: [&str; 4] = ["Legacy Output", "Single Output", "Discrete Output", "Raw Output"];

/// Value reported next to a chip's clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChipExtra {
    InterfaceRegister { value: u32 },
    AyFlags { label: String, flags: u8 },
    Channels { count: u8 },
    ClockDivider { value: u32 },
    FdsExpansion { present: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChipInfo {
    pub name: String,
    /// Hz, flag bits removed.
    pub clock: u32,
    pub dual_chip: bool,
    pub extra: Option<ChipExtra>,
}

impl ChipInfo {
    fn push_fields(&self, out: &mut Vec<Field>) {
        out.push(Field::text(format!("{} Clock Rate", self.name), format_clock_rate(self.clock)));
        match &self.extra {
            None => {}
            Some(ChipExtra::InterfaceRegister { value }) => {
                out.push(Field::text(format!("{} IF reg", self.name), format!("0x{value:08X}")));
            }
            Some(ChipExtra::AyFlags { label, flags }) => {
                out.push(Field::text(
                    format!("{label} Flags"),
                    format_bitfield(&AY_FLAG_NAMES, u32::from(*flags)),
                ));
            }
            Some(ChipExtra::Channels { count }) => {
                out.push(Field::text(format!("{} # of Channels", self.name), count.to_string()));
            }
            Some(ChipExtra::ClockDivider { value }) => {
                out.push(Field::text(format!("{} Clock Divider", self.name), value.to_string()));
            }
            Some(ChipExtra::FdsExpansion { present }) => {
                let exp = if *present { "Famicom Disk System" } else { "(none)" };
                out.push(Field::text(format!("{} Expansions", self.name), exp));
            }
        }
    }
}

/// SN76489 or T6W28 programmable sound generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PsgInfo {
    pub name: &'static str,
    pub clock: u32,
    pub dual_chip: bool,
    pub lfsr_pattern: u16,
    pub lfsr_width: u8,
    /// Bits 2 and 3 already inverted to active-high.
    pub flags: u8,
}

fn read_psg(view: &HeaderView<'_>) -> Option<PsgInfo> {
    let raw = view.le32(OFF_SN76489, 0x0100)?;
    if raw & !PSG_T6W28 == 0 {
        return None;
    }
    let t6w28 = raw & PSG_T6W28 == PSG_T6W28;
    // defaults for headers before 1.10, or 0 in the field
    let lfsr_pattern = view.le16(OFF_LFSR, 0x0110).filter(|&v| v != 0).unwrap_or(0x0009);
    let lfsr_width = view.byte(OFF_LFSR_WIDTH, 0x0110).filter(|&v| v != 0).unwrap_or(16);
    let flags = view.byte(OFF_PSG_FLAGS, 0x0151).map(|f| f ^ 0x0C).unwrap_or(0);
    Some(PsgInfo {
        name: if t6w28 { "T6W28" } else { "SN76489" },
        clock: raw & !PSG_T6W28,
        dual_chip: !t6w28 && raw & CLK_DUAL_CHIP != 0,
        lfsr_pattern,
        lfsr_width,
        flags,
    })
}

fn read_chip(view: &HeaderView<'_>, def: &ChipDef) -> Option<ChipInfo> {
    if !view.has(def.gate, def.min_version) {
        return None;
    }
    let raw = view.le32(def.clock, def.min_version)?;
    let clock = raw & !(CLK_ALT_MODE | CLK_DUAL_CHIP);
    if clock == 0 {
        return None;
    }
    let alt = raw & CLK_ALT_MODE != 0;
    let mut extra = None;
    let name = match def.naming {
        Naming::Plain => def.name,
        Naming::AltName(alt_name) => {
            if alt {
                alt_name
            } else {
                def.name
            }
        }
        Naming::NesApu => {
            extra = Some(ChipExtra::FdsExpansion { present: alt });
            def.name
        }
        Naming::Ay8910 => ay8910_model(view.byte(OFF_AY_TYPE, def.min_version).unwrap_or(0)),
    };
    match def.extra {
        ExtraField::None => {}
        ExtraField::SegaPcmIfReg => {
            let value = view.le32(OFF_SEGA_PCM_IF, def.min_version).unwrap_or(0);
            extra = Some(ChipExtra::InterfaceRegister { value });
        }
        ExtraField::AyFlags { offset, label } => {
            let flags = view.byte(offset, def.min_version).unwrap_or(0);
            let label = if label.is_empty() { name } else { label };
            extra = Some(ChipExtra::AyFlags {
                label: label.to_string(),
                flags,
            });
        }
        ExtraField::Channels(offset) => {
            let count = view.byte(offset, def.min_version).unwrap_or(0);
            extra = Some(ChipExtra::Channels { count });
        }
        ExtraField::C352Divider => {
            let div = view.byte(OFF_C352_DIV, def.min_version).unwrap_or(0);
            extra = Some(ChipExtra::ClockDivider {
                value: u32::from(div) * 4,
            });
        }
    }
    Some(ChipInfo {
        name: name.to_string(),
        clock,
        dual_chip: raw & CLK_DUAL_CHIP != 0,
        extra,
    })
}

// GD3 trailer.

pub const GD3_MAGIC: [u8; 4] = *b"Gd3 ";
pub const GD3_HEADER_LEN: usize = 12;
const GD3_MIN_LEN: u32 = 11 * 2;
const GD3_MAX_LEN: u32 = 16 * 1024;

/// GD3 strings by position. English and Japanese variants alternate;
/// only the English ones are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Gd3Tags {
    pub track_name: Option<String>,
    pub game_name: Option<String>,
    pub system_name: Option<String>,
    pub composer: Option<String>,
    pub release_date: Option<String>,
    pub ripper: Option<String>,
    pub notes: Option<String>,
}

impl Gd3Tags {
    /// Map decoded strings by index. A short list fills only what it has.
    pub fn from_strings(strings: &[String]) -> Self {
        let at = |i: usize| strings.get(i).filter(|s| !s.is_empty()).cloned();
        Self {
            track_name: at(0),
            game_name: at(2),
            system_name: at(4),
            composer: at(6),
            release_date: at(8),
            ripper: at(9),
            notes: at(10),
        }
    }
}

/// Validate the 12-byte GD3 header and return the string data length.
pub fn check_gd3_header(header: &[u8]) -> std::result::Result<usize, ParseError> {
    let magic = slice_at(header, 0, 4)?;
    if magic != GD3_MAGIC {
        return Err(ParseError::malformed(0, "missing Gd3 magic"));
    }
    let version = le32_at(header, 4)?;
    if version < 0x0100 {
        return Err(ParseError::malformed(4, format!("GD3 version {version:#x} too old")));
    }
    let length = le32_at(header, 8)?;
    if length % 2 != 0 || !(GD3_MIN_LEN..=GD3_MAX_LEN).contains(&length) {
        return Err(ParseError::malformed(8, format!("bad GD3 length {length}")));
    }
    Ok(length as usize)
}

/// Split the UTF-16LE string block into its NUL-terminated strings.
pub fn parse_gd3_strings(data: &[u8]) -> std::result::Result<Vec<String>, ParseError> {
    if data.len() % 2 != 0 || data.len() < 2 {
        return Err(ParseError::malformed(0, "GD3 data is not whole UTF-16 units"));
    }
    if data[data.len() - 2..] != [0, 0] {
        return Err(ParseError::malformed(data.len() - 2, "GD3 data is not NUL-terminated"));
    }
    let mut strings = Vec::new();
    let mut start = 0;
    for (i, unit) in data.chunks_exact(2).enumerate() {
        if unit == [0, 0] {
            strings.push(utf16le_to_string(&data[start..i * 2]));
            start = i * 2 + 2;
        }
    }
    Ok(strings)
}

/// Read and decode the GD3 trailer at `addr`.
pub fn read_gd3<S: ByteSource + ?Sized>(src: &mut S, addr: u64) -> Result<Vec<String>> {
    let header = src.read_header(addr, GD3_HEADER_LEN)?;
    let length = check_gd3_header(&header)?;
    let data = src.read_header(addr + GD3_HEADER_LEN as u64, length)?;
    if data.len() != length {
        return Err(ParseError::OutOfBounds {
            offset: GD3_HEADER_LEN,
            len: length,
            end: GD3_HEADER_LEN + data.len(),
        }
        .into());
    }
    Ok(parse_gd3_strings(&data)?)
}

/// Parsed VGM header and tags.
#[derive(Debug, Clone, Serialize)]
pub struct VgmInfo {
    pub version: u32,
    pub data_offset: usize,
    pub total_samples: u32,
    /// Present when the file loops.
    pub loop_samples: Option<u32>,
    pub frame_rate: Option<u32>,
    pub psg: Option<PsgInfo>,
    pub chips: Vec<ChipInfo>,
    pub gd3: Option<Gd3Tags>,
}

/// The subset of tags used for media metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VgmMetadata {
    pub duration_ms: u64,
    pub title: Option<String>,
    pub album: Option<String>,
    pub composer: Option<String>,
    pub release_year: Option<u32>,
    pub comment: Option<String>,
}

/// Year from a GD3 release date: up to four leading digits, then the end
/// of the string or a `-` / `/` separator.
pub fn parse_release_year(date: &str) -> Option<u32> {
    let digits = date.bytes().take(4).take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    match date.as_bytes().get(digits) {
        None | Some(b'-') | Some(b'/') => date[..digits].parse().ok().filter(|&y| y < 10_000),
        Some(_) => None,
    }
}

impl VgmInfo {
    /// Decode the fixed header. GD3 tags are left for [`read`].
    pub fn from_header(header: &[u8]) -> Result<Self> {
        if is_gzip(header) {
            return Err(Error::Unsupported("gzip-compressed VGM".into()));
        }
        if !check_header(header) {
            return Err(Error::Rejected);
        }
        let view = HeaderView::new(header)?;
        let loop_offset = view.base32(OFF_LOOP);
        let info = Self {
            version: view.version(),
            data_offset: view.data_offset(),
            total_samples: view.base32(OFF_TOTAL_SAMPLES),
            loop_samples: (loop_offset != 0).then(|| view.base32(OFF_LOOP_SAMPLES)),
            frame_rate: view.le32(OFF_RATE, 0x0101).filter(|&r| r != 0),
            psg: read_psg(&view),
            chips: CHIPS.iter().filter_map(|def| read_chip(&view, def)).collect(),
            gd3: None,
        };
        Ok(info)
    }

    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.total_samples, SAMPLE_RATE)
    }

    pub fn metadata(&self) -> VgmMetadata {
        let gd3 = self.gd3.clone().unwrap_or_default();
        VgmMetadata {
            duration_ms: self.duration_ms(),
            release_year: gd3.release_date.as_deref().and_then(parse_release_year),
            title: gd3.track_name,
            album: gd3.game_name,
            composer: gd3.composer,
            comment: gd3.notes,
        }
    }

    pub fn fields(&self) -> Vec<Field> {
        let mut out = vec![Field::text("VGM Version", format_bcd_version(self.version))];
        if let Some(gd3) = &self.gd3 {
            let tags = [
                ("Track Name", &gd3.track_name),
                ("Game Name", &gd3.game_name),
                ("System Name", &gd3.system_name),
                ("Composer", &gd3.composer),
                ("Release Date", &gd3.release_date),
                ("VGM Ripper", &gd3.ripper),
                ("Notes", &gd3.notes),
            ];
            for (name, value) in tags {
                if let Some(v) = value {
                    out.push(Field::text(name, v.as_str()));
                }
            }
        }
        out.push(Field::text(
            "Duration",
            format_samples_as_time(self.total_samples, SAMPLE_RATE),
        ));
        if let Some(samples) = self.loop_samples {
            out.push(Field::text("Loop Length", format_samples_as_time(samples, SAMPLE_RATE)));
        }
        if let Some(rate) = self.frame_rate {
            out.push(Field::text("Frame Rate", rate.to_string()));
        }
        if let Some(psg) = &self.psg {
            out.push(Field::text(format!("{} Clock Rate", psg.name), format_clock_rate(psg.clock)));
            out.push(Field::text(
                format!("{} LFSR pattern", psg.name),
                format!("0x{:04X}", psg.lfsr_pattern),
            ));
            out.push(Field::text(format!("{} LFSR width", psg.name), psg.lfsr_width.to_string()));
            out.push(Field::text(
                format!("{} Flags", psg.name),
                format_bitfield(&PSG_FLAG_NAMES, u32::from(psg.flags)),
            ));
        }
        for chip in &self.chips {
            chip.push_fields(&mut out);
        }
        out
    }
}

/// Parse a VGM file: fixed header, then the GD3 trailer if there is one.
/// A bad trailer only drops the tags.
pub fn read<S: ByteSource + ?Sized>(src: &mut S) -> Result<VgmInfo> {
    let header = src.read_header(0, HEADER_LEN)?;
    read_with_header(src, &header)
}

/// Like [`read`], for callers that already hold the first bytes of the file.
pub fn read_with_header<S: ByteSource + ?Sized>(src: &mut S, header: &[u8]) -> Result<VgmInfo> {
    let mut info = VgmInfo::from_header(header)?;
    let view = HeaderView::new(header)?;
    if let Some(addr) = view.gd3_address() {
        match read_gd3(src, addr) {
            Ok(strings) => info.gd3 = Some(Gd3Tags::from_strings(&strings)),
            Err(e) => warn!(addr, error = %e, "ignoring unreadable GD3 trailer"),
        }
    }
    Ok(info)
}
