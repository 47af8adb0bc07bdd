//! Format detection over one probe read.

use serde::Serialize;
use tracing::debug;

use crate::ciso::{self, CisoImage, CisoInfo};
use crate::error::{Error, Result};
use crate::model::Field;
use crate::psv::{self, PsvInfo};
use crate::sndh::{self, SndhInfo};
use crate::source::ByteSource;
use crate::vgm::{self, VgmInfo};

/// How much of a file the readers look at.
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    /// Bytes read from the start of the file for tag-stream headers.
    pub tag_header_bytes: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            tag_header_bytes: sndh::DEFAULT_HEADER_BYTES,
        }
    }
}

impl ReadLimits {
    /// Probe length: enough for every fixed header and the tag window.
    fn probe_len(&self) -> usize {
        self.tag_header_bytes.max(psv::HEADER_SIZE).max(vgm::HEADER_LEN)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "format", content = "info")]
pub enum RomInfo {
    Psv(PsvInfo),
    Ciso(CisoInfo),
    Vgm(VgmInfo),
    Sndh(SndhInfo),
}

impl RomInfo {
    pub fn format_name(&self) -> &'static str {
        match self {
            RomInfo::Psv(_) => "PlayStation Save (PSV)",
            RomInfo::Ciso(_) => "GameCube CISO",
            RomInfo::Vgm(_) => "Video Game Music",
            RomInfo::Sndh(_) => "Atari ST SNDH",
        }
    }

    pub fn fields(&self) -> Vec<Field> {
        match self {
            RomInfo::Psv(i) => i.fields(),
            RomInfo::Ciso(i) => i.fields(),
            RomInfo::Vgm(i) => i.fields(),
            RomInfo::Sndh(i) => i.fields(),
        }
    }
}

/// Identify `src` and parse it with the first reader that admits it.
pub fn detect<S: ByteSource + ?Sized>(src: &mut S, limits: &ReadLimits) -> Result<RomInfo> {
    let probe = src.read_header(0, limits.probe_len())?;
    debug!(len = probe.len(), "probing header");

    if psv::check_header(&probe) {
        return Ok(RomInfo::Psv(PsvInfo::from_header(&probe)?));
    }
    if ciso::check_header(&probe) {
        let image = CisoImage::open(&mut *src)?;
        return Ok(RomInfo::Ciso(image.info()));
    }
    if vgm::check_header(&probe) {
        return Ok(RomInfo::Vgm(vgm::read_with_header(src, &probe)?));
    }
    if sndh::check_header(&probe) {
        let window = &probe[..probe.len().min(limits.tag_header_bytes)];
        return Ok(RomInfo::Sndh(sndh::parse(window)?));
    }

    if vgm::is_gzip(&probe) {
        return Err(Error::Unsupported("gzip-compressed data".into()));
    }
    if sndh::is_ice_packed(&probe) {
        return Err(Error::Unsupported("SNDH packed with Pack-Ice".into()));
    }
    Err(Error::Rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_and_unknown_input() {
        let mut empty: &[u8] = &[];
        assert!(matches!(detect(&mut empty, &ReadLimits::default()), Err(Error::Rejected)));
        let mut text: &[u8] = b"hello, this is not a rom";
        assert!(matches!(detect(&mut text, &ReadLimits::default()), Err(Error::Rejected)));
    }

    #[test]
    fn compressed_input_is_unsupported() {
        let mut gz: &[u8] = &[0x1F, 0x8B, 0x08, 0x00, 0, 0, 0, 0];
        assert!(matches!(detect(&mut gz, &ReadLimits::default()), Err(Error::Unsupported(_))));
        let mut ice: &[u8] = b"ICE!\0\0\x10\0\0\0\x20\0";
        assert!(matches!(detect(&mut ice, &ReadLimits::default()), Err(Error::Unsupported(_))));
    }

    #[test]
    fn sndh_respects_tag_window() {
        let mut data = vec![0u8; 12];
        data.extend_from_slice(b"SNDHTITLWindowed\0");
        data.resize(0x300, 0);
        data[0x200..0x20A].copy_from_slice(b"COMMLater\0");
        let mut src: &[u8] = &data;
        let limits = ReadLimits { tag_header_bytes: 0x100 };
        let RomInfo::Sndh(info) = detect(&mut src, &limits).unwrap() else {
            panic!("expected SNDH");
        };
        assert_eq!(info.title.as_deref(), Some("Windowed"));
        assert_eq!(info.composer, None);
    }
}
