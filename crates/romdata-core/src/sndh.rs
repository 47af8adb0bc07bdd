//! Atari ST SNDH chiptune headers.
//!
//! The file starts with a 16-byte prologue (a branch table for the replay
//! code) with `SNDH` at offset 12. Tags follow in any order until `HDNS`.
//! Strings are NUL-terminated, numbers are ASCII decimal, and the subtune
//! name table holds 16-bit offsets measured from the start of its own tag.

use serde::Serialize;
use tracing::{debug, warn};

use crate::cursor::BoundedCursor;
use crate::error::{Error, ParseError, Result};
use crate::format::{format_duration, format_frequency};
use crate::model::{Field, FieldValue};
use crate::source::ByteSource;
use crate::tagstream::{Flow, ScanEnd, TagHandler, TagSet, dispatch, narrow_code, wide_code};

pub const MAGIC: [u8; 4] = *b"SNDH";
pub const MAGIC_OFFSET: usize = 12;
/// Prologue length; the first tag starts here.
pub const PROLOGUE_LEN: usize = 16;
/// How much of the file is read when looking for tags.
pub const DEFAULT_HEADER_BYTES: usize = 4096;

/// Admission check: prologue present and `SNDH` at offset 12.
pub fn check_header(header: &[u8]) -> bool {
    header.len() >= PROLOGUE_LEN && header[MAGIC_OFFSET..MAGIC_OFFSET + 4] == MAGIC
}

/// Files packed with Pack-Ice carry their own magic in place of the
/// prologue and have to be unpacked before any tag is visible.
pub fn is_ice_packed(header: &[u8]) -> bool {
    matches!(header.get(..4), Some(b"ICE!") | Some(b"Ice!"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Title,
    Composer,
    Ripper,
    Converter,
    Year,
    SubtuneNames,
    Time,
    End,
    SubtuneCount,
    VblankFreq,
    Timer(usize),
    DefaultSubtune,
}

static TAGS: TagSet<Tag> = TagSet {
    wide: &[
        (wide_code(b"TITL"), Tag::Title),
        (wide_code(b"COMM"), Tag::Composer),
        (wide_code(b"RIPP"), Tag::Ripper),
        (wide_code(b"CONV"), Tag::Converter),
        (wide_code(b"YEAR"), Tag::Year),
        (wide_code(b"!#SN"), Tag::SubtuneNames),
        (wide_code(b"!#ST"), Tag::SubtuneNames),
        (wide_code(b"TIME"), Tag::Time),
        (wide_code(b"HDNS"), Tag::End),
    ],
    narrow: &[
        (narrow_code(b"##"), Tag::SubtuneCount),
        (narrow_code(b"!V"), Tag::VblankFreq),
        (narrow_code(b"TA"), Tag::Timer(0)),
        (narrow_code(b"TB"), Tag::Timer(1)),
        (narrow_code(b"TC"), Tag::Timer(2)),
        (narrow_code(b"TD"), Tag::Timer(3)),
        (narrow_code(b"!#"), Tag::DefaultSubtune),
    ],
};

/// Parsed SNDH header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SndhInfo {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub ripper: Option<String>,
    pub converter: Option<String>,
    pub year: Option<u32>,
    /// Value of the `##` tag, if present. Absent means a single-song file.
    pub declared_subtunes: Option<u32>,
    pub vblank_freq: Option<u32>,
    /// Timers A through D.
    pub timer_freq: [Option<u32>; 4],
    /// 1-based.
    pub default_subtune: Option<u32>,
    pub subtune_names: Vec<String>,
    /// Seconds, one per subtune.
    pub subtune_lengths: Vec<u32>,
    #[serde(skip)]
    pub scan_end: ScanEnd,
}

/// One row of the subtune list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtuneRow {
    /// 1-based.
    pub index: u32,
    pub name: Option<String>,
    pub seconds: Option<u32>,
}

impl SndhInfo {
    /// Subtune count with the legacy default: no `##` tag (or `00`) means one.
    pub fn subtune_count(&self) -> u32 {
        match self.declared_subtunes {
            Some(n) if n > 0 => n,
            _ => 1,
        }
    }

    /// Rows for the subtune list, or `None` when the list would say nothing
    /// beyond a single duration. Rows past the TIME table have no seconds.
    pub fn subtune_rows(&self) -> Option<Vec<SubtuneRow>> {
        let has_names = !self.subtune_names.is_empty();
        if !has_names && self.subtune_lengths.len() <= 1 {
            return None;
        }
        if !has_names && self.subtune_lengths.iter().all(|&s| s == 0) {
            return None;
        }
        let count = self.subtune_names.len().max(self.subtune_lengths.len());
        let rows = (0..count)
            .map(|i| SubtuneRow {
                index: i as u32 + 1,
                name: has_names.then(|| self.subtune_names.get(i).cloned().unwrap_or_default()),
                seconds: self.subtune_lengths.get(i).copied(),
            })
            .collect();
        Some(rows)
    }

    /// Length of the whole song when the file has one unnamed duration.
    pub fn duration(&self) -> Option<u32> {
        match self.subtune_lengths.as_slice() {
            [secs] if self.subtune_names.is_empty() => Some(*secs),
            _ => None,
        }
    }

    pub fn fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        let text = |out: &mut Vec<Field>, name: &str, v: &Option<String>| {
            if let Some(s) = v {
                out.push(Field::text(name, s.trim_end()));
            }
        };
        text(&mut out, "Song Title", &self.title);
        text(&mut out, "Composer", &self.composer);
        text(&mut out, "Ripper", &self.ripper);
        text(&mut out, "Converter", &self.converter);
        if let Some(y) = self.year {
            out.push(Field::text("Year of Release", y.to_string()));
        }
        out.push(Field::text("# of Subtunes", self.subtune_count().to_string()));
        if let Some(hz) = self.vblank_freq {
            out.push(Field::text("VBlank Freq", format_frequency(hz)));
        }
        for (i, hz) in self.timer_freq.iter().enumerate() {
            if let Some(hz) = hz {
                let name = format!("Timer {} Freq", char::from(b'A' + i as u8));
                out.push(Field::text(&name, format_frequency(*hz)));
            }
        }
        if self.subtune_count() > 1
            && let Some(def) = self.default_subtune
        {
            out.push(Field::text("Default Subtune", def.to_string()));
        }
        if let Some(rows) = self.subtune_rows() {
            out.push(Field::new("Subtune List", subtune_list_value(&rows)));
        } else if let Some(secs) = self.duration() {
            out.push(Field::text("Duration", format_duration(secs)));
        }
        out
    }
}

fn subtune_list_value(rows: &[SubtuneRow]) -> FieldValue {
    let mut columns = vec!["#".to_string()];
    let has_times = rows.iter().any(|r| r.seconds.is_some());
    if rows.first().is_some_and(|r| r.name.is_some()) {
        columns.push("Name".to_string());
    }
    if has_times {
        columns.push("Duration".to_string());
    }
    let rows = rows
        .iter()
        .map(|r| {
            let mut row = vec![r.index.to_string()];
            if let Some(n) = &r.name {
                row.push(n.clone());
            }
            if has_times {
                row.push(r.seconds.map(format_duration).unwrap_or_default());
            }
            row
        })
        .collect();
    FieldValue::List { columns, rows }
}

/// Builder filled in by the tag handlers of one scan.
#[derive(Default)]
struct Tags {
    info: SndhInfo,
    names_seen: bool,
}

impl Tags {
    fn subtune_count(&self) -> usize {
        self.info.subtune_count() as usize
    }

    fn read_names(
        &mut self,
        tag_start: usize,
        cursor: &mut BoundedCursor<'_>,
    ) -> std::result::Result<(), ParseError> {
        let buf = cursor.buffer();
        let count = self.subtune_count();
        let mut names = Vec::with_capacity(count);
        // resume after the table at least, even if every string sits before it
        let mut furthest = cursor.pos() + count * 2;
        for _ in 0..count {
            let rel = usize::from(cursor.read_be16()?);
            let mut s = BoundedCursor::at(buf, tag_start + rel)?;
            names.push(s.read_cstring()?);
            furthest = furthest.max(s.pos());
        }
        cursor.seek(furthest)?;
        self.info.subtune_names = names;
        Ok(())
    }

    fn read_times(&mut self, cursor: &mut BoundedCursor<'_>) -> std::result::Result<(), ParseError> {
        let count = self.subtune_count();
        let table = cursor.read_fixed(count * 2)?;
        self.info.subtune_lengths = table
            .chunks_exact(2)
            .map(|w| u32::from(u16::from_be_bytes([w[0], w[1]])))
            .collect();
        Ok(())
    }

    fn read_year(&mut self, cursor: &mut BoundedCursor<'_>) -> std::result::Result<(), ParseError> {
        match cursor.read_decimal_cstring() {
            Ok(y) => {
                self.info.year = (y != 0).then_some(y);
                Ok(())
            }
            // e.g. "1995/2013" or "198x": keep the leading number
            Err(bad) if bad.partial != 0 => {
                debug!(year = bad.partial, "keeping leading digits of year tag");
                self.info.year = Some(bad.partial);
                cursor.skip_cstring()
            }
            Err(bad) => Err(bad.error),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn non_zero(n: u32) -> Option<u32> {
    (n != 0).then_some(n)
}

/// Strict decimal: any stray byte is an error.
fn number(cursor: &mut BoundedCursor<'_>) -> std::result::Result<u32, ParseError> {
    cursor.read_decimal_cstring().map_err(|bad| bad.error)
}

impl TagHandler for Tags {
    type Tag = Tag;

    fn handle(
        &mut self,
        tag: Tag,
        tag_start: usize,
        cursor: &mut BoundedCursor<'_>,
    ) -> std::result::Result<Flow, ParseError> {
        match tag {
            Tag::Title => self.info.title = non_empty(cursor.read_cstring()?),
            Tag::Composer => self.info.composer = non_empty(cursor.read_cstring()?),
            Tag::Ripper => self.info.ripper = non_empty(cursor.read_cstring()?),
            Tag::Converter => self.info.converter = non_empty(cursor.read_cstring()?),
            Tag::Year => self.read_year(cursor)?,
            Tag::SubtuneNames => {
                if self.names_seen {
                    return Err(ParseError::malformed(tag_start, "duplicate subtune name table"));
                }
                self.names_seen = true;
                if let Err(e) = self.read_names(tag_start, cursor) {
                    // never hand out half a table
                    self.info.subtune_names.clear();
                    return Err(e);
                }
            }
            Tag::Time => self.read_times(cursor)?,
            Tag::End => return Ok(Flow::End),
            Tag::SubtuneCount => {
                // exactly two digits, no terminator
                let digits = cursor.read_fixed(2)?;
                if !digits.iter().all(u8::is_ascii_digit) {
                    return Err(ParseError::malformed(tag_start + 2, "subtune count is not two digits"));
                }
                self.info.declared_subtunes =
                    Some(u32::from(digits[0] - b'0') * 10 + u32::from(digits[1] - b'0'));
            }
            Tag::VblankFreq => self.info.vblank_freq = non_zero(number(cursor)?),
            Tag::Timer(idx) => {
                // a timer tag without digits is where headers missing HDNS end
                if !cursor.peek_u8().is_some_and(|b| b.is_ascii_digit()) {
                    return Ok(Flow::End);
                }
                self.info.timer_freq[idx] = non_zero(number(cursor)?);
            }
            Tag::DefaultSubtune => self.info.default_subtune = non_zero(number(cursor)?),
        }
        Ok(Flow::Continue)
    }
}

/// Scan the tags of a buffer that already passed [`check_header`].
pub fn scan_tags(header: &[u8]) -> SndhInfo {
    let mut tags = Tags::default();
    let end = match BoundedCursor::at(header, PROLOGUE_LEN) {
        Ok(mut cursor) => dispatch(&mut cursor, &TAGS, &mut tags),
        Err(e) => ScanEnd::Stopped(e),
    };
    if let ScanEnd::Stopped(e) = &end {
        warn!(error = %e, "SNDH tag scan stopped early; keeping tags read so far");
    }
    tags.info.scan_end = end;
    tags.info
}

/// Identify and parse an in-memory SNDH header.
pub fn parse(header: &[u8]) -> Result<SndhInfo> {
    if is_ice_packed(header) {
        return Err(Error::Unsupported("SNDH packed with Pack-Ice".into()));
    }
    if !check_header(header) {
        return Err(Error::Rejected);
    }
    Ok(scan_tags(header))
}

/// Read the first `limit` bytes of `src` and parse them.
pub fn read<S: ByteSource + ?Sized>(src: &mut S, limit: usize) -> Result<SndhInfo> {
    let header = src.read_header(0, limit)?;
    parse(&header)
}
