//! Scanner for self-describing streams of ASCII tag codes.
//!
//! Tag codes are one to four ASCII bytes compared as a single big-endian
//! integer. Codes are not self-delimiting, so at every position the 4-byte
//! set is tried before the 2-byte set: a 2-byte prefix of a 4-byte code
//! must never be taken for a shorter tag.
//!
//! Handler errors end the scan but never the parse. The caller keeps
//! whatever its handler stored before the failure, and [`ScanEnd`] says
//! how the scan finished.

use tracing::debug;

use crate::cursor::BoundedCursor;
use crate::error::ParseError;

/// Comparison value for a 4-byte tag code.
pub const fn wide_code(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// Comparison value for a 2-byte tag code.
pub const fn narrow_code(code: &[u8; 2]) -> u16 {
    u16::from_be_bytes(*code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Wide,
    Narrow,
}

impl Width {
    pub const fn len(self) -> usize {
        match self {
            Width::Wide => 4,
            Width::Narrow => 2,
        }
    }
}

/// The known codes of one format, split by width.
pub struct TagSet<T: 'static> {
    pub wide: &'static [(u32, T)],
    pub narrow: &'static [(u16, T)],
}

impl<T: Copy> TagSet<T> {
    /// Match the bytes under the cursor, wide codes first.
    pub fn match_at(&self, cursor: &BoundedCursor<'_>) -> Option<(T, Width)> {
        if let Some(code) = cursor.peek_be32()
            && let Some((_, tag)) = self.wide.iter().find(|(c, _)| *c == code)
        {
            return Some((*tag, Width::Wide));
        }
        let code = cursor.peek_be16()?;
        self.narrow
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, tag)| (*tag, Width::Narrow))
    }
}

/// What a handler wants after consuming its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The handler recognized the end of the tag area.
    End,
}

/// How a scan finished.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanEnd {
    /// An end tag (or an implicit end) was reached.
    EndTag,
    /// The cursor ran out of bytes between tags.
    #[default]
    Exhausted,
    /// A tag failed to decode or an unknown byte appeared.
    Stopped(ParseError),
}

impl ScanEnd {
    pub fn error(&self) -> Option<&ParseError> {
        match self {
            ScanEnd::Stopped(e) => Some(e),
            _ => None,
        }
    }
}

pub trait TagHandler {
    type Tag: Copy;

    /// Consume the payload of `tag`. The cursor sits just past the tag
    /// code; `tag_start` is the position of the code's first byte, for
    /// payloads that hold offsets relative to it.
    fn handle(
        &mut self,
        tag: Self::Tag,
        tag_start: usize,
        cursor: &mut BoundedCursor<'_>,
    ) -> Result<Flow, ParseError>;
}

/// Inter-tag padding: NUL and ASCII space.
fn is_padding(b: u8) -> bool {
    b == 0 || b == b' '
}

/// Run `handler` over every tag from the cursor's position onward.
pub fn dispatch<H: TagHandler>(
    cursor: &mut BoundedCursor<'_>,
    tags: &TagSet<H::Tag>,
    handler: &mut H,
) -> ScanEnd {
    while let Some(b) = cursor.peek_u8() {
        let tag_start = cursor.pos();
        let Some((tag, width)) = tags.match_at(cursor) else {
            if is_padding(b) {
                cursor.skip_while(is_padding);
                continue;
            }
            debug!(offset = tag_start, byte = b, "unknown tag byte, stopping scan");
            cursor.exhaust();
            return ScanEnd::Stopped(ParseError::malformed(
                tag_start,
                format!("unknown tag byte {b:#04x}"),
            ));
        };
        // match_at only succeeds when the whole code is in range
        if let Err(e) = cursor.skip(width.len()) {
            cursor.exhaust();
            return ScanEnd::Stopped(e);
        }
        match handler.handle(tag, tag_start, cursor) {
            Ok(Flow::Continue) => {}
            Ok(Flow::End) => return ScanEnd::EndTag,
            Err(e) => {
                debug!(offset = tag_start, error = %e, "tag handler failed, stopping scan");
                cursor.exhaust();
                return ScanEnd::Stopped(e);
            }
        }
    }
    ScanEnd::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum T {
        Name,
        Stop,
        Short,
        Num,
    }

    static SET: TagSet<T> = TagSet {
        wide: &[
            (wide_code(b"NAME"), T::Name),
            (wide_code(b"STOP"), T::Stop),
            (wide_code(b"NUMB"), T::Num),
        ],
        narrow: &[(narrow_code(b"NA"), T::Short)],
    };

    #[derive(Default)]
    struct Collect {
        seen: Vec<(T, usize)>,
        names: Vec<String>,
    }

    impl TagHandler for Collect {
        type Tag = T;
        fn handle(
            &mut self,
            tag: T,
            tag_start: usize,
            cursor: &mut BoundedCursor<'_>,
        ) -> Result<Flow, ParseError> {
            self.seen.push((tag, tag_start));
            match tag {
                T::Name => self.names.push(cursor.read_cstring()?),
                T::Num => {
                    cursor.read_decimal_cstring().map_err(|b| b.error)?;
                }
                T::Short => {}
                T::Stop => return Ok(Flow::End),
            }
            Ok(Flow::Continue)
        }
    }

    fn run(data: &[u8]) -> (Collect, ScanEnd, usize) {
        let mut c = BoundedCursor::new(data);
        let mut h = Collect::default();
        let end = dispatch(&mut c, &SET, &mut h);
        (h, end, c.pos())
    }

    #[test]
    fn wide_codes_win_over_narrow_prefix() {
        let (h, end, _) = run(b"NAMEabc\0NASTOP");
        assert_eq!(h.names, vec!["abc"]);
        assert_eq!(h.seen, vec![(T::Name, 0), (T::Short, 8), (T::Stop, 10)]);
        assert_eq!(end, ScanEnd::EndTag);
    }

    #[test]
    fn padding_is_skipped_and_exhaustion_ends_cleanly() {
        let (h, end, _) = run(b"\0\0  NAMEx\0 \0");
        assert_eq!(h.names, vec!["x"]);
        assert_eq!(end, ScanEnd::Exhausted);
    }

    #[test]
    fn garbage_byte_stops_but_keeps_earlier_tags() {
        let (h, end, pos) = run(b"NAMEkept\0\xffNAMElost\0");
        assert_eq!(h.names, vec!["kept"]);
        assert!(matches!(
            end,
            ScanEnd::Stopped(ParseError::Malformed { offset: 9, .. })
        ));
        assert_eq!(pos, 19);
    }

    #[test]
    fn handler_error_stops_scan() {
        let (h, end, _) = run(b"NAMEok\0NUMB12x\0NAMEnever\0");
        assert_eq!(h.names, vec!["ok"]);
        assert!(end.error().is_some());
    }

    #[test]
    fn truncated_wide_code_falls_back_or_stops() {
        // "NAM" cannot match NAME; "NA" matches the narrow tag, then "M" is garbage
        let (h, end, _) = run(b"NAM");
        assert_eq!(h.seen, vec![(T::Short, 0)]);
        assert!(matches!(end, ScanEnd::Stopped(_)));
    }
}
