//! GameCube CISO sparse disc images.
//!
//! A 32 KiB header holds the magic, the block size and one byte per logical
//! block: 1 if the block is stored, 0 if it reads as zeros. Stored blocks
//! follow the header back to back in logical order.

use std::io;

use serde::Serialize;
use tracing::debug;

use crate::cursor::{le32_at, slice_at};
use crate::error::{Error, ParseError, Result};
use crate::model::Field;
use crate::source::ByteSource;

pub const MAGIC: [u8; 4] = *b"CISO";
pub const HEADER_SIZE: usize = 0x8000;
/// Map entries: everything in the header after magic and block size.
pub const MAP_SIZE: usize = HEADER_SIZE - 8;
pub const BLOCK_SIZE_MIN_SHIFT: u32 = 15;
pub const BLOCK_SIZE_MAX_SHIFT: u32 = 24;

/// Physical index of a block that is not stored.
const EMPTY: u16 = 0xFFFF;

/// Block sizes are powers of two from 32 KiB to 16 MiB. Anything else
/// (0x18 in particular, the PSP variant's header size) is another format.
pub fn is_valid_block_size(block_size: u32) -> bool {
    block_size.is_power_of_two()
        && (BLOCK_SIZE_MIN_SHIFT..=BLOCK_SIZE_MAX_SHIFT).contains(&block_size.trailing_zeros())
}

pub fn check_header(header: &[u8]) -> bool {
    header.len() >= 8
        && header[..4] == MAGIC
        && le32_at(header, 4).is_ok_and(is_valid_block_size)
}

/// Where a logical block's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "addr", rename_all = "snake_case")]
pub enum BlockAddr {
    /// Not stored; reads as zeros.
    Empty,
    /// Byte offset of the block in the image file.
    Physical(u64),
}

/// Logical to physical block translation.
#[derive(Debug, Clone)]
pub struct BlockMap {
    slots: Vec<u16>,
    block_size: u32,
    header_size: u64,
    highest_used: Option<usize>,
    used: usize,
}

impl BlockMap {
    /// Build the map from the per-slot bytes. Physical indices are handed
    /// out in ascending logical order; any byte other than 0 or 1 fails the
    /// whole map.
    pub fn from_slots(
        map: &[u8],
        block_size: u32,
        header_size: u64,
    ) -> std::result::Result<Self, ParseError> {
        if map.len() >= usize::from(EMPTY) {
            return Err(ParseError::malformed(0, "block map too large for 16-bit indices"));
        }
        let mut slots = vec![EMPTY; map.len()];
        let mut next: u16 = 0;
        let mut highest_used = None;
        for (i, &entry) in map.iter().enumerate() {
            match entry {
                0 => {}
                1 => {
                    slots[i] = next;
                    next += 1;
                    highest_used = Some(i);
                }
                other => {
                    return Err(ParseError::malformed(
                        i,
                        format!("block map entry {i} is {other:#04x}"),
                    ));
                }
            }
        }
        Ok(Self {
            slots,
            block_size,
            header_size,
            highest_used,
            used: usize::from(next),
        })
    }

    /// Number of logical slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn highest_used(&self) -> Option<usize> {
        self.highest_used
    }

    /// Count of stored blocks.
    pub fn used_blocks(&self) -> usize {
        self.used
    }

    /// Logical size of the disc: up to and including the last stored block.
    pub fn total_size(&self) -> u64 {
        self.highest_used
            .map_or(0, |i| (i as u64 + 1) * u64::from(self.block_size))
    }

    pub fn block_addr(&self, logical: usize) -> std::result::Result<BlockAddr, ParseError> {
        let phys = *self.slots.get(logical).ok_or(ParseError::OutOfBounds {
            offset: logical,
            len: 1,
            end: self.slots.len(),
        })?;
        if phys == EMPTY {
            return Ok(BlockAddr::Empty);
        }
        Ok(BlockAddr::Physical(
            self.header_size + u64::from(phys) * u64::from(self.block_size),
        ))
    }

    /// Every slot up to the last stored block.
    pub fn iter(&self) -> impl Iterator<Item = (usize, BlockAddr)> + '_ {
        let end = self.highest_used.map_or(0, |i| i + 1);
        (0..end).filter_map(|i| self.block_addr(i).ok().map(|a| (i, a)))
    }
}

/// Summary of a CISO image for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CisoInfo {
    pub block_size: u32,
    pub disc_size: u64,
    pub used_blocks: usize,
    pub total_blocks: usize,
}

impl CisoInfo {
    pub fn fields(&self) -> Vec<Field> {
        vec![
            Field::text("Block Size", format!("{} KiB", self.block_size / 1024)),
            Field::text("Disc Size", format!("{} bytes", self.disc_size)),
            Field::text("Stored Blocks", format!("{} of {}", self.used_blocks, self.total_blocks)),
        ]
    }
}

/// Random access to the logical disc inside a CISO file.
pub struct CisoImage<S> {
    source: S,
    map: BlockMap,
}

impl<S: ByteSource> CisoImage<S> {
    pub fn open(mut source: S) -> Result<Self> {
        let header = source.read_header(0, HEADER_SIZE)?;
        if !check_header(&header) {
            return Err(Error::Rejected);
        }
        let block_size = le32_at(&header, 4)?;
        let map = slice_at(&header, 8, MAP_SIZE)?;
        let map = BlockMap::from_slots(map, block_size, HEADER_SIZE as u64)?;
        debug!(
            block_size,
            used = map.used_blocks(),
            disc_size = map.total_size(),
            "opened CISO image"
        );
        Ok(Self { source, map })
    }

    pub fn block_map(&self) -> &BlockMap {
        &self.map
    }

    pub fn block_size(&self) -> u32 {
        self.map.block_size()
    }

    pub fn disc_size(&self) -> u64 {
        self.map.total_size()
    }

    pub fn phys_block_addr(&self, logical: usize) -> std::result::Result<BlockAddr, ParseError> {
        self.map.block_addr(logical)
    }

    pub fn info(&self) -> CisoInfo {
        CisoInfo {
            block_size: self.block_size(),
            disc_size: self.disc_size(),
            used_blocks: self.map.used_blocks(),
            total_blocks: self.map.highest_used().map_or(0, |i| i + 1),
        }
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> ByteSource for CisoImage<S> {
    /// Read logical disc bytes. Empty blocks read as zeros; reads stop at
    /// the disc size, or early if the image file is truncated.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        let disc_size = self.disc_size();
        if pos >= disc_size || buf.is_empty() {
            return Ok(0);
        }
        let block_size = u64::from(self.block_size());
        let want = (disc_size - pos).min(buf.len() as u64) as usize;
        let mut done = 0;
        while done < want {
            let at = pos + done as u64;
            let in_block = (at % block_size) as usize;
            let chunk_len = (block_size as usize - in_block).min(want - done);
            let chunk = &mut buf[done..done + chunk_len];
            let addr = self
                .map
                .block_addr((at / block_size) as usize)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            match addr {
                BlockAddr::Empty => chunk.fill(0),
                BlockAddr::Physical(base) => {
                    let got = self.source.read_full_at(base + in_block as u64, chunk)?;
                    if got < chunk_len {
                        debug!(offset = base, "CISO image truncated inside a stored block");
                        return Ok(done + got);
                    }
                }
            }
            done += chunk_len;
        }
        Ok(done)
    }

    fn size(&mut self) -> Option<u64> {
        Some(self.disc_size())
    }
}
