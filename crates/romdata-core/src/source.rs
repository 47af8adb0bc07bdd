//! Positional byte reads from whatever holds the file.
//!
//! Parsers never stream: they ask for one bounded window at an absolute
//! offset, get back however many bytes exist there, and treat a short read
//! as "not enough data for this format".

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

pub trait ByteSource {
    /// Read up to `buf.len()` bytes at `offset`. Returns the count read;
    /// 0 means end of data.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total size, if the source knows it.
    fn size(&mut self) -> Option<u64> {
        None
    }

    /// Fill as much of `buf` as the source has, retrying partial reads.
    fn read_full_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut done = 0;
        while done < buf.len() {
            match self.read_at(offset + done as u64, &mut buf[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    /// Up to `len` bytes at `offset`; the vector is shorter on a short read.
    fn read_header(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.read_full_at(offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&mut self) -> Option<u64> {
        (**self).size()
    }
}

impl ByteSource for File {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(buf)
    }

    fn size(&mut self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}

impl ByteSource for &[u8] {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(avail) = self.get(start..) else {
            return Ok(0);
        };
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        Ok(n)
    }

    fn size(&mut self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.as_slice().read_at(offset, buf)
    }

    fn size(&mut self) -> Option<u64> {
        Some(self.len() as u64)
    }
}
