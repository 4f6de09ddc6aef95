//! Byte sources the parser reads frames from.

use std::{
    borrow::Cow,
    io::{self, Read, Seek, SeekFrom},
};

use crate::sans::range::ByteRange;

/// Random-access view of a stream that may grow between reads.
///
/// The parser borrows a source for the duration of each call and never
/// closes it.
pub trait ByteSource {
    /// Number of bytes currently available.
    fn available(&mut self) -> io::Result<usize>;

    /// Read the bytes of a range.
    ///
    /// The range is clamped to the bytes currently available, so fewer bytes
    /// than requested (possibly none) may be returned.
    fn read(&mut self, range: ByteRange) -> io::Result<Cow<'_, [u8]>>;
}

impl ByteSource for &[u8] {
    fn available(&mut self) -> io::Result<usize> {
        Ok(self.len())
    }

    fn read(&mut self, range: ByteRange) -> io::Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(clamp(self, range)))
    }
}

impl ByteSource for Vec<u8> {
    fn available(&mut self) -> io::Result<usize> {
        Ok(self.len())
    }

    fn read(&mut self, range: ByteRange) -> io::Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(clamp(self, range)))
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn read(&mut self, range: ByteRange) -> io::Result<Cow<'_, [u8]>> {
        (**self).read(range)
    }
}

fn clamp(r: &[u8], range: ByteRange) -> &[u8] {
    let end = range.end().min(r.len());
    r.get(range.start()..end).unwrap_or_default()
}

/// A source backed by a seekable reader, such as a file.
///
/// The length of the reader is queried on every call to
/// [`available`](ByteSource::available), so bytes appended to a file by
/// another process are seen as they arrive.
#[derive(Debug)]
pub struct SeekSource<R> {
    inner: R,
}

impl<R: Read + Seek> SeekSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteSource for SeekSource<R> {
    fn available(&mut self) -> io::Result<usize> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        usize::try_from(len).map_err(|_| io::Error::other("stream too long"))
    }

    fn read(&mut self, range: ByteRange) -> io::Result<Cow<'_, [u8]>> {
        let end = range.end().min(self.available()?);
        let Some(range) = ByteRange::new(range.start(), end) else {
            return Ok(Cow::Owned(Vec::new()));
        };

        self.inner.seek(SeekFrom::Start(range.start() as u64))?;

        let mut buf = vec![0; range.len()];
        self.inner.read_exact(&mut buf)?;

        Ok(Cow::Owned(buf))
    }
}
