//! Shared sink of the reads.
//! Workers hand over whole buffers, so records are never interleaved.
//! Both mates of a pair are written under the same lock, keeping the two files in lockstep.
use definitions::ReadLayout;
use std::fs::File;
use std::io::{BufWriter, Error, ErrorKind, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub trait ReadSink {
    fn write_single(&self, buf: &[u8]) -> std::io::Result<()>;
    fn write_pair(&self, first: &[u8], second: &[u8]) -> std::io::Result<()>;
}

#[derive(Debug)]
enum Outputs<W> {
    Single(W),
    Paired(W, W),
}

#[derive(Debug)]
pub struct SeqWriter<W: Write> {
    outputs: Mutex<Outputs<W>>,
}

impl SeqWriter<BufWriter<File>> {
    /// Create `{prefix}.fq` for single-end, `{prefix}_1.fq` and `{prefix}_2.fq` for paired-end reads.
    pub fn create<P: AsRef<Path>>(prefix: P, layout: ReadLayout) -> std::io::Result<Self> {
        let prefix = prefix.as_ref().to_string_lossy().to_string();
        let open = |path: String| {
            debug!("OPEN\t{}", path);
            File::create(path).map(BufWriter::new)
        };
        match layout {
            ReadLayout::SE => Ok(Self::single(open(format!("{}.fq", prefix))?)),
            ReadLayout::PE => {
                let first = open(format!("{}_1.fq", prefix))?;
                let second = open(format!("{}_2.fq", prefix))?;
                Ok(Self::paired(first, second))
            }
        }
    }
}

impl<W: Write> SeqWriter<W> {
    pub fn single(wtr: W) -> Self {
        Self {
            outputs: Mutex::new(Outputs::Single(wtr)),
        }
    }
    pub fn paired(first: W, second: W) -> Self {
        Self {
            outputs: Mutex::new(Outputs::Paired(first, second)),
        }
    }
    pub fn flush(&self) -> std::io::Result<()> {
        match &mut *self.outputs.lock().unwrap_or_else(PoisonError::into_inner) {
            Outputs::Single(wtr) => wtr.flush(),
            Outputs::Paired(first, second) => {
                first.flush()?;
                second.flush()
            }
        }
    }
    /// Return the underlying writers. The second one is None for single-end output.
    pub fn into_inner(self) -> (W, Option<W>) {
        match self.outputs.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Outputs::Single(wtr) => (wtr, None),
            Outputs::Paired(first, second) => (first, Some(second)),
        }
    }
}

impl<W: Write + Send> ReadSink for SeqWriter<W> {
    fn write_single(&self, buf: &[u8]) -> std::io::Result<()> {
        match &mut *self.outputs.lock().unwrap_or_else(PoisonError::into_inner) {
            Outputs::Single(wtr) => wtr.write_all(buf),
            Outputs::Paired(..) => Err(Error::new(ErrorKind::InvalidInput, "single-end reads to paired output")),
        }
    }
    fn write_pair(&self, first: &[u8], second: &[u8]) -> std::io::Result<()> {
        match &mut *self.outputs.lock().unwrap_or_else(PoisonError::into_inner) {
            Outputs::Paired(wtr1, wtr2) => {
                wtr1.write_all(first)?;
                wtr2.write_all(second)
            }
            Outputs::Single(..) => Err(Error::new(ErrorKind::InvalidInput, "paired-end reads to single output")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn single() {
        let writer = SeqWriter::single(Vec::<u8>::new());
        writer.write_single(b"@0_1\nAC\n+\nII\n").unwrap();
        assert!(writer.write_pair(b"a", b"b").is_err());
        let (out, second) = writer.into_inner();
        assert_eq!(out, b"@0_1\nAC\n+\nII\n");
        assert!(second.is_none());
    }
    #[test]
    fn paired() {
        let writer = SeqWriter::paired(Vec::<u8>::new(), Vec::new());
        writer.write_pair(b"first", b"second").unwrap();
        writer.write_pair(b"1", b"2").unwrap();
        assert!(writer.write_single(b"x").is_err());
        writer.flush().unwrap();
        let (first, second) = writer.into_inner();
        assert_eq!(first, b"first1");
        assert_eq!(second.unwrap(), b"second2");
    }
}
