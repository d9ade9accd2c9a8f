use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Byte stream behind the cursor reader: a plain file, or a gzip file
/// presented as its decompressed contents.
///
/// Both variants expose the same `Read` + `Seek` surface, so the reader
/// never cares which one it is driving. All offsets are into the
/// *decoded* stream.
pub enum ByteSource {
    Plain(File),
    Gzip(GzipSource),
}

impl ByteSource {
    pub fn open<P: AsRef<Path>>(path: P, gzip: bool) -> io::Result<Self> {
        let path = path.as_ref();
        if gzip {
            Ok(ByteSource::Gzip(GzipSource::open(path)?))
        } else {
            Ok(ByteSource::Plain(File::open(path)?))
        }
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Plain(file) => file.read(buf),
            ByteSource::Gzip(gz) => gz.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ByteSource::Plain(file) => file.seek(pos),
            ByteSource::Gzip(gz) => gz.seek(pos),
        }
    }
}

/// Seekable view over a gzip stream.
///
/// gzip cannot be decompressed from an arbitrary offset, so forward
/// seeks skip decompressed bytes and backward seeks restart
/// decompression from the beginning of the file. Backward seeks are
/// therefore O(offset); a performance caveat, not a correctness
/// one.
pub struct GzipSource {
    path: PathBuf,
    decoder: GzDecoder<BufReader<File>>,
    pos: u64,
}

impl GzipSource {
    fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            decoder: GzDecoder::new(BufReader::new(file)),
            pos: 0,
        })
    }

    fn restart(&mut self) -> io::Result<()> {
        let file = File::open(&self.path)?;
        self.decoder = GzDecoder::new(BufReader::new(file));
        self.pos = 0;
        Ok(())
    }

    fn skip(&mut self, n: u64) -> io::Result<()> {
        let skipped = io::copy(&mut self.decoder.by_ref().take(n), &mut io::sink())?;
        self.pos += skipped;
        if skipped < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "seek past end of gzip stream",
            ));
        }
        Ok(())
    }
}

impl Read for GzipSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for GzipSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => {
                if delta >= 0 {
                    self.pos + delta as u64
                } else {
                    self.pos.checked_sub(delta.unsigned_abs()).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
                    })?
                }
            }
            SeekFrom::End(_) => {
                // The decoded length is unknown without decompressing
                // the whole stream.
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "cannot seek from the end of a gzip stream",
                ));
            }
        };

        if target < self.pos {
            self.restart()?;
        }
        self.skip(target - self.pos)?;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gzip_fixture(content: &[u8]) -> NamedTempFile {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(temp_file.reopen().unwrap(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
        temp_file
    }

    #[test]
    fn test_plain_source_read_and_seek() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"hello world").unwrap();
        temp_file.flush().unwrap();

        let mut src = ByteSource::open(temp_file.path(), false).unwrap();
        let mut buf = [0u8; 5];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        src.seek(SeekFrom::Start(6)).unwrap();
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_gzip_source_reads_decompressed_bytes() {
        let temp_file = gzip_fixture(b"hello world");

        let mut src = ByteSource::open(temp_file.path(), true).unwrap();
        let mut content = String::new();
        src.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_gzip_source_backward_seek_restarts() {
        let temp_file = gzip_fixture(b"0123456789");

        let mut src = ByteSource::open(temp_file.path(), true).unwrap();
        let mut buf = [0u8; 4];
        src.seek(SeekFrom::Start(6)).unwrap();
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"6789");

        // Backward seek re-decompresses from the start.
        src.seek(SeekFrom::Start(2)).unwrap();
        src.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"2345");
    }

    #[test]
    fn test_gzip_source_seek_from_end_unsupported() {
        let temp_file = gzip_fixture(b"data");

        let mut src = ByteSource::open(temp_file.path(), true).unwrap();
        assert!(src.seek(SeekFrom::End(0)).is_err());
    }
}
