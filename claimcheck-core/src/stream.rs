use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use parking_lot::Mutex;

/// Upper bound on what is reserved up front for a declared length
const READ_CHUNK: u64 = 64 * 1024;

type SharedReader = Arc<Mutex<Box<dyn Read + Send>>>;

/// Shareable handle to a streamed record value.
///
/// Clones read from the same underlying reader, so a record can be kept
/// aside by the pipeline while an interceptor consumes its stream.
#[derive(Clone)]
pub struct PayloadStream {
    inner: SharedReader,
}

impl PayloadStream {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    /// Stream over an in-memory buffer
    pub fn from_bytes<B: AsRef<[u8]> + Send + 'static>(bytes: B) -> Self {
        Self::new(Cursor::new(bytes))
    }

    /// Read exactly `len` bytes. Memory grows with what the stream
    /// delivers, not with the declared length.
    pub fn read_exact_vec(&self, len: u64) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(len.min(READ_CHUNK) as usize);
        let mut reader = self.inner.lock();
        let read = reader.by_ref().take(len).read_to_end(&mut buffer)? as u64;
        if read != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {read} of {len} bytes"),
            ));
        }
        Ok(buffer)
    }

    /// Drain the stream
    pub fn read_to_end_vec(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.inner.lock().read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

impl Read for PayloadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.lock().read(buf)
    }
}

impl fmt::Debug for PayloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_position() {
        let stream = PayloadStream::from_bytes(b"hello world".to_vec());
        let other = stream.clone();

        assert_eq!(stream.read_exact_vec(5).unwrap(), b"hello");
        assert_eq!(other.read_to_end_vec().unwrap(), b" world");
    }

    #[test]
    fn test_read_exact_on_short_stream_fails() {
        let stream = PayloadStream::from_bytes(b"abc".to_vec());
        let err = stream.read_exact_vec(4).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_exact_with_absurd_length_fails_without_allocating() {
        let stream = PayloadStream::from_bytes(b"abc".to_vec());

        let err = stream.read_exact_vec(u64::MAX).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("after 3 of"));
    }

    #[test]
    fn test_read_exact_leaves_the_rest() {
        let stream = PayloadStream::from_bytes(vec![7u8; 100_000]);

        assert_eq!(stream.read_exact_vec(70_000).unwrap().len(), 70_000);
        assert_eq!(stream.read_to_end_vec().unwrap().len(), 30_000);
    }
}
