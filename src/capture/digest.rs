//! Payload digesting.
//!
//! Two modes with different memory/latency trade-offs:
//! - Streaming: fixed 32 KiB read buffer, running SHA-256. Memory use is
//!   constant no matter how large the body is. The payload is never kept.
//! - Buffered: the whole body is read into memory first, then hashed in one
//!   pass. Required when the payload text must be retained in the record.
//!
//! Both modes produce identical digests for identical content.
//!
//! Error policy:
//! - End-of-stream terminates the read loop normally
//! - Any other read error aborts digesting; the partial count and partial
//!   hash are discarded and reported as `PutterError::BodyRead`

use crate::error::PutterError;
use sha2::{Digest as _, Sha256};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size for streaming mode.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// How a request body is consumed and hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMode {
    /// Incremental hashing over fixed-size reads. Never retains the payload.
    Streaming,
    /// Read everything, then hash. Keeps the payload text if `retain_payload`.
    Buffered { retain_payload: bool },
}

impl DigestMode {
    /// Pick the mode from the startup flags.
    ///
    /// Retention forces buffering, since the payload has to be in memory anyway.
    pub fn from_flags(buffer_request: bool, store_payload: bool) -> Self {
        if buffer_request || store_payload {
            DigestMode::Buffered {
                retain_payload: store_payload,
            }
        } else {
            DigestMode::Streaming
        }
    }
}

/// Result of consuming one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub bytes_consumed: u64,
    pub hex: String,
    /// Empty unless the mode retains payloads.
    pub payload: String,
}

/// Consume `reader` to end-of-stream and digest it according to `mode`.
pub async fn digest_body<R>(reader: &mut R, mode: DigestMode) -> Result<Digest, PutterError>
where
    R: AsyncRead + Unpin,
{
    match mode {
        DigestMode::Streaming => digest_streaming(reader).await,
        DigestMode::Buffered { retain_payload } => digest_buffered(reader, retain_payload).await,
    }
}

async fn digest_streaming<R>(reader: &mut R) -> Result<Digest, PutterError>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut consumed: u64 = 0;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(PutterError::BodyRead { consumed, source }),
        };
        hasher.update(&buf[..n]);
        consumed += n as u64;
    }

    Ok(Digest {
        bytes_consumed: consumed,
        hex: format!("{:x}", hasher.finalize()),
        payload: String::new(),
    })
}

async fn digest_buffered<R>(reader: &mut R, retain_payload: bool) -> Result<Digest, PutterError>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    if let Err(source) = reader.read_to_end(&mut body).await {
        return Err(PutterError::BodyRead {
            consumed: body.len() as u64,
            source,
        });
    }

    let hex = format!("{:x}", Sha256::digest(&body));
    let payload = if retain_payload {
        // Non-UTF-8 bytes are replaced; the hash is always over the raw bytes.
        String::from_utf8_lossy(&body).into_owned()
    } else {
        String::new()
    };

    Ok(Digest {
        bytes_consumed: body.len() as u64,
        hex,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    /// Yields `prefix` once, then fails with a connection reset.
    struct FailingReader {
        prefix: Option<Vec<u8>>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.prefix.take() {
                Some(bytes) => {
                    buf.put_slice(&bytes);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "peer reset",
                ))),
            }
        }
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(DigestMode::from_flags(false, false), DigestMode::Streaming);
        assert_eq!(
            DigestMode::from_flags(true, false),
            DigestMode::Buffered { retain_payload: false }
        );
        assert_eq!(
            DigestMode::from_flags(false, true),
            DigestMode::Buffered { retain_payload: true }
        );
    }

    #[tokio::test]
    async fn test_streaming_hello() {
        let mut body: &[u8] = b"hello";
        let digest = digest_body(&mut body, DigestMode::Streaming).await.unwrap();

        assert_eq!(digest.bytes_consumed, 5);
        assert_eq!(digest.hex, HELLO_SHA256);
        assert!(digest.payload.is_empty());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mut body: &[u8] = b"";
        let streamed = digest_body(&mut body, DigestMode::Streaming).await.unwrap();
        assert_eq!(streamed.bytes_consumed, 0);
        assert_eq!(streamed.hex, EMPTY_SHA256);

        let mut body: &[u8] = b"";
        let buffered = digest_body(&mut body, DigestMode::Buffered { retain_payload: true })
            .await
            .unwrap();
        assert_eq!(buffered, streamed);
    }

    #[tokio::test]
    async fn test_buffered_retains_payload() {
        let mut body: &[u8] = b"hello";
        let digest = digest_body(&mut body, DigestMode::Buffered { retain_payload: true })
            .await
            .unwrap();

        assert_eq!(digest.hex, HELLO_SHA256);
        assert_eq!(digest.payload, "hello");
    }

    #[tokio::test]
    async fn test_buffered_without_retention() {
        let mut body: &[u8] = b"hello";
        let digest = digest_body(&mut body, DigestMode::Buffered { retain_payload: false })
            .await
            .unwrap();

        assert_eq!(digest.hex, HELLO_SHA256);
        assert!(digest.payload.is_empty());
    }

    #[tokio::test]
    async fn test_modes_agree_across_many_chunks() {
        // Several full chunks plus a ragged tail, split over two sources.
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 1234)).map(|i| (i % 251) as u8).collect();
        let (head, tail) = data.split_at(CHUNK_SIZE / 2 + 7);

        let mut chained = head.chain(tail);
        let streamed = digest_body(&mut chained, DigestMode::Streaming).await.unwrap();

        let mut whole: &[u8] = &data;
        let buffered = digest_body(&mut whole, DigestMode::Buffered { retain_payload: false })
            .await
            .unwrap();

        assert_eq!(streamed.bytes_consumed, data.len() as u64);
        assert_eq!(streamed.hex, buffered.hex);
        assert_eq!(streamed.bytes_consumed, buffered.bytes_consumed);
    }

    #[tokio::test]
    async fn test_streaming_read_error_is_reported() {
        let mut reader = FailingReader {
            prefix: Some(b"partial".to_vec()),
        };
        let err = digest_body(&mut reader, DigestMode::Streaming).await.unwrap_err();

        match err {
            PutterError::BodyRead { consumed, source } => {
                assert_eq!(consumed, 7);
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("Expected BodyRead, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_buffered_read_error_is_reported() {
        let mut reader = FailingReader {
            prefix: Some(b"partial".to_vec()),
        };
        let err = digest_body(&mut reader, DigestMode::Buffered { retain_payload: true })
            .await
            .unwrap_err();

        assert!(matches!(err, PutterError::BodyRead { .. }));
    }
}
