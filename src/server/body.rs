use bytes::{Buf, Bytes};
use hyper::body::Body;
use std::error::Error as StdError;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Sequential byte source over an HTTP request body.
///
/// The digest engine reads fixed-size chunks from an `AsyncRead`; HTTP bodies
/// arrive as frames of arbitrary size. This adapter hands out at most what the
/// caller asked for and keeps the rest of the current frame for the next read.
///
/// - Data frames are read through in order
/// - Trailer frames are skipped
/// - End of body is reported as a zero-length read (EOF)
/// - A transport error becomes an `io::Error` (non-EOF read failure)
pub struct BodyReader<B> {
    body: B,
    pending: Bytes,
    finished: bool,
}

impl<B> BodyReader<B> {
    pub fn new(body: B) -> Self {
        Self {
            body,
            pending: Bytes::new(),
            finished: false,
        }
    }
}

impl<B> AsyncRead for BodyReader<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending[..n]);
                this.pending.advance(n);
                return Poll::Ready(Ok(()));
            }

            if this.finished {
                return Poll::Ready(Ok(()));
            }

            match ready!(Pin::new(&mut this.body).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        this.pending = data;
                    }
                }
                Some(Err(e)) => {
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, e)));
                }
                None => {
                    this.finished = true;
                }
            }
        }
    }
}
