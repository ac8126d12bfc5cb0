//! Outgoing body for batch requests.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// An encoded multipart payload, handed to hyper as one data frame.
///
/// The length is known up front, so hyper sends `Content-Length` rather than
/// chunked encoding.
#[derive(Default)]
pub struct TransportBody {
    pending: Option<Bytes>,
}

impl TransportBody {
    pub fn full(payload: Bytes) -> Self {
        Self {
            pending: (!payload.is_empty()).then_some(payload),
        }
    }
}

impl Body for TransportBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        Poll::Ready(self.get_mut().pending.take().map(|payload| Ok(Frame::data(payload))))
    }

    fn is_end_stream(&self) -> bool {
        self.pending.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.pending.as_ref().map_or(0, |payload| payload.len() as u64))
    }
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBody")
            .field("remaining", &self.pending.as_ref().map_or(0, Bytes::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_payload_is_one_frame() {
        let payload = Bytes::from_static(b"--__END_OF_PART__--\r\n");
        let mut body = TransportBody::full(payload.clone());
        assert_eq!(body.size_hint().exact(), Some(payload.len() as u64));

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), payload);
        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[test]
    fn test_empty_payload_ends_immediately() {
        let body = TransportBody::full(Bytes::new());
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }
}
