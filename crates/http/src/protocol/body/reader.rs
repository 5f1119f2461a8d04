use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;

use crate::protocol::ParseError;

/// A body that can park the unread tail of a data frame between `read` calls.
///
/// Implementors must hand out the parked bytes from `poll_frame` before polling for a new frame.
pub(crate) trait BufferedBody: Body<Data = Bytes, Error = ParseError> + Unpin {
    fn leftover(&mut self) -> &mut Bytes;
}

/// Copies body bytes into `buf`, returns 0 at end of stream.
pub(crate) async fn read_body<B: BufferedBody>(body: &mut B, buf: &mut [u8]) -> Result<usize, ParseError> {
    if buf.is_empty() {
        return Ok(0);
    }

    loop {
        let leftover = body.leftover();
        if !leftover.is_empty() {
            let n = buf.len().min(leftover.len());
            buf[..n].copy_from_slice(&leftover.split_to(n));
            return Ok(n);
        }

        match body.frame().await {
            None => return Ok(0),
            Some(frame) => {
                // trailers are kept by the body itself
                if let Ok(data) = frame?.into_data() {
                    *body.leftover() = data;
                }
            }
        }
    }
}

/// Reads and discards until end of stream.
pub(crate) async fn drain_body<B: BufferedBody>(body: &mut B) -> Result<(), ParseError> {
    body.leftover().clear();
    while let Some(frame) = body.frame().await {
        frame?;
    }
    Ok(())
}
