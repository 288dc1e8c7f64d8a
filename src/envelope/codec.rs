//! # JSON-lines envelope codec.
//!
//! One envelope per line, UTF-8 JSON. Framing is done by
//! [`tokio_util::codec::LinesCodec`]; [`EnvelopeDecoder`] maps lines to envelopes.
//!
//! ## Rules
//! - Writers drain whatever is queued before honoring a close request.
//! - Blank lines are ignored by readers (`decode` reports them as malformed).
//! - Malformed, non-UTF-8 and overlong lines are a [`ProtocolError`]: logged and
//!   dropped, never fatal to the stream. Only I/O errors end it.
//! - [`encode`] refuses envelopes longer than [`MAX_LINE_LENGTH`].

use std::io;

use futures::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use super::Envelope;
use crate::error::ProtocolError;

/// Upper bound of one encoded envelope.
pub const MAX_LINE_LENGTH: usize = 1 << 20;

/// Encodes one envelope as a single JSON line (without the trailing newline).
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    let line = serde_json::to_string(envelope)?;
    if line.len() > MAX_LINE_LENGTH {
        return Err(ProtocolError::Oversized {
            len: line.len(),
            max: MAX_LINE_LENGTH,
        });
    }
    Ok(line)
}

/// Decodes one JSON line.
pub fn decode(line: &str) -> Result<Envelope, ProtocolError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Line decoder yielding envelopes and skipping every line that is not one.
#[derive(Debug)]
pub struct EnvelopeDecoder {
    lines: LinesCodec,
}

impl EnvelopeDecoder {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }

    fn next_envelope(
        &mut self,
        buf: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<Envelope>, LinesCodecError> {
        loop {
            let line = if eof {
                self.lines.decode_eof(buf)
            } else {
                self.lines.decode(buf)
            };
            match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match decode(&line) {
                    Ok(envelope) => return Ok(Some(envelope)),
                    Err(e) => {
                        tracing::warn!(label = e.as_label(), error = %e, "dropping inbound line");
                    }
                },
                Ok(None) => return Ok(None),
                // LinesCodec has already consumed (or is discarding) the bad line.
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(max = MAX_LINE_LENGTH, "dropping overlong inbound line");
                }
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    tracing::warn!(error = %e, "dropping non UTF-8 inbound line");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for EnvelopeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeDecoder {
    type Item = Envelope;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Envelope>, LinesCodecError> {
        self.next_envelope(buf, false)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Envelope>, LinesCodecError> {
        self.next_envelope(buf, true)
    }
}

/// Turns a byte reader into a stream of envelopes.
///
/// The stream ends at EOF or on an I/O error; lines that are not envelopes are skipped.
pub fn read_envelopes<R>(reader: R) -> impl Stream<Item = Envelope> + Unpin + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let frames = FramedRead::new(reader, EnvelopeDecoder::new());
    Box::pin(
        frames
            .take_while(|frame| {
                if let Err(e) = frame {
                    tracing::warn!(error = %e, "envelope stream closed on read error");
                }
                futures::future::ready(frame.is_ok())
            })
            .filter_map(|frame| futures::future::ready(frame.ok())),
    )
}

/// Writes envelopes from `pending` to `writer`, one line each, flushing per line.
///
/// Stops when every sender is gone, when the writer fails, or once `closing` is
/// cancelled and nothing is left queued.
pub async fn write_envelopes<W>(
    writer: W,
    mut pending: mpsc::UnboundedReceiver<Envelope>,
    closing: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    loop {
        let envelope = tokio::select! {
            biased;
            envelope = pending.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
            _ = closing.cancelled() => break,
        };
        let line = match encode(&envelope) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(label = e.as_label(), error = %e, "dropping outbound envelope");
                continue;
            }
        };
        if let Err(e) = sink.send(line).await {
            tracing::debug!(error = %e, "envelope sink closed");
            break;
        }
    }
}
