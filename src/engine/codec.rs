//! Line codec for the engine worker stream.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! misbehaving worker cannot exhaust memory with an unterminated or
//! oversized message. Each `\n`-terminated UTF-8 line is one complete
//! worker event.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum line length accepted from the worker: 256 KiB.
///
/// Worker events are small JSON objects; anything beyond this limit is a
/// protocol fault, not a legitimate message.
pub const MAX_LINE_BYTES: usize = 262_144;

/// Newline-delimited JSON codec for the worker's stdout/stdin streams.
#[derive(Debug)]
pub struct EngineCodec(LinesCodec);

impl EngineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for EngineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EngineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for EngineCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Engine(format!("worker line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
