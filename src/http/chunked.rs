//! Chunked transfer encoding support
//!
//! Reassembles a complete chunked body (RFC 7230 section 4.1) that has
//! already been read to the end of the connection. The decoder is strict
//! about framing: a chunk that is not followed by CRLF is an error, never a
//! silent truncation, since broken framing is exactly what tests look for.

use super::CRLF;

/// Chunked body errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkedError {
    #[error("Invalid chunk size: {line:?}")]
    InvalidChunkSize { line: String },

    #[error("Chunk of length {chunk_len} not terminated by CRLF; remaining data: {remaining:?}")]
    MissingCrlf { chunk_len: usize, remaining: String },

    #[error("Chunk declares {expected} bytes but only {available} remain")]
    Truncated { expected: usize, available: usize },

    #[error("Chunked body ended without a zero-size chunk")]
    UnexpectedEnd,
}

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    ReadSize,
    ReadData,
    ExpectCrlf,
    Done,
    Error,
}

/// Chunked body decoder
///
/// Drives `ReadSize -> ReadData -> ExpectCrlf -> (ReadSize | Done)` over an
/// input buffer, moving to `Error` from any state on bad framing.
pub struct ChunkedDecoder<'a> {
    input: &'a [u8],
    pos: usize,
    state: ChunkState,
    chunk_size: usize,
    body: Vec<u8>,
}

impl<'a> ChunkedDecoder<'a> {
    /// Create a decoder over the body area of a response
    pub fn new(input: &'a str) -> Self {
        Self::from_bytes(input.as_bytes())
    }

    /// Create a decoder over raw body bytes; chunk sizes count these bytes
    pub fn from_bytes(input: &'a [u8]) -> Self {
        ChunkedDecoder {
            input,
            pos: 0,
            state: ChunkState::ReadSize,
            chunk_size: 0,
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Advance one state
    pub fn step(&mut self) -> Result<ChunkState, ChunkedError> {
        let result = match self.state {
            ChunkState::ReadSize => self.read_size(),
            ChunkState::ReadData => self.read_data(),
            ChunkState::ExpectCrlf => self.expect_crlf(),
            ChunkState::Done | ChunkState::Error => Ok(self.state),
        };

        match result {
            Ok(next) => {
                self.state = next;
                Ok(next)
            }
            Err(e) => {
                self.state = ChunkState::Error;
                Err(e)
            }
        }
    }

    /// Run to completion and return the reassembled body
    pub fn finish(mut self) -> Result<String, ChunkedError> {
        while self.step()? != ChunkState::Done {}
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }

    fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    fn read_size(&mut self) -> Result<ChunkState, ChunkedError> {
        let rest = self.remaining();
        if rest.is_empty() {
            return Err(ChunkedError::UnexpectedEnd);
        }

        let line_len = find_crlf(rest).ok_or_else(|| ChunkedError::InvalidChunkSize {
            line: String::from_utf8_lossy(rest).into_owned(),
        })?;
        let line = String::from_utf8_lossy(&rest[..line_len]);

        // Chunk extensions (after ';') are ignored
        let size_str = line.split(';').next().unwrap_or("").trim();
        self.chunk_size = usize::from_str_radix(size_str, 16).map_err(|_| {
            ChunkedError::InvalidChunkSize {
                line: line.to_string(),
            }
        })?;
        self.pos += line_len + CRLF.len();

        if self.chunk_size == 0 {
            Ok(ChunkState::Done)
        } else {
            Ok(ChunkState::ReadData)
        }
    }

    fn read_data(&mut self) -> Result<ChunkState, ChunkedError> {
        let rest = self.remaining();
        if rest.len() < self.chunk_size {
            return Err(ChunkedError::Truncated {
                expected: self.chunk_size,
                available: rest.len(),
            });
        }

        self.body.extend_from_slice(&rest[..self.chunk_size]);
        self.pos += self.chunk_size;
        Ok(ChunkState::ExpectCrlf)
    }

    fn expect_crlf(&mut self) -> Result<ChunkState, ChunkedError> {
        let rest = self.remaining();
        if !rest.starts_with(CRLF.as_bytes()) {
            return Err(ChunkedError::MissingCrlf {
                chunk_len: self.chunk_size,
                remaining: String::from_utf8_lossy(rest).into_owned(),
            });
        }

        self.pos += CRLF.len();
        Ok(ChunkState::ReadSize)
    }
}

/// Find CRLF in buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Decode a complete chunked body
pub fn decode_chunked_body(input: &str) -> Result<String, ChunkedError> {
    ChunkedDecoder::new(input).finish()
}

/// Decode a complete chunked body read from the wire
///
/// The reassembled bytes are converted to text only after framing, so
/// non-UTF-8 chunks keep their declared lengths.
pub fn decode_chunked_bytes(input: &[u8]) -> Result<String, ChunkedError> {
    ChunkedDecoder::from_bytes(input).finish()
}

/// Encode data as a chunked body with chunks of at most `chunk_size` bytes
///
/// Handy for building request bodies that a test then corrupts.
pub fn encode_chunked_body(data: &str, chunk_size: usize) -> String {
    let mut output = String::new();
    for chunk in data.as_bytes().chunks(chunk_size.max(1)) {
        output.push_str(&format!("{:x}{}", chunk.len(), CRLF));
        output.push_str(&String::from_utf8_lossy(chunk));
        output.push_str(CRLF);
    }
    output.push_str(&format!("0{}{}", CRLF, CRLF));
    output
}
