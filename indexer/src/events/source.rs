//! Inbound block sources.
//!
//! How blocks are fetched from the chain is outside the indexer. A
//! [`BlockSource`] only has to yield decoded blocks in height order;
//! [`FrameBlockSource`] reads them as length-prefixed protobuf frames from
//! any async reader.

use async_trait::async_trait;
use chainbook_sdk::proto::IndexerTendermintBlock;
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::types::Block;
use crate::error::{EncodingError, IndexerError};

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Yields blocks in height order.
#[async_trait]
pub trait BlockSource: Send {
    /// Returns the next block, or `None` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or a block cannot be decoded.
    async fn next_block(&mut self) -> Result<Option<Block>, IndexerError>;
}

/// Reads `u32` big-endian length-prefixed `IndexerTendermintBlock` frames.
#[derive(Debug)]
pub struct FrameBlockSource<R> {
    reader: R,
    max_frame_bytes: usize,
}

impl<R> FrameBlockSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a source over `reader`.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Sets the largest accepted frame.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }
}

/// Encodes a block as one frame.
#[must_use]
pub fn encode_frame(block: &IndexerTendermintBlock) -> Vec<u8> {
    let body = block.encode_to_vec();
    let len = u32::try_from(body.len()).unwrap_or(u32::MAX);
    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    frame
}

#[async_trait]
impl<R> BlockSource for FrameBlockSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_block(&mut self) -> Result<Option<Block>, IndexerError> {
        let len = match self.reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(IndexerError::Source(e.to_string())),
        };
        if len > self.max_frame_bytes {
            return Err(IndexerError::Source(format!(
                "frame of {len} bytes exceeds limit of {}",
                self.max_frame_bytes
            )));
        }

        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(|e| IndexerError::Source(format!("truncated frame: {e}")))?;

        let proto = IndexerTendermintBlock::decode(body.as_slice())
            .map_err(|e| EncodingError::new("block", 0, e.to_string()))?;
        Ok(Some(Block::try_from(proto)?))
    }
}
