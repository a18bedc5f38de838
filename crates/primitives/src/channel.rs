//! This module contains the node-side [Channel], which reassembles frames into channel data.

use crate::{params::ChannelID, BlockInfo, Frame};
use alloy_primitives::Bytes;
use hashbrown::HashMap;
use thiserror::Error;

/// An error adding a [Frame] to a [Channel].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The frame belongs to a different channel.
    #[error("Frame id does not match channel id")]
    FrameIdMismatch,
    /// A second closing frame was received.
    #[error("Cannot add ending frame to a closed channel")]
    ChannelClosed,
    /// A frame with this number was already buffered.
    #[error("Frame number {0} already exists")]
    FrameNumberExists(u16),
    /// The frame is numbered after the closing frame.
    #[error("Frame number {0} is greater than or equal to end frame number {1}")]
    FrameBeyondEndFrame(u16, u16),
}

/// A Channel is a set of batches that are split into at least one, but possibly multiple frames.
///
/// Frames are allowed to be ingested out of order. Once the frame marked `is_last` and every
/// frame before it have been added, the channel is ready to be read.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// The unique identifier for this channel
    id: ChannelID,
    /// The L1 block that the first frame of the channel was included in
    open_block: BlockInfo,
    /// Estimated memory size, used to drop the channel if we have too much data
    estimated_size: usize,
    /// True if the last frame has been buffered
    closed: bool,
    /// The highest frame number that has been ingested
    highest_frame_number: u16,
    /// The frame number of the frame where `is_last` is true.
    /// No other frame number may be higher than this.
    last_frame_number: u16,
    /// Frames by number
    inputs: HashMap<u16, Frame>,
    /// The highest L1 inclusion block that a frame was included in
    highest_l1_inclusion_block: BlockInfo,
}

impl Channel {
    /// Create a new [Channel] with the given [ChannelID] and opening [BlockInfo].
    pub fn new(id: ChannelID, open_block: BlockInfo) -> Self {
        Self { id, open_block, ..Default::default() }
    }

    /// Returns the [ChannelID] of the channel.
    pub const fn id(&self) -> ChannelID {
        self.id
    }

    /// Add a frame to the channel.
    ///
    /// Frames numbered past an already received closing frame, duplicates, and second closing
    /// frames are rejected and leave the channel unchanged.
    pub fn add_frame(
        &mut self,
        frame: Frame,
        l1_inclusion_block: BlockInfo,
    ) -> Result<(), ChannelError> {
        if frame.id != self.id {
            return Err(ChannelError::FrameIdMismatch);
        }
        if frame.is_last && self.closed {
            return Err(ChannelError::ChannelClosed);
        }
        if self.inputs.contains_key(&frame.number) {
            return Err(ChannelError::FrameNumberExists(frame.number));
        }
        if self.closed && frame.number >= self.last_frame_number {
            return Err(ChannelError::FrameBeyondEndFrame(frame.number, self.last_frame_number));
        }

        if frame.is_last {
            self.last_frame_number = frame.number;
            self.closed = true;

            // Prune frames numbered past the closing frame.
            if self.last_frame_number < self.highest_frame_number {
                let last = self.last_frame_number;
                let mut pruned = 0;
                self.inputs.retain(|number, f| {
                    let keep = *number < last;
                    if !keep {
                        pruned += f.size();
                    }
                    keep
                });
                self.estimated_size -= pruned;
                self.highest_frame_number = last;
            }
        }

        if frame.number > self.highest_frame_number {
            self.highest_frame_number = frame.number;
        }
        if self.highest_l1_inclusion_block.number < l1_inclusion_block.number {
            self.highest_l1_inclusion_block = l1_inclusion_block;
        }

        self.estimated_size += frame.size();
        self.inputs.insert(frame.number, frame);
        Ok(())
    }

    /// Returns the L1 block that contained the first [Frame] in this channel.
    pub const fn open_block(&self) -> BlockInfo {
        self.open_block
    }

    /// Returns the block number of the L1 block that contained the first [Frame] in this channel.
    pub const fn open_block_number(&self) -> u64 {
        self.open_block.number
    }

    /// Returns the highest L1 block a frame of this channel was included in.
    pub const fn highest_l1_inclusion_block(&self) -> BlockInfo {
        self.highest_l1_inclusion_block
    }

    /// Returns the estimated size of the channel including [Frame] overhead.
    pub const fn size(&self) -> usize {
        self.estimated_size
    }

    /// Returns the number of buffered frames.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns `true` if no frames are buffered.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Returns `true` if the channel is ready to be read.
    pub fn is_ready(&self) -> bool {
        self.closed &&
            self.inputs.len() == self.last_frame_number as usize + 1 &&
            (0..=self.last_frame_number).all(|i| self.inputs.contains_key(&i))
    }

    /// Returns the concatenated data of frames `0..=last`, or [None] if the channel is not ready.
    pub fn frame_data(&self) -> Option<Bytes> {
        if !self.is_ready() {
            return None;
        }
        let mut data = Vec::with_capacity(self.estimated_size);
        for i in 0..=self.last_frame_number {
            data.extend_from_slice(&self.inputs.get(&i)?.data);
        }
        Some(data.into())
    }
}
