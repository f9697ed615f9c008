//! Ogawa container writer
//!
//! Blocks are appended to an in-memory buffer bottom-up: children are written
//! before the group that lists them, and the root group is written last.

use super::{
    CURRENT_VERSION, FROZEN_FLAG, FROZEN_OFFSET, HEADER_SIZE, MAGIC, ROOT_POS_OFFSET,
    data_offset, extract_offset, group_offset,
};

/// Size of the sample key that prefixes every property sample block
pub const SAMPLE_KEY_SIZE: usize = 16;

/// Append-only builder for an Ogawa container
pub struct ContainerWriter {
    buf: Vec<u8>,
}

impl ContainerWriter {
    /// Start a container with an unfrozen header
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(MAGIC);
        buf.push(0x00);
        buf.extend_from_slice(&CURRENT_VERSION.to_be_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        debug_assert_eq!(buf.len(), HEADER_SIZE);
        Self { buf }
    }

    /// Append a data block and return its child offset
    pub fn write_data(&mut self, payload: &[u8]) -> u64 {
        if payload.is_empty() {
            return data_offset(0);
        }
        let pos = self.buf.len() as u64;
        self.buf
            .extend_from_slice(&(payload.len() as u64).to_le_bytes());
        self.buf.extend_from_slice(payload);
        data_offset(pos)
    }

    /// Append a property sample block (key followed by payload)
    ///
    /// Readers never check the key, so it is written as zeros.
    pub fn write_sample(&mut self, payload: &[u8]) -> u64 {
        if payload.is_empty() {
            return data_offset(0);
        }
        let mut block = Vec::with_capacity(SAMPLE_KEY_SIZE + payload.len());
        block.resize(SAMPLE_KEY_SIZE, 0);
        block.extend_from_slice(payload);
        self.write_data(&block)
    }

    /// Append a group and return its child offset
    pub fn write_group(&mut self, children: &[u64]) -> u64 {
        if children.is_empty() {
            return group_offset(0);
        }
        let pos = self.buf.len() as u64;
        self.buf
            .extend_from_slice(&(children.len() as u64).to_le_bytes());
        for child in children {
            self.buf.extend_from_slice(&child.to_le_bytes());
        }
        group_offset(pos)
    }

    /// Write the root group, freeze the header and hand back the bytes
    pub fn finish(mut self, root_children: &[u64]) -> Vec<u8> {
        let root = extract_offset(self.write_group(root_children));
        self.buf[ROOT_POS_OFFSET..ROOT_POS_OFFSET + 8].copy_from_slice(&root.to_le_bytes());
        self.buf[FROZEN_OFFSET] = FROZEN_FLAG;
        self.buf
    }
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}
