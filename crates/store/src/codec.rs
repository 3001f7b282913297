//! Commit log encoding and decoding
//!
//! Every committed write transaction is appended to the store file as one frame:
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: size of type + payload + crc (NOT including length itself)
//! - **type**: frame tag, currently only `TYPE_COMMIT`
//! - **payload**: MessagePack-encoded [`CommitRecord`]
//! - **crc32**: CRC32 over \[type\]\[payload\]
//!
//! A frame cut short at the end of the file (crash mid-append) is reported as
//! incomplete and dropped on replay. A cut-short frame still has a plausible
//! length and, once present, the commit tag; a prefix failing either check is
//! corruption, as is anything else that fails to verify.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use notistress_core::{ChildEntity, Error, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Frame tag for a committed transaction
const TYPE_COMMIT: u8 = 1;

/// type(1) + crc(4)
const MIN_FRAME_LEN: usize = 5;

/// Upper bound on a declared frame length. One commit holds a handful of
/// operations, so anything larger is a damaged length prefix.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Root row as persisted: children are stored by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRecord {
    /// Unique key
    pub id: String,
    /// Opaque title
    pub title: String,
    /// Last-touched time
    pub timestamp: Timestamp,
    /// Grouping key
    pub group_id: String,
    /// Child ids in insertion order
    pub child_ids: Vec<String>,
}

/// One staged change inside a write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert or replace a root by id
    UpsertRoot(RootRecord),
    /// Insert or replace a child by id
    UpsertChild(ChildEntity),
    /// Append an existing child to an existing root's list
    AppendChild {
        /// Owning root
        root_id: String,
        /// Child being attached
        child_id: String,
    },
    /// Set a root's timestamp
    Touch {
        /// Root being touched
        root_id: String,
        /// New timestamp
        timestamp: Timestamp,
    },
}

/// A committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Store version produced by this commit
    pub version: u64,
    /// Operations in application order
    pub ops: Vec<Operation>,
}

/// Outcome of decoding one frame.
#[derive(Debug)]
pub enum Decoded {
    /// A verified commit and the number of bytes it occupied
    Commit(CommitRecord, usize),
    /// The buffer ends in the middle of a frame
    Incomplete,
}

/// Encode a commit into a frame ready to append.
pub fn encode_commit(record: &CommitRecord) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(record)?;
    let total_len = 1 + payload.len() + 4;
    if total_len > MAX_FRAME_LEN {
        return Err(Error::InvalidOperation(format!(
            "commit of {} bytes exceeds the frame limit of {}",
            total_len, MAX_FRAME_LEN
        )));
    }

    let mut hasher = Hasher::new();
    hasher.update(&[TYPE_COMMIT]);
    hasher.update(&payload);
    let crc = hasher.finalize();

    let mut buf = Vec::with_capacity(4 + total_len);
    buf.write_u32::<LittleEndian>(total_len as u32)?;
    buf.write_u8(TYPE_COMMIT)?;
    buf.extend_from_slice(&payload);
    buf.write_u32::<LittleEndian>(crc)?;
    Ok(buf)
}

/// Decode the frame at the start of `buf`.
///
/// `offset` is the file position of `buf[0]`, used only in error messages.
pub fn decode_commit(buf: &[u8], offset: u64) -> Result<Decoded> {
    let mut cursor = Cursor::new(buf);
    let total_len = match cursor.read_u32::<LittleEndian>() {
        Ok(len) => len as usize,
        Err(_) => return Ok(Decoded::Incomplete),
    };

    if total_len < MIN_FRAME_LEN {
        return Err(Error::Corruption(format!(
            "offset {}: invalid frame length {} (minimum is {})",
            offset, total_len, MIN_FRAME_LEN
        )));
    }
    if total_len > MAX_FRAME_LEN {
        return Err(Error::Corruption(format!(
            "offset {}: invalid frame length {} (maximum is {})",
            offset, total_len, MAX_FRAME_LEN
        )));
    }
    if buf.len() > 4 && buf[4] != TYPE_COMMIT {
        return Err(Error::Corruption(format!(
            "offset {}: unknown frame type {}",
            offset, buf[4]
        )));
    }
    if buf.len() < 4 + total_len {
        return Ok(Decoded::Incomplete);
    }

    let type_tag = buf[4];
    let payload = &buf[5..4 + total_len - 4];
    let mut crc_bytes = &buf[4 + total_len - 4..4 + total_len];
    let expected_crc = crc_bytes.read_u32::<LittleEndian>()?;

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(payload);
    let actual_crc = hasher.finalize();
    if actual_crc != expected_crc {
        return Err(Error::Corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected_crc, actual_crc
        )));
    }

    let record: CommitRecord = rmp_serde::from_slice(payload).map_err(|e| {
        Error::Corruption(format!("offset {}: deserialization failed: {}", offset, e))
    })?;
    Ok(Decoded::Commit(record, 4 + total_len))
}

/// Decode every complete frame in `buf`.
///
/// Returns the commits and the length of the verified prefix. Bytes past that
/// prefix belong to a torn trailing frame.
pub fn decode_all(buf: &[u8]) -> Result<(Vec<CommitRecord>, usize)> {
    let mut commits = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        match decode_commit(&buf[pos..], pos as u64)? {
            Decoded::Commit(record, consumed) => {
                commits.push(record);
                pos += consumed;
            }
            Decoded::Incomplete => break,
        }
    }
    Ok((commits, pos))
}
