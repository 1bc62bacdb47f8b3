//! Append-only tick journal with checksums
//!
//! One durable record per upstream trade, written in batches. A batch is
//! encoded into a single buffer and lands with one write + flush, so it is
//! applied entirely or (on error) not at all; the caller requeues failed
//! batches.
//!
//! # Binary Format (per entry)
//! ```text
//! [total_len: u32]
//! [sequence:  u64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bincode TradeTick]
//! [checksum: u32]  // CRC32C over sequence+timestamp+payload
//! ```

use crc32c::crc32c;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use types::trade::TradeTick;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checksum mismatch at sequence {sequence}")]
    ChecksumMismatch { sequence: u64 },
}

// ── Journal Entry ───────────────────────────────────────────────────

/// A single persisted tick record.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    /// Monotonic sequence number assigned at append time
    pub sequence: u64,
    /// Exchange timestamp of the tick, Unix milliseconds
    pub timestamp_ms: i64,
    pub tick: TradeTick,
}

fn compute_checksum(sequence: u64, timestamp_ms: i64, payload: &[u8]) -> u32 {
    let mut buf = Vec::with_capacity(8 + 8 + payload.len());
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&timestamp_ms.to_le_bytes());
    buf.extend_from_slice(payload);
    crc32c(&buf)
}

fn encode_entry(sequence: u64, tick: &TradeTick, out: &mut Vec<u8>) -> Result<(), JournalError> {
    let payload =
        bincode::serialize(tick).map_err(|e| JournalError::Serialization(e.to_string()))?;
    let payload_len = payload.len() as u32;
    let checksum = compute_checksum(sequence, tick.timestamp_ms, &payload);

    // body = 8 (seq) + 8 (ts) + 4 (pl_len) + payload + 4 (crc)
    let body_len: u32 = 8 + 8 + 4 + payload_len + 4;

    out.reserve(4 + body_len as usize);
    out.extend_from_slice(&body_len.to_le_bytes());
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(&tick.timestamp_ms.to_le_bytes());
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&checksum.to_le_bytes());
    Ok(())
}

// ── Writer ──────────────────────────────────────────────────────────

/// Append-only writer for the tick journal.
pub struct TickJournal {
    path: PathBuf,
    writer: BufWriter<File>,
    next_sequence: u64,
    entries_written: u64,
}

impl TickJournal {
    /// Open (or create) the journal at `path`, appending after any
    /// existing records. A torn final entry from a crashed writer is
    /// truncated away so new entries start on a clean boundary.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let (existing, valid_len) = if path.exists() {
            let mut data = Vec::new();
            File::open(&path)?.read_to_end(&mut data)?;
            let (records, valid_len) = scan(&data)?;
            (records, valid_len as u64)
        } else {
            (Vec::new(), 0)
        };
        let next_sequence = existing.last().map(|r| r.sequence + 1).unwrap_or(1);

        if path.exists() {
            let file = OpenOptions::new().write(true).open(&path)?;
            if file.metadata()?.len() > valid_len {
                file.set_len(valid_len)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(
            path = %path.display(),
            next_sequence,
            recovered = existing.len(),
            "tick journal opened"
        );

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            next_sequence,
            entries_written: 0,
        })
    }

    /// Append a batch of ticks as one atomic write.
    ///
    /// The whole batch is encoded first; only then is it written and
    /// flushed. An encoding or IO error leaves the journal unchanged from
    /// the caller's perspective and the batch is theirs to requeue.
    pub fn append_batch(&mut self, ticks: &[TradeTick]) -> Result<(), JournalError> {
        if ticks.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        let first_sequence = self.next_sequence;
        for (i, tick) in ticks.iter().enumerate() {
            encode_entry(first_sequence + i as u64, tick, &mut buf)?;
        }

        self.writer.write_all(&buf)?;
        self.writer.flush()?;

        self.next_sequence += ticks.len() as u64;
        self.entries_written += ticks.len() as u64;

        debug!(
            batch = ticks.len(),
            first_sequence,
            "tick batch journaled"
        );
        Ok(())
    }

    /// Sequence that the next appended tick will receive.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Entries written since this handle was opened.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ── Reader ──────────────────────────────────────────────────────────

/// Reader for historical reconstruction and recovery.
pub struct JournalReader;

impl JournalReader {
    /// Read every intact record from the journal.
    ///
    /// A torn final entry (crash mid-write) is treated as a clean end of
    /// file; a checksum mismatch on an interior entry is a hard error.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<TickRecord>, JournalError> {
        let mut data = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut data)?;
        scan(&data).map(|(records, _)| records)
    }
}

/// Walk the raw journal bytes; returns the intact records and the byte
/// length of the valid prefix (everything past it is a torn tail).
fn scan(data: &[u8]) -> Result<(Vec<TickRecord>, usize), JournalError> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset + 4 <= data.len() {
        let body_len = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;

        let total = 4 + body_len;
        if body_len < 24 || offset + total > data.len() {
            // Torn tail: the last write did not complete
            break;
        }

        let body = &data[offset + 4..offset + total];
        let sequence = u64::from_le_bytes(body[0..8].try_into().unwrap());
        let timestamp_ms = i64::from_le_bytes(body[8..16].try_into().unwrap());
        let payload_len = u32::from_le_bytes(body[16..20].try_into().unwrap()) as usize;

        if 20 + payload_len + 4 != body_len {
            break;
        }

        let payload = &body[20..20 + payload_len];
        let stored_checksum =
            u32::from_le_bytes(body[20 + payload_len..20 + payload_len + 4].try_into().unwrap());

        if compute_checksum(sequence, timestamp_ms, payload) != stored_checksum {
            return Err(JournalError::ChecksumMismatch { sequence });
        }

        let tick: TradeTick = bincode::deserialize(payload)
            .map_err(|e| JournalError::Serialization(e.to_string()))?;

        records.push(TickRecord {
            sequence,
            timestamp_ms,
            tick,
        });
        offset += total;
    }

    Ok((records, offset))
}
