// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chunked file transfer: sender-side chunking and receiver-side reassembly.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MessengerError;

/// Bytes per `FILE_CHUNK` frame. The final chunk of a transfer may be shorter.
pub const CHUNK_SIZE: usize = 1000;

/// Receiver-side bookkeeping for one in-flight transfer, keyed by
/// `(source MAC, msg_id)` in the caller's table.
#[derive(Debug, Default)]
pub struct FileTransferState {
    pub filename: String,
    pub total_size: u64,
    chunks: HashMap<u32, Vec<u8>>,
    received_seqs: BTreeSet<u32>,
}

impl FileTransferState {
    pub fn new(filename: String, total_size: u64) -> Self {
        Self {
            filename,
            total_size,
            chunks: HashMap::new(),
            received_seqs: BTreeSet::new(),
        }
    }

    pub fn add_chunk(&mut self, seq: u32, bytes: Vec<u8>) {
        self.chunks.insert(seq, bytes);
        self.received_seqs.insert(seq);
    }

    /// Record the `FILE_END` sentinel's own seq; it contributes no bytes.
    pub fn add_end_marker(&mut self, seq: u32) {
        self.received_seqs.insert(seq);
    }

    /// Ascending list of every seq observed (chunks and the end marker).
    pub fn received_seqs(&self) -> Vec<u32> {
        self.received_seqs.iter().copied().collect()
    }

    /// Concatenate chunk bytes in ascending seq order.
    fn reassembled_bytes(&self) -> Vec<u8> {
        let mut seqs: Vec<u32> = self.chunks.keys().copied().collect();
        seqs.sort_unstable();
        let mut out = Vec::with_capacity(self.total_size as usize);
        for seq in seqs {
            out.extend_from_slice(&self.chunks[&seq]);
        }
        out
    }

    /// Reassemble and persist to `dir` under `received_<filename>`,
    /// disambiguating with a numeric suffix if that path already exists.
    /// Logs (via the returned bool) whether the reassembled length matched
    /// the size declared at `FILE_INIT` time; the file is written either way.
    pub fn persist(&self, dir: &Path) -> Result<(PathBuf, bool), MessengerError> {
        let bytes = self.reassembled_bytes();
        let size_matches = bytes.len() as u64 == self.total_size;

        let path = disambiguated_path(dir, &self.filename);
        fs::write(&path, &bytes)?;
        Ok((path, size_matches))
    }
}

/// Pick `received_<filename>`, or `received_<stem>_N.<ext>` if that already
/// exists, incrementing `N` until a free name is found.
fn disambiguated_path(dir: &Path, filename: &str) -> PathBuf {
    let base = format!("received_{filename}");
    let candidate = dir.join(&base);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let ext = path.extension().and_then(|s| s.to_str());

    let mut n = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("received_{stem}_{n}.{ext}"),
            None => format!("received_{stem}_{n}"),
        };
        let candidate = dir.join(&name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Split `data` into fixed-size chunks for the sender side of a transfer.
pub fn chunk(data: &[u8]) -> Vec<&[u8]> {
    data.chunks(CHUNK_SIZE).collect()
}
