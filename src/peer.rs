// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer table: the set of known peers keyed by display name.

use std::collections::HashMap;
use std::time::Instant;

use crate::wire::MacAddr;

/// What a pending, unacknowledged send is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Regular,
    File,
}

/// A single outstanding acknowledgement a peer record is waiting on.
///
/// Invariant upheld by [`PeerTable`]: a peer holds at most one of these at a
/// time; a new send replaces whatever slot was there before.
#[derive(Debug, Clone)]
pub struct ExpectedAck {
    pub msg_id: u32,
    pub kind: AckKind,
    /// Attempt index `k`, 0-indexed from the emission that installed the slot.
    pub attempt: u32,
    pub deadline: Instant,
    /// The destination MAC the original frame was sent to, for retransmission.
    pub dest_mac: MacAddr,
    /// The exact on-air bytes sent, replayed verbatim on each retry.
    pub wire_frame: Vec<u8>,
}

/// Everything known about one peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub name: String,
    pub mac: MacAddr,
    pub last_seen: Instant,
    pub next_seq: u32,
    pub expected_ack: Option<ExpectedAck>,
}

impl PeerRecord {
    fn new(name: String, mac: MacAddr) -> Self {
        Self {
            name,
            mac,
            last_seen: Instant::now(),
            next_seq: 1,
            expected_ack: None,
        }
    }
}

/// The set of known peers, keyed by display name.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<String, PeerRecord>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `mac`/`last_seen` into the record for `id`, creating it if
    /// absent. Returns `true` if the peer was newly created.
    pub fn upsert(&mut self, id: &str, mac: MacAddr) -> bool {
        match self.peers.get_mut(id) {
            Some(record) => {
                record.mac = mac;
                record.last_seen = Instant::now();
                false
            }
            None => {
                self.peers.insert(id.to_string(), PeerRecord::new(id.to_string(), mac));
                true
            }
        }
    }

    pub fn touch(&mut self, id: &str) {
        if let Some(record) = self.peers.get_mut(id) {
            record.last_seen = Instant::now();
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<PeerRecord> {
        self.peers.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PeerRecord> {
        self.peers.get_mut(id)
    }

    /// Linear scan for the peer id whose most recently observed MAC matches.
    pub fn lookup_by_mac(&self, mac: MacAddr) -> Option<String> {
        self.peers
            .iter()
            .find(|(_, record)| record.mac == mac)
            .map(|(id, _)| id.clone())
    }

    /// Rename `old_id` to `new_id`, preserving the rest of the record.
    /// No-op if `old_id` is unknown.
    pub fn rekey(&mut self, old_id: &str, new_id: &str) {
        if let Some(mut record) = self.peers.remove(old_id) {
            record.name = new_id.to_string();
            self.peers.insert(new_id.to_string(), record);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PeerRecord)> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Every peer currently holding an expected-ack, for the reliability
    /// loop to scan. Order is unspecified.
    pub fn ids_with_pending_ack(&self) -> Vec<String> {
        self.peers
            .iter()
            .filter(|(_, r)| r.expected_ack.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn any_pending_ack(&self) -> bool {
        self.peers.values().any(|r| r.expected_ack.is_some())
    }

    /// The earliest deadline among all peers currently holding an expected-ack.
    pub fn soonest_ack_deadline(&self) -> Option<Instant> {
        self.peers
            .values()
            .filter_map(|r| r.expected_ack.as_ref().map(|a| a.deadline))
            .min()
    }
}
