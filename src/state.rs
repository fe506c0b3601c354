// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide shared state: one mutex protecting the peer table, the
//! dedup set, the file-transfer table, the outgoing msg-id counter, and the
//! listener list, plus the condition variable the reliability loop parks on.
//!
//! The predicate bound to the condvar is "any peer has a non-empty
//! expected-ack" (§5 of the design this core follows); [`SharedState::notify_ack_pending`]
//! and the implicit re-check on every [`SharedState::lock`] caller keep it honest.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::dedup::DedupSet;
use crate::file_transfer::FileTransferState;
use crate::peer::PeerTable;
use crate::wire::MacAddr;

/// A registered `send_message` listener: `(sender peer id, plaintext body)`.
pub type MessageListener = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Everything the mutex protects.
pub struct Inner {
    pub peers: PeerTable,
    pub dedup: DedupSet,
    pub transfers: HashMap<(MacAddr, u32), FileTransferState>,
    pub next_msg_id: u32,
    /// Registered listeners, each tagged with the id `register_message_listener`
    /// returned, so a caller can remove exactly the one it registered.
    pub listeners: Vec<(u64, MessageListener)>,
    pub our_name: String,
    pub our_mac: MacAddr,
}

impl Inner {
    /// Allocate the next strictly monotonic outgoing msg_id.
    pub fn next_msg_id(&mut self) -> u32 {
        let id = self.next_msg_id;
        self.next_msg_id += 1;
        id
    }
}

/// Shared, lock-guarded process state plus the ack-pending condvar.
pub struct SharedState {
    inner: Mutex<Inner>,
    ack_signal: Condvar,
}

impl SharedState {
    pub fn new(our_name: String, our_mac: MacAddr) -> Self {
        Self {
            inner: Mutex::new(Inner {
                peers: PeerTable::new(),
                dedup: DedupSet::new(),
                transfers: HashMap::new(),
                next_msg_id: 1,
                listeners: Vec::new(),
                our_name,
                our_mac,
            }),
            ack_signal: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    /// Wake the reliability loop after installing or clearing an expected-ack.
    pub fn notify_ack_pending(&self) {
        self.ack_signal.notify_all();
    }

    /// Block until `ack_signal` is notified, or until `deadline` passes if
    /// given. Returns with `guard` re-locked either way.
    pub fn wait_for_ack_signal<'a>(
        &'a self,
        mut guard: MutexGuard<'a, Inner>,
        deadline: Option<std::time::Instant>,
    ) -> MutexGuard<'a, Inner> {
        match deadline {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(std::time::Instant::now());
                self.ack_signal.wait_for(&mut guard, timeout);
            }
            None => {
                self.ack_signal.wait(&mut guard);
            }
        }
        guard
    }
}
