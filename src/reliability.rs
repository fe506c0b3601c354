// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer retransmission timers with exponential backoff.
//!
//! A single timer thread serves every peer. It parks on the state's
//! ack-pending condvar when no peer has an outstanding ack, and otherwise
//! sleeps until the soonest deadline, reschedules or gives up, and loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::peer::AckKind;
use crate::state::SharedState;
use crate::transceiver::FrameSender;

/// Attempt index (0-indexed) at which the engine gives up rather than retry.
pub const FINAL_ATTEMPT: u32 = 4;

/// The base backoff durations for each ack kind. Deadline for attempt `k`
/// is `base * 2^k`. Exposed as a struct (rather than bare constants) so
/// tests can shrink the schedule without changing production behavior.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub regular_base: Duration,
    pub file_base: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            regular_base: Duration::from_millis(50),
            file_base: Duration::from_millis(500),
        }
    }
}

impl BackoffPolicy {
    fn base_for(&self, kind: AckKind) -> Duration {
        match kind {
            AckKind::Regular => self.regular_base,
            AckKind::File => self.file_base,
        }
    }
}

/// Run the retransmission loop until `running` is cleared. Intended to be
/// spawned on its own thread for the lifetime of the process.
pub fn run(state: Arc<SharedState>, sender: Arc<dyn FrameSender>, running: Arc<AtomicBool>, policy: BackoffPolicy) {
    let mut guard = state.lock();
    while running.load(Ordering::Acquire) {
        let deadline = guard.peers.soonest_ack_deadline();
        match deadline {
            None => {
                guard = state.wait_for_ack_signal(guard, None);
            }
            Some(deadline) if deadline > Instant::now() => {
                guard = state.wait_for_ack_signal(guard, Some(deadline));
            }
            Some(_) => {
                service_expired_acks(&mut guard, &sender, &policy);
            }
        }
    }
}

fn service_expired_acks(inner: &mut crate::state::Inner, sender: &Arc<dyn FrameSender>, policy: &BackoffPolicy) {
    let now = Instant::now();
    let expired: Vec<String> = inner
        .peers
        .iter()
        .filter(|(_, record)| matches!(&record.expected_ack, Some(ack) if ack.deadline <= now))
        .map(|(id, _)| id.clone())
        .collect();

    for id in expired {
        let Some(record) = inner.peers.get_mut(&id) else { continue };
        let Some(ack) = record.expected_ack.clone() else { continue };

        if ack.attempt >= FINAL_ATTEMPT {
            match ack.kind {
                AckKind::Regular => {
                    warn!(peer = %id, msg_id = ack.msg_id, "ack exhausted, removing peer");
                    inner.peers.remove(&id);
                }
                AckKind::File => {
                    warn!(peer = %id, msg_id = ack.msg_id, "file transfer ack exhausted, giving up");
                    if let Some(record) = inner.peers.get_mut(&id) {
                        record.expected_ack = None;
                    }
                }
            }
            continue;
        }

        let next_attempt = ack.attempt + 1;
        let next_deadline = now + policy.base_for(ack.kind) * 2u32.pow(next_attempt);
        info!(peer = %id, attempt = next_attempt, "retransmitting unacked frame");
        if let Err(e) = sender.send_frame(&ack.wire_frame) {
            warn!(peer = %id, error = %e, "retransmit failed");
        }

        if let Some(record) = inner.peers.get_mut(&id) {
            if let Some(slot) = record.expected_ack.as_mut() {
                slot.attempt = next_attempt;
                slot.deadline = next_deadline;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::ExpectedAck;
    use crate::transceiver::in_memory_pair;
    use crate::wire::MacAddr;
    use std::thread;

    const TEST_POLICY: BackoffPolicy = BackoffPolicy {
        regular_base: Duration::from_millis(5),
        file_base: Duration::from_millis(5),
    };

    fn state_with_pending(kind: AckKind) -> (Arc<SharedState>, Arc<dyn FrameSender>) {
        let state = Arc::new(SharedState::new("me".to_string(), MacAddr::new(2, 0, 0, 0, 0, 1)));
        let ((sender, _recv), (_peer_sender, _peer_recv)) = in_memory_pair();
        let sender: Arc<dyn FrameSender> = Arc::new(sender);

        {
            let mut guard = state.lock();
            guard.peers.upsert("bob", MacAddr::new(2, 0, 0, 0, 0, 2));
            guard.peers.get_mut("bob").unwrap().expected_ack = Some(ExpectedAck {
                msg_id: 1,
                kind,
                attempt: 0,
                deadline: Instant::now() + Duration::from_millis(5),
                dest_mac: MacAddr::new(2, 0, 0, 0, 0, 2),
                wire_frame: b"GF|03|0001|0001|x".to_vec(),
            });
        }
        state.notify_ack_pending();
        (state, sender)
    }

    #[test]
    fn regular_message_retries_then_removes_peer() {
        let (state, sender) = state_with_pending(AckKind::Regular);
        let running = Arc::new(AtomicBool::new(true));

        let r = running.clone();
        let s = state.clone();
        let handle = thread::spawn(move || run(s, sender, r, TEST_POLICY));

        // 5ms base: deadlines at ~5,10,20,40,80ms -- 500ms is generous headroom.
        thread::sleep(Duration::from_millis(500));
        running.store(false, Ordering::Release);
        state.notify_ack_pending();
        handle.join().unwrap();

        assert!(state.lock().peers.get("bob").is_none());
    }

    #[test]
    fn file_transfer_exhaustion_clears_ack_but_keeps_peer() {
        let (state, sender) = state_with_pending(AckKind::File);
        let running = Arc::new(AtomicBool::new(true));

        let r = running.clone();
        let s = state.clone();
        let handle = thread::spawn(move || run(s, sender, r, TEST_POLICY));

        thread::sleep(Duration::from_millis(500));
        running.store(false, Ordering::Release);
        state.notify_ack_pending();
        handle.join().unwrap();

        let guard = state.lock();
        let bob = guard.peers.get("bob").expect("peer retained");
        assert!(bob.expected_ack.is_none());
    }

    #[test]
    fn ack_clears_signal_when_no_peer_pending() {
        let state = Arc::new(SharedState::new("me".to_string(), MacAddr::new(2, 0, 0, 0, 0, 1)));
        state.lock().peers.upsert("bob", MacAddr::new(2, 0, 0, 0, 0, 2));
        assert!(!state.lock().peers.any_pending_ack());
    }
}
