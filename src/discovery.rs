// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer discovery and liveness: the announcer thread.
//!
//! Emits one broadcast `HANDSHAKE_REQ` at startup, then a broadcast
//! `HEARTBEAT` every 5 s. Peer staleness is not reaped here: a peer only
//! disappears via `TERMINATE` or via ack exhaustion in the reliability
//! engine ([`crate::reliability`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::state::SharedState;
use crate::transceiver::FrameSender;
use crate::wire::{self, codec, MsgType, BROADCAST};

/// Interval between broadcast heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

fn broadcast(state: &SharedState, sender: &dyn FrameSender, msg_type: MsgType, data: &str) {
    let mut inner = state.lock();
    let msg_id = inner.next_msg_id();
    let payload = codec::encode(msg_type, msg_id, 1, data);
    let on_air = wire::build_frame(BROADCAST, inner.our_mac, &payload);
    drop(inner);

    if let Err(e) = sender.send_frame(&on_air) {
        warn!(error = %e, "failed to broadcast frame");
    }
}

/// Run the announcer until `running` is cleared: one handshake, then
/// heartbeats on [`HEARTBEAT_INTERVAL`].
pub fn run(state: Arc<SharedState>, sender: Arc<dyn FrameSender>, running: Arc<AtomicBool>) {
    let our_name = state.lock().our_name.clone();
    broadcast(&state, &*sender, MsgType::HandshakeReq, &format!("0|{our_name}"));

    while running.load(Ordering::Acquire) {
        std::thread::sleep(HEARTBEAT_INTERVAL);
        if !running.load(Ordering::Acquire) {
            break;
        }
        broadcast(&state, &*sender, MsgType::Heartbeat, "");
    }
}

/// Broadcast `TERMINATE` to every known peer on graceful shutdown.
pub fn announce_shutdown(state: &SharedState, sender: &dyn FrameSender) {
    let peer_macs: Vec<_> = {
        let inner = state.lock();
        inner.peers.iter().map(|(_, record)| record.mac).collect()
    };

    for mac in peer_macs {
        let mut inner = state.lock();
        let msg_id = inner.next_msg_id();
        let payload = codec::encode(MsgType::Terminate, msg_id, 1, "");
        let on_air = wire::build_frame(mac, inner.our_mac, &payload);
        drop(inner);

        if let Err(e) = sender.send_frame(&on_air) {
            warn!(error = %e, "failed to send TERMINATE");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transceiver::in_memory_pair;
    use crate::wire::MacAddr;

    #[test]
    fn announce_shutdown_sends_terminate_to_every_peer() {
        let state = Arc::new(SharedState::new("alice".to_string(), MacAddr::new(2, 0, 0, 0, 0, 1)));
        state.lock().peers.upsert("bob", MacAddr::new(2, 0, 0, 0, 0, 2));
        state.lock().peers.upsert("carol", MacAddr::new(2, 0, 0, 0, 0, 3));

        let ((alice_tx, _alice_rx), (_peer_tx, mut peer_rx)) = in_memory_pair();
        announce_shutdown(&state, &alice_tx);

        for _ in 0..2 {
            let frame = codec::decode(&peer_rx.recv_frame().unwrap()).unwrap();
            assert_eq!(frame.msg_type, MsgType::Terminate);
        }
    }

    #[test]
    fn broadcast_handshake_uses_broadcast_address() {
        let state = Arc::new(SharedState::new("alice".to_string(), MacAddr::new(2, 0, 0, 0, 0, 1)));
        let ((alice_tx, _alice_rx), (_peer_tx, mut peer_rx)) = in_memory_pair();
        broadcast(&state, &alice_tx, MsgType::HandshakeReq, "0|alice");

        let raw = peer_rx.recv_frame().unwrap();
        let parsed = wire::parse_frame(&raw, MacAddr::new(0, 0, 0, 0, 0, 0)).unwrap();
        assert_eq!(parsed.src, MacAddr::new(2, 0, 0, 0, 0, 1));
        let frame = codec::decode(&parsed.payload).unwrap();
        assert_eq!(frame.msg_type, MsgType::HandshakeReq);
        assert_eq!(frame.data, "0|alice");
    }
}
