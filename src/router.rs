// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol router: the dispatch switch driving state transitions for each
//! of the thirteen message types, run from the sniffer-dispatch context.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::file_transfer::FileTransferState;
use crate::peer::{AckKind, ExpectedAck};
use crate::state::{Inner, SharedState};
use crate::transceiver::FrameSender;
use crate::wire::{self, codec, Frame, MacAddr, MsgType};

/// Handle one frame just parsed off the air. `src` is the frame's `addr2`,
/// already verified not to be ours by the transceiver.
pub fn dispatch(state: &SharedState, sender: &dyn FrameSender, reassembly_dir: &Path, src: MacAddr, frame: Frame) {
    let mut inner = state.lock();

    if frame.msg_type.requires_dedup() {
        let fresh = inner.dedup.check_and_insert(src, frame.msg_id, frame.seq);
        if !fresh {
            debug!(?src, msg_id = frame.msg_id, seq = frame.seq, "dropping duplicate frame");
            return;
        }
    }

    match frame.msg_type {
        MsgType::HandshakeReq => on_handshake_req(&mut inner, sender, src, &frame),
        MsgType::HandshakeAck => on_handshake_ack(&mut inner, src, &frame),
        MsgType::Msg => on_msg(&mut inner, sender, src, &frame),
        MsgType::MsgAck => on_msg_ack(&mut inner, src, &frame),
        MsgType::MsgRetry => {} // reserved, currently unused by the receiver
        MsgType::Rename => on_rename(&mut inner, sender, src, &frame),
        MsgType::RenameAck => {}
        MsgType::FileInit => on_file_init(&mut inner, src, &frame),
        MsgType::FileChunk => on_file_chunk(&mut inner, src, &frame),
        MsgType::FileEnd => on_file_end(&mut inner, sender, reassembly_dir, src, &frame),
        MsgType::FileAck => on_file_ack(&mut inner, src, &frame),
        MsgType::Heartbeat => on_heartbeat(&mut inner, src),
        MsgType::Terminate => on_terminate(&mut inner, src),
    }

    state.notify_ack_pending();
}

fn send_reply(inner: &mut Inner, sender: &dyn FrameSender, dst: MacAddr, msg_type: MsgType, seq: u32, data: &str) {
    let msg_id = inner.next_msg_id();
    let payload = codec::encode(msg_type, msg_id, seq, data);
    let on_air = wire::build_frame(dst, inner.our_mac, &payload);
    if let Err(e) = sender.send_frame(&on_air) {
        warn!(error = %e, "failed to send reply frame");
    }
}

fn on_handshake_req(inner: &mut Inner, sender: &dyn FrameSender, src: MacAddr, frame: &Frame) {
    let Some((_, name)) = frame.data.split_once('|') else {
        debug!("malformed HANDSHAKE_REQ data: {:?}", frame.data);
        return;
    };
    if name == inner.our_name {
        return;
    }

    let is_new = inner.peers.upsert(name, src);
    info!(peer = name, "handshake received");
    send_reply(inner, sender, src, MsgType::HandshakeAck, 1, &format!("0|{}", inner.our_name));

    if is_new {
        // Our earlier broadcast may have been missed; complete discovery
        // in one round-trip by handshaking back directly.
        send_reply(inner, sender, src, MsgType::HandshakeReq, 1, &format!("0|{}", inner.our_name));
    }
}

fn on_handshake_ack(inner: &mut Inner, src: MacAddr, frame: &Frame) {
    let Some((_, name)) = frame.data.split_once('|') else {
        debug!("malformed HANDSHAKE_ACK data: {:?}", frame.data);
        return;
    };
    if name == inner.our_name {
        return;
    }
    inner.peers.upsert(name, src);
}

fn on_msg(inner: &mut Inner, sender: &dyn FrameSender, src: MacAddr, frame: &Frame) {
    send_reply(inner, sender, src, MsgType::MsgAck, frame.seq, &format!("{}|{}", frame.msg_id, frame.seq));

    let sender_id = inner.peers.lookup_by_mac(src);
    let Some(sender_id) = sender_id else {
        debug!(?src, "MSG from unknown peer, delivering under raw MAC");
        deliver(inner, &src.to_string(), &frame.data);
        return;
    };
    deliver(inner, &sender_id, &frame.data);
}

fn deliver(inner: &Inner, sender_id: &str, body: &str) {
    for (_, listener) in &inner.listeners {
        listener(sender_id, body);
    }
}

fn on_msg_ack(inner: &mut Inner, src: MacAddr, frame: &Frame) {
    let Some((acked_id, _)) = parse_ack_data(&frame.data) else {
        return;
    };
    let Some(peer_id) = inner.peers.lookup_by_mac(src) else { return };
    clear_matching_ack(inner, &peer_id, acked_id);
}

fn on_rename(inner: &mut Inner, sender: &dyn FrameSender, src: MacAddr, frame: &Frame) {
    let Some(old_id) = inner.peers.lookup_by_mac(src) else {
        debug!(?src, "RENAME from unknown peer");
        return;
    };
    let new_name = frame.data.clone();
    info!(old = old_id, new = new_name, "peer renamed");
    inner.peers.rekey(&old_id, &new_name);
    send_reply(inner, sender, src, MsgType::RenameAck, frame.seq, "");
}

fn on_file_init(inner: &mut Inner, src: MacAddr, frame: &Frame) {
    let Some((filename, size)) = frame.data.split_once('|') else {
        debug!("malformed FILE_INIT data: {:?}", frame.data);
        return;
    };
    let Ok(size) = size.parse::<u64>() else {
        debug!("malformed FILE_INIT size: {:?}", size);
        return;
    };
    inner
        .transfers
        .insert((src, frame.msg_id), FileTransferState::new(filename.to_string(), size));
}

fn on_file_chunk(inner: &mut Inner, src: MacAddr, frame: &Frame) {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let Some(transfer) = inner.transfers.get_mut(&(src, frame.msg_id)) else {
        debug!(?src, msg_id = frame.msg_id, "FILE_CHUNK for unknown transfer");
        return;
    };
    let Ok(bytes) = BASE64.decode(&frame.data) else {
        debug!("malformed FILE_CHUNK base64 data");
        return;
    };
    transfer.add_chunk(frame.seq, bytes);
}

fn on_file_end(inner: &mut Inner, sender: &dyn FrameSender, reassembly_dir: &Path, src: MacAddr, frame: &Frame) {
    let Some(transfer) = inner.transfers.get_mut(&(src, frame.msg_id)) else {
        debug!(?src, msg_id = frame.msg_id, "FILE_END for unknown transfer");
        return;
    };
    transfer.add_end_marker(frame.seq);

    let seqs_csv = transfer
        .received_seqs()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    send_reply(inner, sender, src, MsgType::FileAck, 0, &format!("{}|{}", frame.msg_id, seqs_csv));

    let Some(transfer) = inner.transfers.remove(&(src, frame.msg_id)) else { return };
    match transfer.persist(reassembly_dir) {
        Ok((path, size_matches)) => {
            if !size_matches {
                warn!(path = %path.display(), "reassembled file size does not match FILE_INIT declaration");
            }
            info!(path = %path.display(), "file transfer complete");
        }
        Err(e) => warn!(error = %e, "failed to persist reassembled file"),
    }
}

fn on_file_ack(inner: &mut Inner, src: MacAddr, frame: &Frame) {
    let Some((acked_id, _)) = parse_ack_data(&frame.data) else {
        return;
    };
    let Some(peer_id) = inner.peers.lookup_by_mac(src) else { return };
    clear_matching_ack(inner, &peer_id, acked_id);
}

fn on_heartbeat(inner: &mut Inner, src: MacAddr) {
    if let Some(id) = inner.peers.lookup_by_mac(src) {
        inner.peers.touch(&id);
    }
}

fn on_terminate(inner: &mut Inner, src: MacAddr) {
    if let Some(id) = inner.peers.lookup_by_mac(src) {
        info!(peer = id, "peer has left the network");
        inner.peers.remove(&id);
    }
}

fn parse_ack_data(data: &str) -> Option<(u32, &str)> {
    let (id, rest) = data.split_once('|')?;
    let id: u32 = id.parse().ok()?;
    Some((id, rest))
}

fn clear_matching_ack(inner: &mut Inner, peer_id: &str, acked_id: u32) {
    let Some(record) = inner.peers.get_mut(peer_id) else { return };
    match &record.expected_ack {
        Some(ack) if ack.msg_id == acked_id => {
            record.expected_ack = None;
        }
        _ => {
            debug!(peer = peer_id, acked_id, "ack does not match outstanding expected-ack");
        }
    }
}

/// Install `ack` for `peer_id`, replacing whatever was there before (a
/// peer holds at most one expected-ack slot at a time).
pub fn install_expected_ack(
    inner: &mut Inner,
    peer_id: &str,
    msg_id: u32,
    kind: AckKind,
    base: std::time::Duration,
    dest_mac: MacAddr,
    wire_frame: Vec<u8>,
) {
    if let Some(record) = inner.peers.get_mut(peer_id) {
        record.expected_ack = Some(ExpectedAck {
            msg_id,
            kind,
            attempt: 0,
            deadline: Instant::now() + base,
            dest_mac,
            wire_frame,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transceiver::in_memory_pair;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn fresh_state(name: &str, mac: MacAddr) -> Arc<SharedState> {
        Arc::new(SharedState::new(name.to_string(), mac))
    }

    #[test]
    fn handshake_req_upserts_peer_and_replies() {
        let state = fresh_state("alice", MacAddr::new(2, 0, 0, 0, 0, 1));
        let ((_tx, _rx), (bob_tx, mut bob_rx)) = in_memory_pair();
        let sender: &dyn FrameSender = &bob_tx;
        let dir = tempdir().unwrap();

        let alice_mac = MacAddr::new(2, 0, 0, 0, 0, 2);
        let frame = codec::decode(&codec::encode(MsgType::HandshakeReq, 1, 1, "0|bob")).unwrap();
        dispatch(&state, sender, dir.path(), alice_mac, frame);

        assert!(state.lock().peers.get("bob").is_some());
        let reply = bob_rx.recv_frame().unwrap();
        let decoded = codec::decode(&reply).unwrap();
        assert_eq!(decoded.msg_type, MsgType::HandshakeAck);
    }

    #[test]
    fn msg_delivers_to_listeners_and_acks() {
        let state = fresh_state("alice", MacAddr::new(2, 0, 0, 0, 0, 1));
        let bob_mac = MacAddr::new(2, 0, 0, 0, 0, 2);
        state.lock().peers.upsert("bob", bob_mac);

        let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let received_clone = received.clone();
        state.lock().listeners.push((
            1,
            Box::new(move |from, body| {
                received_clone.lock().push((from.to_string(), body.to_string()));
            }),
        ));

        let ((_tx, _rx), (bob_tx, mut bob_rx)) = in_memory_pair();
        let dir = tempdir().unwrap();
        let frame = codec::decode(&codec::encode(MsgType::Msg, 5, 1, "hello")).unwrap();
        dispatch(&state, &bob_tx, dir.path(), bob_mac, frame);

        assert_eq!(received.lock().as_slice(), [("bob".to_string(), "hello".to_string())]);
        let ack = codec::decode(&bob_rx.recv_frame().unwrap()).unwrap();
        assert_eq!(ack.msg_type, MsgType::MsgAck);
        assert_eq!(ack.data, "5|1");
    }

    #[test]
    fn duplicate_msg_delivers_once() {
        let state = fresh_state("alice", MacAddr::new(2, 0, 0, 0, 0, 1));
        let bob_mac = MacAddr::new(2, 0, 0, 0, 0, 2);
        state.lock().peers.upsert("bob", bob_mac);

        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count_clone = count.clone();
        state.lock().listeners.push((
            1,
            Box::new(move |_, _| {
                count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        ));

        let ((_tx, _rx), (bob_tx, _bob_rx)) = in_memory_pair();
        let dir = tempdir().unwrap();
        let wire = codec::encode(MsgType::Msg, 9, 1, "hi");
        dispatch(&state, &bob_tx, dir.path(), bob_mac, codec::decode(&wire).unwrap());
        dispatch(&state, &bob_tx, dir.path(), bob_mac, codec::decode(&wire).unwrap());

        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn msg_ack_clears_matching_expected_ack() {
        let state = fresh_state("alice", MacAddr::new(2, 0, 0, 0, 0, 1));
        let bob_mac = MacAddr::new(2, 0, 0, 0, 0, 2);
        {
            let mut inner = state.lock();
            inner.peers.upsert("bob", bob_mac);
            install_expected_ack(
                &mut inner,
                "bob",
                3,
                AckKind::Regular,
                std::time::Duration::from_millis(50),
                bob_mac,
                vec![],
            );
        }

        let ((_tx, _rx), (bob_tx, _bob_rx)) = in_memory_pair();
        let dir = tempdir().unwrap();
        let ack = codec::decode(&codec::encode(MsgType::MsgAck, 99, 1, "3|1")).unwrap();
        dispatch(&state, &bob_tx, dir.path(), bob_mac, ack);

        assert!(state.lock().peers.get("bob").unwrap().expected_ack.is_none());
    }

    #[test]
    fn terminate_removes_peer() {
        let state = fresh_state("alice", MacAddr::new(2, 0, 0, 0, 0, 1));
        let bob_mac = MacAddr::new(2, 0, 0, 0, 0, 2);
        state.lock().peers.upsert("bob", bob_mac);

        let ((_tx, _rx), (bob_tx, _bob_rx)) = in_memory_pair();
        let dir = tempdir().unwrap();
        let frame = codec::decode(&codec::encode(MsgType::Terminate, 1, 1, "")).unwrap();
        dispatch(&state, &bob_tx, dir.path(), bob_mac, frame);

        assert!(state.lock().peers.get("bob").is_none());
    }

    #[test]
    fn file_transfer_round_trip_reassembles_and_acks() {
        let state = fresh_state("alice", MacAddr::new(2, 0, 0, 0, 0, 1));
        let bob_mac = MacAddr::new(2, 0, 0, 0, 0, 2);
        state.lock().peers.upsert("bob", bob_mac);

        let ((_tx, _rx), (bob_tx, mut bob_rx)) = in_memory_pair();
        let dir = tempdir().unwrap();

        let init = codec::decode(&codec::encode(MsgType::FileInit, 7, 1, "a.bin|6")).unwrap();
        dispatch(&state, &bob_tx, dir.path(), bob_mac, init);

        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        let chunk1 = codec::decode(&codec::encode(MsgType::FileChunk, 7, 2, &BASE64.encode(b"abc"))).unwrap();
        let chunk2 = codec::decode(&codec::encode(MsgType::FileChunk, 7, 3, &BASE64.encode(b"def"))).unwrap();
        dispatch(&state, &bob_tx, dir.path(), bob_mac, chunk1);
        dispatch(&state, &bob_tx, dir.path(), bob_mac, chunk2);

        let end = codec::decode(&codec::encode(MsgType::FileEnd, 7, 4, "")).unwrap();
        dispatch(&state, &bob_tx, dir.path(), bob_mac, end);

        let ack = codec::decode(&bob_rx.recv_frame().unwrap()).unwrap();
        assert_eq!(ack.msg_type, MsgType::FileAck);
        assert_eq!(ack.data, "7|2,3,4");

        let written = std::fs::read(dir.path().join("received_a.bin")).unwrap();
        assert_eq!(written, b"abcdef");
        assert!(!state.lock().transfers.contains_key(&(bob_mac, 7)));
    }
}
