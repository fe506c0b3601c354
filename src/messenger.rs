// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The public messenger API: `send_message`/`send_file`/`rename`,
//! listener registration, and the peer snapshot consumed by the CLI (and,
//! out of scope here, the HTTP/WebSocket bridge).
//!
//! Construction wires together shared state with a transceiver and spawns
//! the three background threads (sniffer, reliability, announcer) that keep
//! the protocol alive for the life of the `Messenger`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::MessengerError;
use crate::file_transfer;
use crate::peer::AckKind;
use crate::reliability::BackoffPolicy;
use crate::router;
use crate::state::{MessageListener, SharedState};
use crate::transceiver::{FrameReceiver, FrameSender};
use crate::wire::{self, codec, MacAddr, MsgType};
use crate::{discovery, reliability};

/// A fallback MAC used when the interface driver doesn't report one.
pub const FALLBACK_MAC: MacAddr = MacAddr(0x02, 0xde, 0xad, 0xbe, 0xef, 0x00);

/// A read-only snapshot of one peer, for `known_peers` and the CLI's `ls`.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub id: String,
    pub mac: MacAddr,
    pub last_seen: Instant,
}

/// An opaque handle returned by [`Messenger::register_message_listener`],
/// used to remove that listener again later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// The running messenger core: shared state, a sender handle, and the
/// three background threads that drive the protocol.
pub struct Messenger {
    state: Arc<SharedState>,
    sender: Arc<dyn FrameSender>,
    running: Arc<AtomicBool>,
    reassembly_dir: std::path::PathBuf,
    next_listener_id: AtomicU64,
    sniffer: Option<JoinHandle<()>>,
    reliability: Option<JoinHandle<()>>,
    announcer: Option<JoinHandle<()>>,
}

impl Messenger {
    /// Start the messenger core: spawns the sniffer, reliability, and
    /// announcer threads and returns once they're running. `reassembly_dir`
    /// is where received files are written.
    pub fn start(
        our_name: String,
        our_mac: MacAddr,
        sender: Arc<dyn FrameSender>,
        mut receiver: Box<dyn FrameReceiver>,
        reassembly_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        let state = Arc::new(SharedState::new(our_name, our_mac));
        let running = Arc::new(AtomicBool::new(true));
        let reassembly_dir = reassembly_dir.into();

        let sniffer = {
            let state = state.clone();
            let sender = sender.clone();
            let running = running.clone();
            let dir = reassembly_dir.clone();
            std::thread::spawn(move || {
                while running.load(Ordering::Acquire) {
                    let raw = match receiver.recv_frame() {
                        Ok(raw) => raw,
                        Err(e) => {
                            warn!(error = %e, "sniffer read failed, continuing");
                            continue;
                        }
                    };
                    let Some(parsed) = wire::parse_frame(&raw, our_mac) else {
                        continue;
                    };
                    let frame = match codec::decode(&parsed.payload) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!(error = %e, "dropping malformed frame");
                            continue;
                        }
                    };
                    router::dispatch(&state, &*sender, &dir, parsed.src, frame);
                }
            })
        };

        let reliability = {
            let state = state.clone();
            let sender = sender.clone();
            let running = running.clone();
            std::thread::spawn(move || reliability::run(state, sender, running, BackoffPolicy::default()))
        };

        let announcer = {
            let state = state.clone();
            let sender = sender.clone();
            let running = running.clone();
            std::thread::spawn(move || discovery::run(state, sender, running))
        };

        Self {
            state,
            sender,
            running,
            reassembly_dir,
            next_listener_id: AtomicU64::new(1),
            sniffer: Some(sniffer),
            reliability: Some(reliability),
            announcer: Some(announcer),
        }
    }

    /// Send a unicast plaintext message to `peer_id`. Installs the
    /// expected-ack before the frame goes out, per the redesigned ordering
    /// that drops the original's pacing sleep.
    pub fn send_message(&self, peer_id: &str, text: &str) -> Result<(), MessengerError> {
        let mut inner = self.state.lock();
        if inner.peers.get(peer_id).is_none() {
            return Err(MessengerError::UnknownPeer(peer_id.to_string()));
        }
        let dest_mac = inner.peers.get(peer_id).unwrap().mac;

        let msg_id = inner.next_msg_id();
        let payload = codec::encode(MsgType::Msg, msg_id, 1, text);
        let wire_frame = wire::build_frame(dest_mac, inner.our_mac, &payload);

        router::install_expected_ack(
            &mut inner,
            peer_id,
            msg_id,
            AckKind::Regular,
            reliability::BackoffPolicy::default().regular_base,
            dest_mac,
            wire_frame.clone(),
        );

        self.sender.send_frame(&wire_frame)?;
        drop(inner);
        self.state.notify_ack_pending();
        Ok(())
    }

    /// Send a file to `peer_id`: one `FILE_INIT`, N `FILE_CHUNK`s, one
    /// `FILE_END`, then an expected-ack (kind=file) against the whole transfer.
    pub fn send_file(&self, peer_id: &str, path: &Path) -> Result<usize, MessengerError> {
        let dest_mac = {
            let inner = self.state.lock();
            inner.peers.get(peer_id).ok_or_else(|| MessengerError::UnknownPeer(peer_id.to_string()))?.mac
        };

        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("file.bin")
            .to_string();
        let chunks = file_transfer::chunk(&bytes);

        let mut inner = self.state.lock();
        let msg_id = inner.next_msg_id();
        let init = codec::encode(MsgType::FileInit, msg_id, 1, &format!("{filename}|{}", bytes.len()));
        let on_air = wire::build_frame(dest_mac, inner.our_mac, &init);
        drop(inner);
        self.sender.send_frame(&on_air)?;

        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;
        let mut seq = 2u32;
        for chunk in &chunks {
            let mut inner = self.state.lock();
            let data = BASE64.encode(chunk);
            let payload = codec::encode(MsgType::FileChunk, msg_id, seq, &data);
            let on_air = wire::build_frame(dest_mac, inner.our_mac, &payload);
            drop(inner);
            self.sender.send_frame(&on_air)?;
            seq += 1;
        }

        let mut inner = self.state.lock();
        let end = codec::encode(MsgType::FileEnd, msg_id, seq, "");
        let wire_frame = wire::build_frame(dest_mac, inner.our_mac, &end);

        router::install_expected_ack(
            &mut inner,
            peer_id,
            msg_id,
            AckKind::File,
            reliability::BackoffPolicy::default().file_base,
            dest_mac,
            wire_frame.clone(),
        );

        self.sender.send_frame(&wire_frame)?;
        drop(inner);
        self.state.notify_ack_pending();
        Ok(chunks.len())
    }

    /// Rename ourselves and announce it to every known peer via unicast
    /// `RENAME`. Unlike an incoming rename, this doesn't rekey our own
    /// peer-table entry (we have none); it only updates `our_name`.
    pub fn rename(&self, new_name: &str) -> Result<(), MessengerError> {
        let peer_macs: Vec<MacAddr> = {
            let mut inner = self.state.lock();
            inner.our_name = new_name.to_string();
            inner.peers.iter().map(|(_, record)| record.mac).collect()
        };

        for dest_mac in peer_macs {
            let mut inner = self.state.lock();
            let msg_id = inner.next_msg_id();
            let payload = codec::encode(MsgType::Rename, msg_id, 1, new_name);
            let on_air = wire::build_frame(dest_mac, inner.our_mac, &payload);
            drop(inner);
            self.sender.send_frame(&on_air)?;
        }
        Ok(())
    }

    /// Register a message listener, invoked synchronously from the sniffer
    /// thread as `cb(sender_peer_id, plaintext_body)` on every `MSG` delivery.
    pub fn register_message_listener<F>(&self, cb: F) -> ListenerId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let boxed: MessageListener = Box::new(cb);
        self.state.lock().listeners.push((id, boxed));
        ListenerId(id)
    }

    /// Remove a previously registered listener. No-op if already removed.
    pub fn remove_message_listener(&self, id: ListenerId) {
        self.state.lock().listeners.retain(|(listener_id, _)| *listener_id != id.0);
    }

    /// A read-only snapshot of every known peer.
    pub fn known_peers(&self) -> Vec<PeerSnapshot> {
        self.state
            .lock()
            .peers
            .iter()
            .map(|(id, record)| PeerSnapshot {
                id: id.clone(),
                mac: record.mac,
                last_seen: record.last_seen,
            })
            .collect()
    }

    /// The directory received files are reassembled into.
    pub fn reassembly_dir(&self) -> &Path {
        &self.reassembly_dir
    }

    /// Broadcast `TERMINATE` and stop the background threads. Blocks until
    /// the reliability and announcer threads have joined (both park on
    /// condvars/sleeps that `running` unblocks promptly); safe to call at
    /// most once, since the join handles are already taken afterward.
    ///
    /// The sniffer thread is not joined: it blocks inside `recv_frame`,
    /// which a live datalink channel has no portable way to interrupt from
    /// outside, so it is left to exit on its own next inbound frame (or on
    /// process exit) rather than making shutdown hang indefinitely.
    pub fn shutdown(mut self) {
        discovery::announce_shutdown(&self.state, &*self.sender);
        self.running.store(false, Ordering::Release);
        self.state.notify_ack_pending();

        if let Some(h) = self.reliability.take() {
            let _ = h.join();
        }
        if let Some(h) = self.announcer.take() {
            let _ = h.join();
        }
        self.sniffer.take();
    }
}

/// Resolve the MAC to advertise as `addr2`: the interface's own MAC if the
/// driver reports one, else [`FALLBACK_MAC`].
pub fn resolve_own_mac(iface_name: &str) -> MacAddr {
    match crate::transceiver::own_mac(iface_name) {
        Some(pnet_datalink::MacAddr(a, b, c, d, e, f)) => MacAddr::new(a, b, c, d, e, f),
        None => {
            warn!(iface = iface_name, "interface reported no MAC, using fallback pseudo-MAC");
            FALLBACK_MAC
        }
    }
}
