// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame transport.
//!
//! The send and receive halves are split, mirroring `pnet_datalink`'s own
//! `channel()` split: a [`FrameSender`] is shared (`Arc`) across every
//! thread that emits frames (application API, reliability retransmits,
//! the announcer), while the [`FrameReceiver`] is owned outright by the
//! sniffer thread, which blocks inside it. The production implementation
//! opens a raw datalink channel on a monitor-mode interface; the test
//! implementation is an in-memory channel pair. Nothing above this layer
//! knows which one it's talking to.

use std::io;

use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use pnet_datalink::Channel;

/// Inject a raw capture-format frame. Implementors must be safely callable
/// from multiple threads at once.
pub trait FrameSender: Send + Sync {
    fn send_frame(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Sniff raw capture-format frames. `recv_frame` blocks the calling thread
/// until a frame is available, mirroring the sniffer thread's blocking read
/// from the original driver.
pub trait FrameReceiver: Send {
    fn recv_frame(&mut self) -> io::Result<Vec<u8>>;
}

/// Open a raw datalink channel on `iface_name`, returning the split halves.
pub fn open_datalink(iface_name: &str) -> io::Result<(DatalinkSender, DatalinkReceiver)> {
    let interface = pnet_datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == iface_name)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such interface: {iface_name}")))?;

    match pnet_datalink::channel(&interface, Default::default()) {
        Ok(Channel::Ethernet(tx, rx)) => Ok((DatalinkSender(Mutex::new(tx)), DatalinkReceiver(rx))),
        Ok(_) => Err(io::Error::new(io::ErrorKind::Other, "unsupported channel type")),
        Err(e) => Err(e),
    }
}

/// The interface's own MAC, or `None` if the driver didn't report one.
pub fn own_mac(iface_name: &str) -> Option<pnet_datalink::MacAddr> {
    pnet_datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == iface_name)
        .and_then(|iface| iface.mac)
}

/// All interface names, for the interactive startup prompt.
pub fn interface_names() -> Vec<String> {
    pnet_datalink::interfaces().into_iter().map(|iface| iface.name).collect()
}

pub struct DatalinkSender(Mutex<Box<dyn pnet_datalink::DataLinkSender>>);

impl FrameSender for DatalinkSender {
    fn send_frame(&self, bytes: &[u8]) -> io::Result<()> {
        let mut tx = self.0.lock();
        match tx.send_to(bytes, None) {
            Some(result) => result,
            None => Err(io::Error::new(io::ErrorKind::Other, "send buffer full")),
        }
    }
}

pub struct DatalinkReceiver(Box<dyn pnet_datalink::DataLinkReceiver>);

impl FrameReceiver for DatalinkReceiver {
    fn recv_frame(&mut self) -> io::Result<Vec<u8>> {
        self.0.next().map(<[u8]>::to_vec)
    }
}

/// An in-memory channel pair standing in for a live NIC, for tests.
pub struct InMemorySender(Sender<Vec<u8>>);

impl FrameSender for InMemorySender {
    fn send_frame(&self, bytes: &[u8]) -> io::Result<()> {
        self.0
            .send(bytes.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))
    }
}

pub struct InMemoryReceiver(Receiver<Vec<u8>>);

impl FrameReceiver for InMemoryReceiver {
    fn recv_frame(&mut self) -> io::Result<Vec<u8>> {
        self.0
            .recv()
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))
    }
}

/// Build a connected pair of endpoints: frames sent by one side's
/// [`InMemorySender`] arrive on the other side's [`InMemoryReceiver`].
pub fn in_memory_pair() -> ((InMemorySender, InMemoryReceiver), (InMemorySender, InMemoryReceiver)) {
    let (tx_a, rx_a) = crossbeam::channel::unbounded();
    let (tx_b, rx_b) = crossbeam::channel::unbounded();
    ((InMemorySender(tx_a), InMemoryReceiver(rx_b)), (InMemorySender(tx_b), InMemoryReceiver(rx_a)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pair_delivers_frames_in_order() {
        let ((a_tx, _a_rx), (_b_tx, mut b_rx)) = in_memory_pair();
        a_tx.send_frame(b"one").unwrap();
        a_tx.send_frame(b"two").unwrap();
        assert_eq!(b_rx.recv_frame().unwrap(), b"one");
        assert_eq!(b_rx.recv_frame().unwrap(), b"two");
    }

    #[test]
    fn in_memory_pair_is_bidirectional() {
        let ((_a_tx, mut a_rx), (b_tx, _b_rx)) = in_memory_pair();
        b_tx.send_frame(b"reply").unwrap();
        assert_eq!(a_rx.recv_frame().unwrap(), b"reply");
    }
}
