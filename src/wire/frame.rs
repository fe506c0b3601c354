// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! 802.11 data-frame construction and parsing.
//!
//! A Ghost Frame on the air is a monitor-mode capture: an 8-byte all-zero
//! RadioTap header, a type=2/subtype=0 (plain Data) 802.11 MAC header with
//! `addr3` pinned to the fixed sentinel BSSID below, an LLC/SNAP wrapper
//! with every field zeroed, and the codec payload as the frame body. There
//! is no IP layer anywhere in this stack.

pub use pnet::util::MacAddr;

/// The fixed pseudo-BSSID every Ghost Frame carries in `addr3`. A captured
/// frame whose `addr3` doesn't match this, byte for byte, is not ours.
pub const GHOST_BSSID: MacAddr = MacAddr(0x02, 0x07, 0x08, 0x15, 0x19, 0x20);

/// The 802.11 broadcast address.
pub const BROADCAST: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

const RADIOTAP_HEADER: [u8; 8] = [0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
const DOT11_FRAME_CONTROL: [u8; 2] = [0x08, 0x00];
const LLC_SNAP: [u8; 8] = [
    0x00, 0x00, 0x03, // LLC: dsap, ssap, control
    0x00, 0x00, 0x00, // SNAP: OUI
    0x00, 0x00, // SNAP: protocol id
];

/// Build a complete capture-format frame (RadioTap + 802.11 + LLC/SNAP +
/// payload) ready to inject on a monitor-mode interface.
pub fn build_frame(dst: MacAddr, src: MacAddr, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RADIOTAP_HEADER.len() + 24 + LLC_SNAP.len() + payload.len());
    out.extend_from_slice(&RADIOTAP_HEADER);
    out.extend_from_slice(&DOT11_FRAME_CONTROL);
    out.extend_from_slice(&[0x00, 0x00]); // duration/ID, unused
    out.extend_from_slice(&dst.octets());
    out.extend_from_slice(&src.octets());
    out.extend_from_slice(&GHOST_BSSID.octets());
    out.extend_from_slice(&[0x00, 0x00]); // sequence control, unused
    out.extend_from_slice(&LLC_SNAP);
    out.extend_from_slice(payload);
    out
}

/// A frame accepted past the `addr3` sentinel and loopback check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub src: MacAddr,
    pub payload: Vec<u8>,
}

/// Parse a captured frame, returning `None` for anything that is not a
/// Ghost Frame: too short, not a data frame, wrong `addr3`, or missing body.
///
/// `our_mac` frames are dropped here too (loopback suppression), so callers
/// never see their own transmissions echoed back by a promiscuous capture.
pub fn parse_frame(raw: &[u8], our_mac: MacAddr) -> Option<ParsedFrame> {
    if raw.len() < RADIOTAP_HEADER.len() + 24 + LLC_SNAP.len() {
        return None;
    }

    let dot11 = &raw[RADIOTAP_HEADER.len()..];
    let fc_type = (dot11[0] >> 2) & 0b11;
    if fc_type != 0b10 {
        return None; // not a Data frame
    }

    let addr2 = MacAddr::new(dot11[10], dot11[11], dot11[12], dot11[13], dot11[14], dot11[15]);
    let addr3 = MacAddr::new(dot11[16], dot11[17], dot11[18], dot11[19], dot11[20], dot11[21]);
    if addr3 != GHOST_BSSID || addr2 == our_mac {
        return None;
    }

    let body_start = RADIOTAP_HEADER.len() + 24 + LLC_SNAP.len();
    let payload = raw[body_start..].to_vec();
    if payload.is_empty() {
        return None;
    }

    Some(ParsedFrame { src: addr2, payload })
}

trait MacAddrExt {
    fn octets(&self) -> [u8; 6];
}

impl MacAddrExt for MacAddr {
    fn octets(&self) -> [u8; 6] {
        let MacAddr(a, b, c, d, e, f) = *self;
        [a, b, c, d, e, f]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: MacAddr = MacAddr(0x02, 0x11, 0x22, 0x33, 0x44, 0x55);
    const DST: MacAddr = MacAddr(0x02, 0x66, 0x77, 0x88, 0x99, 0xaa);

    #[test]
    fn round_trips_payload_and_source() {
        let raw = build_frame(DST, SRC, b"GF|03|0001|0001|hi");
        let parsed = parse_frame(&raw, DST).expect("should parse");
        assert_eq!(parsed.src, SRC);
        assert_eq!(parsed.payload, b"GF|03|0001|0001|hi");
    }

    #[test]
    fn drops_frames_with_wrong_bssid() {
        let mut raw = build_frame(DST, SRC, b"hi");
        // corrupt addr3 (last byte)
        let addr3_end = RADIOTAP_HEADER.len() + 2 + 2 + 6 + 6 + 6;
        raw[addr3_end - 1] ^= 0xff;
        assert_eq!(parse_frame(&raw, DST), None);
    }

    #[test]
    fn drops_own_transmissions() {
        let raw = build_frame(DST, SRC, b"hi");
        assert_eq!(parse_frame(&raw, SRC), None);
    }

    #[test]
    fn drops_empty_body() {
        let raw = build_frame(DST, SRC, b"");
        assert_eq!(parse_frame(&raw, DST), None);
    }

    #[test]
    fn drops_truncated_capture() {
        let raw = build_frame(DST, SRC, b"hi");
        assert_eq!(parse_frame(&raw[..10], DST), None);
    }
}
