// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Everything that touches bytes on the wire: the codec payload, the AES
//! layer underneath it, and the 802.11 frame that carries it.

pub mod codec;
pub mod crypto;
pub mod frame;

pub use codec::{Frame, MsgType};
pub use frame::{build_frame, parse_frame, MacAddr, ParsedFrame, BROADCAST, GHOST_BSSID};
