// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Symmetric encryption for the frame codec's `DATA` field.
//!
//! AES-256 in CBC mode, PKCS#7 padding, a fresh random IV per frame prepended
//! to the ciphertext. There is no key exchange: every peer is provisioned
//! with the same 32-byte pre-shared key out of band.

use crate::error::CodecError;
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

type Encryptor = cbc::Encryptor<Aes256>;
type Decryptor = cbc::Decryptor<Aes256>;

const IV_LEN: usize = 16;

/// The 32-byte pre-shared AES-256 key, identical on every peer.
///
/// Key distribution is explicitly out of scope; this mirrors the original
/// implementation's hard-coded key rather than inventing a key-exchange
/// scheme this spec does not call for.
const PSK: [u8; 32] = *b"Kx9#mP2$vL8@nQ5!wR7&tY4^uI6*oE3%";

/// Encrypt `plaintext`, returning `iv || ciphertext`. Empty input yields
/// empty output (the codec treats that as "no encryption performed").
pub fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    if plaintext.is_empty() {
        return Vec::new();
    }

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Encryptor::new(&PSK.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Reverse of [`encrypt`]: split off the IV, decrypt, and strip padding.
/// Empty input decrypts to empty output.
pub fn decrypt(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < IV_LEN {
        return Err(CodecError::Decrypt);
    }

    let (iv, ciphertext) = data.split_at(IV_LEN);
    Decryptor::new(&PSK.into(), iv.try_into().map_err(|_| CodecError::Decrypt)?)
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CodecError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_arbitrary_bytes() {
        for plaintext in [
            &b""[..],
            b"hello",
            b"hello \xf0\x9f\x91\xbb world",
            b"contains | pipe | chars",
            &vec![0u8; 5000][..],
        ] {
            let encrypted = encrypt(plaintext);
            let decrypted = decrypt(&encrypted).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn encrypt_is_randomized() {
        let a = encrypt(b"same plaintext");
        let b = encrypt(b"same plaintext");
        assert_ne!(a, b, "IV should differ across calls");
    }

    #[test]
    fn empty_plaintext_yields_empty_ciphertext() {
        assert!(encrypt(b"").is_empty());
    }

    #[test]
    fn truncated_ciphertext_fails_softly() {
        assert_eq!(decrypt(&[1, 2, 3]), Err(CodecError::Decrypt));
    }
}
