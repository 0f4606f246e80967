// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! AES-256-GCM payload encryption with a fresh 96-bit nonce per call and a
//! 128-bit tag.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::Error;
use crate::keys::KEY_LEN;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypts with a fresh random nonce; returns `(nonce, ciphertext || tag)`.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> ([u8; NONCE_LEN], Vec<u8>) {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .expect("AES-GCM encryption is infallible for in-memory buffers");
    (nonce, ciphertext)
}

/// Decrypts `ciphertext || tag`; any bit flip in the inputs fails
/// authentication.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
) -> Result<Vec<u8>, Error> {
    if ciphertext_and_tag.len() < TAG_LEN {
        return Err(Error::InvalidMessage);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext_and_tag)
        .map_err(|_| Error::InvalidMessage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [0x42u8; KEY_LEN];
        let (nonce, sealed) = encrypt(&key, b"attack at dawn");
        assert_eq!(decrypt(&key, &nonce, &sealed).unwrap(), b"attack at dawn");
    }

    #[test]
    fn empty_plaintext() {
        let key = [0x42u8; KEY_LEN];
        let (nonce, sealed) = encrypt(&key, b"");
        // Only the tag remains.
        assert_eq!(sealed.len(), TAG_LEN);
        assert_eq!(decrypt(&key, &nonce, &sealed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn every_ciphertext_bit_flip_is_detected() {
        let key = [0x42u8; KEY_LEN];
        let (nonce, sealed) = encrypt(&key, b"x");
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                decrypt(&key, &nonce, &tampered),
                Err(Error::InvalidMessage)
            );
        }
    }

    #[test]
    fn nonces_are_fresh() {
        let key = [0x42u8; KEY_LEN];
        let (nonce1, _) = encrypt(&key, b"x");
        let (nonce2, _) = encrypt(&key, b"x");
        assert_ne!(nonce1, nonce2);
    }
}
