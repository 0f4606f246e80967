// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The Double Ratchet.
//!
//! A DH ratchet advances the root key whenever the remote party shows a new
//! ratchet key; a symmetric chain ratchet derives one message key per
//! message. Skipped message keys are retained (bounded) so out-of-order
//! messages still decrypt, and are consumed on use so replays do not.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;
use std::collections::HashMap;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::aead;
use crate::error::Error;
use crate::keys::KEY_LEN;

/// How many message keys a receiving chain may skip over, and how many
/// skipped keys are retained in total.
pub const MAX_SKIP: u32 = 1000;

/// Serialized ratchet header length: ratchet key, N, PN.
pub const HEADER_LEN: usize = KEY_LEN + 4 + 4;

const ROOT_INFO: &[u8] = b"OMEMO Root Chain";

type ChainKey = [u8; KEY_LEN];
type MessageKey = [u8; KEY_LEN];

/// The per-message ratchet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The sender's current ratchet public key.
    pub dh: [u8; KEY_LEN],
    /// The position of this message in the sending chain.
    pub n: u32,
    /// The length of the previous sending chain.
    pub pn: u32,
}

impl Header {
    /// Serializes the header into its 40-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..KEY_LEN].copy_from_slice(&self.dh);
        out[KEY_LEN..KEY_LEN + 4].copy_from_slice(&self.n.to_be_bytes());
        out[KEY_LEN + 4..].copy_from_slice(&self.pn.to_be_bytes());
        out
    }

    /// Parses the 40-byte wire form.
    pub fn decode(bytes: &[u8]) -> Result<Header, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidMessage);
        }
        let mut dh = [0u8; KEY_LEN];
        dh.copy_from_slice(&bytes[..KEY_LEN]);
        let n = u32::from_be_bytes(bytes[KEY_LEN..KEY_LEN + 4].try_into().unwrap());
        let pn = u32::from_be_bytes(bytes[KEY_LEN + 4..HEADER_LEN].try_into().unwrap());
        Ok(Header { dh, n, pn })
    }
}

fn kdf_rk(rk: &[u8; KEY_LEN], dh_out: &[u8]) -> ([u8; KEY_LEN], ChainKey) {
    let hkdf = Hkdf::<Sha256>::new(Some(rk), dh_out);
    let mut okm = [0u8; KEY_LEN * 2];
    hkdf.expand(ROOT_INFO, &mut okm)
        .expect("64 bytes is a valid HKDF output length");
    let mut new_rk = [0u8; KEY_LEN];
    let mut ck = [0u8; KEY_LEN];
    new_rk.copy_from_slice(&okm[..KEY_LEN]);
    ck.copy_from_slice(&okm[KEY_LEN..]);
    (new_rk, ck)
}

fn kdf_ck(ck: &ChainKey) -> (MessageKey, ChainKey) {
    let hmac = |byte: u8| {
        let mut mac = Hmac::<Sha256>::new_from_slice(ck)
            .expect("HMAC accepts a 32-byte key");
        mac.update(&[byte]);
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    };
    (hmac(0x01), hmac(0x02))
}

// The per-message ciphertext carries its nonce up front.
fn seal(mk: &MessageKey, plaintext: &[u8]) -> Vec<u8> {
    let (nonce, ciphertext) = aead::encrypt(mk, plaintext);
    let mut out = Vec::with_capacity(aead::NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    out
}

fn open(mk: &MessageKey, body: &[u8]) -> Result<Vec<u8>, Error> {
    if body.len() < aead::NONCE_LEN + aead::TAG_LEN {
        return Err(Error::InvalidMessage);
    }
    let mut nonce = [0u8; aead::NONCE_LEN];
    nonce.copy_from_slice(&body[..aead::NONCE_LEN]);
    aead::decrypt(mk, &nonce, &body[aead::NONCE_LEN..])
}

/// The mutable state of one Double Ratchet session.
pub struct RatchetState {
    pub(crate) dhs: StaticSecret,
    pub(crate) dhr: Option<[u8; KEY_LEN]>,
    pub(crate) rk: [u8; KEY_LEN],
    pub(crate) cks: Option<ChainKey>,
    pub(crate) ckr: Option<ChainKey>,
    pub(crate) ns: u32,
    pub(crate) nr: u32,
    pub(crate) pn: u32,
    pub(crate) skipped: HashMap<([u8; KEY_LEN], u32), MessageKey>,
}

impl std::fmt::Debug for RatchetState {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("RatchetState")
            .field("ns", &self.ns)
            .field("nr", &self.nr)
            .field("pn", &self.pn)
            .field("skipped", &self.skipped.len())
            .finish()
    }
}

impl PartialEq for RatchetState {
    fn eq(&self, other: &RatchetState) -> bool {
        self.dhs.to_bytes() == other.dhs.to_bytes()
            && self.dhr == other.dhr
            && self.rk == other.rk
            && self.cks == other.cks
            && self.ckr == other.ckr
            && self.ns == other.ns
            && self.nr == other.nr
            && self.pn == other.pn
            && self.skipped == other.skipped
    }
}

impl Eq for RatchetState {}

impl Clone for RatchetState {
    fn clone(&self) -> RatchetState {
        RatchetState {
            dhs: StaticSecret::from(self.dhs.to_bytes()),
            dhr: self.dhr,
            rk: self.rk,
            cks: self.cks,
            ckr: self.ckr,
            ns: self.ns,
            nr: self.nr,
            pn: self.pn,
            skipped: self.skipped.clone(),
        }
    }
}

impl RatchetState {
    /// Initializes the initiator ("Alice") side from the X3DH secret and the
    /// responder's signed pre-key.
    pub fn initiator(shared_key: [u8; KEY_LEN], their_spk: [u8; KEY_LEN]) -> RatchetState {
        let dhs = StaticSecret::random_from_rng(OsRng);
        let dh_out = dhs.diffie_hellman(&PublicKey::from(their_spk));
        let (rk, cks) = kdf_rk(&shared_key, dh_out.as_bytes());
        RatchetState {
            dhs,
            dhr: Some(their_spk),
            rk,
            cks: Some(cks),
            ckr: None,
            ns: 0,
            nr: 0,
            pn: 0,
            skipped: HashMap::new(),
        }
    }

    /// Initializes the responder ("Bob") side from the X3DH secret and the
    /// private half of the signed pre-key the initiator used.
    pub fn responder(shared_key: [u8; KEY_LEN], spk: StaticSecret) -> RatchetState {
        RatchetState {
            dhs: spk,
            dhr: None,
            rk: shared_key,
            cks: None,
            ckr: None,
            ns: 0,
            nr: 0,
            pn: 0,
            skipped: HashMap::new(),
        }
    }

    /// Ratchet-encrypts a payload, returning `header || nonce || ciphertext`.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let cks = self.cks.as_ref().ok_or(Error::InvalidMessage)?;
        let (mk, next) = kdf_ck(cks);
        self.cks = Some(next);
        let header = Header {
            dh: PublicKey::from(&self.dhs).to_bytes(),
            n: self.ns,
            pn: self.pn,
        };
        self.ns += 1;
        let mut out = Vec::new();
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&seal(&mk, plaintext));
        Ok(out)
    }

    /// Ratchet-decrypts a message produced by [`RatchetState::encrypt`].
    pub fn decrypt(&mut self, message: &[u8]) -> Result<Vec<u8>, Error> {
        let header = Header::decode(message)?;
        let body = &message[HEADER_LEN..];

        // A message from a chain we already passed: its key was retained
        // when we skipped over it, and is consumed now.
        if let Some(mk) = self.skipped.remove(&(header.dh, header.n)) {
            return open(&mk, body);
        }

        if Some(header.dh) != self.dhr {
            self.skip_message_keys(header.pn)?;
            self.dh_ratchet(&header);
        } else if header.n < self.nr {
            // Same chain, position already consumed, no skipped key left.
            return Err(Error::DuplicateMessage);
        }

        self.skip_message_keys(header.n)?;
        let ckr = self.ckr.as_ref().ok_or(Error::InvalidMessage)?;
        let (mk, next) = kdf_ck(ckr);
        self.ckr = Some(next);
        self.nr += 1;
        open(&mk, body)
    }

    // Derives and retains the message keys of the current receiving chain up
    // to (excluding) `until`. The bound is checked before any state changes,
    // so a refused skip leaves the ratchet untouched.
    fn skip_message_keys(&mut self, until: u32) -> Result<(), Error> {
        if self.nr >= until {
            return Ok(());
        }
        if until > self.nr + MAX_SKIP {
            return Err(Error::SkippedKeyLimit);
        }
        if self.skipped.len() + (until - self.nr) as usize > MAX_SKIP as usize {
            return Err(Error::SkippedKeyLimit);
        }
        if let (Some(mut ckr), Some(dhr)) = (self.ckr, self.dhr) {
            while self.nr < until {
                let (mk, next) = kdf_ck(&ckr);
                ckr = next;
                self.skipped.insert((dhr, self.nr), mk);
                self.nr += 1;
            }
            self.ckr = Some(ckr);
        }
        Ok(())
    }

    fn dh_ratchet(&mut self, header: &Header) {
        self.pn = self.ns;
        self.ns = 0;
        self.nr = 0;
        self.dhr = Some(header.dh);
        let dh_out = self.dhs.diffie_hellman(&PublicKey::from(header.dh));
        let (rk, ckr) = kdf_rk(&self.rk, dh_out.as_bytes());
        self.rk = rk;
        self.ckr = Some(ckr);
        self.dhs = StaticSecret::random_from_rng(OsRng);
        let dh_out = self.dhs.diffie_hellman(&PublicKey::from(header.dh));
        let (rk, cks) = kdf_rk(&self.rk, dh_out.as_bytes());
        self.rk = rk;
        self.cks = Some(cks);
    }
}
