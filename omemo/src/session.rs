// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! One pairwise session and its binary persistence format.
//!
//! All multi-byte integers are big-endian. Deserializing a serialized
//! session yields a field-wise identical session, skipped message keys
//! included.

use x25519_dalek::StaticSecret;

use crate::error::Error;
use crate::keys::KEY_LEN;
use crate::ratchet::RatchetState;

/// Pre-key material the initiator attaches to messages until the responder
/// answers, allowing the responder to establish the session late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPreKey {
    /// The consumed one-time pre-key id, if one was used.
    pub pre_key_id: Option<u32>,
    /// The signed pre-key id the session was built against.
    pub signed_pre_key_id: u32,
    /// The public half of the X3DH ephemeral key.
    pub ephemeral_key: [u8; KEY_LEN],
}

/// One pairwise Double Ratchet session with a remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The remote device's Ed25519 identity key.
    pub remote_identity: [u8; KEY_LEN],
    /// Set while this side initiated and the responder has not answered yet.
    pub pending_pre_key: Option<PendingPreKey>,
    /// The ratchet state.
    pub ratchet: RatchetState,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.pos + len > self.bytes.len() {
            return Err(Error::InvalidMessage);
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn key(&mut self) -> Result<[u8; KEY_LEN], Error> {
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(self.take(KEY_LEN)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn flag(&mut self) -> Result<bool, Error> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::InvalidMessage),
        }
    }

    fn done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn push_flagged_key(out: &mut Vec<u8>, key: &Option<[u8; KEY_LEN]>) {
    match key {
        Some(key) => {
            out.push(1);
            out.extend_from_slice(key);
        }
        None => out.push(0),
    }
}

fn read_flagged_key(reader: &mut Reader) -> Result<Option<[u8; KEY_LEN]>, Error> {
    if reader.flag()? {
        Ok(Some(reader.key()?))
    } else {
        Ok(None)
    }
}

impl Session {
    /// Serializes the session for the store.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.remote_identity);
        match &self.pending_pre_key {
            Some(pending) => {
                out.push(1);
                match pending.pre_key_id {
                    Some(id) => {
                        out.push(1);
                        out.extend_from_slice(&id.to_be_bytes());
                    }
                    None => out.push(0),
                }
                out.extend_from_slice(&pending.signed_pre_key_id.to_be_bytes());
                out.extend_from_slice(&pending.ephemeral_key);
            }
            None => out.push(0),
        }

        let ratchet = &self.ratchet;
        out.extend_from_slice(&ratchet.dhs.to_bytes());
        push_flagged_key(&mut out, &ratchet.dhr);
        out.extend_from_slice(&ratchet.rk);
        push_flagged_key(&mut out, &ratchet.cks);
        push_flagged_key(&mut out, &ratchet.ckr);
        out.extend_from_slice(&ratchet.ns.to_be_bytes());
        out.extend_from_slice(&ratchet.nr.to_be_bytes());
        out.extend_from_slice(&ratchet.pn.to_be_bytes());
        out.extend_from_slice(&(ratchet.skipped.len() as u32).to_be_bytes());
        for ((dh, n), mk) in &ratchet.skipped {
            out.extend_from_slice(dh);
            out.extend_from_slice(&n.to_be_bytes());
            out.extend_from_slice(mk);
        }
        out
    }

    /// Rebuilds a session from its serialized form.
    pub fn deserialize(bytes: &[u8]) -> Result<Session, Error> {
        let mut reader = Reader::new(bytes);
        let remote_identity = reader.key()?;
        let pending_pre_key = if reader.flag()? {
            let pre_key_id = if reader.flag()? {
                Some(reader.u32()?)
            } else {
                None
            };
            let signed_pre_key_id = reader.u32()?;
            let ephemeral_key = reader.key()?;
            Some(PendingPreKey {
                pre_key_id,
                signed_pre_key_id,
                ephemeral_key,
            })
        } else {
            None
        };

        let dhs = StaticSecret::from(reader.key()?);
        let dhr = read_flagged_key(&mut reader)?;
        let rk = reader.key()?;
        let cks = read_flagged_key(&mut reader)?;
        let ckr = read_flagged_key(&mut reader)?;
        let ns = reader.u32()?;
        let nr = reader.u32()?;
        let pn = reader.u32()?;
        let skipped_count = reader.u32()?;
        let mut skipped = std::collections::HashMap::new();
        for _ in 0..skipped_count {
            let dh = reader.key()?;
            let n = reader.u32()?;
            let mk = reader.key()?;
            skipped.insert((dh, n), mk);
        }
        if !reader.done() {
            return Err(Error::InvalidMessage);
        }

        Ok(Session {
            remote_identity,
            pending_pre_key,
            ratchet: RatchetState {
                dhs,
                dhr,
                rk,
                cks,
                ckr,
                ns,
                nr,
                pn,
                skipped,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rand::RngCore;
    use x25519_dalek::PublicKey;

    fn sample_session(pending: bool, skipped: usize) -> Session {
        let mut shared_key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut shared_key);
        let spk = StaticSecret::random_from_rng(OsRng);
        let spk_public = PublicKey::from(&spk).to_bytes();
        let mut ratchet = RatchetState::initiator(shared_key, spk_public);
        for i in 0..skipped {
            let mut mk = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut mk);
            ratchet.skipped.insert((spk_public, i as u32), mk);
        }
        ratchet.ns = 5;
        ratchet.nr = 3;
        ratchet.pn = 2;
        Session {
            remote_identity: {
                let mut id = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut id);
                id
            },
            pending_pre_key: pending.then(|| PendingPreKey {
                pre_key_id: Some(12),
                signed_pre_key_id: 3,
                ephemeral_key: [9u8; KEY_LEN],
            }),
            ratchet,
        }
    }

    #[test]
    fn round_trip_without_pending() {
        let session = sample_session(false, 0);
        let restored = Session::deserialize(&session.serialize()).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn round_trip_with_pending_and_skipped() {
        let session = sample_session(true, 7);
        let restored = Session::deserialize(&session.serialize()).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn pending_without_pre_key_id() {
        let mut session = sample_session(true, 0);
        session.pending_pre_key.as_mut().unwrap().pre_key_id = None;
        let restored = Session::deserialize(&session.serialize()).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let session = sample_session(true, 2);
        let blob = session.serialize();
        assert!(Session::deserialize(&blob[..blob.len() - 1]).is_err());
        assert!(Session::deserialize(&[]).is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let session = sample_session(false, 0);
        let mut blob = session.serialize();
        blob.push(0);
        assert!(Session::deserialize(&blob).is_err());
    }
}
