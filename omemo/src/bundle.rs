// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The published key bundle other devices fetch to open a session.

use crate::error::Error;
use crate::keys::{verify_signature, KEY_LEN, SIGNATURE_LEN};

/// One one-time pre-key, identified by its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKey {
    /// The id the bundle owner stores the private half under.
    pub id: u32,
    /// The X25519 public key.
    pub public: [u8; KEY_LEN],
}

/// The public key material one device publishes.
///
/// A bundle is enough to start a session with the device asynchronously: the
/// identity key anchors trust, the signed pre-key provides a medium-term DH
/// key whose signature proves it belongs to the identity, and the one-time
/// pre-keys add forward secrecy for the first message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// The device's Ed25519 identity key.
    pub identity_key: [u8; KEY_LEN],
    /// The id of the signed pre-key.
    pub signed_pre_key_id: u32,
    /// The X25519 signed pre-key.
    pub signed_pre_key: [u8; KEY_LEN],
    /// The Ed25519 signature over the signed pre-key, by the identity key.
    pub signed_pre_key_signature: [u8; SIGNATURE_LEN],
    /// The one-time pre-keys, in publication order.
    pub pre_keys: Vec<PreKey>,
}

impl Bundle {
    /// Verifies the signed pre-key signature against the bundle's identity
    /// key.
    pub fn verify(&self) -> Result<(), Error> {
        verify_signature(
            &self.identity_key,
            &self.signed_pre_key,
            &self.signed_pre_key_signature,
        )
    }
}
