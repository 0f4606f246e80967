// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Identity keys and the Ed25519 → X25519 conversion.
//!
//! OMEMO identities sign with Ed25519 but run Diffie-Hellman over X25519.
//! Both key types live on curve25519, related by the birational map
//! `u = (1+y)/(1-y)`; converting the public key through that map must agree
//! with deriving the X25519 public key from the converted private scalar.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::Error;

/// Length in bytes of every curve25519 key this module handles.
pub const KEY_LEN: usize = 32;

/// Length in bytes of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// The long-term Ed25519 identity of one device.
#[derive(Clone)]
pub struct IdentityKeyPair {
    signing: SigningKey,
}

impl IdentityKeyPair {
    /// Generates a fresh identity.
    pub fn generate() -> IdentityKeyPair {
        IdentityKeyPair {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuilds the identity from its 32-byte seed.
    pub fn from_seed(seed: [u8; KEY_LEN]) -> IdentityKeyPair {
        IdentityKeyPair {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The 32-byte seed this identity can be rebuilt from.
    pub fn seed(&self) -> [u8; KEY_LEN] {
        self.signing.to_bytes()
    }

    /// The compressed Ed25519 public key.
    pub fn public(&self) -> [u8; KEY_LEN] {
        self.signing.verifying_key().to_bytes()
    }

    /// Signs a message with the identity key.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing.sign(message).to_bytes()
    }

    /// Converts the private half for X25519 Diffie-Hellman: the seed is
    /// hashed with SHA-512 and the first 32 bytes are clamped into a scalar.
    pub fn to_x25519(&self) -> StaticSecret {
        let hash = Sha512::digest(self.signing.to_bytes());
        let mut scalar = Zeroizing::new([0u8; KEY_LEN]);
        scalar.copy_from_slice(&hash[..KEY_LEN]);
        scalar[0] &= 248;
        scalar[31] &= 127;
        scalar[31] |= 64;
        StaticSecret::from(*scalar)
    }

    /// The X25519 public key matching [`IdentityKeyPair::to_x25519`].
    pub fn x25519_public(&self) -> [u8; KEY_LEN] {
        PublicKey::from(&self.to_x25519()).to_bytes()
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        // The private half stays out of logs.
        fmt.debug_struct("IdentityKeyPair")
            .field("public", &self.public())
            .finish()
    }
}

/// Converts a compressed Ed25519 public key to its X25519 form through the
/// birational map.
pub fn ed_public_to_x25519(ed_public: &[u8; KEY_LEN]) -> Result<[u8; KEY_LEN], Error> {
    let verifying =
        VerifyingKey::from_bytes(ed_public).map_err(|_| Error::InvalidKeyLength)?;
    Ok(verifying.to_montgomery().to_bytes())
}

/// Verifies an Ed25519 signature against a compressed public key.
pub fn verify_signature(
    ed_public: &[u8; KEY_LEN],
    message: &[u8],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<(), Error> {
    let verifying =
        VerifyingKey::from_bytes(ed_public).map_err(|_| Error::InvalidKeyLength)?;
    let signature = Signature::from_bytes(signature);
    verifying
        .verify(message, &signature)
        .map_err(|_| Error::InvalidSignature)
}
