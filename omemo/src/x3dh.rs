// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Extended Triple Diffie-Hellman key agreement.
//!
//! Both sides combine long-term identity keys, the responder's medium-term
//! signed pre-key, the initiator's ephemeral key and optionally a one-time
//! pre-key into the same 32-byte session secret.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::bundle::Bundle;
use crate::error::Error;
use crate::keys::{ed_public_to_x25519, IdentityKeyPair, KEY_LEN};

const X3DH_INFO: &[u8] = b"OMEMO X3DH";

/// What the initiator obtains from the agreement.
pub struct InitiatorKeys {
    /// The shared session secret.
    pub shared_key: [u8; KEY_LEN],
    /// The public half of the ephemeral key, sent to the responder.
    pub ephemeral_key: [u8; KEY_LEN],
    /// The id of the consumed one-time pre-key, if one was used.
    pub used_pre_key: Option<u32>,
}

fn kdf(ikm: &[u8]) -> [u8; KEY_LEN] {
    let salt = [0u8; KEY_LEN];
    let hkdf = Hkdf::<Sha256>::new(Some(&salt), ikm);
    let mut shared_key = [0u8; KEY_LEN];
    hkdf.expand(X3DH_INFO, &mut shared_key)
        .expect("32 bytes is a valid HKDF output length");
    shared_key
}

/// Runs the initiator side against a fetched bundle.
///
/// The bundle's signed pre-key signature is verified first; the first
/// published one-time pre-key, if any, is consumed.
pub fn initiate(identity: &IdentityKeyPair, bundle: &Bundle) -> Result<InitiatorKeys, Error> {
    bundle.verify()?;

    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let their_identity = PublicKey::from(ed_public_to_x25519(&bundle.identity_key)?);
    let their_spk = PublicKey::from(bundle.signed_pre_key);

    let dh1 = identity.to_x25519().diffie_hellman(&their_spk);
    let dh2 = ephemeral.diffie_hellman(&their_identity);
    let dh3 = ephemeral.diffie_hellman(&their_spk);

    let mut ikm = Zeroizing::new(Vec::with_capacity(KEY_LEN * 6));
    ikm.extend_from_slice(&[0xFF; KEY_LEN]);
    ikm.extend_from_slice(dh1.as_bytes());
    ikm.extend_from_slice(dh2.as_bytes());
    ikm.extend_from_slice(dh3.as_bytes());

    let used_pre_key = match bundle.pre_keys.first() {
        Some(pre_key) => {
            let dh4 = ephemeral.diffie_hellman(&PublicKey::from(pre_key.public));
            ikm.extend_from_slice(dh4.as_bytes());
            Some(pre_key.id)
        }
        None => None,
    };

    Ok(InitiatorKeys {
        shared_key: kdf(&ikm),
        ephemeral_key: ephemeral_public.to_bytes(),
        used_pre_key,
    })
}

/// Runs the responder side from the initiator's public material and our
/// stored private pre-keys.
pub fn respond(
    identity: &IdentityKeyPair,
    their_identity_key: &[u8; KEY_LEN],
    their_ephemeral_key: &[u8; KEY_LEN],
    signed_pre_key: &StaticSecret,
    one_time_pre_key: Option<&StaticSecret>,
) -> Result<[u8; KEY_LEN], Error> {
    let their_identity = PublicKey::from(ed_public_to_x25519(their_identity_key)?);
    let their_ephemeral = PublicKey::from(*their_ephemeral_key);

    let dh1 = signed_pre_key.diffie_hellman(&their_identity);
    let dh2 = identity.to_x25519().diffie_hellman(&their_ephemeral);
    let dh3 = signed_pre_key.diffie_hellman(&their_ephemeral);

    let mut ikm = Zeroizing::new(Vec::with_capacity(KEY_LEN * 6));
    ikm.extend_from_slice(&[0xFF; KEY_LEN]);
    ikm.extend_from_slice(dh1.as_bytes());
    ikm.extend_from_slice(dh2.as_bytes());
    ikm.extend_from_slice(dh3.as_bytes());

    if let Some(pre_key) = one_time_pre_key {
        let dh4 = pre_key.diffie_hellman(&their_ephemeral);
        ikm.extend_from_slice(dh4.as_bytes());
    }

    Ok(kdf(&ikm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::PreKey;

    fn bundle_with_pre_keys(
        identity: &IdentityKeyPair,
        count: usize,
    ) -> (Bundle, StaticSecret, Vec<StaticSecret>) {
        let spk = StaticSecret::random_from_rng(OsRng);
        let spk_public = PublicKey::from(&spk).to_bytes();
        let pre_key_secrets: Vec<StaticSecret> = (0..count)
            .map(|_| StaticSecret::random_from_rng(OsRng))
            .collect();
        let pre_keys = pre_key_secrets
            .iter()
            .enumerate()
            .map(|(i, secret)| PreKey {
                id: i as u32 + 1,
                public: PublicKey::from(secret).to_bytes(),
            })
            .collect();
        let bundle = Bundle {
            identity_key: identity.public(),
            signed_pre_key_id: 1,
            signed_pre_key: spk_public,
            signed_pre_key_signature: identity.sign(&spk_public),
            pre_keys,
        };
        (bundle, spk, pre_key_secrets)
    }

    #[test]
    fn both_sides_derive_the_same_secret() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let (bundle, spk, pre_keys) = bundle_with_pre_keys(&bob, 3);

        let initiator = initiate(&alice, &bundle).unwrap();
        assert_eq!(initiator.used_pre_key, Some(1));

        let responder = respond(
            &bob,
            &alice.public(),
            &initiator.ephemeral_key,
            &spk,
            Some(&pre_keys[0]),
        )
        .unwrap();
        assert_eq!(initiator.shared_key, responder);
    }

    #[test]
    fn agreement_without_one_time_pre_key() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let (bundle, spk, _) = bundle_with_pre_keys(&bob, 0);

        let initiator = initiate(&alice, &bundle).unwrap();
        assert_eq!(initiator.used_pre_key, None);

        let responder =
            respond(&bob, &alice.public(), &initiator.ephemeral_key, &spk, None).unwrap();
        assert_eq!(initiator.shared_key, responder);
    }

    #[test]
    fn tampered_bundle_signature_aborts() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let (mut bundle, _spk, _) = bundle_with_pre_keys(&bob, 1);
        bundle.signed_pre_key_signature[0] ^= 0x01;
        assert!(matches!(
            initiate(&alice, &bundle),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_pre_key_yields_a_different_secret() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let (bundle, spk, pre_keys) = bundle_with_pre_keys(&bob, 2);

        let initiator = initiate(&alice, &bundle).unwrap();
        let responder = respond(
            &bob,
            &alice.public(),
            &initiator.ephemeral_key,
            &spk,
            Some(&pre_keys[1]),
        )
        .unwrap();
        assert_ne!(initiator.shared_key, responder);
    }
}
