// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The envelope layer: one payload encryption fanned out to many devices.
//!
//! A message is encrypted once under a random key; that key (with the
//! payload's authentication tag) is then ratchet-wrapped for every recipient
//! device. One mutex guards the caches and all store interaction, so the
//! persisted session state always reflects the operation that just
//! completed.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Mutex;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::address::Address;
use crate::aead;
use crate::bundle::{Bundle, PreKey};
use crate::error::Error;
use crate::keys::{IdentityKeyPair, KEY_LEN};
use crate::ratchet::RatchetState;
use crate::session::{PendingPreKey, Session};
use crate::store::Store;
use crate::x3dh;

// messageKey || payload tag, the plaintext each ratchet wraps.
const KEY_MATERIAL_LEN: usize = KEY_LEN + aead::TAG_LEN;

const SIGNED_PRE_KEY_ID: u32 = 1;

/// One wrapped key in an [`EncryptedMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    /// The recipient device this key is wrapped for.
    pub device_id: u32,
    /// `ratchet header || nonce || ciphertext`.
    pub data: Vec<u8>,
    /// Whether the wrapping session is still unanswered, so the recipient
    /// needs the pre-key exchange data to establish it.
    pub is_pre_key: bool,
}

/// The wire envelope of one encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    /// The sender's device id.
    pub sender_device_id: u32,
    /// One wrapped key per recipient device.
    pub keys: Vec<EncryptedKey>,
    /// The payload nonce.
    pub iv: [u8; aead::NONCE_LEN],
    /// The payload ciphertext, tag stripped.
    pub payload: Vec<u8>,
}

/// The out-of-band material a responder needs to establish the session from
/// the first message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKeyExchange {
    /// The initiator's Ed25519 identity key.
    pub identity_key: [u8; KEY_LEN],
    /// The initiator's X3DH ephemeral public key.
    pub ephemeral_key: [u8; KEY_LEN],
    /// The consumed one-time pre-key id, if one was used.
    pub pre_key_id: Option<u32>,
    /// The signed pre-key the session was built against.
    pub signed_pre_key_id: u32,
}

struct ManagerState {
    sessions: HashMap<Address, Session>,
    bundles: HashMap<Address, Bundle>,
}

/// One device's encryption engine.
pub struct Manager {
    store: Arc<dyn Store>,
    device_id: u32,
    identity: IdentityKeyPair,
    state: Mutex<ManagerState>,
}

impl Manager {
    /// Opens (or first-initializes) the engine for this device.
    ///
    /// The identity key pair and device id are loaded from the store when
    /// present; otherwise the given device id is claimed and a fresh
    /// identity is generated and persisted.
    pub async fn new(store: Arc<dyn Store>, device_id: u32) -> Result<Manager, Error> {
        let identity = match store.identity_seed().await? {
            Some(seed) => IdentityKeyPair::from_seed(seed),
            None => {
                let identity = IdentityKeyPair::generate();
                store.set_identity_seed(identity.seed()).await?;
                identity
            }
        };
        let device_id = match store.local_device_id().await? {
            Some(stored) => stored,
            None => {
                store.set_local_device_id(device_id).await?;
                device_id
            }
        };
        Ok(Manager {
            store,
            device_id,
            identity,
            state: Mutex::new(ManagerState {
                sessions: HashMap::new(),
                bundles: HashMap::new(),
            }),
        })
    }

    /// This device's id.
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// This device's public Ed25519 identity key.
    pub fn identity_key(&self) -> [u8; KEY_LEN] {
        self.identity.public()
    }

    /// Generates, persists and returns this device's publishable bundle.
    pub async fn generate_bundle(&self, pre_key_count: u32) -> Result<Bundle, Error> {
        let spk = StaticSecret::random_from_rng(OsRng);
        let spk_public = PublicKey::from(&spk).to_bytes();
        self.store
            .save_signed_pre_key(SIGNED_PRE_KEY_ID, spk.to_bytes())
            .await?;

        let mut pre_keys = Vec::with_capacity(pre_key_count as usize);
        for id in 1..=pre_key_count {
            let secret = StaticSecret::random_from_rng(OsRng);
            self.store.save_pre_key(id, secret.to_bytes()).await?;
            pre_keys.push(PreKey {
                id,
                public: PublicKey::from(&secret).to_bytes(),
            });
        }

        Ok(Bundle {
            identity_key: self.identity.public(),
            signed_pre_key_id: SIGNED_PRE_KEY_ID,
            signed_pre_key: spk_public,
            signed_pre_key_signature: self.identity.sign(&spk_public),
            pre_keys,
        })
    }

    /// Caches a fetched bundle for later session establishment. The cache is
    /// read-only; pre-key consumption happens against the owner's store.
    pub async fn cache_bundle(&self, address: Address, bundle: Bundle) {
        self.state.lock().await.bundles.insert(address, bundle);
    }

    /// Trust-on-first-use: an unknown identity is recorded and trusted, a
    /// recorded one is compared.
    pub async fn is_trusted(
        &self,
        address: &Address,
        identity: &[u8; KEY_LEN],
    ) -> Result<bool, Error> {
        match self.store.identity(address).await? {
            Some(known) => Ok(&known == identity),
            None => {
                self.store.save_identity(address, *identity).await?;
                Ok(true)
            }
        }
    }

    /// The pre-key exchange material a recipient needs while our session
    /// with it is unanswered.
    pub async fn pre_key_exchange(&self, address: &Address) -> Option<PreKeyExchange> {
        let state = self.state.lock().await;
        let pending = state.sessions.get(address)?.pending_pre_key?;
        Some(PreKeyExchange {
            identity_key: self.identity.public(),
            ephemeral_key: pending.ephemeral_key,
            pre_key_id: pending.pre_key_id,
            signed_pre_key_id: pending.signed_pre_key_id,
        })
    }

    /// Encrypts a payload to every recipient device.
    pub async fn encrypt(
        &self,
        recipients: &[Address],
        plaintext: &[u8],
    ) -> Result<EncryptedMessage, Error> {
        let mut state = self.state.lock().await;

        let mut message_key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut message_key);
        let (iv, mut sealed) = aead::encrypt(&message_key, plaintext);
        let tag = sealed.split_off(sealed.len() - aead::TAG_LEN);
        let payload = sealed;

        let mut key_material = [0u8; KEY_MATERIAL_LEN];
        key_material[..KEY_LEN].copy_from_slice(&message_key);
        key_material[KEY_LEN..].copy_from_slice(&tag);

        let mut keys = Vec::with_capacity(recipients.len());
        for address in recipients {
            let mut session = self.obtain_session(&mut state, address).await?;
            let data = session.ratchet.encrypt(&key_material)?;
            let is_pre_key = session.pending_pre_key.is_some();
            self.store
                .save_session(address, session.serialize())
                .await?;
            keys.push(EncryptedKey {
                device_id: address.device_id,
                data,
                is_pre_key,
            });
            state.sessions.insert(address.clone(), session);
        }

        Ok(EncryptedMessage {
            sender_device_id: self.device_id,
            keys,
            iv,
            payload,
        })
    }

    /// Decrypts a message over an established session.
    pub async fn decrypt(
        &self,
        sender: &Address,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, Error> {
        self.decrypt_inner(sender, None, message).await
    }

    /// Decrypts the first message of a session, establishing our responder
    /// side from the supplied exchange material. The consumed one-time
    /// pre-key is removed from the store.
    pub async fn decrypt_pre_key_message(
        &self,
        sender: &Address,
        exchange: &PreKeyExchange,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, Error> {
        self.decrypt_inner(sender, Some(exchange), message).await
    }

    async fn decrypt_inner(
        &self,
        sender: &Address,
        exchange: Option<&PreKeyExchange>,
        message: &EncryptedMessage,
    ) -> Result<Vec<u8>, Error> {
        let mut state = self.state.lock().await;

        let our_key = message
            .keys
            .iter()
            .find(|key| key.device_id == self.device_id)
            .ok_or(Error::InvalidMessage)?;

        // The session is looked up in the cache, then the store; a pre-key
        // message can establish it from scratch.
        let mut session = match state.sessions.get(sender) {
            Some(session) => session.clone(),
            None => match self.store.session(sender).await? {
                Some(blob) => Session::deserialize(&blob)?,
                None => match exchange {
                    Some(exchange) => self.establish_responder(sender, exchange).await?,
                    None => return Err(Error::NoSession(sender.to_string())),
                },
            },
        };

        let key_material = session.ratchet.decrypt(&our_key.data)?;
        if key_material.len() != KEY_MATERIAL_LEN {
            return Err(Error::InvalidMessage);
        }
        let mut message_key = [0u8; KEY_LEN];
        message_key.copy_from_slice(&key_material[..KEY_LEN]);

        let mut sealed = Vec::with_capacity(message.payload.len() + aead::TAG_LEN);
        sealed.extend_from_slice(&message.payload);
        sealed.extend_from_slice(&key_material[KEY_LEN..]);
        let plaintext = aead::decrypt(&message_key, &message.iv, &sealed)?;

        // The answered session stops carrying pre-key material; only now is
        // the advanced state committed.
        session.pending_pre_key = None;
        self.store.save_session(sender, session.serialize()).await?;
        state.sessions.insert(sender.clone(), session);

        Ok(plaintext)
    }

    // Builds our (initiator) session with an address from its cached bundle.
    async fn obtain_session(
        &self,
        state: &mut ManagerState,
        address: &Address,
    ) -> Result<Session, Error> {
        if let Some(session) = state.sessions.get(address) {
            return Ok(session.clone());
        }
        if let Some(blob) = self.store.session(address).await? {
            return Session::deserialize(&blob);
        }
        let bundle = state
            .bundles
            .get(address)
            .ok_or_else(|| Error::NoSession(address.to_string()))?
            .clone();
        if !self.is_trusted(address, &bundle.identity_key).await? {
            return Err(Error::UntrustedIdentity(address.to_string()));
        }
        let keys = x3dh::initiate(&self.identity, &bundle)?;
        Ok(Session {
            remote_identity: bundle.identity_key,
            pending_pre_key: Some(PendingPreKey {
                pre_key_id: keys.used_pre_key,
                signed_pre_key_id: bundle.signed_pre_key_id,
                ephemeral_key: keys.ephemeral_key,
            }),
            ratchet: RatchetState::initiator(keys.shared_key, bundle.signed_pre_key),
        })
    }

    // Builds our (responder) session from the initiator's exchange material
    // and our stored pre-keys. The consumed one-time pre-key is removed for
    // forward secrecy.
    async fn establish_responder(
        &self,
        sender: &Address,
        exchange: &PreKeyExchange,
    ) -> Result<Session, Error> {
        if !self.is_trusted(sender, &exchange.identity_key).await? {
            return Err(Error::UntrustedIdentity(sender.to_string()));
        }
        let spk = StaticSecret::from(
            self.store.signed_pre_key(exchange.signed_pre_key_id).await?,
        );
        let one_time = match exchange.pre_key_id {
            Some(id) => Some(StaticSecret::from(self.store.pre_key(id).await?)),
            None => None,
        };
        let shared_key = x3dh::respond(
            &self.identity,
            &exchange.identity_key,
            &exchange.ephemeral_key,
            &spk,
            one_time.as_ref(),
        )?;
        if let Some(id) = exchange.pre_key_id {
            self.store.remove_pre_key(id).await?;
        }
        Ok(Session {
            remote_identity: exchange.identity_key,
            pending_pre_key: None,
            ratchet: RatchetState::responder(shared_key, spk),
        })
    }
}
