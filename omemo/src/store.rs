// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The persistence contract of the encryption core.
//!
//! The core consumes this trait; backends implement it. [`MemoryStore`] is
//! the reference in-memory backend, also used throughout the test suite.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::address::Address;
use crate::error::StoreError;
use crate::keys::KEY_LEN;

/// Everything one device persists: its own secrets, learned identities and
/// serialized sessions.
///
/// Trust is recorded on first use: `save_identity` stores an identity for an
/// unknown address; the caller decides what to do when `identity` returns a
/// key that differs from a newly observed one.
#[async_trait]
pub trait Store: Send + Sync {
    /// The seed of our Ed25519 identity key pair, if one was generated.
    async fn identity_seed(&self) -> Result<Option<[u8; KEY_LEN]>, StoreError>;

    /// Persists the seed of our identity key pair.
    async fn set_identity_seed(&self, seed: [u8; KEY_LEN]) -> Result<(), StoreError>;

    /// Our device id, if one was assigned.
    async fn local_device_id(&self) -> Result<Option<u32>, StoreError>;

    /// Persists our device id.
    async fn set_local_device_id(&self, device_id: u32) -> Result<(), StoreError>;

    /// The identity key recorded for a remote address.
    async fn identity(&self, address: &Address) -> Result<Option<[u8; KEY_LEN]>, StoreError>;

    /// Records the identity key of a remote address.
    async fn save_identity(
        &self,
        address: &Address,
        identity: [u8; KEY_LEN],
    ) -> Result<(), StoreError>;

    /// The private half of a one-time pre-key.
    async fn pre_key(&self, id: u32) -> Result<[u8; KEY_LEN], StoreError>;

    /// Persists the private half of a one-time pre-key.
    async fn save_pre_key(&self, id: u32, secret: [u8; KEY_LEN]) -> Result<(), StoreError>;

    /// Removes a consumed one-time pre-key.
    async fn remove_pre_key(&self, id: u32) -> Result<(), StoreError>;

    /// The private half of a signed pre-key.
    async fn signed_pre_key(&self, id: u32) -> Result<[u8; KEY_LEN], StoreError>;

    /// Persists the private half of a signed pre-key.
    async fn save_signed_pre_key(&self, id: u32, secret: [u8; KEY_LEN])
        -> Result<(), StoreError>;

    /// The serialized session with an address, if any.
    async fn session(&self, address: &Address) -> Result<Option<Vec<u8>>, StoreError>;

    /// Persists the serialized session with an address.
    async fn save_session(&self, address: &Address, blob: Vec<u8>) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    identity_seed: Option<[u8; KEY_LEN]>,
    device_id: Option<u32>,
    identities: HashMap<Address, [u8; KEY_LEN]>,
    pre_keys: HashMap<u32, [u8; KEY_LEN]>,
    signed_pre_keys: HashMap<u32, [u8; KEY_LEN]>,
    sessions: HashMap<Address, Vec<u8>>,
}

/// An in-memory store backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn identity_seed(&self) -> Result<Option<[u8; KEY_LEN]>, StoreError> {
        Ok(self.inner.lock().unwrap().identity_seed)
    }

    async fn set_identity_seed(&self, seed: [u8; KEY_LEN]) -> Result<(), StoreError> {
        self.inner.lock().unwrap().identity_seed = Some(seed);
        Ok(())
    }

    async fn local_device_id(&self) -> Result<Option<u32>, StoreError> {
        Ok(self.inner.lock().unwrap().device_id)
    }

    async fn set_local_device_id(&self, device_id: u32) -> Result<(), StoreError> {
        self.inner.lock().unwrap().device_id = Some(device_id);
        Ok(())
    }

    async fn identity(&self, address: &Address) -> Result<Option<[u8; KEY_LEN]>, StoreError> {
        Ok(self.inner.lock().unwrap().identities.get(address).copied())
    }

    async fn save_identity(
        &self,
        address: &Address,
        identity: [u8; KEY_LEN],
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .identities
            .insert(address.clone(), identity);
        Ok(())
    }

    async fn pre_key(&self, id: u32) -> Result<[u8; KEY_LEN], StoreError> {
        self.inner
            .lock()
            .unwrap()
            .pre_keys
            .get(&id)
            .copied()
            .ok_or(StoreError::NotFound)
    }

    async fn save_pre_key(&self, id: u32, secret: [u8; KEY_LEN]) -> Result<(), StoreError> {
        self.inner.lock().unwrap().pre_keys.insert(id, secret);
        Ok(())
    }

    async fn remove_pre_key(&self, id: u32) -> Result<(), StoreError> {
        self.inner.lock().unwrap().pre_keys.remove(&id);
        Ok(())
    }

    async fn signed_pre_key(&self, id: u32) -> Result<[u8; KEY_LEN], StoreError> {
        self.inner
            .lock()
            .unwrap()
            .signed_pre_keys
            .get(&id)
            .copied()
            .ok_or(StoreError::NotFound)
    }

    async fn save_signed_pre_key(
        &self,
        id: u32,
        secret: [u8; KEY_LEN],
    ) -> Result<(), StoreError> {
        self.inner.lock().unwrap().signed_pre_keys.insert(id, secret);
        Ok(())
    }

    async fn session(&self, address: &Address) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.lock().unwrap().sessions.get(address).cloned())
    }

    async fn save_session(&self, address: &Address, blob: Vec<u8>) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(address.clone(), blob);
        Ok(())
    }
}
