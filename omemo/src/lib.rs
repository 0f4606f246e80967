// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! OMEMO end-to-end encryption core.
//!
//! This crate implements the cryptographic heart of OMEMO: X3DH key
//! agreement over published bundles, Double Ratchet sessions, AES-256-GCM
//! payload encryption and the multi-recipient envelope that wraps one
//! message key per device. It is wire-format agnostic: the XMPP layer maps
//! [`manager::EncryptedMessage`] to and from its XML carrier.
//!
//! Entry point is [`manager::Manager`], one per device, backed by a
//! [`store::Store`] implementation.

#![deny(unsafe_code, bare_trait_objects)]

pub mod address;
pub mod aead;
pub mod bundle;
mod error;
pub mod keys;
pub mod manager;
pub mod ratchet;
pub mod session;
pub mod store;
pub mod x3dh;

pub use crate::address::Address;
pub use crate::bundle::{Bundle, PreKey};
pub use crate::error::{Error, StoreError};
pub use crate::keys::IdentityKeyPair;
pub use crate::manager::{EncryptedKey, EncryptedMessage, Manager, PreKeyExchange};
pub use crate::session::Session;
pub use crate::store::{MemoryStore, Store};
