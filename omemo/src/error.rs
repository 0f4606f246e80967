// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Errors the encryption core can signal.
///
/// Cryptographic failures are terminal for the message concerned: the caller
/// must drop the message, never retry the operation with the same state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A signature did not verify against the signer's identity key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Key material had the wrong length.
    #[error("invalid key length")]
    InvalidKeyLength,

    /// The message is malformed, not addressed to this device, or failed
    /// authenticated decryption.
    #[error("invalid message")]
    InvalidMessage,

    /// The message was already decrypted once; its key has been consumed.
    #[error("duplicate message")]
    DuplicateMessage,

    /// Decrypting this message would require skipping more message keys than
    /// the ratchet retains.
    #[error("skipped message key limit exceeded")]
    SkippedKeyLimit,

    /// The sender's identity key does not match the one persisted for this
    /// address.
    #[error("untrusted identity for {0}")]
    UntrustedIdentity(String),

    /// No session exists for this address and no bundle is cached to create
    /// one.
    #[error("no session with {0}")]
    NoSession(String),

    /// A store operation failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Errors of the persistence contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The record does not exist.
    #[error("not found")]
    NotFound,

    /// A record with this key already exists.
    #[error("already exists")]
    AlreadyExists,

    /// The caller is not allowed to touch this record.
    #[error("authentication failed")]
    AuthFailed,

    /// The backend failed.
    #[error("backend error: {0}")]
    Backend(String),
}
