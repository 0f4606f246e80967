// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The persistence contract the runtime consumes.
//!
//! Backends implement the per-domain sub-store traits; the composite
//! [`Storage`] carries an optional handle per domain. An absent sub-store
//! means the deployment does not support that domain, and callers degrade
//! (roster pushes become no-ops, archives report nothing, and so on) rather
//! than fail.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use quill_jid::BareJid;
use quill_stanzas::Element;

/// Uniform sentinel errors every sub-store operation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record does not exist.
    NotFound,
    /// A record with this key already exists.
    AlreadyExists,
    /// The caller's credentials do not authorize the operation.
    AuthFailed,
    /// The backend failed.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(fmt, "not found"),
            StoreError::AlreadyExists => write!(fmt, "already exists"),
            StoreError::AuthFailed => write!(fmt, "authentication failed"),
            StoreError::Backend(e) => write!(fmt, "backend error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// One account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// The account's local part.
    pub username: String,
    /// SCRAM-derived verification material, per hash function name.
    pub scram: Vec<ScramCredential>,
}

/// Stored SCRAM verification material for one hash function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScramCredential {
    /// The hash function name ("SHA-1", "SHA-256", "SHA-512").
    pub method: String,
    /// The PBKDF2 salt.
    pub salt: Vec<u8>,
    /// The PBKDF2 iteration count.
    pub iterations: u32,
    /// The derived digest.
    pub digest: Vec<u8>,
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetches an account.
    async fn user(&self, username: &str) -> Result<UserRecord, StoreError>;
    /// Creates an account; fails with `AlreadyExists` on a name collision.
    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError>;
    /// Deletes an account.
    async fn delete_user(&self, username: &str) -> Result<(), StoreError>;
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterItem {
    /// The contact.
    pub jid: BareJid,
    /// The display name, if set.
    pub name: Option<String>,
    /// The presence subscription state ("none", "to", "from", "both").
    pub subscription: String,
    /// Group names this contact is filed under.
    pub groups: Vec<String>,
}

/// Roster storage with a version cursor for roster versioning.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// All items of a user's roster, with the current roster version.
    async fn items(&self, user: &BareJid) -> Result<(Vec<RosterItem>, String), StoreError>;
    /// Creates or updates an item; returns the new roster version.
    async fn set_item(&self, user: &BareJid, item: RosterItem) -> Result<String, StoreError>;
    /// Removes an item; returns the new roster version.
    async fn remove_item(&self, user: &BareJid, jid: &BareJid) -> Result<String, StoreError>;
}

/// Blocking-list storage (XEP-0191).
#[async_trait]
pub trait BlockingStore: Send + Sync {
    /// The set of blocked JIDs.
    async fn blocklist(&self, user: &BareJid) -> Result<Vec<BareJid>, StoreError>;
    /// Adds a JID to the blocklist.
    async fn block(&self, user: &BareJid, jid: &BareJid) -> Result<(), StoreError>;
    /// Removes a JID from the blocklist.
    async fn unblock(&self, user: &BareJid, jid: &BareJid) -> Result<(), StoreError>;
}

/// vCard blob storage.
#[async_trait]
pub trait VcardStore: Send + Sync {
    /// The stored vCard element.
    async fn vcard(&self, user: &BareJid) -> Result<Element, StoreError>;
    /// Replaces the stored vCard element.
    async fn set_vcard(&self, user: &BareJid, vcard: Element) -> Result<(), StoreError>;
}

/// Offline message queue storage.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Appends a message to the user's offline queue.
    async fn enqueue(&self, user: &BareJid, message: Element) -> Result<(), StoreError>;
    /// Drains and returns the user's offline queue in arrival order.
    async fn drain(&self, user: &BareJid) -> Result<Vec<Element>, StoreError>;
}

/// A query against the message archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveQuery {
    /// Restrict to messages exchanged with this JID.
    pub with: Option<BareJid>,
    /// Restrict to messages at or after this timestamp (RFC 3339).
    pub start: Option<String>,
    /// Restrict to messages before this timestamp (RFC 3339).
    pub end: Option<String>,
    /// Resume after this archive id.
    pub after: Option<String>,
    /// Page size cap.
    pub max: Option<usize>,
}

/// One archived message.
#[derive(Debug, Clone)]
pub struct ArchivedMessage {
    /// The archive id, usable as a cursor.
    pub id: String,
    /// The archiving timestamp (RFC 3339).
    pub timestamp: String,
    /// The stored stanza.
    pub message: Element,
}

/// One page of archive results.
#[derive(Debug, Clone, Default)]
pub struct ArchivePage {
    /// The matching messages, oldest first.
    pub messages: Vec<ArchivedMessage>,
    /// Whether more results exist past this page.
    pub complete: bool,
}

/// Message archive storage (XEP-0313 semantics).
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Appends a message to a user's archive, returning its archive id.
    async fn append(&self, user: &BareJid, message: Element) -> Result<String, StoreError>;
    /// Runs a cursor query against a user's archive.
    async fn query(&self, user: &BareJid, query: ArchiveQuery) -> Result<ArchivePage, StoreError>;
}

/// One chat room and its affiliations.
#[derive(Debug, Clone, Default)]
pub struct RoomRecord {
    /// The room's configuration form, if configured.
    pub config: Option<Element>,
    /// `(jid, affiliation)` pairs.
    pub affiliations: Vec<(BareJid, String)>,
}

/// Multi-user chat storage.
#[async_trait]
pub trait MucStore: Send + Sync {
    /// Fetches a room.
    async fn room(&self, room: &BareJid) -> Result<RoomRecord, StoreError>;
    /// Creates or updates a room.
    async fn set_room(&self, room: &BareJid, record: RoomRecord) -> Result<(), StoreError>;
}

/// Pubsub node and item storage.
#[async_trait]
pub trait PubSubStore: Send + Sync {
    /// All item ids of a node, newest first.
    async fn items(&self, node: &str) -> Result<Vec<(String, Element)>, StoreError>;
    /// Publishes an item to a node.
    async fn publish(&self, node: &str, id: &str, payload: Element) -> Result<(), StoreError>;
    /// The subscribers of a node.
    async fn subscriptions(&self, node: &str) -> Result<Vec<BareJid>, StoreError>;
    /// Adds a subscriber to a node.
    async fn subscribe(&self, node: &str, jid: &BareJid) -> Result<(), StoreError>;
}

/// Bookmark storage (XEP-0402 payloads are kept opaque).
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// The stored bookmarks element.
    async fn bookmarks(&self, user: &BareJid) -> Result<Element, StoreError>;
    /// Replaces the stored bookmarks element.
    async fn set_bookmarks(&self, user: &BareJid, bookmarks: Element) -> Result<(), StoreError>;
}

bitflags::bitflags! {
    /// Which storage domains a [`Storage`] composite supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StorageCapabilities: u16 {
        /// Accounts.
        const USERS = 1;
        /// Rosters.
        const ROSTER = 1 << 1;
        /// Blocklists.
        const BLOCKING = 1 << 2;
        /// vCards.
        const VCARD = 1 << 3;
        /// Offline queues.
        const OFFLINE = 1 << 4;
        /// Message archives.
        const ARCHIVE = 1 << 5;
        /// Chat rooms.
        const MUC = 1 << 6;
        /// Pubsub nodes.
        const PUBSUB = 1 << 7;
        /// Bookmarks.
        const BOOKMARKS = 1 << 8;
    }
}

/// The composite store: one optional handle per domain.
#[derive(Clone, Default)]
pub struct Storage {
    /// Accounts.
    pub users: Option<Arc<dyn UserStore>>,
    /// Rosters.
    pub roster: Option<Arc<dyn RosterStore>>,
    /// Blocklists.
    pub blocking: Option<Arc<dyn BlockingStore>>,
    /// vCards.
    pub vcard: Option<Arc<dyn VcardStore>>,
    /// Offline queues.
    pub offline: Option<Arc<dyn OfflineStore>>,
    /// Message archives.
    pub archive: Option<Arc<dyn ArchiveStore>>,
    /// Chat rooms.
    pub muc: Option<Arc<dyn MucStore>>,
    /// Pubsub nodes.
    pub pubsub: Option<Arc<dyn PubSubStore>>,
    /// Bookmarks.
    pub bookmarks: Option<Arc<dyn BookmarkStore>>,
}

impl Storage {
    /// Which domains this composite supports; callers branch on presence
    /// instead of unwrapping handles.
    pub fn capabilities(&self) -> StorageCapabilities {
        let mut caps = StorageCapabilities::empty();
        if self.users.is_some() {
            caps |= StorageCapabilities::USERS;
        }
        if self.roster.is_some() {
            caps |= StorageCapabilities::ROSTER;
        }
        if self.blocking.is_some() {
            caps |= StorageCapabilities::BLOCKING;
        }
        if self.vcard.is_some() {
            caps |= StorageCapabilities::VCARD;
        }
        if self.offline.is_some() {
            caps |= StorageCapabilities::OFFLINE;
        }
        if self.archive.is_some() {
            caps |= StorageCapabilities::ARCHIVE;
        }
        if self.muc.is_some() {
            caps |= StorageCapabilities::MUC;
        }
        if self.pubsub.is_some() {
            caps |= StorageCapabilities::PUBSUB;
        }
        if self.bookmarks.is_some() {
            caps |= StorageCapabilities::BOOKMARKS;
        }
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_storage_supports_nothing() {
        let storage = Storage::default();
        assert_eq!(storage.capabilities(), StorageCapabilities::empty());
        assert!(storage.roster.is_none());
    }

    struct NoRoster;

    #[async_trait]
    impl RosterStore for NoRoster {
        async fn items(&self, _user: &BareJid) -> Result<(Vec<RosterItem>, String), StoreError> {
            Ok((Vec::new(), String::new()))
        }
        async fn set_item(
            &self,
            _user: &BareJid,
            _item: RosterItem,
        ) -> Result<String, StoreError> {
            Ok(String::new())
        }
        async fn remove_item(
            &self,
            _user: &BareJid,
            _jid: &BareJid,
        ) -> Result<String, StoreError> {
            Err(StoreError::NotFound)
        }
    }

    #[test]
    fn capabilities_reflect_present_substores() {
        let storage = Storage {
            roster: Some(Arc::new(NoRoster)),
            ..Storage::default()
        };
        let caps = storage.capabilities();
        assert!(caps.contains(StorageCapabilities::ROSTER));
        assert!(!caps.contains(StorageCapabilities::ARCHIVE));
    }
}
