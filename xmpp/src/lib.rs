// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XMPP session runtime with asynchronous I/O using Tokio.
//!
//! The pieces compose bottom-up: a [`codec::XmppCodec`] frames the byte
//! transport into packets, an [`stream::XmppStream`] speaks the stream
//! protocol over it, the [`negotiator`] drives stream features (STARTTLS,
//! SASL, resource binding) to their terminal state, and the resulting
//! [`session::Session`] routes stanzas through a [`mux::Mux`] to handlers
//! and [`plugin`]s.

#![deny(unsafe_code, bare_trait_objects)]

mod codec;
pub use crate::codec::{Packet, XmppCodec};

mod error;
pub use crate::error::{AuthError, Error, ProtocolError};

pub mod auth;
pub mod component;
pub mod mux;
pub mod negotiator;
pub mod plugin;
pub mod session;
pub mod store;
#[cfg(feature = "tls-rust")]
pub mod starttls;
pub mod stream;
pub mod transport;

// Re-exports
pub use minidom::Element;
pub use quill_jid::{BareJid, FullJid, Jid};
pub use quill_stanzas as stanzas;
