// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A crate parsing common XMPP elements into Rust structures.
//!
//! Each stanza or nonza type implements `TryFrom<Element>` and
//! `Into<Element>`, so they can be used straight with the stream codec.
//!
//! Every XML namespace used by these types lives in the [`ns`] module; it is
//! the one registry namespace strings come from.

#![deny(unsafe_code, bare_trait_objects)]

pub use minidom::Element;
pub use quill_jid::{BareJid, Error as JidParseError, FullJid, Jid};

#[macro_use]
mod util;
pub use crate::util::error::Error;

/// The XML namespace registry.
pub mod ns;

pub mod bind;
pub mod component;
pub mod iq;
pub mod message;
pub mod presence;
pub mod sasl;
pub mod stanza_error;
pub mod starttls;
pub mod stream_error;
pub mod stream_features;
