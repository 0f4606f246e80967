// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The component handshake element (XEP-0114).

use crate::ns;
use crate::util::error::Error;
use crate::Element;
use sha1::{Digest, Sha1};
use std::convert::TryFrom;

/// The main authentication mechanism for components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The hex-encoded SHA-1 of the concatenation of the stream id and the
    /// shared secret; empty in the server's acknowledgement.
    pub data: Option<String>,
}

impl Handshake {
    /// Creates a successful acknowledgement element.
    pub fn new() -> Handshake {
        Handshake { data: None }
    }

    /// Creates an authentication element out of the stream id and secret.
    pub fn from_password_and_stream_id(password: &str, stream_id: &str) -> Handshake {
        let digest = Sha1::digest(format!("{}{}", stream_id, password).as_bytes());
        let hash = digest
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<String>();
        Handshake { data: Some(hash) }
    }
}

impl Default for Handshake {
    fn default() -> Handshake {
        Handshake::new()
    }
}

impl TryFrom<Element> for Handshake {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Handshake, Error> {
        check_self!(elem, "handshake", COMPONENT_ACCEPT);
        check_no_children!(elem, "handshake");
        check_no_attributes!(elem, "handshake");
        let data = match elem.text() {
            data if data.is_empty() => None,
            data => Some(data),
        };
        Ok(Handshake { data })
    }
}

impl From<Handshake> for Element {
    fn from(handshake: Handshake) -> Element {
        Element::builder("handshake", ns::COMPONENT_ACCEPT)
            .append_all(handshake.data)
            .build()
    }
}
