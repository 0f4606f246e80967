// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Component login (XEP-0114).
//!
//! Components are services/gateways logged into a server under a bare
//! domain JID. Authentication hashes the stream id with a shared secret
//! instead of running SASL.

use futures::{sink::SinkExt, stream::StreamExt};
use std::collections::HashMap;

use quill_jid::Jid;
use quill_stanzas::component::Handshake;
use quill_stanzas::{ns, Element};

use crate::codec::{Packet, XmppCodec};
use crate::error::{AuthError, Error, ProtocolError};
use crate::transport::BoxTransport;

use tokio_util::codec::Framed;

/// A logged-in component stream.
pub struct Component {
    /// The component's Jabber-Id.
    pub jid: Jid,
    stream: Framed<BoxTransport, XmppCodec>,
}

impl Component {
    /// Logs into a server over an open transport using the shared secret.
    pub async fn login(
        transport: BoxTransport,
        jid: Jid,
        password: &str,
    ) -> Result<Component, Error> {
        let mut stream = Framed::new(transport, XmppCodec::new());
        let attrs: HashMap<String, String> = [
            ("to".to_owned(), jid.domain().to_string()),
            ("xmlns".to_owned(), ns::COMPONENT_ACCEPT.to_owned()),
            ("xmlns:stream".to_owned(), ns::STREAM.to_owned()),
        ]
        .iter()
        .cloned()
        .collect();
        stream.send(Packet::StreamStart(attrs)).await?;

        let stream_id = loop {
            match stream.next().await {
                Some(Ok(Packet::StreamStart(attrs))) => {
                    break attrs
                        .get("id")
                        .ok_or(ProtocolError::NoStreamId)?
                        .clone();
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Disconnected),
            }
        };

        let handshake = Handshake::from_password_and_stream_id(password, &stream_id);
        stream
            .send(Packet::Stanza(Element::from(handshake)))
            .await?;

        loop {
            match stream.next().await {
                Some(Ok(Packet::Stanza(stanza))) => {
                    if stanza.is("handshake", ns::COMPONENT_ACCEPT) {
                        return Ok(Component { jid, stream });
                    } else if stanza.name() == "error" {
                        return Err(Error::Auth(AuthError::ComponentFail));
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Disconnected),
            }
        }
    }

    /// Sends a stanza.
    pub async fn send_stanza(&mut self, stanza: Element) -> Result<(), Error> {
        self.stream
            .send(Packet::Stanza(crate::stream::add_stanza_id(
                stanza,
                ns::COMPONENT_ACCEPT,
            )))
            .await
    }

    /// Receives the next stanza; `None` when the stream ended.
    pub async fn next_stanza(&mut self) -> Option<Result<Element, Error>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Packet::Stanza(stanza))) => return Some(Ok(stanza)),
                Some(Ok(Packet::Text(_))) => {}
                Some(Ok(_)) => return None,
                Some(Err(e)) => return Some(Err(e)),
                None => return None,
            }
        }
    }
}
