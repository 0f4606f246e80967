// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! `XmppStream` speaks the stream protocol over a framed transport: header
//! exchange, feature reception, and packet-level send/receive.

use futures::{sink::SinkExt, stream::StreamExt};
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use tokio_util::codec::Framed;

use quill_jid::Jid;
use quill_stanzas::stream_features::StreamFeatures;
use quill_stanzas::{ns, Element};

use crate::codec::{Packet, XmppCodec};
use crate::error::{Error, ProtocolError};
use crate::transport::BoxTransport;

/// Generates a random id suitable for stanzas and stream headers.
pub fn make_id() -> String {
    let id: u64 = thread_rng().gen();
    format!("{}", id)
}

/// Gives a stanza an id if it carries none.
pub fn add_stanza_id(mut stanza: Element, default_ns: &str) -> Element {
    if stanza.is("iq", default_ns)
        || stanza.is("message", default_ns)
        || stanza.is("presence", default_ns)
    {
        if stanza.attr("id").is_none() {
            stanza.set_attr("id", make_id());
        }
    }

    stanza
}

/// An opened XMPP stream: the framed transport plus what the header exchange
/// established.
pub struct XmppStream {
    /// The local Jabber-Id
    pub jid: Jid,
    /// Codec instance
    pub stream: Framed<BoxTransport, XmppCodec>,
    /// `<stream:features/>` for XMPP version 1.0
    pub stream_features: StreamFeatures,
    /// Root namespace
    ///
    /// This is different for either c2s, s2s, or component connections.
    pub ns: String,
    /// Stream `id` attribute
    pub id: String,
}

impl XmppStream {
    /// Sends a `<stream:stream>` start tag to the peer and reads its stream
    /// header and features back.
    ///
    /// Used for the initial open and for every reopen after a feature
    /// (STARTTLS, SASL) reset the stream state.
    pub async fn start(stream: BoxTransport, jid: Jid, ns: String) -> Result<Self, Error> {
        let framed = Framed::new(stream, XmppCodec::new());
        XmppStream::start_framed(framed, jid, ns).await
    }

    async fn start_framed(
        mut stream: Framed<BoxTransport, XmppCodec>,
        jid: Jid,
        ns: String,
    ) -> Result<Self, Error> {
        let attrs = [
            ("to".to_owned(), jid.domain().to_string()),
            ("version".to_owned(), "1.0".to_owned()),
            ("xmlns".to_owned(), ns.clone()),
            ("xmlns:stream".to_owned(), ns::STREAM.to_owned()),
        ]
        .iter()
        .cloned()
        .collect();
        stream.send(Packet::StreamStart(attrs)).await?;

        let stream_attrs;
        loop {
            match stream.next().await {
                Some(Ok(Packet::StreamStart(attrs))) => {
                    stream_attrs = attrs;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Disconnected),
            }
        }

        let stream_ns = stream_attrs
            .get("xmlns")
            .ok_or(ProtocolError::NoStreamNamespace)?
            .clone();
        let stream_id = stream_attrs
            .get("id")
            .ok_or(ProtocolError::NoStreamId)?
            .clone();
        if stream_ns == ns::JABBER_CLIENT && stream_attrs.contains_key("version") {
            loop {
                match stream.next().await {
                    Some(Ok(Packet::Stanza(stanza))) => {
                        let stream_features = StreamFeatures::try_from(stanza)?;
                        return Ok(XmppStream {
                            jid,
                            stream,
                            stream_features,
                            ns,
                            id: stream_id,
                        });
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                    None => return Err(Error::Disconnected),
                }
            }
        }
        // Pre-1.0 or component streams have no features element.
        Ok(XmppStream {
            jid,
            stream,
            stream_features: StreamFeatures::default(),
            ns,
            id: stream_id,
        })
    }

    /// Sends a stanza or nonza.
    pub async fn send_stanza<S: Into<Element>>(&mut self, stanza: S) -> Result<(), Error> {
        self.stream.send(Packet::Stanza(stanza.into())).await
    }

    /// Receives the next element, skipping whitespace keep-alives.
    ///
    /// Stream restarts and ends surface as errors here; during negotiation
    /// the peer must not restart the stream without being asked to.
    pub async fn next_stanza(&mut self) -> Result<Element, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Packet::Stanza(stanza))) => return Ok(stanza),
                Some(Ok(Packet::Text(_))) | Some(Ok(Packet::Raw(_))) => {}
                Some(Ok(Packet::StreamStart(_))) => {
                    return Err(ProtocolError::InvalidStreamStart.into());
                }
                Some(Ok(Packet::StreamEnd)) => return Err(Error::Disconnected),
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Disconnected),
            }
        }
    }

    /// Hands the underlying transport back, dropping codec state.
    pub fn into_inner(self) -> BoxTransport {
        self.stream.into_parts().io
    }
}
