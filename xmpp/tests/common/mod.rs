// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers shared by the integration tests: an in-memory peer that speaks
//! enough of the stream protocol to get a session established.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;

use futures::{SinkExt, StreamExt};
use tokio_util::codec::Framed;

use quill_jid::Jid;
use quill_stanzas::stream_features::StreamFeatures;
use quill_stanzas::{ns, Element};
use quill_xmpp::mux::Mux;
use quill_xmpp::session::{Session, SessionState};
use quill_xmpp::stream::XmppStream;
use quill_xmpp::transport::BoxTransport;
use quill_xmpp::{Packet, XmppCodec};

pub type Peer = Framed<BoxTransport, XmppCodec>;

/// Answers the client's stream header like a server would, with the given
/// features.
pub async fn accept_stream(peer: &mut Peer, features: StreamFeatures) {
    loop {
        match peer.next().await.expect("peer stream ended").unwrap() {
            Packet::StreamStart(_) => break,
            _ => {}
        }
    }
    let attrs: HashMap<String, String> = [
        ("xmlns".to_owned(), ns::JABBER_CLIENT.to_owned()),
        ("xmlns:stream".to_owned(), ns::STREAM.to_owned()),
        ("id".to_owned(), "stream-1".to_owned()),
        ("version".to_owned(), "1.0".to_owned()),
    ]
    .iter()
    .cloned()
    .collect();
    peer.send(Packet::StreamStart(attrs)).await.unwrap();
    peer.send(Packet::Stanza(Element::from(features)))
        .await
        .unwrap();
}

/// Builds a ready session over an in-memory transport, returning the peer
/// side for the test to drive.
pub async fn ready_session(mux: Mux) -> (Session, Peer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let mut peer: Peer = Framed::new(Box::new(server), XmppCodec::new());

    let jid = Jid::from_str("tester@example.org/here").unwrap();
    let client_task = tokio::spawn(async move {
        XmppStream::start(Box::new(client), jid, ns::JABBER_CLIENT.to_owned())
            .await
            .unwrap()
    });
    accept_stream(&mut peer, StreamFeatures::default()).await;
    let stream = client_task.await.unwrap();

    let session = Session::new(stream, SessionState::READY, mux);
    (session, peer)
}

/// Discards the peer's parser state, as a real server does when the client
/// restarts the stream after SASL or STARTTLS. Buffered bytes carry over.
pub fn reset_codec(peer: Peer) -> Peer {
    let parts = peer.into_parts();
    let mut fresh =
        tokio_util::codec::FramedParts::new::<Packet>(parts.io, XmppCodec::new());
    fresh.read_buf = parts.read_buf;
    fresh.write_buf = parts.write_buf;
    Framed::from_parts(fresh)
}

/// Reads stanzas from the peer until `count` have arrived.
pub async fn collect_stanzas(peer: &mut Peer, count: usize) -> Vec<Element> {
    let mut stanzas = Vec::with_capacity(count);
    while stanzas.len() < count {
        match peer.next().await.expect("peer stream ended").unwrap() {
            Packet::Stanza(stanza) => stanzas.push(stanza),
            Packet::Text(_) => {}
            Packet::StreamStart(_) => {}
            Packet::Raw(_) => unreachable!("decoder never yields raw packets"),
            Packet::StreamEnd => break,
        }
    }
    stanzas
}
