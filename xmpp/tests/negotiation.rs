// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Full client negotiation (SASL + resource binding) against a scripted
//! in-memory server.

mod common;

use std::str::FromStr;

use futures::SinkExt;
use tokio_util::codec::Framed;

use quill_jid::{FullJid, Jid};
use quill_sasl::common::scram::{Sha256, Sha512};
use quill_sasl::common::{ChannelBinding, Identity};
use quill_sasl::secret::{Pbkdf2Sha256, Pbkdf2Sha512};
use quill_sasl::server::mechanisms::Scram as ServerScram;
use quill_sasl::server::{
    Mechanism as ServerMechanism, Provider, ProviderError, Response as ServerResponse,
};
use quill_sasl::impl_validator_using_provider;
use quill_stanzas::bind::{BindQuery, BindResponse};
use quill_stanzas::iq::{Iq, IqType};
use quill_stanzas::sasl::{Auth, Challenge, Response, Success};
use quill_stanzas::stream_features::StreamFeatures;
use quill_stanzas::{ns, Element};
use quill_xmpp::negotiator::{negotiate_client_with, ClientSetup, FeatureKind, StreamFeature};
use quill_xmpp::session::SessionState;
use quill_xmpp::stream::XmppStream;
use quill_xmpp::transport::BoxTransport;
use quill_xmpp::{Packet, XmppCodec};

use common::{accept_stream, Peer};

struct PencilProvider;

impl Provider<Pbkdf2Sha256> for PencilProvider {
    fn provide(&self, identity: &Identity) -> Result<Pbkdf2Sha256, ProviderError> {
        match identity {
            Identity::Username(name) if name == "tester" => {
                Pbkdf2Sha256::derive("pencil", b"salt-value-here!", 4096)
                    .map_err(|_| ProviderError::StorageFailure)
            }
            _ => Err(ProviderError::UnknownIdentity),
        }
    }
}

impl_validator_using_provider!(PencilProvider, Pbkdf2Sha256);

impl Provider<Pbkdf2Sha512> for PencilProvider {
    fn provide(&self, identity: &Identity) -> Result<Pbkdf2Sha512, ProviderError> {
        match identity {
            Identity::Username(name) if name == "tester" => {
                Pbkdf2Sha512::derive("pencil", b"salt-value-here!", 4096)
                    .map_err(|_| ProviderError::StorageFailure)
            }
            _ => Err(ProviderError::UnknownIdentity),
        }
    }
}

impl_validator_using_provider!(PencilProvider, Pbkdf2Sha512);

// The feature table of a link that is secured out of band: SASL and bind
// only.
fn plaintext_features() -> Vec<StreamFeature> {
    vec![
        StreamFeature {
            name: (ns::SASL, "mechanisms"),
            required: true,
            necessary: SessionState::empty(),
            prohibited: SessionState::AUTHENTICATED,
            outcome: SessionState::AUTHENTICATED,
            kind: FeatureKind::Sasl,
        },
        StreamFeature {
            name: (ns::BIND, "bind"),
            required: true,
            necessary: SessionState::AUTHENTICATED,
            prohibited: SessionState::BOUND,
            outcome: SessionState::BOUND,
            kind: FeatureKind::Bind,
        },
    ]
}

fn sasl_features(mechanisms: &[&str]) -> StreamFeatures {
    let mut features = StreamFeatures::default();
    features.sasl_mechanisms.mechanisms =
        mechanisms.iter().map(|name| name.to_string()).collect();
    features
}

fn bind_features() -> StreamFeatures {
    StreamFeatures {
        bind: true,
        ..StreamFeatures::default()
    }
}

// Runs the scripted server side: SASL over the given mechanism, then a
// stream restart, then resource binding.
async fn serve_peer(mut peer: Peer, mechanism_name: &str) {
    accept_stream(&mut peer, sasl_features(&[mechanism_name])).await;

    let mut mechanism: Box<dyn ServerMechanism + Send> = match mechanism_name {
        "SCRAM-SHA-256" => Box::new(ServerScram::<Sha256, _>::new(
            PencilProvider,
            ChannelBinding::None,
        )),
        "SCRAM-SHA-512" => Box::new(ServerScram::<Sha512, _>::new(
            PencilProvider,
            ChannelBinding::None,
        )),
        other => panic!("unexpected mechanism {}", other),
    };

    // client-first
    let auth = loop {
        match peer.next_packet().await {
            Packet::Stanza(stanza) => break Auth::try_from(stanza).unwrap(),
            _ => {}
        }
    };
    assert_eq!(auth.mechanism.to_string(), mechanism_name);
    let challenge = match mechanism.respond(&auth.data).unwrap() {
        ServerResponse::Proceed(data) => data,
        other => panic!("unexpected response {:?}", other),
    };
    peer.send(Packet::Stanza(Challenge { data: challenge }.into()))
        .await
        .unwrap();

    // client-final
    let response = loop {
        match peer.next_packet().await {
            Packet::Stanza(stanza) => break Response::try_from(stanza).unwrap(),
            _ => {}
        }
    };
    let (identity, server_final) = match mechanism.respond(&response.data).unwrap() {
        ServerResponse::Success(identity, data) => (identity, data),
        other => panic!("unexpected response {:?}", other),
    };
    assert_eq!(identity, Identity::Username("tester".to_owned()));
    peer.send(Packet::Stanza(Success { data: server_final }.into()))
        .await
        .unwrap();

    // stream restart, now advertising bind
    let mut peer = common::reset_codec(peer);
    accept_stream(&mut peer, bind_features()).await;

    // resource binding
    let iq = loop {
        match peer.next_packet().await {
            Packet::Stanza(stanza) => break Iq::try_from(stanza).unwrap(),
            _ => {}
        }
    };
    let query = match &iq.payload {
        IqType::Set(payload) => BindQuery::try_from(payload.clone()).unwrap(),
        other => panic!("unexpected iq payload {:?}", other),
    };
    assert_eq!(query.resource(), Some("balcony"));
    let bound = FullJid::new("tester@example.org/balcony").unwrap();
    let reply = iq.result_reply(Some(BindResponse::new(bound).into()));
    peer.send(Packet::Stanza(reply.into())).await.unwrap();
}

trait PeerExt {
    async fn next_packet(&mut self) -> Packet;
}

impl PeerExt for Peer {
    async fn next_packet(&mut self) -> Packet {
        use futures::StreamExt;
        self.next().await.expect("peer stream ended").unwrap()
    }
}

async fn run_negotiation(mechanism: &'static str) -> (XmppStream, SessionState) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let peer: Peer = Framed::new(Box::new(server) as BoxTransport, XmppCodec::new());
    let server_task = tokio::spawn(serve_peer(peer, mechanism));

    let jid = Jid::from_str("tester@example.org/balcony").unwrap();
    let stream = XmppStream::start(Box::new(client), jid.clone(), ns::JABBER_CLIENT.to_owned())
        .await
        .unwrap();
    let setup = ClientSetup {
        jid,
        password: "pencil".to_owned(),
    };
    let negotiated = negotiate_client_with(stream, &setup, &plaintext_features())
        .await
        .unwrap();
    server_task.await.unwrap();
    negotiated
}

#[tokio::test]
async fn scram_sha256_login_and_bind() {
    let (stream, state) = run_negotiation("SCRAM-SHA-256").await;
    assert!(state.contains(SessionState::AUTHENTICATED));
    assert!(state.contains(SessionState::BOUND));
    assert!(state.contains(SessionState::READY));
    assert!(!state.contains(SessionState::SECURE));
    assert_eq!(
        stream.jid,
        Jid::Full(FullJid::new("tester@example.org/balcony").unwrap())
    );
}

#[tokio::test]
async fn scram_sha512_login_and_bind() {
    let (_stream, state) = run_negotiation("SCRAM-SHA-512").await;
    assert!(state.contains(SessionState::AUTHENTICATED | SessionState::BOUND));
}
