// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-band TLS upgrade (RFC 6120 §5) over rustls.
//!
//! After `<proceed/>` the plaintext transport is wrapped in place; the
//! caller reopens the XML stream over the returned ciphertext transport.
//! On TLS 1.3 the upgrade also yields `tls-exporter` channel-binding data
//! for the SASL `-PLUS` mechanisms.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_rustls::client::TlsStream as ClientTlsStream;
use tokio_rustls::rustls::{
    ClientConfig, OwnedTrustAnchor, ProtocolVersion, RootCertStore, ServerName,
};
use tokio_rustls::server::TlsStream as ServerTlsStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use quill_sasl::common::ChannelBinding;
use quill_stanzas::{ns, Element};

use crate::error::{Error, ProtocolError};
use crate::stream::XmppStream;
use crate::transport::{BoxTransport, Transport};

impl<T: Transport> Transport for ClientTlsStream<T> {
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.get_ref().0.peer_addr()
    }
}

impl<T: Transport> Transport for ServerTlsStream<T> {
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.get_ref().0.peer_addr()
    }
}

/// Performs `<starttls/>` on an XmppStream and returns the upgraded
/// transport together with its channel-binding data.
pub async fn starttls(
    mut xmpp_stream: XmppStream,
) -> Result<(BoxTransport, ChannelBinding), Error> {
    let nonza = Element::builder("starttls", ns::TLS).build();
    xmpp_stream.send_stanza(nonza).await?;

    loop {
        let stanza = xmpp_stream.next_stanza().await?;
        if stanza.is("proceed", ns::TLS) {
            break;
        } else if stanza.is("failure", ns::TLS) {
            return Err(Error::Protocol(ProtocolError::NoTls));
        }
    }

    let domain = xmpp_stream.jid.domain().to_string();
    let stream = xmpp_stream.into_inner();
    get_tls_stream(domain, stream).await
}

async fn get_tls_stream(
    domain: String,
    stream: BoxTransport,
) -> Result<(BoxTransport, ChannelBinding), Error> {
    let domain = ServerName::try_from(domain.as_str())
        .map_err(|_| Error::Protocol(ProtocolError::NoTls))?;
    let mut root_store = RootCertStore::empty();
    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls_stream = TlsConnector::from(Arc::new(config))
        .connect(domain, stream)
        .await
        .map_err(Error::Io)?;
    let channel_binding = channel_binding_for(&tls_stream);
    Ok((Box::new(tls_stream), channel_binding))
}

fn channel_binding_for(stream: &ClientTlsStream<BoxTransport>) -> ChannelBinding {
    let (_, connection) = stream.get_ref();
    match connection.protocol_version() {
        // TODO: tls-unique binding for TLS 1.2 once rustls exposes the
        // finished message.
        Some(ProtocolVersion::TLSv1_3) => {
            let data = vec![0u8; 32];
            match connection.export_keying_material(data, b"EXPORTER-Channel-Binding", None) {
                Ok(data) => ChannelBinding::TlsExporter(data),
                Err(_) => ChannelBinding::None,
            }
        }
        _ => ChannelBinding::None,
    }
}

/// The server-side upgrade: accepts the TLS handshake over a transport whose
/// owner already sent `<proceed/>`.
pub async fn accept_tls(
    transport: BoxTransport,
    acceptor: TlsAcceptor,
) -> Result<BoxTransport, Error> {
    let tls_stream = acceptor.accept(transport).await.map_err(Error::Io)?;
    Ok(Box::new(tls_stream))
}
