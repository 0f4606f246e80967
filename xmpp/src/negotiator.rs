// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stream-feature negotiation.
//!
//! Features are declarative records: what a feature is called, whether it is
//! required, and which session-state bits make it applicable or forbidden.
//! A negotiation pass picks an applicable advertised feature, runs it, ORs
//! its outcome into the state, and (for stream-resetting features) reopens
//! the stream; this repeats until nothing applies.

use quill_jid::Jid;
use quill_sasl::common::{ChannelBinding, Credentials};
use quill_stanzas::bind::{BindQuery, BindResponse};
use quill_stanzas::iq::{Iq, IqType};
use quill_stanzas::ns;
use quill_stanzas::starttls::StartTls;
use quill_stanzas::stream_features::StreamFeatures;

use crate::auth;
use crate::error::{Error, ProtocolError};
use crate::session::SessionState;
use crate::stream::{make_id, XmppStream};

/// What a [`StreamFeature`] negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// In-band TLS upgrade.
    StartTls,
    /// SASL authentication.
    Sasl,
    /// Resource binding.
    Bind,
}

/// One row of the declarative feature table.
#[derive(Debug, Clone)]
pub struct StreamFeature {
    /// The advertised element's (namespace, local name).
    pub name: (&'static str, &'static str),
    /// Whether negotiation must not finish without this feature.
    pub required: bool,
    /// State bits that must all be set for the feature to apply.
    pub necessary: SessionState,
    /// State bits that must all be clear for the feature to apply.
    pub prohibited: SessionState,
    /// The state bits a successful negotiation contributes.
    pub outcome: SessionState,
    /// What negotiating this feature means.
    pub kind: FeatureKind,
}

impl StreamFeature {
    /// Whether the feature applies in this state.
    pub fn applies(&self, state: SessionState) -> bool {
        state.contains(self.necessary) && (state & self.prohibited).is_empty()
    }
}

/// The client-side feature table, in negotiation order.
pub fn client_features() -> Vec<StreamFeature> {
    vec![
        StreamFeature {
            name: (ns::TLS, "starttls"),
            required: true,
            necessary: SessionState::empty(),
            prohibited: SessionState::SECURE,
            outcome: SessionState::SECURE,
            kind: FeatureKind::StartTls,
        },
        StreamFeature {
            name: (ns::SASL, "mechanisms"),
            required: true,
            necessary: SessionState::SECURE,
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

/// Filters the table down to the features applicable in `state`.
pub fn applicable(
    features: &[StreamFeature],
    state: SessionState,
) -> impl Iterator<Item = &StreamFeature> {
    features.iter().filter(move |feature| feature.applies(state))
}

/// Builds the `<stream:features/>` advertisement a receiving entity sends
/// for the given state.
pub fn advertise(
    features: &[StreamFeature],
    state: SessionState,
    sasl_mechanisms: &[String],
) -> StreamFeatures {
    let mut out = StreamFeatures::default();
    for feature in applicable(features, state) {
        match feature.kind {
            FeatureKind::StartTls => {
                out.starttls = Some(StartTls {
                    required: feature.required,
                });
            }
            FeatureKind::Sasl => {
                out.sasl_mechanisms.mechanisms = sasl_mechanisms.to_vec();
            }
            FeatureKind::Bind => {
                out.bind = true;
            }
        }
    }
    out
}

fn is_advertised(features: &StreamFeatures, feature: &StreamFeature) -> bool {
    match feature.kind {
        FeatureKind::StartTls => features.can_starttls(),
        FeatureKind::Sasl => !features.sasl_mechanisms.mechanisms.is_empty(),
        FeatureKind::Bind => features.bind,
    }
}

/// What the connecting client authenticates as.
pub struct ClientSetup {
    /// The account JID; its resource, if any, is requested at binding.
    pub jid: Jid,
    /// The account password.
    pub password: String,
}

/// Drives an opened stream to its terminal negotiation state: STARTTLS,
/// then SASL, then resource binding, reopening the stream after each
/// stream-resetting feature.
///
/// Returns the negotiated stream (its `jid` updated to the bound full JID)
/// and the accumulated state, `READY` included.
pub async fn negotiate_client(
    stream: XmppStream,
    setup: &ClientSetup,
) -> Result<(XmppStream, SessionState), Error> {
    negotiate_client_with(stream, setup, &client_features()).await
}

/// Like [`negotiate_client`] but over a custom feature table, e.g. one that
/// does not require STARTTLS for links that are secured out of band.
pub async fn negotiate_client_with(
    mut stream: XmppStream,
    setup: &ClientSetup,
    features: &[StreamFeature],
) -> Result<(XmppStream, SessionState), Error> {
    let mut state = SessionState::empty();
    let mut channel_binding = ChannelBinding::None;

    loop {
        let next = applicable(features, state)
            .find(|feature| is_advertised(&stream.stream_features, feature));
        let Some(feature) = next else {
            break;
        };

        match feature.kind {
            #[cfg(feature = "tls-rust")]
            FeatureKind::StartTls => {
                let jid = stream.jid.clone();
                let stream_ns = stream.ns.clone();
                let (transport, binding) = crate::starttls::starttls(stream).await?;
                channel_binding = binding;
                stream = XmppStream::start(transport, jid, stream_ns).await?;
            }
            #[cfg(not(feature = "tls-rust"))]
            FeatureKind::StartTls => {
                return Err(Error::Protocol(ProtocolError::NoTls));
            }
            FeatureKind::Sasl => {
                let username = setup
                    .jid
                    .local()
                    .ok_or(Error::InvalidState)?
                    .to_owned();
                let creds = Credentials::default()
                    .with_username(username)
                    .with_password(setup.password.clone())
                    .with_channel_binding(channel_binding.clone());
                auth::auth(&mut stream, &creds).await?;
                let jid = stream.jid.clone();
                let stream_ns = stream.ns.clone();
                stream = XmppStream::start(stream.into_inner(), jid, stream_ns).await?;
            }
            FeatureKind::Bind => {
                let full = bind(&mut stream).await?;
                stream.jid = Jid::Full(full);
            }
        }

        state |= feature.outcome;
    }

    for feature in features {
        if feature.required && !state.contains(feature.outcome) {
            return Err(match feature.kind {
                FeatureKind::StartTls => Error::Protocol(ProtocolError::NoTls),
                FeatureKind::Sasl => Error::Auth(crate::error::AuthError::NoMechanism),
                FeatureKind::Bind => Error::Protocol(ProtocolError::InvalidNegotiation),
            });
        }
    }

    state |= SessionState::READY;
    Ok((stream, state))
}

// Binds a resource, preferring the one in the stream's JID.
async fn bind(stream: &mut XmppStream) -> Result<quill_jid::FullJid, Error> {
    let resource = stream.jid.resource().map(str::to_owned);
    let id = make_id();
    let iq = Iq::from_set(id.clone(), BindQuery::new(resource));
    stream.send_stanza(iq).await?;

    loop {
        let stanza = stream.next_stanza().await?;
        if stanza.is("iq", ns::DEFAULT_NS) {
            let iq = Iq::try_from(stanza)?;
            if iq.id != id {
                continue;
            }
            return match iq.payload {
                IqType::Result(Some(payload)) => {
                    let response = BindResponse::try_from(payload)
                        .map_err(|_| ProtocolError::InvalidBindResponse)?;
                    Ok(response.into())
                }
                _ => Err(ProtocolError::InvalidBindResponse.into()),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starttls_applies_only_on_plaintext_streams() {
        let features = client_features();
        let starttls = &features[0];
        assert!(starttls.applies(SessionState::empty()));
        assert!(!starttls.applies(SessionState::SECURE));
        assert!(!starttls.applies(SessionState::SECURE | SessionState::AUTHENTICATED));
    }

    #[test]
    fn sasl_needs_a_secure_unauthenticated_stream() {
        let features = client_features();
        let sasl = &features[1];
        assert!(!sasl.applies(SessionState::empty()));
        assert!(sasl.applies(SessionState::SECURE));
        assert!(!sasl.applies(SessionState::SECURE | SessionState::AUTHENTICATED));
    }

    #[test]
    fn bind_needs_authentication() {
        let features = client_features();
        let bind = &features[2];
        assert!(!bind.applies(SessionState::SECURE));
        assert!(bind.applies(SessionState::SECURE | SessionState::AUTHENTICATED));
        assert!(!bind.applies(
            SessionState::SECURE | SessionState::AUTHENTICATED | SessionState::BOUND
        ));
    }

    #[test]
    fn applicable_narrows_with_progress() {
        let features = client_features();
        let names = |state: SessionState| -> Vec<&str> {
            applicable(&features, state)
                .map(|feature| feature.name.1)
                .collect()
        };
        assert_eq!(names(SessionState::empty()), ["starttls"]);
        assert_eq!(names(SessionState::SECURE), ["mechanisms"]);
        assert_eq!(
            names(SessionState::SECURE | SessionState::AUTHENTICATED),
            ["bind"]
        );
        assert!(names(
            SessionState::SECURE | SessionState::AUTHENTICATED | SessionState::BOUND
        )
        .is_empty());
    }

    #[test]
    fn advertisement_follows_the_state() {
        let features = client_features();
        let mechanisms = vec!["SCRAM-SHA-256".to_owned(), "PLAIN".to_owned()];

        let advertised = advertise(&features, SessionState::empty(), &mechanisms);
        assert!(advertised.can_starttls());
        assert!(advertised.sasl_mechanisms.mechanisms.is_empty());

        let advertised = advertise(&features, SessionState::SECURE, &mechanisms);
        assert!(!advertised.can_starttls());
        assert_eq!(advertised.sasl_mechanisms.mechanisms, mechanisms);
        assert!(!advertised.bind);

        let advertised = advertise(
            &features,
            SessionState::SECURE | SessionState::AUTHENTICATED,
            &mechanisms,
        );
        assert!(advertised.bind);
    }
}
