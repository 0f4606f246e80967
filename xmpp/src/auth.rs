// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The client side of the SASL exchange over an XMPP stream.

use std::collections::HashSet;
use std::str::FromStr;

use quill_sasl::client::mechanisms::{Anonymous, External, Plain, Scram};
use quill_sasl::client::Mechanism;
use quill_sasl::common::scram::{Sha1, Sha256, Sha512};
use quill_sasl::common::{Credentials, Identity, Secret};

use quill_stanzas::sasl::{
    Auth, Challenge, Failure, Mechanism as XmppMechanism, Response, Success,
};

use crate::error::{AuthError, Error, ProtocolError};
use crate::stream::XmppStream;

type BoxMechanism = Box<dyn Mechanism + Send>;

// Candidate constructors in client preference order. A constructor returns
// None when the credentials cannot drive that mechanism.
fn candidates(creds: &Credentials) -> Vec<Box<dyn Fn() -> Option<BoxMechanism> + '_>> {
    let mut out: Vec<Box<dyn Fn() -> Option<BoxMechanism> + '_>> = Vec::new();

    macro_rules! scram_plus {
        ($provider:ty) => {
            out.push(Box::new(|| {
                Scram::<$provider>::from_credentials(creds.clone())
                    .ok()
                    .filter(|_| creds.channel_binding.is_available())
                    .map(|mech| Box::new(mech) as BoxMechanism)
            }));
        };
    }
    macro_rules! scram {
        ($provider:ty) => {
            out.push(Box::new(|| {
                Scram::<$provider>::from_credentials(creds.clone())
                    .ok()
                    .map(|mech| Box::new(mech.without_channel_binding()) as BoxMechanism)
            }));
        };
    }

    scram_plus!(Sha512);
    scram_plus!(Sha256);
    scram_plus!(Sha1);
    scram!(Sha512);
    scram!(Sha256);
    scram!(Sha1);
    out.push(Box::new(|| {
        Plain::from_credentials(creds.clone())
            .ok()
            .map(|mech| Box::new(mech) as BoxMechanism)
    }));
    out.push(Box::new(|| {
        if let (Identity::Username(_), Secret::None) = (&creds.identity, &creds.secret) {
            // A username without a password means the outer channel carries
            // the authentication.
            Some(Box::new(External::with_authzid(match &creds.identity {
                Identity::Username(name) => name.clone(),
                Identity::None => unreachable!(),
            })) as BoxMechanism)
        } else {
            None
        }
    }));
    out.push(Box::new(|| {
        Anonymous::from_credentials(creds.clone())
            .ok()
            .map(|mech| Box::new(mech) as BoxMechanism)
    }));
    out
}

/// Picks the first client-preferred mechanism among those the server
/// offered.
pub fn select_mechanism(
    offered: &[String],
    creds: &Credentials,
) -> Result<BoxMechanism, AuthError> {
    let offered: HashSet<&str> = offered.iter().map(String::as_str).collect();
    for candidate in candidates(creds) {
        if let Some(mechanism) = candidate() {
            if offered.contains(mechanism.name()) {
                return Ok(mechanism);
            }
        }
    }
    Err(AuthError::NoMechanism)
}

/// Drives the SASL exchange to completion over an opened stream.
///
/// On success the stream must be reopened by the caller; on failure the
/// server's failure condition is surfaced without detailing which half of
/// the credentials mismatched.
pub async fn auth(stream: &mut XmppStream, creds: &Credentials) -> Result<(), Error> {
    let mut mechanism =
        select_mechanism(&stream.stream_features.sasl_mechanisms.mechanisms, creds)?;

    let initial = mechanism.initial();
    let mechanism_name =
        XmppMechanism::from_str(mechanism.name()).map_err(ProtocolError::Parsers)?;

    stream
        .send_stanza(Auth {
            mechanism: mechanism_name,
            data: initial,
        })
        .await?;

    loop {
        let stanza = stream.next_stanza().await?;
        if let Ok(challenge) = Challenge::try_from(stanza.clone()) {
            let response = mechanism
                .response(&challenge.data)
                .map_err(AuthError::Sasl)?;
            stream.send_stanza(Response { data: response }).await?;
        } else if let Ok(success) = Success::try_from(stanza.clone()) {
            mechanism.success(&success.data).map_err(AuthError::Sasl)?;
            return Ok(());
        } else if let Ok(failure) = Failure::try_from(stanza.clone()) {
            return Err(Error::Auth(AuthError::Fail(failure.defined_condition)));
        }
        // Anything else between SASL elements is ignored.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_sasl::common::ChannelBinding;

    fn creds() -> Credentials {
        Credentials::default()
            .with_username("user")
            .with_password("pencil")
    }

    fn offered(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefers_the_strongest_offered_mechanism() {
        let mechanism =
            select_mechanism(&offered(&["PLAIN", "SCRAM-SHA-1", "SCRAM-SHA-256"]), &creds())
                .unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-256");

        let mechanism = select_mechanism(&offered(&["PLAIN", "SCRAM-SHA-512"]), &creds()).unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-512");

        let mechanism = select_mechanism(&offered(&["PLAIN"]), &creds()).unwrap();
        assert_eq!(mechanism.name(), "PLAIN");
    }

    #[test]
    fn plus_variants_require_binding_data() {
        // Without channel-binding data the -PLUS offer is not eligible.
        let mechanism =
            select_mechanism(&offered(&["SCRAM-SHA-256-PLUS", "SCRAM-SHA-256"]), &creds())
                .unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-256");

        assert!(matches!(
            select_mechanism(&offered(&["SCRAM-SHA-256-PLUS"]), &creds()),
            Err(AuthError::NoMechanism)
        ));

        let creds = creds().with_channel_binding(ChannelBinding::TlsExporter(vec![1; 32]));
        let mechanism =
            select_mechanism(&offered(&["SCRAM-SHA-256-PLUS", "SCRAM-SHA-256"]), &creds)
                .unwrap();
        assert_eq!(mechanism.name(), "SCRAM-SHA-256-PLUS");
    }

    #[test]
    fn no_overlap_is_no_mechanism() {
        assert!(matches!(
            select_mechanism(&offered(&["GSSAPI"]), &creds()),
            Err(AuthError::NoMechanism)
        ));
        assert!(matches!(
            select_mechanism(&[], &creds()),
            Err(AuthError::NoMechanism)
        ));
    }

    #[test]
    fn anonymous_needs_no_credentials() {
        let creds = Credentials::default();
        let mechanism = select_mechanism(&offered(&["ANONYMOUS"]), &creds).unwrap();
        assert_eq!(mechanism.name(), "ANONYMOUS");
    }

    #[test]
    fn external_uses_the_bare_identity() {
        let creds = Credentials {
            identity: Identity::Username("component.example".to_owned()),
            secret: Secret::None,
            channel_binding: ChannelBinding::None,
        };
        let mechanism = select_mechanism(&offered(&["EXTERNAL"]), &creds).unwrap();
        assert_eq!(mechanism.name(), "EXTERNAL");
    }
}
