// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! SASL negotiation elements (RFC 6120 §6).

use crate::ns;
use crate::util::error::Error;
use crate::util::helpers::Base64;
use crate::Element;
use std::collections::BTreeMap;
use std::convert::TryFrom;

generate_attribute!(
    /// The list of available SASL mechanisms.
    Mechanism, "mechanism", {
        /// Uses no hashing mechanism and transmit the password in clear to
        /// the server, using a single step.
        Plain => "PLAIN",

        /// Authentication is derived from an outer channel, usually a TLS
        /// client certificate.
        External => "EXTERNAL",

        /// Creates a temporary JID on login, which will be destroyed on
        /// disconnect.
        Anonymous => "ANONYMOUS",

        /// Challenge-based mechanism using HMAC and SHA-1, allows both the
        /// client and the server to avoid having to store the password in
        /// clear.
        ///
        /// See <https://tools.ietf.org/html/rfc5802>
        ScramSha1 => "SCRAM-SHA-1",

        /// Same as ScramSha1, with the addition of channel binding.
        ScramSha1Plus => "SCRAM-SHA-1-PLUS",

        /// Same as ScramSha1, but using SHA-256 instead of SHA-1 as the hash
        /// function.
        ScramSha256 => "SCRAM-SHA-256",

        /// Same as ScramSha256, with the addition of channel binding.
        ScramSha256Plus => "SCRAM-SHA-256-PLUS",

        /// Same as ScramSha1, but using SHA-512 instead of SHA-1 as the hash
        /// function.
        ScramSha512 => "SCRAM-SHA-512",

        /// Same as ScramSha512, with the addition of channel binding.
        ScramSha512Plus => "SCRAM-SHA-512-PLUS",
    }
);

/// The list of mechanisms the server offers in `<stream:features/>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mechanisms {
    /// The mechanism names, in the server's order.
    pub mechanisms: Vec<String>,
}

impl TryFrom<Element> for Mechanisms {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Mechanisms, Error> {
        check_self!(elem, "mechanisms", SASL);
        check_no_attributes!(elem, "mechanisms");
        let mut mechanisms = Vec::new();
        for child in elem.children() {
            if !child.is("mechanism", ns::SASL) {
                return Err(Error::ParseError("Unknown child in mechanisms element."));
            }
            mechanisms.push(child.text());
        }
        Ok(Mechanisms { mechanisms })
    }
}

impl From<Mechanisms> for Element {
    fn from(mechanisms: Mechanisms) -> Element {
        Element::builder("mechanisms", ns::SASL)
            .append_all(
                mechanisms
                    .mechanisms
                    .into_iter()
                    .map(|name| Element::builder("mechanism", ns::SASL).append(name)),
            )
            .build()
    }
}

/// The first step of the SASL process, selecting the mechanism and sending
/// the first part of the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    /// The mechanism used.
    pub mechanism: Mechanism,

    /// The content of the handshake.
    pub data: Vec<u8>,
}

impl TryFrom<Element> for Auth {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Auth, Error> {
        check_self!(elem, "auth", SASL);
        check_no_children!(elem, "auth");
        check_no_unknown_attributes!(elem, "auth", ["mechanism"]);
        Ok(Auth {
            mechanism: get_attr!(elem, "mechanism", Required),
            data: Base64::decode(&elem.text())?,
        })
    }
}

impl From<Auth> for Element {
    fn from(auth: Auth) -> Element {
        Element::builder("auth", ns::SASL)
            .attr("mechanism", auth.mechanism)
            .append_all(Base64::encode(&auth.data))
            .build()
    }
}

macro_rules! generate_data_element {
    ($(#[$meta:meta])* $elem:ident, $name:tt) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $elem {
            /// The payload of this step.
            pub data: Vec<u8>,
        }

        impl TryFrom<Element> for $elem {
            type Error = Error;

            fn try_from(elem: Element) -> Result<$elem, Error> {
                check_self!(elem, $name, SASL);
                check_no_children!(elem, $name);
                check_no_attributes!(elem, $name);
                Ok($elem {
                    data: Base64::decode(&elem.text())?,
                })
            }
        }

        impl From<$elem> for Element {
            fn from(elem: $elem) -> Element {
                Element::builder($name, ns::SASL)
                    .append_all(Base64::encode(&elem.data))
                    .build()
            }
        }
    };
}

generate_data_element!(
    /// In case the mechanism selected at the auth step requires a second
    /// step, the server sends this element with additional data.
    Challenge,
    "challenge"
);

generate_data_element!(
    /// The client's response to the server's challenge.
    Response,
    "response"
);

generate_data_element!(
    /// Sent by the server on SASL success, with the final additional data.
    Success,
    "success"
);

generate_empty_element!(
    /// Sent by the client at any point after auth if it wants to cancel the
    /// current authentication process.
    Abort,
    "abort",
    SASL
);

generate_element_enum!(
    /// List of possible failure conditions for SASL.
    DefinedCondition, "defined-condition", SASL, {
        /// The client aborted the authentication with abort.
        Aborted => "aborted",

        /// The account the client is trying to authenticate against has been
        /// disabled.
        AccountDisabled => "account-disabled",

        /// The credentials for this account have expired.
        CredentialsExpired => "credentials-expired",

        /// You must enable StartTLS or use direct TLS before using this
        /// authentication mechanism.
        EncryptionRequired => "encryption-required",

        /// The base64 data sent by the client is invalid.
        IncorrectEncoding => "incorrect-encoding",

        /// The authzid provided by the client is invalid.
        InvalidAuthzid => "invalid-authzid",

        /// The client tried to use an invalid mechanism, or none.
        InvalidMechanism => "invalid-mechanism",

        /// The client sent a bad request.
        MalformedRequest => "malformed-request",

        /// The mechanism selected is weaker than what the server allows.
        MechanismTooWeak => "mechanism-too-weak",

        /// The credentials provided are invalid.
        NotAuthorized => "not-authorized",

        /// The server encountered an issue which may be fixed later, the
        /// client should retry at some point.
        TemporaryAuthFailure => "temporary-auth-failure",
    }
);

type Lang = String;

/// Sent by the server on SASL failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// One of the defined conditions for this failure.
    pub defined_condition: DefinedCondition,

    /// Human-readable description of this failure.
    pub texts: BTreeMap<Lang, String>,
}

impl TryFrom<Element> for Failure {
    type Error = Error;

    fn try_from(root: Element) -> Result<Failure, Error> {
        check_self!(root, "failure", SASL);
        check_no_attributes!(root, "failure");
        let mut defined_condition = None;
        let mut texts = BTreeMap::new();
        for child in root.children() {
            if child.is("text", ns::SASL) {
                check_no_children!(child, "text");
                check_no_unknown_attributes!(child, "text", ["xml:lang"]);
                let lang = get_attr!(child, "xml:lang", Default);
                if texts.insert(lang, child.text()).is_some() {
                    return Err(Error::ParseError(
                        "Text element present twice for the same xml:lang.",
                    ));
                }
            } else if child.has_ns(ns::SASL) {
                if defined_condition.is_some() {
                    return Err(Error::ParseError(
                        "Failure must not have more than one defined-condition.",
                    ));
                }
                defined_condition = Some(DefinedCondition::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in failure element."));
            }
        }
        Ok(Failure {
            defined_condition: defined_condition
                .ok_or(Error::ParseError("Failure must have a defined-condition."))?,
            texts,
        })
    }
}

impl From<Failure> for Element {
    fn from(failure: Failure) -> Element {
        Element::builder("failure", ns::SASL)
            .append(failure.defined_condition)
            .append_all(failure.texts.into_iter().map(|(lang, text)| {
                Element::builder("text", ns::SASL)
                    .attr("xml:lang", lang)
                    .append(text)
            }))
            .build()
    }
}
