// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stream-level errors (RFC 6120 §4.9).
//!
//! A stream error is unrecoverable: the entity that detects it sends
//! `<stream:error/>` followed by the closing stream tag.

use crate::ns;
use crate::util::error::Error;
use crate::Element;
use std::collections::BTreeMap;
use std::convert::TryFrom;

generate_element_enum!(
    /// List of the defined stream error conditions.
    DefinedCondition, "condition", XMPP_STREAMS, {
        /// The entity has sent XML that cannot be processed.
        BadFormat => "bad-format",

        /// The entity has sent a namespace prefix that is unsupported.
        BadNamespacePrefix => "bad-namespace-prefix",

        /// The server either (1) is closing the existing stream for this
        /// entity because a new stream has been initiated, or (2) is refusing
        /// a new stream for this entity.
        Conflict => "conflict",

        /// One party is closing the stream because it has reason to believe
        /// that the other party has permanently lost the ability to
        /// communicate over the stream.
        ConnectionTimeout => "connection-timeout",

        /// The value of the 'to' attribute provided in the initial stream
        /// header corresponds to an FQDN that is no longer serviced by the
        /// receiving entity.
        HostGone => "host-gone",

        /// The value of the 'to' attribute provided in the initial stream
        /// header does not correspond to an FQDN that is serviced by the
        /// receiving entity.
        HostUnknown => "host-unknown",

        /// A stanza sent between two servers lacks a 'to' or 'from'
        /// attribute, or the attribute has no value.
        ImproperAddressing => "improper-addressing",

        /// The server has experienced a misconfiguration or other internal
        /// error that prevents it from servicing the stream.
        InternalServerError => "internal-server-error",

        /// The data provided in a 'from' attribute does not match an
        /// authorized JID negotiated between the two entities.
        InvalidFrom => "invalid-from",

        /// The stream namespace name is something other than the allowed
        /// values.
        InvalidNamespace => "invalid-namespace",

        /// The entity has sent invalid XML over the stream to a server that
        /// performs validation.
        InvalidXml => "invalid-xml",

        /// The entity has attempted to send XML stanzas or other outbound
        /// data before the stream has been authenticated.
        NotAuthorized => "not-authorized",

        /// The initiating entity has sent XML that violates the
        /// well-formedness rules.
        NotWellFormed => "not-well-formed",

        /// The entity has violated some local service policy.
        PolicyViolation => "policy-violation",

        /// The server is unable to properly connect to a remote entity that
        /// is needed for authentication or authorization.
        RemoteConnectionFailed => "remote-connection-failed",

        /// The server is closing the stream because it has new (typically
        /// security-critical) features to offer.
        Reset => "reset",

        /// The server lacks the system resources necessary to service the
        /// stream.
        ResourceConstraint => "resource-constraint",

        /// The entity has attempted to send restricted XML features.
        RestrictedXml => "restricted-xml",

        /// The server will not provide service to the initiating entity but
        /// is redirecting traffic to another host.
        SeeOtherHost => "see-other-host",

        /// The server is being shut down and all active streams are being
        /// closed.
        SystemShutdown => "system-shutdown",

        /// The error condition is not one of those defined by the other
        /// conditions in this list.
        UndefinedCondition => "undefined-condition",

        /// The initiating entity has encoded the stream in an encoding that
        /// is not supported by the server.
        UnsupportedEncoding => "unsupported-encoding",

        /// The receiving entity has advertised a mandatory-to-negotiate
        /// stream feature that the initiating entity does not support.
        UnsupportedFeature => "unsupported-feature",

        /// The initiating entity has sent a first-level child of the stream
        /// that is not supported.
        UnsupportedStanzaType => "unsupported-stanza-type",

        /// The 'version' attribute provided by the initiating entity
        /// specifies a version of XMPP that is not supported.
        UnsupportedVersion => "unsupported-version",
    }
);

type Lang = String;

/// The representation of a `<stream:error/>`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamError {
    /// One of the defined conditions for this error.
    pub defined_condition: DefinedCondition,

    /// Human-readable description of this error.
    pub texts: BTreeMap<Lang, String>,
}

impl StreamError {
    /// Creates a stream error out of a condition.
    pub fn new(defined_condition: DefinedCondition) -> StreamError {
        StreamError {
            defined_condition,
            texts: BTreeMap::new(),
        }
    }
}

impl From<DefinedCondition> for StreamError {
    fn from(defined_condition: DefinedCondition) -> StreamError {
        StreamError::new(defined_condition)
    }
}

impl TryFrom<Element> for StreamError {
    type Error = Error;

    fn try_from(root: Element) -> Result<StreamError, Error> {
        check_self!(root, "error", STREAM);
        check_no_attributes!(root, "error");
        let mut defined_condition = None;
        let mut texts = BTreeMap::new();
        for child in root.children() {
            if child.is("text", ns::XMPP_STREAMS) {
                check_no_children!(child, "text");
                check_no_unknown_attributes!(child, "text", ["xml:lang"]);
                let lang = get_attr!(child, "xml:lang", Default);
                if texts.insert(lang, child.text()).is_some() {
                    return Err(Error::ParseError(
                        "Text element present twice for the same xml:lang.",
                    ));
                }
            } else if child.has_ns(ns::XMPP_STREAMS) {
                if defined_condition.is_some() {
                    return Err(Error::ParseError(
                        "Stream error must not have more than one defined-condition.",
                    ));
                }
                defined_condition = Some(DefinedCondition::try_from(child.clone())?);
            }
            // Other children carry application-specific conditions; they are
            // ignored here.
        }
        Ok(StreamError {
            defined_condition: defined_condition.ok_or(Error::ParseError(
                "Stream error must have a defined-condition.",
            ))?,
            texts,
        })
    }
}

impl From<StreamError> for Element {
    fn from(err: StreamError) -> Element {
        Element::builder("error", ns::STREAM)
            .append(err.defined_condition)
            .append_all(err.texts.into_iter().map(|(lang, text)| {
                Element::builder("text", ns::XMPP_STREAMS)
                    .attr("xml:lang", lang)
                    .append(text)
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_round_trip() {
        for name in [
            "bad-format",
            "connection-timeout",
            "invalid-xml",
            "see-other-host",
            "unsupported-version",
        ] {
            let elem: Element = format!(
                "<{} xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>",
                name
            )
            .parse()
            .unwrap();
            let condition = DefinedCondition::try_from(elem.clone()).unwrap();
            let elem2: Element = condition.into();
            assert_eq!(elem, elem2);
        }
    }

    #[test]
    fn test_parse_error() {
        let elem: Element = "<error xmlns='http://etherx.jabber.org/streams'><not-well-formed xmlns='urn:ietf:params:xml:ns:xmpp-streams'/></error>".parse().unwrap();
        let error = StreamError::try_from(elem).unwrap();
        assert_eq!(error.defined_condition, DefinedCondition::NotWellFormed);
    }
}
