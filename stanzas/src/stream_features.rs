// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stream features (RFC 6120 §4.3.2), the `<stream:features/>` element the
//! receiving entity sends after each stream header.

use crate::ns;
use crate::sasl::Mechanisms;
use crate::starttls::StartTls;
use crate::util::error::Error;
use crate::Element;
use std::convert::TryFrom;

/// The typed view of a `<stream:features/>` element.
///
/// Features this crate does not model are kept as raw elements in `others`,
/// so the negotiator can still advertise and match them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamFeatures {
    /// The STARTTLS advertisement, if any.
    pub starttls: Option<StartTls>,

    /// The SASL mechanisms list, if any.
    pub sasl_mechanisms: Mechanisms,

    /// Whether resource binding is advertised.
    pub bind: bool,

    /// Any other features.
    pub others: Vec<Element>,
}

impl StreamFeatures {
    /// Whether the server advertised the STARTTLS feature.
    pub fn can_starttls(&self) -> bool {
        self.starttls.is_some()
    }

    /// Whether the server advertised this SASL mechanism name.
    pub fn supports_sasl_mechanism(&self, name: &str) -> bool {
        self.sasl_mechanisms
            .mechanisms
            .iter()
            .any(|mech| mech == name)
    }
}

impl TryFrom<Element> for StreamFeatures {
    type Error = Error;

    fn try_from(root: Element) -> Result<StreamFeatures, Error> {
        check_self!(root, "features", STREAM);
        check_no_attributes!(root, "features");
        let mut features = StreamFeatures::default();
        for child in root.children() {
            if child.is("starttls", ns::TLS) {
                if features.starttls.is_some() {
                    return Err(Error::ParseError("Too many starttls features."));
                }
                features.starttls = Some(StartTls::try_from(child.clone())?);
            } else if child.is("mechanisms", ns::SASL) {
                if !features.sasl_mechanisms.mechanisms.is_empty() {
                    return Err(Error::ParseError("Too many mechanisms features."));
                }
                features.sasl_mechanisms = Mechanisms::try_from(child.clone())?;
            } else if child.is("bind", ns::BIND) {
                if features.bind {
                    return Err(Error::ParseError("Too many bind features."));
                }
                features.bind = true;
            } else {
                features.others.push(child.clone());
            }
        }
        Ok(features)
    }
}

impl From<StreamFeatures> for Element {
    fn from(features: StreamFeatures) -> Element {
        Element::builder("features", ns::STREAM)
            .append_all(features.starttls.map(Element::from))
            .append_all(
                if features.sasl_mechanisms.mechanisms.is_empty() {
                    None
                } else {
                    Some(Element::from(features.sasl_mechanisms))
                },
            )
            .append_all(
                features
                    .bind
                    .then(|| Element::builder("bind", ns::BIND).build()),
            )
            .append_all(features.others)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_features() {
        let elem: Element = "<features xmlns='http://etherx.jabber.org/streams'/>"
            .parse()
            .unwrap();
        let features = StreamFeatures::try_from(elem).unwrap();
        assert!(!features.can_starttls());
        assert!(features.sasl_mechanisms.mechanisms.is_empty());
        assert!(!features.bind);
    }

    #[test]
    fn test_negotiation_features() {
        let elem: Element = "<features xmlns='http://etherx.jabber.org/streams'>
            <starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>
            <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>
                <mechanism>SCRAM-SHA-256</mechanism>
                <mechanism>SCRAM-SHA-1</mechanism>
            </mechanisms>
        </features>"
            .parse()
            .unwrap();
        let features = StreamFeatures::try_from(elem).unwrap();
        assert!(features.can_starttls());
        assert!(features.starttls.as_ref().unwrap().required);
        assert!(features.supports_sasl_mechanism("SCRAM-SHA-256"));
        assert!(!features.supports_sasl_mechanism("PLAIN"));
    }

    #[test]
    fn test_bind_round_trip() {
        let features = StreamFeatures {
            bind: true,
            ..Default::default()
        };
        let elem: Element = features.clone().into();
        assert_eq!(StreamFeatures::try_from(elem).unwrap(), features);
    }

    #[test]
    fn test_unknown_feature_is_kept() {
        let elem: Element = "<features xmlns='http://etherx.jabber.org/streams'>
            <sm xmlns='urn:xmpp:sm:3'/>
        </features>"
            .parse()
            .unwrap();
        let features = StreamFeatures::try_from(elem).unwrap();
        assert_eq!(features.others.len(), 1);
    }
}
