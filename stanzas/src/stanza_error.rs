// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::ns;
use crate::util::error::Error;
use crate::Element;
use quill_jid::Jid;
use std::collections::BTreeMap;
use std::convert::TryFrom;

generate_attribute!(
    /// The type of the error.
    ErrorType, "type", {
        /// Retry after providing credentials.
        Auth => "auth",

        /// Do not retry (the error cannot be remedied).
        Cancel => "cancel",

        /// Proceed (the condition was only a warning).
        Continue => "continue",

        /// Retry after changing the data sent.
        Modify => "modify",

        /// Retry after waiting (the error is temporary).
        Wait => "wait",
    }
);

generate_element_enum!(
    /// List of valid error conditions.
    DefinedCondition, "condition", XMPP_STANZAS, {
        /// The sender has sent a stanza containing XML that does not conform
        /// to the appropriate schema or that cannot be processed.
        BadRequest => "bad-request",

        /// Access cannot be granted because an existing resource exists with
        /// the same name or address.
        Conflict => "conflict",

        /// The feature represented in the XML stanza is not implemented by
        /// the intended recipient or an intermediate server.
        FeatureNotImplemented => "feature-not-implemented",

        /// The requesting entity does not possess the necessary permissions
        /// to perform an action that only certain authorized roles or
        /// individuals are allowed to complete.
        Forbidden => "forbidden",

        /// The recipient or server can no longer be contacted at this
        /// address, typically on a permanent basis.
        Gone => "gone",

        /// The server has experienced a misconfiguration or other internal
        /// error that prevents it from processing the stanza.
        InternalServerError => "internal-server-error",

        /// The addressed JID or item requested cannot be found.
        ItemNotFound => "item-not-found",

        /// The sending entity has provided or communicated an XMPP address or
        /// aspect thereof that violates the address format rules.
        JidMalformed => "jid-malformed",

        /// The recipient or server understands the request but cannot process
        /// it because the request does not meet its criteria.
        NotAcceptable => "not-acceptable",

        /// The recipient or server does not allow any entity to perform the
        /// action.
        NotAllowed => "not-allowed",

        /// The sender needs to provide credentials before being allowed to
        /// perform the action, or has provided improper credentials.
        NotAuthorized => "not-authorized",

        /// The entity has violated some local service policy.
        PolicyViolation => "policy-violation",

        /// The intended recipient is temporarily unavailable.
        RecipientUnavailable => "recipient-unavailable",

        /// The recipient or server is redirecting requests for this
        /// information to another entity, typically in a temporary fashion.
        Redirect => "redirect",

        /// The requesting entity is not authorized to access the requested
        /// service because prior registration is necessary.
        RegistrationRequired => "registration-required",

        /// A remote server or service specified as part or all of the JID of
        /// the intended recipient does not exist or cannot be resolved.
        RemoteServerNotFound => "remote-server-not-found",

        /// A remote server or service was resolved but communications could
        /// not be established within a reasonable amount of time.
        RemoteServerTimeout => "remote-server-timeout",

        /// The server or recipient is busy or lacks the system resources
        /// necessary to service the request.
        ResourceConstraint => "resource-constraint",

        /// The server or recipient does not currently provide the requested
        /// service.
        ServiceUnavailable => "service-unavailable",

        /// The requesting entity is not authorized to access the requested
        /// service because a prior subscription is necessary.
        SubscriptionRequired => "subscription-required",

        /// The error condition is not one of those defined by the other
        /// conditions in this list.
        UndefinedCondition => "undefined-condition",

        /// The recipient or server understood the request but was not
        /// expecting it at this time.
        UnexpectedRequest => "unexpected-request",
    }
);

type Lang = String;

/// The representation of a stanza error.
#[derive(Debug, Clone, PartialEq)]
pub struct StanzaError {
    /// The type of this error.
    pub type_: ErrorType,

    /// The JID of the entity who set this error.
    pub by: Option<Jid>,

    /// One of the defined conditions for this error to happen.
    pub defined_condition: DefinedCondition,

    /// Human-readable description of this error.
    pub texts: BTreeMap<Lang, String>,

    /// A protocol-specific extension for this error.
    pub other: Option<Element>,
}

impl StanzaError {
    /// Create a new `<error/>` with the according content.
    pub fn new<L, T>(
        type_: ErrorType,
        defined_condition: DefinedCondition,
        lang: L,
        text: T,
    ) -> StanzaError
    where
        L: Into<Lang>,
        T: Into<String>,
    {
        StanzaError {
            type_,
            by: None,
            defined_condition,
            texts: {
                let mut map = BTreeMap::new();
                map.insert(lang.into(), text.into());
                map
            },
            other: None,
        }
    }
}

impl TryFrom<Element> for StanzaError {
    type Error = Error;

    fn try_from(elem: Element) -> Result<StanzaError, Error> {
        check_self!(elem, "error", DEFAULT_NS);
        check_no_unknown_attributes!(elem, "error", ["type", "by"]);

        let mut stanza_error = StanzaError {
            type_: get_attr!(elem, "type", Required),
            by: get_attr!(elem, "by", Option),
            defined_condition: DefinedCondition::UndefinedCondition,
            texts: BTreeMap::new(),
            other: None,
        };
        let mut defined_condition = None;

        for child in elem.children() {
            if child.is("text", ns::XMPP_STANZAS) {
                check_no_children!(child, "text");
                check_no_unknown_attributes!(child, "text", ["xml:lang"]);
                let lang = get_attr!(child, "xml:lang", Default);
                if stanza_error.texts.insert(lang, child.text()).is_some() {
                    return Err(Error::ParseError(
                        "Text element present twice for the same xml:lang.",
                    ));
                }
            } else if child.has_ns(ns::XMPP_STANZAS) {
                if defined_condition.is_some() {
                    return Err(Error::ParseError(
                        "Error must not have more than one defined-condition.",
                    ));
                }
                let condition = DefinedCondition::try_from(child.clone())?;
                defined_condition = Some(condition);
            } else {
                if stanza_error.other.is_some() {
                    return Err(Error::ParseError(
                        "Error must not have more than one other element.",
                    ));
                }
                stanza_error.other = Some(child.clone());
            }
        }
        stanza_error.defined_condition =
            defined_condition.ok_or(Error::ParseError("Error must have a defined-condition."))?;

        Ok(stanza_error)
    }
}

impl From<StanzaError> for Element {
    fn from(err: StanzaError) -> Element {
        Element::builder("error", ns::DEFAULT_NS)
            .attr("type", err.type_)
            .attr("by", err.by)
            .append(err.defined_condition)
            .append_all(err.texts.into_iter().map(|(lang, text)| {
                Element::builder("text", ns::XMPP_STANZAS)
                    .attr("xml:lang", lang)
                    .append(text)
            }))
            .append_all(err.other)
            .build()
    }
}
