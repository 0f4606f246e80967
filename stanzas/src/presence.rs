// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::ns;
use crate::util::error::Error;
use crate::Element;
use quill_jid::Jid;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::str::FromStr;

/// The type of a presence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PresenceType {
    /// This value is not an acceptable 'type' attribute, it is only used
    /// internally to signal the absence of 'type'.
    #[default]
    None,

    /// An error has occurred regarding processing of a previously sent
    /// presence stanza.
    Error,

    /// A request for an entity's current presence; SHOULD be generated only
    /// by a server on behalf of a user.
    Probe,

    /// The sender wishes to subscribe to the recipient's presence.
    Subscribe,

    /// The sender has allowed the recipient to receive their presence.
    Subscribed,

    /// The sender is no longer available for communication.
    Unavailable,

    /// The sender is unsubscribing from the receiver's presence.
    Unsubscribe,

    /// The subscription request has been denied or a previously granted
    /// subscription has been canceled.
    Unsubscribed,
}

impl FromStr for PresenceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<PresenceType, Error> {
        Ok(match s {
            "error" => PresenceType::Error,
            "probe" => PresenceType::Probe,
            "subscribe" => PresenceType::Subscribe,
            "subscribed" => PresenceType::Subscribed,
            "unavailable" => PresenceType::Unavailable,
            "unsubscribe" => PresenceType::Unsubscribe,
            "unsubscribed" => PresenceType::Unsubscribed,
            _ => {
                return Err(Error::ParseError(
                    "Invalid 'type' attribute on presence element.",
                ));
            }
        })
    }
}

impl minidom::IntoAttributeValue for PresenceType {
    fn into_attribute_value(self) -> Option<String> {
        Some(
            match self {
                PresenceType::None => return None,
                PresenceType::Error => "error",
                PresenceType::Probe => "probe",
                PresenceType::Subscribe => "subscribe",
                PresenceType::Subscribed => "subscribed",
                PresenceType::Unavailable => "unavailable",
                PresenceType::Unsubscribe => "unsubscribe",
                PresenceType::Unsubscribed => "unsubscribed",
            }
            .to_owned(),
        )
    }
}

generate_attribute!(
    /// Shows the availability of an entity.
    Show, "show", {
        /// The entity or resource is temporarily away.
        Away => "away",

        /// The entity or resource is actively interested in chatting.
        Chat => "chat",

        /// The entity or resource is busy (dnd = "Do Not Disturb").
        Dnd => "dnd",

        /// The entity or resource is away for an extended period (xa =
        /// "eXtended Away").
        Xa => "xa",
    }
);

type Lang = String;
type Status = String;

type Priority = i8;

/// The main structure representing the `<presence/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    /// The JID emitting this stanza.
    pub from: Option<Jid>,

    /// The recipient of this stanza.
    pub to: Option<Jid>,

    /// The @id attribute of this stanza.
    pub id: Option<String>,

    /// The type of this presence stanza.
    pub type_: PresenceType,

    /// The @xml:lang attribute of this stanza.
    pub lang: Option<String>,

    /// The availability of the sender.
    pub show: Option<Show>,

    /// A list of statuses, sorted per language.
    pub statuses: BTreeMap<Lang, Status>,

    /// The sender's resource priority, if negotiated.
    pub priority: Priority,

    /// A list of the extension payloads contained in this stanza.
    pub payloads: Vec<Element>,
}

impl Presence {
    /// Create a new presence of this type.
    pub fn new(type_: PresenceType) -> Presence {
        Presence {
            from: None,
            to: None,
            id: None,
            type_,
            lang: None,
            show: None,
            statuses: BTreeMap::new(),
            priority: 0i8,
            payloads: vec![],
        }
    }

    /// Create a presence without a type, which means available.
    pub fn available() -> Presence {
        Presence::new(PresenceType::None)
    }

    /// Builder method for setting the emitter of this stanza.
    pub fn with_from<J: Into<Jid>>(mut self, from: J) -> Presence {
        self.from = Some(from.into());
        self
    }

    /// Builder method for setting the recipient of this stanza.
    pub fn with_to<J: Into<Jid>>(mut self, to: J) -> Presence {
        self.to = Some(to.into());
        self
    }

    /// Builder method for setting the availability of this stanza.
    pub fn with_show(mut self, show: Show) -> Presence {
        self.show = Some(show);
        self
    }

    /// Builder method for setting the priority of this stanza.
    pub fn with_priority(mut self, priority: i8) -> Presence {
        self.priority = priority;
        self
    }

    /// Set the availability information of this presence.
    pub fn set_status<L, S>(&mut self, lang: L, status: S)
    where
        L: Into<Lang>,
        S: Into<Status>,
    {
        self.statuses.insert(lang.into(), status.into());
    }
}

impl TryFrom<Element> for Presence {
    type Error = Error;

    fn try_from(root: Element) -> Result<Presence, Error> {
        check_self!(root, "presence", DEFAULT_NS);
        let mut presence = Presence {
            from: get_attr!(root, "from", Option),
            to: get_attr!(root, "to", Option),
            id: get_attr!(root, "id", Option),
            type_: get_attr!(root, "type", Default),
            lang: get_attr!(root, "xml:lang", Option),
            show: None,
            statuses: BTreeMap::new(),
            priority: 0i8,
            payloads: vec![],
        };
        for elem in root.children() {
            if elem.is("show", ns::DEFAULT_NS) {
                if presence.show.is_some() {
                    return Err(Error::ParseError("More than one show element in a presence."));
                }
                check_no_attributes!(elem, "show");
                check_no_children!(elem, "show");
                presence.show = Some(Show::from_str(elem.text().as_ref())?);
            } else if elem.is("status", ns::DEFAULT_NS) {
                check_no_children!(elem, "status");
                check_no_unknown_attributes!(elem, "status", ["xml:lang"]);
                let lang: Lang = get_attr!(elem, "xml:lang", Default);
                if presence.statuses.insert(lang, elem.text()).is_some() {
                    return Err(Error::ParseError(
                        "Status element present twice for the same xml:lang.",
                    ));
                }
            } else if elem.is("priority", ns::DEFAULT_NS) {
                check_no_attributes!(elem, "priority");
                check_no_children!(elem, "priority");
                presence.priority = Priority::from_str(elem.text().as_ref())?;
            } else {
                presence.payloads.push(elem.clone());
            }
        }
        Ok(presence)
    }
}

impl From<Presence> for Element {
    fn from(presence: Presence) -> Element {
        Element::builder("presence", ns::DEFAULT_NS)
            .attr("from", presence.from)
            .attr("to", presence.to)
            .attr("id", presence.id)
            .attr("type", presence.type_)
            .attr("xml:lang", presence.lang)
            .append_all(presence.show.map(|show| {
                Element::builder("show", ns::DEFAULT_NS).append(format!("{}", show))
            }))
            .append_all(presence.statuses.into_iter().map(|(lang, status)| {
                Element::builder("status", ns::DEFAULT_NS)
                    .attr("xml:lang", if lang.is_empty() { None } else { Some(lang) })
                    .append(status)
            }))
            .append_all(if presence.priority == 0 {
                None
            } else {
                Some(
                    Element::builder("priority", ns::DEFAULT_NS)
                        .append(format!("{}", presence.priority)),
                )
            })
            .append_all(presence.payloads)
            .build()
    }
}
