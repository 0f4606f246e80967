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
    /// The type of a message.
    MessageType, "type", {
        /// Standard instant messaging message.
        Chat => "chat",

        /// Notifies that an error happened.
        Error => "error",

        /// Standard group instant messaging message.
        Groupchat => "groupchat",

        /// Used by servers to notify users when things happen.
        Headline => "headline",

        /// This is an email-like message, it usually contains a subject.
        Normal => "normal",
    }, Default = Normal
);

type Lang = String;

generate_elem_id!(
    /// Represents one `<body/>` element, that is the free form text content of
    /// a message.
    Body,
    "body",
    DEFAULT_NS
);

generate_elem_id!(
    /// Defines the subject of a room, or of an email-like normal message.
    Subject,
    "subject",
    DEFAULT_NS
);

generate_elem_id!(
    /// A thread identifier, so that other people can specify to which message
    /// they are replying.
    Thread,
    "thread",
    DEFAULT_NS
);

/// The main structure representing the `<message/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The JID emitting this stanza.
    pub from: Option<Jid>,

    /// The recipient of this stanza.
    pub to: Option<Jid>,

    /// The @id attribute of this stanza, which is required in order to match
    /// a request with its response.
    pub id: Option<String>,

    /// The type of this message.
    pub type_: MessageType,

    /// The @xml:lang attribute of this stanza.
    pub lang: Option<String>,

    /// A list of bodies, sorted per language.
    pub bodies: BTreeMap<Lang, Body>,

    /// A list of subjects, sorted per language.
    pub subjects: BTreeMap<Lang, Subject>,

    /// An optional thread identifier, so that other people can reply directly
    /// to this message.
    pub thread: Option<Thread>,

    /// A list of the extension payloads contained in this stanza.
    pub payloads: Vec<Element>,
}

impl Message {
    /// Creates a new `<message/>` stanza of type Chat for the given recipient.
    pub fn new<J: Into<Option<Jid>>>(to: J) -> Message {
        Message {
            from: None,
            to: to.into(),
            id: None,
            type_: MessageType::Chat,
            lang: None,
            bodies: BTreeMap::new(),
            subjects: BTreeMap::new(),
            thread: None,
            payloads: vec![],
        }
    }

    /// Appends a body in the given language.
    pub fn with_body(mut self, lang: Lang, body: String) -> Message {
        self.bodies.insert(lang, Body(body));
        self
    }

    fn get_best<'a, T>(
        map: &'a BTreeMap<Lang, T>,
        preferred_langs: Vec<&str>,
    ) -> Option<(Lang, &'a T)> {
        if map.is_empty() {
            return None;
        }
        for lang in preferred_langs {
            if let Some(value) = map.get(lang) {
                return Some((Lang::from(lang), value));
            }
        }
        if let Some(value) = map.get("") {
            return Some((Lang::new(), value));
        }
        map.iter().map(|(lang, value)| (lang.clone(), value)).next()
    }

    /// Returns the best matching body from a list of languages.
    pub fn get_best_body(&self, preferred_langs: Vec<&str>) -> Option<(Lang, &Body)> {
        Message::get_best::<Body>(&self.bodies, preferred_langs)
    }

    /// Returns the best matching subject from a list of languages.
    pub fn get_best_subject(&self, preferred_langs: Vec<&str>) -> Option<(Lang, &Subject)> {
        Message::get_best::<Subject>(&self.subjects, preferred_langs)
    }
}

impl TryFrom<Element> for Message {
    type Error = Error;

    fn try_from(root: Element) -> Result<Message, Error> {
        check_self!(root, "message", DEFAULT_NS);
        let from = get_attr!(root, "from", Option);
        let to = get_attr!(root, "to", Option);
        let id = get_attr!(root, "id", Option);
        let type_ = get_attr!(root, "type", Default);
        let lang = get_attr!(root, "xml:lang", Option);
        let mut bodies = BTreeMap::new();
        let mut subjects = BTreeMap::new();
        let mut thread = None;
        let mut payloads = vec![];
        for elem in root.children() {
            if elem.is("body", ns::DEFAULT_NS) {
                check_no_children!(elem, "body");
                let lang: Lang = get_attr!(elem, "xml:lang", Default);
                let body = Body(elem.text());
                if bodies.insert(lang, body).is_some() {
                    return Err(Error::ParseError(
                        "Body element present twice for the same xml:lang.",
                    ));
                }
            } else if elem.is("subject", ns::DEFAULT_NS) {
                check_no_children!(elem, "subject");
                let lang: Lang = get_attr!(elem, "xml:lang", Default);
                let subject = Subject(elem.text());
                if subjects.insert(lang, subject).is_some() {
                    return Err(Error::ParseError(
                        "Subject element present twice for the same xml:lang.",
                    ));
                }
            } else if elem.is("thread", ns::DEFAULT_NS) {
                if thread.is_some() {
                    return Err(Error::ParseError("Thread element present twice."));
                }
                check_no_children!(elem, "thread");
                thread = Some(Thread(elem.text()));
            } else {
                payloads.push(elem.clone())
            }
        }
        Ok(Message {
            from,
            to,
            id,
            type_,
            lang,
            bodies,
            subjects,
            thread,
            payloads,
        })
    }
}

impl From<Message> for Element {
    fn from(message: Message) -> Element {
        Element::builder("message", ns::DEFAULT_NS)
            .attr("from", message.from)
            .attr("to", message.to)
            .attr("id", message.id)
            .attr("type", message.type_)
            .attr("xml:lang", message.lang)
            .append_all(message.subjects.into_iter().map(|(lang, subject)| {
                Element::builder("subject", ns::DEFAULT_NS)
                    .attr("xml:lang", if lang.is_empty() { None } else { Some(lang) })
                    .append(subject.0)
            }))
            .append_all(message.bodies.into_iter().map(|(lang, body)| {
                Element::builder("body", ns::DEFAULT_NS)
                    .attr("xml:lang", if lang.is_empty() { None } else { Some(lang) })
                    .append(body.0)
            }))
            .append_all(message.thread.map(Element::from))
            .append_all(message.payloads)
            .build()
    }
}
