// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The stanza multiplexer: ordered routes, wrapping middleware, optional
//! fallback.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use minidom::IntoAttributeValue;
use quill_stanzas::iq::{Iq, IqType};
use quill_stanzas::message::Message;
use quill_stanzas::ns;
use quill_stanzas::presence::Presence;
use quill_stanzas::Element;

use crate::error::Error;
use crate::session::SessionHandle;

/// A typed incoming stanza.
#[derive(Debug, Clone)]
pub enum Stanza {
    /// A `<message/>` stanza.
    Message(Message),
    /// A `<presence/>` stanza.
    Presence(Presence),
    /// An `<iq/>` stanza.
    Iq(Iq),
}

impl Stanza {
    /// The stanza's element name.
    pub fn local_name(&self) -> &'static str {
        match self {
            Stanza::Message(_) => "message",
            Stanza::Presence(_) => "presence",
            Stanza::Iq(_) => "iq",
        }
    }

    /// The stanza's type attribute value; empty when absent.
    pub fn type_attr(&self) -> String {
        match self {
            Stanza::Message(message) => message.type_.to_string(),
            Stanza::Presence(presence) => presence
                .type_
                .clone()
                .into_attribute_value()
                .unwrap_or_default(),
            Stanza::Iq(iq) => (&iq.payload)
                .into_attribute_value()
                .expect("iq types always serialize"),
        }
    }

    /// The namespace routes match against: for iq stanzas the payload
    /// namespace (that is what extension handlers key on), for the others
    /// the stanza's own namespace.
    pub fn namespace(&self) -> String {
        match self {
            Stanza::Iq(iq) => match &iq.payload {
                IqType::Get(payload) | IqType::Set(payload) => payload.ns(),
                IqType::Result(Some(payload)) => payload.ns(),
                IqType::Result(None) | IqType::Error(_) => ns::DEFAULT_NS.to_owned(),
            },
            _ => ns::DEFAULT_NS.to_owned(),
        }
    }

    /// The stanza's id attribute, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Stanza::Message(message) => message.id.as_deref(),
            Stanza::Presence(presence) => presence.id.as_deref(),
            Stanza::Iq(iq) => Some(&iq.id),
        }
    }
}

impl From<Stanza> for Element {
    fn from(stanza: Stanza) -> Element {
        match stanza {
            Stanza::Message(message) => message.into(),
            Stanza::Presence(presence) => presence.into(),
            Stanza::Iq(iq) => iq.into(),
        }
    }
}

/// Handles a stanza routed to it.
#[async_trait]
pub trait StanzaHandler: Send + Sync {
    /// Processes one stanza. An error ends the session's read loop.
    async fn handle_stanza(&self, session: &SessionHandle, stanza: &Stanza)
        -> Result<(), Error>;
}

#[async_trait]
impl<F> StanzaHandler for F
where
    F: Fn(&SessionHandle, &Stanza) -> Result<(), Error> + Send + Sync,
{
    async fn handle_stanza(
        &self,
        session: &SessionHandle,
        stanza: &Stanza,
    ) -> Result<(), Error> {
        self(session, stanza)
    }
}

/// Wraps the handler a stanza was routed to.
///
/// Middleware registered first runs outermost; each layer decides whether to
/// continue with [`Next::run`].
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Processes one stanza, usually delegating to `next`.
    async fn handle(
        &self,
        session: &SessionHandle,
        stanza: &Stanza,
        next: Next<'_>,
    ) -> Result<(), Error>;
}

/// The continuation of a middleware chain.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn StanzaHandler,
}

impl<'a> Next<'a> {
    /// Runs the rest of the chain: the remaining middleware, then the
    /// matched handler.
    pub async fn run(self, session: &SessionHandle, stanza: &Stanza) -> Result<(), Error> {
        match self.middleware.split_first() {
            Some((middleware, rest)) => {
                middleware
                    .handle(
                        session,
                        stanza,
                        Next {
                            middleware: rest,
                            handler: self.handler,
                        },
                    )
                    .await
            }
            None => self.handler.handle_stanza(session, stanza).await,
        }
    }
}

/// What a route matches on. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePattern {
    /// The element local name (`message`, `presence`, `iq`); empty matches
    /// all.
    pub local: String,
    /// The namespace (payload namespace for iq); empty matches all.
    pub ns: String,
    /// The type attribute value; empty matches all.
    pub type_: String,
}

impl RoutePattern {
    /// A pattern matching every stanza of this element name.
    pub fn element(local: &str) -> RoutePattern {
        RoutePattern {
            local: local.to_owned(),
            ..RoutePattern::default()
        }
    }

    /// Restricts the pattern to one type attribute value.
    pub fn with_type(mut self, type_: &str) -> RoutePattern {
        self.type_ = type_.to_owned();
        self
    }

    /// Restricts the pattern to one namespace.
    pub fn with_ns(mut self, ns: &str) -> RoutePattern {
        self.ns = ns.to_owned();
        self
    }

    fn matches(&self, stanza: &Stanza) -> bool {
        (self.type_.is_empty() || self.type_ == stanza.type_attr())
            && (self.local.is_empty() || self.local == stanza.local_name())
            && (self.ns.is_empty() || self.ns == stanza.namespace())
    }
}

struct Route {
    pattern: RoutePattern,
    handler: Arc<dyn StanzaHandler>,
}

#[derive(Default)]
struct MuxInner {
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
    fallback: Option<Arc<dyn StanzaHandler>>,
}

/// Routes stanzas to handlers.
///
/// Routes are tried in registration order and the first match wins; if none
/// matches, the fallback runs; without a fallback the stanza is dropped
/// silently.
#[derive(Default)]
pub struct Mux {
    inner: RwLock<MuxInner>,
}

impl Mux {
    /// Creates an empty multiplexer.
    pub fn new() -> Mux {
        Mux::default()
    }

    /// Appends a route.
    pub async fn handle(&self, pattern: RoutePattern, handler: Arc<dyn StanzaHandler>) {
        self.inner.write().await.routes.push(Route { pattern, handler });
    }

    /// Appends a middleware layer; earlier layers run outermost.
    pub async fn wrap(&self, middleware: Arc<dyn Middleware>) {
        self.inner.write().await.middleware.push(middleware);
    }

    /// Sets the fallback handler for unrouted stanzas.
    pub async fn set_fallback(&self, handler: Arc<dyn StanzaHandler>) {
        self.inner.write().await.fallback = Some(handler);
    }

    /// Routes one stanza: finds the first matching route, wraps its handler
    /// in the middleware chain, and runs it.
    pub async fn dispatch(&self, session: &SessionHandle, stanza: &Stanza) -> Result<(), Error> {
        let inner = self.inner.read().await;
        let handler: &dyn StanzaHandler = match inner
            .routes
            .iter()
            .find(|route| route.pattern.matches(stanza))
        {
            Some(route) => route.handler.as_ref(),
            None => match &inner.fallback {
                Some(fallback) => fallback.as_ref(),
                None => return Ok(()),
            },
        };
        Next {
            middleware: &inner.middleware,
            handler,
        }
        .run(session, stanza)
        .await
    }
}
