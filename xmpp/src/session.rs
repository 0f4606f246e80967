// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The session runtime: one transport, one read loop, serialized writes.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::sync::{Mutex, Notify};
use tokio_util::codec::Framed;

use quill_jid::Jid;
use quill_stanzas::iq::Iq;
use quill_stanzas::message::Message;
use quill_stanzas::presence::Presence;
use quill_stanzas::Element;

use crate::codec::{Packet, XmppCodec};
use crate::error::{Error, ProtocolError};
use crate::mux::{Mux, Stanza};
use crate::stream::XmppStream;
use crate::transport::BoxTransport;

bitflags! {
    /// The negotiation state of a session.
    ///
    /// Flags are only ever set, never cleared; a state transition that would
    /// clear a flag is a new stream, not a state change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SessionState: u8 {
        /// The transport is encrypted.
        const SECURE = 1;
        /// SASL completed.
        const AUTHENTICATED = 1 << 1;
        /// A resource is bound; the session has a full JID.
        const BOUND = 1 << 2;
        /// Negotiation finished; stanzas may flow.
        const READY = 1 << 3;
        /// This side is the receiving (server) side of the stream.
        const SERVER = 1 << 4;
        /// The stream is a server-to-server stream.
        const S2S = 1 << 5;
    }
}

type Writer = SplitSink<Framed<BoxTransport, XmppCodec>, Packet>;
type Reader = SplitStream<Framed<BoxTransport, XmppCodec>>;

struct SessionInner {
    writer: Mutex<Writer>,
    state: AtomicU8,
    closed: AtomicBool,
    close_notify: Notify,
    local_jid: Option<Jid>,
    remote_jid: Option<Jid>,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        SessionState::from_bits_truncate(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, flags: SessionState) {
        self.state.fetch_or(flags.bits(), Ordering::SeqCst);
    }

    async fn send_packet(&self, packet: Packet) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        let mut writer = self.writer.lock().await;
        // Racing closes settle under the writer lock: either the whole
        // frame goes out before the close, or the send observes it.
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        writer.send(packet).await
    }

    async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.close_notify.notify_waiters();
        let mut writer = self.writer.lock().await;
        let _ = writer.send(Packet::StreamEnd).await;
        let _ = writer.close().await;
        Ok(())
    }
}

/// A capability surface onto a live session.
///
/// This is what plugins and stanza handlers get: they can write to the
/// stream and inspect the session, but they do not own it and cannot serve
/// or close it.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Encodes and sends an element, serialized with all other writers.
    pub async fn send_element(&self, element: Element) -> Result<(), Error> {
        self.inner.send_packet(Packet::Stanza(element)).await
    }

    /// Sends a typed stanza.
    pub async fn send(&self, stanza: Stanza) -> Result<(), Error> {
        self.send_element(stanza.into()).await
    }

    /// Copies pre-encoded bytes onto the wire, whole, under the write lock.
    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), Error> {
        self.inner.send_packet(Packet::Raw(bytes)).await
    }

    /// A snapshot of the session state flags.
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// ORs flags into the session state. Flags are never cleared.
    pub fn set_state(&self, flags: SessionState) {
        self.inner.set_state(flags)
    }

    /// The local JID this session is bound to.
    pub fn local_jid(&self) -> Option<&Jid> {
        self.inner.local_jid.as_ref()
    }

    /// The remote party's JID.
    pub fn remote_jid(&self) -> Option<&Jid> {
        self.inner.remote_jid.as_ref()
    }
}

/// An established XMPP session.
///
/// The session owns the transport. Writes from any task are serialized by
/// one async mutex; reads are driven by the single [`Session::serve`] loop.
pub struct Session {
    inner: Arc<SessionInner>,
    reader: Mutex<Option<Reader>>,
    mux: Arc<Mux>,
}

impl Session {
    /// Wraps a negotiated stream into a session.
    pub fn new(stream: XmppStream, state: SessionState, mux: Mux) -> Session {
        let local_jid = Some(stream.jid.clone());
        let (writer, reader) = stream.stream.split();
        Session {
            inner: Arc::new(SessionInner {
                writer: Mutex::new(writer),
                state: AtomicU8::new(state.bits()),
                closed: AtomicBool::new(false),
                close_notify: Notify::new(),
                local_jid,
                remote_jid: None,
            }),
            reader: Mutex::new(Some(reader)),
            mux: Arc::new(mux),
        }
    }

    /// Wraps a negotiated stream, also recording the remote JID.
    pub fn with_remote(stream: XmppStream, state: SessionState, mux: Mux, remote: Jid) -> Session {
        let session = Session::new(stream, state, mux);
        // The inner is not shared yet, but Arc::get_mut keeps this honest.
        let mut session = session;
        Arc::get_mut(&mut session.inner)
            .expect("session inner is unshared at construction")
            .remote_jid = Some(remote);
        session
    }

    /// A cloneable capability surface for handlers and plugins.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inner: self.inner.clone(),
        }
    }

    /// Sends a typed stanza.
    pub async fn send(&self, stanza: Stanza) -> Result<(), Error> {
        self.handle().send(stanza).await
    }

    /// Encodes and sends an element.
    pub async fn send_element(&self, element: Element) -> Result<(), Error> {
        self.inner.send_packet(Packet::Stanza(element)).await
    }

    /// Copies pre-encoded bytes onto the wire.
    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), Error> {
        self.inner.send_packet(Packet::Raw(bytes)).await
    }

    /// A snapshot of the session state flags.
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// ORs flags into the session state. Flags are never cleared.
    pub fn set_state(&self, flags: SessionState) {
        self.inner.set_state(flags)
    }

    /// The stanza multiplexer stanzas are dispatched through.
    pub fn mux(&self) -> &Mux {
        &self.mux
    }

    /// Runs the read loop: decodes incoming elements into typed stanzas and
    /// dispatches them through the mux.
    ///
    /// Unknown top-level elements are skipped. A handler error ends the loop
    /// and is returned. The loop also ends cleanly when the peer closes the
    /// stream or [`Session::close`] is called.
    pub async fn serve(&self) -> Result<(), Error> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(Error::InvalidState)?;
        let result = self.read_loop(&mut reader).await;
        *self.reader.lock().await = Some(reader);
        result
    }

    async fn read_loop(&self, reader: &mut Reader) -> Result<(), Error> {
        let handle = self.handle();
        loop {
            // Register for the close notification before checking the flag;
            // a close between the check and the select would otherwise be
            // lost and leave the loop parked on the transport.
            let notified = self.inner.close_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.closed.load(Ordering::SeqCst) {
                return Ok(());
            }
            let packet = tokio::select! {
                packet = reader.next() => packet,
                _ = &mut notified => return Ok(()),
            };
            if self.inner.closed.load(Ordering::SeqCst) {
                return Ok(());
            }
            let element = match packet {
                Some(Ok(Packet::Stanza(element))) => element,
                // Keep-alives; the decoder never yields raw packets.
                Some(Ok(Packet::Text(_))) | Some(Ok(Packet::Raw(_))) => continue,
                Some(Ok(Packet::StreamStart(_))) => {
                    return Err(ProtocolError::InvalidStreamStart.into());
                }
                Some(Ok(Packet::StreamEnd)) | None => return Ok(()),
                Some(Err(e)) => return Err(e),
            };
            let stanza = match element.name() {
                "message" => Stanza::Message(Message::try_from(element)?),
                "presence" => Stanza::Presence(Presence::try_from(element)?),
                "iq" => Stanza::Iq(Iq::try_from(element)?),
                other => {
                    debug!("skipping unknown element <{}/>", other);
                    continue;
                }
            };
            self.mux.dispatch(&handle, &stanza).await?;
        }
    }

    /// Closes the session.
    ///
    /// Idempotent; the first call sends the closing stream tag and shuts the
    /// transport. Any operation after that returns [`Error::Closed`].
    pub async fn close(&self) -> Result<(), Error> {
        self.inner.close().await
    }

    /// Whether [`Session::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}
