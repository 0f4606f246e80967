// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session runtime behavior over an in-memory transport.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::SinkExt;

use quill_stanzas::{ns, Element};
use quill_xmpp::mux::{Mux, RoutePattern, Stanza};
use quill_xmpp::session::{SessionHandle, SessionState};
use quill_xmpp::{Error, Packet};

use common::{collect_stanzas, ready_session};

fn message_element(type_: &str, body: &str) -> Element {
    format!(
        "<message xmlns='jabber:client' type='{}'><body>{}</body></message>",
        type_, body
    )
    .parse()
    .unwrap()
}

#[tokio::test]
async fn specific_route_wins_and_runs_once() {
    let mux = Mux::new();
    let chat_hits = Arc::new(AtomicUsize::new(0));
    let any_hits = Arc::new(AtomicUsize::new(0));

    {
        let chat_hits = chat_hits.clone();
        mux.handle(
            RoutePattern::element("message").with_type("chat"),
            Arc::new(move |_: &SessionHandle, _: &Stanza| -> Result<(), Error> {
                chat_hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await;
    }
    {
        let any_hits = any_hits.clone();
        mux.handle(
            RoutePattern::element("message"),
            Arc::new(move |_: &SessionHandle, _: &Stanza| -> Result<(), Error> {
                any_hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await;
    }

    let (session, mut peer) = ready_session(mux).await;
    let serve = tokio::spawn(async move {
        let result = session.serve().await;
        (session, result)
    });

    peer.send(Packet::Stanza(message_element("chat", "hi")))
        .await
        .unwrap();
    peer.send(Packet::Stanza(message_element("normal", "news")))
        .await
        .unwrap();
    peer.send(Packet::StreamEnd).await.unwrap();

    let (_session, result) = serve.await.unwrap();
    result.unwrap();

    // The chat message hit only the specific route; the normal one fell
    // through to the broad route.
    assert_eq!(chat_hits.load(Ordering::SeqCst), 1);
    assert_eq!(any_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_elements_are_skipped() {
    let mux = Mux::new();
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = hits.clone();
        mux.set_fallback(Arc::new(move |_: &SessionHandle, _: &Stanza| -> Result<(), Error> {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .await;
    }

    let (session, mut peer) = ready_session(mux).await;
    let serve = tokio::spawn(async move { session.serve().await });

    let unknown: Element = "<sm xmlns='urn:xmpp:sm:3'/>".parse().unwrap();
    peer.send(Packet::Stanza(unknown)).await.unwrap();
    peer.send(Packet::Stanza(message_element("chat", "after")))
        .await
        .unwrap();
    peer.send(Packet::StreamEnd).await.unwrap();

    serve.await.unwrap().unwrap();
    // Only the message reached the mux; the unknown nonza was skipped, not
    // an error.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_error_ends_the_read_loop() {
    let mux = Mux::new();
    mux.set_fallback(Arc::new(|_: &SessionHandle, _: &Stanza| -> Result<(), Error> {
        Err(Error::Handler("boom".to_owned()))
    }))
    .await;

    let (session, mut peer) = ready_session(mux).await;
    let serve = tokio::spawn(async move { session.serve().await });

    peer.send(Packet::Stanza(message_element("chat", "hi")))
        .await
        .unwrap();

    let result = serve.await.unwrap();
    assert!(matches!(result, Err(Error::Handler(_))));
}

#[tokio::test]
async fn middleware_wraps_outermost_first() {
    use async_trait::async_trait;
    use quill_xmpp::mux::{Middleware, Next};
    use tokio::sync::Mutex;

    struct Tracer {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Tracer {
        async fn handle(
            &self,
            session: &SessionHandle,
            stanza: &Stanza,
            next: Next<'_>,
        ) -> Result<(), Error> {
            self.log.lock().await.push(format!("{}-in", self.name));
            let result = next.run(session, stanza).await;
            self.log.lock().await.push(format!("{}-out", self.name));
            result
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let mux = Mux::new();
    mux.wrap(Arc::new(Tracer {
        name: "outer",
        log: log.clone(),
    }))
    .await;
    mux.wrap(Arc::new(Tracer {
        name: "inner",
        log: log.clone(),
    }))
    .await;
    {
        let log = log.clone();
        mux.set_fallback(Arc::new(move |_: &SessionHandle, _: &Stanza| -> Result<(), Error> {
            log.try_lock().unwrap().push("handler".to_owned());
            Ok(())
        }))
        .await;
    }

    let (session, mut peer) = ready_session(mux).await;
    let serve = tokio::spawn(async move { session.serve().await });

    peer.send(Packet::Stanza(message_element("chat", "hi")))
        .await
        .unwrap();
    peer.send(Packet::StreamEnd).await.unwrap();
    serve.await.unwrap().unwrap();

    assert_eq!(
        *log.lock().await,
        ["outer-in", "inner-in", "handler", "inner-out", "outer-out"]
    );
}

#[tokio::test]
async fn concurrent_sends_do_not_interleave() {
    let (session, mut peer) = ready_session(Mux::new()).await;
    let session = Arc::new(session);

    // The peer drains concurrently so the senders never block on a full
    // transport buffer.
    let collector =
        tokio::spawn(async move { (collect_stanzas(&mut peer, 8 * 25).await, peer) });

    let mut tasks = Vec::new();
    for task_index in 0..8 {
        let handle = session.handle();
        tasks.push(tokio::spawn(async move {
            for message_index in 0..25 {
                let body: String = std::iter::repeat('x').take(512).collect();
                let elem: Element = format!(
                    "<message xmlns='jabber:client' id='{}-{}'><body>{}</body></message>",
                    task_index, message_index, body
                )
                .parse()
                .unwrap();
                handle.send_element(elem).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // The peer's decoder only yields whole, well-formed stanzas; any
    // interleaving of frames would break the parse.
    let (stanzas, _peer) = collector.await.unwrap();
    assert_eq!(stanzas.len(), 8 * 25);
    for stanza in &stanzas {
        assert!(stanza.is("message", ns::JABBER_CLIENT));
        assert_eq!(stanza.children().count(), 1);
    }
}

#[tokio::test]
async fn close_is_idempotent_and_fails_later_sends() {
    let (session, _peer) = ready_session(Mux::new()).await;

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(session.is_closed());

    let result = session.send_element(message_element("chat", "late")).await;
    assert!(matches!(result, Err(Error::Closed)));
    let result = session.send_raw(b"<presence/>".to_vec()).await;
    assert!(matches!(result, Err(Error::Closed)));
}

#[tokio::test]
async fn close_ends_the_serve_loop() {
    let (session, _peer) = ready_session(Mux::new()).await;
    let session = Arc::new(session);

    let serving = session.clone();
    let serve = tokio::spawn(async move { serving.serve().await });
    // Give the loop a chance to start waiting on the transport.
    tokio::task::yield_now().await;

    session.close().await.unwrap();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn state_flags_are_monotonic() {
    let (session, _peer) = ready_session(Mux::new()).await;
    assert!(session.state().contains(SessionState::READY));

    session.set_state(SessionState::SECURE);
    session.set_state(SessionState::AUTHENTICATED);
    // Setting one flag never clears another.
    assert!(session.state().contains(SessionState::READY));
    assert!(session.state().contains(SessionState::SECURE));
    assert!(session.state().contains(SessionState::AUTHENTICATED));
}

#[tokio::test]
async fn raw_bytes_pass_through_unescaped() {
    let (session, mut peer) = ready_session(Mux::new()).await;
    session
        .send_raw(b"<presence xmlns='jabber:client'/>".to_vec())
        .await
        .unwrap();
    let stanzas = collect_stanzas(&mut peer, 1).await;
    assert!(stanzas[0].is("presence", ns::JABBER_CLIENT));
}
