// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Two-device conversations through the full envelope stack.

use std::str::FromStr;
use std::sync::Arc;

use quill_jid::BareJid;
use quill_omemo::{Address, Error, Manager, MemoryStore};

async fn device(jid: &str, device_id: u32) -> (Address, Manager) {
    let address = Address::new(BareJid::from_str(jid).unwrap(), device_id);
    let manager = Manager::new(Arc::new(MemoryStore::new()), device_id)
        .await
        .unwrap();
    (address, manager)
}

#[tokio::test]
async fn first_contact_and_reply() {
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let (bob_addr, bob) = device("bob@example.org", 2).await;

    let bob_bundle = bob.generate_bundle(5).await.unwrap();
    alice.cache_bundle(bob_addr.clone(), bob_bundle).await;

    let message = alice.encrypt(&[bob_addr.clone()], b"Hello Bob!").await.unwrap();
    assert_eq!(message.sender_device_id, 1);
    assert_eq!(message.keys.len(), 1);
    assert!(message.keys[0].is_pre_key);

    let exchange = alice.pre_key_exchange(&bob_addr).await.unwrap();
    assert_eq!(exchange.pre_key_id, Some(1));
    let plaintext = bob
        .decrypt_pre_key_message(&alice_addr, &exchange, &message)
        .await
        .unwrap();
    assert_eq!(plaintext, b"Hello Bob!");

    let reply = bob.encrypt(&[alice_addr.clone()], b"Hi Alice!").await.unwrap();
    assert!(!reply.keys[0].is_pre_key);
    let plaintext = alice.decrypt(&bob_addr, &reply).await.unwrap();
    assert_eq!(plaintext, b"Hi Alice!");

    // Once answered, the session stops advertising pre-key material.
    let follow_up = alice.encrypt(&[bob_addr.clone()], b"still there?").await.unwrap();
    assert!(!follow_up.keys[0].is_pre_key);
    assert_eq!(
        bob.decrypt(&alice_addr, &follow_up).await.unwrap(),
        b"still there?"
    );
}

#[tokio::test]
async fn out_of_order_first_messages() {
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let (bob_addr, bob) = device("bob@example.org", 2).await;

    let bundle = bob.generate_bundle(3).await.unwrap();
    alice.cache_bundle(bob_addr.clone(), bundle).await;

    let a = alice.encrypt(&[bob_addr.clone()], b"A").await.unwrap();
    let b = alice.encrypt(&[bob_addr.clone()], b"B").await.unwrap();
    let c = alice.encrypt(&[bob_addr.clone()], b"C").await.unwrap();
    let exchange = alice.pre_key_exchange(&bob_addr).await.unwrap();

    assert_eq!(
        bob.decrypt_pre_key_message(&alice_addr, &exchange, &c)
            .await
            .unwrap(),
        b"C"
    );
    // The session now exists; late arrivals decrypt from skipped keys.
    assert_eq!(bob.decrypt(&alice_addr, &a).await.unwrap(), b"A");
    assert_eq!(bob.decrypt(&alice_addr, &b).await.unwrap(), b"B");

    // A second delivery of any of them is a replay.
    assert!(bob.decrypt(&alice_addr, &b).await.is_err());
}

#[tokio::test]
async fn consumed_pre_key_is_removed() {
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let (bob_addr, bob) = device("bob@example.org", 2).await;
    let (carol_addr, carol) = device("carol@example.org", 3).await;

    let bundle = bob.generate_bundle(2).await.unwrap();
    alice.cache_bundle(bob_addr.clone(), bundle.clone()).await;
    carol.cache_bundle(bob_addr.clone(), bundle).await;

    let from_alice = alice.encrypt(&[bob_addr.clone()], b"hi").await.unwrap();
    let exchange = alice.pre_key_exchange(&bob_addr).await.unwrap();
    bob.decrypt_pre_key_message(&alice_addr, &exchange, &from_alice)
        .await
        .unwrap();

    // Carol's copy of the bundle points at the same one-time pre-key, which
    // Bob has deleted; her first message can no longer be accepted.
    let from_carol = carol.encrypt(&[bob_addr.clone()], b"hello").await.unwrap();
    let exchange = carol.pre_key_exchange(&bob_addr).await.unwrap();
    assert!(bob
        .decrypt_pre_key_message(&carol_addr, &exchange, &from_carol)
        .await
        .is_err());
}

#[tokio::test]
async fn multi_recipient_fanout() {
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let (bob_addr, bob) = device("bob@example.org", 2).await;
    let (carol_addr, carol) = device("carol@example.org", 3).await;

    alice
        .cache_bundle(bob_addr.clone(), bob.generate_bundle(2).await.unwrap())
        .await;
    alice
        .cache_bundle(carol_addr.clone(), carol.generate_bundle(2).await.unwrap())
        .await;

    let message = alice
        .encrypt(&[bob_addr.clone(), carol_addr.clone()], b"group secret")
        .await
        .unwrap();
    assert_eq!(message.keys.len(), 2);

    let exchange = alice.pre_key_exchange(&bob_addr).await.unwrap();
    assert_eq!(
        bob.decrypt_pre_key_message(&alice_addr, &exchange, &message)
            .await
            .unwrap(),
        b"group secret"
    );
    let exchange = alice.pre_key_exchange(&carol_addr).await.unwrap();
    assert_eq!(
        carol
            .decrypt_pre_key_message(&alice_addr, &exchange, &message)
            .await
            .unwrap(),
        b"group secret"
    );

    // A device the message was not addressed to cannot use it.
    let (dave_addr, dave) = device("dave@example.org", 4).await;
    let _ = dave_addr;
    assert_eq!(
        dave.decrypt(&alice_addr, &message).await,
        Err(Error::InvalidMessage)
    );
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let (bob_addr, bob) = device("bob@example.org", 2).await;

    alice
        .cache_bundle(bob_addr.clone(), bob.generate_bundle(1).await.unwrap())
        .await;

    let mut message = alice.encrypt(&[bob_addr.clone()], b"payload").await.unwrap();
    message.payload[0] ^= 0x01;
    let exchange = alice.pre_key_exchange(&bob_addr).await.unwrap();
    assert_eq!(
        bob.decrypt_pre_key_message(&alice_addr, &exchange, &message)
            .await,
        Err(Error::InvalidMessage)
    );
}

#[tokio::test]
async fn identity_is_recorded_on_first_use() {
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let (bob_addr, bob) = device("bob@example.org", 2).await;

    alice
        .cache_bundle(bob_addr.clone(), bob.generate_bundle(1).await.unwrap())
        .await;
    alice.encrypt(&[bob_addr.clone()], b"x").await.unwrap();

    // Recorded at session establishment; matching key stays trusted, any
    // other key does not.
    assert!(alice
        .is_trusted(&bob_addr, &bob.identity_key())
        .await
        .unwrap());
    assert!(!alice
        .is_trusted(&bob_addr, &alice.identity_key())
        .await
        .unwrap());
    let _ = alice_addr;
}

#[tokio::test]
async fn sessions_survive_the_cache() {
    // Decrypting through a fresh manager backed by the same store exercises
    // the serialized-session path.
    let store = Arc::new(MemoryStore::new());
    let (alice_addr, alice) = device("alice@example.org", 1).await;
    let bob_addr = Address::new(BareJid::from_str("bob@example.org").unwrap(), 2);
    let bob = Manager::new(store.clone(), 2).await.unwrap();

    alice
        .cache_bundle(bob_addr.clone(), bob.generate_bundle(1).await.unwrap())
        .await;
    let first = alice.encrypt(&[bob_addr.clone()], b"one").await.unwrap();
    let exchange = alice.pre_key_exchange(&bob_addr).await.unwrap();
    bob.decrypt_pre_key_message(&alice_addr, &exchange, &first)
        .await
        .unwrap();

    let second = alice.encrypt(&[bob_addr.clone()], b"two").await.unwrap();
    let bob_reborn = Manager::new(store, 2).await.unwrap();
    assert_eq!(
        bob_reborn.decrypt(&alice_addr, &second).await.unwrap(),
        b"two"
    );
}
