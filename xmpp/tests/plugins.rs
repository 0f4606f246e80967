// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plugin lifecycle: dependency ordering, cycles and teardown.

mod common;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use quill_xmpp::mux::Mux;
use quill_xmpp::plugin::{InitParams, Plugin, PluginError, PluginManager};
use quill_xmpp::Error;

use common::ready_session;

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Recorded {
    name: &'static str,
    dependencies: &'static [&'static str],
    log: EventLog,
    fail_init: bool,
}

#[async_trait]
impl Plugin for Recorded {
    fn name(&self) -> &'static str {
        self.name
    }

    fn dependencies(&self) -> &'static [&'static str] {
        self.dependencies
    }

    async fn initialize(&self, _params: &InitParams) -> Result<(), Error> {
        if self.fail_init {
            return Err(Error::Handler(format!("{} failed", self.name)));
        }
        self.log.push(format!("init {}", self.name));
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.log.push(format!("close {}", self.name));
        Ok(())
    }
}

fn plugin(
    name: &'static str,
    dependencies: &'static [&'static str],
    log: &EventLog,
) -> Arc<dyn Plugin> {
    Arc::new(Recorded {
        name,
        dependencies,
        log: log.clone(),
        fail_init: false,
    })
}

#[tokio::test]
async fn dependency_order_and_reverse_close() {
    let log = EventLog::default();
    let mut manager = PluginManager::new();
    // Registration order deliberately contradicts the dependency order.
    manager.register(plugin("a", &["b"], &log)).unwrap();
    manager.register(plugin("b", &[], &log)).unwrap();

    let (session, _peer) = ready_session(Mux::new()).await;
    manager
        .initialize(session.handle(), Arc::new(Mux::new()))
        .await
        .unwrap();
    assert_eq!(manager.initialization_order(), ["b", "a"]);

    manager.close().await.unwrap();
    assert_eq!(
        log.events(),
        ["init b", "init a", "close a", "close b"]
    );
}

#[tokio::test]
async fn deep_chains_initialize_bottom_up() {
    let log = EventLog::default();
    let mut manager = PluginManager::new();
    manager.register(plugin("carbons", &["disco"], &log)).unwrap();
    manager.register(plugin("disco", &[], &log)).unwrap();
    manager
        .register(plugin("mam", &["disco", "carbons"], &log))
        .unwrap();

    let (session, _peer) = ready_session(Mux::new()).await;
    manager
        .initialize(session.handle(), Arc::new(Mux::new()))
        .await
        .unwrap();
    assert_eq!(manager.initialization_order(), ["disco", "carbons", "mam"]);
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let log = EventLog::default();
    let mut manager = PluginManager::new();
    manager.register(plugin("disco", &[], &log)).unwrap();
    assert_eq!(
        manager.register(plugin("disco", &[], &log)),
        Err(PluginError::Duplicate("disco".to_owned()))
    );
}

#[tokio::test]
async fn missing_dependency_fails_before_any_init() {
    let log = EventLog::default();
    let mut manager = PluginManager::new();
    manager.register(plugin("a", &["ghost"], &log)).unwrap();

    let (session, _peer) = ready_session(Mux::new()).await;
    let result = manager
        .initialize(session.handle(), Arc::new(Mux::new()))
        .await;
    assert!(result.is_err());
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn cycles_fail_before_any_init() {
    let log = EventLog::default();
    let mut manager = PluginManager::new();
    manager.register(plugin("a", &["b"], &log)).unwrap();
    manager.register(plugin("b", &["c"], &log)).unwrap();
    manager.register(plugin("c", &["a"], &log)).unwrap();

    let (session, _peer) = ready_session(Mux::new()).await;
    let result = manager
        .initialize(session.handle(), Arc::new(Mux::new()))
        .await;
    assert!(result.is_err());
    // The cycle is detected during the sort; no Initialize ran.
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn failed_init_aborts_and_close_unwinds_the_prefix() {
    let log = EventLog::default();
    let mut manager = PluginManager::new();
    manager.register(plugin("b", &[], &log)).unwrap();
    manager.register(Arc::new(Recorded {
        name: "a",
        dependencies: &["b"],
        log: log.clone(),
        fail_init: true,
    })).unwrap();
    manager.register(plugin("c", &["a"], &log)).unwrap();

    let (session, _peer) = ready_session(Mux::new()).await;
    let result = manager
        .initialize(session.handle(), Arc::new(Mux::new()))
        .await;
    assert!(result.is_err());
    // Only the successfully initialized prefix exists, and close unwinds
    // exactly that.
    assert_eq!(log.events(), ["init b"]);
    manager.close().await.unwrap();
    assert_eq!(log.events(), ["init b", "close b"]);
}

#[tokio::test]
async fn plugins_can_look_each_other_up() {
    struct Lookup {
        log: EventLog,
    }

    #[async_trait]
    impl Plugin for Lookup {
        fn name(&self) -> &'static str {
            "lookup"
        }

        fn dependencies(&self) -> &'static [&'static str] {
            &["disco"]
        }

        async fn initialize(&self, params: &InitParams) -> Result<(), Error> {
            let disco = params.get_plugin("disco").expect("dependency registered");
            self.log.push(format!("saw {}", disco.name()));
            assert!(params.get_plugin("Disco").is_none(), "lookup is case-sensitive");
            Ok(())
        }
    }

    let log = EventLog::default();
    let mut manager = PluginManager::new();
    manager.register(plugin("disco", &[], &log)).unwrap();
    manager
        .register(Arc::new(Lookup { log: log.clone() }))
        .unwrap();

    let (session, _peer) = ready_session(Mux::new()).await;
    manager
        .initialize(session.handle(), Arc::new(Mux::new()))
        .await
        .unwrap();
    assert_eq!(log.events(), ["init disco", "saw disco"]);
}
