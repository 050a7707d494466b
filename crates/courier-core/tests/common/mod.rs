#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_core::crypto::{KeyMaterial, KeyStore};
use courier_core::dispatch::{Dispatcher, DispatcherFactory};
use courier_core::error::{CourierError, Result};
use courier_core::source::{Credentials, StaticJobSource, Target};
use courier_core::JobDeps;

/// How one scripted session behaves.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub auth: AuthOutcome,
    pub accept_submits: bool,
    /// Navigation to this target id returns a dispatch error.
    pub unreachable_target: Option<&'static str>,
    /// Every submit returns a dispatch error.
    pub submit_errors: bool,
    /// The first submit panics.
    pub panic_on_submit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accept,
    Reject,
    Fail,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            auth: AuthOutcome::Accept,
            accept_submits: true,
            unreachable_target: None,
            submit_errors: false,
            panic_on_submit: false,
        }
    }
}

/// Everything the dispatchers of one factory were asked to do.
#[derive(Debug, Default)]
pub struct Calls {
    pub created: usize,
    pub navigations: Vec<String>,
    pub submissions: Vec<String>,
    pub closes: usize,
}

/// Hands out dispatchers that follow queued scripts, then the default script.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    default: Script,
    queued: Arc<Mutex<VecDeque<Script>>>,
    calls: Arc<Mutex<Calls>>,
}

impl ScriptedFactory {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    pub fn with_queued(default: Script, queued: Vec<Script>) -> Self {
        Self {
            default,
            queued: Arc::new(Mutex::new(queued.into())),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().expect("calls lock")
    }
}

impl DispatcherFactory for ScriptedFactory {
    fn create(&self) -> Result<Box<dyn Dispatcher>> {
        let script = self
            .queued
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(self.default);
        self.calls.lock().expect("calls lock").created += 1;
        Ok(Box::new(ScriptedDispatcher {
            script,
            authenticated: false,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedDispatcher {
    script: Script,
    authenticated: bool,
    calls: Arc<Mutex<Calls>>,
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<bool> {
        match self.script.auth {
            AuthOutcome::Accept => {
                self.authenticated = true;
                Ok(true)
            }
            AuthOutcome::Reject => Ok(false),
            AuthOutcome::Fail => Err(CourierError::Auth("scripted failure".into())),
        }
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn navigate_to_target(&mut self, target_id: &str) -> Result<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .navigations
            .push(target_id.to_string());
        if self.script.unreachable_target == Some(target_id) {
            return Err(CourierError::Dispatch(format!("cannot open {}", target_id)));
        }
        Ok(())
    }

    async fn submit_text(&mut self, text: &str) -> Result<bool> {
        self.calls
            .lock()
            .expect("calls lock")
            .submissions
            .push(text.to_string());
        if self.script.panic_on_submit {
            panic!("scripted dispatcher panic");
        }
        if self.script.submit_errors {
            return Err(CourierError::Dispatch("scripted submit error".into()));
        }
        Ok(self.script.accept_submits)
    }

    async fn close(&mut self) {
        self.authenticated = false;
        self.calls.lock().expect("calls lock").closes += 1;
    }
}

/// Key store whose every operation fails.
pub struct BrokenKeyStore;

impl KeyStore for BrokenKeyStore {
    fn derive(&self, _password: &str) -> Result<Arc<KeyMaterial>> {
        Err(CourierError::Persistence("disk full".into()))
    }

    fn load(&self) -> Result<Arc<KeyMaterial>> {
        Err(CourierError::NotFound("no key".into()))
    }

    fn exists(&self) -> bool {
        false
    }
}

pub fn source(targets: &[(&str, &str)], messages: &[&str]) -> StaticJobSource {
    StaticJobSource::new(
        targets
            .iter()
            .map(|(name, id)| Target::new(*name, *id))
            .collect(),
        messages.iter().map(|m| m.to_string()).collect(),
        Credentials::new(serde_json::json!([{"name": "c_user", "value": "1"}])),
    )
}

pub fn deps(
    key_store: Arc<dyn KeyStore>,
    factory: &ScriptedFactory,
    source: StaticJobSource,
) -> JobDeps {
    JobDeps::new(
        key_store,
        Arc::new(factory.clone()),
        Arc::new(source),
        "test-password",
    )
}
