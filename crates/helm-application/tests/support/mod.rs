#![allow(dead_code)]

use async_trait::async_trait;
use helm_core::channel::{BackendChannel, BackendCommand, EventName, EventStream};
use helm_core::error::{HelmError, Result};
use helm_core::preference::{LastUsedOptions, PreferenceRepository};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Which invocations a scripted reply applies to.
enum Matcher {
    Exact(BackendCommand),
    Name(&'static str),
}

impl Matcher {
    fn matches(&self, command: &BackendCommand) -> bool {
        match self {
            Self::Exact(expected) => expected == command,
            Self::Name(name) => *name == command.name(),
        }
    }
}

struct Rule {
    matcher: Matcher,
    reply: std::result::Result<Value, String>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Scripted in-memory backend.
///
/// Each rule answers one matching invoke, in the order rules were added.
/// Unscripted invokes succeed with `null`.
#[derive(Default)]
pub struct MockChannel {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<BackendCommand>>,
    streams: Mutex<HashMap<EventName, mpsc::UnboundedSender<Value>>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, command: BackendCommand, value: Value) {
        self.push(Matcher::Exact(command), Ok(value), None);
    }

    pub fn reply_to(&self, name: &'static str, value: Value) {
        self.push(Matcher::Name(name), Ok(value), None);
    }

    pub fn fail(&self, name: &'static str, message: &str) {
        self.push(Matcher::Name(name), Err(message.to_string()), None);
    }

    /// Holds the matching invoke until the returned sender fires.
    pub fn gated(&self, command: BackendCommand, value: Value) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.push(Matcher::Exact(command), Ok(value), Some(gate));
        release
    }

    /// Holds the matching invoke until the returned sender fires, then fails it.
    pub fn gated_failure(&self, name: &'static str, message: &str) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.push(Matcher::Name(name), Err(message.to_string()), Some(gate));
        release
    }

    pub fn calls(&self) -> Vec<BackendCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<BackendCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.name() == name)
            .collect()
    }

    /// Pushes a raw payload on a subscribed stream.
    pub fn emit(&self, name: EventName, payload: Value) {
        let streams = self.streams.lock().unwrap();
        let sender = streams
            .get(&name)
            .unwrap_or_else(|| panic!("{name} was never subscribed"));
        let _ = sender.send(payload);
    }

    fn push(
        &self,
        matcher: Matcher,
        reply: std::result::Result<Value, String>,
        gate: Option<oneshot::Receiver<()>>,
    ) {
        self.rules.lock().unwrap().push(Rule {
            matcher,
            reply,
            gate,
        });
    }
}

#[async_trait]
impl BackendChannel for MockChannel {
    async fn invoke(&self, command: BackendCommand) -> Result<Value> {
        let rule = {
            self.calls.lock().unwrap().push(command.clone());
            let mut rules = self.rules.lock().unwrap();
            let index = rules
                .iter()
                .position(|rule| rule.matcher.matches(&command));
            index.map(|index| rules.remove(index))
        };
        let Some(rule) = rule else {
            return Ok(Value::Null);
        };
        if let Some(gate) = rule.gate {
            let _ = gate.await;
        }
        rule.reply
            .map_err(|message| HelmError::transport(command.name(), message))
    }

    fn send(&self, command: BackendCommand) -> Result<()> {
        self.calls.lock().unwrap().push(command);
        Ok(())
    }

    fn subscribe(&self, event: EventName) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().insert(event, tx);
        Ok(rx)
    }
}

/// Preference store that counts saves.
#[derive(Default)]
pub struct MemoryPreferences {
    pub stored: Mutex<LastUsedOptions>,
    pub saves: Mutex<usize>,
}

impl MemoryPreferences {
    pub fn with(options: LastUsedOptions) -> Self {
        Self {
            stored: Mutex::new(options),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl PreferenceRepository for MemoryPreferences {
    async fn load(&self) -> Result<LastUsedOptions> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, options: &LastUsedOptions) -> Result<()> {
        *self.stored.lock().unwrap() = options.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

/// Collects every update currently queued on `rx`.
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

/// Lets spawned tasks run until they are idle.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
