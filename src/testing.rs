//! Scripted executor for unit tests.

use crate::executor::{Executor, ExitData, WatchStream};
use crate::protocol::CliCommand;
use crate::Result;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Executor answering from a table keyed by the rendered command line.
///
/// Unregistered commands succeed with an empty `items` list. Unregistered
/// watches never emit and never end.
#[derive(Default)]
pub(crate) struct FakeExecutor {
    responses: Mutex<HashMap<String, ExitData>>,
    calls: Mutex<Vec<String>>,
    watch_feeds: Mutex<HashMap<String, mpsc::UnboundedReceiver<String>>>,
    watched: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command: &str, exit: ExitData) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), exit);
    }

    pub fn respond_items(&self, command: &str, items: serde_json::Value) {
        self.respond(
            command,
            ExitData::success(serde_json::json!({ "items": items }).to_string()),
        );
    }

    /// Register a watch; lines sent on the returned channel are emitted by
    /// the stream, and dropping the sender ends it.
    pub fn watch_feed(&self, command: &str) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watch_feeds
            .lock()
            .unwrap()
            .insert(command.to_string(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| *c == command).count()
    }

    pub fn watched(&self) -> Vec<String> {
        self.watched.lock().unwrap().clone()
    }
}

impl Executor for FakeExecutor {
    fn execute<'a>(&'a self, command: &'a CliCommand) -> BoxFuture<'a, ExitData> {
        let line = command.to_shell_string();
        self.calls.lock().unwrap().push(line.clone());
        let exit = self
            .responses
            .lock()
            .unwrap()
            .get(&line)
            .cloned()
            .unwrap_or_else(|| ExitData::success(r#"{"items": []}"#));
        Box::pin(async move { exit })
    }

    fn watch(&self, command: &CliCommand) -> Result<WatchStream> {
        let line = command.to_shell_string();
        self.watched.lock().unwrap().push(line.clone());
        match self.watch_feeds.lock().unwrap().remove(&line) {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|l| (l, rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    fn execute_in_terminal<'a>(&'a self, command: &'a CliCommand) -> BoxFuture<'a, Result<()>> {
        self.calls.lock().unwrap().push(command.to_shell_string());
        Box::pin(async { Ok(()) })
    }
}
