// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Method registry: each participant declares a map `method_name ->
//! {description, parameter_schema, menu, handler}` (spec §4.4). Grounded on
//! `sven-tools::registry::ToolRegistry`'s `HashMap<String, Arc<dyn Tool>>`
//! shape, generalized from "tools" to any RPC-exposed method, unary or
//! streaming.
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use chorus_core::{CallId, ClientId};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The arguments a caller sent for one invocation.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub call_id: CallId,
    pub caller_id: ClientId,
    pub args: Value,
}

/// Terminal outcome of a method invocation.
#[derive(Debug, Clone)]
pub enum MethodOutcome {
    Ok(Value),
    Err(String),
}

/// A method is either unary (one terminal outcome) or streaming (zero or
/// more progress events on the given sender, then a terminal outcome) —
/// spec §4.4's "unary / streaming / menu" taxonomy, "menu" being a unary
/// method additionally flagged for UI surfacing rather than a distinct
/// handler shape.
#[derive(Clone)]
pub enum MethodHandler {
    Unary(Arc<dyn Fn(MethodCall) -> BoxFuture<'static, MethodOutcome> + Send + Sync>),
    Streaming(
        Arc<dyn Fn(MethodCall, mpsc::Sender<Value>) -> BoxFuture<'static, MethodOutcome> + Send + Sync>,
    ),
}

#[derive(Clone)]
pub struct MethodEntry {
    pub description: String,
    pub parameter_schema: Value,
    pub menu: bool,
    pub handler: MethodHandler,
}

/// Per-participant map of exposed methods. `ChannelHub`/tool discovery ask
/// each live participant for its `MethodRegistry` via the well-known
/// `list_methods` RPC; `chorus-tools` then reflects the result into the
/// canonical tool space.
#[derive(Default)]
pub struct MethodRegistry {
    methods: DashMap<String, MethodEntry>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    pub fn register(&self, method_name: impl Into<String>, entry: MethodEntry) {
        self.methods.insert(method_name.into(), entry);
    }

    pub fn get(&self, method_name: &str) -> Option<MethodEntry> {
        self.methods.get(method_name).map(|e| e.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Method names flagged `menu: true` — surfaced to the UI as
    /// user-invocable actions rather than peer-to-peer calls.
    pub fn menu_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .iter()
            .filter(|e| e.menu)
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_entry() -> MethodEntry {
        MethodEntry {
            description: "echoes args".into(),
            parameter_schema: json!({"type": "object"}),
            menu: false,
            handler: MethodHandler::Unary(Arc::new(|call| {
                Box::pin(async move { MethodOutcome::Ok(call.args) })
            })),
        }
    }

    #[test]
    fn register_and_get() {
        let reg = MethodRegistry::new();
        reg.register("echo", echo_entry());
        assert!(reg.get("echo").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let reg = MethodRegistry::new();
        reg.register("b", echo_entry());
        reg.register("a", echo_entry());
        assert_eq!(reg.names(), vec!["a", "b"]);
    }

    #[test]
    fn menu_names_filters_non_menu_methods() {
        let reg = MethodRegistry::new();
        let mut menu = echo_entry();
        menu.menu = true;
        reg.register("menu_action", menu);
        reg.register("internal", echo_entry());
        assert_eq!(reg.menu_names(), vec!["menu_action"]);
    }

    #[tokio::test]
    async fn unary_handler_invokes() {
        let reg = MethodRegistry::new();
        reg.register("echo", echo_entry());
        let entry = reg.get("echo").unwrap();
        let MethodHandler::Unary(f) = entry.handler else {
            panic!("expected unary handler");
        };
        let call = MethodCall {
            call_id: CallId::new(),
            caller_id: ClientId::new(),
            args: json!({"x": 1}),
        };
        match f(call).await {
            MethodOutcome::Ok(v) => assert_eq!(v, json!({"x": 1})),
            MethodOutcome::Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
