// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
fn default_true() -> bool {
    true
}

fn default_replay_window() -> usize {
    10_000
}

fn default_rpc_timeout_ms() -> u64 {
    30_000
}

fn default_discovery_timeout_ms() -> u64 {
    1_500
}

fn default_roster_debounce_ms() -> u64 {
    100
}

fn default_missed_context_max_chars() -> usize {
    8_000
}

fn default_context_warn_fraction() -> f32 {
    0.8
}

fn default_idle_grace_secs() -> u64 {
    10
}

fn default_activity_grace_secs() -> u64 {
    120
}

fn default_max_frame_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_autonomy() -> String {
    "standard".into()
}

fn default_stream_no_progress_timeout_ms() -> u64 {
    120_000
}

fn default_tool_execution_timeout_ms() -> u64 {
    120_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Channel hub tuning (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Persisted events retained per channel before oldest-first eviction
    /// (resolved Open Question #1, default 10,000).
    #[serde(default = "default_replay_window")]
    pub replay_window: usize,
    /// Window within which bursts of roster mutations are coalesced into
    /// one broadcast.
    #[serde(default = "default_roster_debounce_ms")]
    pub roster_debounce_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            replay_window: default_replay_window(),
            roster_debounce_ms: default_roster_debounce_ms(),
        }
    }
}

/// RPC call lifecycle tuning (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Unary call timeout before the dispatcher cancels the callee and
    /// resolves the caller's future to `Cancelled(Timeout)`.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

/// Tool discovery and approval tuning (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-participant timeout for the `list_methods` discovery call;
    /// participants that don't respond in time are skipped.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    /// Default autonomy level applied to newly created sessions:
    /// "restricted" | "standard" | "autonomous".
    #[serde(default = "default_autonomy")]
    pub default_autonomy: String,
    /// Canonical tool-name glob patterns always auto-approved, regardless
    /// of autonomy level (e.g. `["Read", "Glob", "Grep"]`).
    #[serde(default)]
    pub auto_approve_patterns: Vec<String>,
    /// Canonical tool-name glob patterns always denied outright. Takes
    /// priority over autonomy level and `auto_approve_patterns`.
    #[serde(default)]
    pub deny_patterns: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_discovery_timeout_ms(),
            default_autonomy: default_autonomy(),
            auto_approve_patterns: Vec::new(),
            deny_patterns: Vec::new(),
        }
    }
}

/// Agent runtime tuning (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on the missed-context preamble built for a reconnecting
    /// participant.
    #[serde(default = "default_missed_context_max_chars")]
    pub missed_context_max_chars: usize,
    /// Fraction of the model's context window at which a `ContextTracker`
    /// warning `AgentEvent` is published.
    #[serde(default = "default_context_warn_fraction")]
    pub context_warn_fraction: f32,
    /// No-progress watchdog on the vendor event stream: if no event arrives
    /// within this window, the turn is aborted with a surfaced error
    /// (spec §5's vendor SDK turn no-progress watchdog).
    #[serde(default = "default_stream_no_progress_timeout_ms")]
    pub stream_no_progress_timeout_ms: u64,
    /// Upper bound on a single tool execution before it's treated as hung
    /// and surfaced as a failed call (spec §5's tool execution timeout).
    #[serde(default = "default_tool_execution_timeout_ms")]
    pub tool_execution_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            missed_context_max_chars: default_missed_context_max_chars(),
            context_warn_fraction: default_context_warn_fraction(),
            stream_no_progress_timeout_ms: default_stream_no_progress_timeout_ms(),
            tool_execution_timeout_ms: default_tool_execution_timeout_ms(),
        }
    }
}

/// Worker lifecycle tuning (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Seconds of no `panel`-type participant in the roster before a
    /// worker becomes eligible for idle unload.
    #[serde(default = "default_idle_grace_secs")]
    pub idle_grace_secs: u64,
    /// Seconds since the worker's last processing activity before it is
    /// eligible for idle unload — both this and `idle_grace_secs` must hold.
    #[serde(default = "default_activity_grace_secs")]
    pub activity_grace_secs: u64,
    /// Whether a crashed worker is automatically respawned with the same
    /// `StartupArgs`.
    #[serde(default = "default_true")]
    pub restart_on_crash: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            idle_grace_secs: default_idle_grace_secs(),
            activity_grace_secs: default_activity_grace_secs(),
            restart_on_crash: true,
        }
    }
}

/// Wire-level tuning (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Frames larger than this are rejected with `PayloadTooLarge` without
    /// tearing down the connection.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Bind address for the WebSocket listener, e.g. `"127.0.0.1:7420"`.
    #[serde(default)]
    pub listen_addr: Option<String>,
    /// Bind address for the native (CBOR-over-WebSocket) listener, for
    /// non-browser clients that want `codec::encode_frame`'s denser wire
    /// format instead of JSON. Disabled unless set.
    #[serde(default)]
    pub native_listen_addr: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            listen_addr: None,
            native_listen_addr: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.broker.replay_window, 10_000);
        assert_eq!(cfg.tools.discovery_timeout_ms, 1_500);
        assert_eq!(cfg.agent.missed_context_max_chars, 8_000);
        assert_eq!(cfg.agent.context_warn_fraction, 0.8);
        assert_eq!(cfg.agent.stream_no_progress_timeout_ms, 120_000);
        assert_eq!(cfg.agent.tool_execution_timeout_ms, 120_000);
        assert_eq!(cfg.tools.default_autonomy, "standard");
    }

    #[test]
    fn partial_yaml_layer_falls_back_to_defaults() {
        let cfg: Config = serde_yaml::from_str("broker:\n  replay_window: 500").unwrap();
        assert_eq!(cfg.broker.replay_window, 500);
        assert_eq!(cfg.broker.roster_debounce_ms, 100);
        assert_eq!(cfg.supervisor.idle_grace_secs, 10);
        assert_eq!(cfg.supervisor.activity_grace_secs, 120);
    }
}
