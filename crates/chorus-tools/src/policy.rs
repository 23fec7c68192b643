// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Approval gating (spec §4.5). Kept the teacher's three-way
//! `ApprovalPolicy` result type and its glob-to-regex pattern compiler from
//! `sven-tools::policy::ToolPolicy`, but retargeted `decide` from "match a
//! shell command string" to "match a canonical tool name against an
//! autonomy level", since that's the axis spec §4.5 actually gates on.
//! Config-level allow/deny glob overrides still take priority, so an
//! operator can carve out exceptions without changing autonomy level.
use regex::Regex;

use chorus_config::ToolsConfig;
use chorus_core::is_destructive;

/// Per-call approval outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    Auto,
    Ask,
    Deny,
}

/// The three autonomy levels spec §4.5 defines, in ascending trust order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AutonomyLevel {
    Restricted = 0,
    Standard = 1,
    Autonomous = 2,
}

impl AutonomyLevel {
    pub fn from_str_or_standard(s: &str) -> Self {
        match s {
            "restricted" => AutonomyLevel::Restricted,
            "autonomous" => AutonomyLevel::Autonomous,
            _ => AutonomyLevel::Standard,
        }
    }
}

/// Decides whether a tool invocation runs automatically, prompts the user,
/// or is denied outright.
#[derive(Debug)]
pub struct ApprovalGate {
    auto_patterns: Vec<Regex>,
    deny_patterns: Vec<Regex>,
}

impl ApprovalGate {
    pub fn from_config(cfg: &ToolsConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| glob_to_regex(p)).collect()
        };
        Self {
            auto_patterns: compile(&cfg.auto_approve_patterns),
            deny_patterns: compile(&cfg.deny_patterns),
        }
    }

    /// `tool` is a canonical name (`Read`, `Bash`, ...). Deny patterns win
    /// unconditionally; then the three autonomy levels apply
    /// (`restricted` asks for everything, `standard` asks only for the
    /// destructive set, `autonomous` auto-approves); auto-approve patterns
    /// are consulted last as a narrow escape hatch out of `Ask`.
    pub fn decide(&self, tool: &str, level: AutonomyLevel) -> ApprovalPolicy {
        if self.deny_patterns.iter().any(|re| re.is_match(tool)) {
            return ApprovalPolicy::Deny;
        }

        let gated_by_level = match level {
            AutonomyLevel::Restricted => true,
            AutonomyLevel::Standard => is_destructive(tool),
            AutonomyLevel::Autonomous => false,
        };

        if !gated_by_level {
            return ApprovalPolicy::Auto;
        }

        if self.auto_patterns.iter().any(|re| re.is_match(tool)) {
            return ApprovalPolicy::Auto;
        }

        ApprovalPolicy::Ask
    }
}

/// Convert a simple shell-glob pattern (`*` / `?`) to a `Regex`.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => {
                for esc in regex::escape(&c.to_string()).chars() {
                    re.push(esc);
                }
            }
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_with(auto: &[&str], deny: &[&str]) -> ApprovalGate {
        ApprovalGate::from_config(&ToolsConfig {
            auto_approve_patterns: auto.iter().map(|s| s.to_string()).collect(),
            deny_patterns: deny.iter().map(|s| s.to_string()).collect(),
            ..ToolsConfig::default()
        })
    }

    #[test]
    fn restricted_asks_for_everything() {
        let gate = gate_with(&[], &[]);
        assert_eq!(
            gate.decide("Read", AutonomyLevel::Restricted),
            ApprovalPolicy::Ask
        );
        assert_eq!(
            gate.decide("Bash", AutonomyLevel::Restricted),
            ApprovalPolicy::Ask
        );
    }

    #[test]
    fn standard_auto_approves_non_destructive() {
        let gate = gate_with(&[], &[]);
        assert_eq!(
            gate.decide("Read", AutonomyLevel::Standard),
            ApprovalPolicy::Auto
        );
        assert_eq!(
            gate.decide("Glob", AutonomyLevel::Standard),
            ApprovalPolicy::Auto
        );
    }

    #[test]
    fn standard_asks_for_destructive_set() {
        let gate = gate_with(&[], &[]);
        for tool in ["Write", "Edit", "Bash", "Delete", "NotebookEdit"] {
            assert_eq!(
                gate.decide(tool, AutonomyLevel::Standard),
                ApprovalPolicy::Ask,
                "{tool} should require approval under standard autonomy"
            );
        }
    }

    #[test]
    fn autonomous_approves_everything_including_destructive() {
        let gate = gate_with(&[], &[]);
        assert_eq!(
            gate.decide("Bash", AutonomyLevel::Autonomous),
            ApprovalPolicy::Auto
        );
    }

    #[test]
    fn deny_pattern_overrides_autonomous() {
        let gate = gate_with(&[], &["Bash"]);
        assert_eq!(
            gate.decide("Bash", AutonomyLevel::Autonomous),
            ApprovalPolicy::Deny
        );
    }

    #[test]
    fn auto_approve_pattern_escapes_standard_ask() {
        let gate = gate_with(&["Bash"], &[]);
        assert_eq!(
            gate.decide("Bash", AutonomyLevel::Standard),
            ApprovalPolicy::Auto
        );
    }

    #[test]
    fn autonomy_level_from_config_string() {
        assert_eq!(
            AutonomyLevel::from_str_or_standard("restricted"),
            AutonomyLevel::Restricted
        );
        assert_eq!(
            AutonomyLevel::from_str_or_standard("autonomous"),
            AutonomyLevel::Autonomous
        );
        assert_eq!(
            AutonomyLevel::from_str_or_standard("garbage"),
            AutonomyLevel::Standard
        );
    }
}
