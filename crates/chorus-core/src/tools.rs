// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// The fixed canonical tool names the substrate knows about (spec §6).
/// Vendor CLIs spell these differently (`str_replace_editor` vs `Edit`,
/// `bash` vs `Bash`); approval policy and tool routing are always expressed
/// in terms of this table, never a vendor's own spelling.
pub const CANONICAL_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "Bash",
    "Glob",
    "Grep",
    "WebFetch",
    "WebSearch",
    "NotebookEdit",
];

/// Tools that mutate state outside the conversation and therefore default
/// to requiring approval under `ApprovalPolicy::Ask` (spec §6).
pub const DESTRUCTIVE_TOOLS: &[&str] = &["Write", "Edit", "Bash", "Delete", "NotebookEdit"];

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("read", "Read");
        m.insert("read_file", "Read");
        m.insert("str_replace_editor", "Edit");
        m.insert("edit", "Edit");
        m.insert("write", "Write");
        m.insert("write_file", "Write");
        m.insert("bash", "Bash");
        m.insert("shell", "Bash");
        m.insert("glob", "Glob");
        m.insert("grep", "Grep");
        m.insert("search", "Grep");
        m.insert("web_fetch", "WebFetch");
        m.insert("fetch", "WebFetch");
        m.insert("web_search", "WebSearch");
        m.insert("notebook_edit", "NotebookEdit");
        m
    })
}

fn destructive_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| DESTRUCTIVE_TOOLS.iter().copied().collect())
}

/// Map a vendor-spelled tool name onto the canonical name, if known. Names
/// already in canonical form pass through unchanged; unrecognized names
/// return `None` so callers can decide whether to reject or pass through.
pub fn canonical_tool_name(vendor_name: &str) -> Option<&'static str> {
    if let Some(&canonical) = CANONICAL_TOOLS.iter().find(|&&c| c == vendor_name) {
        return Some(canonical);
    }
    alias_table().get(vendor_name.to_ascii_lowercase().as_str()).copied()
}

/// Whether a canonical tool name is destructive and therefore subject to
/// the approval gate under `ApprovalPolicy::Ask`.
pub fn is_destructive(canonical_name: &str) -> bool {
    destructive_set().contains(canonical_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_pass_through() {
        assert_eq!(canonical_tool_name("Bash"), Some("Bash"));
    }

    #[test]
    fn vendor_aliases_map_to_canonical() {
        assert_eq!(canonical_tool_name("str_replace_editor"), Some("Edit"));
        assert_eq!(canonical_tool_name("shell"), Some("Bash"));
    }

    #[test]
    fn unknown_tool_name_returns_none() {
        assert_eq!(canonical_tool_name("frobnicate"), None);
    }

    #[test]
    fn destructive_tools_require_approval_by_default() {
        assert!(is_destructive("Bash"));
        assert!(is_destructive("Edit"));
        assert!(!is_destructive("Read"));
        assert!(!is_destructive("Glob"));
    }
}
