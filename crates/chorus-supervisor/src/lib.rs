// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Worker lifecycle (spec §4.7): spawns one worker per agent participant,
//! restarts it on crash, and unloads it after its idle window elapses.
mod idle;
mod model;
mod supervisor;
mod types;

pub use idle::IdleTracker;
pub use model::context_window_for;
pub use supervisor::{Supervisor, VendorFactory};
pub use types::{StartupArgs, WorkerControl, WorkerId, WorkerOutcome};
