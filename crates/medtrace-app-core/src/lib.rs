// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for MedTrace tools (config port, node settings).
//! Keeps the daemon and CLI adapters thin and storage-agnostic.

pub mod config;
pub mod node;
