//! treemirror Core - Domain logic and configuration
//!
//! This crate contains the pieces of the mirror that have no I/O of their own:
//! - **Domain types** - `RelativePath`, `ActionKind`, `PathFilter`, `Outcome`
//! - **Coalescing algebra** - which pending actions make which others redundant
//! - **Port definitions** - `IStatusDisplay`, implemented by the display adapter
//! - **Configuration** - YAML and legacy arrow-list loading, validation
//!
//! # Architecture
//!
//! Follows the ports & adapters layout: the `treemirror-sync` crate drives the
//! filesystem through these types and reports to the display port, whose
//! implementation lives in the daemon.

pub mod config;
pub mod domain;
pub mod ports;
