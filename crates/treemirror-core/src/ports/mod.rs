//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the mirror depends on but whose
//! implementations live elsewhere.
//!
//! ## Ports Overview
//!
//! - [`IStatusDisplay`] - Styled progress log and busy/idle/error state

pub mod status_display;

pub use status_display::{IStatusDisplay, TextStyle};
