//! Panel front-end: responsibility and boundaries
//!
//! Hosts the tasklist and show-desktop consumers on top of the one shared
//! `WindowService` and turns textual commands into service calls. It MUST NOT
//! touch protocol objects directly: every request goes through the service,
//! which flushes it and handles connection loss.

mod command;
mod panel;
mod r#trait;

pub use self::r#trait::{create_panel, PanelTrait};
