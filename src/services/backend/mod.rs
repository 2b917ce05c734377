//! Protocol backends: responsibility and boundaries
//!
//! A backend owns the transport to the compositor and the registry it feeds.
//! `wayland` speaks zwlr_foreign_toplevel_management_v1 over the real socket,
//! `dry_run` emulates a compositor in-process for `--dry-run` and tests.
//! Backends MUST NOT notify consumers themselves: notifications are drained
//! from the registry by `WindowService` and delivered by `SharedWindowService`.

pub mod dry_run;
pub mod wayland;
mod r#trait;

pub use self::dry_run::DryRunBackend;
#[cfg(test)]
pub use self::dry_run::DryRunCompositor;
pub use self::r#trait::ProtocolBackend;
pub use self::wayland::WaylandConnection;
