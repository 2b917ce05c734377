//! WindowRegistry: responsibility and boundaries
//!
//! This module owns the set of toplevel records and is the ONLY place where
//! protocol events turn into visible window state. It knows nothing about the
//! transport (see `backend`) and nothing about rendering (see `tasklist`,
//! `show_desktop`). Consumers only ever see committed snapshots.

mod handle;
mod record;
mod registry;

pub use handle::RemoteToplevel;
pub use registry::WindowRegistry;

#[cfg(test)]
pub(crate) use handle::testing;
