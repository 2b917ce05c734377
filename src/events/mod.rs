pub mod toplevel;

pub use toplevel::{HandleEvent, RegistryChange, StateFlags, ToplevelId, ToplevelSnapshot};
