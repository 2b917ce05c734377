use crate::error::Result;
use crate::services::window_registry::{RemoteToplevel, WindowRegistry};

/// Transport to a compositor that feeds a [`WindowRegistry`].
///
/// Implementations own the registry so that incoming events can be applied
/// while the transport is being drained.
pub trait ProtocolBackend {
    type Handle: RemoteToplevel;

    /// Имя бэкенда для логов
    fn name(&self) -> &'static str;

    fn registry(&self) -> &WindowRegistry<Self::Handle>;

    fn registry_mut(&mut self) -> &mut WindowRegistry<Self::Handle>;

    /// Non-blocking drain of every buffered incoming message
    fn dispatch_pending(&mut self) -> Result<()>;

    /// Send every queued outgoing request now
    fn flush(&mut self) -> Result<()>;
}
