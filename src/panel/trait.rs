use super::panel::Panel;
use crate::config::Config;
use crate::error::Result;
use crate::events::ToplevelSnapshot;
use crate::services::backend::{DryRunBackend, WaylandConnection};
use crate::services::ReadinessWatch;
use std::time::Duration;

/// Panel front-end over one window service, independent of the backend
#[async_trait::async_trait(?Send)]
pub trait PanelTrait {
    /// Зафиксированные окна реестра
    fn list(&self) -> Vec<ToplevelSnapshot>;

    /// Run the event loop and the command reader until quit, Ctrl-C or hang-up
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create a panel over the real compositor or the emulated one
pub async fn create_panel(config: &Config, dry_run: bool) -> Result<Box<dyn PanelTrait>> {
    if dry_run {
        let backend = DryRunBackend::with_default_windows();
        let watch = ReadinessWatch::timer(Duration::from_millis(config.dry_run.tick_ms));
        Ok(Box::new(Panel::new(config, backend, watch)?))
    } else {
        let connection = WaylandConnection::connect(&config.wayland).await?;
        let watch = ReadinessWatch::for_fd(connection.poll_fd()?)?;
        Ok(Box::new(Panel::new(config, connection, watch)?))
    }
}
