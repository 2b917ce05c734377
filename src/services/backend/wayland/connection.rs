use super::dispatch::ProtocolState;
use crate::config::WaylandConfig;
use crate::error::{PanelError, Result};
use crate::panel_error;
use crate::services::backend::ProtocolBackend;
use crate::services::window_registry::WindowRegistry;
use std::io::ErrorKind;
use std::os::fd::OwnedFd;
use std::time::Duration;
use tokio::io::{unix::AsyncFd, Interest};
use tracing::{info, warn};
use wayland_client::{backend::WaylandError, Connection, EventQueue};
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_handle_v1::ZwlrForeignToplevelHandleV1;

/// Число round-trip'ов при старте: глобальные объекты, затем начальные окна
const DISCOVERY_ROUNDTRIPS: u32 = 2;

/// Соединение с композитором и его очередь событий
pub struct WaylandConnection {
    conn: Connection,
    queue: EventQueue<ProtocolState>,
    state: ProtocolState,
}

impl WaylandConnection {
    /// Подключиться по WAYLAND_DISPLAY и обнаружить seat и менеджер окон.
    ///
    /// Without a foreign-toplevel manager the connection is useless, so its
    /// absence is reported as `ConnectionUnavailable`.
    pub async fn connect(config: &WaylandConfig) -> Result<Self> {
        Self::from_connection(Connection::connect_to_env()?, config).await
    }

    /// То же поверх уже открытого соединения
    pub async fn from_connection(conn: Connection, config: &WaylandConfig) -> Result<Self> {
        let queue = conn.new_event_queue();
        let qh = queue.handle();
        conn.display().get_registry(&qh, ());

        let mut connection = Self {
            conn,
            queue,
            state: ProtocolState::new(config.manager_version, config.seat_version),
        };

        let timeout = Duration::from_millis(config.discovery_timeout_ms);
        tokio::time::timeout(timeout, connection.discover())
            .await
            .map_err(|_| {
                panel_error!(connection_unavailable, "композитор не ответил за {} мс", config.discovery_timeout_ms)
            })??;

        if connection.state.manager.is_none() {
            return PanelError::connection_unavailable(
                "композитор не поддерживает zwlr_foreign_toplevel_manager_v1",
            );
        }
        if connection.state.registry.seat().is_none() {
            warn!("wl_seat не найден: активация окон будет недоступна");
        }

        info!(
            "Подключено к композитору, окон при старте: {}",
            connection.state.registry.len()
        );
        Ok(connection)
    }

    /// Дескриптор сокета для ожидания готовности в цикле событий
    pub fn poll_fd(&self) -> Result<OwnedFd> {
        Ok(self.conn.backend().poll_fd().try_clone_to_owned()?)
    }

    async fn discover(&mut self) -> Result<()> {
        // SAFETY: AsyncFd владеет клоном дескриптора сокета до конца discover
        let fd = unsafe { AsyncFd::register_with_interest(self.poll_fd()?, Interest::READABLE) }
            .map_err(std::io::Error::from)?;
        let qh = self.queue.handle();

        for _ in 0..DISCOVERY_ROUNDTRIPS {
            let target = self.state.syncs_done + 1;
            self.conn.display().sync(&qh, ());
            self.flush()?;

            self.dispatch_pending()?;
            while self.state.syncs_done < target {
                let mut guard = fd.readable().await?;
                let closed = guard.ready().is_read_closed();
                guard.clear_ready();

                self.dispatch_pending()?;
                if closed && self.state.syncs_done < target {
                    return PanelError::connection_unavailable("композитор закрыл соединение");
                }
            }
        }

        Ok(())
    }
}

impl ProtocolBackend for WaylandConnection {
    type Handle = ZwlrForeignToplevelHandleV1;

    fn name(&self) -> &'static str {
        "wayland"
    }

    fn registry(&self) -> &WindowRegistry<ZwlrForeignToplevelHandleV1> {
        &self.state.registry
    }

    fn registry_mut(&mut self) -> &mut WindowRegistry<ZwlrForeignToplevelHandleV1> {
        &mut self.state.registry
    }

    /// Прочитать всё, что есть в сокете, и раздать события без блокировки
    fn dispatch_pending(&mut self) -> Result<()> {
        loop {
            self.queue.dispatch_pending(&mut self.state)?;

            let Some(guard) = self.queue.prepare_read() else {
                continue;
            };
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.conn.flush() {
            Ok(()) => Ok(()),
            // Остаток уйдёт при следующем flush
            Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
