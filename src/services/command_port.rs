use crate::error::{PanelError, Result};
use crate::events::ToplevelId;
use crate::services::window_registry::{RemoteToplevel, WindowRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Как «восстановить все» трактует окна, свёрнутые до «свернуть все»
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestorePolicy {
    /// Активировать каждое окно
    #[default]
    ActivateAll,
    /// Активировать только окна, которые не были свёрнуты в момент «свернуть все»
    Snapshot,
}

impl fmt::Display for RestorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorePolicy::ActivateAll => write!(f, "activate-all"),
            RestorePolicy::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Состояние окон в момент «свернуть все»
#[derive(Debug, Clone, Default)]
struct MinimizeSnapshot {
    already_minimized: HashSet<ToplevelId>,
    active: Option<ToplevelId>,
}

/// Translates panel intents into protocol requests.
///
/// Requests are only queued here; the owning service flushes them.
#[derive(Debug, Default)]
pub struct CommandPort {
    policy: RestorePolicy,
    snapshot: Option<MinimizeSnapshot>,
}

impl CommandPort {
    pub fn new(policy: RestorePolicy) -> Self {
        Self { policy, snapshot: None }
    }

    pub fn activate<H: RemoteToplevel>(&self, registry: &WindowRegistry<H>, id: ToplevelId) -> Result<()> {
        let handle = Self::lookup(registry, id)?;
        let Some(seat) = registry.seat() else {
            warn!("Активация окна {} пропущена: seat не обнаружен", id);
            return Err(PanelError::NoSeat);
        };

        debug!("Запрос activate для окна {}", id);
        handle.request_activate(seat);
        Ok(())
    }

    pub fn minimize<H: RemoteToplevel>(&self, registry: &WindowRegistry<H>, id: ToplevelId) -> Result<()> {
        let handle = Self::lookup(registry, id)?;

        debug!("Запрос set_minimized для окна {}", id);
        handle.request_minimize();
        Ok(())
    }

    /// Свернуть все окна. Возвращает число отправленных запросов.
    pub fn minimize_all<H: RemoteToplevel>(&mut self, registry: &WindowRegistry<H>) -> usize {
        if self.policy == RestorePolicy::Snapshot {
            let already_minimized = registry
                .records()
                .filter(|r| r.is_minimized())
                .map(|r| r.id())
                .collect();
            self.snapshot = Some(MinimizeSnapshot {
                already_minimized,
                active: registry.active(),
            });
        }

        let mut sent = 0;
        for record in registry.records() {
            if let Some(handle) = record.handle() {
                handle.request_minimize();
                sent += 1;
            }
        }

        info!("Свернуть все: отправлено {} запросов", sent);
        sent
    }

    /// Восстановить окна согласно политике. Возвращает число отправленных запросов.
    pub fn restore_all<H: RemoteToplevel>(&mut self, registry: &WindowRegistry<H>) -> Result<usize> {
        let Some(seat) = registry.seat() else {
            warn!("Восстановление окон пропущено: seat не обнаружен");
            return Err(PanelError::NoSeat);
        };

        let snapshot = match self.policy {
            RestorePolicy::Snapshot => self.snapshot.take(),
            RestorePolicy::ActivateAll => None,
        };

        let mut targets: Vec<ToplevelId> = registry
            .records()
            .map(|r| r.id())
            .filter(|id| {
                snapshot
                    .as_ref()
                    .map_or(true, |s| !s.already_minimized.contains(id))
            })
            .collect();

        // Ранее активное окно активируем последним, чтобы фокус вернулся к нему
        if let Some(active) = snapshot.as_ref().and_then(|s| s.active) {
            if let Some(pos) = targets.iter().position(|id| *id == active) {
                let id = targets.remove(pos);
                targets.push(id);
            }
        }

        let mut sent = 0;
        for id in targets {
            if let Some(handle) = registry.get(id).and_then(|r| r.handle()) {
                handle.request_activate(seat);
                sent += 1;
            }
        }

        info!("Восстановить все ({}): отправлено {} запросов", self.policy, sent);
        Ok(sent)
    }

    fn lookup<H: RemoteToplevel>(registry: &WindowRegistry<H>, id: ToplevelId) -> Result<&H> {
        registry
            .get(id)
            .and_then(|r| r.handle())
            .ok_or(PanelError::UnknownHandle(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HandleEvent, StateFlags};
    use crate::services::window_registry::testing::*;

    fn registry(log: &RequestLog, seat: bool) -> WindowRegistry<FakeHandle> {
        let mut registry = WindowRegistry::new();
        for id in 1..=3 {
            registry.insert(FakeHandle::new(id, log));
        }
        if seat {
            registry.set_seat(());
        }
        registry
    }

    fn set_flags(registry: &mut WindowRegistry<FakeHandle>, id: u32, flags: StateFlags) {
        registry.apply(ToplevelId(id), HandleEvent::State(flags)).unwrap();
        registry.apply(ToplevelId(id), HandleEvent::Done).unwrap();
    }

    #[test]
    fn test_activate_and_minimize_route_to_handle() {
        let log = RequestLog::default();
        let registry = registry(&log, true);
        let port = CommandPort::default();

        port.activate(&registry, ToplevelId(2)).unwrap();
        port.minimize(&registry, ToplevelId(3)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![Request::Activate(ToplevelId(2)), Request::Minimize(ToplevelId(3))]
        );
    }

    #[test]
    fn test_unknown_handle_is_rejected() {
        let log = RequestLog::default();
        let mut registry = registry(&log, true);
        registry.apply(ToplevelId(1), HandleEvent::Closed).unwrap();
        log.borrow_mut().clear();

        let port = CommandPort::default();
        assert!(matches!(
            port.activate(&registry, ToplevelId(1)),
            Err(PanelError::UnknownHandle(ToplevelId(1)))
        ));
        assert!(matches!(
            port.minimize(&registry, ToplevelId(42)),
            Err(PanelError::UnknownHandle(ToplevelId(42)))
        ));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_activate_without_seat_is_dropped() {
        let log = RequestLog::default();
        let registry = registry(&log, false);
        let mut port = CommandPort::default();

        assert!(matches!(port.activate(&registry, ToplevelId(1)), Err(PanelError::NoSeat)));
        assert!(matches!(port.restore_all(&registry), Err(PanelError::NoSeat)));
        assert!(log.borrow().is_empty());

        // Сворачивание seat не требует
        assert_eq!(port.minimize_all(&registry), 3);
    }

    #[test]
    fn test_activate_all_policy_restores_every_window() {
        let log = RequestLog::default();
        let mut registry = registry(&log, true);
        set_flags(&mut registry, 2, StateFlags::default().with_minimized(true));
        let mut port = CommandPort::new(RestorePolicy::ActivateAll);

        assert_eq!(port.minimize_all(&registry), 3);
        assert_eq!(port.restore_all(&registry).unwrap(), 3);

        let activated: Vec<Request> = log.borrow()[3..].to_vec();
        assert_eq!(
            activated,
            vec![
                Request::Activate(ToplevelId(1)),
                Request::Activate(ToplevelId(2)),
                Request::Activate(ToplevelId(3)),
            ]
        );
    }

    #[test]
    fn test_snapshot_policy_skips_previously_minimized() {
        let log = RequestLog::default();
        let mut registry = registry(&log, true);
        set_flags(&mut registry, 1, StateFlags::default().with_activated(true));
        set_flags(&mut registry, 2, StateFlags::default().with_minimized(true));
        let mut port = CommandPort::new(RestorePolicy::Snapshot);

        port.minimize_all(&registry);
        log.borrow_mut().clear();

        assert_eq!(port.restore_all(&registry).unwrap(), 2);
        // Окно 1 было активным и активируется последним
        assert_eq!(
            *log.borrow(),
            vec![Request::Activate(ToplevelId(3)), Request::Activate(ToplevelId(1))]
        );
    }

    #[test]
    fn test_snapshot_policy_without_snapshot_restores_all() {
        let log = RequestLog::default();
        let registry = registry(&log, true);
        let mut port = CommandPort::new(RestorePolicy::Snapshot);

        assert_eq!(port.restore_all(&registry).unwrap(), 3);
    }
}
