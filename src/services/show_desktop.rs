use super::backend::ProtocolBackend;
use super::window_service::WindowService;
use crate::error::Result;
use crate::events::RegistryChange;
use std::cell::Cell;
use tracing::{debug, info};

/// Результат нажатия «Показать рабочий стол»
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopAction {
    /// Все окна свёрнуты, отправлено n запросов
    Shown(usize),
    /// Окна восстановлены, отправлено n запросов
    Restored(usize),
}

/// Кнопка «Показать рабочий стол»: переключает «свернуть все» / «восстановить все».
///
/// The flag flips on every press. Only a lost connection leaves it as is;
/// the `Cleared` notification that follows resets it anyway.
#[derive(Debug, Default)]
pub struct ShowDesktop {
    desktop_shown: Cell<bool>,
}

impl ShowDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn is_desktop_shown(&self) -> bool {
        self.desktop_shown.get()
    }

    pub fn toggle<B: ProtocolBackend>(&self, service: &mut WindowService<B>) -> Result<DesktopAction> {
        let shown = self.desktop_shown.get();
        let result = if shown {
            service.restore_all().map(DesktopAction::Restored)
        } else {
            service.minimize_all().map(DesktopAction::Shown)
        };

        match &result {
            Err(e) if e.is_fatal_for_connection() => return result,
            Err(e) => debug!("Показать рабочий стол: команда пропущена ({})", e),
            Ok(action) => info!("Показать рабочий стол: {:?}", action),
        }

        self.desktop_shown.set(!shown);
        result
    }

    pub fn apply(&self, change: &RegistryChange) {
        if let RegistryChange::Cleared(_) = change {
            if self.desktop_shown.replace(false) {
                debug!("Реестр разобран, флаг рабочего стола сброшен");
            }
        }
    }
}
