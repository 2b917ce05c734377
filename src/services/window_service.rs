use super::backend::ProtocolBackend;
use super::command_port::{CommandPort, RestorePolicy};
use super::event_loop::Readiness;
use crate::error::{PanelError, Result};
use crate::events::{RegistryChange, ToplevelId, ToplevelSnapshot};
use std::ops::ControlFlow;
use tracing::{debug, error, info, warn};

/// The one window service of the panel process.
///
/// Owns the backend (and through it the registry) and the command port.
/// Committed changes collect in an outbox; `SharedWindowService` hands them
/// to subscribers once its borrow of the service has ended.
pub struct WindowService<B: ProtocolBackend> {
    backend: Option<B>,
    commands: CommandPort,
    outbox: Vec<RegistryChange>,
}

impl<B: ProtocolBackend> WindowService<B> {
    pub fn new(backend: B, policy: RestorePolicy) -> Self {
        info!("Сервис окон запущен (бэкенд: {}, восстановление: {})", backend.name(), policy);
        Self {
            backend: Some(backend),
            commands: CommandPort::new(policy),
            outbox: Vec::new(),
        }
    }

    #[allow(dead_code)]
    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    /// Забрать уведомления, накопленные с прошлого вызова
    pub fn take_changes(&mut self) -> Vec<RegistryChange> {
        std::mem::take(&mut self.outbox)
    }

    /// Все зафиксированные окна в порядке появления
    pub fn list_records(&self) -> Vec<ToplevelSnapshot> {
        self.backend
            .as_ref()
            .map(|b| b.registry().snapshot())
            .unwrap_or_default()
    }

    #[allow(dead_code)]
    pub fn get(&self, id: ToplevelId) -> Option<ToplevelSnapshot> {
        self.backend
            .as_ref()
            .and_then(|b| b.registry().get(id))
            .map(|r| r.snapshot())
    }

    #[allow(dead_code)]
    pub fn active(&self) -> Option<ToplevelId> {
        self.backend.as_ref().and_then(|b| b.registry().active())
    }

    pub fn activate(&mut self, id: ToplevelId) -> Result<()> {
        let backend = self.connected_backend()?;
        self.commands.activate(backend.registry(), id)?;
        self.flush()
    }

    pub fn minimize(&mut self, id: ToplevelId) -> Result<()> {
        let backend = self.connected_backend()?;
        self.commands.minimize(backend.registry(), id)?;
        self.flush()
    }

    pub fn minimize_all(&mut self) -> Result<usize> {
        let Some(backend) = self.backend.as_ref() else {
            return PanelError::connection_unavailable("соединение с композитором разорвано");
        };
        let sent = self.commands.minimize_all(backend.registry());
        self.flush()?;
        Ok(sent)
    }

    pub fn restore_all(&mut self) -> Result<usize> {
        let Some(backend) = self.backend.as_ref() else {
            return PanelError::connection_unavailable("соединение с композитором разорвано");
        };
        let sent = self.commands.restore_all(backend.registry())?;
        self.flush()?;
        Ok(sent)
    }

    /// Обработать всё, что пришло от композитора, и собрать уведомления.
    pub fn dispatch_pending(&mut self) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return PanelError::connection_unavailable("соединение с композитором разорвано");
        };

        // Освобождение закрытых хэндлов тоже нужно отправить
        let result = backend.dispatch_pending().and_then(|()| backend.flush());
        self.collect();

        if let Err(e) = result {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Реакция на сигнал от ReadinessWatch. `Break` означает, что цикл пора завершить.
    pub fn handle_readiness(&mut self, readiness: Readiness) -> ControlFlow<()> {
        match readiness {
            Readiness::Readable => match self.dispatch_pending() {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            },
            Readiness::HangUp => {
                // Прочитать последние сообщения, затем разобрать реестр
                let _ = self.dispatch_pending();
                self.teardown("композитор закрыл соединение");
                ControlFlow::Break(())
            }
            Readiness::Error(reason) => {
                self.teardown(&reason);
                ControlFlow::Break(())
            }
        }
    }

    /// Разобрать реестр, уведомить потребителей и только затем закрыть транспорт.
    pub fn teardown(&mut self, reason: &str) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };

        error!("Соединение с композитором потеряно: {}", reason);
        backend.registry_mut().teardown();
        self.collect_from(&mut backend);
        drop(backend);
    }

    /// Штатное завершение работы
    pub fn shutdown(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };

        info!("Завершение работы сервиса окон");
        backend.registry_mut().teardown();
        // Отправить destroy для всех хэндлов, пока соединение ещё живо
        if let Err(e) = backend.flush() {
            debug!("Не удалось отправить освобождение хэндлов: {}", e);
        }
        self.collect_from(&mut backend);
    }

    fn connected_backend(&self) -> Result<&B> {
        match self.backend.as_ref() {
            Some(backend) => Ok(backend),
            None => PanelError::connection_unavailable("соединение с композитором разорвано"),
        }
    }

    fn flush(&mut self) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return PanelError::connection_unavailable("соединение с композитором разорвано");
        };
        if let Err(e) = backend.flush() {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    fn fail(&mut self, err: &PanelError) {
        if err.is_fatal_for_connection() {
            self.teardown(&err.to_string());
        } else {
            warn!("Ошибка обработки событий: {}", err);
        }
    }

    fn collect(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            self.collect_from(&mut backend);
            self.backend = Some(backend);
        }
    }

    fn collect_from(&mut self, backend: &mut B) {
        self.outbox.extend(backend.registry_mut().drain_changes());
    }
}

impl<B: ProtocolBackend> Drop for WindowService<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
