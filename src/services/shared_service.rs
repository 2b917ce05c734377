use super::backend::ProtocolBackend;
use super::subscribers::{SubscriptionId, Subscribers};
use super::window_service::WindowService;
use crate::events::{RegistryChange, ToplevelSnapshot};
use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Handle to the process-wide window service, shared by the event loop and
/// the panel consumers.
///
/// Every mutation goes through `with_mut`. Subscribers are notified only after
/// the service borrow has been released, so a callback may look records up
/// through the service. Callbacks MUST NOT subscribe or unsubscribe.
pub struct SharedWindowService<B: ProtocolBackend> {
    service: Rc<RefCell<WindowService<B>>>,
    subscribers: Rc<RefCell<Subscribers>>,
}

impl<B: ProtocolBackend> Clone for SharedWindowService<B> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<B: ProtocolBackend> SharedWindowService<B> {
    pub fn new(service: WindowService<B>) -> Self {
        Self {
            service: Rc::new(RefCell::new(service)),
            subscribers: Rc::new(RefCell::new(Subscribers::new())),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&RegistryChange) + 'static,
    {
        self.subscribers.borrow_mut().subscribe(callback)
    }

    #[allow(dead_code)]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.borrow_mut().unsubscribe(id)
    }

    /// Чтение состояния сервиса
    #[allow(dead_code)]
    pub fn borrow(&self) -> Ref<'_, WindowService<B>> {
        self.service.borrow()
    }

    /// Слабая ссылка для подписчиков, которым нужен поиск по id
    #[allow(dead_code)]
    pub fn downgrade(&self) -> Weak<RefCell<WindowService<B>>> {
        Rc::downgrade(&self.service)
    }

    pub fn list_records(&self) -> Vec<ToplevelSnapshot> {
        self.service.borrow().list_records()
    }

    /// Выполнить операцию над сервисом и разослать накопленные уведомления
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut WindowService<B>) -> R) -> R {
        let result = {
            let mut service = self.service.borrow_mut();
            f(&mut *service)
        };
        self.deliver();
        result
    }

    /// Разослать уведомления, пока сервис не перестанет их порождать
    pub fn deliver(&self) {
        // Вложенный вызов из подписчика: его уведомления разошлёт внешний цикл
        let Ok(mut subscribers) = self.subscribers.try_borrow_mut() else {
            return;
        };

        loop {
            let changes = self.service.borrow_mut().take_changes();
            if changes.is_empty() {
                break;
            }
            debug!("Рассылка {} уведомлений ({} подписчиков)", changes.len(), subscribers.len());
            subscribers.notify(&changes);
        }
    }
}
