use crate::events::RegistryChange;
use tracing::debug;

/// Идентификатор подписки, нужен для отписки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&RegistryChange)>;

/// Ordered list of change callbacks.
///
/// Callbacks run synchronously, in subscription order, on the thread that
/// owns the event loop.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&RegistryChange) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.callbacks.push((id, Box::new(callback)));
        debug!("Добавлен подписчик {:?} (всего: {})", id, self.callbacks.len());
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(sid, _)| *sid != id);
        before != self.callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Разослать уведомления всем подписчикам по порядку
    pub fn notify(&mut self, changes: &[RegistryChange]) {
        for change in changes {
            for (_, callback) in self.callbacks.iter_mut() {
                callback(change);
            }
        }
    }
}
