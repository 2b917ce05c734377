use crate::events::ToplevelId;
use std::fmt;

/// Remote per-window object as seen by the registry.
///
/// The registry never looks inside a handle: it only needs its identity,
/// the two requests the panel issues and the explicit destroy step.
pub trait RemoteToplevel {
    /// Input focus context required by `activate`
    type Seat;

    fn id(&self) -> ToplevelId;
    fn request_activate(&self, seat: &Self::Seat);
    fn request_minimize(&self);
    /// Destroy the remote object. Called at most once, through [`OwnedHandle`].
    fn release(&self);
}

/// Хэндл окна с гарантированным однократным освобождением.
///
/// Создаётся на событии `toplevel`, освобождается на `closed` или при
/// разборе реестра. Drop освобождает хэндл, если это ещё не сделано явно.
pub struct OwnedHandle<H: RemoteToplevel> {
    handle: Option<H>,
    id: ToplevelId,
}

impl<H: RemoteToplevel> OwnedHandle<H> {
    pub fn new(handle: H) -> Self {
        let id = handle.id();
        Self { handle: Some(handle), id }
    }

    pub fn id(&self) -> ToplevelId {
        self.id
    }

    /// Доступ к удалённому объекту, пока он не освобождён
    pub fn get(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    /// Освободить удалённый объект. Повторный вызов ничего не делает.
    pub fn release(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.release();
                true
            }
            None => false,
        }
    }
}

impl<H: RemoteToplevel> Drop for OwnedHandle<H> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<H: RemoteToplevel> fmt::Debug for OwnedHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("id", &self.id)
            .field("released", &self.handle.is_none())
            .finish()
    }
}
