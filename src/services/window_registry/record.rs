use super::handle::{OwnedHandle, RemoteToplevel};
use crate::events::{StateFlags, ToplevelId, ToplevelSnapshot};

/// Изменения, накопленные с последнего `done`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingState {
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub flags: Option<StateFlags>,
}

impl PendingState {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.app_id.is_none() && self.flags.is_none()
    }
}

/// Одно окно композитора
#[derive(Debug)]
pub struct ToplevelRecord<H: RemoteToplevel> {
    handle: OwnedHandle<H>,
    title: Option<String>,
    app_id: Option<String>,
    activated: bool,
    minimized: bool,
    configured: bool,
    pending: PendingState,
}

impl<H: RemoteToplevel> ToplevelRecord<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle: OwnedHandle::new(handle),
            title: None,
            app_id: None,
            activated: false,
            minimized: false,
            configured: false,
            pending: PendingState::default(),
        }
    }

    pub fn id(&self) -> ToplevelId {
        self.handle.id()
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.get()
    }

    #[allow(dead_code)]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[allow(dead_code)]
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    #[allow(dead_code)]
    pub fn pending(&self) -> &PendingState {
        &self.pending
    }

    pub fn stage_title(&mut self, title: String) {
        self.pending.title = Some(title);
    }

    pub fn stage_app_id(&mut self, app_id: String) {
        self.pending.app_id = Some(app_id);
    }

    /// Композитор всегда присылает полный набор состояний, поэтому пара флагов заменяется целиком
    pub fn stage_flags(&mut self, flags: StateFlags) {
        self.pending.flags = Some(flags);
    }

    /// Применить накопленное одним шагом. Возвращает true, если видимое состояние изменилось.
    pub fn commit(&mut self) -> bool {
        let pending = std::mem::take(&mut self.pending);
        let mut changed = !self.configured;
        self.configured = true;

        if let Some(title) = pending.title {
            changed |= self.title.as_deref() != Some(title.as_str());
            self.title = Some(title);
        }
        if let Some(app_id) = pending.app_id {
            changed |= self.app_id.as_deref() != Some(app_id.as_str());
            self.app_id = Some(app_id);
        }
        if let Some(flags) = pending.flags {
            changed |= self.activated != flags.activated || self.minimized != flags.minimized;
            self.activated = flags.activated;
            self.minimized = flags.minimized;
        }

        changed
    }

    /// Освободить удалённый объект (на `closed` или при разборе реестра)
    pub fn release(&mut self) -> bool {
        self.handle.release()
    }

    pub fn snapshot(&self) -> ToplevelSnapshot {
        ToplevelSnapshot {
            id: self.id(),
            title: self.title.clone(),
            app_id: self.app_id.clone(),
            activated: self.activated,
            minimized: self.minimized,
            configured: self.configured,
        }
    }
}
