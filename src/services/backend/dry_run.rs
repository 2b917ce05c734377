use super::r#trait::ProtocolBackend;
use crate::error::{PanelError, Result};
use crate::events::{HandleEvent, StateFlags, ToplevelId};
use crate::services::window_registry::{RemoteToplevel, WindowRegistry};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info};

/// Запрос, дошедший до эмулируемого композитора после flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatedRequest {
    Activate(ToplevelId),
    Minimize(ToplevelId),
    Destroy(ToplevelId),
}

#[derive(Debug)]
enum EmulatedEvent {
    Toplevel(ToplevelId),
    Handle(ToplevelId, HandleEvent),
}

#[derive(Debug)]
struct EmulatedWindow {
    id: ToplevelId,
    flags: StateFlags,
}

#[derive(Debug, Default)]
struct CompositorState {
    next_id: u32,
    windows: Vec<EmulatedWindow>,
    events: VecDeque<EmulatedEvent>,
    outgoing: Vec<EmulatedRequest>,
    handled: Vec<EmulatedRequest>,
    flushes: usize,
    hung_up: bool,
}

impl CompositorState {
    fn push_state(&mut self, id: ToplevelId, flags: StateFlags) {
        self.events.push_back(EmulatedEvent::Handle(id, HandleEvent::State(flags)));
        self.events.push_back(EmulatedEvent::Handle(id, HandleEvent::Done));
    }

    fn process(&mut self, request: EmulatedRequest) {
        match request {
            EmulatedRequest::Activate(id) => {
                if !self.windows.iter().any(|w| w.id == id) {
                    return;
                }
                let mut changed = Vec::new();
                for window in self.windows.iter_mut() {
                    let flags = if window.id == id {
                        StateFlags { activated: true, minimized: false }
                    } else {
                        window.flags.with_activated(false)
                    };
                    if flags != window.flags {
                        window.flags = flags;
                        changed.push((window.id, flags));
                    }
                }
                for (id, flags) in changed {
                    self.push_state(id, flags);
                }
            }
            EmulatedRequest::Minimize(id) => {
                let flags = StateFlags { activated: false, minimized: true };
                if let Some(window) = self.windows.iter_mut().find(|w| w.id == id) {
                    if window.flags != flags {
                        window.flags = flags;
                        self.push_state(id, flags);
                    }
                }
            }
            EmulatedRequest::Destroy(_) => {}
        }
        self.handled.push(request);
    }
}

/// Эмулируемый композитор. Клоны разделяют одно состояние.
#[derive(Debug, Clone, Default)]
pub struct DryRunCompositor {
    state: Rc<RefCell<CompositorState>>,
}

impl DryRunCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Открыть окно: toplevel + полный первый пакет свойств
    pub fn open_window(&self, title: &str, app_id: &str) -> ToplevelId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = ToplevelId(state.next_id);

        state.windows.push(EmulatedWindow { id, flags: StateFlags::default() });
        state.events.push_back(EmulatedEvent::Toplevel(id));
        state.events.push_back(EmulatedEvent::Handle(id, HandleEvent::AppId(app_id.to_string())));
        state.events.push_back(EmulatedEvent::Handle(id, HandleEvent::Title(title.to_string())));
        state.push_state(id, StateFlags::default());

        debug!("Dry-run: открыто окно {} \"{}\"", id, title);
        id
    }

    #[allow(dead_code)]
    pub fn close_window(&self, id: ToplevelId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.windows.len();
        state.windows.retain(|w| w.id != id);
        if before == state.windows.len() {
            return false;
        }
        state.events.push_back(EmulatedEvent::Handle(id, HandleEvent::Closed));
        true
    }

    /// Эмулировать обрыв соединения
    pub fn hang_up(&self) {
        self.state.borrow_mut().hung_up = true;
    }

    #[allow(dead_code)]
    pub fn flush_count(&self) -> usize {
        self.state.borrow().flushes
    }

    #[allow(dead_code)]
    pub fn handled_requests(&self) -> Vec<EmulatedRequest> {
        self.state.borrow().handled.clone()
    }

    fn queue(&self, request: EmulatedRequest) {
        self.state.borrow_mut().outgoing.push(request);
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.hung_up {
            return PanelError::connection_unavailable("dry-run композитор отключён");
        }
        state.flushes += 1;
        let outgoing = std::mem::take(&mut state.outgoing);
        for request in outgoing {
            state.process(request);
        }
        Ok(())
    }

    fn take_events(&self) -> Result<Vec<EmulatedEvent>> {
        let mut state = self.state.borrow_mut();
        if state.hung_up {
            return PanelError::connection_unavailable("dry-run композитор отключён");
        }
        Ok(state.events.drain(..).collect())
    }
}

pub struct DryRunHandle {
    id: ToplevelId,
    compositor: DryRunCompositor,
}

impl RemoteToplevel for DryRunHandle {
    type Seat = ();

    fn id(&self) -> ToplevelId {
        self.id
    }

    fn request_activate(&self, _seat: &()) {
        self.compositor.queue(EmulatedRequest::Activate(self.id));
    }

    fn request_minimize(&self) {
        self.compositor.queue(EmulatedRequest::Minimize(self.id));
    }

    fn release(&self) {
        self.compositor.queue(EmulatedRequest::Destroy(self.id));
    }
}

/// Бэкенд без Wayland: окна и ответы композитора эмулируются в процессе
pub struct DryRunBackend {
    registry: WindowRegistry<DryRunHandle>,
    compositor: DryRunCompositor,
}

impl DryRunBackend {
    pub fn new(compositor: DryRunCompositor) -> Self {
        let mut registry = WindowRegistry::new();
        registry.set_seat(());
        Self { registry, compositor }
    }

    /// Бэкенд без seat: активация недоступна
    #[allow(dead_code)]
    pub fn without_seat(compositor: DryRunCompositor) -> Self {
        Self {
            registry: WindowRegistry::new(),
            compositor,
        }
    }

    pub fn with_default_windows() -> Self {
        info!("Dry-run режим - окна композитора эмулируются");

        let compositor = DryRunCompositor::new();
        let fake_windows = [
            ("Terminal - dry_run", "foot"),
            ("Browser - dry_run", "firefox"),
            ("Editor - dry_run", "org.gnome.TextEditor"),
        ];
        for (title, app_id) in fake_windows {
            compositor.open_window(title, app_id);
        }
        Self::new(compositor)
    }

    pub fn compositor(&self) -> &DryRunCompositor {
        &self.compositor
    }
}

impl ProtocolBackend for DryRunBackend {
    type Handle = DryRunHandle;

    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn registry(&self) -> &WindowRegistry<DryRunHandle> {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut WindowRegistry<DryRunHandle> {
        &mut self.registry
    }

    fn dispatch_pending(&mut self) -> Result<()> {
        for event in self.compositor.take_events()? {
            match event {
                EmulatedEvent::Toplevel(id) => {
                    self.registry.insert(DryRunHandle {
                        id,
                        compositor: self.compositor.clone(),
                    });
                }
                EmulatedEvent::Handle(id, event) => {
                    match self.registry.apply(id, event) {
                        Ok(()) | Err(PanelError::UnknownHandle(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.compositor.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows_are_enumerated() {
        let mut backend = DryRunBackend::with_default_windows();
        backend.dispatch_pending().unwrap();

        let snapshot = backend.registry().snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.iter().all(|s| s.configured));
        assert_eq!(snapshot[1].app_id.as_deref(), Some("firefox"));
    }

    #[test]
    fn test_requests_take_effect_only_after_flush() {
        let mut backend = DryRunBackend::with_default_windows();
        backend.dispatch_pending().unwrap();
        let id = backend.registry().snapshot()[0].id;

        backend.registry().get(id).unwrap().handle().unwrap().request_activate(&());
        backend.dispatch_pending().unwrap();
        assert!(!backend.registry().get(id).unwrap().is_activated());

        backend.flush().unwrap();
        backend.dispatch_pending().unwrap();
        assert!(backend.registry().get(id).unwrap().is_activated());
        assert_eq!(backend.compositor().handled_requests(), vec![EmulatedRequest::Activate(id)]);
    }

    #[test]
    fn test_activation_moves_focus() {
        let mut backend = DryRunBackend::with_default_windows();
        backend.dispatch_pending().unwrap();
        let ids: Vec<ToplevelId> = backend.registry().snapshot().iter().map(|s| s.id).collect();

        for id in [ids[0], ids[1]] {
            backend.registry().get(id).unwrap().handle().unwrap().request_activate(&());
            backend.flush().unwrap();
            backend.dispatch_pending().unwrap();
        }

        assert!(!backend.registry().get(ids[0]).unwrap().is_activated());
        assert!(backend.registry().get(ids[1]).unwrap().is_activated());
        assert_eq!(backend.registry().active(), Some(ids[1]));
    }

    #[test]
    fn test_late_event_for_closed_window_is_ignored() {
        let mut backend = DryRunBackend::with_default_windows();
        backend.dispatch_pending().unwrap();
        let id = backend.registry().snapshot()[0].id;

        assert!(backend.compositor().close_window(id));
        backend
            .compositor()
            .state
            .borrow_mut()
            .events
            .push_back(EmulatedEvent::Handle(id, HandleEvent::Title("late".into())));

        backend.dispatch_pending().unwrap();
        assert!(backend.registry().get(id).is_none());
        assert_eq!(backend.registry().len(), 2);
    }

    #[test]
    fn test_hang_up_fails_dispatch_and_flush() {
        let mut backend = DryRunBackend::with_default_windows();
        backend.compositor().hang_up();

        assert!(matches!(backend.dispatch_pending(), Err(PanelError::ConnectionUnavailable(_))));
        assert!(matches!(backend.flush(), Err(PanelError::ConnectionUnavailable(_))));
    }
}
