use super::handle::RemoteToplevel;
use super::record::ToplevelRecord;
use crate::debug_if_enabled;
use crate::error::{PanelError, Result};
use crate::events::{HandleEvent, RegistryChange, ToplevelId, ToplevelSnapshot};
use tracing::{debug, info, warn};

/// Authoritative model of every open toplevel.
///
/// Property events are staged per record and become visible only on `done`.
/// Change notifications are queued in an outbox and handed to subscribers by
/// the owning service once the protocol batch has been applied.
pub struct WindowRegistry<H: RemoteToplevel> {
    records: Vec<ToplevelRecord<H>>,
    seat: Option<H::Seat>,
    active: Option<ToplevelId>,
    outbox: Vec<RegistryChange>,
    torn_down: bool,
}

impl<H: RemoteToplevel> Default for WindowRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RemoteToplevel> WindowRegistry<H> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            seat: None,
            active: None,
            outbox: Vec::new(),
            torn_down: false,
        }
    }

    pub fn set_seat(&mut self, seat: H::Seat) {
        self.seat = Some(seat);
    }

    pub fn seat(&self) -> Option<&H::Seat> {
        self.seat.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[allow(dead_code)]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Последнее известное активное окно
    pub fn active(&self) -> Option<ToplevelId> {
        self.active
    }

    pub fn get(&self, id: ToplevelId) -> Option<&ToplevelRecord<H>> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ToplevelRecord<H>> {
        self.records.iter()
    }

    /// Снимок зафиксированного состояния всех окон в порядке появления
    pub fn snapshot(&self) -> Vec<ToplevelSnapshot> {
        self.records.iter().map(|r| r.snapshot()).collect()
    }

    /// Забрать накопленные уведомления
    pub fn drain_changes(&mut self) -> Vec<RegistryChange> {
        std::mem::take(&mut self.outbox)
    }

    /// Композитор объявил новое окно
    pub fn insert(&mut self, handle: H) -> ToplevelId {
        let id = handle.id();

        if self.torn_down {
            // Хэндл пришёл из последних буферов разорванного соединения
            debug!("Окно {} объявлено после разбора реестра, освобождаем", id);
            handle.release();
            return id;
        }

        if let Some(index) = self.position(id) {
            // Композитор переиспользовал id без closed: старая запись устарела
            warn!("Повторное объявление окна {}, заменяем устаревшую запись", id);
            self.remove_at(index);
        }

        let record = ToplevelRecord::new(handle);
        self.outbox.push(RegistryChange::Added(record.snapshot()));
        self.records.push(record);

        info!("Новое окно {} (всего: {})", id, self.records.len());
        id
    }

    /// Применить одно событие хэндла
    pub fn apply(&mut self, id: ToplevelId, event: HandleEvent) -> Result<()> {
        let Some(index) = self.position(id) else {
            debug!("Событие {} для неизвестного окна {} проигнорировано", event.name(), id);
            return Err(PanelError::UnknownHandle(id));
        };

        debug_if_enabled!("Окно {}: событие {:?}", id, event);

        let record = &mut self.records[index];
        match event {
            HandleEvent::Title(title) => record.stage_title(title),
            HandleEvent::AppId(app_id) => record.stage_app_id(app_id),
            HandleEvent::State(flags) => record.stage_flags(flags),
            HandleEvent::Done => {
                if record.commit() {
                    let snapshot = record.snapshot();
                    self.track_active(&snapshot);
                    self.outbox.push(RegistryChange::Updated(snapshot));
                }
            }
            HandleEvent::Closed => {
                self.remove_at(index);
                info!("Окно {} закрыто (осталось: {})", id, self.records.len());
            }
            HandleEvent::OutputEnter | HandleEvent::OutputLeave | HandleEvent::Parent(_) => {}
        }

        Ok(())
    }

    /// Разобрать реестр: освободить все хэндлы и сообщить одним уведомлением.
    /// Возвращает id удалённых окон.
    pub fn teardown(&mut self) -> Vec<ToplevelId> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;

        let ids: Vec<ToplevelId> = self.records.iter().map(|r| r.id()).collect();
        for mut record in self.records.drain(..) {
            record.release();
        }
        self.active = None;
        self.seat = None;
        self.outbox.push(RegistryChange::Cleared(ids.clone()));

        info!("Реестр окон разобран, удалено окон: {}", ids.len());
        ids
    }

    fn position(&self, id: ToplevelId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    fn remove_at(&mut self, index: usize) {
        let mut record = self.records.remove(index);
        let id = record.id();
        record.release();

        if self.active == Some(id) {
            self.active = None;
        }
        self.outbox.push(RegistryChange::Removed(id));
    }

    fn track_active(&mut self, snapshot: &ToplevelSnapshot) {
        if snapshot.activated {
            self.active = Some(snapshot.id);
        } else if self.active == Some(snapshot.id) {
            self.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::handle::testing::*;
    use super::*;
    use crate::events::StateFlags;

    fn registry_with(ids: &[u32], log: &RequestLog) -> WindowRegistry<FakeHandle> {
        let mut registry = WindowRegistry::new();
        for id in ids {
            registry.insert(FakeHandle::new(*id, log));
        }
        registry.drain_changes();
        registry
    }

    fn commit_flags(registry: &mut WindowRegistry<FakeHandle>, id: u32, flags: StateFlags) {
        registry.apply(ToplevelId(id), HandleEvent::State(flags)).unwrap();
        registry.apply(ToplevelId(id), HandleEvent::Done).unwrap();
    }

    #[test]
    fn test_new_toplevel_notifies_placeholder() {
        let log = RequestLog::default();
        let mut registry = WindowRegistry::new();

        let id = registry.insert(FakeHandle::new(1, &log));

        assert_eq!(
            registry.drain_changes(),
            vec![RegistryChange::Added(ToplevelSnapshot::new(id))]
        );
        assert!(!registry.snapshot()[0].configured);
    }

    #[test]
    fn test_batch_is_committed_once_on_done() {
        let log = RequestLog::default();
        let mut registry = registry_with(&[1], &log);
        let h1 = ToplevelId(1);

        registry.apply(h1, HandleEvent::AppId("editor".into())).unwrap();
        registry.apply(h1, HandleEvent::Title("untitled".into())).unwrap();
        registry.apply(h1, HandleEvent::State(StateFlags::default())).unwrap();

        // До done видимое состояние не меняется и уведомлений нет
        assert_eq!(registry.snapshot()[0], ToplevelSnapshot::new(h1));
        assert!(registry.drain_changes().is_empty());

        registry.apply(h1, HandleEvent::Done).unwrap();

        let expected = ToplevelSnapshot {
            id: h1,
            title: Some("untitled".into()),
            app_id: Some("editor".into()),
            activated: false,
            minimized: false,
            configured: true,
        };
        assert_eq!(registry.snapshot(), vec![expected.clone()]);
        assert_eq!(registry.drain_changes(), vec![RegistryChange::Updated(expected)]);
    }

    #[test]
    fn test_activation_leaves_other_records_untouched() {
        let log = RequestLog::default();
        let mut registry = registry_with(&[1, 2], &log);

        commit_flags(&mut registry, 2, StateFlags::default().with_activated(true));
        commit_flags(&mut registry, 1, StateFlags::default());
        commit_flags(&mut registry, 1, StateFlags::default().with_activated(true));

        let h1 = registry.get(ToplevelId(1)).unwrap();
        assert!(h1.is_activated());
        assert!(!h1.is_minimized());

        // h2 сохраняет свои флаги, пока композитор не пришлёт для него state
        let h2 = registry.get(ToplevelId(2)).unwrap();
        assert!(h2.is_activated());
        assert_eq!(registry.active(), Some(ToplevelId(1)));
    }

    #[test]
    fn test_closed_removes_record_and_ignores_late_events() {
        let log = RequestLog::default();
        let mut registry = registry_with(&[1, 2], &log);

        registry.apply(ToplevelId(1), HandleEvent::Closed).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.drain_changes(), vec![RegistryChange::Removed(ToplevelId(1))]);
        assert_eq!(*log.borrow(), vec![Request::Release(ToplevelId(1))]);

        let late = registry.apply(ToplevelId(1), HandleEvent::Title("late".into()));
        assert!(matches!(late, Err(PanelError::UnknownHandle(ToplevelId(1)))));
        assert!(registry.drain_changes().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_closing_active_record_clears_active_reference() {
        let log = RequestLog::default();
        let mut registry = registry_with(&[1], &log);

        commit_flags(&mut registry, 1, StateFlags::default().with_activated(true));
        assert_eq!(registry.active(), Some(ToplevelId(1)));

        registry.apply(ToplevelId(1), HandleEvent::Closed).unwrap();
        assert_eq!(registry.active(), None);
    }

    #[test]
    fn test_handles_stay_unique() {
        let log = RequestLog::default();
        let mut registry = WindowRegistry::new();

        registry.insert(FakeHandle::new(1, &log));
        registry.insert(FakeHandle::new(2, &log));
        registry.insert(FakeHandle::new(1, &log));
        registry.apply(ToplevelId(2), HandleEvent::Closed).unwrap();
        registry.insert(FakeHandle::new(2, &log));

        let mut ids: Vec<u32> = registry.records().map(|r| r.id().value()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        // Устаревшая запись 1 освобождена ровно один раз
        let releases = log
            .borrow()
            .iter()
            .filter(|r| **r == Request::Release(ToplevelId(1)))
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn test_teardown_releases_everything_in_one_notification() {
        let log = RequestLog::default();
        let mut registry = registry_with(&[1, 2, 3], &log);
        registry.set_seat(());

        let removed = registry.teardown();

        assert_eq!(removed, vec![ToplevelId(1), ToplevelId(2), ToplevelId(3)]);
        assert!(registry.is_empty());
        assert!(registry.seat().is_none());
        assert_eq!(registry.drain_changes(), vec![RegistryChange::Cleared(removed)]);
        assert_eq!(log.borrow().len(), 3);

        // Повторный разбор ничего не делает, новые хэндлы сразу освобождаются
        assert!(registry.teardown().is_empty());
        registry.insert(FakeHandle::new(4, &log));
        assert!(registry.is_empty());
        assert_eq!(log.borrow().last(), Some(&Request::Release(ToplevelId(4))));
    }

    #[test]
    fn test_ignored_events_do_not_touch_state() {
        let log = RequestLog::default();
        let mut registry = registry_with(&[1], &log);
        let h1 = ToplevelId(1);

        registry.apply(h1, HandleEvent::OutputEnter).unwrap();
        registry.apply(h1, HandleEvent::Parent(Some(ToplevelId(7)))).unwrap();
        registry.apply(h1, HandleEvent::OutputLeave).unwrap();

        assert!(registry.drain_changes().is_empty());
        assert!(registry.get(h1).unwrap().pending().is_empty());
    }
}
