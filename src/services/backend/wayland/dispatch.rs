use crate::debug_if_enabled;
use crate::error::PanelError;
use crate::events::{HandleEvent, StateFlags, ToplevelId};
use crate::services::window_registry::{RemoteToplevel, WindowRegistry};
use smallvec::SmallVec;
use tracing::{debug, info, warn};
use wayland_client::{
    event_created_child,
    protocol::{wl_callback, wl_registry, wl_seat},
    Connection, Dispatch, Proxy, QueueHandle,
};
use wayland_protocols_wlr::foreign_toplevel::v1::client::{
    zwlr_foreign_toplevel_handle_v1::{self, ZwlrForeignToplevelHandleV1},
    zwlr_foreign_toplevel_manager_v1::{self, ZwlrForeignToplevelManagerV1},
};

/// Состояние очереди событий Wayland: реестр окон плюс найденные глобальные объекты
pub struct ProtocolState {
    pub(crate) registry: WindowRegistry<ZwlrForeignToplevelHandleV1>,
    pub(crate) manager: Option<ZwlrForeignToplevelManagerV1>,
    pub(crate) manager_version: u32,
    pub(crate) seat_version: u32,
    /// Число завершённых wl_display.sync
    pub(crate) syncs_done: u32,
}

impl ProtocolState {
    pub fn new(manager_version: u32, seat_version: u32) -> Self {
        Self {
            registry: WindowRegistry::new(),
            manager: None,
            manager_version,
            seat_version,
            syncs_done: 0,
        }
    }
}

impl RemoteToplevel for ZwlrForeignToplevelHandleV1 {
    type Seat = wl_seat::WlSeat;

    fn id(&self) -> ToplevelId {
        ToplevelId(Proxy::id(self).protocol_id())
    }

    fn request_activate(&self, seat: &wl_seat::WlSeat) {
        self.activate(seat);
    }

    fn request_minimize(&self) {
        self.set_minimized();
    }

    fn release(&self) {
        self.destroy();
    }
}

/// Массив состояний приходит как последовательность u32 в порядке байтов хоста
pub fn decode_state_array(raw: &[u8]) -> SmallVec<[u32; 4]> {
    raw.chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl Dispatch<wl_registry::WlRegistry, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global { name, interface, version } => {
                debug_if_enabled!("Глобальный объект: {} v{} (name: {})", interface, version, name);

                if interface == wl_seat::WlSeat::interface().name {
                    if state.registry.seat().is_some() {
                        debug!("Дополнительный wl_seat (name: {}) пропущен", name);
                        return;
                    }
                    let version = version.min(state.seat_version);
                    let seat = registry.bind::<wl_seat::WlSeat, _, _>(name, version, qh, ());
                    info!("Привязан wl_seat v{}", version);
                    state.registry.set_seat(seat);
                } else if interface == ZwlrForeignToplevelManagerV1::interface().name {
                    if state.manager.is_some() {
                        return;
                    }
                    let version = version.min(state.manager_version);
                    let manager =
                        registry.bind::<ZwlrForeignToplevelManagerV1, _, _>(name, version, qh, ());
                    info!("Привязан zwlr_foreign_toplevel_manager_v1 v{}", version);
                    state.manager = Some(manager);
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                debug!("Глобальный объект удалён (name: {})", name);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_callback::WlCallback, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        _callback: &wl_callback::WlCallback,
        event: wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            state.syncs_done += 1;
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for ProtocolState {
    fn event(
        _state: &mut Self,
        _seat: &wl_seat::WlSeat,
        _event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // Возможности seat панели не нужны
    }
}

impl Dispatch<ZwlrForeignToplevelManagerV1, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        _manager: &ZwlrForeignToplevelManagerV1,
        event: zwlr_foreign_toplevel_manager_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_foreign_toplevel_manager_v1::Event::Toplevel { toplevel } => {
                state.registry.insert(toplevel);
            }
            zwlr_foreign_toplevel_manager_v1::Event::Finished => {
                // Новых окон не будет, уже известные живут до своего closed
                warn!("Композитор завершил zwlr_foreign_toplevel_manager_v1");
                state.manager = None;
            }
            _ => {}
        }
    }

    event_created_child!(ProtocolState, ZwlrForeignToplevelManagerV1, [
        zwlr_foreign_toplevel_manager_v1::EVT_TOPLEVEL_OPCODE => (ZwlrForeignToplevelHandleV1, ()),
    ]);
}

impl Dispatch<ZwlrForeignToplevelHandleV1, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        handle: &ZwlrForeignToplevelHandleV1,
        event: zwlr_foreign_toplevel_handle_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let id = RemoteToplevel::id(handle);

        let event = match event {
            zwlr_foreign_toplevel_handle_v1::Event::Title { title } => HandleEvent::Title(title),
            zwlr_foreign_toplevel_handle_v1::Event::AppId { app_id } => HandleEvent::AppId(app_id),
            zwlr_foreign_toplevel_handle_v1::Event::State { state: raw } => {
                HandleEvent::State(StateFlags::from_raw(&decode_state_array(&raw)))
            }
            zwlr_foreign_toplevel_handle_v1::Event::OutputEnter { .. } => HandleEvent::OutputEnter,
            zwlr_foreign_toplevel_handle_v1::Event::OutputLeave { .. } => HandleEvent::OutputLeave,
            zwlr_foreign_toplevel_handle_v1::Event::Parent { parent } => {
                HandleEvent::Parent(parent.map(|p| RemoteToplevel::id(&p)))
            }
            zwlr_foreign_toplevel_handle_v1::Event::Done => HandleEvent::Done,
            zwlr_foreign_toplevel_handle_v1::Event::Closed => HandleEvent::Closed,
            _ => return,
        };

        match state.registry.apply(id, event) {
            // Гонка closed и позднего события, реестр уже залогировал
            Ok(()) | Err(PanelError::UnknownHandle(_)) => {}
            Err(e) => warn!("Окно {}: {}", id, e),
        }
    }
}
