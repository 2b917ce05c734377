//! In-process compositor speaking the server side of foreign-toplevel
//! management over a socket pair. Runs on its own thread; the client under
//! test owns the other end of the pair.

use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wayland_protocols_wlr::foreign_toplevel::v1::server::{
    zwlr_foreign_toplevel_handle_v1::{self, ZwlrForeignToplevelHandleV1},
    zwlr_foreign_toplevel_manager_v1::{self, ZwlrForeignToplevelManagerV1},
};
use wayland_server::{
    protocol::wl_seat::{self, WlSeat},
    Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New, Resource,
};

/// Что клиент сделал на стороне композитора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRequest {
    BoundSeat(u32),
    BoundManager(u32),
    Activate(u32),
    SetMinimized(u32),
    Destroy(u32),
}

/// Окно с первым пакетом свойств
#[derive(Debug, Clone)]
pub struct TestWindow {
    title: String,
    app_id: String,
    states: Vec<u32>,
}

impl TestWindow {
    pub fn new(title: &str, app_id: &str) -> Self {
        Self {
            title: title.to_string(),
            app_id: app_id.to_string(),
            states: Vec::new(),
        }
    }

    pub fn with_states(mut self, states: &[u32]) -> Self {
        self.states = states.to_vec();
        self
    }
}

/// Версии объявляемых глобальных объектов, `None` - объект не объявляется
#[derive(Debug, Clone, Copy)]
pub struct Globals {
    pub seat_version: Option<u32>,
    pub manager_version: Option<u32>,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            seat_version: Some(7),
            manager_version: Some(3),
        }
    }
}

struct ServerState {
    dh: DisplayHandle,
    client: Option<Client>,
    manager: Option<ZwlrForeignToplevelManagerV1>,
    initial: Vec<TestWindow>,
    toplevels: Vec<ZwlrForeignToplevelHandleV1>,
    log: Arc<Mutex<Vec<ServerRequest>>>,
}

impl ServerState {
    fn record(&self, request: ServerRequest) {
        self.log.lock().unwrap().push(request);
    }

    fn announce(&mut self, window: &TestWindow) -> Option<u32> {
        let (Some(manager), Some(client)) = (&self.manager, &self.client) else {
            return None;
        };
        let handle = client
            .create_resource::<ZwlrForeignToplevelHandleV1, (), ServerState>(&self.dh, manager.version(), ())
            .ok()?;

        manager.toplevel(&handle);
        handle.app_id(window.app_id.clone());
        handle.title(window.title.clone());
        handle.state(window.states.iter().flat_map(|s| s.to_ne_bytes()).collect());
        handle.done();

        let id = handle.id().protocol_id();
        self.toplevels.push(handle);
        Some(id)
    }

    fn close(&mut self, id: u32) {
        if let Some(pos) = self.toplevels.iter().position(|h| h.id().protocol_id() == id) {
            self.toplevels.remove(pos).closed();
        }
    }
}

type Command = Box<dyn FnOnce(&mut ServerState) + Send>;

pub struct TestCompositor {
    commands: Option<Sender<Command>>,
    log: Arc<Mutex<Vec<ServerRequest>>>,
    thread: Option<JoinHandle<()>>,
}

impl TestCompositor {
    /// Запустить композитор; возвращает клиентский конец сокета
    pub fn spawn(globals: Globals, initial: Vec<TestWindow>) -> (Self, UnixStream) {
        let (client_side, server_side) = UnixStream::pair().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (commands, inbox) = mpsc::channel::<Command>();

        let thread_log = log.clone();
        let thread = thread::spawn(move || {
            let mut display = Display::<ServerState>::new().unwrap();
            let mut dh = display.handle();
            if let Some(version) = globals.seat_version {
                dh.create_global::<ServerState, WlSeat, ()>(version, ());
            }
            if let Some(version) = globals.manager_version {
                dh.create_global::<ServerState, ZwlrForeignToplevelManagerV1, ()>(version, ());
            }
            let client = dh.insert_client(server_side, Arc::new(())).unwrap();

            let mut state = ServerState {
                dh,
                client: Some(client),
                manager: None,
                initial,
                toplevels: Vec::new(),
                log: thread_log,
            };

            loop {
                loop {
                    match inbox.try_recv() {
                        Ok(command) => command(&mut state),
                        Err(TryRecvError::Empty) => break,
                        // Остановка: Display закрывает сокет клиента
                        Err(TryRecvError::Disconnected) => return,
                    }
                }
                if display.dispatch_clients(&mut state).is_err() {
                    return;
                }
                let _ = display.flush_clients();
                thread::sleep(Duration::from_millis(2));
            }
        });

        let compositor = Self {
            commands: Some(commands),
            log,
            thread: Some(thread),
        };
        (compositor, client_side)
    }

    /// Объявить окно, возвращает protocol id его хэндла
    pub fn announce(&self, window: TestWindow) -> u32 {
        let (reply, answer) = mpsc::channel();
        self.run(move |state| {
            let _ = reply.send(state.announce(&window));
        });
        answer.recv().unwrap().expect("manager is not bound")
    }

    pub fn close(&self, id: u32) {
        self.run(move |state| state.close(id));
    }

    pub fn requests(&self) -> Vec<ServerRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Дождаться запроса от клиента (до секунды)
    pub async fn wait_for(&self, request: ServerRequest) -> bool {
        for _ in 0..200 {
            if self.requests().contains(&request) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Остановить композитор, клиент увидит обрыв соединения
    pub fn stop(self) {}

    fn run(&self, command: impl FnOnce(&mut ServerState) + Send + 'static) {
        if let Some(commands) = &self.commands {
            commands.send(Box::new(command)).unwrap();
        }
    }
}

impl Drop for TestCompositor {
    fn drop(&mut self) {
        self.commands.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl GlobalDispatch<WlSeat, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let seat = data_init.init(resource, ());
        state.record(ServerRequest::BoundSeat(seat.version()));
    }
}

impl Dispatch<WlSeat, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _seat: &WlSeat,
        _request: wl_seat::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl GlobalDispatch<ZwlrForeignToplevelManagerV1, ()> for ServerState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<ZwlrForeignToplevelManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let manager = data_init.init(resource, ());
        state.record(ServerRequest::BoundManager(manager.version()));
        state.manager = Some(manager);

        // Уже открытые окна объявляются сразу после bind
        for window in std::mem::take(&mut state.initial) {
            state.announce(&window);
        }
    }
}

impl Dispatch<ZwlrForeignToplevelManagerV1, ()> for ServerState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _manager: &ZwlrForeignToplevelManagerV1,
        _request: zwlr_foreign_toplevel_manager_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl Dispatch<ZwlrForeignToplevelHandleV1, ()> for ServerState {
    fn request(
        state: &mut Self,
        _client: &Client,
        handle: &ZwlrForeignToplevelHandleV1,
        request: zwlr_foreign_toplevel_handle_v1::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        let id = handle.id().protocol_id();
        match request {
            zwlr_foreign_toplevel_handle_v1::Request::Activate { .. } => {
                state.record(ServerRequest::Activate(id))
            }
            zwlr_foreign_toplevel_handle_v1::Request::SetMinimized => {
                state.record(ServerRequest::SetMinimized(id))
            }
            zwlr_foreign_toplevel_handle_v1::Request::Destroy => state.record(ServerRequest::Destroy(id)),
            _ => {}
        }
    }
}
