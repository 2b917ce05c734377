pub mod backend;
pub mod command_port;
pub mod event_loop;
pub mod shared_service;
pub mod show_desktop;
pub mod subscribers;
pub mod tasklist;
pub mod window_registry;
pub mod window_service;

pub use command_port::RestorePolicy;
pub use event_loop::{EventDispatchLoop, ReadinessWatch};
pub use shared_service::SharedWindowService;
pub use show_desktop::ShowDesktop;
pub use tasklist::TasklistView;
pub use window_service::WindowService;
