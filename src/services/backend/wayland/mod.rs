mod connection;
mod dispatch;
#[cfg(test)]
mod test_compositor;

pub use connection::WaylandConnection;
