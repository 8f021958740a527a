pub mod protocol;
pub mod server;

pub use protocol::{parse_line, wire_message, RemoteCommand, DEFAULT_PORT, FIN_DELAY};
pub use server::RemoteServer;
