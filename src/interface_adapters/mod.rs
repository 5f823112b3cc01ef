// Interface adapters: wire protocols, transports, and HTTP/WebSocket handling.

pub mod http;
pub mod net;
pub mod protocol;
pub mod sessions;
pub mod state;
pub mod utils;
pub mod wire;
