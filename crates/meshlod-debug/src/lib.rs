//! Debug tools for meshlod - TCP control server for remote inspection and tuning
//!
//! Start the debug server in your app:
//! ```ignore
//! let handler = Arc::new(Mutex::new(MyHandler::new()));
//! let _server = DebugServer::start(handler, DEFAULT_PORT);
//! ```
//!
//! Each request is one JSON object per line, e.g.
//! `{"cmd":"SetLodParams","params":{"lod_pow":0.5}}`, answered by one JSON line.

pub mod protocol;
pub mod server;

pub use protocol::*;
pub use server::{DebugHandler, DebugServer};

/// Default debug server port
pub const DEFAULT_PORT: u16 = 9743;
