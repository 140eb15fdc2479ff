//! NLHE bot-server: the async half of the system. Wraps `engine`'s
//! synchronous game logic in one table-actor task per game, speaks the
//! wire protocol described in `protocol`, and exposes it over HTTP/WS.
//! `engine` itself stays free of any of this — no networking, no tokio.

pub mod director;
pub mod error;
pub mod history;
pub mod http;
pub mod protocol;
pub mod session;
pub mod spawner;
pub mod stats;
pub mod table_actor;
