//! # Tidesync
//!
//! Relay and authority server for real-time multiplayer sessions.
//!
//! A host launches a session through the [`ControlPlane`], welcomes its
//! players, and hands one of them the Source-of-Truth key. Clients then
//! connect over WebSocket and exchange marked binary messages. Game rules
//! live in a single [`Behaviour`](tidesync_session::Behaviour)
//! implementation; the server handles routing, authority checks,
//! delta broadcasts and reconnection grace periods.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidesync::prelude::*;
//!
//! // Implement Behaviour for your game, then:
//! // let server = TidesyncServer::builder()
//! //     .bind("0.0.0.0:8766")
//! //     .build(MyBehaviour)
//! //     .await?;
//! // let info = server.control().launch("host-1").await?;
//! // server.run().await
//! ```

mod config;
mod control;
mod error;
mod handler;
pub mod logging;
mod server;

pub use config::ServerConfig;
pub use control::{ControlPlane, SessionInfo};
pub use error::{ControlError, TidesyncError};
pub use logging::init_logging;
pub use server::{TidesyncServer, TidesyncServerBuilder};

/// Re-exports of the sub-crates, for access to less common items.
pub use tidesync_protocol as protocol;
pub use tidesync_router as router;
pub use tidesync_session as session;
pub use tidesync_transport as transport;

/// Everything a game server binary usually needs.
pub mod prelude {
    pub use crate::{
        init_logging, ControlError, ControlPlane, ServerConfig, SessionInfo,
        TidesyncError, TidesyncServer, TidesyncServerBuilder,
    };
    pub use tidesync_protocol::{
        DeltaState, FieldMask, Message, MessageMark, MessageReader,
        ProtocolError,
    };
    pub use tidesync_session::{
        Behaviour, CommandOutcome, PlayerId, SessionConfig, SessionId,
        SessionSummary,
    };
    pub use tidesync_transport::ConnectionId;
}
