//! Session routing for Tidesync.
//!
//! A [`SessionsRouter`] owns every session in the process. It creates
//! them ([`SessionsRouter::create`]), keeps each session's allow-list
//! ([`SessionsRouter::welcome`]), binds connections to sessions on their
//! join handshake, and tears a session down once its last player is gone.
//!
//! The router itself is plain synchronous code. [`spawn_router`] moves it
//! into an actor task and returns a cloneable [`RouterHandle`]; that task
//! is the only place router state is touched, grace-period timers
//! included.
//!
//! ```text
//!  connection handlers ─┐
//!  control plane ───────┼──→ [RouterCommand queue] ──→ RouterActor
//!  grace timers ────────┘                               └─ SessionsRouter
//!                                                            └─ Session × N
//! ```

mod actor;
mod error;
mod router;

pub use actor::{spawn_router, RouterHandle};
pub use error::RouterError;
pub use router::{SessionTicket, SessionsRouter};
