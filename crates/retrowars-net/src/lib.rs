//! # Retrowars networking
//!
//! Client side of a Retrowars multiplayer match. Several players each run
//! their own mini-game; this crate keeps everyone's roster, scores and
//! statuses in sync through a match server and tells the game when an
//! opponent's score crosses a breakpoint, which is when an attack lands.
//!
//! The game implements [`SessionListener`](retrowars_session::SessionListener),
//! connects a [`ClientSession`](retrowars_session::ClientSession) (or installs
//! one in a [`SessionSlot`](retrowars_session::SessionSlot)) and reports its
//! own score and status from the game loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use retrowars_net::prelude::*;
//!
//! struct Hud;
//!
//! impl SessionListener for Hud {
//!     fn on_breakpoint_crossed(&self, player: &Player, strength: u32) {
//!         println!("{} attacks with strength {strength}", player.id);
//!     }
//!
//!     fn on_connection_closed(&self, graceful: bool) {
//!         println!("disconnected (graceful: {graceful})");
//!     }
//! }
//!
//! # async fn run() -> Result<(), RetrowarsError> {
//! let session = SessionSlot::global()
//!     .connect(ClientConfig::new("retrowars.example.com", 443), Arc::new(Hud))
//!     .await?;
//! session.update_score(1_200)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tls` (default): `wss://` support, used for servers on port 443

mod error;
mod logging;

pub use error::RetrowarsError;
pub use logging::init_tracing;

pub use retrowars_protocol as protocol;
pub use retrowars_session as session;
pub use retrowars_transport as transport;

/// Everything a game needs in one import.
pub mod prelude {
    pub use crate::{RetrowarsError, init_tracing};
    pub use retrowars_protocol::{PlayerId, PlayerStatus};
    pub use retrowars_session::{
        ClientConfig, ClientSession, Player, SessionListener, SessionSlot,
    };
    pub use retrowars_transport::TransportConfig;
}
