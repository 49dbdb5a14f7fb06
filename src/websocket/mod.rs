//! WebSocket Bridge Protocol
//!
//! Game servers connect over two WebSocket channels and exchange typed
//! JSON events with the bridge.
//!
//! ## Architecture
//!
//! - **Messages**: Wire codec for handshake, request, reply and push frames
//! - **Handshake**: Shared-token authentication binding a socket to a name
//! - **ConnectionRegistry**: Server name → live connection, with broadcast
//! - **Handler**: Upgrade handlers and the per-connection loops
//! - **Events**: Business rules for each request type
//!
//! ## Protocol
//!
//! Both channels start with a handshake:
//!
//! ```text
//! → {"token": "secret", "name": "survival"}
//! ← {"success": true}
//! ```
//!
//! The event channel then carries requests and replies:
//!
//! ```text
//! → {"type": "player_joined", "data": {"player": "Steve"}}
//! ← {"success": true, "data": {}}
//! ```
//!
//! The heartbeat channel sends one liveness report (`{"pid": 1234}`) and
//! afterwards only receives pushes relayed from other servers:
//!
//! ```text
//! ← {"type": "message", "data": {"server": "lobby", "player": "Alex", "message": "hi"}}
//! ```

mod events;
mod handler;
mod handshake;
mod messages;
mod registry;

pub use events::handle_request;
pub use handler::{dispatch, event_channel_handler, heartbeat_channel_handler};
pub use handshake::{verify, HandshakeError};
pub use messages::{
    decode_request, encode, CodecError, HandshakeReply, HandshakeRequest, LivenessReport, Push,
    Reply, Request, ResponseData,
};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound, RegisteredServer};
