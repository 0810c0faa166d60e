//! REST API module
//!
//! Presentation-facing HTTP surface over the state client.
//!
//! # Endpoints
//!
//! - `GET /api/contract` - Contract descriptor
//! - `GET /api/snapshot` - Cached state of every field plus operations in flight
//! - `GET /api/fields/:field` - Cached state of one field
//! - `POST /api/fields/:field/read` - Fetch a field from the contract
//! - `POST /api/operations/:name` - Authorize and submit a mutation (`{"inputs": [...]}`)
//!
//! ## WebSocket
//! - `GET /ws` - Snapshot on connect, then FieldChanged / Mutation* events

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::WsFrame;
