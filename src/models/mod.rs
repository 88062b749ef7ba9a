//! Data models for staff, tasks and community chat.
//!
//! Every record serializes as camelCase JSON, the shape both the REST API and the client use.

mod chat;
mod staff;
mod task;

pub use chat::*;
pub use staff::*;
pub use task::*;
