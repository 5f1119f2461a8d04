//! Single-connection HTTP/1.1 client.
//!
//! An [`Agent`] talks to one origin over one persistent connection, serializing its
//! requests the same way the server serializes its responses. Responses stream their
//! body through [`ClientBody`]; [`finalize_response`] reads it to the end and merges its
//! trailer fields into the response headers.

mod agent;
mod body;
mod config;
mod connector;
mod error;

pub use agent::Agent;
pub use body::{ClientBody, finalize_response};
pub use config::AgentConfig;
pub use error::AgentError;
