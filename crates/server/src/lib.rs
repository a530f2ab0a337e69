//! Live Q&A session service: session registry, message store and the HTTP
//! surface that presenters and participants poll.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod messages;
pub mod routes;
pub mod session;
pub mod state;
