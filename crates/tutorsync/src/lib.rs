//! Imperative shell of tutorsync: local state, store and outbox backends,
//! the mutation coordinator and the session that ties them together.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod materializer;
pub mod meeting;
pub mod notify;
pub mod session;
pub mod state;
pub mod storage;
