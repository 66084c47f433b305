//! Storage backends implementing [`tutorsync_core::storage::EventStore`].

mod inmemory;

pub use inmemory::InMemoryStore;
