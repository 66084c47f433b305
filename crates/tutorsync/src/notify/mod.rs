mod gate;
mod outbox;

pub use gate::NotificationGate;
pub use outbox::MemoryOutbox;
