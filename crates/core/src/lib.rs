//! Functional core of tutorsync.
//!
//! Pure calendar logic (recurrence expansion, availability splitting, role
//! policies, mutation planning and notification gating) plus the traits of
//! the external collaborators. Nothing here performs I/O.

pub mod calendar;
pub mod meeting;
pub mod mutation;
pub mod notification;
pub mod policy;
pub mod storage;
