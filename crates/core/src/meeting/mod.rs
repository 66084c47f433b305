//! Remote meeting provider seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{CalendarEvent, MeetingRef};

/// Errors reported by a meeting provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeetingError {
    #[error("Meeting provider unavailable: {0}")]
    Unavailable(String),
    #[error("Meeting not found: {0}")]
    NotFound(String),
    #[error("Meeting request rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, MeetingError>;

/// Everything the provider needs to schedule a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub subject: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
}

impl MeetingRequest {
    pub fn for_event(event: &CalendarEvent) -> Self {
        Self {
            subject: event.title.clone(),
            description: event.description.clone(),
            start: event.start,
            end: event.end,
            attendees: event.attendees(),
        }
    }
}

/// External service hosting online shifts.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    async fn create(&self, request: &MeetingRequest) -> Result<MeetingRef>;

    async fn update(&self, meeting_id: &str, request: &MeetingRequest) -> Result<()>;

    async fn delete(&self, meeting_id: &str) -> Result<()>;
}
