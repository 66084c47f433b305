//! In-memory meeting provider for development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use tutorsync_core::calendar::MeetingRef;
use tutorsync_core::meeting::{MeetingError, MeetingProvider, MeetingRequest, Result};

/// Keeps scheduled meetings in memory and hands out fake join links.
#[derive(Debug, Clone, Default)]
pub struct MemoryMeetingProvider {
    meetings: Arc<RwLock<HashMap<String, MeetingRequest>>>,
}

impl MemoryMeetingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, meeting_id: &str) -> Option<MeetingRequest> {
        self.meetings.read().await.get(meeting_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.meetings.read().await.len()
    }
}

#[async_trait]
impl MeetingProvider for MemoryMeetingProvider {
    async fn create(&self, request: &MeetingRequest) -> Result<MeetingRef> {
        let meeting_id = Uuid::new_v4().to_string();
        let join_url = format!("https://meet.example.com/{meeting_id}");
        self.meetings
            .write()
            .await
            .insert(meeting_id.clone(), request.clone());
        tracing::debug!(%meeting_id, subject = %request.subject, "Meeting created");
        Ok(MeetingRef {
            meeting_id,
            join_url,
        })
    }

    async fn update(&self, meeting_id: &str, request: &MeetingRequest) -> Result<()> {
        let mut meetings = self.meetings.write().await;
        match meetings.get_mut(meeting_id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(MeetingError::NotFound(meeting_id.to_string())),
        }
    }

    async fn delete(&self, meeting_id: &str) -> Result<()> {
        match self.meetings.write().await.remove(meeting_id) {
            Some(_) => Ok(()),
            None => Err(MeetingError::NotFound(meeting_id.to_string())),
        }
    }
}
