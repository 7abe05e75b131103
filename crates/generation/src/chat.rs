//! Per-ad chat façade over the coordinator.

use adforge_core::error::{AdForgeError, AdForgeResult};
use adforge_core::types::{ChatMessage, ChatThread};
use adforge_workspace::WizardStep;
use tracing::debug;
use uuid::Uuid;

use crate::coordinator::GenerationCoordinator;
use crate::jobs::JobRecord;

/// Send-message / receive-update semantics for one ad's edit thread.
///
/// The controller never mutates history except by appending: the user's
/// message lands optimistically before the edit job is issued, and stays
/// in the thread even if the job fails, so the history reflects what was
/// actually asked.
pub struct ChatThreadController {
    coordinator: GenerationCoordinator,
    ad_id: Uuid,
    thread_id: Uuid,
}

impl ChatThreadController {
    /// Attach to an existing thread. Fails with `NotFound` if the ad or
    /// thread is not resident in the workspace.
    pub fn new(
        coordinator: GenerationCoordinator,
        ad_id: Uuid,
        thread_id: Uuid,
    ) -> AdForgeResult<Self> {
        coordinator
            .workspace()
            .thread(&ad_id, &thread_id)
            .ok_or_else(|| AdForgeError::NotFound(format!("thread {thread_id} on ad {ad_id}")))?;
        Ok(Self {
            coordinator,
            ad_id,
            thread_id,
        })
    }

    /// Open a fresh thread on an ad and attach to it.
    pub fn open(
        coordinator: GenerationCoordinator,
        ad_id: Uuid,
        title: impl Into<String>,
    ) -> AdForgeResult<Self> {
        let thread = coordinator.workspace().create_thread(&ad_id, title)?;
        Ok(Self {
            coordinator,
            ad_id,
            thread_id: thread.id,
        })
    }

    pub fn ad_id(&self) -> Uuid {
        self.ad_id
    }

    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    /// Current thread state, if the ad is still resident.
    pub fn thread(&self) -> Option<ChatThread> {
        self.coordinator.workspace().thread(&self.ad_id, &self.thread_id)
    }

    /// Send an edit instruction. Empty or whitespace-only input is
    /// rejected before anything is appended or issued. Otherwise the user
    /// message is appended optimistically and an edit job goes out with
    /// this thread's ad id and a fresh sequence number; a submission-time
    /// failure additionally lands a system message describing it.
    pub async fn send_message(&self, text: &str) -> AdForgeResult<JobRecord> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AdForgeError::Validation(
                "chat message must not be empty".to_string(),
            ));
        }

        self.coordinator.workspace().append_message(
            &self.ad_id,
            &self.thread_id,
            ChatMessage::user(trimmed),
        )?;
        debug!(ad_id = %self.ad_id, thread_id = %self.thread_id, "edit instruction sent");

        match self
            .coordinator
            .request_edit(&self.ad_id, &self.thread_id, trimmed)
            .await
        {
            Ok(record) => Ok(record),
            Err(e) => {
                // The optimistic user message stays; the failure is told
                // in the thread in user-facing terms.
                let _ = self.coordinator.workspace().append_message(
                    &self.ad_id,
                    &self.thread_id,
                    ChatMessage::system(e.failure_kind().user_message()),
                );
                Err(e)
            }
        }
    }

    /// Leave the thread view. Pure navigation: no workspace side effects
    /// beyond the wizard step.
    pub fn go_back(&self) -> WizardStep {
        self.coordinator.workspace().go_back()
    }
}
