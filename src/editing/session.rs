use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use super::acquirer::SourceImage;
use super::flow::EditJob;
use super::variant::GenerationVariant;

/// a photo waiting for its variant and prompt
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub user_id: u64,
    pub chat_id: i64,
    pub source: SourceImage,
    pub prompt: Option<String>,
    pub variant: Option<GenerationVariant>,
    created_at: Instant,
}

impl PendingRequest {
    pub fn new(user_id: u64, chat_id: i64, source: SourceImage) -> Self {
        Self { user_id, chat_id, source, prompt: None, variant: None, created_at: Instant::now() }
    }

    /// `None` until both the variant and the prompt are known
    pub fn into_job(self) -> Option<EditJob> {
        Some(EditJob { variant: self.variant?, prompt: self.prompt?, source: Some(self.source) })
    }
}

pub struct SessionStore {
    ttl: Duration,
    pending: Mutex<HashMap<u64, PendingRequest>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, pending: Mutex::new(HashMap::new()) }
    }

    fn is_fresh(&self, request: &PendingRequest) -> bool {
        request.created_at.elapsed() < self.ttl
    }

    /// stores the request, replacing any earlier one from the same user
    pub fn put(&self, request: PendingRequest) {
        let user_id = request.user_id;
        if self.pending.lock().unwrap().insert(user_id, request).is_some() {
            log::debug!("replaced the pending request of {user_id}");
        }
    }

    pub fn select_variant(&self, user_id: u64, variant: GenerationVariant) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.get_mut(&user_id) {
            Some(request) if self.is_fresh(request) => {
                request.variant = Some(variant);
                true
            }
            _ => false,
        }
    }

    /// the user picked a variant for a photo sent in this chat
    pub fn awaiting_prompt(&self, user_id: u64, chat_id: i64) -> bool {
        self.pending.lock().unwrap().get(&user_id).is_some_and(|request| {
            request.chat_id == chat_id && request.variant.is_some() && self.is_fresh(request)
        })
    }

    pub fn take(&self, user_id: u64) -> Option<PendingRequest> {
        let request = self.pending.lock().unwrap().remove(&user_id)?;
        self.is_fresh(&request).then_some(request)
    }

    pub fn remove(&self, user_id: u64) -> bool {
        self.pending.lock().unwrap().remove(&user_id).is_some()
    }

    pub fn evict_expired(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        pending.retain(|_, request| self.is_fresh(request));
        before - pending.len()
    }
}
