use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::{AbortHandle, JoinHandle};

/// the user already has a flow in flight
#[derive(Debug)]
pub struct FlowBusy;

struct FlowHandle {
    id: u64,
    abort_handle: AbortHandle,
}

/// at most one running flow per user
#[derive(Default)]
pub struct FlowRegistry {
    flows: Mutex<HashMap<u64, FlowHandle>>,
    next_id: AtomicU64,
}

/// unregisters the flow when its task completes or is aborted
struct FlowGuard {
    registry: Arc<FlowRegistry>,
    user_id: u64,
    id: u64,
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        let mut flows = self.registry.flows.lock().unwrap();
        if flows.get(&self.user_id).is_some_and(|flow| flow.id == self.id) {
            flows.remove(&self.user_id);
        }
    }
}

impl FlowRegistry {
    pub fn spawn<F>(
        self: &Arc<Self>,
        user_id: u64,
        future: F,
    ) -> Result<JoinHandle<F::Output>, FlowBusy>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let mut flows = self.flows.lock().unwrap();
        if flows.contains_key(&user_id) {
            return Err(FlowBusy);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = FlowGuard { registry: Arc::clone(self), user_id, id };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            future.await
        });

        flows.insert(user_id, FlowHandle { id, abort_handle: handle.abort_handle() });
        drop(flows);

        Ok(handle)
    }

    pub fn cancel(&self, user_id: u64) -> bool {
        let Some(flow) = self.flows.lock().unwrap().remove(&user_id) else {
            return false;
        };

        flow.abort_handle.abort();
        log::info!("cancelled the flow of {user_id}");
        true
    }

    pub fn is_running(&self, user_id: u64) -> bool {
        self.flows.lock().unwrap().contains_key(&user_id)
    }

    pub fn abort_all(&self) -> usize {
        let flows = std::mem::take(&mut *self.flows.lock().unwrap());
        for flow in flows.values() {
            flow.abort_handle.abort();
        }
        flows.len()
    }
}
