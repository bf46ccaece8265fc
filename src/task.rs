use crate::error::{Result, SignlabError};
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Dedicated worker thread paired with a cooperative cancellation token
pub struct BackgroundTask<T> {
    name: String,
    token: CancellationToken,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Spawn `work` on a named thread; it receives the token to poll between units of work
    pub fn spawn<F>(name: &str, work: F) -> Result<Self>
    where
        F: FnOnce(CancellationToken) -> T + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || work(worker_token))
            .map_err(|e| {
                SignlabError::component(name.to_string(), format!("failed to spawn thread: {}", e))
            })?;

        debug!("Spawned background task '{}'", name);
        Ok(Self {
            name: name.to_string(),
            token,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request a stop without waiting; the worker exits at its next check
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the worker to exit and return its result
    pub fn join(mut self) -> Option<T> {
        self.join_inner()
    }

    /// Cancel and wait for the worker to exit
    pub fn stop(mut self) -> Option<T> {
        self.token.cancel();
        self.join_inner()
    }

    fn join_inner(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(value) => {
                debug!("Background task '{}' exited", self.name);
                Some(value)
            }
            Err(_) => {
                error!("Background task '{}' panicked", self.name);
                None
            }
        }
    }
}

impl<T> Drop for BackgroundTask<T> {
    fn drop(&mut self) {
        // Never leave a worker running unobserved
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
