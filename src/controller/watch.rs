//! Bounded watch sessions
//!
//! A session is a finite stream of change events for one namespace. It ends
//! when its timeout elapses, when the server closes the connection, or when
//! the connection fails; none of these is an error. Nothing is carried over
//! between sessions, so every session starts with a replay of `Added` events.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, warn};

use super::client::WorkloadClient;
use super::types::ChangeEvent;

pub struct WatchSessionManager {
    client: Arc<dyn WorkloadClient>,
}

impl WatchSessionManager {
    pub fn new(client: Arc<dyn WorkloadClient>) -> Self {
        Self { client }
    }

    /// Open a session that yields events for at most `timeout`.
    ///
    /// The bound holds even if the server ignores its own watch timeout or
    /// never sends an event.
    pub async fn open(
        &self,
        namespace: &str,
        timeout: Duration,
    ) -> BoxStream<'static, ChangeEvent> {
        let deadline = Instant::now() + timeout;

        match timeout_at(deadline, self.client.list_and_watch(namespace, timeout)).await {
            Ok(events) => {
                debug!(namespace = %namespace, "Watch session opened");
                events.take_until(sleep_until(deadline)).boxed()
            }
            Err(_) => {
                warn!(
                    namespace = %namespace,
                    classification = "TransientWatchFailure",
                    "Watch did not open within {:?}", timeout
                );
                stream::empty().boxed()
            }
        }
    }
}
