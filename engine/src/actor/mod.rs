//! Per-key actor runtime
//!
//! Guarantees serialized access to one key's durable state: every key gets
//! a dedicated tokio task owning a bounded mailbox, and requests against
//! that key are processed one at a time in arrival order. A request may
//! suspend at I/O (storage, inference) without ever interleaving with
//! another request on the same key, so check-then-increment and
//! read-append-write run as plain sequential code with no locks around the
//! state itself. Requests against different keys run fully independently.
//!
//! Actor tasks are created lazily on first dispatch to a key and live until
//! process exit. All durable state lives in SQLite, so a task that died
//! (or a process restart) is safe to respawn: the fresh actor observes
//! exactly what its predecessor persisted.

use sdk::errors::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

/// Mailbox capacity per key. A second request to a busy key queues here;
/// senders beyond capacity wait, which bounds memory per key.
const MAILBOX_CAPACITY: usize = 100;

/// A unit of per-key state with serialized request handling
///
/// `handle` has `&mut self`: the runtime never runs two requests against
/// the same actor concurrently, so handlers are free to read-modify-write
/// durable state without further coordination.
#[async_trait::async_trait]
pub trait Actor: Send + 'static {
    /// Request type accepted by this actor
    type Request: Send + 'static;

    /// Response type produced for each request
    type Response: Send + 'static;

    /// Execute one operation against this key's state
    async fn handle(&mut self, request: Self::Request) -> Self::Response;
}

/// One queued request plus its reply channel
struct Envelope<A: Actor> {
    request: A::Request,
    reply: oneshot::Sender<A::Response>,
}

/// Registry of per-key actor tasks for one actor type
///
/// The factory builds the actor for a key on first reference; the actor is
/// expected to hold its key and whatever store handles it needs.
pub struct ActorRuntime<A: Actor> {
    mailboxes: Mutex<HashMap<String, mpsc::Sender<Envelope<A>>>>,
    factory: Box<dyn Fn(&str) -> A + Send + Sync>,
}

impl<A: Actor> ActorRuntime<A> {
    /// Create a runtime with the given per-key actor factory
    pub fn new(factory: impl Fn(&str) -> A + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            mailboxes: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        })
    }

    /// Execute one operation against the actor addressed by `key`
    ///
    /// Creates the actor task on first reference. For a fixed key, calls
    /// are handled strictly one at a time in the order their envelopes
    /// enter the mailbox; the Nth call's effects are visible to the
    /// (N+1)th.
    pub async fn dispatch(&self, key: &str, request: A::Request) -> Result<A::Response, CoreError> {
        let sender = self.mailbox(key).await;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            request,
            reply: reply_tx,
        };

        if let Err(returned) = sender.send(envelope).await {
            // The key's task is gone (it only exits if its mailbox was
            // dropped). State is durable, so respawn and retry once.
            warn!("Actor task for key {} was gone; respawning", key);
            let sender = self.respawn(key).await;
            sender
                .send(returned.0)
                .await
                .map_err(|_| CoreError::MailboxClosed)?;
        }

        reply_rx.await.map_err(|_| CoreError::MailboxClosed)
    }

    /// Number of live actor tasks (for observability and tests)
    pub async fn active_actors(&self) -> usize {
        self.mailboxes.lock().await.len()
    }

    async fn mailbox(&self, key: &str) -> mpsc::Sender<Envelope<A>> {
        let mut mailboxes = self.mailboxes.lock().await;
        if let Some(sender) = mailboxes.get(key) {
            return sender.clone();
        }
        let sender = self.spawn_actor(key);
        mailboxes.insert(key.to_string(), sender.clone());
        sender
    }

    async fn respawn(&self, key: &str) -> mpsc::Sender<Envelope<A>> {
        let mut mailboxes = self.mailboxes.lock().await;
        let sender = self.spawn_actor(key);
        mailboxes.insert(key.to_string(), sender.clone());
        sender
    }

    fn spawn_actor(&self, key: &str) -> mpsc::Sender<Envelope<A>> {
        debug!("Spawning actor task for key: {}", key);
        let (tx, mut rx) = mpsc::channel::<Envelope<A>>(MAILBOX_CAPACITY);
        let mut actor = (self.factory)(key);

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let response = actor.handle(envelope.request).await;
                // The caller may have timed out and dropped the receiver;
                // the state change above still stands.
                let _ = envelope.reply.send(response);
            }
        });

        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    /// Counts read-modify-write cycles with a deliberate suspension point
    /// in the middle, so interleaved execution would lose increments.
    struct Counter {
        value: usize,
    }

    #[async_trait::async_trait]
    impl Actor for Counter {
        type Request = ();
        type Response = usize;

        async fn handle(&mut self, _request: ()) -> usize {
            let read = self.value;
            sleep(Duration::from_millis(2)).await;
            self.value = read + 1;
            self.value
        }
    }

    fn counter_runtime() -> Arc<ActorRuntime<Counter>> {
        ActorRuntime::new(|_key| Counter { value: 0 })
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let created = Arc::new(AtomicUsize::new(0));
        let created_clone = Arc::clone(&created);
        let runtime = ActorRuntime::new(move |_key| {
            created_clone.fetch_add(1, Ordering::SeqCst);
            Counter { value: 0 }
        });

        assert_eq!(runtime.active_actors().await, 0);
        runtime.dispatch("a", ()).await.unwrap();
        runtime.dispatch("a", ()).await.unwrap();
        runtime.dispatch("b", ()).await.unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.active_actors().await, 2);
    }

    #[tokio::test]
    async fn test_same_key_serializes_read_modify_write() {
        let runtime = counter_runtime();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let runtime = Arc::clone(&runtime);
            handles.push(tokio::spawn(
                async move { runtime.dispatch("k", ()).await },
            ));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        // Every increment survived: with interleaving, concurrent
        // read-modify-write cycles would have collapsed into fewer counts.
        results.sort_unstable();
        let expected: Vec<usize> = (1..=20).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn test_sequential_calls_observe_prior_effects() {
        let runtime = counter_runtime();

        for expected in 1..=5 {
            let value = runtime.dispatch("k", ()).await.unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let runtime = counter_runtime();

        assert_eq!(runtime.dispatch("a", ()).await.unwrap(), 1);
        assert_eq!(runtime.dispatch("b", ()).await.unwrap(), 1);
        assert_eq!(runtime.dispatch("a", ()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_different_keys_overlap_in_time() {
        struct Sleeper;

        #[async_trait::async_trait]
        impl Actor for Sleeper {
            type Request = ();
            type Response = ();

            async fn handle(&mut self, _request: ()) {
                sleep(Duration::from_millis(50)).await;
            }
        }

        let runtime = ActorRuntime::new(|_key| Sleeper);

        let start = std::time::Instant::now();
        let mut handles = Vec::new();
        for key in ["a", "b", "c", "d"] {
            let runtime = Arc::clone(&runtime);
            handles.push(tokio::spawn(async move {
                runtime.dispatch(key, ()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Four keys at ~50ms each: parallel execution finishes well under
        // the 200ms a serialized schedule would need.
        assert!(start.elapsed() < Duration::from_millis(150));
    }
}
