//! In-process queue manager.
//!
//! [`MemoryBroker`] implements [`QueueTransport`] over plain in-memory queues.
//! It checks the same things a real queue manager does on connect (host
//! reachability, queue-manager name, credentials, TLS requirement, queue
//! existence) and can be told to break live connections or fail the next
//! gets with scripted reason codes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{MqError, MqMessage, QueueHandle, QueueTransport, ReasonCode, TlsContext};
use crate::config::ConnectionConfig;

#[derive(Debug, Default)]
struct QueueManagerState {
    queues: HashMap<String, VecDeque<MqMessage>>,
    credentials: Option<(String, String)>,
    tls_required: bool,
    /// Cipher suite the channel insists on
    channel_cipher: Option<String>,
}

#[derive(Debug)]
struct BrokerState {
    queue_managers: HashMap<String, QueueManagerState>,
    reachable: bool,
    /// Bumped by `break_connections`; handles from older generations are dead.
    generation: u64,
    scripted_failures: VecDeque<ReasonCode>,
}

/// Shared in-process queue manager registry.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    open_attempts: Arc<AtomicU64>,
    get_attempts: Arc<AtomicU64>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Create an empty, reachable broker.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                queue_managers: HashMap::new(),
                reachable: true,
                generation: 0,
                scripted_failures: VecDeque::new(),
            })),
            open_attempts: Arc::new(AtomicU64::new(0)),
            get_attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        // A panicked test thread must not wedge every other handle.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Define a queue (and its queue manager, if new).
    pub fn with_queue(self, queue_manager: &str, queue: &str) -> Self {
        self.lock()
            .queue_managers
            .entry(queue_manager.to_string())
            .or_default()
            .queues
            .entry(queue.to_string())
            .or_default();
        self
    }

    /// Require a user id / password pair on connect.
    pub fn with_credentials(self, queue_manager: &str, user: &str, password: &str) -> Self {
        self.lock()
            .queue_managers
            .entry(queue_manager.to_string())
            .or_default()
            .credentials = Some((user.to_string(), password.to_string()));
        self
    }

    /// Refuse connections that do not present a TLS context.
    pub fn with_tls_required(self, queue_manager: &str) -> Self {
        self.lock()
            .queue_managers
            .entry(queue_manager.to_string())
            .or_default()
            .tls_required = true;
        self
    }

    /// Require TLS with a specific cipher suite on the channel. A context that
    /// does not offer it is refused with 2393.
    pub fn with_channel_cipher(self, queue_manager: &str, cipher_suite: &str) -> Self {
        {
            let mut state = self.lock();
            let qm = state
                .queue_managers
                .entry(queue_manager.to_string())
                .or_default();
            qm.tls_required = true;
            qm.channel_cipher = Some(cipher_suite.to_string());
        }
        self
    }

    /// Put a message on a queue. Returns `false` when the queue is undefined.
    pub fn put(&self, queue_manager: &str, queue: &str, body: impl Into<Vec<u8>>) -> bool {
        let mut state = self.lock();
        match state
            .queue_managers
            .get_mut(queue_manager)
            .and_then(|qm| qm.queues.get_mut(queue))
        {
            Some(q) => {
                q.push_back(MqMessage::new(body));
                true
            }
            None => false,
        }
    }

    /// Current depth of a queue.
    pub fn depth(&self, queue_manager: &str, queue: &str) -> usize {
        self.lock()
            .queue_managers
            .get(queue_manager)
            .and_then(|qm| qm.queues.get(queue))
            .map_or(0, VecDeque::len)
    }

    /// Toggle host reachability for new connections.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Invalidate every open handle; their next get fails with 2009.
    pub fn break_connections(&self) {
        self.lock().generation += 1;
    }

    /// Fail the next get on any handle with `reason`. Queued in order.
    pub fn fail_next_get(&self, reason: ReasonCode) {
        self.lock().scripted_failures.push_back(reason);
    }

    /// Number of `open` calls seen.
    pub fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::Relaxed)
    }

    /// Number of `get` calls seen.
    pub fn get_attempts(&self) -> u64 {
        self.get_attempts.load(Ordering::Relaxed)
    }

    fn open_sync(
        &self,
        config: &ConnectionConfig,
        tls: Option<&TlsContext>,
    ) -> Result<MemoryQueueHandle, MqError> {
        self.open_attempts.fetch_add(1, Ordering::Relaxed);
        let state = self.lock();

        if !state.reachable {
            return Err(MqError::new(
                ReasonCode::HOST_NOT_AVAILABLE,
                format!("host {} is not reachable", config.address()),
            ));
        }

        let qm = state.queue_managers.get(&config.queue_manager).ok_or_else(|| {
            MqError::new(
                ReasonCode::Q_MGR_NAME_ERROR,
                format!("queue manager {} is not defined", config.queue_manager),
            )
        })?;

        if qm.tls_required && tls.is_none() {
            return Err(MqError::new(
                ReasonCode::SSL_INITIALIZATION_ERROR,
                format!("channel {} requires TLS", config.channel),
            ));
        }

        if let (Some(required), Some(tls)) = (&qm.channel_cipher, tls) {
            let offered = tls.cipher_suite_name().eq_ignore_ascii_case(required);
            if !offered {
                return Err(MqError::new(
                    ReasonCode::SSL_INITIALIZATION_ERROR,
                    format!("channel {} requires cipher suite {required}", config.channel),
                ));
            }
        }

        if let Some((user, password)) = &qm.credentials {
            let presented = (config.user_id.as_deref(), config.password.as_deref());
            if presented != (Some(user.as_str()), Some(password.as_str())) {
                return Err(MqError::new(
                    ReasonCode::NOT_AUTHORIZED,
                    format!(
                        "user {} not authorized",
                        config.user_id.as_deref().unwrap_or("<none>")
                    ),
                ));
            }
        }

        if !qm.queues.contains_key(&config.queue) {
            return Err(MqError::new(
                ReasonCode::UNKNOWN_OBJECT_NAME,
                format!("queue {} is not defined", config.queue),
            ));
        }

        Ok(MemoryQueueHandle {
            broker: self.clone(),
            queue_manager: config.queue_manager.clone(),
            queue: config.queue.clone(),
            generation: state.generation,
        })
    }
}

impl QueueTransport for MemoryBroker {
    fn open<'a>(
        &'a self,
        config: &'a ConnectionConfig,
        tls: Option<&'a TlsContext>,
    ) -> BoxFuture<'a, Result<Box<dyn QueueHandle>, MqError>> {
        async move {
            self.open_sync(config, tls)
                .map(|h| Box::new(h) as Box<dyn QueueHandle>)
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryQueueHandle {
    broker: MemoryBroker,
    queue_manager: String,
    queue: String,
    generation: u64,
}

impl MemoryQueueHandle {
    fn try_get(&self) -> Result<MqMessage, MqError> {
        let mut state = self.broker.lock();

        if state.generation != self.generation {
            return Err(MqError::new(
                ReasonCode::CONNECTION_BROKEN,
                format!("connection to {} was broken", self.queue_manager),
            ));
        }
        if let Some(reason) = state.scripted_failures.pop_front() {
            return Err(MqError::new(reason, "scripted failure"));
        }

        state
            .queue_managers
            .get_mut(&self.queue_manager)
            .and_then(|qm| qm.queues.get_mut(&self.queue))
            .ok_or_else(|| {
                MqError::new(
                    ReasonCode::UNKNOWN_OBJECT_NAME,
                    format!("queue {} no longer exists", self.queue),
                )
            })?
            .pop_front()
            .ok_or_else(|| MqError::new(ReasonCode::NO_MSG_AVAILABLE, "no message available"))
    }
}

impl QueueHandle for MemoryQueueHandle {
    fn get(&mut self, wait: Duration) -> BoxFuture<'_, Result<MqMessage, MqError>> {
        async move {
            self.broker.get_attempts.fetch_add(1, Ordering::Relaxed);
            match self.try_get() {
                Err(e) if e.reason == ReasonCode::NO_MSG_AVAILABLE && !wait.is_zero() => {
                    tokio::time::sleep(wait).await;
                    self.try_get()
                }
                other => other,
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            queue_manager: "QM1".to_string(),
            queue: "IN".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_and_get() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        assert!(broker.put("QM1", "IN", "hello"));
        assert_eq!(broker.depth("QM1", "IN"), 1);

        let mut handle = broker.open(&config(), None).await.unwrap();
        let msg = handle.get(Duration::ZERO).await.unwrap();
        assert_eq!(msg.body, b"hello");
        assert_eq!(broker.depth("QM1", "IN"), 0);

        let err = handle.get(Duration::ZERO).await.unwrap_err();
        assert_eq!(err.reason, ReasonCode::NO_MSG_AVAILABLE);
        assert_eq!(broker.get_attempts(), 2);
    }

    #[tokio::test]
    async fn test_open_failures() {
        let broker = MemoryBroker::new().with_queue("QM1", "OTHER");

        let err = broker.open(&config(), None).await.err().unwrap();
        assert_eq!(err.reason, ReasonCode::UNKNOWN_OBJECT_NAME);

        let mut cfg = config();
        cfg.queue_manager = "QM2".to_string();
        let err = broker.open(&cfg, None).await.err().unwrap();
        assert_eq!(err.reason, ReasonCode::Q_MGR_NAME_ERROR);

        broker.set_reachable(false);
        let err = broker.open(&config(), None).await.err().unwrap();
        assert_eq!(err.reason, ReasonCode::HOST_NOT_AVAILABLE);
        assert_eq!(broker.open_attempts(), 3);
    }

    #[tokio::test]
    async fn test_credentials_and_tls_requirement() {
        let broker = MemoryBroker::new()
            .with_queue("QM1", "IN")
            .with_credentials("QM1", "app", "passw0rd");

        let err = broker.open(&config(), None).await.err().unwrap();
        assert_eq!(err.reason, ReasonCode::NOT_AUTHORIZED);

        let mut cfg = config();
        cfg.user_id = Some("app".to_string());
        cfg.password = Some("passw0rd".to_string());
        assert!(broker.open(&cfg, None).await.is_ok());

        let broker = broker.with_tls_required("QM1");
        let err = broker.open(&cfg, None).await.err().unwrap();
        assert_eq!(err.reason, ReasonCode::SSL_INITIALIZATION_ERROR);
    }

    #[tokio::test]
    async fn test_break_connections() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        broker.put("QM1", "IN", "kept");

        let mut handle = broker.open(&config(), None).await.unwrap();
        broker.break_connections();
        let err = handle.get(Duration::ZERO).await.unwrap_err();
        assert_eq!(err.reason, ReasonCode::CONNECTION_BROKEN);
        assert_eq!(broker.depth("QM1", "IN"), 1);

        // New handles see the current generation
        let mut handle = broker.open(&config(), None).await.unwrap();
        assert!(handle.get(Duration::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        broker.fail_next_get(ReasonCode::GET_INHIBITED);
        broker.fail_next_get(ReasonCode(2195));

        let mut handle = broker.open(&config(), None).await.unwrap();
        assert_eq!(
            handle.get(Duration::ZERO).await.unwrap_err().reason,
            ReasonCode::GET_INHIBITED
        );
        assert_eq!(
            handle.get(Duration::ZERO).await.unwrap_err().reason,
            ReasonCode(2195)
        );
        assert_eq!(
            handle.get(Duration::ZERO).await.unwrap_err().reason,
            ReasonCode::NO_MSG_AVAILABLE
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_wait_picks_up_late_message() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        let mut handle = broker.open(&config(), None).await.unwrap();

        let producer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.put("QM1", "IN", "late");
        });

        let msg = handle.get(Duration::from_millis(50)).await.unwrap();
        assert_eq!(msg.body, b"late");
    }
}
