//! The monitor broadcast service.
//!
//! An explicitly constructed service object, created at group startup and
//! shut down at group teardown. Producers accrue entries between flushes;
//! each flush batches the pending entries into one `MonitorMessage`,
//! delivers matching entries to registered listeners, and hands the batch
//! to the outbound sink (the pipe transport boundary).
//!
//! Listener registration, removal, and delivery are individually atomic:
//! delivery runs with the registry lock held, so once `remove_listener`
//! returns the listener can no longer be delivered to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use pv_protocol::PeerId;

use crate::{MonitorEntry, MonitorError, MonitorMessage, MonitorMessageType};

/// Outbound boundary: receives each flushed batch for transmission.
pub trait MonitorSink: Send + Sync {
    fn deliver(&self, message: &MonitorMessage);
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A registered consumer of monitor entries. `None` filters match
/// everything; set filters must match the entry's tag exactly.
pub struct MonitorListener {
    context: Option<String>,
    sub_context: Option<String>,
    entry_type: Option<String>,
    callback: Box<dyn Fn(MonitorEntry) + Send + Sync>,
}

impl MonitorListener {
    pub fn new(
        context: Option<&str>,
        sub_context: Option<&str>,
        entry_type: Option<&str>,
        callback: impl Fn(MonitorEntry) + Send + Sync + 'static,
    ) -> Self {
        Self {
            context: context.map(str::to_string),
            sub_context: sub_context.map(str::to_string),
            entry_type: entry_type.map(str::to_string),
            callback: Box::new(callback),
        }
    }

    fn matches(&self, entry: &MonitorEntry) -> bool {
        self.context.as_deref().map_or(true, |c| c == entry.context())
            && self
                .sub_context
                .as_deref()
                .map_or(true, |s| s == entry.sub_context())
            && self
                .entry_type
                .as_deref()
                .map_or(true, |t| t == entry.entry_type())
    }
}

impl std::fmt::Debug for MonitorListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorListener")
            .field("context", &self.context)
            .field("sub_context", &self.sub_context)
            .field("entry_type", &self.entry_type)
            .finish()
    }
}

/// Periodic aggregation and broadcast of accrued monitor entries.
pub struct MonitorService {
    peer_id: PeerId,
    flush_interval: Duration,
    sink: Box<dyn MonitorSink>,
    listeners: Mutex<Vec<(ListenerId, MonitorListener)>>,
    next_listener_id: AtomicU64,
    pending: Mutex<Vec<MonitorEntry>>,
}

impl MonitorService {
    pub fn new(peer_id: PeerId, flush_interval: Duration, sink: Box<dyn MonitorSink>) -> Self {
        Self {
            peer_id,
            flush_interval,
            sink,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn add_listener(&self, listener: MonitorListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        listeners.push((id, listener));
        tracing::debug!(listeners = listeners.len(), "monitor listener added");
        id
    }

    /// Remove a listener. After this returns the listener is never
    /// delivered to again; delivery holds the same lock.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("listener registry poisoned");
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Queue an entry for the next flush.
    pub fn accrue_entry(&self, entry: MonitorEntry) {
        self.pending.lock().expect("pending buffer poisoned").push(entry);
    }

    /// Batch the pending entries into one monitor-type message, dispatch
    /// to listeners and the sink. Returns the message, or None when there
    /// was nothing to flush.
    pub fn flush(&self) -> Result<Option<MonitorMessage>, MonitorError> {
        let entries = {
            let mut pending = self.pending.lock().expect("pending buffer poisoned");
            std::mem::take(&mut *pending)
        };
        if entries.is_empty() {
            return Ok(None);
        }

        let mut message = MonitorMessage::new(MonitorMessageType::Monitor);
        message.set_peer_id(self.peer_id);
        for entry in entries {
            message.add_entry(entry);
        }
        message.validate()?;

        {
            let listeners = self.listeners.lock().expect("listener registry poisoned");
            for entry in message.get_entries(None) {
                for (_, listener) in listeners.iter() {
                    if listener.matches(entry) {
                        (listener.callback)(entry.clone());
                    }
                }
            }
        }

        self.sink.deliver(&message);
        tracing::debug!(
            entries = message.get_entries(None).len(),
            "monitor batch flushed"
        );
        Ok(Some(message))
    }

    /// Periodic flush loop. Runs until `shutdown` flips to true, then
    /// performs one final flush.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval = ?self.flush_interval, "monitor service running");
        let mut flush_tick = tokio::time::interval(self.flush_interval);
        // The first tick completes immediately; consume it so the first
        // real flush happens one interval in.
        flush_tick.tick().await;

        loop {
            tokio::select! {
                _ = flush_tick.tick() => {
                    if let Err(e) = self.flush() {
                        tracing::error!(error = %e, "monitor flush failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "final monitor flush failed");
        }
        tracing::info!("monitor service stopped");
    }
}

impl std::fmt::Debug for MonitorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorService")
            .field("peer_id", &self.peer_id)
            .field("flush_interval", &self.flush_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_protocol::Advertisement;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<MonitorMessage>>,
    }

    impl MonitorSink for RecordingSink {
        fn deliver(&self, message: &MonitorMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }
    }

    fn entry(context: &str, sub: &str, entry_type: &str) -> MonitorEntry {
        MonitorEntry::new(context, sub, Advertisement::new(entry_type, "<x/>"))
    }

    fn service_with_sink() -> (Arc<MonitorService>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let sink_handle = Arc::clone(&sink);
        struct Forward(Arc<RecordingSink>);
        impl MonitorSink for Forward {
            fn deliver(&self, message: &MonitorMessage) {
                self.0.deliver(message);
            }
        }
        let service = Arc::new(MonitorService::new(
            PeerId::new_unique(),
            Duration::from_millis(10),
            Box::new(Forward(sink_handle)),
        ));
        (service, sink)
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let (service, sink) = service_with_sink();
        assert!(service.flush().unwrap().is_none());
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn test_flush_batches_and_delivers() {
        let (service, sink) = service_with_sink();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_handle = Arc::clone(&received);
        service.add_listener(MonitorListener::new(
            Some("G1"),
            None,
            Some("jxta:PV3MonEntry"),
            move |e| received_handle.lock().unwrap().push(e),
        ));

        service.accrue_entry(entry("G1", "S1", "jxta:PV3MonEntry"));
        service.accrue_entry(entry("G1", "S1", "other"));
        service.accrue_entry(entry("G2", "S1", "jxta:PV3MonEntry"));

        let message = service.flush().unwrap().expect("message");
        assert_eq!(message.get_entries(None).len(), 3);
        assert_eq!(message.peer_id(), service.peer_id());

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].context(), "G1");

        assert_eq!(sink.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_removed_listener_not_delivered() {
        let (service, _sink) = service_with_sink();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_handle = Arc::clone(&received);
        let id = service.add_listener(MonitorListener::new(None, None, None, move |e| {
            received_handle.lock().unwrap().push(e)
        }));

        assert!(service.remove_listener(id));
        assert!(!service.remove_listener(id));

        service.accrue_entry(entry("G1", "S1", "t"));
        service.flush().unwrap();
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_flushes_until_shutdown() {
        let (service, sink) = service_with_sink();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        service.accrue_entry(entry("G1", "S1", "t"));
        let task = tokio::spawn(Arc::clone(&service).run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        service.accrue_entry(entry("G1", "S2", "t"));
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        // At least one periodic flush plus the final flush on shutdown.
        assert!(sink.messages.lock().unwrap().len() >= 2);
    }
}
