//! Per-session turn scheduler.
//!
//! Guarantees at most one in-flight agent turn per session key while
//! letting a newly arrived message preempt the running one: the new event
//! lands in a one-slot pending queue (latest wins) and the interrupt latch
//! is raised. The running worker drains cooperatively, then picks up the
//! pending event with a fresh latch. Across sessions, workers run fully
//! concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use hermes_core::{InterruptHandle, MessageEvent, SessionKey};

use crate::invoker::AgentInvoker;

/// Per-session slot. Presence of an entry in the map means a worker is
/// active for that key; `pending` has capacity exactly one.
struct SessionSlot {
    interrupt: InterruptHandle,
    pending: Option<MessageEvent>,
    worker: Option<JoinHandle<()>>,
}

pub struct TurnScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: DashMap<SessionKey, SessionSlot>,
    invoker: Arc<AgentInvoker>,
}

impl TurnScheduler {
    pub fn new(invoker: Arc<AgentInvoker>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                invoker,
            }),
        }
    }

    /// Submit an inbound event. Non-blocking.
    ///
    /// With no active worker for the session, a worker is spawned on the
    /// event. Otherwise the event replaces any earlier pending one and the
    /// running turn is asked to stop.
    pub fn submit(&self, event: MessageEvent) {
        Inner::submit(&self.inner, event, false);
    }

    /// Number of sessions with an active worker.
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Ask every running turn to stop, then wait up to `timeout` for
    /// workers to drain; whatever remains is aborted.
    pub async fn drain(&self, timeout: Duration) {
        for entry in self.inner.sessions.iter() {
            entry.value().interrupt.set();
        }

        let deadline = Instant::now() + timeout;
        while !self.inner.sessions.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = self.inner.sessions.len();
        if remaining > 0 {
            warn!(count = remaining, "aborting workers still in flight");
            for entry in self.inner.sessions.iter() {
                if let Some(worker) = &entry.value().worker {
                    worker.abort();
                }
            }
            self.inner.sessions.clear();
        } else {
            info!("all workers drained");
        }
    }
}

impl Inner {
    fn submit(inner: &Arc<Inner>, event: MessageEvent, recovered: bool) {
        let key = event.source.session_key();
        match inner.sessions.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.pending.replace(event).is_some() {
                    debug!(key = %key, "pending slot overwritten, latest wins");
                }
                slot.interrupt.set();
            }
            Entry::Vacant(vacant) => {
                let interrupt = InterruptHandle::new();
                let worker = tokio::spawn(Self::run_worker(
                    Arc::clone(inner),
                    key.clone(),
                    event,
                    interrupt.clone(),
                    recovered,
                ));
                vacant.insert(SessionSlot {
                    interrupt,
                    pending: None,
                    worker: Some(worker),
                });
            }
        }
    }

    /// Worker loop for one session: run the turn, then either swap in the
    /// pending event (with a fresh interrupt latch) or release the slot.
    async fn run_worker(
        inner: Arc<Inner>,
        key: SessionKey,
        first: MessageEvent,
        first_interrupt: InterruptHandle,
        recovered: bool,
    ) {
        let mut event = first;
        let mut interrupt = first_interrupt;

        loop {
            let turn = std::panic::AssertUnwindSafe(inner.invoker.run_turn(&event, &interrupt))
                .catch_unwind()
                .await;

            if turn.is_err() {
                error!(key = %key, "worker panicked, releasing session");
                let pending = match inner.sessions.remove(&key) {
                    Some((_, slot)) => slot.pending,
                    None => None,
                };
                match pending {
                    Some(pending) if !recovered => {
                        warn!(key = %key, "re-submitting pending event after crash");
                        Self::submit(&inner, pending, true);
                    }
                    Some(_) => {
                        error!(key = %key, "dropping pending event, recovery already attempted");
                    }
                    None => {}
                }
                return;
            }

            // Swap in the pending event or release the slot, atomically
            // with respect to `submit`.
            let next = match inner.sessions.entry(key.clone()) {
                Entry::Occupied(mut occupied) => match occupied.get_mut().pending.take() {
                    Some(pending) => {
                        // Fresh latch: a raised interrupt never leaks into
                        // the next turn's agent call.
                        let fresh = InterruptHandle::new();
                        occupied.get_mut().interrupt = fresh.clone();
                        Some((pending, fresh))
                    }
                    None => {
                        occupied.remove();
                        None
                    }
                },
                Entry::Vacant(_) => None,
            };

            match next {
                Some((pending, fresh_interrupt)) => {
                    debug!(key = %key, "picking up pending event");
                    event = pending;
                    interrupt = fresh_interrupt;
                }
                None => return,
            }
        }
    }
}
