//! Bot main loop — feeds channel messages through the conversation engine.
//!
//! Each `(channel, user)` identity gets its own worker task and queue, so one
//! session's events are handled strictly in order while different sessions
//! run side by side.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::error;
use crate::flow::{ConversationEngine, Event, EventParser, LeadRecord, SessionId};
use crate::presentation::Presenter;

/// How often idle session workers are reaped.
const WORKER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Map an inbound message onto an engine event. `None` means ignore.
pub fn to_event(message: &IncomingMessage) -> Option<Event> {
    match &message.callback_data {
        Some(data) => Some(EventParser::callback(data)),
        None => EventParser::parse(&message.content),
    }
}

/// Shared handles every session worker needs.
#[derive(Clone)]
struct Deps {
    engine: Arc<ConversationEngine>,
    presenter: Arc<Presenter>,
    channels: Arc<ChannelManager>,
}

/// The lead-intake bot.
pub struct Bot {
    deps: Deps,
}

impl Bot {
    pub fn new(engine: ConversationEngine, presenter: Presenter, channels: ChannelManager) -> Self {
        Self {
            deps: Deps {
                engine: Arc::new(engine),
                presenter: Arc::new(presenter),
                channels: Arc::new(channels),
            },
        }
    }

    /// Run until Ctrl+C or until every channel stream ends. Messages already
    /// queued are handled and answered before this returns.
    pub async fn run(self) -> error::Result<()> {
        let mut message_stream = self.deps.channels.start_all().await?;
        let mut dispatcher = Dispatcher::new(self.deps.clone());

        let mut prune_interval = tokio::time::interval(WORKER_PRUNE_INTERVAL);
        prune_interval.tick().await; // Skip immediate first tick

        tracing::info!(
            channels = ?self.deps.channels.names(),
            "Lead bot ready and listening"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                _ = prune_interval.tick() => {
                    dispatcher.prune();
                    continue;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            dispatcher.dispatch(message);
        }

        drop(message_stream);
        dispatcher.finish().await;
        self.deps.channels.shutdown_all().await;

        Ok(())
    }
}

/// Routes messages to per-session worker tasks.
struct Dispatcher {
    deps: Deps,
    workers: HashMap<SessionId, Worker>,
}

struct Worker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    /// Messages queued or being handled. Only the dispatcher increments it.
    pending: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl Dispatcher {
    fn new(deps: Deps) -> Self {
        Self {
            deps,
            workers: HashMap::new(),
        }
    }

    fn dispatch(&mut self, message: IncomingMessage) {
        let session_id = SessionId::for_channel(&message.channel, &message.user_id);

        let message = match self.workers.get(&session_id) {
            Some(worker) => {
                worker.pending.fetch_add(1, Ordering::AcqRel);
                match worker.tx.send(message) {
                    Ok(()) => return,
                    // Worker gone; respawn below with the message handed back
                    Err(mpsc::error::SendError(message)) => message,
                }
            }
            None => message,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(1));
        // Fresh channel with a live receiver
        let _ = tx.send(message);
        let handle = tokio::spawn(session_worker(
            session_id.clone(),
            rx,
            Arc::clone(&pending),
            self.deps.clone(),
        ));
        tracing::debug!(session = %session_id, "Session worker started");
        self.workers.insert(session_id, Worker { tx, pending, handle });
    }

    /// Drop workers that are idle on a pristine session, or that have
    /// exited. Dropping the sender ends the worker's loop. Returns how many
    /// were removed.
    fn prune(&mut self) -> usize {
        let store = self.deps.engine.store();
        let before = self.workers.len();
        self.workers.retain(|session_id, worker| {
            let busy = worker.pending.load(Ordering::Acquire) > 0;
            !worker.handle.is_finished() && (busy || !store.get(session_id).is_pristine())
        });

        let removed = before - self.workers.len();
        if removed > 0 {
            tracing::debug!(removed, live = self.workers.len(), "Pruned idle session workers");
        }
        removed
    }

    /// Close every queue and wait for the workers to drain them.
    async fn finish(self) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .into_values()
            .map(|worker| {
                drop(worker.tx);
                worker.handle
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Session worker panicked: {e}");
            }
        }
    }
}

async fn session_worker(
    session_id: SessionId,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    pending: Arc<AtomicUsize>,
    deps: Deps,
) {
    while let Some(message) = rx.recv().await {
        handle_message(&session_id, &message, &deps).await;
        pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle one message to completion, responses included.
async fn handle_message(session_id: &SessionId, message: &IncomingMessage, deps: &Deps) {
    let Some(event) = to_event(message) else {
        tracing::debug!(session = %session_id, "Ignoring unrecognized command");
        return;
    };

    tracing::debug!(
        session = %session_id,
        user = message.user_name.as_deref().unwrap_or("-"),
        event = event.kind(),
        "Handling message"
    );

    let outcome = deps.engine.handle(session_id, event);
    if let Some(record) = outcome.record() {
        log_lead(record);
    }

    for response in deps.presenter.render(&outcome, message.is_callback()) {
        if let Err(e) = deps.channels.respond(message, response).await {
            tracing::warn!(
                session = %session_id,
                channel = %message.channel,
                "Failed to deliver response: {e}"
            );
        }
    }
}

fn log_lead(record: &LeadRecord) {
    match serde_json::to_string(record) {
        Ok(json) => tracing::info!(
            lead_id = %record.id,
            kind = ?record.kind,
            session = %record.session_id,
            lead = %json,
            "Lead submitted"
        ),
        Err(e) => tracing::warn!(lead_id = %record.id, "Failed to serialize lead: {e}"),
    }
}
