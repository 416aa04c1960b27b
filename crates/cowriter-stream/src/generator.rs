use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::card::{FailureKind, Outcome, SuggestionCard};
use crate::collaborators::{MemoryStore, Notifier, ResponseStore, TracingNotifier};
use crate::config::GenerationOptions;
use crate::errors::GeneratorError;
use crate::reconciler::CardReconciler;
use crate::request::GenerationRequest;
use crate::source::EventSource;

/// Handle used to request cancellation of a running generation.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Requests cancellation.
    ///
    /// The read loop stops at its next await point and the card ends
    /// `Cancelled`. Has no effect once the card is terminal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

struct CardEntry {
    updates: watch::Receiver<SuggestionCard>,
    cancel: CancelHandle,
}

struct GeneratorInner {
    source: Arc<dyn EventSource>,
    store: Arc<dyn ResponseStore>,
    notifier: Arc<dyn Notifier>,
    options: GenerationOptions,
    cards: DashMap<uuid::Uuid, CardEntry>,
}

/// Entry point for running badge generations.
///
/// Each generation owns one card, driven by a dedicated task that is the
/// card's only writer. Readers observe cloned snapshots.
#[derive(Clone)]
pub struct Generator {
    inner: Arc<GeneratorInner>,
}

impl Generator {
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }

    /// Validates `request` and starts a generation on a new card.
    pub async fn start(&self, request: GenerationRequest) -> Result<GenerationHandle, GeneratorError> {
        self.launch(uuid::Uuid::new_v4(), request)
    }

    /// Cancels any in-flight run for `card_id` and starts over with a fresh
    /// card under the same id.
    pub async fn restart(
        &self,
        card_id: uuid::Uuid,
        request: GenerationRequest,
    ) -> Result<GenerationHandle, GeneratorError> {
        if !self.inner.cards.contains_key(&card_id) {
            return Err(GeneratorError::CardNotFound { card_id });
        }
        info!(card_id = %card_id, "restarting generation");
        self.launch(card_id, request)
    }

    /// Latest snapshot of a tracked card.
    pub fn card(&self, card_id: uuid::Uuid) -> Option<SuggestionCard> {
        self.inner
            .cards
            .get(&card_id)
            .map(|entry| entry.updates.borrow().clone())
    }

    pub fn card_ids(&self) -> Vec<uuid::Uuid> {
        self.inner.cards.iter().map(|entry| *entry.key()).collect()
    }

    /// Requests cancellation of the current run for `card_id`.
    pub fn cancel(&self, card_id: uuid::Uuid) -> Result<(), GeneratorError> {
        let entry = self
            .inner
            .cards
            .get(&card_id)
            .ok_or(GeneratorError::CardNotFound { card_id })?;
        entry.cancel.cancel();
        Ok(())
    }

    /// Stops tracking `card_id`, cancelling its run if one is in flight, and
    /// returns the card's last snapshot.
    pub fn remove(&self, card_id: uuid::Uuid) -> Result<SuggestionCard, GeneratorError> {
        let (_, entry) = self
            .inner
            .cards
            .remove(&card_id)
            .ok_or(GeneratorError::CardNotFound { card_id })?;
        entry.cancel.cancel();
        debug!(card_id = %card_id, "card removed");
        let card = entry.updates.borrow().clone();
        Ok(card)
    }

    /// Drops every card that has reached a terminal state and returns how
    /// many were dropped. Running cards are kept.
    pub fn prune_finished(&self) -> usize {
        let before = self.inner.cards.len();
        self.inner
            .cards
            .retain(|_, entry| !entry.updates.borrow().is_terminal());
        let pruned = before.saturating_sub(self.inner.cards.len());
        if pruned > 0 {
            debug!(pruned, "pruned finished cards");
        }
        pruned
    }

    pub fn store(&self) -> Arc<dyn ResponseStore> {
        self.inner.store.clone()
    }

    fn launch(
        &self,
        card_id: uuid::Uuid,
        request: GenerationRequest,
    ) -> Result<GenerationHandle, GeneratorError> {
        request.validate()?;

        let reconciler = CardReconciler::new(
            card_id,
            self.inner.store.clone(),
            self.inner.notifier.clone(),
        );
        let (updates_tx, updates_rx) = watch::channel(reconciler.card().clone());
        let (cancel, cancel_rx) = CancelHandle::new();

        let previous = self.inner.cards.insert(
            card_id,
            CardEntry {
                updates: updates_rx.clone(),
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        debug!(card_id = %card_id, source = self.inner.source.name(), "starting generation");
        let task = tokio::spawn(run_card(
            self.inner.source.clone(),
            request,
            reconciler,
            updates_tx,
            cancel_rx,
            self.inner.options.timeout,
        ));

        Ok(GenerationHandle {
            card_id,
            updates: updates_rx,
            cancel,
            task,
        })
    }
}

/// Builder for a [`Generator`].
#[derive(Default)]
pub struct GeneratorBuilder {
    source: Option<Arc<dyn EventSource>>,
    store: Option<Arc<dyn ResponseStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    options: GenerationOptions,
}

impl GeneratorBuilder {
    /// Sets the event source. Required.
    pub fn source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the response store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn ResponseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the notifier. Defaults to logging notifications.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Generator, GeneratorError> {
        let source = self
            .source
            .ok_or_else(|| GeneratorError::Config("generator requires an event source".into()))?;
        if self.options.timeout.is_some_and(|t| t.is_zero()) {
            return Err(GeneratorError::Config(
                "generation timeout must be greater than 0".into(),
            ));
        }
        let store: Arc<dyn ResponseStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingNotifier),
        };
        Ok(Generator {
            inner: Arc::new(GeneratorInner {
                source,
                store,
                notifier,
                options: self.options,
                cards: DashMap::new(),
            }),
        })
    }
}

/// Handle for one running generation.
///
/// `next_update()` yields card snapshots as they change; intermediate states
/// may be coalesced when the consumer falls behind. `finish()` waits for the
/// terminal card.
pub struct GenerationHandle {
    card_id: uuid::Uuid,
    updates: watch::Receiver<SuggestionCard>,
    cancel: CancelHandle,
    task: JoinHandle<SuggestionCard>,
}

impl GenerationHandle {
    pub fn card_id(&self) -> uuid::Uuid {
        self.card_id
    }

    /// Waits for the next card snapshot. Returns `None` once the run has
    /// ended and its final snapshot was seen.
    pub async fn next_update(&mut self) -> Option<SuggestionCard> {
        self.updates.changed().await.ok()?;
        Some(self.updates.borrow_and_update().clone())
    }

    /// Latest card snapshot.
    pub fn snapshot(&self) -> SuggestionCard {
        self.updates.borrow().clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Waits for the run to end and returns the terminal card.
    pub async fn finish(self) -> Result<SuggestionCard, GeneratorError> {
        self.task.await.map_err(|e| {
            GeneratorError::protocol_msg(format!(
                "card task for {} ended abnormally: {e}",
                self.card_id
            ))
        })
    }
}

enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

async fn run_card(
    source: Arc<dyn EventSource>,
    request: GenerationRequest,
    mut reconciler: CardReconciler,
    updates: watch::Sender<SuggestionCard>,
    mut cancel_rx: watch::Receiver<bool>,
    timeout: Option<Duration>,
) -> SuggestionCard {
    let interrupt = {
        let drive = drive(source.as_ref(), &request, &mut reconciler, &updates);
        tokio::pin!(drive);
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            () = &mut drive => None,
            () = cancelled(&mut cancel_rx) => Some(Interrupt::Cancelled),
            () = deadline => timeout.map(Interrupt::TimedOut),
        }
    };

    let outcome = match interrupt {
        Some(Interrupt::Cancelled) => reconciler.cancel(),
        Some(Interrupt::TimedOut(after)) => reconciler.fail(
            FailureKind::Timeout,
            format!("Generation timed out after {}s", after.as_secs_f64()),
        ),
        None => Outcome::Ignored,
    };
    if outcome != Outcome::Ignored {
        publish(&updates, &reconciler);
    }
    reconciler.into_card()
}

async fn drive(
    source: &dyn EventSource,
    request: &GenerationRequest,
    reconciler: &mut CardReconciler,
    updates: &watch::Sender<SuggestionCard>,
) {
    let card_id = reconciler.card().id();
    let mut events = match source.open(request).await {
        Ok(events) => events,
        Err(err) => {
            reconciler.fail(err.failure_kind(), err.message());
            publish(updates, reconciler);
            return;
        }
    };

    while let Some(next) = events.next().await {
        match next {
            Ok(event) => {
                debug!(card_id = %card_id, event = event.kind(), "applying stream event");
                if reconciler.apply(event) != Outcome::Ignored {
                    publish(updates, reconciler);
                }
                if reconciler.card().is_terminal() {
                    return;
                }
            }
            Err(err) => {
                reconciler.fail(err.failure_kind(), err.message());
                publish(updates, reconciler);
                return;
            }
        }
    }

    if reconciler.end_of_stream() != Outcome::Ignored {
        publish(updates, reconciler);
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn publish(updates: &watch::Sender<SuggestionCard>, reconciler: &CardReconciler) {
    updates.send_replace(reconciler.card().clone());
}
