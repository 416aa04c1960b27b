use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::card::{FailureKind, Outcome, SuggestionCard};
use crate::collaborators::{Notification, Notifier, ResponseStore, ResponseStoreExt};
use crate::stream::StreamEvent;

/// Sole writer of one card's state.
///
/// Wraps [`SuggestionCard`] transitions with their side effects: completed
/// cards are persisted and announced, failed cards are announced, cancelled
/// cards stay silent. Store failures are logged and never change the card.
pub struct CardReconciler {
    card: SuggestionCard,
    store: Arc<dyn ResponseStore>,
    notifier: Arc<dyn Notifier>,
}

impl CardReconciler {
    /// Creates a reconciler for `card_id` with the card already `Connecting`.
    pub fn new(
        card_id: uuid::Uuid,
        store: Arc<dyn ResponseStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut card = SuggestionCard::new(card_id);
        card.begin();
        Self {
            card,
            store,
            notifier,
        }
    }

    pub fn card(&self) -> &SuggestionCard {
        &self.card
    }

    pub fn into_card(self) -> SuggestionCard {
        self.card
    }

    pub fn apply(&mut self, event: StreamEvent) -> Outcome {
        let outcome = self.card.apply(event);
        self.after(&outcome);
        outcome
    }

    pub fn end_of_stream(&mut self) -> Outcome {
        let outcome = self.card.end_of_stream();
        self.after(&outcome);
        outcome
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> Outcome {
        let outcome = self.card.fail(kind, message);
        self.after(&outcome);
        outcome
    }

    pub fn cancel(&mut self) -> Outcome {
        let outcome = self.card.cancel();
        self.after(&outcome);
        outcome
    }

    fn after(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed { raw } => self.on_complete(raw),
            Outcome::Failed => {
                let message = self.card.error().unwrap_or_default();
                self.notifier
                    .notify(Notification::failure("Badge generation failed", message));
            }
            Outcome::Ignored | Outcome::Updated | Outcome::Cancelled => {}
        }
    }

    fn on_complete(&self, raw: &Value) {
        let card_id = self.card.id();
        if let Err(err) = self.store.save_final_response(card_id, raw.clone()) {
            warn!(card_id = %card_id, error = %err, "failed to persist final response");
        }
        let Some(suggestion) = self.card.data() else {
            return;
        };
        if let Err(err) = self.store.save_selected_suggestion(card_id, suggestion) {
            warn!(card_id = %card_id, error = %err, "failed to persist selected suggestion");
        }
        let description = if suggestion.title().is_empty() {
            "A badge suggestion is ready for review".to_string()
        } else {
            format!("\"{}\" is ready for review", suggestion.title())
        };
        self.notifier
            .notify(Notification::success("Badge suggestion generated", description));
    }
}
