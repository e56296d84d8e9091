use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use helpdesk_core::replies::{
    self, EMPTY_ARTICLE, GENERIC_DEFAULT, KNOWLEDGE_BASE_NOT_CONFIGURED,
    KNOWLEDGE_BASE_UNAVAILABLE, TICKET_FAILED, UNRECOGNIZED_INTENT,
};
use helpdesk_core::{DispatcherConfig, IntentRequest, Reply, SupportIntent, Ticket};
use helpdesk_notify::{EmailMessage, Notifier, SendOutcome};
use helpdesk_observability::AppMetrics;
use helpdesk_storage::{KnowledgeStore, LookupOutcome};
use tracing::{info, instrument, warn};

/// Maps one classified intent to one fulfilled reply. Collaborator failures
/// never escape; they become apology texts.
#[derive(Clone)]
pub struct IntentDispatcher<K, N>
where
    K: KnowledgeStore,
    N: Notifier,
{
    store: Arc<K>,
    notifier: Arc<N>,
    config: DispatcherConfig,
    metrics: Arc<AppMetrics>,
}

impl<K, N> IntentDispatcher<K, N>
where
    K: KnowledgeStore,
    N: Notifier,
{
    pub fn new(
        store: Arc<K>,
        notifier: Arc<N>,
        config: DispatcherConfig,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<K> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    pub async fn dispatch(&self, request: &IntentRequest) -> Reply {
        self.dispatch_at(request, Utc::now()).await
    }

    /// `now` only feeds ticket id generation.
    #[instrument(skip(self, request, now), fields(intent = %request.intent_name))]
    pub async fn dispatch_at(&self, request: &IntentRequest, now: DateTime<Utc>) -> Reply {
        let started = Instant::now();
        self.metrics.inc_request();

        let text = match SupportIntent::from_name(&request.intent_name) {
            Some(intent) if intent.is_faq() => self.answer_faq(intent).await.unwrap_or_default(),
            Some(_) => self.escalate(request, now).await,
            None => {
                self.metrics.inc_unrecognized();
                UNRECOGNIZED_INTENT.to_string()
            }
        };

        let text = if text.is_empty() {
            GENERIC_DEFAULT.to_string()
        } else {
            text
        };

        self.metrics.observe_latency(started.elapsed());
        info!(intent = %request.intent_name, "intent fulfilled");

        Reply::fulfilled(request.intent_name.clone(), text)
    }

    /// `None` when the article does not exist; the caller substitutes the
    /// generic default.
    async fn answer_faq(&self, intent: SupportIntent) -> Option<String> {
        let Some(table) = self.config.store_table_name.as_deref() else {
            warn!("knowledge store table name is not configured");
            self.metrics.inc_knowledge_failure();
            return Some(KNOWLEDGE_BASE_NOT_CONFIGURED.to_string());
        };

        match self.store.lookup(table, intent.name()).await {
            LookupOutcome::Answer(answer) => {
                self.metrics.inc_knowledge_hit();
                Some(answer)
            }
            LookupOutcome::EmptyArticle => {
                self.metrics.inc_knowledge_hit();
                Some(EMPTY_ARTICLE.to_string())
            }
            LookupOutcome::NotFound => {
                info!(table = %table, question = intent.name(), "no article for question");
                self.metrics.inc_knowledge_miss();
                None
            }
            LookupOutcome::Failed(error) => {
                warn!(table = %table, error = %error, "knowledge store lookup failed");
                self.metrics.inc_knowledge_failure();
                Some(KNOWLEDGE_BASE_UNAVAILABLE.to_string())
            }
        }
    }

    async fn escalate(&self, request: &IntentRequest, now: DateTime<Utc>) -> String {
        self.metrics.inc_escalation();
        let ticket = Ticket::open(request, now);

        let Some(support_address) = self.config.support_address.as_deref() else {
            warn!(ticket_id = %ticket.id, "support address is not configured");
            self.metrics.inc_notify_failure();
            return TICKET_FAILED.to_string();
        };

        let message = EmailMessage::escalation(&ticket, support_address);
        match self.notifier.send_email(&message).await {
            SendOutcome::Sent { message_id } => {
                info!(
                    ticket_id = %ticket.id,
                    priority = %ticket.priority,
                    message_id = message_id.as_deref().unwrap_or("unknown"),
                    "escalation email sent"
                );
                replies::ticket_created(&ticket.id, ticket.priority)
            }
            SendOutcome::Failed(error) => {
                warn!(ticket_id = %ticket.id, error = %error, "escalation email failed");
                self.metrics.inc_notify_failure();
                TICKET_FAILED.to_string()
            }
        }
    }
}
