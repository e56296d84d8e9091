use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use helpdesk_core::Ticket;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub source: String,
    pub to_addresses: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// The support mailbox both sends and receives escalation mail.
    pub fn escalation(ticket: &Ticket, support_address: &str) -> Self {
        let subject = format!(
            "New IT Support Ticket: #{} [{}]",
            ticket.id, ticket.priority
        );
        let body = format!(
            "A new IT support ticket has been created by the chatbot.\n\n\
             Ticket ID: {}\n\
             Priority: {}\n\
             Issue Description: {}\n\n\
             Please assign a technician to follow up on this request.\n",
            ticket.id, ticket.priority, ticket.issue_description
        );

        Self {
            source: support_address.to_string(),
            to_addresses: vec![support_address.to_string()],
            subject,
            body,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("message has no recipients")]
    NoRecipients,
    #[error("mail relay unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug)]
pub enum SendOutcome {
    Sent { message_id: Option<String> },
    Failed(NotifyError),
}

pub trait Notifier: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome;
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    source: &'a str,
    destination: RelayDestination<'a>,
    message: RelayMessage<'a>,
}

#[derive(Debug, Serialize)]
struct RelayDestination<'a> {
    to_addresses: &'a [String],
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    subject: &'a str,
    body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct RelayResponse {
    #[serde(default, alias = "MessageId")]
    message_id: Option<String>,
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct HttpMailNotifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMailNotifier {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    async fn post(&self, message: &EmailMessage) -> Result<Option<String>, NotifyError> {
        if message.to_addresses.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let payload = RelayRequest {
            source: &message.source,
            destination: RelayDestination {
                to_addresses: &message.to_addresses,
            },
            message: RelayMessage {
                subject: &message.subject,
                body: &message.body,
            },
        };

        let mut request = self.client.post(self.endpoint.as_str()).json(&payload);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RelayResponse = serde_json::from_str(body.as_str()).unwrap_or_default();
        Ok(parsed.message_id)
    }
}

impl Notifier for HttpMailNotifier {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome {
        match self.post(message).await {
            Ok(message_id) => SendOutcome::Sent { message_id },
            Err(error) => SendOutcome::Failed(error),
        }
    }
}

/// Keeps messages in process instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct OutboxNotifier {
    sent: Arc<RwLock<Vec<EmailMessage>>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().clone()
    }
}

impl Notifier for OutboxNotifier {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome {
        if message.to_addresses.is_empty() {
            return SendOutcome::Failed(NotifyError::NoRecipients);
        }

        let message_id = Uuid::new_v4().to_string();
        info!(
            message_id = %message_id,
            to = ?message.to_addresses,
            subject = %message.subject,
            "email stored in outbox"
        );
        self.sent.write().push(message.clone());

        SendOutcome::Sent {
            message_id: Some(message_id),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Mailer {
    Http(HttpMailNotifier),
    Outbox(OutboxNotifier),
}

impl Mailer {
    pub fn outbox() -> Self {
        Self::Outbox(OutboxNotifier::new())
    }

    pub fn http(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        Ok(Self::Http(HttpMailNotifier::new(endpoint, token)?))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Mailer::Http(_) => "http_relay",
            Mailer::Outbox(_) => "outbox",
        }
    }
}

impl Notifier for Mailer {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome {
        match self {
            Mailer::Http(notifier) => notifier.send_email(message).await,
            Mailer::Outbox(notifier) => notifier.send_email(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use helpdesk_core::Priority;

    fn ticket() -> Ticket {
        Ticket {
            id: "IT-31337".to_string(),
            issue_description: "printer jam".to_string(),
            priority: Priority::High,
        }
    }

    async fn spawn_relay(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/send", addr)
    }

    #[test]
    fn escalation_message_names_ticket() {
        let message = EmailMessage::escalation(&ticket(), "helpdesk@example.com");

        assert_eq!(message.subject, "New IT Support Ticket: #IT-31337 [High]");
        assert_eq!(message.source, "helpdesk@example.com");
        assert_eq!(message.to_addresses, vec!["helpdesk@example.com".to_string()]);
        assert!(message.body.contains("Issue Description: printer jam"));
        assert!(message.body.contains("Priority: High"));
    }

    #[tokio::test]
    async fn outbox_records_messages() {
        let outbox = OutboxNotifier::new();
        let outcome = outbox
            .send_email(&EmailMessage::escalation(&ticket(), "helpdesk@example.com"))
            .await;

        assert!(matches!(outcome, SendOutcome::Sent { message_id: Some(_) }));
        assert_eq!(outbox.sent().len(), 1);
    }

    #[tokio::test]
    async fn http_relay_posts_message_with_token() {
        let router = Router::new().route(
            "/send",
            post(
                |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        == Some("Bearer relay-secret");
                    let well_formed = body["destination"]["to_addresses"][0]
                        == "helpdesk@example.com"
                        && body["message"]["subject"]
                            .as_str()
                            .is_some_and(|subject| subject.contains("IT-31337"));
                    if authorized && well_formed {
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({ "MessageId": "relay-1" })),
                        )
                    } else {
                        (StatusCode::BAD_REQUEST, Json(serde_json::json!({})))
                    }
                },
            ),
        );
        let endpoint = spawn_relay(router).await;

        let notifier = HttpMailNotifier::new(endpoint, Some("relay-secret".to_string())).unwrap();
        let outcome = notifier
            .send_email(&EmailMessage::escalation(&ticket(), "helpdesk@example.com"))
            .await;

        assert!(matches!(
            outcome,
            SendOutcome::Sent { message_id: Some(id) } if id == "relay-1"
        ));
    }

    #[tokio::test]
    async fn http_relay_rejection_is_a_failure() {
        let router = Router::new().route(
            "/send",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "mailbox full") }),
        );
        let endpoint = spawn_relay(router).await;

        let notifier = HttpMailNotifier::new(endpoint, None).unwrap();
        let outcome = notifier
            .send_email(&EmailMessage::escalation(&ticket(), "helpdesk@example.com"))
            .await;

        assert!(matches!(
            outcome,
            SendOutcome::Failed(NotifyError::Rejected { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn message_without_recipients_is_not_sent() {
        let mut message = EmailMessage::escalation(&ticket(), "helpdesk@example.com");
        message.to_addresses.clear();

        let notifier = HttpMailNotifier::new("http://127.0.0.1:9/send", None).unwrap();
        assert!(matches!(
            notifier.send_email(&message).await,
            SendOutcome::Failed(NotifyError::NoRecipients)
        ));
    }
}
