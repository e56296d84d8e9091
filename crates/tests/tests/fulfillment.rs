use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::Router;
use helpdesk_api::{build_app, build_router, ApiState, ServiceConfig};
use helpdesk_core::DispatcherConfig;
use helpdesk_dispatch::IntentDispatcher;
use helpdesk_notify::{Mailer, OutboxNotifier};
use helpdesk_observability::AppMetrics;
use helpdesk_storage::{Article, KnowledgeBase, MemoryKnowledgeStore};
use serde_json::{json, Value};
use tower::ServiceExt;

const SUPPORT: &str = "helpdesk@example.com";

fn seeded_store() -> KnowledgeBase {
    KnowledgeBase::Memory(MemoryKnowledgeStore::with_articles(
        "it-faq",
        [
            Article {
                question: "PasswordReset".to_string(),
                answer: Some("Go to company.com/login and click 'Forgot Password'.".to_string()),
            },
            Article {
                question: "EmailAccess".to_string(),
                answer: None,
            },
        ],
    ))
}

fn config(table: &str) -> DispatcherConfig {
    DispatcherConfig::new(Some(table.to_string()), Some(SUPPORT.to_string())).unwrap()
}

fn app(
    store: KnowledgeBase,
    mailer: Mailer,
    config: DispatcherConfig,
    api_key: Option<&str>,
) -> Router {
    let metrics = AppMetrics::shared();
    let dispatcher =
        IntentDispatcher::new(Arc::new(store), Arc::new(mailer), config, metrics.clone());
    build_router(ApiState::new(
        Arc::new(dispatcher),
        metrics,
        api_key.map(ToString::to_string),
    ))
}

fn event(intent: &str, slots: Value) -> Value {
    json!({
        "messageVersion": "1.0",
        "invocationSource": "FulfillmentCodeHook",
        "sessionId": "session-1",
        "inputTranscript": "help",
        "sessionState": {
            "sessionAttributes": { "channel": "web" },
            "intent": {
                "name": intent,
                "state": "ReadyForFulfillment",
                "slots": slots
            }
        }
    })
}

fn slot(value: &str) -> Value {
    json!({
        "shape": "Scalar",
        "value": {
            "originalValue": value,
            "interpretedValue": value,
            "resolvedValues": [value]
        }
    })
}

async fn post_event(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/fulfillment")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, parsed)
}

fn content(response: &Value) -> &str {
    response["messages"][0]["content"].as_str().unwrap_or_default()
}

async fn spawn_relay(status: StatusCode) -> String {
    let router = Router::new().route("/send", post(move || async move { status }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/send", addr)
}

#[tokio::test]
async fn health_is_public() {
    let app = app(seeded_store(), Mailer::outbox(), config("it-faq"), Some("secret"));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["capabilities"]["knowledge_backend"], "memory");
    assert_eq!(parsed["capabilities"]["notifier_backend"], "outbox");
}

#[tokio::test]
async fn fulfillment_requires_api_key_when_configured() {
    let app = app(seeded_store(), Mailer::outbox(), config("it-faq"), Some("secret"));

    let (status, _) = post_event(app.clone(), event("PasswordReset", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/fulfillment")
        .header("content-type", "application/json")
        .header("x-api-key", "secret")
        .body(Body::from(event("PasswordReset", json!({})).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn faq_intent_closes_with_article() {
    let app = app(seeded_store(), Mailer::outbox(), config("it-faq"), None);

    let (status, response) = post_event(app, event("PasswordReset", Value::Null)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response,
        json!({
            "sessionState": {
                "dialogAction": { "type": "Close" },
                "intent": { "name": "PasswordReset", "state": "Fulfilled" },
                "sessionAttributes": { "channel": "web" }
            },
            "messages": [{
                "contentType": "PlainText",
                "content": "Go to company.com/login and click 'Forgot Password'."
            }]
        })
    );
}

#[tokio::test]
async fn faq_intent_outcomes_without_answer() {
    let app = app(seeded_store(), Mailer::outbox(), config("it-faq"), None);

    let (_, missing) = post_event(app.clone(), event("WiFiTroubleshooting", json!({}))).await;
    assert_eq!(
        content(&missing),
        "I can help with IT issues. How can I assist you today?"
    );

    let (_, empty) = post_event(app, event("EmailAccess", json!({}))).await;
    assert_eq!(content(&empty), "I found an article but it seems to be empty.");
}

#[tokio::test]
async fn unreachable_table_apologises() {
    let app = app(seeded_store(), Mailer::outbox(), config("missing-table"), None);

    let (status, response) = post_event(app, event("PasswordReset", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content(&response),
        "I'm having trouble accessing my knowledge base right now."
    );
}

#[tokio::test]
async fn escalation_emails_support_and_confirms_ticket() {
    let outbox = OutboxNotifier::new();
    let app = app(
        seeded_store(),
        Mailer::Outbox(outbox.clone()),
        config("it-faq"),
        None,
    );

    let slots = json!({ "issue": slot("printer jam"), "priority": slot("High") });
    let (status, response) = post_event(app, event("EscalateToHuman", slots)).await;

    assert_eq!(status, StatusCode::OK);
    let text = content(&response);
    let ticket_id = text
        .split_whitespace()
        .find_map(|word| word.strip_prefix("#IT-"))
        .expect("reply should name the ticket");
    assert!(ticket_id.chars().all(|c| c.is_ascii_digit()));
    assert!(text.contains("High"));

    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].source, SUPPORT);
    assert!(sent[0].subject.contains(&format!("#IT-{ticket_id}")));
    assert!(sent[0].body.contains("printer jam"));
}

#[tokio::test]
async fn escalation_without_slots_uses_defaults() {
    let outbox = OutboxNotifier::new();
    let app = app(
        seeded_store(),
        Mailer::Outbox(outbox.clone()),
        config("it-faq"),
        None,
    );

    let slots = json!({ "issue": null, "priority": null });
    let (_, response) = post_event(app, event("EscalateToHuman", slots)).await;

    assert!(content(&response).contains("Medium priority"));
    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Issue Description: Not provided"));
}

#[tokio::test]
async fn escalation_relay_failure_apologises() {
    let endpoint = spawn_relay(StatusCode::SERVICE_UNAVAILABLE).await;
    let mailer = Mailer::http(endpoint, None).unwrap();
    let app = app(seeded_store(), mailer, config("it-faq"), None);

    let slots = json!({ "issue": slot("printer jam"), "priority": slot("High") });
    let (status, response) = post_event(app, event("EscalateToHuman", slots)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content(&response),
        "I'm sorry, I couldn't create your ticket. Please email IT support directly."
    );
}

#[tokio::test]
async fn escalation_relay_success_confirms() {
    let endpoint = spawn_relay(StatusCode::OK).await;
    let mailer = Mailer::http(endpoint, None).unwrap();
    let app = app(seeded_store(), mailer, config("it-faq"), None);

    let (_, response) = post_event(app, event("EscalateToHuman", json!({}))).await;

    assert!(content(&response).starts_with("Thanks! I've created ticket #IT-"));
}

#[tokio::test]
async fn unrecognized_intent_sends_nothing() {
    let outbox = OutboxNotifier::new();
    let app = app(
        seeded_store(),
        Mailer::Outbox(outbox.clone()),
        config("it-faq"),
        None,
    );

    let (_, response) = post_event(app, event("OrderPizza", json!({}))).await;

    assert_eq!(
        content(&response),
        "I'm not sure how to help with that. I can assist with password resets, WiFi issues, and email problems."
    );
    assert_eq!(response["sessionState"]["intent"]["name"], "OrderPizza");
    assert!(outbox.sent().is_empty());
}

#[tokio::test]
async fn event_without_intent_is_rejected() {
    let app = app(seeded_store(), Mailer::outbox(), config("it-faq"), None);

    let (status, _) = post_event(app, json!({ "sessionState": {} })).await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn build_app_seeds_sqlite_store() {
    let seed =
        std::env::temp_dir().join(format!("helpdesk-it-seed-{}.json", std::process::id()));
    std::fs::write(
        &seed,
        json!([
            { "question": "WiFiTroubleshooting", "answer": "Forget and rejoin the network." }
        ])
        .to_string(),
    )
    .unwrap();

    let service = ServiceConfig {
        bind: "127.0.0.1:0".to_string(),
        database_url: Some("sqlite::memory:".to_string()),
        kb_seed: Some(seed.clone()),
        dispatcher: config("it-faq"),
        ..ServiceConfig::default()
    };
    let app = build_app(service).await.expect("app should build");

    let (status, response) = post_event(app, event("WiFiTroubleshooting", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content(&response), "Forget and rejoin the network.");

    let _ = std::fs::remove_file(seed);
}
