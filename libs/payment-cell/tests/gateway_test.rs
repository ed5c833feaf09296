use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::services::gateway::PaymentGatewayClient;
use payment_cell::PaymentError;
use shared_config::AppConfig;

fn config_for(base_url: &str) -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/unused".to_string(),
        jwt_secret: "unused".to_string(),
        payment_base_url: base_url.to_string(),
        payment_key_id: "key_test_id".to_string(),
        payment_key_secret: "key_test_secret".to_string(),
        payment_webhook_secret: "webhook_secret".to_string(),
        tenant_cache_ttl_secs: 60,
        tenant_pool_max_connections: 5,
    }
}

#[test]
fn client_requires_provider_credentials() {
    let mut config = config_for("https://api.provider.example/v1");
    config.payment_key_id = String::new();

    assert_matches!(
        PaymentGatewayClient::new(&config),
        Err(PaymentError::NotConfigured)
    );
}

#[tokio::test]
async fn create_order_posts_and_parses_the_provider_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_MkWq3c8z",
            "amount": 50000,
            "currency": "INR",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PaymentGatewayClient::new(&config_for(&server.uri())).unwrap();
    let order = client
        .create_order(50000, "INR", "qe_test_receipt")
        .await
        .expect("order created");

    assert_eq!(order.id, "order_MkWq3c8z");
    assert_eq!(order.amount, 50000);
    assert_eq!(order.status, "created");
}

#[tokio::test]
async fn create_order_surfaces_provider_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "BAD_REQUEST_ERROR", "description": "Authentication failed"}
            })),
        )
        .mount(&server)
        .await;

    let client = PaymentGatewayClient::new(&config_for(&server.uri())).unwrap();
    let result = client.create_order(50000, "INR", "qe_test_receipt").await;

    assert_matches!(result, Err(PaymentError::Provider { .. }));
}
