use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use devboostly_api::{app, state::{AppState, AuthConfig}};
use devboostly_catalog::{Catalog, Product, ProductType};
use devboostly_core::mock_gateway::CARD_OK;
use devboostly_core::{MockGateway, PaymentGateway, RecordingPublisher};
use devboostly_order::repository::UserRepository;
use devboostly_order::{InMemoryStore, OrchestratorConfig, Role, User};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@devboostly.test";
const WEBHOOK_SECRET: &str = "whsec_api_test";

struct TestApp {
    router: Router,
    gateway: Arc<MockGateway>,
    store: Arc<InMemoryStore>,
}

fn product(id: &str, product_type: ProductType, price_cents: i64) -> Product {
    Product {
        id: id.to_string(),
        product_type,
        name: id.to_string(),
        description: None,
        price_cents,
        billing_period: None,
        features: vec![],
        is_active: true,
    }
}

fn test_app() -> TestApp {
    test_app_with(Some(ADMIN_EMAIL))
}

fn test_app_with(bootstrap_admin_email: Option<&str>) -> TestApp {
    let gateway = Arc::new(MockGateway::new());
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(
        store.clone(),
        gateway.clone(),
        Arc::new(RecordingPublisher::new()),
        Catalog::new(vec![
            product("site-vitrine", ProductType::Offer, 59900),
            product("pack-essentiel", ProductType::Pack, 12900),
        ]),
        OrchestratorConfig::default(),
        AuthConfig {
            secret: "api-test-secret-api-test".to_string(),
            expiration: 3600,
            bootstrap_admin_email: bootstrap_admin_email.map(str::to_string),
        },
    )
    .with_webhook_secret(Some(WEBHOOK_SECRET.to_string()));

    TestApp { router: app(state), gateway, store }
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "name": "Jeanne Martin", "password": "s3cret-password" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_order(&self, token: &str, item_id: &str, item_type: &str) -> Value {
        let (status, order) = self
            .call(
                "POST",
                "/api/orders",
                Some(token),
                Some(json!({
                    "itemId": item_id,
                    "itemType": item_type,
                    "projectDetails": { "projectName": "Boulangerie Martin", "description": "Showcase site" },
                    "billingInfo": {
                        "fullName": "Jeanne Martin",
                        "email": "jeanne@example.com",
                        "address": "1 rue de la Paix",
                        "city": "Paris",
                        "postalCode": "75002",
                        "country": "FR"
                    }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", order);
        order
    }

    /// Opens the intent and has the customer pay it with a good card.
    async fn pay(&self, token: &str, uri: &str) -> String {
        let (status, session) = self.call("POST", uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK, "{}", session);
        assert!(session["clientSecret"].as_str().is_some());
        let intent_id = session["paymentIntentId"].as_str().unwrap().to_string();
        self.gateway.confirm_intent(&intent_id, CARD_OK).await.unwrap();
        intent_id
    }
}

fn sign(payload: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = app.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "in_memory");
}

#[tokio::test]
async fn test_register_login_me() {
    let app = test_app();
    let token = app.register("Jeanne@Example.com").await;

    let (status, me) = app.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "jeanne@example.com");
    assert_eq!(me["role"], "client");
    assert!(me.get("passwordHash").is_none());

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "jeanne@example.com", "name": "Again", "password": "another-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = app
        .call("POST", "/api/auth/login", None, Some(json!({ "email": "jeanne@example.com", "password": "wrong-password" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call("POST", "/api/auth/login", None, Some(json!({ "email": "JEANNE@example.com", "password": "s3cret-password" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn test_auth_required_and_admin_guard() {
    let app = test_app();

    let (status, body) = app.call("GET", "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = app.call("GET", "/api/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let client = app.register("client@example.com").await;
    let (status, _) = app.call("GET", "/api/admin/stats", Some(&client), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.register(ADMIN_EMAIL).await;
    let (status, stats) = app.call("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalUsers"], 2);
}

#[tokio::test]
async fn test_register_without_bootstrap_email_is_never_admin() {
    let app = test_app_with(None);

    for email in ["admin@devboostly.local", ADMIN_EMAIL, "first@example.com"] {
        let token = app.register(email).await;
        let (_, me) = app.call("GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(me["role"], "client", "{}", email);

        let (status, _) = app.call("GET", "/api/admin/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_bootstrap_email_ignored_once_an_admin_exists() {
    let app = test_app();
    let owner = User::new("owner@devboostly.test", "Owner".to_string(), "not-a-hash".to_string(), Role::Admin);
    app.store.insert_user(&owner).await.unwrap();

    let token = app.register(ADMIN_EMAIL).await;
    let (_, me) = app.call("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(me["role"], "client");
}

#[tokio::test]
async fn test_catalog_is_public() {
    let app = test_app();
    let (status, body) = app.call("GET", "/api/catalog", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offers"][0]["id"], "site-vitrine");
    assert_eq!(body["packs"][0]["priceCents"], 12900);
}

#[tokio::test]
async fn test_offer_deposit_then_balance() {
    let app = test_app();
    let token = app.register("jeanne@example.com").await;
    let admin = app.register(ADMIN_EMAIL).await;

    let order = app.create_order(&token, "site-vitrine", "offer").await;
    let id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["deposit"]["amount"], 23960);
    assert_eq!(order["balance"]["amount"], 35940);
    assert_eq!(order["phase"], "CREATED");

    let intent = app.pay(&token, &format!("/api/orders/{}/pay-deposit", id)).await;
    let (_, pending) = app.call("GET", &format!("/api/orders/{}", id), Some(&token), None).await;
    assert_eq!(pending["phase"], "DEPOSIT_PENDING");

    let (status, paid) = app
        .call(
            "POST",
            &format!("/api/orders/{}/confirm-deposit", id),
            Some(&token),
            Some(json!({ "orderId": id, "paymentIntentId": intent })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", paid);
    assert_eq!(paid["paymentStatus"], "deposit_paid");
    assert_eq!(paid["phase"], "DEPOSIT_PAID");
    assert!(paid["message"].as_str().is_some());

    // Balance opens only once the work is delivered
    let (status, body) = app.call("POST", &format!("/api/orders/{}/pay-balance", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, completed) = app
        .call(
            "PATCH",
            &format!("/api/admin/orders/{}/status", id),
            Some(&admin),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["phase"], "BALANCE_ELIGIBLE");

    let intent = app.pay(&token, &format!("/api/orders/{}/pay-balance", id)).await;
    let (status, paid) = app
        .call(
            "POST",
            &format!("/api/orders/{}/confirm-balance", id),
            Some(&token),
            Some(json!({ "orderId": id, "paymentIntentId": intent })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", paid);
    assert_eq!(paid["paymentStatus"], "paid");
    assert_eq!(paid["phase"], "FULLY_PAID");

    let (status, invoices) = app.call("GET", "/api/invoices", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoices.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_confirm_rejects_mismatched_body() {
    let app = test_app();
    let token = app.register("jeanne@example.com").await;
    let order = app.create_order(&token, "pack-essentiel", "pack").await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/orders/{}/confirm-deposit", id),
            Some(&token),
            Some(json!({ "orderId": uuid::Uuid::new_v4(), "paymentIntentId": "pi_x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = test_app();
    let owner = app.register("owner@example.com").await;
    let other = app.register("other@example.com").await;
    let order = app.create_order(&owner, "site-vitrine", "offer").await;

    let (status, _) = app
        .call("GET", &format!("/api/orders/{}", order["id"].as_str().unwrap()), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quote_review_accept_and_pay() {
    let app = test_app();
    let token = app.register("jeanne@example.com").await;
    let admin = app.register(ADMIN_EMAIL).await;

    let (status, quote) = app
        .call(
            "POST",
            "/api/quotes",
            Some(&token),
            Some(json!({
                "name": "Jeanne Martin",
                "email": "jeanne@example.com",
                "projectType": "e-commerce",
                "description": "Online shop for our bakery"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", quote);
    let id = quote["id"].as_str().unwrap().to_string();

    // Nothing to pay before staff priced it
    let (status, _) = app.call("POST", &format!("/api/quotes/{}/init-payment", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, reviewed) = app
        .call(
            "POST",
            &format!("/api/admin/quotes/{}/review", id),
            Some(&admin),
            Some(json!({ "action": "send", "proposedAmount": 250000 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", reviewed);
    assert_eq!(reviewed["status"], "sent");

    let intent = app.pay(&token, &format!("/api/quotes/{}/init-payment", id)).await;
    let (status, accepted) = app
        .call(
            "POST",
            &format!("/api/quotes/{}/accept", id),
            Some(&token),
            Some(json!({ "paymentIntentId": intent })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", accepted);
    assert_eq!(accepted["quote"]["status"], "accepted");
    assert_eq!(accepted["order"]["amount"], 250000);
    assert_eq!(accepted["order"]["deposit"]["amount"], 100000);
    assert_eq!(accepted["order"]["deposit"]["paid"], true);

    // A retried accept replays the first result instead of creating a second order
    let (status, again) = app
        .call(
            "POST",
            &format!("/api/quotes/{}/accept", id),
            Some(&token),
            Some(json!({ "paymentIntentId": intent })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["order"]["id"], accepted["order"]["id"]);
    let (_, orders) = app.call("GET", "/api/orders", Some(&token), None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_anonymous_quote_request() {
    let app = test_app();
    let (status, quote) = app
        .call(
            "POST",
            "/api/quotes",
            None,
            Some(json!({
                "name": "Paul",
                "email": "paul@example.com",
                "projectType": "landing",
                "description": "One page"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(quote["status"], "pending");

    let (status, body) = app
        .call("POST", "/api/quotes", None, Some(json!({ "email": "paul@example.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_ticket_thread() {
    let app = test_app();
    let token = app.register("jeanne@example.com").await;
    let admin = app.register(ADMIN_EMAIL).await;

    let (status, ticket) = app
        .call(
            "POST",
            "/api/tickets",
            Some(&token),
            Some(json!({ "subject": "Invoice address", "category": "billing", "message": "Please fix the city" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", ticket);
    let id = ticket["id"].as_str().unwrap().to_string();

    let (status, answered) = app
        .call(
            "POST",
            &format!("/api/admin/tickets/{}/messages", id),
            Some(&admin),
            Some(json!({ "body": "Done" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["status"], "answered");
    assert_eq!(answered["messages"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .call(
            "PATCH",
            &format!("/api/admin/tickets/{}/status", id),
            Some(&admin),
            Some(json!({ "status": "closed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call("POST", &format!("/api/tickets/{}/messages", id), Some(&token), Some(json!({ "body": "Thanks" })))
        .await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_settles_deposit() {
    let app = test_app();
    let token = app.register("jeanne@example.com").await;
    let order = app.create_order(&token, "site-vitrine", "offer").await;
    let id = order["id"].as_str().unwrap().to_string();
    let intent = app.pay(&token, &format!("/api/orders/{}/pay-deposit", id)).await;

    let payload = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent } }
    })
    .to_string();

    let tampered = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Stripe-Signature", sign("{}", chrono::Utc::now().timestamp()))
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app.router.clone().oneshot(tampered).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let signed = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Stripe-Signature", sign(&payload, chrono::Utc::now().timestamp()))
        .body(Body::from(payload))
        .unwrap();
    let response = app.router.clone().oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, order) = app.call("GET", &format!("/api/orders/{}", id), Some(&token), None).await;
    assert_eq!(order["deposit"]["paid"], true);
    assert_eq!(order["paymentStatus"], "deposit_paid");
}
