use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use transit_api::middleware::UserClaims;
use transit_api::state::{AppState, AuthConfig};
use transit_api::app;
use transit_catalog::{InMemoryCatalog, InMemoryRoutes, KeysetSearch, OfferingService, SearchLimits};
use transit_core::FixedClock;
use transit_order::{BookingCoordinator, BookingRules, InMemoryAccounts, InMemoryLedger};
use transit_store::app_config::RateLimitConfig;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    accounts: Arc<InMemoryAccounts>,
}

fn test_app() -> TestApp {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
    let catalog = Arc::new(InMemoryCatalog::new());
    let routes = Arc::new(InMemoryRoutes::new());
    let accounts = Arc::new(InMemoryAccounts::with_clock(clock.clone()));

    let state = AppState {
        bookings: Arc::new(BookingCoordinator::new(
            catalog.clone(),
            Arc::new(InMemoryLedger::new()),
            accounts.clone(),
            clock.clone(),
            BookingRules::default(),
        )),
        search: Arc::new(KeysetSearch::new(
            catalog.clone(),
            routes.clone(),
            clock.clone(),
            SearchLimits::default(),
        )),
        offerings: Arc::new(OfferingService::new(catalog, routes, clock)),
        redis: None,
        rate_limit: RateLimitConfig::default(),
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
    };

    TestApp {
        router: app(state),
        accounts,
    }
}

fn token(user_id: i64, role: &str) -> String {
    let claims = UserClaims {
        sub: format!("user-{}", user_id),
        id: user_id,
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(router: &Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn offering(hour: u32, minute: u32, price: i64, seats: i32) -> Value {
    json!({
        "type": "bus",
        "from": "Kazan",
        "to": "Samara",
        "departure_time": format!("2030-02-01T{:02}:{:02}:00Z", hour, minute),
        "arrival_time": format!("2030-02-01T{:02}:{:02}:00Z", hour + 1, minute),
        "price": price,
        "available_tickets": seats,
    })
}

async fn create_ticket(app: &TestApp, price: i64, seats: i32) -> i64 {
    let admin = token(99, "ADMIN");
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/tickets/create",
        Some(&admin),
        Some(offering(8, 0, price, seats)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ticket_creation_requires_admin() {
    let app = test_app();

    let (status, _) = send(&app.router, Method::POST, "/tickets/create", None, Some(offering(8, 0, 100, 5))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = token(1, "USER");
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/tickets/create",
        Some(&user),
        Some(offering(8, 0, 100, 5)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    create_ticket(&app, 100, 5).await;
}

#[tokio::test]
async fn test_search_walks_pages_with_cursor() {
    let app = test_app();
    let admin = token(99, "ADMIN");
    // Pairs of tickets share a departure time
    for i in 0..12u32 {
        let (status, _) = send(
            &app.router,
            Method::POST,
            "/tickets/create",
            Some(&admin),
            Some(offering(6 + i / 2, 0, 100, 3)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let mut seen = Vec::new();
    let mut filter = json!({ "type": "bus", "from": "Kazan", "to": "Samara", "page_size": 5 });
    let mut pages = 0;
    loop {
        let (status, body) = send(&app.router, Method::POST, "/tickets/search", None, Some(filter.clone())).await;
        assert_eq!(status, StatusCode::OK);
        pages += 1;

        for ticket in body["tickets"].as_array().unwrap() {
            seen.push((
                ticket["departure_time"].as_str().unwrap().to_string(),
                ticket["id"].as_i64().unwrap(),
            ));
        }

        match body.get("next_cursor").filter(|c| !c.is_null()) {
            Some(cursor) => {
                filter["last_departure_time"] = cursor["departure_time"].clone();
                filter["last_id"] = cursor["id"].clone();
            }
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 12);
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 12);
    assert_eq!(seen, sorted);
}

#[tokio::test]
async fn test_search_rejects_half_cursor_and_bad_page_size() {
    let app = test_app();
    create_ticket(&app, 100, 5).await;

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/tickets/search",
        None,
        Some(json!({ "from": "Kazan", "to": "Samara", "last_id": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/tickets/search",
        None,
        Some(json!({ "from": "Kazan", "to": "Samara", "page_size": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/tickets/search",
        None,
        Some(json!({ "from": "Kazan", "to": "Perm" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_booking_lifecycle() {
    let app = test_app();
    let ticket_id = create_ticket(&app, 300, 4).await;
    app.accounts.open_account(1, 1_000).await;
    let user = token(1, "USER");

    let (status, booking) = send(
        &app.router,
        Method::POST,
        "/bookings/create",
        Some(&user),
        Some(json!({ "ticket_id": ticket_id, "ticket_quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["total_price"], 600);
    assert_eq!(booking["status"], "pending");
    let booking_id = booking["id"].as_i64().unwrap();

    let (status, list) = send(&app.router, Method::GET, "/bookings/list", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let intruder = token(2, "USER");
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/bookings/cancel",
        Some(&intruder),
        Some(json!({ "booking_id": booking_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/bookings/cancel",
        Some(&user),
        Some(json!({ "booking_id": booking_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/bookings/cancel",
        Some(&user),
        Some(json!({ "booking_id": booking_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, list) = send(&app.router, Method::GET, "/bookings/list", Some(&user), None).await;
    assert_eq!(list[0]["status"], "canceled");
}

#[tokio::test]
async fn test_booking_rejections() {
    let app = test_app();
    let ticket_id = create_ticket(&app, 100, 1).await;
    app.accounts.open_account(1, 50).await;
    let user = token(1, "USER");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/bookings/create",
        None,
        Some(json!({ "ticket_id": ticket_id, "ticket_quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/bookings/create",
        Some(&user),
        Some(json!({ "ticket_id": ticket_id, "ticket_quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Insufficient balance"));

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/bookings/create",
        Some(&user),
        Some(json!({ "ticket_id": ticket_id, "ticket_quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/bookings/create",
        Some(&user),
        Some(json!({ "ticket_id": 404, "ticket_quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
