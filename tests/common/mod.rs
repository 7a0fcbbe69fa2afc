//! Shared fixtures for the end-to-end checkout tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, ORIGIN, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub use workshop_checkout::config::AppConfig;
pub use workshop_checkout::db::{MemoryStore, Store};
pub use workshop_checkout::gateway::{GatewayError, GatewayReply, GatewayRequest, PaymentGateway};
pub use workshop_checkout::models::*;
pub use workshop_checkout::routes::create_routes;
pub use workshop_checkout::session::MemorySessionStore;
pub use workshop_checkout::state::AppState;

pub const SITE_ORIGIN: &str = "http://localhost:3001";
pub const STAFF_TOKEN: &str = "staff-secret";
pub const GATEWAY_PAGE: &str = "<html><body>Pay here</body></html>";

/// Records every payment request and answers with a canned page after
/// `delay`.
pub struct MockGateway {
    requests: Mutex<Vec<GatewayRequest>>,
    status: u16,
    delay: Duration,
}

impl MockGateway {
    pub fn new(status: u16, delay: Duration) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
            delay,
        }
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn submit(&self, request: &GatewayRequest) -> Result<GatewayReply, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        Ok(GatewayReply {
            status: self.status,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: Bytes::from_static(GATEWAY_PAGE.as_bytes()),
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| {
        let value = match key {
            "PAYMENT_URL" => "https://pay.example.edu/checkout",
            "PAYMENT_LMID" => "LM-42",
            "PAYMENT_TITLE" => "Workshops",
            "PAYMENT_DESCRIPTION" => "Workshop registration",
            "PSF_SPEEDTYPE" => "SPD123",
            "PSF_ACCT_NUMBER" => "ACCT-9",
            "STAFF_TOKEN" => STAFF_TOKEN,
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test configuration is valid")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.text());
        assert_eq!(self.location(), Some(to));
    }
}

/// A router over in-memory backends plus a browser-like cookie jar holding
/// the session cookie.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    cookie: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway_status(200)
    }

    pub fn with_gateway_status(status: u16) -> Self {
        Self::with_gateway(status, Duration::ZERO)
    }

    /// A gateway that takes `delay` to answer, to keep requests in flight.
    pub fn with_gateway(status: u16, delay: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new(status, delay));
        let state = AppState::new(
            store.clone(),
            Arc::new(MemorySessionStore::new(Duration::from_secs(3600))),
            gateway.clone(),
            test_config(),
        );
        Self {
            router: create_routes(state),
            store,
            gateway,
            cookie: None,
        }
    }

    /// Forgets the session cookie, like a second browser.
    pub fn clear_cookies(&mut self) {
        self.cookie = None;
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        if let Some(set_cookie) = headers.get(SET_COOKIE).and_then(|v| v.to_str().ok()) {
            let pair = set_cookie.split(';').next().unwrap_or_default();
            self.cookie = Some(pair.to_string());
        }
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, pairs: &[(&str, &str)]) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(ORIGIN, SITE_ORIGIN)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form(pairs)))
            .unwrap();
        self.send(request).await
    }

    /// Posts the rate selection for `slug`.
    pub async fn select(
        &mut self,
        slug: &str,
        name: &str,
        email: &str,
        quantities: &[(&Rate, u32)],
    ) -> TestResponse {
        let quantities: Vec<(String, String)> = quantities
            .iter()
            .map(|(rate, quantity)| (format!("rate-{}", rate.id), quantity.to_string()))
            .collect();
        let mut pairs = vec![("name", name), ("email", email)];
        pairs.extend(quantities.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.post_form(&format!("/{}/", slug), &pairs).await
    }

    /// Posts one attendee per `(rate, name, email)`, in slot order.
    pub async fn enter_attendees(
        &mut self,
        slug: &str,
        attendees: &[(&Rate, &str, &str)],
    ) -> TestResponse {
        let mut owned = vec![("form-TOTAL_FORMS".to_string(), attendees.len().to_string())];
        for (i, (rate, name, email)) in attendees.iter().enumerate() {
            owned.push((format!("form-{}-rate", i), rate.id.to_string()));
            owned.push((format!("form-{}-name", i), name.to_string()));
            owned.push((format!("form-{}-email", i), email.to_string()));
        }
        let pairs: Vec<(&str, &str)> = owned
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.post_form(&format!("/{}/order/", slug), &pairs).await
    }

    pub async fn submit(&mut self, slug: &str) -> TestResponse {
        self.post_form(&format!("/{}/submit/", slug), &[]).await
    }

    /// A submit request carrying the current session cookie, for sending
    /// several at once through `router`.
    pub fn submit_request(&self, slug: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/{}/submit/", slug))
            .header(ORIGIN, SITE_ORIGIN)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie.as_str());
        }
        builder.body(Body::empty()).unwrap()
    }
}

pub fn form(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).unwrap()
}

pub fn new_workshop(slug: &str) -> NewWorkshop {
    NewWorkshop {
        slug: slug.to_string(),
        title: format!("Workshop {}", slug),
        location: "Flagstaff, AZ".to_string(),
        description: "Hands-on training".to_string(),
        url: None,
        start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
        draft: false,
        public: true,
        private_code: None,
        capacity: 40,
        sales_open: true,
    }
}

pub fn new_rate(workshop: &Workshop, name: &str, price: &str, capacity: i32) -> NewRate {
    NewRate {
        workshop_id: workshop.id,
        name: name.to_string(),
        price: price.parse().unwrap(),
        capacity,
        discount: false,
        discount_code: None,
    }
}

/// Commits an order for `count` tickets of `rate` straight into the store,
/// as if another buyer had checked out.
pub async fn sell_tickets(store: &MemoryStore, rate: &Rate, count: usize) -> Order {
    let items = (0..count)
        .map(|i| NewOrderItem {
            rate_id: rate.id,
            name: format!("Other Buyer {}", i),
            email: format!("other-{}-{}@example.com", i, Uuid::new_v4()),
        })
        .collect::<Vec<_>>();
    store
        .place_order(NewOrder {
            contact_name: "Other Buyer".to_string(),
            contact_email: "other@example.com".to_string(),
            order_total: rate.price * rust_decimal::Decimal::from(count as u64),
            items,
        })
        .await
        .unwrap()
}

/// The "intro-2024" workshop with a single "standard" rate at 100.00 for
/// two tickets.
pub async fn seed_intro(store: &MemoryStore) -> (Workshop, Rate) {
    let workshop = store
        .create_workshop(new_workshop("intro-2024"))
        .await
        .unwrap();
    let rate = store
        .create_rate(new_rate(&workshop, "standard", "100.00", 2))
        .await
        .unwrap();
    (workshop, rate)
}
