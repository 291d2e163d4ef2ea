//! HTTP API tests driven through the router with `oneshot`

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use ratelend_server::auth::{issue_access_token, AuthConfig};
    use ratelend_server::ledger::{Clock, Ledger, ManualClock};
    use ratelend_server::middleware::{RateLimiter, REQUEST_ID_HEADER};
    use ratelend_server::models::AccountId;
    use ratelend_server::oracle::{RateQuoter, StaticRateOracle};
    use ratelend_server::pool::RateModel;
    use ratelend_server::routes::app_router;
    use ratelend_server::state::AppState;

    const SECRET: &str = "api-test-secret";
    const T0: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    struct TestApp {
        router: Router,
        clock: ManualClock,
    }

    fn app_with(dev_tokens_enabled: bool, rps: u32) -> TestApp {
        let clock = ManualClock::new(T0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let quoter = RateQuoter::new(Arc::new(StaticRateOracle::new(300, shared.clone())), 200, 3600);
        let ledger = Arc::new(Ledger::new(shared, RateModel::default(), quoter));
        let auth = AuthConfig {
            jwt_secret: SECRET.to_string(),
            access_token_ttl_seconds: 900,
            dev_tokens_enabled,
        };
        TestApp {
            router: app_router(AppState::new(ledger, auth), RateLimiter::new(rps)),
            clock,
        }
    }

    fn app() -> TestApp {
        app_with(true, 1_000)
    }

    fn token(account: &str) -> String {
        issue_access_token(&AccountId::from(account), SECRET, 900).unwrap().0
    }

    impl TestApp {
        async fn call(&self, method: Method, uri: &str, caller: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(caller) = caller {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(caller)));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn post(&self, uri: &str, caller: &str, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, Some(caller), Some(body)).await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, None, None).await
        }
    }

    fn proposal_body() -> Value {
        json!({
            "loan_amount": 1_000_000_000_000_000_000u64,
            "fee_amount": 0,
            "collateral_amount": 1_500_000_000_000_000_000u64,
            "repay_by_timestamp": T0 + DAY,
            "fixed_rate_bps": 1000,
            "floating_rate_bps": 800
        })
    }

    #[tokio::test]
    async fn test_health_and_request_id() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_client_request_id_is_echoed() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/pool")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ids: Vec<_> = response.headers().get_all(REQUEST_ID_HEADER).iter().collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].to_str().unwrap(), "req-42");
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_http() {
        let app = app();

        let (status, body) = app.post("/api/proposals", "borrower", proposal_body()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["data"]["oracle"], "manual");

        let (_, open) = app.get("/api/proposals/open").await;
        assert_eq!(open["data"].as_array().unwrap().len(), 1);

        let (status, loan) = app
            .post("/api/proposals/1/accept", "lender", json!({ "value": 1_000_000_000_000_000_000u64 }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(loan["data"]["state"], "funded");

        let (status, _) = app
            .post("/api/proposals/1/accept", "other", json!({ "value": 1_000_000_000_000_000_000u64 }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .post("/api/loans/1/accept-terms", "borrower", json!({ "value": 1 }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_AMOUNT");

        let (status, _) = app
            .post("/api/loans/1/accept-terms", "borrower", json!({ "value": 1_500_000_000_000_000_000u64 }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.call(Method::POST, "/api/loans/1/take", Some("lender"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED_CALLER");

        let (status, taken) = app.call(Method::POST, "/api/loans/1/take", Some("borrower"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(taken["data"]["state"], "taken");

        let (_, state) = app.get("/api/loans/1/state").await;
        assert_eq!(state["data"]["state"], "taken");
        assert_eq!(state["data"]["ordinal"], 3);

        let (_, by_borrower) = app.get("/api/loans?borrower=borrower").await;
        assert_eq!(by_borrower["data"].as_array().unwrap().len(), 1);

        let (status, body) = app.call(Method::POST, "/api/loans/1/liquidate", Some("lender"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "DEADLINE_NOT_REACHED");

        app.clock.advance(DAY + 1);
        let (_, overdue) = app.get("/api/loans/overdue").await;
        assert_eq!(overdue["data"].as_array().unwrap().len(), 1);

        let (status, liquidated) = app.call(Method::POST, "/api/loans/1/liquidate", Some("lender"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(liquidated["data"]["state"], "liquidated");

        let (_, balance) = app.get("/api/accounts/lender/balance").await;
        assert_eq!(balance["data"]["balance"], 1_500_000_000_000_000_000u64);

        let (_, events) = app.get("/api/events?since=0&limit=3").await;
        let events = events["data"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["type"], "proposal_created");
        assert_eq!(events[0]["seq"], 1);
    }

    #[tokio::test]
    async fn test_writes_require_a_token() {
        let app = app();
        let (status, body) = app
            .call(Method::POST, "/api/proposals", None, Some(proposal_body()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "MISSING_TOKEN");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/pool/liquidity")
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "amount": 5 }).to_string()))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rate_out_of_range_fails_validation() {
        let app = app();
        let mut body = proposal_body();
        body["fixed_rate_bps"] = json!(20_000);
        let (status, body) = app.post("/api/proposals", "borrower", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_pool_endpoints() {
        let app = app();
        let (status, stats) = app.post("/api/pool/liquidity", "lp", json!({ "amount": 5_000 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["data"]["total_liquidity"], 5_000);

        let (status, stats) = app
            .post("/api/pool/liquidity/withdraw", "lp", json!({ "amount": 2_000 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["data"]["total_liquidity"], 3_000);

        let (status, body) = app
            .post("/api/pool/liquidity/withdraw", "lp", json!({ "amount": 4_000 }))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_LIQUIDITY");

        let (_, util) = app.get("/api/pool/utilization").await;
        assert_eq!(util["data"]["utilization_bps"], 0);
        let (_, rate) = app.get("/api/pool/floating-rate").await;
        assert_eq!(rate["data"]["floating_rate_bps"], 200);
        let (_, pool) = app.get("/api/pool").await;
        assert_eq!(pool["data"]["providers"], 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let app = app();
        let (status, body) = app.get("/api/loans/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        let (status, _) = app.get("/api/proposals/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dev_token_route() {
        let app = app();
        let (status, body) = app
            .call(Method::POST, "/api/auth/token", None, Some(json!({ "account": "alice" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["token_type"], "Bearer");

        let prod = app_with(false, 1_000);
        let (status, _) = prod
            .call(Method::POST, "/api/auth/token", None, Some(json!({ "account": "alice" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_bursts() {
        let app = app_with(true, 1);
        assert_eq!(app.get("/health").await.0, StatusCode::OK);
        assert_eq!(app.get("/health").await.0, StatusCode::OK);
        let (status, body) = app.get("/health").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");
    }
}
