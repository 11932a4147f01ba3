use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate};
use guidance::{
    app,
    config::Config,
    error::AppError,
    gateway::LlmGateway,
    history::JsonFileStore,
    service::{Clock, PrescriptionService},
    state::AppState,
    week::localize,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

const TOKEN: &str = "integration-token";
const REPLY: &str = r#"{"severity":"medium","root_cause":"...","solutions":[{"title":"A","steps":["s1"],"impact":"i"}],"quick_wins":["q1"]}"#;

struct ManualClock(Mutex<DateTime<Local>>);

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.0.lock().unwrap()
    }
}

struct CannedGateway {
    reply: String,
    calls: Mutex<usize>,
}

#[async_trait]
impl LlmGateway for CannedGateway {
    async fn complete(&self, _prompt: &str) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;

        Ok(self.reply.clone())
    }
}

struct Server {
    base: String,
    client: Client,
    clock: Arc<ManualClock>,
    gateway: Arc<CannedGateway>,
    _dir: TempDir,
}

impl Server {
    async fn start(reply: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let history_path = dir.path().join("prescriptions.json");
        let history_var = history_path.display().to_string();

        let config = Config::from_sources(
            |key| (key == "HISTORY_PATH").then(|| history_var.clone()),
            |name| match name {
                "ANTHROPIC_API_KEY" => Some("unused".to_string()),
                "AUTH_TOKENS" => Some(format!("{TOKEN}:counselor-9:counselor")),
                _ => None,
            },
        )
        .unwrap();

        let store = Arc::new(JsonFileStore::load(&config.history_path).await.unwrap());
        let gateway = Arc::new(CannedGateway {
            reply: reply.to_string(),
            calls: Mutex::new(0),
        });
        // Tuesday morning
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let clock = Arc::new(ManualClock(Mutex::new(localize(
            tuesday.and_hms_opt(9, 0, 0).unwrap(),
        ))));

        let service = PrescriptionService::new(store, gateway.clone(), clock.clone());
        let state = AppState::with_service(config, service);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });

        Self {
            base: format!("http://{address}"),
            client: Client::new(),
            clock,
            gateway,
            _dir: dir,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}/api/prescriptions{path}", self.base))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap();

        (res.status(), res.json().await.unwrap())
    }

    async fn prescribe(&self, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}/api/prescriptions/prescribe", self.base))
            .bearer_auth(TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap();

        (res.status(), res.json().await.unwrap())
    }

    fn advance(&self, by: Duration) {
        *self.clock.0.lock().unwrap() += by;
    }

    fn gateway_calls(&self) -> usize {
        *self.gateway.calls.lock().unwrap()
    }
}

#[tokio::test]
async fn prescription_blocks_rest_of_week() {
    let server = Server::start(REPLY).await;

    let (status, body) = server.get("/this-week").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = server
        .prescribe(json!({ "issue": "Rising absenteeism in Grade 10" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["solution"]["severity"], "medium");

    let (_, availability) = server.get("/check-availability").await;
    assert_eq!(availability["allowed"], false);
    assert_eq!(availability["reason"], "already created this week");
    assert!(availability["currentWeek"]["start"].is_string());
    assert!(availability["nextAvailableDate"].is_string());

    server.advance(Duration::days(2));

    let (status, body) = server.prescribe(json!({ "issue": "Cafeteria fights" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], true);
    assert_eq!(body["reason"], "weekly_limit_reached");

    let (_, history) = server.get("/history").await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["prescriptions"][0]["createdBy"], "counselor-9");
    assert_eq!(server.gateway_calls(), 1);
}

#[tokio::test]
async fn new_week_reopens() {
    let server = Server::start(REPLY).await;

    server.prescribe(json!({ "issue": "Week one" })).await;
    server.advance(Duration::days(6));

    let (_, availability) = server.get("/check-availability").await;
    assert_eq!(availability["allowed"], true);
    assert_eq!(availability["reason"], "new week");

    let (_, body) = server.prescribe(json!({ "issue": "Week two" })).await;
    assert_eq!(body["success"], true);

    let (_, history) = server.get("/history").await;
    assert_eq!(history["total"], 2);
    assert_eq!(history["prescriptions"][0]["issue"], "Week two");
}

#[tokio::test]
async fn bad_requests() {
    let server = Server::start("Sorry, no JSON today").await;

    let (status, body) = server.prescribe(json!({ "context": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = server.prescribe(json!({ "issue": "Tardiness" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["debug"]["raw"], "Sorry, no JSON today");

    let (_, availability) = server.get("/check-availability").await;
    assert_eq!(availability["allowed"], true);
}

#[tokio::test]
async fn token_required() {
    let server = Server::start(REPLY).await;

    let res = server
        .client
        .get(format!("{}/api/prescriptions/history", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .get(format!("{}/api/prescriptions/history", server.base))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
