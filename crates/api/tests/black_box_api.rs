use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Value as JsonValue, json};

use riskwatch_api::app::{AppServices, build_app};
use riskwatch_infra::{RiskwatchConfig, RiskwatchServices};

const COASTAL: &str = "0192f1c2-7d3e-7000-8000-00000000c0a5";
const INLAND: &str = "0192f1c2-7d3e-7000-8000-0000000011a0";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    services: Arc<AppServices>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with_data_dir(None).await
    }

    async fn spawn_with_data_dir(data_dir: Option<&Path>) -> Self {
        // Same router as prod, no external sources: signals arrive through POST /signals.
        let mut config_json = json!({
            "watch_threshold": 0.4,
            "alert_threshold": 0.6,
            "hysteresis_count": 1,
            "poll_interval_secs": 3600,
            "suppliers": [
                {
                    "id": COASTAL,
                    "name": "Coastal Textiles",
                    "location": { "name": "Chennai, India", "latitude": 13.08, "longitude": 80.27, "country_code": "IND" }
                },
                {
                    "id": INLAND,
                    "name": "Inland Metals",
                    "tier": 2,
                    "location": { "name": "Ostrava, Czechia", "latitude": 49.82, "longitude": 18.26, "country_code": "CZE" }
                }
            ]
        });
        if let Some(dir) = data_dir {
            config_json["data_dir"] = json!(dir);
        }
        let config = RiskwatchConfig::from_json(&config_json.to_string()).expect("test config parses");

        let services = RiskwatchServices::build_with(&config, Vec::new(), Vec::new()).expect("services build");
        let services = Arc::new(AppServices::start(services).expect("background workers start"));
        let app = build_app(services.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            services,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.services.shutdown();
    }
}

fn extreme_weather() -> JsonValue {
    json!({
        "observed_at": (Utc::now() - chrono::Duration::minutes(5)).to_rfc3339(),
        "wind_speed_kph": 135.0,
        "condition": "extreme_weather",
        "alerts": [{ "event": "Cyclone warning", "severity": "extreme" }]
    })
}

/// Scoring runs on the background runner and the board follows the event bus,
/// so reads are eventually consistent. Poll briefly until `ready` holds.
async fn get_eventually(
    client: &reqwest::Client,
    url: &str,
    ready: impl Fn(&JsonValue) -> bool,
) -> JsonValue {
    for _ in 0..200 {
        let res = client.get(url).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: JsonValue = res.json().await.unwrap();
            if ready(&body) {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("{url} did not reach the expected state within timeout");
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn suppliers_are_listed_before_any_score() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body: JsonValue = client
        .get(format!("{}/suppliers", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i["state"] == "NORMAL" && i["latest_score"].is_null()));

    let detail: JsonValue = client
        .get(format!("{}/suppliers/{}", srv.base_url, INLAND))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["tier"], 2);
    assert!(detail["score"].is_null());
}

#[tokio::test]
async fn malformed_payload_is_unprocessable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/signals", srv.base_url))
        .json(&json!({
            "supplier_id": COASTAL,
            "source_kind": "weather",
            "payload": { "observed_at": "2026-10-01T00:00:00Z" }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: JsonValue = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_payload");
    assert!(body["message"].as_str().unwrap().contains("wind_speed_kph"));
}

#[tokio::test]
async fn bad_identifiers_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/suppliers/not-a-uuid", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/suppliers/0192f1c2-7d3e-7000-8000-0000000000ff/trend", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(format!("{}/signals", srv.base_url))
        .json(&json!({ "supplier_id": COASTAL, "source_kind": "satellite", "payload": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: JsonValue = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_source_kind");
}

#[tokio::test]
async fn pushed_signal_is_scored_and_raises_one_alert() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let signal = json!({ "supplier_id": COASTAL, "source_kind": "weather", "payload": extreme_weather() });
    let res = client
        .post(format!("{}/signals", srv.base_url))
        .json(&signal)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let accepted: JsonValue = res.json().await.unwrap();
    assert_eq!(accepted["duplicate"], false);
    assert_eq!(accepted["severity"], 1.0);

    // Same observation again is not a new signal.
    let again: JsonValue = client
        .post(format!("{}/signals", srv.base_url))
        .json(&signal)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["duplicate"], true);

    let detail = get_eventually(&client, &format!("{}/suppliers/{}", srv.base_url, COASTAL), |b| {
        b["state"] == "ALERT"
    })
    .await;

    // weather 1.0 * 0.35 + news 0.5 * 0.35 + economic 0.5 * 0.30
    let score = detail["score"]["score"].as_f64().unwrap();
    assert!((score - 0.675).abs() < 1e-9, "score was {score}");
    assert_eq!(detail["category"], "high");
    assert_eq!(detail["degraded"], true);
    assert_eq!(detail["weather_alerts"], json!(["Cyclone warning"]));
    assert_eq!(detail["urgent"], true);
    let attributions = detail["score"]["attributions"].as_object().unwrap();
    let sum: f64 = attributions.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-6);

    let alerts = get_eventually(&client, &format!("{}/alerts?only_alerts=true", srv.base_url), |b| {
        !b["items"].as_array().unwrap().is_empty()
    })
    .await;
    let items = alerts["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["supplier_id"], COASTAL);
    assert_eq!(items[0]["new_state"], "ALERT");

    let trend: JsonValue = client
        .get(format!("{}/suppliers/{}/trend", srv.base_url, COASTAL))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(trend["state"], "ALERT");
    assert!(!trend["scores"].as_array().unwrap().is_empty());

    // The other supplier is untouched and sorts after the scored one.
    let list: JsonValue = client
        .get(format!("{}/suppliers", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = list["items"].as_array().unwrap();
    assert_eq!(items[0]["supplier_id"], COASTAL);
    assert_eq!(items[1]["state"], "NORMAL");
}

#[tokio::test]
async fn alert_state_survives_restart() {
    let dir = std::env::temp_dir().join(format!(
        "riskwatch-api-{}-{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let client = reqwest::Client::new();

    {
        let srv = TestServer::spawn_with_data_dir(Some(&dir)).await;
        let signal = json!({ "supplier_id": COASTAL, "source_kind": "weather", "payload": extreme_weather() });
        let res = client
            .post(format!("{}/signals", srv.base_url))
            .json(&signal)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        get_eventually(&client, &format!("{}/suppliers/{}", srv.base_url, COASTAL), |b| {
            b["state"] == "ALERT"
        })
        .await;
    }

    // No new signal after the restart: the state comes from the trend files.
    let srv = TestServer::spawn_with_data_dir(Some(&dir)).await;
    let detail: JsonValue = client
        .get(format!("{}/suppliers/{}", srv.base_url, COASTAL))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["state"], "ALERT");

    let list: JsonValue = client
        .get(format!("{}/suppliers", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let coastal = list["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["supplier_id"] == COASTAL)
        .unwrap();
    assert_eq!(coastal["state"], "ALERT");
    assert_eq!(coastal["transitions"], 1);

    drop(srv);
    let _ = std::fs::remove_dir_all(&dir);
}
