use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use uradial::app::{create_router, AppState, AppStateBuilder};
use uradial::config::{Config, StoreConfig, TelephonyConfig};
use uradial::store::memory::MemoryStore;

const CSV: &str = "Nome Completo,Telefone\nAna Souza,11988887777\nBob,\n";

type CapturedCalls = Arc<Mutex<Vec<(HeaderMap, String)>>>;

/// Stands in for the provider's Calls REST resource, capturing every request
/// the dialer makes.
async fn spawn_provider_stub() -> (String, CapturedCalls) {
    let calls: CapturedCalls = Arc::new(Mutex::new(Vec::new()));
    let captured = calls.clone();
    let app = Router::new().route(
        "/Accounts/ACtest/Calls.json",
        post(move |headers: HeaderMap, body: String| {
            let captured = captured.clone();
            async move {
                captured.lock().unwrap().push((headers, body));
                Json(json!({ "sid": "CA123", "status": "queued" }))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server failed");
    });
    (format!("http://{}", addr), calls)
}

async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("app server failed");
    });
    format!("http://{}", addr)
}

fn test_config(provider_url: &str) -> Config {
    Config {
        public_base_url: Some("https://ura.example.com".to_string()),
        telephony: TelephonyConfig {
            account_sid: Some("ACtest".to_string()),
            auth_token: Some("secret".to_string()),
            outbound_number: Some("+5511999990000".to_string()),
            api_base: Some(provider_url.to_string()),
            ..TelephonyConfig::default()
        },
        store: StoreConfig::Memory,
        ..Config::default()
    }
}

fn form_pairs(body: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn field<'a>(pairs: &'a [(String, String)], key: &str) -> &'a str {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("form field {} missing", key))
}

#[tokio::test]
async fn test_campaign_end_to_end() {
    let (provider_url, captured_calls) = spawn_provider_stub().await;

    let mut config = test_config(&provider_url);
    // no artificial delay between test calls
    config.campaign.pacing_secs = 0;

    let store = Arc::new(MemoryStore::new());
    let state = AppStateBuilder::new()
        .config(config)
        .store(store.clone())
        .build()
        .expect("Failed to build app state");
    let base = spawn_app(state).await;
    let client = reqwest::Client::new();

    // upload the lead sheet; the row without a phone must be dropped
    let form = reqwest::multipart::Form::new().part(
        "csv_file",
        reqwest::multipart::Part::bytes(CSV.as_bytes().to_vec()).file_name("leads.csv"),
    );
    let response = client
        .post(format!("{}/upload-leads", base))
        .multipart(form)
        .send()
        .await
        .expect("upload request failed");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(
        body["message"],
        "Lista de leads carregada com sucesso! Total de 1 leads."
    );

    // the active list reads back with its sheet column names
    let leads: Value = client
        .get(format!("{}/obtain-leads", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leads["count"], 1);
    assert_eq!(leads["leads"][0]["Nome Completo"], "Ana Souza");

    // start the campaign and wait for the dialer to hit the provider
    let response = client
        .post(format!("{}/iniciar-chamadas", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Campanha de chamadas iniciada com sucesso!");
    assert_eq!(body["count"], 1);

    timeout(Duration::from_secs(10), async {
        while captured_calls.lock().unwrap().is_empty() {
            sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("dialer never reached the provider stub");

    let (headers, call_body) = captured_calls.lock().unwrap()[0].clone();
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .expect("call must carry basic auth");
    assert!(auth.starts_with("Basic "));

    let pairs = form_pairs(&call_body);
    assert_eq!(field(&pairs, "To"), "+5511988887777");
    assert_eq!(field(&pairs, "From"), "+5511999990000");
    assert_eq!(field(&pairs, "Method"), "GET");
    assert_eq!(field(&pairs, "Timeout"), "30");
    assert_eq!(
        field(&pairs, "StatusCallback"),
        "https://ura.example.com/status_callback"
    );
    let events: Vec<&str> = pairs
        .iter()
        .filter(|(k, _)| k == "StatusCallbackEvent")
        .map(|(_, v)| v.as_str())
        .collect();
    assert_eq!(events, ["completed", "failed", "busy", "no-answer"]);

    let prompt_url = field(&pairs, "Url");
    assert!(prompt_url.starts_with("https://ura.example.com/gather?lead_data="));

    // single lead, so the flag must clear once the list is exhausted
    timeout(Duration::from_secs(10), async {
        loop {
            let health: Value = client
                .get(format!("{}/health", base))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if health["campaign_active"] == false {
                assert_eq!(health["status"], "ok");
                assert_eq!(health["gateway_ready"], true);
                assert_eq!(health["store_ready"], true);
                break;
            }
            sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("campaign never wound down");

    // replay the provider's webhook sequence with the context the dialer sent
    let parsed = url::Url::parse(prompt_url).unwrap();
    let lead_data = parsed
        .query_pairs()
        .find(|(key, _)| key == "lead_data")
        .map(|(_, value)| value.into_owned())
        .expect("call url must carry the lead context");

    let gather_xml = client
        .get(format!("{}/gather", base))
        .query(&[("lead_data", lead_data.as_str())])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(gather_xml
        .contains("<Gather action=\"https://ura.example.com/handle-gather?lead_data="));
    assert!(gather_xml.contains("numDigits=\"1\""));
    assert!(gather_xml.contains(
        "<Play>https://ura.example.com/static/audio_portabilidadeexclusiva.mp3</Play>"
    ));

    let confirm_xml = client
        .post(format!("{}/handle-gather", base))
        .form(&[
            ("Digits", "1"),
            ("To", "+5511988887777"),
            ("lead_data", lead_data.as_str()),
        ])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(confirm_xml.contains(
        "<Play>https://ura.example.com/static/audio_continuarinbursa.mp3</Play>"
    ));

    let records = store.interactions();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].digit_pressed.as_deref(), Some("1"));
    assert_eq!(records[0].phone, "5511988887777");
    assert_eq!(records[0].name, "Ana Souza");

    // a callback that lost all context still answers politely and stores nothing
    let apology_xml = client
        .post(format!("{}/handle-gather", base))
        .form(&[("Digits", "1"), ("lead_data", "%7Bnot-json")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(apology_xml.contains("Desculpe, houve um erro interno do sistema. Encerrando."));
    assert_eq!(store.interactions().len(), 1);

    // delivery status lands in the history
    let response = client
        .post(format!("{}/status_callback", base))
        .form(&[
            ("CallSid", "CA123"),
            ("CallStatus", "completed"),
            ("To", "+5511988887777"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    let statuses = store.call_statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].call_sid, "CA123");

    // stopping an already-finished campaign still succeeds
    let response = client
        .post(format!("{}/parar-chamadas", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Campanha de chamadas parada com sucesso!");
}

#[tokio::test]
async fn test_upload_rejections() {
    let state = AppStateBuilder::new()
        .config(Config {
            store: StoreConfig::Memory,
            ..Config::default()
        })
        .build()
        .expect("Failed to build app state");
    let base = spawn_app(state).await;
    let client = reqwest::Client::new();

    // a sheet without the phone column names the missing column
    let form = reqwest::multipart::Form::new().part(
        "csv_file",
        reqwest::multipart::Part::bytes("Nome Completo\nAna\n".as_bytes().to_vec())
            .file_name("leads.csv"),
    );
    let response = client
        .post(format!("{}/upload-leads", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "O arquivo deve conter a coluna \"Telefone\".");

    // no csv_file part at all
    let form = reqwest::multipart::Form::new().text("other", "x");
    let response = client
        .post(format!("{}/upload-leads", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Nenhum arquivo enviado");

    // starting a campaign with no leads and no credentials is refused
    let response = client
        .post(format!("{}/iniciar-chamadas", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "O serviço de telefonia não está configurado.");
}
