//! End-to-end tests for the identification pipeline.
//!
//! Every provider runs against a recording transport that returns canned
//! responses, so these tests see the exact requests that would hit the
//! network and never leave the machine.

use async_trait::async_trait;
use rock_id_lib::config::Settings;
use rock_id_lib::vision::{
    self, FileUpload, HttpResponse, HttpTransport, ProviderKind, RockType,
};
use rock_id_lib::{identify_with, IdentifyError};
use std::path::PathBuf;
use std::sync::Mutex;

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
const JPEG_BASE64: &str = "/9j/4AAQSkZJRg==";

const GRANITE_JSON: &str = r#"{"name":"Granite","type":"igneous","confidence":87,"description":"Coarse-grained igneous rock.","minerals":["quartz","feldspar","mica"]}"#;

#[derive(Debug, Clone)]
enum Recorded {
    Json {
        url: String,
        headers: Vec<(String, String)>,
        body: serde_json::Value,
    },
    Multipart {
        url: String,
        upload: FileUpload,
    },
    Get {
        url: String,
    },
}

/// Records every request and answers each with the same canned response.
struct FakeTransport {
    status: u16,
    body: String,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeTransport {
    fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn ok(body: &str) -> Self {
        Self::new(200, body)
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, recorded: Recorded) -> HttpResponse {
        self.requests.lock().unwrap().push(recorded);
        HttpResponse {
            status: self.status,
            body: self.body.clone(),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> rock_id_lib::Result<HttpResponse> {
        Ok(self.respond(Recorded::Json {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body: body.clone(),
        }))
    }

    async fn post_multipart(
        &self,
        url: &str,
        upload: FileUpload,
    ) -> rock_id_lib::Result<HttpResponse> {
        Ok(self.respond(Recorded::Multipart {
            url: url.to_string(),
            upload,
        }))
    }

    async fn get(
        &self,
        url: &str,
        _headers: &[(&str, String)],
    ) -> rock_id_lib::Result<HttpResponse> {
        Ok(self.respond(Recorded::Get {
            url: url.to_string(),
        }))
    }
}

/// Transport that fails like a dropped connection.
struct OfflineTransport;

#[async_trait]
impl HttpTransport for OfflineTransport {
    async fn post_json(
        &self,
        _url: &str,
        _headers: &[(&str, String)],
        _body: &serde_json::Value,
    ) -> rock_id_lib::Result<HttpResponse> {
        Err(IdentifyError::Transport("connection refused".to_string()))
    }

    async fn post_multipart(&self, _url: &str, _upload: FileUpload) -> rock_id_lib::Result<HttpResponse> {
        Err(IdentifyError::Transport("connection refused".to_string()))
    }

    async fn get(&self, _url: &str, _headers: &[(&str, String)]) -> rock_id_lib::Result<HttpResponse> {
        Err(IdentifyError::Transport("connection refused".to_string()))
    }
}

/// Write a tiny JPEG to a test-specific temp path.
fn rock_photo(test_name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("rock-id-it-{}.jpg", test_name));
    std::fs::write(&path, JPEG_BYTES).unwrap();
    path
}

fn settings_for(provider: &str) -> Settings {
    let mut s = Settings::empty();
    s.provider = Some(provider.to_string());
    s.openai_api_key = Some("sk-test".to_string());
    s.gemini_api_key = Some("gm-test".to_string());
    s.custom_model_url = Some("http://rocks.local:5000".to_string());
    s
}

fn gemini_envelope(text: &str) -> String {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}],
        "usageMetadata": {"promptTokenCount": 270, "candidatesTokenCount": 60}
    })
    .to_string()
}

fn openai_envelope(content: &str) -> String {
    serde_json::json!({
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 800, "completion_tokens": 70}
    })
    .to_string()
}

fn assert_granite(r: &rock_id_lib::RockIdentification) {
    assert_eq!(r.name, "Granite");
    assert_eq!(r.rock_type, RockType::Igneous);
    assert_eq!(r.confidence, 87.0);
    assert_eq!(r.description, "Coarse-grained igneous rock.");
    assert_eq!(
        r.minerals.as_deref(),
        Some(&["quartz".to_string(), "feldspar".to_string(), "mica".to_string()][..])
    );
}

#[tokio::test]
async fn gemini_scenario_returns_granite() {
    let photo = rock_photo("gemini-granite");
    let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"name\":\"Granite\",\"type\":\"igneous\",\"confidence\":87,\"description\":\"Coarse-grained igneous rock.\",\"minerals\":[\"quartz\",\"feldspar\",\"mica\"]}"}]}}]}"#;
    let transport = FakeTransport::ok(body);

    let result = identify_with(&photo, &settings_for("gemini"), &transport)
        .await
        .unwrap();
    assert_granite(&result);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    match &requests[0] {
        Recorded::Json { url, headers, body } => {
            assert_eq!(
                url,
                "https://generativelanguage.googleapis.com/v1/models/gemini-1.5-flash:generateContent?key=gm-test"
            );
            assert!(headers.is_empty());
            let parts = &body["contents"][0]["parts"];
            assert!(parts[0]["text"].as_str().unwrap().starts_with("Identify this rock."));
            assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
            assert_eq!(parts[1]["inline_data"]["data"], JPEG_BASE64);
        }
        other => panic!("expected JSON POST, got {:?}", other),
    }

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn openai_sends_data_uri_and_parses_message_content() {
    let photo = rock_photo("openai-granite");
    let transport = FakeTransport::ok(&openai_envelope(GRANITE_JSON));

    let result = identify_with(&photo, &settings_for("openai"), &transport)
        .await
        .unwrap();
    assert_granite(&result);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    match &requests[0] {
        Recorded::Json { url, headers, body } => {
            assert_eq!(url, "https://api.openai.com/v1/chat/completions");
            assert!(headers
                .iter()
                .any(|(k, v)| k == "authorization" && v == "Bearer sk-test"));
            assert_eq!(body["model"], "gpt-4o");
            assert_eq!(body["max_tokens"], 500);
            let content = &body["messages"][0]["content"];
            assert_eq!(content[0]["type"], "text");
            assert_eq!(content[1]["type"], "image_url");
            assert_eq!(
                content[1]["image_url"]["url"],
                format!("data:image/jpeg;base64,{}", JPEG_BASE64)
            );
        }
        other => panic!("expected JSON POST, got {:?}", other),
    }

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn openai_fenced_content_is_accepted() {
    let photo = rock_photo("openai-fenced");
    let fenced = format!("```json\n{}\n```", GRANITE_JSON);
    let transport = FakeTransport::ok(&openai_envelope(&fenced));

    let result = identify_with(&photo, &settings_for("openai"), &transport)
        .await
        .unwrap();
    assert_granite(&result);

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn custom_uploads_multipart_and_reads_body_directly() {
    let photo = rock_photo("custom-granite");
    let transport = FakeTransport::ok(GRANITE_JSON);

    let result = identify_with(&photo, &settings_for("custom"), &transport)
        .await
        .unwrap();
    assert_granite(&result);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    match &requests[0] {
        Recorded::Multipart { url, upload } => {
            assert_eq!(url, "http://rocks.local:5000/identify");
            assert_eq!(upload.field, "image");
            assert_eq!(upload.file_name, "rock.jpg");
            assert_eq!(upload.mime_type, "image/jpeg");
            assert_eq!(upload.bytes, JPEG_BYTES);
        }
        other => panic!("expected multipart POST, got {:?}", other),
    }

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn custom_without_url_fails_before_any_request() {
    let photo = rock_photo("custom-no-url");
    let mut settings = settings_for("custom");
    settings.custom_model_url = None;
    let transport = FakeTransport::ok(GRANITE_JSON);

    let err = identify_with(&photo, &settings, &transport).await.unwrap_err();
    assert!(err.is_config());
    assert!(matches!(
        err,
        IdentifyError::MissingConfig { provider: "custom", var: "CUSTOM_MODEL_URL" }
    ));
    assert!(transport.requests().is_empty());

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn missing_api_keys_fail_before_any_request() {
    let photo = rock_photo("missing-keys");
    let transport = FakeTransport::ok("{}");

    let mut settings = settings_for("openai");
    settings.openai_api_key = None;
    let err = identify_with(&photo, &settings, &transport).await.unwrap_err();
    assert!(matches!(err, IdentifyError::MissingConfig { var: "OPENAI_API_KEY", .. }));

    let mut settings = settings_for("gemini");
    settings.gemini_api_key = None;
    let err = identify_with(&photo, &settings, &transport).await.unwrap_err();
    assert!(matches!(err, IdentifyError::MissingConfig { var: "GEMINI_API_KEY", .. }));

    assert!(transport.requests().is_empty());
    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn config_errors_win_over_unreadable_image() {
    let missing = std::env::temp_dir().join("rock-id-it-never-written.jpg");
    let _ = std::fs::remove_file(&missing);
    let mut settings = settings_for("custom");
    settings.custom_model_url = None;

    let err = identify_with(&missing, &settings, &FakeTransport::ok("{}"))
        .await
        .unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn unreadable_image_is_io_error_without_request() {
    let missing = std::env::temp_dir().join("rock-id-it-also-never-written.jpg");
    let _ = std::fs::remove_file(&missing);
    let transport = FakeTransport::ok(GRANITE_JSON);

    let err = identify_with(&missing, &settings_for("custom"), &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, IdentifyError::Io { .. }));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn unknown_selector_fails_the_same_way_every_time() {
    let photo = rock_photo("unknown-selector");
    let transport = FakeTransport::ok(GRANITE_JSON);
    let settings = settings_for("claude");

    for _ in 0..3 {
        let err = identify_with(&photo, &settings, &transport).await.unwrap_err();
        assert!(matches!(err, IdentifyError::UnknownProvider(ref p) if p == "claude"));
        assert!(err.to_string().contains("Invalid AI provider"));
    }
    assert!(transport.requests().is_empty());

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn unset_selector_uses_gemini() {
    let photo = rock_photo("default-gemini");
    let mut settings = settings_for("gemini");
    settings.provider = None;
    let transport = FakeTransport::ok(&gemini_envelope(GRANITE_JSON));

    identify_with(&photo, &settings, &transport).await.unwrap();
    match &transport.requests()[0] {
        Recorded::Json { url, .. } => assert!(url.contains(":generateContent?key=gm-test")),
        other => panic!("expected Gemini request, got {:?}", other),
    }

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn malformed_bodies_fail_for_every_provider() {
    let photo = rock_photo("malformed");

    let cases: Vec<(&str, String)> = vec![
        ("gemini", "not json at all".to_string()),
        ("gemini", r#"{"candidates":[]}"#.to_string()),
        ("gemini", gemini_envelope("I think this is granite!")),
        ("gemini", gemini_envelope(r#"{"name":"Granite","type":"igneous"}"#)),
        ("openai", "<html>Bad gateway</html>".to_string()),
        ("openai", r#"{"choices":[{"message":{"content":null}}]}"#.to_string()),
        ("openai", openai_envelope(r#"{"name":"Granite","confidence":"high"}"#)),
        ("custom", "Internal Server Error".to_string()),
        ("custom", r#"{"name":"Granite"}"#.to_string()),
        ("custom", r#"[1,2,3]"#.to_string()),
    ];

    for (provider, body) in cases {
        let transport = FakeTransport::ok(&body);
        let err = identify_with(&photo, &settings_for(provider), &transport)
            .await
            .expect_err(&format!("{} accepted malformed body {:?}", provider, body));
        assert!(
            matches!(err, IdentifyError::Parse { .. } | IdentifyError::InvalidResult(_)),
            "{} body {:?} gave {:?}",
            provider,
            body,
            err
        );
        assert!(err.is_retryable());
        assert_eq!(transport.requests().len(), 1);
    }

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn non_success_status_surfaces_upstream_message() {
    let photo = rock_photo("status");

    let transport = FakeTransport::new(
        401,
        r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
    );
    let err = identify_with(&photo, &settings_for("openai"), &transport)
        .await
        .unwrap_err();
    match &err {
        IdentifyError::Status { provider, status, message } => {
            assert_eq!(*provider, "openai");
            assert_eq!(*status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(!err.is_retryable());

    // Body is valid identification JSON, but the status still wins.
    let transport = FakeTransport::new(500, GRANITE_JSON);
    let err = identify_with(&photo, &settings_for("custom"), &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, IdentifyError::Status { status: 500, .. }));
    assert!(err.is_retryable());

    let transport = FakeTransport::new(400, r#"{"error":"No image provided"}"#);
    let err = identify_with(&photo, &settings_for("custom"), &transport)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No image provided"));

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn transport_failure_is_surfaced() {
    let photo = rock_photo("offline");

    let err = identify_with(&photo, &settings_for("gemini"), &OfflineTransport)
        .await
        .unwrap_err();
    assert!(matches!(err, IdentifyError::Transport(_)));
    assert!(err.is_retryable());
    assert!(!err.is_config());

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn custom_server_extras_are_carried_through() {
    let photo = rock_photo("custom-extras");
    let body = r#"{
        "name": "Marble",
        "type": "unknown",
        "confidence": 93.41,
        "description": "This appears to be marble. Confidence: 93.4%",
        "minerals": ["calcite", "dolomite"],
        "top_3_predictions": [
            {"name": "marble", "confidence": 93.41},
            {"name": "limestone", "confidence": 4.2},
            {"name": "slate", "confidence": 1.1}
        ]
    }"#;
    let transport = FakeTransport::ok(body);

    let result = identify_with(&photo, &settings_for("custom"), &transport)
        .await
        .unwrap();
    assert_eq!(result.rock_type, RockType::Metamorphic);
    assert_eq!(result.top_predictions.len(), 3);
    assert_eq!(result.top_predictions[1].name, "limestone");

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn model_and_base_overrides_are_used() {
    let photo = rock_photo("overrides");
    let settings = Settings::from_lookup(|var| match var {
        "AI_PROVIDER" => Some("OPENAI".to_string()),
        "OPENAI_API_KEY" => Some("sk-proxy".to_string()),
        "OPENAI_MODEL" => Some("gpt-4o-mini".to_string()),
        "OPENAI_API_BASE" => Some("http://localhost:8080/".to_string()),
        _ => None,
    });
    let transport = FakeTransport::ok(&openai_envelope(GRANITE_JSON));

    identify_with(&photo, &settings, &transport).await.unwrap();
    match &transport.requests()[0] {
        Recorded::Json { url, body, .. } => {
            assert_eq!(url, "http://localhost:8080/v1/chat/completions");
            assert_eq!(body["model"], "gpt-4o-mini");
        }
        other => panic!("expected JSON POST, got {:?}", other),
    }

    let _ = std::fs::remove_file(&photo);
}

#[tokio::test]
async fn check_and_classes_hit_custom_server_endpoints() {
    let settings = settings_for("custom");

    let transport = FakeTransport::ok(
        r#"{"status":"online","model":"rock_classifier","classes":12,"version":"1.0.0"}"#,
    );
    let status = vision::check_provider(ProviderKind::Custom, &settings, &transport)
        .await
        .unwrap();
    assert!(status.contains("online"));
    assert!(status.contains("12 classes"));
    match &transport.requests()[0] {
        Recorded::Get { url } => assert_eq!(url, "http://rocks.local:5000/"),
        other => panic!("expected GET, got {:?}", other),
    }

    let transport = FakeTransport::ok(r#"{"classes":["basalt","granite","marble"],"count":3}"#);
    let classes = vision::fetch_custom_classes(&settings, &transport).await.unwrap();
    assert_eq!(classes, vec!["basalt", "granite", "marble"]);
    match &transport.requests()[0] {
        Recorded::Get { url } => assert_eq!(url, "http://rocks.local:5000/classes"),
        other => panic!("expected GET, got {:?}", other),
    }

    let mut settings = settings;
    settings.custom_model_url = None;
    let err = vision::fetch_custom_classes(&settings, &transport).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn check_hosted_providers_uses_model_listing() {
    let settings = settings_for("gemini");

    let transport = FakeTransport::ok(r#"{"models":[]}"#);
    vision::check_provider(ProviderKind::Gemini, &settings, &transport)
        .await
        .unwrap();
    vision::check_provider(ProviderKind::OpenAi, &settings, &transport)
        .await
        .unwrap();

    let urls: Vec<String> = transport
        .requests()
        .into_iter()
        .map(|r| match r {
            Recorded::Get { url } => url,
            other => panic!("expected GET, got {:?}", other),
        })
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://generativelanguage.googleapis.com/v1/models?key=gm-test".to_string(),
            "https://api.openai.com/v1/models".to_string(),
        ]
    );

    let failing = FakeTransport::new(403, r#"{"error":{"message":"API key not valid"}}"#);
    let err = vision::check_provider(ProviderKind::Gemini, &settings, &failing)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn gemini_key_stays_out_of_connection_errors() {
    const KEY: &str = "SECRET-GEMINI-KEY";
    let photo = rock_photo("closed-port");
    let mut settings = settings_for("gemini");
    settings.gemini_api_key = Some(KEY.to_string());
    settings.gemini_api_base = "http://127.0.0.1:1".to_string();
    let transport = vision::ReqwestTransport::new();

    let err = identify_with(&photo, &settings, &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, IdentifyError::Transport(_)));
    assert!(!err.to_string().contains(KEY), "key leaked: {}", err);
    assert!(!format!("{:?}", err).contains(KEY));

    let err = vision::check_provider(ProviderKind::Gemini, &settings, &transport)
        .await
        .unwrap_err();
    assert!(!err.to_string().contains(KEY), "key leaked: {}", err);

    let _ = std::fs::remove_file(&photo);
}
