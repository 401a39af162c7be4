//! Integration tests for the preop-api HTTP surface.
//!
//! Each test builds the full router against an in-memory database and a
//! tempdir-backed artifact tree, then drives it with `oneshot` requests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use preop_api::{build_router, AppState};
use preop_common::config::{ServiceConfig, StorageConfig};
use preop_common::db::init::init_database_in_memory;
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

struct TestApp {
    router: Router,
    state: AppState,
    _dir: TempDir,
}

async fn setup_app(threshold: u32) -> TestApp {
    let pool = init_database_in_memory().await.unwrap();
    let dir = TempDir::new().unwrap();
    let storage = StorageConfig::new(dir.path());
    let config = ServiceConfig {
        consolidation_threshold: threshold,
        ..ServiceConfig::default()
    };
    let state = AppState::new(pool, storage, config);
    TestApp {
        router: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

fn form_request(uri: &str, token: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(fields).unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

fn multipart_request(uri: &str, token: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let boundary = "test-boundary-7MA4YWxkTrZu0gW";
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary, name, value
        ));
    }
    body.push_str(&format!("--{}--\r\n", boundary));

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn pdf_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Register a user and log in, returning the bearer token.
async fn register_and_login(app: &TestApp, nombre: &str, pin: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/auth/register",
            None,
            &[("nombre", nombre), ("pin", pin)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/auth/login",
            None,
            &[("nombre", nombre), ("pin", pin)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["token_type"], "bearer");
    assert!(body["expires_in"].as_i64().unwrap() > 0);
    body["access_token"].as_str().unwrap().to_string()
}

fn firma_dataurl() -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    let bytes = vec![0x89u8; 1024];
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

fn submit_fields(firma: &str) -> Vec<(&'static str, String)> {
    vec![
        ("placa", "ABC123".to_string()),
        ("proceso", "Reparto".to_string()),
        ("desde", "Bodega".to_string()),
        ("hasta", "Cliente".to_string()),
        ("aspectos", r#"{"frenos":"B","luces":"B"}"#.to_string()),
        ("firma_dataurl", firma.to_string()),
    ]
}

async fn submit(app: &TestApp, token: &str) -> axum::response::Response {
    let firma = firma_dataurl();
    let fields = submit_fields(&firma);
    let fields: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    app.router
        .clone()
        .oneshot(form_request("/inspecciones/submit", Some(token), &fields))
        .await
        .unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_needs_no_auth() {
    let app = setup_app(15).await;
    let response = app.router.clone().oneshot(get_request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "preop-api");
}

// ============================================================================
// Session layer
// ============================================================================

#[tokio::test]
async fn wrong_pin_and_unknown_user_get_identical_generic_401() {
    let app = setup_app(15).await;
    register_and_login(&app, "Ana", "1234").await;

    let wrong_pin = app
        .router
        .clone()
        .oneshot(form_request(
            "/auth/login",
            None,
            &[("nombre", "Ana"), ("pin", "9999")],
        ))
        .await
        .unwrap();
    assert_eq!(wrong_pin.status(), StatusCode::UNAUTHORIZED);
    let wrong_pin_body = json_body(wrong_pin).await;

    let unknown = app
        .router
        .clone()
        .oneshot(form_request(
            "/auth/login",
            None,
            &[("nombre", "Nadie"), ("pin", "1234")],
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown_body = json_body(unknown).await;

    // Must not reveal which credential was wrong
    assert_eq!(wrong_pin_body["error"], unknown_body["error"]);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_malformed_credentials() {
    let app = setup_app(15).await;

    let no_header = submit_fields(&firma_dataurl());
    let fields: Vec<(&str, &str)> = no_header.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let response = app
        .router
        .clone()
        .oneshot(form_request("/inspecciones/submit", None, &fields))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = form_request("/inspecciones/submit", None, &fields);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(form_request("/inspecciones/submit", Some("bogus"), &fields))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    let response = app
        .router
        .clone()
        .oneshot(form_request("/auth/logout", Some(&token), &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Old token must now fail
    let response = submit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn relogin_invalidates_the_previous_token() {
    let app = setup_app(15).await;
    let first = register_and_login(&app, "Ana", "1234").await;

    // Second login: new token, old one overwritten
    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/auth/login",
            None,
            &[("nombre", "Ana"), ("pin", "1234")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = submit(&app, &first).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Submission and consolidation
// ============================================================================

#[tokio::test]
async fn valid_submission_returns_individual_pdf() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    let response = submit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("inspeccion_"));

    let bytes = pdf_body(response).await;
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn multipart_submission_returns_individual_pdf() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    let firma = firma_dataurl();
    let fields = submit_fields(&firma);
    let refs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/inspecciones/submit",
            Some(&token),
            &refs,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

    let bytes = pdf_body(response).await;
    assert!(bytes.starts_with(b"%PDF"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspecciones")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn multipart_validation_failure_returns_400() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    // No signature field
    let fields = [
        ("placa", "ABC123"),
        ("proceso", "Reparto"),
        ("desde", "Bodega"),
        ("hasta", "Cliente"),
    ];
    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/inspecciones/submit",
            Some(&token),
            &fields,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validation_failure_returns_400_and_persists_nothing() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    // Missing signature
    let fields = [
        ("placa", "ABC123"),
        ("proceso", "Reparto"),
        ("desde", "Bodega"),
        ("hasta", "Cliente"),
    ];
    let response = app
        .router
        .clone()
        .oneshot(form_request("/inspecciones/submit", Some(&token), &fields))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspecciones")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn conditional_checklist_rule_is_enforced_end_to_end() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    let firma = firma_dataurl();
    let mut fields = submit_fields(&firma);
    fields.retain(|(k, _)| *k != "aspectos");
    fields.push(("aspectos", r#"{"frenos":"M"}"#.to_string()));
    fields.push(("observaciones", "corto".to_string()));

    let refs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let response = app
        .router
        .clone()
        .oneshot(form_request("/inspecciones/submit", Some(&token), &refs))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Adequate remarks pass
    let mut fields = submit_fields(&firma);
    fields.retain(|(k, _)| *k != "aspectos");
    fields.push(("aspectos", r#"{"frenos":"M"}"#.to_string()));
    fields.push(("observaciones", "Frenos desgastados".to_string()));

    let refs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let response = app
        .router
        .clone()
        .oneshot(form_request("/inspecciones/submit", Some(&token), &refs))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// The full scenario: 14 individual PDFs, then the 15th submission
/// returns the consolidated report, resets the pending count, and leaves
/// one history row with total_incluidas = 15.
#[tokio::test]
async fn fifteenth_submission_consolidates() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    for n in 1..=14 {
        let response = submit(&app, &token).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(
            disposition.contains("inspeccion_"),
            "submission {} should return an individual PDF",
            n
        );

        let pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspecciones")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
        assert_eq!(pending, n);
    }

    let response = submit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("reporte15_Ana_"));

    let bytes = pdf_body(response).await;
    assert!(bytes.starts_with(b"%PDF"));

    let pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspecciones")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(pending, 0);

    let (reportes, incluidas): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), MAX(total_incluidas) FROM reportes")
            .fetch_one(&app.state.db)
            .await
            .unwrap();
    assert_eq!(reportes, 1);
    assert_eq!(incluidas, 15);
}

#[tokio::test]
async fn users_accumulate_independently() {
    let app = setup_app(2).await;
    let ana = register_and_login(&app, "Ana", "1234").await;
    let beto = register_and_login(&app, "Beto", "5678").await;

    // Ana reaches the threshold; Beto is one short
    submit(&app, &ana).await;
    submit(&app, &beto).await;
    let response = submit(&app, &ana).await;
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("reporte15_Ana_"));

    // Beto's single record is untouched by Ana's rollup
    let beto_pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inspecciones WHERE usuario_id = \
         (SELECT id FROM usuarios WHERE nombre = 'Beto')",
    )
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(beto_pending, 1);
}

// ============================================================================
// Manual consolidated report
// ============================================================================

#[tokio::test]
async fn reporte15_without_records_is_404() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/inspecciones/reporte15/Ana", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reporte15_is_scoped_to_the_caller() {
    let app = setup_app(15).await;
    let ana = register_and_login(&app, "Ana", "1234").await;
    register_and_login(&app, "Beto", "5678").await;

    submit(&app, &ana).await;

    // Ana asks for Beto's report by name; she gets her own records
    let response = app
        .router
        .clone()
        .oneshot(get_request("/inspecciones/reporte15/Beto", Some(&ana)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("reporte15_Ana_"));
}

#[tokio::test]
async fn reporte15_twice_yields_identical_content() {
    let app = setup_app(15).await;
    let token = register_and_login(&app, "Ana", "1234").await;

    submit(&app, &token).await;
    submit(&app, &token).await;

    let first = app
        .router
        .clone()
        .oneshot(get_request("/inspecciones/reporte15/Ana", Some(&token)))
        .await
        .unwrap();
    let second = app
        .router
        .clone()
        .oneshot(get_request("/inspecciones/reporte15/Ana", Some(&token)))
        .await
        .unwrap();

    assert_eq!(pdf_body(first).await, pdf_body(second).await);

    // Manual regeneration retires nothing
    let pending: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspecciones")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(pending, 2);
}
