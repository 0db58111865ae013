use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    Form, Json,
};
use serde_json::{json, Value};
use utoipa::OpenApi;

use super::{
    dto::{CircuitReadingDto, ReadingForm},
    errors::AppError,
};
use crate::ingest::{IngestError, IngestService};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Submit the latest reading for a device.
///
/// The `Authorization` header must equal the shared secret exactly. A
/// submission for a token already known replaces that token's record.
/// The body may be URL-encoded or `multipart/form-data`; when a field
/// appears more than once, its first value is used.
#[utoipa::path(
    post,
    path = "/api/dados",
    params(
        ("Authorization" = String, Header, description = "Shared ingestion secret"),
    ),
    request_body(
        content = ReadingForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Also accepted as multipart/form-data"
    ),
    responses(
        (status = 201, description = "Reading stored"),
        (status = 400, description = "Circuit name or token missing"),
        (status = 401, description = "Missing or invalid credential"),
        (status = 500, description = "Submission could not be processed"),
    ),
    tag = "readings"
)]
pub async fn submit_reading(
    State(service): State<IngestService>,
    request: Request,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let credential = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // Credential before body: a bad secret is a 401 even for an unreadable body.
    service.authenticate(credential.as_deref())?;
    let form = decode_form(request).await?;

    service.submit(credential.as_deref(), form.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "reading received" })),
    ))
}

/// Decode a URL-encoded or multipart body into a `ReadingForm`.
async fn decode_form(request: Request) -> Result<ReadingForm, IngestError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(IngestError::unexpected)?;
        return Ok(ReadingForm::from_pairs(pairs));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IngestError::unexpected)?;

    let mut pairs = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(IngestError::unexpected)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let value = field.text().await.map_err(IngestError::unexpected)?;
        pairs.push((name, value));
    }
    Ok(ReadingForm::from_pairs(pairs))
}

/// Every known device's latest reading with liveness recomputed,
/// in order of first submission.
#[utoipa::path(
    get,
    path = "/api/dados",
    responses(
        (status = 200, description = "Latest reading per device token", body = Vec<CircuitReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn list_readings(State(service): State<IngestService>) -> Json<Vec<CircuitReadingDto>> {
    Json(service.list().await.into_iter().map(Into::into).collect())
}

/// Latest reading for a single device token.
#[utoipa::path(
    get,
    path = "/api/dados/{token}",
    params(
        ("token" = String, Path, description = "Device token"),
    ),
    responses(
        (status = 200, description = "Latest reading", body = CircuitReadingDto),
        (status = 404, description = "No reading for this token"),
    ),
    tag = "readings"
)]
pub async fn get_reading(
    State(service): State<IngestService>,
    Path(token): Path<String>,
) -> Result<Json<CircuitReadingDto>, AppError> {
    service
        .get(&token)
        .await
        .map(|r| Json(r.into()))
        .ok_or_else(|| AppError::NotFound(format!("device {token}")))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(submit_reading, list_readings, get_reading, health),
    components(schemas(ReadingForm, CircuitReadingDto)),
    tags(
        (name = "readings", description = "Circuit reading ingestion and liveness"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Circuit Telemetry API",
        version = "0.1.0",
        description = "Ingestion and liveness tracking for circuit telemetry devices"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::{multipart::MultipartForm, TestServer};
    use chrono::{DateTime, TimeDelta};
    use serde_json::Value;

    use crate::{
        api::{dto::ReadingForm, router},
        clock::ManualClock,
        device_registry::DeviceRegistry,
        ingest::{IngestService, SharedSecret},
    };

    const SECRET: &str = "test-secret";

    fn test_server() -> (TestServer, ManualClock) {
        let clock = ManualClock::new(DateTime::from_timestamp_millis(1_700_000_000_000).unwrap());
        let registry = DeviceRegistry::with_clock(clock.clone());
        let service = IngestService::new(registry, SharedSecret::new(SECRET));
        (TestServer::new(router(service)).unwrap(), clock)
    }

    fn form(name: &str, voltage: &str, token: &str) -> ReadingForm {
        ReadingForm {
            nomecircuito: Some(name.to_owned()),
            tensao: Some(voltage.to_owned()),
            corrente: Some("10".to_owned()),
            temp_cabo: Some("40".to_owned()),
            token: Some(token.to_owned()),
        }
    }

    async fn submit(server: &TestServer, f: &ReadingForm) -> axum_test::TestResponse {
        server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static(SECRET))
            .form(f)
            .await
    }

    async fn list(server: &TestServer) -> Vec<Value> {
        let resp = server.get("/api/dados").await;
        resp.assert_status_ok();
        resp.json()
    }

    // -----------------------------------------------------------------------
    // POST /api/dados
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn submit_valid_reading_returns_created() {
        let (server, _) = test_server();
        let resp = submit(&server, &form("C1", "220", "tok1")).await;
        resp.assert_status(StatusCode::CREATED);
        let body: Value = resp.json();
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn submit_without_credential_is_unauthorized() {
        let (server, _) = test_server();
        let resp = server
            .post("/api/dados")
            .form(&form("C1", "220", "tok1"))
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        assert!(list(&server).await.is_empty());
    }

    #[tokio::test]
    async fn submit_with_wrong_credential_is_unauthorized() {
        let (server, _) = test_server();
        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer test-secret"))
            .form(&form("C1", "220", "tok1"))
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = resp.json();
        assert!(!body["error"].as_str().unwrap().contains(SECRET));
        assert!(list(&server).await.is_empty());
    }

    #[tokio::test]
    async fn submit_missing_name_is_bad_request() {
        let (server, _) = test_server();
        let mut f = form("C1", "220", "tok1");
        f.nomecircuito = None;

        let resp = submit(&server, &f).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("circuit name"));
        assert!(list(&server).await.is_empty());
    }

    #[tokio::test]
    async fn submit_missing_token_is_bad_request() {
        let (server, _) = test_server();
        let resp = submit(&server, &form("C1", "220", "")).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("device token"));
    }

    #[tokio::test]
    async fn bad_credential_wins_over_missing_fields() {
        let (server, _) = test_server();
        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("wrong"))
            .form(&ReadingForm::default())
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn undecodable_body_is_internal_error() {
        let (server, _) = test_server();
        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static(SECRET))
            .text("not a form")
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json();
        assert_eq!(body["error"], "failed to process submission");
    }

    #[tokio::test]
    async fn submit_multipart_reading_returns_created() {
        let (server, _) = test_server();
        let body = MultipartForm::new()
            .add_text("nomecircuito", "C1")
            .add_text("tensao", "220")
            .add_text("corrente", "10")
            .add_text("tempCabo", "40")
            .add_text("token", "tok1");

        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static(SECRET))
            .multipart(body)
            .await;
        resp.assert_status(StatusCode::CREATED);

        let body = list(&server).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["nomecircuito"], "C1");
        assert_eq!(body[0]["tensao"], 220.0);
        assert_eq!(body[0]["tempCabo"], 40.0);
        assert_eq!(body[0]["token"], "tok1");
    }

    #[tokio::test]
    async fn submit_multipart_missing_token_is_bad_request() {
        let (server, _) = test_server();
        let body = MultipartForm::new()
            .add_text("nomecircuito", "C1")
            .add_text("tensao", "220");

        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static(SECRET))
            .multipart(body)
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(list(&server).await.is_empty());
    }

    #[tokio::test]
    async fn repeated_form_field_uses_first_value() {
        let (server, _) = test_server();
        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static(SECRET))
            .text("nomecircuito=C1&tensao=220&token=tok1&token=tok2&tensao=999")
            .content_type("application/x-www-form-urlencoded")
            .await;
        resp.assert_status(StatusCode::CREATED);

        let body = list(&server).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["token"], "tok1");
        assert_eq!(body[0]["tensao"], 220.0);
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_internal_error() {
        let (server, _) = test_server();
        let resp = server
            .post("/api/dados")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static(SECRET))
            .text("nomecircuito=C1")
            .content_type("multipart/form-data")
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(list(&server).await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_body_without_credential_is_unauthorized() {
        let (server, _) = test_server();
        let resp = server.post("/api/dados").text("not a form").await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_numeric_values_are_stored_and_listed_as_null() {
        let (server, _) = test_server();
        submit(&server, &form("C1", "n/a", "tok1"))
            .await
            .assert_status(StatusCode::CREATED);

        let body = list(&server).await;
        assert!(body[0]["tensao"].is_null());
        assert_eq!(body[0]["corrente"], 10.0);
    }

    // -----------------------------------------------------------------------
    // GET /api/dados
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_empty_returns_empty_array() {
        let (server, _) = test_server();
        let resp = server.get("/api/dados").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn list_returns_one_entry_per_token_in_first_seen_order() {
        let (server, _) = test_server();
        submit(&server, &form("C2", "120", "tok2")).await;
        submit(&server, &form("C1", "220", "tok1")).await;
        submit(&server, &form("C2", "121", "tok2")).await;

        let body = list(&server).await;
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["token"], "tok2");
        assert_eq!(body[0]["tensao"], 121.0);
        assert_eq!(body[1]["token"], "tok1");
    }

    #[tokio::test]
    async fn end_to_end_liveness_scenario() {
        let (server, clock) = test_server();

        submit(&server, &form("C1", "220", "tok1"))
            .await
            .assert_status(StatusCode::CREATED);

        let body = list(&server).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["tensao"], 220.0);
        assert_eq!(body[0]["avaliable"], true);
        assert_eq!(body[0]["ultimaAtualizacao"], 1_700_000_000_000_i64);

        clock.advance(TimeDelta::seconds(61));
        let body = list(&server).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["avaliable"], false);

        submit(&server, &form("C1", "225", "tok1"))
            .await
            .assert_status(StatusCode::CREATED);
        let body = list(&server).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["tensao"], 225.0);
        assert_eq!(body[0]["avaliable"], true);
    }

    #[tokio::test]
    async fn liveness_boundary_around_sixty_seconds() {
        let (server, clock) = test_server();
        submit(&server, &form("C1", "220", "tok1")).await;

        clock.advance(TimeDelta::milliseconds(59_999));
        assert_eq!(list(&server).await[0]["avaliable"], true);

        clock.advance(TimeDelta::milliseconds(2));
        assert_eq!(list(&server).await[0]["avaliable"], false);
    }

    // -----------------------------------------------------------------------
    // GET /api/dados/{token}
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_reading_returns_record() {
        let (server, _) = test_server();
        submit(&server, &form("C1", "220", "tok1")).await;

        let resp = server.get("/api/dados/tok1").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["nomecircuito"], "C1");
        assert_eq!(body["tempCabo"], 40.0);
    }

    #[tokio::test]
    async fn get_reading_unknown_token_is_not_found() {
        let (server, _) = test_server();
        let resp = server.get("/api/dados/nope").await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // GET /health
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let (server, _) = test_server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    // -----------------------------------------------------------------------
    // GET /api-docs/openapi.json
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let (server, _) = test_server();
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Circuit Telemetry API");
        assert!(body["paths"]["/api/dados"].is_object());
    }
}
