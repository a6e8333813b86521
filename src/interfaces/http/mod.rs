use crate::application::use_cases::response_merger::merge_responses;
use crate::application::use_cases::response_normalizer::{
    responses_from_audit_embedded, responses_from_embedded_value, responses_from_rows,
    responses_from_rows_value,
};
use crate::domain::audit::{AuditRecord, FindingRecord, PendingAuditPayload, UserType};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::responses::Responses;
use crate::domain::session::{ClientId, CurrentUser};
use crate::domain::taxonomy::Status;
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{
    delete, dev::Server, get, patch, post, put, web, App, HttpRequest, HttpResponse, HttpServer,
    Responder,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use validator::Validate;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Random id the dashboard generates once per browser profile.
pub const CLIENT_ID_HEADER: &str = "x-client-id";
const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app_state: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize)]
pub struct NormalizeRequest {
    #[serde(default)]
    pub embedded: Value,
    #[serde(default)]
    pub rows: Value,
    /// A whole audit document; its embedded answers are read from the usual places.
    #[serde(default)]
    pub audit: Value,
}

#[derive(Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub config: Option<LLMConfig>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub developer_responses: Value,
    #[serde(default)]
    pub organization_responses: Value,
}

#[derive(Deserialize)]
pub struct ListAuditsQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: Status,
}

#[derive(Deserialize)]
pub struct ApiKeyRequest {
    pub key: String,
}

#[derive(Serialize)]
struct ClaimResponse {
    claimed: Option<AuditRecord>,
}

fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::ValidationError(_) | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(data: &HttpState, context: &str, error: AppError) -> HttpResponse {
    let status = status_for(&error);
    let level = if status.is_server_error() { "ERROR" } else { "WARN" };
    add_log(&data.logs, level, "HttpApi", &format!("{}: {}", context, error));
    HttpResponse::build(status).json(json!({ "error": error }))
}

fn respond<T: Serialize>(data: &HttpState, context: &str, result: Result<T>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(data, context, e),
    }
}

/// The external auth provider forwards the session as headers; no id means anonymous.
pub fn current_user(req: &HttpRequest) -> Option<CurrentUser> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    };
    CurrentUser::from_parts(header(USER_ID_HEADER), header(USER_EMAIL_HEADER))
}

fn require_user(req: &HttpRequest) -> Result<CurrentUser> {
    current_user(req).ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
}

fn require_client(req: &HttpRequest) -> Result<ClientId> {
    let raw = req
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok());
    ClientId::parse(raw).ok_or_else(|| {
        AppError::ValidationError(format!("Missing or invalid {} header", CLIENT_ID_HEADER))
    })
}

/// Fetch an audit and hide it from anyone but its owner.
async fn owned_audit(state: &AppState, user: &CurrentUser, audit_id: &str) -> Result<AuditRecord> {
    let audit = state.repository.get_audit(audit_id).await?;
    if audit.user_id != user.id {
        return Err(AppError::NotFound(format!("Audit not found: {}", audit_id)));
    }
    Ok(audit)
}

#[post("/responses/normalize")]
async fn normalize_responses(
    data: web::Data<HttpState>,
    req: web::Json<NormalizeRequest>,
) -> impl Responder {
    let embedded = responses_from_embedded_value(&req.embedded);
    let rows = responses_from_rows_value(&req.rows);
    let audit = responses_from_audit_embedded(&req.audit);
    let merged = merge_responses([Some(&embedded), Some(&rows), Some(&audit)]);

    add_log(
        &data.logs,
        "INFO",
        "Responses",
        &format!(
            "Normalized {} questions ({} selections)",
            merged.len(),
            merged.selection_count()
        ),
    );
    HttpResponse::Ok().json(merged)
}

#[post("/responses/merge")]
async fn merge(parts: web::Json<Vec<Option<Responses>>>) -> impl Responder {
    HttpResponse::Ok().json(merge_responses(parts.iter().map(Option::as_ref)))
}

#[post("/audits/scan")]
async fn scan_audit(
    data: web::Data<HttpState>,
    req: HttpRequest,
    body: web::Json<ScanRequest>,
) -> impl Responder {
    let client = match require_client(&req) {
        Ok(client) => client,
        Err(e) => return error_response(&data, "Scan rejected", e),
    };
    if let Some(Err(e)) = body.config.as_ref().map(|config| config.validate()) {
        return error_response(
            &data,
            "Scan rejected",
            AppError::ValidationError(format!("Invalid LLM config: {}", e)),
        );
    }
    let config = data.app_state.scan_llm_config(body.config.as_ref());
    let user_type = body
        .user_type
        .as_deref()
        .map(UserType::parse)
        .unwrap_or_default();

    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!(
            "Scanning audit (user_type={} provider={:?} base_url={})",
            user_type, config.provider, config.base_url
        ),
    );

    let results = data.app_state.results.store(&client);
    let result = data
        .app_state
        .scan_use_case
        .scan(
            &results,
            &config,
            user_type,
            &body.developer_responses,
            &body.organization_responses,
        )
        .await;
    respond(&data, "Scan failed", result)
}

#[get("/preview")]
async fn get_preview(data: web::Data<HttpState>, req: HttpRequest) -> impl Responder {
    let result = require_client(&req).map(|client| data.app_state.results.current(&client));
    respond(&data, "Reading preview failed", result)
}

#[delete("/preview")]
async fn clear_preview(data: web::Data<HttpState>, req: HttpRequest) -> impl Responder {
    match require_client(&req) {
        Ok(client) => {
            data.app_state.results.clear(&client);
            HttpResponse::NoContent().finish()
        }
        Err(e) => error_response(&data, "Clearing preview failed", e),
    }
}

#[get("/pending")]
async fn get_pending(data: web::Data<HttpState>, req: HttpRequest) -> impl Responder {
    let result =
        require_client(&req).map(|client| data.app_state.carryover_use_case.pending(&client));
    respond(&data, "Reading pending audit failed", result)
}

#[post("/pending")]
async fn save_pending(
    data: web::Data<HttpState>,
    req: HttpRequest,
    payload: web::Json<PendingAuditPayload>,
) -> impl Responder {
    match require_client(&req) {
        Ok(client) => {
            data.app_state.carryover_use_case.stash(&client, &payload);
            add_log(&data.logs, "INFO", "Pending", "Pending audit staged");
            HttpResponse::NoContent().finish()
        }
        Err(e) => error_response(&data, "Staging pending audit failed", e),
    }
}

#[delete("/pending")]
async fn clear_pending(data: web::Data<HttpState>, req: HttpRequest) -> impl Responder {
    match require_client(&req) {
        Ok(client) => {
            data.app_state.carryover_use_case.discard(&client);
            HttpResponse::NoContent().finish()
        }
        Err(e) => error_response(&data, "Clearing pending audit failed", e),
    }
}

#[post("/pending/claim")]
async fn claim_pending(data: web::Data<HttpState>, req: HttpRequest) -> impl Responder {
    let result: Result<Option<AuditRecord>> = async {
        let client = require_client(&req)?;
        data.app_state
            .carryover_use_case
            .claim(&client, current_user(&req))
            .await
    }
    .await;
    if let Ok(Some(record)) = &result {
        add_log(
            &data.logs,
            "INFO",
            "Pending",
            &format!("Pending audit saved as {}", record.id),
        );
    }
    respond(
        &data,
        "Claim failed",
        result.map(|claimed| ClaimResponse { claimed }),
    )
}

#[get("/audits")]
async fn list_audits(
    data: web::Data<HttpState>,
    req: HttpRequest,
    query: web::Query<ListAuditsQuery>,
) -> impl Responder {
    let result = match require_user(&req) {
        Ok(user) => data.app_state.repository.list_audits(&user.id, query.limit).await,
        Err(e) => Err(e),
    };
    respond(&data, "Listing audits failed", result)
}

#[get("/audits/{id}")]
async fn get_audit(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let result = match require_user(&req) {
        Ok(user) => owned_audit(&data.app_state, &user, &path).await,
        Err(e) => Err(e),
    };
    respond(&data, "Fetching audit failed", result)
}

#[get("/audits/{id}/responses")]
async fn get_audit_responses(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let result: Result<Responses> = async {
        let user = require_user(&req)?;
        let audit = owned_audit(&data.app_state, &user, &path).await?;
        let rows = data.app_state.repository.list_answer_rows(&audit.id).await?;
        let embedded = responses_from_audit_embedded(&audit.as_document());
        let stored = responses_from_rows(&rows);
        Ok(merge_responses([Some(&embedded), Some(&stored)]))
    }
    .await;
    respond(&data, "Fetching responses failed", result)
}

#[get("/audits/{id}/findings")]
async fn get_audit_findings(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let result: Result<Vec<FindingRecord>> = async {
        let user = require_user(&req)?;
        let audit = owned_audit(&data.app_state, &user, &path).await?;
        data.app_state.repository.list_findings(&audit.id).await
    }
    .await;
    respond(&data, "Fetching findings failed", result)
}

#[patch("/findings/{id}/status")]
async fn update_finding_status(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> impl Responder {
    let finding_id = path.into_inner();
    let result: Result<FindingRecord> = async {
        let user = require_user(&req)?;
        let finding = data.app_state.repository.get_finding(finding_id).await?;
        owned_audit(&data.app_state, &user, &finding.audit_id).await?;
        data.app_state
            .repository
            .update_finding_status(finding_id, body.status)
            .await
    }
    .await;
    respond(&data, "Updating finding failed", result)
}

#[put("/settings/api-key/{provider}")]
async fn save_api_key(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<ApiKeyRequest>,
) -> impl Responder {
    let result = require_user(&req).and_then(|_| {
        if body.key.trim().is_empty() {
            return Err(AppError::ValidationError("API key is empty".to_string()));
        }
        data.app_state
            .config_service
            .save_api_key(&path, body.key.trim())
    });
    match result {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&data, "Saving API key failed", e),
    }
}

#[delete("/settings/api-key/{provider}")]
async fn delete_api_key(
    data: web::Data<HttpState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let result =
        require_user(&req).and_then(|_| data.app_state.config_service.delete_api_key(&path));
    match result {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&data, "Deleting API key failed", e),
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data.logs.lock().unwrap_or_else(|e| e.into_inner());
    HttpResponse::Ok().json(&*logs)
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap_or_else(|e| e.into_inner());
    logs.push(entry);
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(normalize_responses)
            .service(merge)
            .service(scan_audit)
            .service(get_preview)
            .service(clear_preview)
            .service(claim_pending)
            .service(get_pending)
            .service(save_pending)
            .service(clear_pending)
            .service(list_audits)
            .service(get_audit_responses)
            .service(get_audit_findings)
            .service(get_audit)
            .service(update_finding_status)
            .service(save_api_key)
            .service(delete_api_key)
            .service(get_logs),
    );
}

pub fn start_server(
    app_state: Arc<AppState>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    host: &str,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app_state, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
