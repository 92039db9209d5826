use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::require_session;
use crate::db::models::{Token, TokenShare, TokenStatus};
use crate::db::operations::clamp_page_params;
use crate::error::{AppError, DatabaseError};
use crate::share::ActivateRequest;
use crate::tokens::{normalize_tenant_url, ProbeOutcome};
use crate::vault;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub tenant_url: String,
    pub access_token: String,
    pub portal_url: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTokenRequest {
    pub remark: Option<String>,
    pub portal_url: Option<String>,
    pub status: Option<TokenStatus>,
}

#[derive(Debug, Deserialize)]
pub struct BatchImportRequest {
    pub tokens: Vec<CreateTokenRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct ImportSessionRequest {
    pub cookie: String,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchShareRequest {
    pub ids: Vec<Uuid>,
}

/// Public list/detail shape: the stored (sealed) token never leaves the
/// serializer, a redacted preview is attached instead.
fn summarize(token: &Token, state: &AppState) -> Result<serde_json::Value, AppError> {
    let plaintext = state.cipher.open(&token.access_token)?;
    let mut value = serde_json::to_value(token)
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    value["token_preview"] = json!(vault::redact(&plaintext));
    Ok(value)
}

fn reveal(token: &Token, state: &AppState) -> Result<serde_json::Value, AppError> {
    let plaintext = state.cipher.open(&token.access_token)?;
    let mut value = summarize(token, state)?;
    value["access_token"] = json!(plaintext);
    Ok(value)
}

fn build_record(req: &CreateTokenRequest, state: &AppState) -> Result<(Token, String), AppError> {
    let access_token = req.access_token.trim();
    if access_token.is_empty() {
        return Err(AppError::ValidationError("access_token must not be empty".to_string()));
    }

    let tenant_url = normalize_tenant_url(&req.tenant_url)?;
    let digest = vault::token_digest(access_token);
    let sealed = state.cipher.seal(access_token)?;

    let mut token = Token::new(tenant_url, sealed, digest.clone());
    token.portal_url = req.portal_url.clone();
    token.remark = req.remark.clone();

    Ok((token, digest))
}

pub async fn list_tokens(
    req: HttpRequest,
    query: web::Query<ListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let (page, page_size) = clamp_page_params(query.page, query.page_size);
    let (tokens, total) = state.db.list_tokens(page, page_size).await?;

    let items = tokens
        .iter()
        .map(|t| summarize(t, &state))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(json!({
        "items": items,
        "total": total,
        "page": page,
        "page_size": page_size,
    })))
}

pub async fn create_token(
    req: HttpRequest,
    body: web::Json<CreateTokenRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let (token, digest) = build_record(&body, &state)?;

    if state.db.get_token_by_digest(&digest).await?.is_some() {
        return Err(DatabaseError::Duplicate.into());
    }

    let created = state.db.create_token(&token).await?;
    info!("Created token {} for tenant {}", created.id, created.tenant_url);

    Ok(HttpResponse::Created().json(summarize(&created, &state)?))
}

pub async fn get_token(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let token = state
        .db
        .get_token_by_id(path.into_inner())
        .await?
        .ok_or(DatabaseError::NotFound)?;

    Ok(HttpResponse::Ok().json(reveal(&token, &state)?))
}

pub async fn update_token(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<UpdateTokenRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    if let Some(portal_url) = &body.portal_url {
        // Portal URLs share the tenant-URL shape requirements.
        normalize_tenant_url(portal_url)?;
    }

    let updated = state
        .db
        .update_token(
            path.into_inner(),
            body.remark.as_deref(),
            body.portal_url.as_deref(),
            body.status,
        )
        .await?;

    Ok(HttpResponse::Ok().json(summarize(&updated, &state)?))
}

pub async fn delete_token(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let deleted = state.db.delete_token(path.into_inner()).await?;
    if !deleted {
        return Err(DatabaseError::NotFound.into());
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Bulk import. Entries are independent: one malformed or duplicate entry
/// never aborts the rest of the batch.
pub async fn batch_import(
    req: HttpRequest,
    body: web::Json<BatchImportRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let mut imported = 0u32;
    let mut skipped = 0u32;
    let mut failed = Vec::new();
    let mut seen_digests = std::collections::HashSet::new();

    for (index, entry) in body.tokens.iter().enumerate() {
        let (token, digest) = match build_record(entry, &state) {
            Ok(built) => built,
            Err(e) => {
                failed.push(json!({"index": index, "reason": e.to_string()}));
                continue;
            }
        };

        if !seen_digests.insert(digest.clone()) {
            skipped += 1;
            continue;
        }

        match state.db.get_token_by_digest(&digest).await {
            Ok(Some(_)) => {
                skipped += 1;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                failed.push(json!({"index": index, "reason": e.to_string()}));
                continue;
            }
        }

        match state.db.create_token(&token).await {
            Ok(_) => imported += 1,
            Err(e) => failed.push(json!({"index": index, "reason": e.to_string()})),
        }
    }

    info!(
        "Batch import finished: {} imported, {} skipped, {} failed",
        imported,
        skipped,
        failed.len()
    );

    Ok(HttpResponse::Ok().json(json!({
        "imported": imported,
        "skipped": skipped,
        "failed": failed,
    })))
}

/// Batch validation. Each token gets one probe against its tenant; a probe
/// that cannot reach a verdict leaves the stored status untouched.
pub async fn check_tokens(
    req: HttpRequest,
    body: web::Json<CheckRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let tokens = match &body.ids {
        Some(ids) => {
            let mut tokens = Vec::with_capacity(ids.len());
            for id in ids {
                match state.db.get_token_by_id(*id).await? {
                    Some(token) => tokens.push(token),
                    None => {}
                }
            }
            tokens
        }
        None => state.db.list_all_tokens().await?,
    };

    let mut results = Vec::with_capacity(tokens.len());
    let now = chrono::Utc::now();

    for token in &tokens {
        let plaintext = match state.cipher.open(&token.access_token) {
            Ok(p) => p,
            Err(e) => {
                results.push(json!({"id": token.id, "outcome": "error", "detail": e.to_string()}));
                continue;
            }
        };

        match state.validator.probe(&token.tenant_url, &plaintext).await {
            ProbeOutcome::Active => {
                state.db.update_token_status(token.id, TokenStatus::Active, now).await?;
                results.push(json!({"id": token.id, "outcome": TokenStatus::Active.as_str()}));
            }
            ProbeOutcome::Banned => {
                warn!("Token {} is banned at {}", token.id, token.tenant_url);
                state.db.update_token_status(token.id, TokenStatus::Banned, now).await?;
                results.push(json!({"id": token.id, "outcome": TokenStatus::Banned.as_str()}));
            }
            ProbeOutcome::Inconclusive(detail) => {
                state.db.touch_token_checked(token.id, now).await?;
                results.push(json!({"id": token.id, "outcome": "inconclusive", "detail": detail}));
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "checked": results.len(),
        "results": results,
    })))
}

/// The session-import flow: one pass from browser cookie to stored record.
pub async fn import_session(
    req: HttpRequest,
    body: web::Json<ImportSessionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    if body.cookie.trim().is_empty() {
        return Err(AppError::ValidationError("cookie must not be empty".to_string()));
    }

    let credentials = state.importer.import(body.cookie.trim()).await?;

    let tenant_url = normalize_tenant_url(&credentials.tenant_url)?;
    let digest = vault::token_digest(&credentials.access_token);

    if state.db.get_token_by_digest(&digest).await?.is_some() {
        return Err(DatabaseError::Duplicate.into());
    }

    let sealed = state.cipher.seal(&credentials.access_token)?;
    let mut token = Token::new(tenant_url, sealed, digest);
    token.email = credentials.customer.as_ref().and_then(|c| c.email.clone());
    token.remark = body.remark.clone().or_else(|| {
        credentials
            .customer
            .as_ref()
            .and_then(|c| c.plan.as_ref().map(|p| format!("plan: {}", p)))
    });

    let created = state.db.create_token(&token).await?;
    info!("Session import created token {} for {}", created.id, created.tenant_url);

    let customer = credentials.customer.as_ref().map(|c| {
        json!({
            "email": c.email,
            "plan": c.plan,
            "credits_balance": c.credits_balance,
        })
    });

    Ok(HttpResponse::Created().json(json!({
        "token": summarize(&created, &state)?,
        "customer": customer,
    })))
}

/// Core of the share flow, used by the single and batch routes. A first
/// share activates a card at the partner; re-sharing refreshes the stored
/// status from the partner instead of activating again.
async fn share_one(state: &AppState, id: Uuid) -> Result<(TokenShare, bool), AppError> {
    let token = state
        .db
        .get_token_by_id(id)
        .await?
        .ok_or(DatabaseError::NotFound)?;

    if let Some(existing) = state.db.get_share_by_token_id(id).await? {
        let activation = state.card_client.query(&existing.card_id).await?;
        state.db.update_share_status(id, activation.status).await?;

        let refreshed = TokenShare {
            status: activation.status,
            ..existing
        };
        return Ok((refreshed, false));
    }

    let plaintext = state.cipher.open(&token.access_token)?;

    let activation = state
        .card_client
        .activate(ActivateRequest {
            token_ref: token.id,
            tenant_url: token.tenant_url.clone(),
            access_token: plaintext,
            email: token.email.clone(),
        })
        .await?;

    let share = TokenShare::new(
        token.id,
        activation.card_id,
        activation.activation_code,
        activation.status,
        activation.expires_at,
    );
    let share = state.db.upsert_share(&share).await?;
    state.db.increment_usage(token.id).await?;

    info!("Shared token {} as card {}", token.id, share.card_id);

    Ok((share, true))
}

pub async fn share_token(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let (share, created) = share_one(&state, path.into_inner()).await?;

    if created {
        Ok(HttpResponse::Created().json(share))
    } else {
        Ok(HttpResponse::Ok().json(share))
    }
}

pub async fn get_share(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let token_id = path.into_inner();
    let mut share = state
        .db
        .get_share_by_token_id(token_id)
        .await?
        .ok_or(crate::error::ShareError::NotShared)?;

    // Refresh from the partner when reachable; stored state otherwise.
    match state.card_client.query(&share.card_id).await {
        Ok(activation) => {
            state.db.update_share_status(token_id, activation.status).await?;
            share.status = activation.status;
        }
        Err(e) => warn!("Share status refresh failed for {}: {}", share.card_id, e),
    }

    Ok(HttpResponse::Ok().json(share))
}

pub async fn batch_share(
    req: HttpRequest,
    body: web::Json<BatchShareRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_session(&req, &state).await?;

    let mut results = Vec::with_capacity(body.ids.len());

    for id in &body.ids {
        match share_one(&state, *id).await {
            Ok((share, _)) => {
                results.push(json!({"id": id, "ok": true, "card_id": share.card_id}));
            }
            Err(e) => {
                results.push(json!({"id": id, "ok": false, "error": e.to_string()}));
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({"results": results})))
}
