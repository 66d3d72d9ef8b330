use super::{Lead, LeadError, LeadResponse, LeadSubmission, check_webhook_token};
use crate::AppState;
use axum::{
    Form,
    extract::{FromRequest, Query, Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::{error, warn};

pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";
const CRM_SOURCE: &str = "CRM";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

/// Site form submission, accepted as JSON or urlencoded form data.
pub async fn lead_handler(State(app_state): State<AppState>, request: Request) -> Response {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    let submission = if is_json {
        match Json::<LeadSubmission>::from_request(request, &app_state).await {
            Ok(Json(submission)) => submission,
            Err(rejection) => return rejection.into_response(),
        }
    } else {
        match Form::<LeadSubmission>::from_request(request, &app_state).await {
            Ok(Form(submission)) => submission,
            Err(rejection) => return rejection.into_response(),
        }
    };

    // Only the webhook may mark a lead as coming from the CRM.
    let submission = LeadSubmission {
        from_crm: false,
        ..submission
    };
    store_lead(&app_state, submission).await
}

pub async fn webhook_handler(
    State(app_state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    Json(submission): Json<LeadSubmission>,
) -> Response {
    let provided = query.token.or_else(|| {
        headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });

    if !check_webhook_token(
        app_state.config.app.webhook_secret.as_deref(),
        provided.as_deref(),
    ) {
        warn!("Rejected webhook lead with invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let source = if submission.source.trim().is_empty() {
        CRM_SOURCE.to_string()
    } else {
        submission.source
    };
    let submission = LeadSubmission {
        source,
        from_crm: true,
        ..submission
    };
    store_lead(&app_state, submission).await
}

pub async fn leads_list_handler(State(app_state): State<AppState>) -> Json<Vec<Lead>> {
    Json(app_state.leads.load().await)
}

async fn store_lead(app_state: &AppState, submission: LeadSubmission) -> Response {
    match app_state.leads.add(submission).await {
        Ok(lead) => Json(LeadResponse {
            ok: true,
            message: "Заявка принята. Мы перезвоним в ближайшее время.".to_string(),
            id: Some(lead.id),
        })
        .into_response(),
        Err(LeadError::MissingField(field)) => {
            warn!("Rejected lead without {}", field);
            (
                StatusCode::BAD_REQUEST,
                Json(LeadResponse {
                    ok: false,
                    message: "Заполните имя и телефон.".to_string(),
                    id: None,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to store lead: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LeadResponse {
                    ok: false,
                    message: "Не удалось сохранить заявку. Попробуйте позже.".to_string(),
                    id: None,
                }),
            )
                .into_response()
        }
    }
}
