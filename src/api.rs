use crate::{AppConfig, AppState};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ADMIN_COOKIE: &str = "admin_session";
const SESSION_SECONDS: i64 = 12 * 60 * 60;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    ok: bool,
    message: String,
}

pub fn create_signed_cookie(secret: &str, value: &str) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Invalid secret key")?;
    mac.update(value.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}:{}", value, signature_b64))
}

pub fn verify_signed_cookie(secret: &str, signed_value: &str) -> bool {
    if let Some((value, signature_b64)) = signed_value.split_once(':')
        && let Ok(signature) = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64)
        && let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes())
    {
        mac.update(value.as_bytes());
        return mac.verify_slice(&signature).is_ok();
    }
    false
}

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get("cookie")?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
}

/// Admin access is open when no password is configured.
pub fn admin_required(config: &AppConfig) -> bool {
    config
        .admin_password
        .as_deref()
        .is_some_and(|password| !password.is_empty())
}

/// True when the request carries an unexpired admin session signed with the
/// configured secret.
pub fn is_admin(headers: &HeaderMap, config: &AppConfig) -> bool {
    if !admin_required(config) {
        return true;
    }

    let Some(signed_value) = get_cookie_value(headers, ADMIN_COOKIE) else {
        return false;
    };
    if !verify_signed_cookie(&config.session_secret, &signed_value) {
        return false;
    }

    signed_value
        .split_once(':')
        .and_then(|(value, _)| value.strip_prefix("admin-"))
        .and_then(|expires| expires.parse::<i64>().ok())
        .is_some_and(|expires| expires > chrono::Utc::now().timestamp())
}

pub async fn require_admin(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_admin(request.headers(), &app_state.config.app) {
        next.run(request).await
    } else {
        tracing::debug!("Rejected unauthenticated admin request to {}", request.uri());
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn session_cookie(value: &str, max_age: i64) -> Result<HeaderValue, StatusCode> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        ADMIN_COOKIE, value, max_age
    ))
    .map_err(|e| {
        tracing::error!("Invalid session cookie: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, StatusCode> {
    tracing::info!("Admin login attempt received");
    let config = &app_state.config.app;

    let password_matches = config.admin_password.as_deref() == Some(payload.password.as_str());
    if !admin_required(config) || !password_matches {
        tracing::warn!("Admin login failed");
        let response = LoginResponse {
            ok: false,
            message: "Неверный пароль".to_string(),
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(response)).into_response());
    }

    let expires = chrono::Utc::now().timestamp() + SESSION_SECONDS;
    let signed_value =
        create_signed_cookie(&config.session_secret, &format!("admin-{}", expires)).map_err(|e| {
            tracing::error!("Failed to sign admin session: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie(&signed_value, SESSION_SECONDS)?);

    tracing::info!("Admin login successful");
    let response = LoginResponse {
        ok: true,
        message: "Вход выполнен".to_string(),
    };
    Ok((headers, Json(response)).into_response())
}

pub async fn logout_handler() -> Result<Response, StatusCode> {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie("", 0)?);
    Ok((
        headers,
        Json(LoginResponse {
            ok: true,
            message: "Выход выполнен".to_string(),
        }),
    )
        .into_response())
}
