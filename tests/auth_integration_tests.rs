mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, header, request::Parts},
    response::IntoResponse,
};
use chrono::Utc;
use common::{MemoryRepository, user};
use crm_backend::{
    AppState,
    auth::{AuthUser, Claims, ClientIp, decode_token, issue_token},
    config::{AppConfig, Env},
    error::AppError,
    models::UserRole,
    password::{hash_password, verify_password},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Helpers ---

fn create_app_state(env: Env, repo: MemoryRepository) -> AppState {
    let config = AppConfig {
        env,
        ..AppConfig::default()
    };
    AppState {
        repo: Arc::new(repo),
        config,
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts() -> Parts {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

fn status_of(err: AppError) -> StatusCode {
    err.into_response().status()
}

fn repo_with(users: Vec<crm_backend::models::User>) -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.with_store(|s| s.users.extend(users));
    repo
}

// --- Token Tests ---

#[test]
fn test_issue_and_decode_token_round_trip() {
    let config = AppConfig::default();
    let account = user("Agent Smith", "smith@crm.com", UserRole::Agent);

    let token = issue_token(&account, &config).unwrap();
    let claims = decode_token(&token, &config).unwrap();

    assert_eq!(claims.sub, account.id);
    assert_eq!(claims.email, "smith@crm.com");
    assert_eq!(claims.role, UserRole::Agent);
    assert_eq!(claims.iss, config.jwt_issuer);
    assert_eq!(claims.aud, config.jwt_audience);
    assert_eq!(claims.exp - claims.iat, config.jwt_expiry_hours * 3600);
}

#[test]
fn test_decode_rejects_expired_token() {
    let config = AppConfig::default();
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4(),
        email: "old@crm.com".to_string(),
        name: "Old".to_string(),
        role: UserRole::Admin,
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap();

    match decode_token(&token, &config) {
        Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Token has expired"),
        other => panic!("expected expiry rejection, got {:?}", other),
    }
}

#[test]
fn test_decode_rejects_wrong_audience_and_secret() {
    let config = AppConfig::default();
    let account = user("Admin", "admin@crm.com", UserRole::Admin);
    let token = issue_token(&account, &config).unwrap();

    let other_audience = AppConfig {
        jwt_audience: "someone-else".to_string(),
        ..AppConfig::default()
    };
    assert!(decode_token(&token, &other_audience).is_err());

    let other_secret = AppConfig {
        jwt_secret: "a-completely-different-signing-secret".to_string(),
        ..AppConfig::default()
    };
    assert!(decode_token(&token, &other_secret).is_err());
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let account = user("Accountant", "books@crm.com", UserRole::Accountant);
    let app_state = create_app_state(Env::Production, repo_with(vec![account.clone()]));
    let token = issue_token(&account, &app_state.config).unwrap();

    let mut parts = get_request_parts();
    bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(auth_user.id, account.id);
    assert_eq!(auth_user.role, UserRole::Accountant);
    assert!(!auth_user.is_admin());
}

#[tokio::test]
async fn test_auth_uses_current_role_from_database() {
    let mut account = user("Demoted", "demoted@crm.com", UserRole::Admin);
    let config = AppConfig::default();
    let token = issue_token(&account, &config).unwrap();

    account.role = UserRole::Agent;
    let app_state = create_app_state(Env::Production, repo_with(vec![account.clone()]));

    let mut parts = get_request_parts();
    bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.role, UserRole::Agent);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, MemoryRepository::new());
    let mut parts = get_request_parts();

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();

    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_inactive_user() {
    let mut account = user("Gone", "gone@crm.com", UserRole::Agent);
    account.is_active = false;
    let app_state = create_app_state(Env::Production, repo_with(vec![account.clone()]));
    let token = issue_token(&account, &app_state.config).unwrap();

    let mut parts = get_request_parts();
    bearer(&mut parts, &token);

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_deleted_user() {
    let account = user("Ghost", "ghost@crm.com", UserRole::Admin);
    let app_state = create_app_state(Env::Production, MemoryRepository::new());
    let token = issue_token(&account, &app_state.config).unwrap();

    let mut parts = get_request_parts();
    bearer(&mut parts, &token);

    assert!(AuthUser::from_request_parts(&mut parts, &app_state).await.is_err());
}

#[tokio::test]
async fn test_local_bypass_success() {
    let account = user("Local Admin", "local@crm.com", UserRole::Admin);
    let app_state = create_app_state(Env::Local, repo_with(vec![account.clone()]));

    let mut parts = get_request_parts();
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&account.id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(auth_user.id, account.id);
    assert!(auth_user.is_admin());
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let account = user("Prod Admin", "prod@crm.com", UserRole::Admin);
    let app_state = create_app_state(Env::Production, repo_with(vec![account.clone()]));

    let mut parts = get_request_parts();
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&account.id.to_string()).unwrap(),
    );

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_extractor_reuses_identity_from_extensions() {
    // An empty repository proves no lookup happens.
    let app_state = create_app_state(Env::Production, MemoryRepository::new());
    let resolved = AuthUser {
        id: Uuid::new_v4(),
        name: "Cached".to_string(),
        email: "cached@crm.com".to_string(),
        role: UserRole::Agent,
    };

    let mut parts = get_request_parts();
    parts.extensions.insert(resolved.clone());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.id, resolved.id);
}

#[test]
fn test_require_role() {
    let agent = AuthUser {
        id: Uuid::new_v4(),
        name: "Agent".to_string(),
        email: "agent@crm.com".to_string(),
        role: UserRole::Agent,
    };

    assert!(agent.require_role(&[UserRole::Admin, UserRole::Agent]).is_ok());
    let err = agent.require_role(&[UserRole::Admin]).unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_client_ip_prefers_first_forwarded_hop() {
    let mut parts = get_request_parts();
    parts.headers.insert(
        "x-forwarded-for",
        header::HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
    );
    parts
        .headers
        .insert("x-real-ip", header::HeaderValue::from_static("10.0.0.2"));

    let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
    assert_eq!(ip.as_deref(), Some("203.0.113.7"));

    let mut parts = get_request_parts();
    parts
        .headers
        .insert("x-real-ip", header::HeaderValue::from_static("10.0.0.2"));
    let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
    assert_eq!(ip.as_deref(), Some("10.0.0.2"));

    let mut parts = get_request_parts();
    let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
    assert!(ip.is_none());
}

// --- Password Hashing ---

#[test]
fn test_password_hash_and_verify() {
    let hash = hash_password("Admin@123").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert_ne!(hash, "Admin@123");
    assert!(verify_password("Admin@123", &hash).unwrap());
    assert!(!verify_password("admin@123", &hash).unwrap());
}

#[test]
fn test_password_hashes_are_salted() {
    let first = hash_password("Agent@123").unwrap();
    let second = hash_password("Agent@123").unwrap();
    assert_ne!(first, second);
}
