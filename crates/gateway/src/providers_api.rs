//! `/api/providers[/name]` (§6): credential management for upstream model
//! providers, persisted to `$HOME/.wingman/credentials.json` at mode 0600.
//! Distinct from `wingman-auth`'s `CredentialStore` (the operator's own
//! login), this is a flat on-disk JSON document, matching the filesystem
//! layout this codebase already keeps its other side files in.

use std::{
    collections::HashMap,
    io::Write,
    path::PathBuf,
    sync::Arc,
};

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{error::GatewayError, state::GatewayState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderCredential {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsFile {
    pub version: u32,
    pub updated_at: i64,
    pub providers: HashMap<String, ProviderCredential>,
}

/// Serializes all read/modify/write cycles against the credentials file so
/// concurrent `/api/providers` calls can't interleave and clobber each
/// other's writes.
#[derive(Default)]
pub struct ProvidersStore(pub(crate) Mutex<()>);

impl ProvidersStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn credentials_path() -> PathBuf {
    wingman_config::wingman_home().join("credentials.json")
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn read_file() -> Result<CredentialsFile, GatewayError> {
    let path = credentials_path();
    if !path.exists() {
        return Ok(CredentialsFile {
            version: 1,
            updated_at: now_ms(),
            providers: HashMap::new(),
        });
    }
    let bytes = std::fs::read(&path).map_err(|err| GatewayError::internal(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| GatewayError::internal(err.to_string()))
}

fn write_file(file: &CredentialsFile) -> Result<(), GatewayError> {
    let path = credentials_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| GatewayError::internal(err.to_string()))?;
    }
    let json = serde_json::to_vec_pretty(file).map_err(|err| GatewayError::internal(err.to_string()))?;

    #[cfg(unix)]
    let mut handle = {
        use std::os::unix::fs::OpenOptionsExt;
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|err| GatewayError::internal(err.to_string()))?
    };
    #[cfg(not(unix))]
    let mut handle = std::fs::File::create(&path).map_err(|err| GatewayError::internal(err.to_string()))?;

    handle.write_all(&json).map_err(|err| GatewayError::internal(err.to_string()))?;
    Ok(())
}

pub async fn list_providers(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let _guard = state.providers.0.lock().await;
    match read_file() {
        Ok(file) => Json(serde_json::json!({ "providers": file.providers })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_provider(
    State(state): State<Arc<GatewayState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let _guard = state.providers.0.lock().await;
    match read_file() {
        Ok(file) => match file.providers.get(&name) {
            Some(cred) => Json(cred.clone()).into_response(),
            None => GatewayError::not_found("no such provider").into_response(),
        },
        Err(err) => err.into_response(),
    }
}

pub async fn put_provider(
    State(state): State<Arc<GatewayState>>,
    Path(name): Path<String>,
    Json(cred): Json<ProviderCredential>,
) -> impl IntoResponse {
    let _guard = state.providers.0.lock().await;
    let mut file = match read_file() {
        Ok(file) => file,
        Err(err) => return err.into_response(),
    };
    file.providers.insert(name, cred);
    file.updated_at = now_ms();
    match write_file(&file) {
        Ok(()) => Json(serde_json::json!({ "saved": true })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn delete_provider(
    State(state): State<Arc<GatewayState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let _guard = state.providers.0.lock().await;
    let mut file = match read_file() {
        Ok(file) => file,
        Err(err) => return err.into_response(),
    };
    let existed = file.providers.remove(&name).is_some();
    if !existed {
        return GatewayError::not_found("no such provider").into_response();
    }
    file.updated_at = now_ms();
    match write_file(&file) {
        Ok(()) => Json(serde_json::json!({ "deleted": true })).into_response(),
        Err(err) => err.into_response(),
    }
}
