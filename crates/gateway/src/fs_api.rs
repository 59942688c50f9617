//! `/api/fs/*` (§6): a filesystem browser scoped to the configured `fsRoots`.
//! Every path is canonicalized and checked to lie within one of the
//! configured roots before touching disk; folder names are validated against
//! the same rules the original agent-workspace tooling uses for path
//! components (no separators, no `.`/`..`, non-empty).

use std::{path::{Path as StdPath, PathBuf}, sync::Arc};

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::fs;

use crate::{error::GatewayError, state::GatewayState};

fn is_valid_folder_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

/// Resolve `requested` against the configured `fsRoots`, requiring the
/// canonicalized result to lie within one of them. `requested` may be
/// absolute or relative; relative paths are resolved against each root in
/// turn until one exists.
async fn resolve_within_roots(state: &GatewayState, requested: &str) -> Result<PathBuf, GatewayError> {
    let roots = &state.config.gateway.fs_roots;
    if roots.is_empty() {
        return Err(GatewayError::invalid("no fsRoots configured"));
    }

    let candidate = StdPath::new(requested);
    let candidates: Vec<PathBuf> = if candidate.is_absolute() {
        vec![candidate.to_path_buf()]
    } else {
        roots.iter().map(|root| StdPath::new(root).join(candidate)).collect()
    };

    for path in candidates {
        let Ok(canonical) = fs::canonicalize(&path).await else {
            continue;
        };
        for root in roots {
            let Ok(root_canonical) = fs::canonicalize(root).await else {
                continue;
            };
            if canonical.starts_with(&root_canonical) {
                return Ok(canonical);
            }
        }
    }

    Err(GatewayError::forbidden("path escapes configured fsRoots"))
}

pub async fn list_roots(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "roots": state.config.gateway.fs_roots }))
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    path: String,
}

pub async fn list_dir(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    let dir = match resolve_within_roots(&state, &query.path).await {
        Ok(dir) => dir,
        Err(err) => return err.into_response(),
    };

    let mut reader = match fs::read_dir(&dir).await {
        Ok(reader) => reader,
        Err(err) => return GatewayError::not_found(err.to_string()).into_response(),
    };

    let mut entries = Vec::new();
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                entries.push(serde_json::json!({
                    "name": entry.file_name().to_string_lossy(),
                    "isDir": is_dir,
                }));
            },
            Ok(None) => break,
            Err(err) => return GatewayError::internal(err.to_string()).into_response(),
        }
    }

    Json(serde_json::json!({ "entries": entries })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct MkdirBody {
    path: String,
    name: String,
}

pub async fn mkdir(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<MkdirBody>,
) -> impl IntoResponse {
    if !is_valid_folder_name(&body.name) {
        return GatewayError::invalid("invalid folder name").into_response();
    }
    let parent = match resolve_within_roots(&state, &body.path).await {
        Ok(parent) => parent,
        Err(err) => return err.into_response(),
    };
    match fs::create_dir(parent.join(&body.name)).await {
        Ok(()) => Json(serde_json::json!({ "created": true })).into_response(),
        Err(err) => GatewayError::internal(err.to_string()).into_response(),
    }
}

pub async fn read_file(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    let path = match resolve_within_roots(&state, &query.path).await {
        Ok(path) => path,
        Err(err) => return err.into_response(),
    };
    match fs::read(&path).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Json(serde_json::json!({ "content": text })).into_response(),
            Err(_) => GatewayError::invalid("file is not valid UTF-8").into_response(),
        },
        Err(err) => GatewayError::not_found(err.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_validation() {
        assert!(is_valid_folder_name("notes"));
        assert!(!is_valid_folder_name(""));
        assert!(!is_valid_folder_name("."));
        assert!(!is_valid_folder_name(".."));
        assert!(!is_valid_folder_name("a/b"));
        assert!(!is_valid_folder_name("a\\b"));
    }
}
