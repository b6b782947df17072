//! Identity, settings and session capabilities

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::{Handler, HandlerError, HostContext};

const MACHINE_ID_FILES: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];
const MACHINE_ID_FALLBACK: &str = "machine-id";

/// Machine-stable identifier
///
/// Uses the OS machine id when one exists, otherwise a UUID generated once
/// and persisted under `data_dir`.
pub async fn machine_id(data_dir: &Path) -> String {
    for candidate in MACHINE_ID_FILES {
        if let Some(id) = read_id(Path::new(candidate)).await {
            return id;
        }
    }

    let persisted = data_dir.join(MACHINE_ID_FALLBACK);
    if let Some(id) = read_id(&persisted).await {
        return id;
    }

    let id = Uuid::now_v7().to_string();
    let written = async {
        fs::create_dir_all(data_dir).await?;
        fs::write(&persisted, &id).await
    };
    if let Err(e) = written.await {
        warn!(path = ?persisted, error = %e, "Failed to persist machine id");
    }
    debug!(%id, "machine_id: generated new identifier");
    id
}

async fn read_id(path: &Path) -> Option<String> {
    let id = fs::read_to_string(path).await.ok()?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

pub struct GetIdeInfoHandler;

#[async_trait]
impl Handler for GetIdeInfoHandler {
    fn kind(&self) -> &'static str {
        "getIdeInfo"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        serde_json::to_value(ctx.host().ide_info()).map_err(|e| HandlerError::Failed(e.to_string()))
    }
}

/// `{uniqueId}` form of the machine identifier
pub struct UniqueIdHandler;

#[async_trait]
impl Handler for UniqueIdHandler {
    fn kind(&self) -> &'static str {
        "uniqueId"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!({ "uniqueId": machine_id(ctx.data_dir()).await }))
    }
}

pub struct GetUniqueIdHandler;

#[async_trait]
impl Handler for GetUniqueIdHandler {
    fn kind(&self) -> &'static str {
        "getUniqueId"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(machine_id(ctx.data_dir()).await))
    }
}

pub struct PathSepHandler;

#[async_trait]
impl Handler for PathSepHandler {
    fn kind(&self) -> &'static str {
        "pathSep"
    }

    async fn handle(&self, _payload: Value, _ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(std::path::MAIN_SEPARATOR_STR))
    }
}

pub struct GetIdeSettingsHandler;

#[async_trait]
impl Handler for GetIdeSettingsHandler {
    fn kind(&self) -> &'static str {
        "getIdeSettings"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(ctx.ide_settings().to_wire())
    }
}

pub struct IsTelemetryEnabledHandler;

#[async_trait]
impl Handler for IsTelemetryEnabledHandler {
    fn kind(&self) -> &'static str {
        "isTelemetryEnabled"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(ctx.telemetry_enabled()))
    }
}

/// Control-plane session; `silent` suppresses any sign-in prompt
pub struct GetControlPlaneSessionInfoHandler;

#[async_trait]
impl Handler for GetControlPlaneSessionInfoHandler {
    fn kind(&self) -> &'static str {
        "getControlPlaneSessionInfo"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let silent = payload.get("silent").and_then(Value::as_bool).unwrap_or(true);
        debug!(silent, "GetControlPlaneSessionInfoHandler::handle: called");
        Ok(json!(ctx.host().session_info(silent).await?))
    }
}

pub struct LogoutOfControlPlaneHandler;

#[async_trait]
impl Handler for LogoutOfControlPlaneHandler {
    fn kind(&self) -> &'static str {
        "logoutOfControlPlane"
    }

    fn may_block_host_thread(&self) -> bool {
        true
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        ctx.host().sign_out().await?;
        Ok(Value::Null)
    }
}

/// Global configuration directory
pub struct GetContinueDirHandler;

#[async_trait]
impl Handler for GetContinueDirHandler {
    fn kind(&self) -> &'static str {
        "getContinueDir"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(ctx.config_dir().to_string_lossy()))
    }
}

/// Stored GitHub token, null when none is set
pub struct GetGitHubAuthTokenHandler;

#[async_trait]
impl Handler for GetGitHubAuthTokenHandler {
    fn kind(&self) -> &'static str {
        "getGitHubAuthToken"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let token = ctx.host().github_token().await?;
        if token.is_none() {
            debug!("GetGitHubAuthTokenHandler::handle: no token stored");
        }
        Ok(json!(token))
    }
}

/// Store `{token}`; a missing or null token clears it
pub struct SetGitHubAuthTokenHandler;

#[async_trait]
impl Handler for SetGitHubAuthTokenHandler {
    fn kind(&self) -> &'static str {
        "setGitHubAuthToken"
    }

    async fn handle(&self, payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        let token = payload.get("token").and_then(Value::as_str);
        ctx.host().set_github_token(token).await?;
        Ok(Value::Null)
    }
}

pub struct GetSessionIdHandler;

#[async_trait]
impl Handler for GetSessionIdHandler {
    fn kind(&self) -> &'static str {
        "getSessionId"
    }

    async fn handle(&self, _payload: Value, ctx: &HostContext) -> Result<Value, HandlerError> {
        Ok(json!(ctx.host().session_id().await?))
    }
}
