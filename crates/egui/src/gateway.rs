//! Backend reached by running a helper executable once per command.
//!
//! Each call runs `<program> [args..] <command> [<json params>]`. On success
//! the helper prints the JSON reply on stdout; on failure it exits non-zero
//! and the trimmed stderr becomes the user-facing error message.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::process::Command;
use wayvibes_core::gateway::command;
use wayvibes_core::{AppConfig, CommandGateway, GatewayError, GatewayResult, SoundPack, WayvibesStatus};

#[derive(Debug, Clone)]
pub struct ProcessGateway {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessGateway {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a configured command line on whitespace. `None` when blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).with_args(words))
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    async fn run(
        &self,
        command: &'static str,
        params: Option<serde_json::Value>,
    ) -> GatewayResult<Vec<u8>> {
        let mut process = Command::new(&self.program);
        process
            .args(&self.args)
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(params) = &params {
            process.arg(params.to_string());
        }

        tracing::debug!(command, "dispatching backend command");
        let output = process
            .output()
            .await
            .map_err(|source| GatewayError::Unavailable { command, source })?;

        if !output.status.success() {
            let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(command, status = %output.status, "backend command failed");
            return Err(GatewayError::Command { command, message });
        }
        Ok(output.stdout)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        command: &'static str,
        params: Option<serde_json::Value>,
    ) -> GatewayResult<T> {
        let stdout = self.run(command, params).await?;
        serde_json::from_slice(&stdout).map_err(|source| GatewayError::Decode { command, source })
    }
}

#[async_trait]
impl CommandGateway for ProcessGateway {
    async fn get_wayvibes_status(&self) -> GatewayResult<WayvibesStatus> {
        self.call(command::GET_WAYVIBES_STATUS, None).await
    }

    async fn get_sound_packs(&self) -> GatewayResult<Vec<SoundPack>> {
        self.call(command::GET_SOUND_PACKS, None).await
    }

    async fn import_sound_pack(&self, path: &Path) -> GatewayResult<SoundPack> {
        let params = json!({ "path": path.to_string_lossy() });
        self.call(command::IMPORT_SOUND_PACK, Some(params)).await
    }

    async fn delete_sound_pack(&self, pack_id: &str) -> GatewayResult<()> {
        let params = json!({ "packId": pack_id });
        self.run(command::DELETE_SOUND_PACK, Some(params)).await?;
        Ok(())
    }

    async fn get_pack_path(&self, pack_id: &str) -> GatewayResult<String> {
        let params = json!({ "packId": pack_id });
        self.call(command::GET_PACK_PATH, Some(params)).await
    }

    async fn get_config(&self) -> GatewayResult<AppConfig> {
        self.call(command::GET_CONFIG, None).await
    }

    async fn set_volume(&self, volume: f32) -> GatewayResult<()> {
        let params = json!({ "volume": volume });
        self.run(command::SET_VOLUME, Some(params)).await?;
        Ok(())
    }

    async fn toggle_pause(&self) -> GatewayResult<()> {
        self.run(command::TOGGLE_PAUSE, None).await?;
        Ok(())
    }

    async fn stop_wayvibes(&self) -> GatewayResult<()> {
        self.run(command::STOP_WAYVIBES, None).await?;
        Ok(())
    }

    async fn set_active_pack(&self, pack_id: &str) -> GatewayResult<()> {
        let params = json!({ "packId": pack_id });
        self.run(command::SET_ACTIVE_PACK, Some(params)).await?;
        Ok(())
    }
}
