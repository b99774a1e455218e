/*!
Operator command requests.

A [`PlatformCommandRequest`] is the typed form of what an operator asks a
platform to do. Its parameters are a single [`CommandParams`] value, so at
most one sub-parameter group can ever be populated; validation additionally
checks that the group belongs to the command verb.
*/

use crate::error::DispatchError;
use chrono::Utc;
use mcast_protocol::schema::{
    CommandType, FireParam, LockParam, NavParam, PlatformCmd, SensorParam, SetSpeedParam,
    StrikeCoordinateParam, TargetSetParam,
};
use mcast_protocol::{SchemaRegistry, SchemaType};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Sub-parameter group attached to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandParams {
    FireParam(FireParam),
    SensorParam(SensorParam),
    NavParam(NavParam),
    TargetSetParam(TargetSetParam),
    LockParam(LockParam),
    SetSpeedParam(SetSpeedParam),
    StrikeCoordinateParam(StrikeCoordinateParam),
}

impl CommandParams {
    /// Field name of the group, as used in request JSON
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::FireParam(_) => "fireParam",
            Self::SensorParam(_) => "sensorParam",
            Self::NavParam(_) => "navParam",
            Self::TargetSetParam(_) => "targetSetParam",
            Self::LockParam(_) => "lockParam",
            Self::SetSpeedParam(_) => "setSpeedParam",
            Self::StrikeCoordinateParam(_) => "strikeCoordinateParam",
        }
    }

    /// The command verb this group parameterises
    pub fn command(&self) -> CommandType {
        match self {
            Self::FireParam(_) => CommandType::FireCmd,
            Self::SensorParam(_) => CommandType::SensorCmd,
            Self::NavParam(_) => CommandType::NavCmd,
            Self::TargetSetParam(_) => CommandType::TargetSetCmd,
            Self::LockParam(_) => CommandType::LockCmd,
            Self::SetSpeedParam(_) => CommandType::SetSpeedCmd,
            Self::StrikeCoordinateParam(_) => CommandType::StrikeCoordinateCmd,
        }
    }

    pub fn schema(&self) -> SchemaType {
        match self {
            Self::FireParam(_) => SchemaType::FireParam,
            Self::SensorParam(_) => SchemaType::SensorParam,
            Self::NavParam(_) => SchemaType::NavParam,
            Self::TargetSetParam(_) => SchemaType::TargetSetParam,
            Self::LockParam(_) => SchemaType::LockParam,
            Self::SetSpeedParam(_) => SchemaType::SetSpeedParam,
            Self::StrikeCoordinateParam(_) => SchemaType::StrikeCoordinateParam,
        }
    }

    fn apply_to(self, cmd: &mut PlatformCmd) {
        match self {
            Self::FireParam(p) => cmd.fire_param = Some(p),
            Self::SensorParam(p) => cmd.sensor_param = Some(p),
            Self::NavParam(p) => cmd.nav_param = Some(p),
            Self::TargetSetParam(p) => cmd.target_set_param = Some(p),
            Self::LockParam(p) => cmd.lock_param = Some(p),
            Self::SetSpeedParam(p) => cmd.set_speed_param = Some(p),
            Self::StrikeCoordinateParam(p) => cmd.strike_coordinate_param = Some(p),
        }
    }
}

/// Name of the parameter group a command verb carries, if any
pub fn param_group_for(command: CommandType) -> Option<&'static str> {
    match command {
        CommandType::NavCmd => Some("navParam"),
        CommandType::SetSpeedCmd => Some("setSpeedParam"),
        CommandType::SensorCmd => Some("sensorParam"),
        CommandType::TargetSetCmd => Some("targetSetParam"),
        CommandType::LockCmd => Some("lockParam"),
        CommandType::FireCmd => Some("fireParam"),
        CommandType::StrikeCoordinateCmd => Some("strikeCoordinateParam"),
        CommandType::PowerOnCmd
        | CommandType::PowerOffCmd
        | CommandType::TakeOffCmd
        | CommandType::LandCmd
        | CommandType::ReturnHomeCmd
        | CommandType::HoverCmd => None,
    }
}

/// Unique-per-process command id, e.g. `cmd-1718000000000-3`
pub fn generate_command_id() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(1);
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("cmd-{}-{}", Utc::now().timestamp_millis(), sequence)
}

/// A command addressed to one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCommandRequest {
    pub command_id: String,
    pub platform_name: String,
    pub command: CommandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<CommandParams>,
}

impl PlatformCommandRequest {
    /// Create a parameterless request with a generated command id
    pub fn new(platform_name: impl Into<String>, command: CommandType) -> Self {
        Self {
            command_id: generate_command_id(),
            platform_name: platform_name.into(),
            command,
            params: None,
        }
    }

    pub fn with_params(mut self, params: CommandParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_command_id(mut self, command_id: impl Into<String>) -> Self {
        self.command_id = command_id.into();
        self
    }

    /// Check identifiers and that any parameter group matches the verb
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.command_id.trim().is_empty() {
            return Err(DispatchError::invalid_request("commandId is empty"));
        }
        if self.platform_name.trim().is_empty() {
            return Err(DispatchError::invalid_request("platformName is empty"));
        }

        match (&self.params, param_group_for(self.command)) {
            (Some(params), _) if params.command() != self.command => {
                Err(DispatchError::invalid_request(format!(
                    "{} does not belong to {}",
                    params.group_name(),
                    self.command.name()
                )))
            }
            (None, Some(expected)) => {
                warn!(
                    command_id = %self.command_id,
                    "{} sent without {}, platform defaults apply",
                    self.command.name(),
                    expected
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Build the wire message. A parameter group whose schema the registry
    /// does not declare is left out with a warning.
    pub fn build_platform_cmd(&self, registry: &SchemaRegistry) -> PlatformCmd {
        let mut cmd = PlatformCmd {
            command_id: self.command_id.clone(),
            platform_name: self.platform_name.clone(),
            command: self.command as i32,
            issued_at_ms: Utc::now().timestamp_millis().max(0) as u64,
            ..Default::default()
        };

        if let Some(params) = &self.params {
            if registry.contains(params.schema()) {
                params.clone().apply_to(&mut cmd);
            } else {
                warn!(
                    command_id = %self.command_id,
                    "Schema {} not loaded, dropping {}",
                    params.schema().qualified_name(),
                    params.group_name()
                );
            }
        }

        cmd
    }
}
