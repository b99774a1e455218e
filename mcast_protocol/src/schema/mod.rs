/*!
Schema types and the runtime schema registry.

Every schema the console understands is a compiled prost type, named by a
[`SchemaType`] variant. The only dynamic step is discovering which directory
holds the deployed `.proto` files and which qualified names they declare;
that is the job of [`SchemaRegistry`].
*/

pub mod messages;
mod registry;

pub use messages::*;
pub use registry::{default_search_paths, RegistryState, SchemaRegistry};

use crate::protocol::SCHEMA_PACKAGE;
use serde::Serialize;

/// Compile-time mapping of qualified schema names to prost types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Heartbeat,
    SceneInit,
    SceneInitReply,
    FlyStatus,
    FlyControl,
    FlyControlReply,
    RouteUpload,
    RouteUploadReply,
    NavReply,
    SensorStatus,
    SensorReply,
    WeaponStatus,
    FireReply,
    TargetReport,
    StrikeResult,
    LockStatus,
    ExerciseEnd,
    Platforms,
    PlatformCmd,
    FireParam,
    SensorParam,
    NavParam,
    TargetSetParam,
    LockParam,
    SetSpeedParam,
    StrikeCoordinateParam,
}

impl SchemaType {
    pub const ALL: [SchemaType; 26] = [
        SchemaType::Heartbeat,
        SchemaType::SceneInit,
        SchemaType::SceneInitReply,
        SchemaType::FlyStatus,
        SchemaType::FlyControl,
        SchemaType::FlyControlReply,
        SchemaType::RouteUpload,
        SchemaType::RouteUploadReply,
        SchemaType::NavReply,
        SchemaType::SensorStatus,
        SchemaType::SensorReply,
        SchemaType::WeaponStatus,
        SchemaType::FireReply,
        SchemaType::TargetReport,
        SchemaType::StrikeResult,
        SchemaType::LockStatus,
        SchemaType::ExerciseEnd,
        SchemaType::Platforms,
        SchemaType::PlatformCmd,
        SchemaType::FireParam,
        SchemaType::SensorParam,
        SchemaType::NavParam,
        SchemaType::TargetSetParam,
        SchemaType::LockParam,
        SchemaType::SetSpeedParam,
        SchemaType::StrikeCoordinateParam,
    ];

    /// Message name without the package prefix
    pub fn message_name(self) -> &'static str {
        match self {
            Self::Heartbeat => "Heartbeat",
            Self::SceneInit => "SceneInit",
            Self::SceneInitReply => "SceneInitReply",
            Self::FlyStatus => "FlyStatus",
            Self::FlyControl => "FlyControl",
            Self::FlyControlReply => "FlyControlReply",
            Self::RouteUpload => "RouteUpload",
            Self::RouteUploadReply => "RouteUploadReply",
            Self::NavReply => "NavReply",
            Self::SensorStatus => "SensorStatus",
            Self::SensorReply => "SensorReply",
            Self::WeaponStatus => "WeaponStatus",
            Self::FireReply => "FireReply",
            Self::TargetReport => "TargetReport",
            Self::StrikeResult => "StrikeResult",
            Self::LockStatus => "LockStatus",
            Self::ExerciseEnd => "ExerciseEnd",
            Self::Platforms => "Platforms",
            Self::PlatformCmd => "PlatformCmd",
            Self::FireParam => "FireParam",
            Self::SensorParam => "SensorParam",
            Self::NavParam => "NavParam",
            Self::TargetSetParam => "TargetSetParam",
            Self::LockParam => "LockParam",
            Self::SetSpeedParam => "SetSpeedParam",
            Self::StrikeCoordinateParam => "StrikeCoordinateParam",
        }
    }

    /// Fully qualified name, e.g. `exercise.PlatformCmd`
    pub fn qualified_name(self) -> &'static str {
        match self {
            Self::Heartbeat => "exercise.Heartbeat",
            Self::SceneInit => "exercise.SceneInit",
            Self::SceneInitReply => "exercise.SceneInitReply",
            Self::FlyStatus => "exercise.FlyStatus",
            Self::FlyControl => "exercise.FlyControl",
            Self::FlyControlReply => "exercise.FlyControlReply",
            Self::RouteUpload => "exercise.RouteUpload",
            Self::RouteUploadReply => "exercise.RouteUploadReply",
            Self::NavReply => "exercise.NavReply",
            Self::SensorStatus => "exercise.SensorStatus",
            Self::SensorReply => "exercise.SensorReply",
            Self::WeaponStatus => "exercise.WeaponStatus",
            Self::FireReply => "exercise.FireReply",
            Self::TargetReport => "exercise.TargetReport",
            Self::StrikeResult => "exercise.StrikeResult",
            Self::LockStatus => "exercise.LockStatus",
            Self::ExerciseEnd => "exercise.ExerciseEnd",
            Self::Platforms => "exercise.Platforms",
            Self::PlatformCmd => "exercise.PlatformCmd",
            Self::FireParam => "exercise.FireParam",
            Self::SensorParam => "exercise.SensorParam",
            Self::NavParam => "exercise.NavParam",
            Self::TargetSetParam => "exercise.TargetSetParam",
            Self::LockParam => "exercise.LockParam",
            Self::SetSpeedParam => "exercise.SetSpeedParam",
            Self::StrikeCoordinateParam => "exercise.StrikeCoordinateParam",
        }
    }

    /// Resolve a qualified name to a compiled type (exact, case-sensitive)
    pub fn from_qualified_name(name: &str) -> Option<Self> {
        let message = name.strip_prefix(SCHEMA_PACKAGE)?.strip_prefix('.')?;
        Self::ALL.into_iter().find(|ty| ty.message_name() == message)
    }
}

/// A prost message with a registry-checked schema identity
pub trait SchemaMessage: prost::Message + Default {
    const SCHEMA: SchemaType;

    /// First required top-level field that is absent, if any
    fn missing_required(&self) -> Option<&'static str> {
        None
    }
}

impl SchemaMessage for PlatformCmd {
    const SCHEMA: SchemaType = SchemaType::PlatformCmd;

    fn missing_required(&self) -> Option<&'static str> {
        if self.command_id.is_empty() {
            Some("command_id")
        } else if self.platform_name.is_empty() {
            Some("platform_name")
        } else if CommandType::try_from(self.command).is_err() {
            Some("command")
        } else {
            None
        }
    }
}

/// Fully decoded payload of a known package type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "schema", content = "message")]
pub enum MessageBody {
    Heartbeat(Heartbeat),
    SceneInit(SceneInit),
    SceneInitReply(SceneInitReply),
    FlyStatus(FlyStatus),
    FlyControl(FlyControl),
    FlyControlReply(FlyControlReply),
    RouteUpload(RouteUpload),
    RouteUploadReply(RouteUploadReply),
    NavReply(NavReply),
    SensorStatus(SensorStatus),
    SensorReply(SensorReply),
    WeaponStatus(WeaponStatus),
    FireReply(FireReply),
    TargetReport(TargetReport),
    StrikeResult(StrikeResult),
    LockStatus(LockStatus),
    ExerciseEnd(ExerciseEnd),
    Platforms(Platforms),
    PlatformCmd(PlatformCmd),
}

macro_rules! decodable_messages {
    ($($name:ident),+ $(,)?) => {
        $(
            impl SchemaMessage for $name {
                const SCHEMA: SchemaType = SchemaType::$name;
            }

            impl From<$name> for MessageBody {
                fn from(message: $name) -> Self {
                    MessageBody::$name(message)
                }
            }
        )+
    };
}

decodable_messages!(
    Heartbeat,
    SceneInit,
    SceneInitReply,
    FlyStatus,
    FlyControl,
    FlyControlReply,
    RouteUpload,
    RouteUploadReply,
    NavReply,
    SensorStatus,
    SensorReply,
    WeaponStatus,
    FireReply,
    TargetReport,
    StrikeResult,
    LockStatus,
    ExerciseEnd,
    Platforms,
);

impl From<PlatformCmd> for MessageBody {
    fn from(message: PlatformCmd) -> Self {
        MessageBody::PlatformCmd(message)
    }
}

macro_rules! sub_schemas {
    ($($name:ident),+ $(,)?) => {
        $(
            impl SchemaMessage for $name {
                const SCHEMA: SchemaType = SchemaType::$name;
            }
        )+
    };
}

sub_schemas!(
    FireParam,
    SensorParam,
    NavParam,
    TargetSetParam,
    LockParam,
    SetSpeedParam,
    StrikeCoordinateParam,
);

/// Decode routine stored in the package-type catalogue
pub type DecodeFn = fn(&[u8]) -> Result<MessageBody, prost::DecodeError>;

/// Decode a payload as `M` and lift it into [`MessageBody`]
pub fn decode_as<M>(payload: &[u8]) -> Result<MessageBody, prost::DecodeError>
where
    M: SchemaMessage + Into<MessageBody>,
{
    M::decode(payload).map(Into::into)
}

/// Result of running a payload through the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedBody {
    Message(MessageBody),
    /// Something arrived but could not be parsed
    #[serde(rename_all = "camelCase")]
    Unparsed { error: String, raw_hex: String },
}

impl DecodedBody {
    /// Build an unparsed body carrying the payload as lowercase hex
    pub fn unparsed(error: impl Into<String>, payload: &[u8]) -> Self {
        Self::Unparsed {
            error: error.into(),
            raw_hex: hex::encode(payload),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    pub fn message(&self) -> Option<&MessageBody> {
        match self {
            Self::Message(message) => Some(message),
            Self::Unparsed { .. } => None,
        }
    }
}
