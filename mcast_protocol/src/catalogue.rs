/*!
Static package-type catalogue.

Maps every single-byte package-type code to a display name, its schema and
the routine that decodes its payload. The table is append-only: codes are a
wire contract with the platforms and are never reassigned.
*/

use crate::schema::{
    decode_as, DecodeFn, ExerciseEnd, FireReply, FlyControl, FlyControlReply, FlyStatus,
    Heartbeat, LockStatus, NavReply, PlatformCmd, Platforms, RouteUpload, RouteUploadReply,
    SceneInit, SceneInitReply, SchemaType, SensorReply, SensorStatus, StrikeResult, TargetReport,
    WeaponStatus,
};
use std::fmt;
use std::sync::OnceLock;

/// One catalogue entry
#[derive(Clone, Copy)]
pub struct PackageTypeDescriptor {
    pub code: u8,
    pub name: &'static str,
    pub schema: Option<SchemaType>,
    pub decode: Option<DecodeFn>,
}

impl PackageTypeDescriptor {
    const fn known(code: u8, name: &'static str, schema: SchemaType, decode: DecodeFn) -> Self {
        Self {
            code,
            name,
            schema: Some(schema),
            decode: Some(decode),
        }
    }

    /// Descriptor for a code missing from the catalogue
    pub const fn unknown(code: u8) -> Self {
        Self {
            code,
            name: "Unknown",
            schema: None,
            decode: None,
        }
    }

    /// Qualified schema name, `None` for unknown codes
    pub fn schema_name(&self) -> Option<&'static str> {
        self.schema.map(SchemaType::qualified_name)
    }

    pub fn is_known(&self) -> bool {
        self.schema.is_some()
    }

    /// Whether this code belongs to the status family (everything but commands)
    pub fn is_status(&self) -> bool {
        self.is_known() && self.schema != Some(SchemaType::PlatformCmd)
    }
}

impl fmt::Debug for PackageTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageTypeDescriptor")
            .field("code", &format_args!("0x{:02X}", self.code))
            .field("name", &self.name)
            .field("schema", &self.schema_name())
            .finish()
    }
}

/// Every known package type, in code order
pub static CATALOGUE: [PackageTypeDescriptor; 19] = [
    PackageTypeDescriptor::known(0x00, "Heartbeat", SchemaType::Heartbeat, decode_as::<Heartbeat>),
    PackageTypeDescriptor::known(0x01, "SceneInit", SchemaType::SceneInit, decode_as::<SceneInit>),
    PackageTypeDescriptor::known(0x02, "SceneInitReply", SchemaType::SceneInitReply, decode_as::<SceneInitReply>),
    PackageTypeDescriptor::known(0x03, "FlyStatus", SchemaType::FlyStatus, decode_as::<FlyStatus>),
    PackageTypeDescriptor::known(0x04, "FlyControl", SchemaType::FlyControl, decode_as::<FlyControl>),
    PackageTypeDescriptor::known(0x05, "FlyControlReply", SchemaType::FlyControlReply, decode_as::<FlyControlReply>),
    PackageTypeDescriptor::known(0x06, "RouteUpload", SchemaType::RouteUpload, decode_as::<RouteUpload>),
    PackageTypeDescriptor::known(0x07, "RouteUploadReply", SchemaType::RouteUploadReply, decode_as::<RouteUploadReply>),
    PackageTypeDescriptor::known(0x08, "NavReply", SchemaType::NavReply, decode_as::<NavReply>),
    PackageTypeDescriptor::known(0x10, "SensorStatus", SchemaType::SensorStatus, decode_as::<SensorStatus>),
    PackageTypeDescriptor::known(0x11, "SensorReply", SchemaType::SensorReply, decode_as::<SensorReply>),
    PackageTypeDescriptor::known(0x12, "WeaponStatus", SchemaType::WeaponStatus, decode_as::<WeaponStatus>),
    PackageTypeDescriptor::known(0x13, "FireReply", SchemaType::FireReply, decode_as::<FireReply>),
    PackageTypeDescriptor::known(0x20, "TargetReport", SchemaType::TargetReport, decode_as::<TargetReport>),
    PackageTypeDescriptor::known(0x21, "StrikeResult", SchemaType::StrikeResult, decode_as::<StrikeResult>),
    PackageTypeDescriptor::known(0x22, "LockStatus", SchemaType::LockStatus, decode_as::<LockStatus>),
    PackageTypeDescriptor::known(0x28, "ExerciseEnd", SchemaType::ExerciseEnd, decode_as::<ExerciseEnd>),
    PackageTypeDescriptor::known(0x29, "Platforms", SchemaType::Platforms, decode_as::<Platforms>),
    PackageTypeDescriptor::known(0x2A, "PlatformCmd", SchemaType::PlatformCmd, decode_as::<PlatformCmd>),
];

/// Code -> index into [`CATALOGUE`]
fn index() -> &'static [Option<u8>; 256] {
    static INDEX: OnceLock<[Option<u8>; 256]> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = [None; 256];
        for (position, descriptor) in CATALOGUE.iter().enumerate() {
            index[descriptor.code as usize] = Some(position as u8);
        }
        index
    })
}

/// O(1) lookup; unknown codes resolve to [`PackageTypeDescriptor::unknown`]
/// carrying the queried code
pub fn lookup_package_type(code: u8) -> PackageTypeDescriptor {
    match index()[code as usize] {
        Some(position) => CATALOGUE[position as usize],
        None => PackageTypeDescriptor::unknown(code),
    }
}

/// Display name for a code, `"Unknown"` when not catalogued
pub fn package_type_name(code: u8) -> &'static str {
    lookup_package_type(code).name
}
