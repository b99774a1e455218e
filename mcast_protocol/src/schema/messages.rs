/*!
Protobuf message types for the `exercise` schema package.

Generated from `proto/status.proto` and `proto/command.proto` at build time.
The registry decides at runtime which of them the deployed schema files
actually declare.
*/

include!(concat!(env!("OUT_DIR"), "/exercise.rs"));

// The parameter-carrying verbs each pair with exactly one sub-parameter
// group of `PlatformCmd`.
impl CommandType {
    pub const ALL: [CommandType; 13] = [
        CommandType::PowerOnCmd,
        CommandType::PowerOffCmd,
        CommandType::TakeOffCmd,
        CommandType::LandCmd,
        CommandType::ReturnHomeCmd,
        CommandType::HoverCmd,
        CommandType::NavCmd,
        CommandType::SetSpeedCmd,
        CommandType::SensorCmd,
        CommandType::TargetSetCmd,
        CommandType::LockCmd,
        CommandType::FireCmd,
        CommandType::StrikeCoordinateCmd,
    ];

    /// Variant name as it appears on the wire schema and in request JSON
    pub fn name(self) -> &'static str {
        self.as_str_name()
    }

    /// Parse a variant name (exact match)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_str_name(name)
    }
}

impl PlatformCmd {
    /// Number of populated sub-parameter groups
    pub fn populated_param_groups(&self) -> usize {
        [
            self.fire_param.is_some(),
            self.sensor_param.is_some(),
            self.nav_param.is_some(),
            self.target_set_param.is_some(),
            self.lock_param.is_some(),
            self.set_speed_param.is_some(),
            self.strike_coordinate_param.is_some(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }
}
