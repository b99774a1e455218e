//! Build script for compiling the exercise protobuf definitions

const PROTOS: [&str; 2] = ["proto/status.proto", "proto/command.proto"];

/// Messages that operators supply in request JSON
const REQUEST_MESSAGES: [&str; 9] = [
    "Position",
    "Waypoint",
    "FireParam",
    "SensorParam",
    "NavParam",
    "TargetSetParam",
    "LockParam",
    "SetSpeedParam",
    "StrikeCoordinateParam",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Prefer a system protoc when one is configured
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let mut config = prost_build::Config::new();
    // Every CommandType variant ends in `Cmd`
    config.type_attribute(".", "#[allow(clippy::enum_variant_names)]");
    config.message_attribute(
        ".exercise",
        "#[derive(::serde::Serialize)]\n#[serde(rename_all = \"camelCase\")]",
    );
    for name in REQUEST_MESSAGES {
        config.message_attribute(
            format!(".exercise.{}", name),
            "#[derive(::serde::Deserialize)]\n#[serde(default)]",
        );
    }
    config.enum_attribute(
        ".exercise.CommandType",
        "#[derive(::serde::Serialize, ::serde::Deserialize)]",
    );

    config.compile_protos(&PROTOS, &["proto/"])?;
    for proto in PROTOS {
        println!("cargo:rerun-if-changed={}", proto);
    }
    Ok(())
}
