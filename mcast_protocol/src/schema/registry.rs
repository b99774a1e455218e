/*!
Runtime schema registry.

The registry searches an ordered list of candidate directories for the
deployed schema files, reads the message names they declare and maps each
one onto a compiled [`SchemaType`]. The first directory holding every
required file wins; when none does, initialization fails with the full list
of tried paths.

State machine: `Uninitialized -> Loading -> {Ready | Failed}`. `Failed` is
terminal for an instance; construct a new registry to retry.
*/

use super::{DecodedBody, SchemaMessage, SchemaType};
use crate::catalogue::{lookup_package_type, CATALOGUE};
use crate::error::SchemaError;
use crate::protocol::REQUIRED_SCHEMA_FILES;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info};

/// Lifecycle of a [`SchemaRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Schema registry shared read-only between ingestion and dispatch
#[derive(Debug)]
pub struct SchemaRegistry {
    state: RegistryState,
    base_path: Option<PathBuf>,
    types_by_qualified_name: HashMap<String, SchemaType>,
}

impl SchemaRegistry {
    /// Create a new uninitialized registry
    pub fn new() -> Self {
        Self {
            state: RegistryState::Uninitialized,
            base_path: None,
            types_by_qualified_name: HashMap::new(),
        }
    }

    /// Create and initialize a registry in one step
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        registry.initialize(candidates)?;
        Ok(registry)
    }

    /// Search `candidates` in order and load the first complete schema directory
    pub fn initialize<P: AsRef<Path>>(&mut self, candidates: &[P]) -> Result<(), SchemaError> {
        match self.state {
            RegistryState::Ready => return Ok(()),
            RegistryState::Failed => {
                return Err(SchemaError::unavailable("previous initialization failed"))
            }
            RegistryState::Uninitialized | RegistryState::Loading => {}
        }

        self.state = RegistryState::Loading;
        let mut tried = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let dir = candidate.as_ref();
            tried.push(dir.to_path_buf());

            match load_schema_dir(dir) {
                Ok(types) => {
                    info!(
                        "📚 Schema registry loaded {} types from {}",
                        types.len(),
                        dir.display()
                    );
                    self.types_by_qualified_name = types;
                    self.base_path = Some(dir.to_path_buf());
                    self.state = RegistryState::Ready;
                    return Ok(());
                }
                Err(reason) => {
                    debug!("Schema candidate {} rejected: {}", dir.display(), reason);
                }
            }
        }

        self.state = RegistryState::Failed;
        let err = SchemaError::NotFound { tried };
        error!("❌ {}", err);
        Err(err)
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == RegistryState::Ready
    }

    /// Directory the schemas were loaded from
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Number of compiled types the loaded schema files declare
    pub fn type_count(&self) -> usize {
        self.types_by_qualified_name.len()
    }

    /// Exact, case-sensitive lookup of a qualified schema name
    pub fn lookup(&self, qualified_name: &str) -> Result<SchemaType, SchemaError> {
        self.types_by_qualified_name
            .get(qualified_name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownType(qualified_name.to_string()))
    }

    /// Whether the loaded schema files declare `ty`
    pub fn contains(&self, ty: SchemaType) -> bool {
        self.types_by_qualified_name.contains_key(ty.qualified_name())
    }

    /// Decode a payload by package type. Never fails: problems become an
    /// unparsed body carrying the raw payload.
    pub fn decode(&self, package_type: u8, payload: &[u8]) -> DecodedBody {
        let descriptor = lookup_package_type(package_type);
        let (Some(schema), Some(decode)) = (descriptor.schema, descriptor.decode) else {
            return DecodedBody::unparsed("unknown package type", payload);
        };

        if !self.is_ready() {
            return DecodedBody::unparsed("schema registry unavailable", payload);
        }

        if let Err(err) = self.lookup(schema.qualified_name()) {
            return DecodedBody::unparsed(err.to_string(), payload);
        }

        match decode(payload) {
            Ok(message) => DecodedBody::Message(message),
            Err(err) => DecodedBody::unparsed(
                format!("{} decode failed: {}", schema.qualified_name(), err),
                payload,
            ),
        }
    }

    /// Encode a message after checking its schema is loaded and its required
    /// top-level fields are present
    pub fn encode<M: SchemaMessage>(&self, message: &M) -> Result<Vec<u8>, SchemaError> {
        if !self.is_ready() {
            return Err(SchemaError::unavailable(format!("registry is {:?}", self.state)));
        }

        self.lookup(M::SCHEMA.qualified_name())?;

        if let Some(field) = message.missing_required() {
            return Err(SchemaError::MissingField {
                type_name: M::SCHEMA.qualified_name(),
                field,
            });
        }

        Ok(message.encode_to_vec())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Candidate schema directories relative to the executable and the working
/// directory, in search order
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(exe_dir.join("proto"));
        paths.push(exe_dir.join("..").join("proto"));
        paths.push(exe_dir.join("resources").join("proto"));
        paths.push(exe_dir.join("..").join("share").join("console-link").join("proto"));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("proto"));
        paths.push(cwd.join("mcast_protocol").join("proto"));
        paths.push(cwd.join("resources").join("proto"));
    }

    paths
}

/// Load every required file of one candidate directory, or nothing
fn load_schema_dir(dir: &Path) -> Result<HashMap<String, SchemaType>, SchemaError> {
    if !dir.is_dir() {
        return Err(SchemaError::unavailable(format!("{} is not a directory", dir.display())));
    }

    let mut types = HashMap::new();
    for file_name in REQUIRED_SCHEMA_FILES {
        let path = dir.join(file_name);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SchemaError::parse(&path, e.to_string()))?;

        for qualified_name in declared_messages(&path, &content)? {
            match SchemaType::from_qualified_name(&qualified_name) {
                Some(ty) => {
                    types.insert(qualified_name, ty);
                }
                None => debug!("No compiled type for {}, skipping", qualified_name),
            }
        }
    }

    if !types.contains_key(SchemaType::PlatformCmd.qualified_name()) {
        return Err(SchemaError::parse(
            dir,
            format!("no {} declaration", SchemaType::PlatformCmd.qualified_name()),
        ));
    }

    let status_types = CATALOGUE
        .iter()
        .filter(|descriptor| descriptor.is_status())
        .filter_map(|descriptor| descriptor.schema)
        .filter(|schema| types.contains_key(schema.qualified_name()))
        .count();
    if status_types == 0 {
        return Err(SchemaError::parse(dir, "no catalogued status message declared"));
    }

    Ok(types)
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("valid comment regex"))
}

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bpackage\s+([A-Za-z_][\w.]*)\s*;").expect("valid package regex")
    })
}

fn scope_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(message|enum)\s+([A-Za-z_]\w*)\s*\{|\{|\}").expect("valid scope regex")
    })
}

/// Qualified names of every message declared in a `.proto` source, nested
/// messages included (`pkg.Outer.Inner`)
fn declared_messages(path: &Path, source: &str) -> Result<Vec<String>, SchemaError> {
    let source = comment_regex().replace_all(source, "");

    let package = package_regex()
        .captures(&source)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| SchemaError::parse(path, "missing package declaration"))?;

    // Each open scope: Some(name) for a message, None for anything else
    let mut scopes: Vec<Option<String>> = Vec::new();
    let mut messages = Vec::new();

    for caps in scope_regex().captures_iter(&source) {
        match (caps.get(1).map(|m| m.as_str()), caps.get(2)) {
            (Some(kind), Some(name)) => {
                if kind == "message" {
                    let mut qualified = package.clone();
                    for outer in scopes.iter().flatten() {
                        qualified.push('.');
                        qualified.push_str(outer);
                    }
                    qualified.push('.');
                    qualified.push_str(name.as_str());
                    messages.push(qualified);
                    scopes.push(Some(name.as_str().to_string()));
                } else {
                    scopes.push(None);
                }
            }
            _ if &caps[0] == "{" => scopes.push(None),
            _ => {
                if scopes.pop().is_none() {
                    return Err(SchemaError::parse(path, "unbalanced closing brace"));
                }
            }
        }
    }

    if !scopes.is_empty() {
        return Err(SchemaError::parse(path, "unterminated scope"));
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CommandType, FireParam, Heartbeat, MessageBody, PlatformCmd};
    use prost::Message;
    use tempfile::TempDir;

    const STATUS_PROTO: &str = include_str!("../../proto/status.proto");
    const COMMAND_PROTO: &str = include_str!("../../proto/command.proto");

    fn schema_dir(status: &str, command: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.proto"), status).unwrap();
        std::fs::write(dir.path().join("command.proto"), command).unwrap();
        dir
    }

    fn ready_registry() -> (TempDir, SchemaRegistry) {
        let dir = schema_dir(STATUS_PROTO, COMMAND_PROTO);
        let registry = SchemaRegistry::load(&[dir.path()]).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_fallback_to_later_candidate() {
        let missing = tempfile::tempdir().unwrap();
        let valid = schema_dir(STATUS_PROTO, COMMAND_PROTO);
        let candidates = vec![
            missing.path().join("nope"),
            missing.path().to_path_buf(),
            valid.path().to_path_buf(),
        ];

        let mut registry = SchemaRegistry::new();
        assert_eq!(registry.state(), RegistryState::Uninitialized);
        registry.initialize(candidates.as_slice()).unwrap();

        assert_eq!(registry.state(), RegistryState::Ready);
        assert_eq!(registry.base_path(), Some(valid.path()));
        assert_eq!(registry.type_count(), SchemaType::ALL.len());
    }

    #[test]
    fn test_not_found_lists_tried_paths() {
        let root = tempfile::tempdir().unwrap();
        let candidates = vec![root.path().join("a"), root.path().join("b")];

        let mut registry = SchemaRegistry::new();
        let err = registry.initialize(candidates.as_slice()).unwrap_err();
        assert_eq!(err, SchemaError::NotFound { tried: candidates.clone() });
        assert_eq!(registry.state(), RegistryState::Failed);

        // Failed is terminal, even once the files appear
        let valid = schema_dir(STATUS_PROTO, COMMAND_PROTO);
        assert!(matches!(
            registry.initialize(&[valid.path()]),
            Err(SchemaError::Unavailable(_))
        ));
    }

    #[test]
    fn test_partial_directory_is_skipped() {
        let partial = tempfile::tempdir().unwrap();
        std::fs::write(partial.path().join("status.proto"), STATUS_PROTO).unwrap();
        let valid = schema_dir(STATUS_PROTO, COMMAND_PROTO);

        let registry = SchemaRegistry::load(&[partial.path(), valid.path()]).unwrap();
        assert_eq!(registry.base_path(), Some(valid.path()));
    }

    #[test]
    fn test_foreign_package_directory_is_skipped() {
        let foreign = schema_dir(
            "syntax = \"proto3\";\npackage other;\nmessage A {}\n",
            "syntax = \"proto3\";\npackage other;\nmessage B {}\n",
        );
        let valid = schema_dir(STATUS_PROTO, COMMAND_PROTO);

        let registry = SchemaRegistry::load(&[foreign.path(), valid.path()]).unwrap();
        assert_eq!(registry.base_path(), Some(valid.path()));
        assert_eq!(registry.type_count(), SchemaType::ALL.len());

        let err = SchemaRegistry::load(&[foreign.path()]).unwrap_err();
        assert_eq!(err, SchemaError::NotFound { tried: vec![foreign.path().to_path_buf()] });
    }

    #[test]
    fn test_directory_without_command_schema_is_skipped() {
        let renamed = COMMAND_PROTO.replace("message PlatformCmd {", "message OtherCmd {");
        let incomplete = schema_dir(STATUS_PROTO, &renamed);
        assert!(load_schema_dir(incomplete.path()).is_err());

        let valid = schema_dir(STATUS_PROTO, COMMAND_PROTO);
        let registry = SchemaRegistry::load(&[incomplete.path(), valid.path()]).unwrap();
        assert_eq!(registry.base_path(), Some(valid.path()));
        assert!(registry.contains(SchemaType::PlatformCmd));
    }

    #[test]
    fn test_shipped_schemas_declare_every_compiled_type() {
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("proto");
        let registry = SchemaRegistry::load(&[shipped]).unwrap();

        for ty in SchemaType::ALL {
            assert!(registry.contains(ty), "{} not declared", ty.qualified_name());
        }
        assert_eq!(registry.type_count(), SchemaType::ALL.len());
    }

    #[test]
    fn test_lookup_is_exact() {
        let (_dir, registry) = ready_registry();
        assert_eq!(registry.lookup("exercise.PlatformCmd"), Ok(SchemaType::PlatformCmd));
        assert_eq!(
            registry.lookup("exercise.platformcmd"),
            Err(SchemaError::UnknownType("exercise.platformcmd".to_string()))
        );
        assert!(registry.lookup("PlatformCmd").is_err());
    }

    #[test]
    fn test_declared_messages_handles_nesting_and_comments() {
        let source = r#"
            syntax = "proto3";
            package exercise;
            // message Ghost { }
            /* message AlsoGhost { } */
            enum Mode { A = 0; }
            message Outer {
                message Inner { uint32 x = 1; }
                oneof choice { Inner inner = 1; }
            }
        "#;
        let names = declared_messages(Path::new("t.proto"), source).unwrap();
        assert_eq!(names, vec!["exercise.Outer", "exercise.Outer.Inner"]);

        let unbalanced = "package exercise; message A { ";
        assert!(declared_messages(Path::new("t.proto"), unbalanced).is_err());
        assert!(declared_messages(Path::new("t.proto"), "message A {}").is_err());
    }

    #[test]
    fn test_decode_known_and_malformed_payloads() {
        let (_dir, registry) = ready_registry();

        let heartbeat = Heartbeat {
            platform_name: "uav-1".into(),
            timestamp_ms: 42,
            sequence: 3,
        };
        let body = registry.decode(0x00, &heartbeat.encode_to_vec());
        assert_eq!(body, DecodedBody::Message(MessageBody::Heartbeat(heartbeat)));

        let body = registry.decode(0x00, &[0xFF, 0xFF, 0xFF]);
        match body {
            DecodedBody::Unparsed { error, raw_hex } => {
                assert!(error.contains("exercise.Heartbeat"));
                assert_eq!(raw_hex, "ffffff");
            }
            other => panic!("expected unparsed body, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_package_type() {
        let (_dir, registry) = ready_registry();
        assert_eq!(
            registry.decode(0x7F, &[0x01, 0x02]),
            DecodedBody::Unparsed {
                error: "unknown package type".to_string(),
                raw_hex: "0102".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_without_loaded_schema() {
        let registry = SchemaRegistry::new();
        assert!(!registry.decode(0x00, &[]).is_parsed());

        let trimmed_status = STATUS_PROTO.replace("message Heartbeat {", "message Pulse {");
        let dir = schema_dir(&trimmed_status, COMMAND_PROTO);
        let registry = SchemaRegistry::load(&[dir.path()]).unwrap();
        match registry.decode(0x00, &[]) {
            DecodedBody::Unparsed { error, .. } => assert!(error.contains("exercise.Heartbeat")),
            other => panic!("expected unparsed body, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_validates_required_fields() {
        let (_dir, registry) = ready_registry();

        let cmd = PlatformCmd {
            command_id: "c-9".into(),
            platform_name: "art-1".into(),
            command: CommandType::FireCmd as i32,
            fire_param: Some(FireParam {
                target_id: "t-1".into(),
                rounds: 2,
                ..Default::default()
            }),
            ..Default::default()
        };
        let bytes = registry.encode(&cmd).unwrap();
        assert_eq!(PlatformCmd::decode(bytes.as_slice()).unwrap(), cmd);

        let anonymous = PlatformCmd {
            command_id: String::new(),
            ..cmd
        };
        assert_eq!(
            registry.encode(&anonymous),
            Err(SchemaError::MissingField {
                type_name: "exercise.PlatformCmd",
                field: "command_id",
            })
        );

        assert!(matches!(
            SchemaRegistry::new().encode(&anonymous),
            Err(SchemaError::Unavailable(_))
        ));
    }
}
