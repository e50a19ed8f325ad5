//! Configuration model and helpers used by DiagLock services.

use crate::error::{DiagLockError, DiagLockResult};
use crate::policy::BuildProfile;
use diaglock_provider::{Operator, SmemId, SMEM_ID_VENDOR0};
use directories_next::ProjectDirs;
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/diaglock.toml";
/// Environment variable binaries consult for an alternate config path.
pub const CONFIG_PATH_ENV: &str = "DIAGLOCK_CONFIG";
const BOOTSTRAP_FILE_NAME: &str = "diaglock.toml";
const APP_QUALIFIER: &str = "io";
const APP_ORGANIZATION: &str = "DiagLock";
const APP_NAME: &str = "diaglock";

fn render_bootstrap_template(profile: BuildProfile) -> String {
    format!(
        "# Auto-generated DiagLock configuration bootstrap.\n\
         # Pick the profile matching the carrier this image ships for.\n\n\
         [policy]\n\
         # generic | verizon | sprint | unified\n\
         profile = \"{profile}\"\n\
         # Open the interface during factory boots (never applies to Sprint).\n\
         factory_exemption = {factory_exemption}\n\
         # Hand a lock-state mutator to in-process callers on every profile.\n\
         export_mutator = false\n\n\
         [identity]\n\
         # Directory holding one file per shared-memory entry, named by id.\n\
         region_dir = \"{region_dir}\"\n\
         entry_id = {entry_id}\n\n\
         [board]\n\
         cmdline_path = \"{cmdline}\"\n\
         factory_key = \"{factory_key}\"\n\
         operator_key = \"{operator_key}\"\n\
         # operator = \"SPR\"\n\
         # factory_boot = false\n",
        factory_exemption = profile.allows_factory_exemption(),
        region_dir = default_region_dir(),
        entry_id = SMEM_ID_VENDOR0.0,
        cmdline = default_cmdline_path(),
        factory_key = default_factory_key(),
        operator_key = default_operator_key(),
    )
}

pub fn bootstrap_template() -> String {
    render_bootstrap_template(BuildProfile::default())
}

pub fn bootstrap_template_for(profile: BuildProfile) -> String {
    render_bootstrap_template(profile)
}

pub fn default_config_path() -> &'static str {
    DEFAULT_CONFIG_PATH
}

/// Which allow-list policy applies and how the lock may change.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyCfg {
    #[serde(default)]
    pub profile: BuildProfile,

    /// Unset means "whatever the profile supports".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_exemption: Option<bool>,

    #[serde(default)]
    pub export_mutator: bool,
}

impl Default for PolicyCfg {
    fn default() -> Self {
        Self {
            profile: BuildProfile::default(),
            factory_exemption: None,
            export_mutator: false,
        }
    }
}

impl PolicyCfg {
    /// Effective factory exemption after applying the profile default.
    pub fn factory_exemption(&self) -> bool {
        self.factory_exemption
            .unwrap_or_else(|| self.profile.allows_factory_exemption())
    }
}

/// Where the shared-memory identity record is published.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdentityCfg {
    #[serde(default = "default_region_dir")]
    pub region_dir: String,

    #[serde(default = "default_entry_id")]
    pub entry_id: u32,
}

fn default_region_dir() -> String {
    "/run/diaglock/smem".to_string()
}

fn default_entry_id() -> u32 {
    SMEM_ID_VENDOR0.0
}

impl Default for IdentityCfg {
    fn default() -> Self {
        Self {
            region_dir: default_region_dir(),
            entry_id: default_entry_id(),
        }
    }
}

/// How board identity (factory boot, operator) is discovered.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BoardCfg {
    #[serde(default = "default_cmdline_path")]
    pub cmdline_path: String,

    #[serde(default = "default_factory_key")]
    pub factory_key: String,

    #[serde(default = "default_operator_key")]
    pub operator_key: String,

    /// Pin the operator instead of reading the command line.
    #[serde(default)]
    pub operator: Option<String>,

    /// Pin the factory-boot flag instead of reading the command line.
    #[serde(default)]
    pub factory_boot: Option<bool>,
}

fn default_cmdline_path() -> String {
    "/proc/cmdline".to_string()
}

fn default_factory_key() -> String {
    "androidboot.lge.factory".to_string()
}

fn default_operator_key() -> String {
    "androidboot.vendor.lge.operator".to_string()
}

impl Default for BoardCfg {
    fn default() -> Self {
        Self {
            cmdline_path: default_cmdline_path(),
            factory_key: default_factory_key(),
            operator_key: default_operator_key(),
            operator: None,
            factory_boot: None,
        }
    }
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DiagLockConfig {
    #[serde(default)]
    pub policy: PolicyCfg,

    #[serde(default)]
    pub identity: IdentityCfg,

    #[serde(default)]
    pub board: BoardCfg,

    #[serde(skip)]
    pub path: PathBuf,

    #[serde(skip)]
    pub format: ConfigFormat,
}

/// A finding from [`DiagLockConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// The component cannot be registered with this configuration.
    Fatal(String),
    /// Legal but probably not what the author meant.
    Advisory(String),
}

impl ConfigIssue {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigIssue::Fatal(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ConfigIssue::Fatal(message) | ConfigIssue::Advisory(message) => message,
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::Fatal(message) => f.write_str(message),
            ConfigIssue::Advisory(message) => write!(f, "{message} (advisory)"),
        }
    }
}

/// Tracks whether we parsed TOML or YAML so writes preserve format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
}

impl DiagLockConfig {
    /// Return the canonical system-wide configuration path.
    pub fn default_path() -> &'static Path {
        Path::new(DEFAULT_CONFIG_PATH)
    }

    /// Resolve the per-user configuration path used for bootstrapping.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(BOOTSTRAP_FILE_NAME))
    }

    /// Load configuration from disk, creating a generic bootstrap copy when missing.
    pub fn load_or_bootstrap<P: AsRef<Path>>(path: P) -> DiagLockResult<Self> {
        Self::load_or_bootstrap_as(path, BuildProfile::default())
    }

    /// Like [`load_or_bootstrap`](Self::load_or_bootstrap), but a freshly
    /// written file is rendered for `profile`.
    ///
    /// Only the system-wide default path falls back to a per-user copy when it
    /// cannot be created; any other path reports the failure.
    pub fn load_or_bootstrap_as<P: AsRef<Path>>(
        path: P,
        profile: BuildProfile,
    ) -> DiagLockResult<Self> {
        let target = path.as_ref();
        if target.exists() {
            return Self::load(target);
        }

        let template = bootstrap_template_for(profile);
        match write_bootstrap(target, &template) {
            Ok(()) => Self::load(target),
            Err(err) if target == Self::default_path() => {
                let user_path = Self::user_config_path().ok_or_else(|| {
                    DiagLockError::InvalidConfig(format!(
                        "cannot create {} ({err}) and no user configuration directory exists",
                        target.display()
                    ))
                })?;
                warn!(
                    "cannot create {} ({err}); falling back to {}",
                    target.display(),
                    user_path.display()
                );
                if !user_path.exists() {
                    write_bootstrap(&user_path, &template).map_err(|io_err| {
                        DiagLockError::InvalidConfig(format!(
                            "failed to write bootstrap configuration at {}: {io_err}",
                            user_path.display()
                        ))
                    })?;
                }
                Self::load(&user_path)
            }
            Err(err) => Err(DiagLockError::InvalidConfig(format!(
                "failed to write bootstrap configuration at {}: {err}",
                target.display()
            ))),
        }
    }

    /// Read a config file from disk and detect its format by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> DiagLockResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let format = detect_format(path);
        let mut cfg = Self::from_str_as(&contents, format)?;
        cfg.path = path.to_path_buf();
        Ok(cfg)
    }

    /// Parse an in-memory document.
    pub fn from_str_as(contents: &str, format: ConfigFormat) -> DiagLockResult<Self> {
        let mut cfg = match format {
            ConfigFormat::Toml => toml::from_str::<Self>(contents)?,
            ConfigFormat::Yaml => serde_yaml::from_str::<Self>(contents)?,
        };
        cfg.format = format;
        Ok(cfg)
    }

    /// Check the configuration for settings that cannot work or are ignored.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.identity.region_dir.trim().is_empty() {
            issues.push(ConfigIssue::Fatal(
                "identity.region_dir must not be empty".to_string(),
            ));
        }

        if self.board.cmdline_path.trim().is_empty()
            && (self.board.operator.is_none() || self.board.factory_boot.is_none())
        {
            issues.push(ConfigIssue::Fatal(
                "board.cmdline_path is empty; pin board.operator and board.factory_boot instead"
                    .to_string(),
            ));
        }
        for (key, value) in [
            ("board.factory_key", &self.board.factory_key),
            ("board.operator_key", &self.board.operator_key),
        ] {
            if value.trim().is_empty() || value.contains(char::is_whitespace) {
                issues.push(ConfigIssue::Fatal(format!(
                    "{key} must be a single command-line token"
                )));
            }
        }
        if let Some(operator) = &self.board.operator {
            if operator.trim().is_empty() {
                issues.push(ConfigIssue::Fatal("board.operator is set but empty".to_string()));
            }
        }

        if self.policy.factory_exemption == Some(true)
            && !self.policy.profile.allows_factory_exemption()
        {
            issues.push(ConfigIssue::Advisory(format!(
                "policy.factory_exemption is ignored with profile = \"{}\"",
                self.policy.profile
            )));
        }
        if self.identity.entry_id != SMEM_ID_VENDOR0.0 {
            issues.push(ConfigIssue::Advisory(format!(
                "identity.entry_id {} differs from the vendor record id {}",
                self.identity.entry_id, SMEM_ID_VENDOR0
            )));
        }

        issues
    }

    /// Messages of the [`ConfigIssue::Fatal`] findings.
    pub fn fatal_issues(&self) -> Vec<String> {
        self.validate()
            .into_iter()
            .filter_map(|issue| match issue {
                ConfigIssue::Fatal(message) => Some(message),
                ConfigIssue::Advisory(_) => None,
            })
            .collect()
    }

    pub fn profile(&self) -> BuildProfile {
        self.policy.profile
    }

    /// Whether trusted callers get a mutator on this configuration.
    pub fn exports_mutator(&self) -> bool {
        self.policy.export_mutator || self.policy.profile.exports_mutator()
    }

    /// Shared-memory entry holding the vendor identity record.
    pub fn identity_entry(&self) -> SmemId {
        SmemId(self.identity.entry_id)
    }

    pub fn region_dir(&self) -> PathBuf {
        PathBuf::from(&self.identity.region_dir)
    }

    pub fn cmdline_path(&self) -> Option<PathBuf> {
        let trimmed = self.board.cmdline_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Operator pinned in configuration, if any.
    pub fn pinned_operator(&self) -> Option<Operator> {
        self.board
            .operator
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(Operator::from_code)
    }

    /// Persist the configuration back to its original on-disk format.
    pub fn save(&self) -> DiagLockResult<()> {
        let payload = match self.format {
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
        };
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

fn detect_format(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            ConfigFormat::Yaml
        }
        _ => ConfigFormat::Toml,
    }
}

/// Create `path` holding `template`. An existing file is left untouched.
fn write_bootstrap(path: &Path, template: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.create_new(true).write(true);
    #[cfg(unix)]
    options.mode(if path.starts_with("/etc/") { 0o640 } else { 0o600 });

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
        Err(err) => return Err(err),
    };
    file.write_all(template.as_bytes())?;
    file.flush()?;
    info!("diaglock config bootstrap created at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn bootstrap_template_parses_to_defaults() {
        let cfg = DiagLockConfig::from_str_as(&bootstrap_template(), ConfigFormat::Toml)
            .expect("template parses");
        assert_eq!(cfg.profile(), BuildProfile::Generic);
        assert_eq!(cfg.policy.factory_exemption, Some(true));
        assert_eq!(cfg.identity_entry(), SMEM_ID_VENDOR0);
        assert_eq!(cfg.cmdline_path(), Some(PathBuf::from("/proc/cmdline")));
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn template_for_profile_selects_profile() {
        for profile in BuildProfile::ALL {
            let cfg =
                DiagLockConfig::from_str_as(&bootstrap_template_for(profile), ConfigFormat::Toml)
                    .unwrap();
            assert_eq!(cfg.profile(), profile);
            assert_eq!(
                cfg.policy.factory_exemption(),
                profile.allows_factory_exemption()
            );
            assert!(cfg.validate().is_empty(), "{profile}: {:?}", cfg.validate());
        }
    }

    #[test]
    fn minimal_documents_validate_for_every_profile() {
        for profile in BuildProfile::ALL {
            let doc = format!("[policy]\nprofile = \"{profile}\"\n");
            let cfg = DiagLockConfig::from_str_as(&doc, ConfigFormat::Toml).unwrap();
            assert_eq!(cfg.policy.factory_exemption, None);
            assert_eq!(
                cfg.policy.factory_exemption(),
                profile.allows_factory_exemption()
            );
            assert!(cfg.validate().is_empty(), "{profile}: {:?}", cfg.validate());
        }
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = DiagLockConfig::from_str_as("", ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.profile(), BuildProfile::Generic);
        assert!(!cfg.exports_mutator());
        assert_eq!(cfg.identity.region_dir, "/run/diaglock/smem");
    }

    #[test]
    fn yaml_documents_are_supported() {
        let yaml = "policy:\n  profile: unified\nboard:\n  operator: VZW_PREPAID\n";
        let cfg = DiagLockConfig::from_str_as(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.profile(), BuildProfile::Unified);
        assert_eq!(cfg.pinned_operator(), Some(Operator::VzwPrepaid));
        assert!(cfg.exports_mutator());
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let err = DiagLockConfig::from_str_as("[policy]\nprofile = \"tmo\"\n", ConfigFormat::Toml)
            .expect_err("unknown profile");
        assert!(matches!(err, DiagLockError::TomlDe(_)));
    }

    #[test]
    fn validate_separates_fatal_and_advisory_issues() {
        let mut cfg = DiagLockConfig::default();
        cfg.policy.profile = BuildProfile::Sprint;
        cfg.policy.factory_exemption = Some(true);
        cfg.identity.entry_id = 7;
        cfg.board.factory_key = "two words".into();

        let issues = cfg.validate();
        assert_eq!(issues.len(), 3, "{issues:?}");
        let advisory: Vec<_> = issues.iter().filter(|i| !i.is_fatal()).collect();
        assert_eq!(advisory.len(), 2);
        assert!(advisory
            .iter()
            .any(|i| i.message().contains("policy.factory_exemption")));
        assert!(advisory.iter().any(|i| i.message().contains("identity.entry_id")));

        let fatal = cfg.fatal_issues();
        assert_eq!(fatal.len(), 1);
        assert!(fatal[0].contains("board.factory_key"));
    }

    #[test]
    fn custom_entry_id_is_usable() {
        let doc = "[policy]\nprofile = \"sprint\"\n[identity]\nentry_id = 135\n";
        let cfg = DiagLockConfig::from_str_as(doc, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.identity_entry(), SmemId(135));
        assert!(cfg.fatal_issues().is_empty());
    }

    #[test]
    fn explicit_exemption_overrides_profile_default() {
        let mut cfg = DiagLockConfig::default();
        assert!(cfg.policy.factory_exemption());
        cfg.policy.factory_exemption = Some(false);
        assert!(!cfg.policy.factory_exemption());

        cfg.policy.profile = BuildProfile::Sprint;
        cfg.policy.factory_exemption = None;
        assert!(!cfg.policy.factory_exemption());
    }

    #[test]
    fn export_mutator_flag_overrides_profile() {
        let mut cfg = DiagLockConfig::default();
        assert!(!cfg.exports_mutator());
        cfg.policy.export_mutator = true;
        assert!(cfg.exports_mutator());
    }

    #[test]
    fn load_or_bootstrap_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("diaglock.toml");

        let cfg = DiagLockConfig::load_or_bootstrap(&path).expect("bootstrap");
        assert!(path.exists());
        assert_eq!(cfg.path, path);
        assert_eq!(cfg.format, ConfigFormat::Toml);

        #[cfg(unix)]
        {
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn bootstrap_renders_requested_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("diaglock.toml");

        let cfg = DiagLockConfig::load_or_bootstrap_as(&path, BuildProfile::Sprint).unwrap();
        assert_eq!(cfg.profile(), BuildProfile::Sprint);
        assert_eq!(cfg.policy.factory_exemption, Some(false));
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());

        // An existing file is loaded as-is.
        let again = DiagLockConfig::load_or_bootstrap_as(&path, BuildProfile::Verizon).unwrap();
        assert_eq!(again.profile(), BuildProfile::Sprint);
    }

    #[test]
    fn bootstrap_failure_outside_default_path_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let err = DiagLockConfig::load_or_bootstrap(blocker.join("diaglock.toml"))
            .expect_err("parent is a file");
        assert!(matches!(err, DiagLockError::InvalidConfig(_)));
    }

    #[test]
    fn save_preserves_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("diaglock.yaml");
        fs::write(&path, "policy:\n  profile: verizon\n").unwrap();

        let mut cfg = DiagLockConfig::load(&path).unwrap();
        assert_eq!(cfg.format, ConfigFormat::Yaml);
        cfg.policy.export_mutator = true;
        cfg.save().unwrap();

        let reloaded = DiagLockConfig::load(&path).unwrap();
        assert_eq!(reloaded.profile(), BuildProfile::Verizon);
        assert!(reloaded.policy.export_mutator);
    }
}
