use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use pkgdb_utils::{
    path::{resolve_path, xdg_config_home, xdg_data_home},
    time::parse_duration,
};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::{annotate_toml_array_of_tables, annotate_toml_table},
    display::{DisplaySettings, TableStyle},
    error::{ConfigError, Result},
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "PKGDB_CONFIG";

/// Environment variable overriding the snapshot path.
pub const DB_ENV: &str = "PKGDB_DB";

const DEFAULT_SAVOR_CONTEXT: &str = "Savors";
const DEFAULT_STALE_AFTER: &str = "7d";

/// An artifact type registered before any snapshot is read
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields, PartialEq, Eq)]
pub struct ArtifactTypeConfig {
    /// Type name as used in typed names, e.g. "NuGet" in "NuGet:Newtonsoft.Json"
    pub name: String,

    /// Whether the type's packages can be installed
    #[serde(default = "default_installable")]
    pub installable: bool,
}

fn default_installable() -> bool {
    true
}

/// Package database configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Path of the package database snapshot.
    /// Default: $XDG_DATA_HOME/pkgdb/packages.db
    pub db_path: Option<String>,

    /// Compress snapshots with zstd when saving.
    /// Default: true
    pub compress: Option<bool>,

    /// Trait context used to parse savors of imported packages.
    /// Default: "Savors"
    pub savor_context: Option<String>,

    /// Age after which `pkgdb inspect` reports the database as stale.
    /// Default: "7d"
    pub stale_after: Option<String>,

    /// Output settings for the command line tool.
    #[serde(default)]
    pub display: DisplaySettings,

    /// Artifact types registered before loading or importing.
    /// Types found in a snapshot are registered on the fly.
    #[serde(default)]
    pub artifact_types: Vec<ArtifactTypeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Path of the configuration file: `$PKGDB_CONFIG` or the XDG default.
pub fn config_path() -> PathBuf {
    match env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => xdg_config_home().join("pkgdb").join("config.toml"),
    }
}

fn is_valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl Config {
    pub fn default_config() -> Self {
        let artifact_types = [("NuGet", true), ("NPM", true), ("CKSetup", false)]
            .into_iter()
            .map(|(name, installable)| {
                ArtifactTypeConfig {
                    name: name.to_string(),
                    installable,
                }
            })
            .collect();

        Self {
            db_path: Some("$XDG_DATA_HOME/pkgdb/packages.db".to_string()),
            compress: Some(true),
            savor_context: Some(DEFAULT_SAVOR_CONTEXT.to_string()),
            stale_after: Some(DEFAULT_STALE_AFTER.to_string()),
            display: DisplaySettings {
                table_style: Some(TableStyle::Rounded),
                color: Some(true),
            },
            artifact_types,
        }
    }

    /// Loads the configuration from [`config_path`].
    ///
    /// A missing file yields [`Config::default_config`].
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Config>(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };
        config.resolve()?;
        Ok(config)
    }

    /// Fills unset fields with defaults and validates the result.
    pub fn resolve(&mut self) -> Result<()> {
        self.compress.get_or_insert(true);
        self.display.table_style.get_or_insert_default();
        self.display.color.get_or_insert(true);

        let context = self
            .savor_context
            .get_or_insert_with(|| DEFAULT_SAVOR_CONTEXT.to_string());
        if context.trim().is_empty() {
            return Err(ConfigError::EmptySavorContext);
        }

        let stale_after = self
            .stale_after
            .get_or_insert_with(|| DEFAULT_STALE_AFTER.to_string());
        if parse_duration(stale_after).is_none() {
            return Err(ConfigError::InvalidDuration {
                field: "stale_after",
                value: stale_after.clone(),
            });
        }

        let mut seen = HashSet::new();
        for ty in &self.artifact_types {
            if !is_valid_type_name(&ty.name) {
                return Err(ConfigError::InvalidArtifactType(ty.name.clone()));
            }
            if !seen.insert(ty.name.as_str()) {
                return Err(ConfigError::DuplicateArtifactType(ty.name.clone()));
            }
        }

        Ok(())
    }

    /// Snapshot path: `$PKGDB_DB`, then `db_path`, then the XDG default.
    pub fn get_db_path(&self) -> Result<PathBuf> {
        if let Ok(path) = env::var(DB_ENV) {
            if !path.is_empty() {
                return Ok(resolve_path(&path)?);
            }
        }
        match &self.db_path {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(xdg_data_home().join("pkgdb").join("packages.db")),
        }
    }

    pub fn compress(&self) -> bool {
        self.compress.unwrap_or(true)
    }

    pub fn savor_context(&self) -> &str {
        self.savor_context.as_deref().unwrap_or(DEFAULT_SAVOR_CONTEXT)
    }

    /// Parsed `stale_after`; an invalid value falls back to the default.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(Duration::from_secs(7 * 24 * 60 * 60))
    }

    /// Serializes the configuration with field docs as TOML comments.
    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(display) = doc.get_mut("display").and_then(|item| item.as_table_mut()) {
            annotate_toml_table::<DisplaySettings>(display, false)?;
        }

        if let Some(types) = doc
            .get_mut("artifact_types")
            .and_then(|item| item.as_array_of_tables_mut())
        {
            annotate_toml_array_of_tables::<ArtifactTypeConfig>(types)?;
        }

        Ok(doc)
    }
}

/// Writes the annotated default configuration to `path`.
///
/// Fails with [`ConfigError::ConfigAlreadyExists`] rather than overwriting.
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(path.display().to_string()));
    }

    let doc = Config::default_config().to_annotated_document()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;

    info!(path = %path.display(), "default configuration written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::with_env;

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert!(config.compress());
        assert_eq!(config.savor_context(), "Savors");
        assert_eq!(config.stale_after(), Duration::from_secs(604_800));
        assert_eq!(config.artifact_types.len(), 3);
        assert!(!config.artifact_types[2].installable);
        assert_eq!(config.display.table_style(), TableStyle::Rounded);
    }

    #[test]
    fn test_resolve_fills_missing_fields() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve().unwrap();
        assert_eq!(config.compress, Some(true));
        assert_eq!(config.savor_context.as_deref(), Some("Savors"));
        assert_eq!(config.stale_after.as_deref(), Some("7d"));
        assert!(config.artifact_types.is_empty());
    }

    #[test]
    fn test_resolve_rejects_invalid_values() {
        let mut config = Config::default_config();
        config.stale_after = Some("soon".into());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidDuration {
                field: "stale_after",
                ..
            })
        ));

        let mut config = Config::default_config();
        config.savor_context = Some("  ".into());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::EmptySavorContext)
        ));

        let mut config = Config::default_config();
        config.artifact_types.push(ArtifactTypeConfig {
            name: "Bad:Type".into(),
            installable: true,
        });
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidArtifactType(name)) if name == "Bad:Type"
        ));

        let mut config = Config::default_config();
        config.artifact_types.push(ArtifactTypeConfig {
            name: "NuGet".into(),
            installable: false,
        });
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::DuplicateArtifactType(name)) if name == "NuGet"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
compress = false
stale_after = "12h"

[display]
table_style = "markdown"

[[artifact_types]]
name = "Maven"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.compress());
        assert_eq!(config.stale_after(), Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.display.table_style(), TableStyle::Markdown);
        assert_eq!(
            config.artifact_types,
            vec![ArtifactTypeConfig {
                name: "Maven".into(),
                installable: true,
            }]
        );
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.artifact_types.len(), 3);
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "compress = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::TomlDeError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        with_env(&[(CONFIG_ENV, Some("/tmp/pkgdb-test/config.toml"))], || {
            assert_eq!(config_path(), PathBuf::from("/tmp/pkgdb-test/config.toml"));
        });
        with_env(
            &[(CONFIG_ENV, None), ("XDG_CONFIG_HOME", Some("/tmp/xdg"))],
            || {
                assert_eq!(config_path(), PathBuf::from("/tmp/xdg/pkgdb/config.toml"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_db_path_resolution() {
        with_env(
            &[(DB_ENV, Some("/srv/pkgdb/override.db")), ("XDG_DATA_HOME", Some("/tmp/data"))],
            || {
                let config = Config::default_config();
                assert_eq!(
                    config.get_db_path().unwrap(),
                    PathBuf::from("/srv/pkgdb/override.db")
                );
            },
        );
        with_env(
            &[(DB_ENV, None), ("XDG_DATA_HOME", Some("/tmp/data"))],
            || {
                let config = Config::default_config();
                assert_eq!(
                    config.get_db_path().unwrap(),
                    PathBuf::from("/tmp/data/pkgdb/packages.db")
                );

                let mut config = Config::default_config();
                config.db_path = None;
                assert_eq!(
                    config.get_db_path().unwrap(),
                    PathBuf::from("/tmp/data/pkgdb/packages.db")
                );
            },
        );
    }

    #[test]
    fn test_generate_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgdb").join("config.toml");
        generate_default_config(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Compress snapshots with zstd"));
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.artifact_types.len(), 3);

        assert!(matches!(
            generate_default_config(&path),
            Err(ConfigError::ConfigAlreadyExists(_))
        ));
    }
}
