//! Ingestion: what a collaborator hands to [`PackageDatabase::add`].
//!
//! [`PackageDatabase::add`]: crate::database::PackageDatabase::add

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::{
    artifact::{ArtifactInstance, ArtifactTypeRegistry},
    error::{DatabaseError, Result},
    instance::{ArtifactDependencyKind, PackageQuality, PackageState, Reference, SVersionLock},
    savors::{Savors, TraitContext},
};

/// A fully resolved package description.
pub trait FullPackageInfo {
    fn key(&self) -> &ArtifactInstance;

    fn state(&self) -> PackageState;

    fn savors(&self) -> Option<&Savors>;

    fn dependencies(&self) -> &[Reference];

    /// Feeds publishing the package, as `Type:Name`.
    fn feed_names(&self) -> &[String];

    /// When false, the feed list may be partial: membership can only grow.
    fn all_feed_names_are_known(&self) -> bool;
}

impl<T: FullPackageInfo + ?Sized> FullPackageInfo for &T {
    fn key(&self) -> &ArtifactInstance {
        (**self).key()
    }

    fn state(&self) -> PackageState {
        (**self).state()
    }

    fn savors(&self) -> Option<&Savors> {
        (**self).savors()
    }

    fn dependencies(&self) -> &[Reference] {
        (**self).dependencies()
    }

    fn feed_names(&self) -> &[String] {
        (**self).feed_names()
    }

    fn all_feed_names_are_known(&self) -> bool {
        (**self).all_feed_names_are_known()
    }
}

/// Plain [`FullPackageInfo`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub key: ArtifactInstance,
    pub state: PackageState,
    pub savors: Option<Savors>,
    pub dependencies: Vec<Reference>,
    pub feed_names: Vec<String>,
    pub all_feed_names_are_known: bool,
}

impl PackageInfo {
    pub fn new(key: ArtifactInstance) -> Self {
        Self {
            key,
            state: PackageState::empty(),
            savors: None,
            dependencies: Vec::new(),
            feed_names: Vec::new(),
            all_feed_names_are_known: false,
        }
    }

    pub fn with_state(mut self, state: PackageState) -> Self {
        self.state = state;
        self
    }

    pub fn with_savors(mut self, savors: Option<Savors>) -> Self {
        self.savors = savors;
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = Reference>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_feeds<I, S>(mut self, feeds: I, all_known: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feed_names.extend(feeds.into_iter().map(Into::into));
        self.all_feed_names_are_known = all_known;
        self
    }
}

impl FullPackageInfo for PackageInfo {
    fn key(&self) -> &ArtifactInstance {
        &self.key
    }

    fn state(&self) -> PackageState {
        self.state
    }

    fn savors(&self) -> Option<&Savors> {
        self.savors.as_ref()
    }

    fn dependencies(&self) -> &[Reference] {
        &self.dependencies
    }

    fn feed_names(&self) -> &[String] {
        &self.feed_names
    }

    fn all_feed_names_are_known(&self) -> bool {
        self.all_feed_names_are_known
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlexiBool {
    Bool(bool),
    String(String),
}

fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match FlexiBool::deserialize(deserializer)? {
        FlexiBool::Bool(b) => Ok(b),
        FlexiBool::String(s) => {
            match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" | "" => Ok(false),
                _ => {
                    Err(de::Error::invalid_value(
                        de::Unexpected::Str(&s),
                        &"a valid boolean (true/false, yes/no, 1/0)",
                    ))
                }
            }
        }
    }
}

fn empty_is_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

fn default_true() -> bool {
    true
}

/// A dependency as found in a JSON package batch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyRecord {
    /// `Type:Name/Version`.
    pub target: String,

    #[serde(default)]
    pub lock: SVersionLock,

    #[serde(default)]
    pub min_quality: PackageQuality,

    #[serde(default)]
    pub kind: ArtifactDependencyKind,

    #[serde(default, deserialize_with = "empty_is_none")]
    pub savors: Option<String>,
}

/// A package as found in a JSON package batch.
///
/// ```json
/// {
///   "key": "NuGet:Foo/1.0.0",
///   "savors": "net8|net48",
///   "dependencies": [{ "target": "NuGet:Bar/2.0.0", "lock": "LockMajor" }],
///   "feeds": ["NuGet:MainFeed"]
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageRecord {
    pub key: String,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub ghost: bool,

    #[serde(default, deserialize_with = "empty_is_none")]
    pub savors: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,

    #[serde(default)]
    pub feeds: Vec<String>,

    #[serde(default = "default_true", deserialize_with = "flexible_bool")]
    pub all_feeds_known: bool,
}

impl PackageRecord {
    /// Resolves names through the registry and parses savors in `context`.
    pub fn into_info(
        self,
        registry: &ArtifactTypeRegistry,
        context: &TraitContext,
    ) -> Result<PackageInfo> {
        let key = ArtifactInstance::parse(registry, &self.key)?;
        let invalid = |reason: String| {
            DatabaseError::InvalidRecord {
                key: self.key.clone(),
                reason,
            }
        };

        let savors = match &self.savors {
            Some(s) => {
                Some(
                    context
                        .parse(s)
                        .ok_or_else(|| invalid(format!("savors '{s}' are empty")))?,
                )
            }
            None => None,
        };

        let dependencies = self
            .dependencies
            .iter()
            .map(|dep| {
                let target = ArtifactInstance::parse(registry, &dep.target)
                    .map_err(|err| invalid(format!("dependency '{}': {err}", dep.target)))?;
                Ok(Reference {
                    target,
                    lock: dep.lock,
                    min_quality: dep.min_quality,
                    kind: dep.kind,
                    applicable_savors: dep.savors.as_deref().and_then(|s| context.parse(s)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let state = if self.ghost {
            PackageState::GHOST
        } else {
            PackageState::empty()
        };

        Ok(PackageInfo {
            key,
            state,
            savors,
            dependencies,
            feed_names: self.feeds,
            all_feed_names_are_known: self.all_feeds_known,
        })
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Parses a JSON array of package records.
pub fn parse_records(json: &str) -> Result<Vec<PackageRecord>> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::REGISTRY;

    fn context() -> TraitContext {
        TraitContext::new("Savors", '|').unwrap()
    }

    #[test]
    fn test_record_into_info() {
        let records = parse_records(
            r#"[{
                "key": "NuGet:Foo/1.0.0",
                "savors": "net8|net48",
                "dependencies": [
                    { "target": "NuGet:Bar/2.0.0", "lock": "LockMajor", "min_quality": "Stable", "savors": "net8|other" },
                    { "target": "NPM:left-pad/1.0.0", "kind": "Development" }
                ],
                "feeds": ["NuGet:MainFeed"]
            }]"#,
        )
        .unwrap();
        let info = records
            .into_iter()
            .next()
            .unwrap()
            .into_info(&REGISTRY, &context())
            .unwrap();

        assert_eq!(info.key.to_string(), "NuGet:Foo/1.0.0");
        assert_eq!(info.savors.as_ref().unwrap().to_string(), "net48|net8");
        assert_eq!(info.dependencies.len(), 2);
        assert_eq!(info.dependencies[0].lock, SVersionLock::LockMajor);
        assert_eq!(info.dependencies[0].min_quality, PackageQuality::Stable);
        assert_eq!(info.dependencies[1].kind, ArtifactDependencyKind::Development);
        assert!(info.all_feed_names_are_known);
        assert!(info.state.is_empty());
    }

    #[test]
    fn test_flexible_booleans() {
        let records = parse_records(
            r#"[
                { "key": "NuGet:Foo/1.0.0", "ghost": "yes", "all_feeds_known": "0" },
                { "key": "NuGet:Bar/1.0.0", "ghost": false }
            ]"#,
        )
        .unwrap();
        assert!(records[0].ghost);
        assert!(!records[0].all_feeds_known);
        assert!(!records[1].ghost);
        assert!(records[1].all_feeds_known);

        assert!(parse_records(r#"[{ "key": "NuGet:Foo/1.0.0", "ghost": "maybe" }]"#).is_err());
    }

    #[test]
    fn test_invalid_dependency_target() {
        let record = PackageRecord {
            key: "NuGet:Foo/1.0.0".into(),
            ghost: true,
            savors: None,
            dependencies: vec![DependencyRecord {
                target: "NuGet:Bar".into(),
                lock: SVersionLock::None,
                min_quality: PackageQuality::None,
                kind: ArtifactDependencyKind::None,
                savors: None,
            }],
            feeds: Vec::new(),
            all_feeds_known: true,
        };
        let err = record.into_info(&REGISTRY, &context()).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRecord { .. }));
    }
}
