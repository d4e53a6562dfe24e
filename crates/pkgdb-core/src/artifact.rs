//! Artifact identity: types, artifacts and versioned artifact instances.
//!
//! Artifact types are interned in an explicit [`ArtifactTypeRegistry`] that is
//! passed to every operation needing to resolve a type by name; there is no
//! process-wide registry.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use regex::Regex;
use semver::Version;

use crate::error::ArtifactError;

static TYPE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").expect("unable to compile artifact type regex")
});

#[derive(Debug)]
struct TypeDef {
    name: Box<str>,
    installable: bool,
}

/// An interned artifact type such as `NuGet` or `NPM`.
///
/// Two types obtained from the same registry compare by pointer; types from
/// different registries fall back to a name comparison. Ordering is the
/// case-sensitive order of the names.
#[derive(Clone)]
pub struct ArtifactType(Arc<TypeDef>);

impl ArtifactType {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether artifacts of this type can be installed (as opposed to
    /// being consumed only as build inputs).
    pub fn is_installable(&self) -> bool {
        self.0.installable
    }
}

impl PartialEq for ArtifactType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for ArtifactType {}

impl PartialOrd for ArtifactType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArtifactType {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Ordering::Equal;
        }
        self.0.name.cmp(&other.0.name)
    }
}

impl Hash for ArtifactType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl fmt::Debug for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactType({})", self.0.name)
    }
}

/// Registry of known artifact types.
///
/// Registration is idempotent and lazily grows the registry. The registry is
/// shareable across threads.
#[derive(Default)]
pub struct ArtifactTypeRegistry {
    types: RwLock<Vec<ArtifactType>>,
}

impl ArtifactTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the type named `name`, registering it when unknown.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::InvalidTypeName`] if the name is not a valid identifier.
    /// * [`ArtifactError::TypeConflict`] if the type exists with another installable flag.
    pub fn register(&self, name: &str, installable: bool) -> Result<ArtifactType, ArtifactError> {
        if !TYPE_NAME_RE.is_match(name) {
            return Err(ArtifactError::InvalidTypeName(name.to_string()));
        }

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = types.iter().find(|t| t.name() == name) {
            if existing.is_installable() != installable {
                return Err(ArtifactError::TypeConflict {
                    name: name.to_string(),
                    registered: existing.is_installable(),
                });
            }
            return Ok(existing.clone());
        }

        let ty = ArtifactType(Arc::new(TypeDef {
            name: name.into(),
            installable,
        }));
        types.push(ty.clone());
        Ok(ty)
    }

    /// Finds a registered type by its exact (case-sensitive) name.
    pub fn get(&self, name: &str) -> Option<ArtifactType> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// Like [`get`](Self::get) but fails with [`ArtifactError::UnknownType`].
    pub fn require(&self, name: &str) -> Result<ArtifactType, ArtifactError> {
        self.get(name)
            .ok_or_else(|| ArtifactError::UnknownType(name.to_string()))
    }

    /// All registered types, sorted by name.
    pub fn types(&self) -> Vec<ArtifactType> {
        let mut types = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        types.sort();
        types
    }
}

/// Compares two artifact names ignoring case.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c == ':' || c == '/' || c.is_whitespace())
}

/// A typed name: an artifact type plus a case-insensitive name.
///
/// Used both for packages (`NuGet:Newtonsoft.Json`) and for feeds
/// (`NuGet:MainFeed`).
#[derive(Clone)]
pub struct Artifact {
    ty: ArtifactType,
    name: Arc<str>,
}

impl Artifact {
    pub fn new(ty: ArtifactType, name: &str) -> Result<Self, ArtifactError> {
        if !is_valid_name(name) {
            return Err(ArtifactError::InvalidName(name.to_string()));
        }
        Ok(Self {
            ty,
            name: name.into(),
        })
    }

    /// Smallest artifact of a type; only used as a range bound.
    pub(crate) fn lower_bound(ty: &ArtifactType) -> Self {
        Self {
            ty: ty.clone(),
            name: "".into(),
        }
    }

    /// Parses `Type:Name`, resolving the type through the registry.
    pub fn parse(registry: &ArtifactTypeRegistry, typed_name: &str) -> Result<Self, ArtifactError> {
        let (type_name, name) = typed_name
            .split_once(':')
            .ok_or_else(|| ArtifactError::InvalidTypedName(typed_name.to_string()))?;
        let ty = registry.require(type_name.trim())?;
        Self::new(ty, name.trim())
    }

    pub fn artifact_type(&self) -> &ArtifactType {
        &self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Type:Name`.
    pub fn typed_name(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Artifact {}

impl PartialOrd for Artifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Artifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ty
            .cmp(&other.ty)
            .then_with(|| compare_names(&self.name, &other.name))
    }
}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        for c in self.name.chars().flat_map(char::to_lowercase) {
            c.hash(state);
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ty, self.name)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Artifact({self})")
    }
}

/// An artifact at a specific version.
///
/// Totally ordered by type name, then name (case-insensitive), then version.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactInstance {
    artifact: Artifact,
    version: Version,
}

impl ArtifactInstance {
    pub fn new(artifact: Artifact, version: Version) -> Self {
        Self {
            artifact,
            version,
        }
    }

    /// Parses `Type:Name/Version`.
    pub fn parse(registry: &ArtifactTypeRegistry, input: &str) -> Result<Self, ArtifactError> {
        let (typed_name, version) = input
            .rsplit_once('/')
            .ok_or_else(|| ArtifactError::InvalidInstance(input.to_string()))?;
        let artifact = Artifact::parse(registry, typed_name)?;
        let version = parse_version(version.trim())?;
        Ok(Self::new(artifact, version))
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn artifact_type(&self) -> &ArtifactType {
        self.artifact.artifact_type()
    }

    pub fn name(&self) -> &str {
        self.artifact.name()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ArtifactInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.artifact, self.version)
    }
}

impl fmt::Debug for ArtifactInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactInstance({self})")
    }
}

pub fn parse_version(input: &str) -> Result<Version, ArtifactError> {
    Version::parse(input).map_err(|err| {
        ArtifactError::InvalidVersion {
            input: input.to_string(),
            source: err,
        }
    })
}
