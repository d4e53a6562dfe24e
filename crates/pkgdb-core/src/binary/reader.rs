use std::{collections::BTreeSet, io::Read, sync::Arc};

use chrono::DateTime;

use crate::{
    artifact::{parse_version, Artifact, ArtifactInstance, ArtifactType, ArtifactTypeRegistry},
    binary::{zigzag_decode, FORMAT_VERSION, MARKER_NEW_NAME, MARKER_NEW_TYPE, MARKER_SAME},
    database::PackageDatabase,
    error::{ArtifactError, FormatError},
    feed::PackageFeed,
    instance::{
        ArtifactDependencyKind, PackageInstance, PackageQuality, PackageState, Reference,
        SVersionLock,
    },
    savors::{Savors, TraitContext},
    store::InstanceStore,
};

/// Upper bound on up-front allocations driven by counts read from the stream.
const MAX_PREALLOCATION: usize = 4096;

/// An instance whose dependency targets may still be waiting for a later row.
struct Row {
    key: ArtifactInstance,
    savors: Option<Savors>,
    state: PackageState,
    dependencies: Vec<Reference>,
}

/// Reads snapshots written by [`BinaryWriter`](super::BinaryWriter).
///
/// Artifact types found in the stream are registered in `registry`.
pub struct BinaryReader<'r, R: Read> {
    registry: &'r ArtifactTypeRegistry,
    inner: R,
    strings: Vec<String>,
    contexts: Vec<TraitContext>,
    savors: Vec<Savors>,
}

impl<'r, R: Read> BinaryReader<'r, R> {
    pub fn new(registry: &'r ArtifactTypeRegistry, inner: R) -> Self {
        Self {
            registry,
            inner,
            strings: Vec::new(),
            contexts: Vec::new(),
            savors: Vec::new(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_bool(&mut self, kind: &'static str) -> Result<bool, FormatError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => {
                Err(FormatError::InvalidEnum {
                    kind,
                    value,
                })
            }
        }
    }

    pub fn read_varint(&mut self) -> Result<u64, FormatError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            let bits = u64::from(byte & 0x7f);
            if shift >= 64 || (shift == 63 && bits > 1) {
                return Err(FormatError::VarintOverflow);
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn read_len(&mut self) -> Result<usize, FormatError> {
        usize::try_from(self.read_varint()?).map_err(|_| FormatError::VarintOverflow)
    }

    pub fn read_str(&mut self) -> Result<String, FormatError> {
        let len = self.read_varint()?;
        let mut buf = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(FormatError::UnexpectedEof);
        }
        String::from_utf8(buf).map_err(|_| FormatError::InvalidUtf8)
    }

    pub fn read_shared_str(&mut self) -> Result<String, FormatError> {
        match self.read_varint()? {
            0 => {
                let value = self.read_str()?;
                self.strings.push(value.clone());
                Ok(value)
            }
            index => {
                pool_entry(&self.strings, "string", index - 1)
            }
        }
    }

    fn read_context(&mut self) -> Result<TraitContext, FormatError> {
        match self.read_varint()? {
            0 => {
                let name = self.read_shared_str()?;
                let separator = u32::try_from(self.read_varint()?)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ArtifactError::InvalidSavorContext(name.clone()))?;
                let context = TraitContext::new(&name, separator)?;
                self.contexts.push(context.clone());
                Ok(context)
            }
            index => pool_entry(&self.contexts, "trait context", index - 1),
        }
    }

    pub fn read_savors(&mut self) -> Result<Option<Savors>, FormatError> {
        match self.read_varint()? {
            0 => Ok(None),
            1 => {
                let context = self.read_context()?;
                let savors = context
                    .parse(&self.read_shared_str()?)
                    .ok_or(FormatError::EmptySavors)?;
                self.savors.push(savors.clone());
                Ok(Some(savors))
            }
            index => pool_entry(&self.savors, "savors", index - 2).map(Some),
        }
    }

    fn read_type(&mut self) -> Result<ArtifactType, FormatError> {
        let name = self.read_shared_str()?;
        let installable = self.read_bool("installable flag")?;
        Ok(self.registry.register(&name, installable)?)
    }

    fn read_row(&mut self, position: usize, previous: Option<&Row>) -> Result<Row, FormatError> {
        let marker = self.read_u8()?;
        let invalid_marker = FormatError::InvalidMarker {
            marker,
            position,
        };
        let artifact = match marker {
            MARKER_NEW_TYPE => {
                let ty = self.read_type()?;
                Artifact::new(ty, &self.read_str()?)?
            }
            MARKER_NEW_NAME => {
                let ty = previous
                    .map(|row| row.key.artifact_type().clone())
                    .ok_or(invalid_marker)?;
                Artifact::new(ty, &self.read_str()?)?
            }
            MARKER_SAME => {
                previous
                    .map(|row| row.key.artifact().clone())
                    .ok_or(invalid_marker)?
            }
            _ => return Err(invalid_marker),
        };
        let key = ArtifactInstance::new(artifact, parse_version(&self.read_str()?)?);
        if previous.is_some_and(|row| row.key >= key) {
            return Err(FormatError::UnsortedInstances(position));
        }

        let savors = self.read_savors()?;
        let state = PackageState::from_bits_retain(self.read_u8()?);
        Ok(Row {
            key,
            savors,
            state,
            dependencies: Vec::new(),
        })
    }

    /// Reads a whole snapshot.
    ///
    /// Dependency targets later in the instance array are recorded and
    /// patched once every instance has been read.
    pub fn read_database(&mut self) -> Result<PackageDatabase, FormatError> {
        let version = self.read_varint()?;
        if version == 0 || version > FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let count = self.read_len()?;
        let mut rows: Vec<Row> = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        let mut deferred: Vec<(usize, usize, usize)> = Vec::new();
        for position in 0..count {
            let mut row = self.read_row(position, rows.last())?;

            let dep_count = self.read_len()?;
            row.dependencies.reserve(dep_count.min(MAX_PREALLOCATION));
            for dep_index in 0..dep_count {
                let applicable_savors = if row.savors.is_some() {
                    self.read_savors()?
                } else {
                    None
                };
                let lock = SVersionLock::try_from(self.read_u8()?)?;
                let min_quality = PackageQuality::try_from(self.read_u8()?)?;
                let kind = ArtifactDependencyKind::try_from(self.read_u8()?)?;
                let target = instance_index(self.read_varint()?, count)?;

                let target_key = if target < position {
                    rows[target].key.clone()
                } else {
                    deferred.push((position, dep_index, target));
                    row.key.clone()
                };
                row.dependencies.push(Reference {
                    target: target_key,
                    lock,
                    min_quality,
                    kind,
                    applicable_savors,
                });
            }
            rows.push(row);
        }

        for (owner, dep_index, target) in deferred {
            let target_key = rows[target].key.clone();
            rows[owner].dependencies[dep_index].target = target_key;
        }

        let store = InstanceStore::from_sorted(
            rows.into_iter()
                .map(|row| {
                    Arc::new(PackageInstance::new(
                        row.key,
                        row.savors,
                        row.state,
                        row.dependencies,
                    ))
                })
                .collect(),
        );

        let feed_count = self.read_len()?;
        let mut feeds = Vec::with_capacity(feed_count.min(MAX_PREALLOCATION));
        let mut seen = BTreeSet::new();
        for _ in 0..feed_count {
            let ty = self.read_type()?;
            let artifact = Artifact::new(ty, &self.read_str()?)?;
            if !seen.insert(artifact.clone()) {
                return Err(FormatError::DuplicateFeed(artifact.to_string()));
            }
            let member_count = self.read_len()?;
            let mut members: Vec<Arc<PackageInstance>> =
                Vec::with_capacity(member_count.min(MAX_PREALLOCATION));
            let mut last = None;
            for position in 0..member_count {
                let index = instance_index(self.read_varint()?, store.len())?;
                if last.is_some_and(|last| last >= index) {
                    return Err(FormatError::UnsortedInstances(position));
                }
                last = Some(index);
                let member = &store.as_slice()[index];
                if member.key().artifact_type() != artifact.artifact_type() {
                    return Err(FormatError::FeedTypeMismatch {
                        feed: artifact.to_string(),
                        member: member.key().to_string(),
                    });
                }
                members.push(member.clone());
            }
            feeds.push(PackageFeed::new(artifact, InstanceStore::from_sorted(members)));
        }

        let serial_number = self.read_varint()?;
        let raw_seconds = self.read_varint()?;
        let seconds = zigzag_decode(raw_seconds);
        let nanos = self.read_varint()?;
        let last_update = u32::try_from(nanos)
            .ok()
            .and_then(|nanos| DateTime::from_timestamp(seconds, nanos))
            .ok_or(FormatError::InvalidTimestamp {
                seconds,
                nanos,
            })?;

        Ok(PackageDatabase::from_parts(
            store,
            feeds,
            last_update,
            serial_number,
        ))
    }
}

fn pool_entry<T: Clone>(pool: &[T], kind: &'static str, index: u64) -> Result<T, FormatError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| pool.get(i))
        .cloned()
        .ok_or(FormatError::InvalidPoolIndex {
            kind,
            index,
        })
}

fn instance_index(index: u64, len: usize) -> Result<usize, FormatError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(FormatError::InvalidInstanceIndex {
            index,
            len,
        })
}
