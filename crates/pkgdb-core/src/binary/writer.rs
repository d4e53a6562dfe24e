use std::{collections::HashMap, io::Write};

use crate::{
    artifact::{ArtifactInstance, ArtifactType},
    binary::{zigzag_encode, FORMAT_VERSION, MARKER_NEW_NAME, MARKER_NEW_TYPE, MARKER_SAME},
    database::PackageDatabase,
    error::FormatError,
    instance::PackageInstance,
    savors::{Savors, TraitContext},
    store::InstanceStore,
};

/// Writes snapshots in the pooled binary format.
///
/// Strings, trait contexts and savors are written once per stream and then
/// referenced by their pool position.
pub struct BinaryWriter<W: Write> {
    inner: W,
    strings: HashMap<String, u64>,
    contexts: HashMap<TraitContext, u64>,
    savors: HashMap<Savors, u64>,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            strings: HashMap::new(),
            contexts: HashMap::new(),
            savors: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), FormatError> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    /// Unsigned LEB128.
    pub fn write_varint(&mut self, mut value: u64) -> Result<(), FormatError> {
        let mut buf = [0u8; 10];
        let mut len = 0;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }
            buf[len] = byte | 0x80;
            len += 1;
        }
        self.inner.write_all(&buf[..len])?;
        Ok(())
    }

    pub fn write_str(&mut self, value: &str) -> Result<(), FormatError> {
        self.write_varint(value.len() as u64)?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    /// `0` followed by the string the first time, `n` for pool entry `n - 1`
    /// afterwards.
    pub fn write_shared_str(&mut self, value: &str) -> Result<(), FormatError> {
        if let Some(&index) = self.strings.get(value) {
            return self.write_varint(index + 1);
        }
        self.write_varint(0)?;
        self.write_str(value)?;
        let index = self.strings.len() as u64;
        self.strings.insert(value.to_string(), index);
        Ok(())
    }

    fn write_context(&mut self, context: &TraitContext) -> Result<(), FormatError> {
        if let Some(&index) = self.contexts.get(context) {
            return self.write_varint(index + 1);
        }
        self.write_varint(0)?;
        self.write_shared_str(context.name())?;
        self.write_varint(u64::from(context.separator()))?;
        let index = self.contexts.len() as u64;
        self.contexts.insert(context.clone(), index);
        Ok(())
    }

    /// `0` for none, `1` for a new trait, `n >= 2` for pool entry `n - 2`.
    pub fn write_savors(&mut self, savors: Option<&Savors>) -> Result<(), FormatError> {
        let Some(savors) = savors else {
            return self.write_varint(0);
        };
        if let Some(&index) = self.savors.get(savors) {
            return self.write_varint(index + 2);
        }
        self.write_varint(1)?;
        self.write_context(savors.context())?;
        self.write_shared_str(&savors.to_string())?;
        let index = self.savors.len() as u64;
        self.savors.insert(savors.clone(), index);
        Ok(())
    }

    fn write_type(&mut self, ty: &ArtifactType) -> Result<(), FormatError> {
        self.write_shared_str(ty.name())?;
        self.write_u8(u8::from(ty.is_installable()))
    }

    fn write_instance(
        &mut self,
        store: &InstanceStore,
        previous: Option<&ArtifactInstance>,
        instance: &PackageInstance,
    ) -> Result<(), FormatError> {
        let key = instance.key();
        match previous {
            Some(prev) if prev.artifact_type() == key.artifact_type() && prev.name() == key.name() => {
                self.write_u8(MARKER_SAME)?;
            }
            Some(prev) if prev.artifact_type() == key.artifact_type() => {
                self.write_u8(MARKER_NEW_NAME)?;
                self.write_str(key.name())?;
            }
            _ => {
                self.write_u8(MARKER_NEW_TYPE)?;
                self.write_type(key.artifact_type())?;
                self.write_str(key.name())?;
            }
        }
        self.write_str(&key.version().to_string())?;
        self.write_savors(instance.savors())?;
        self.write_u8(instance.state().bits())?;

        self.write_varint(instance.dependencies().len() as u64)?;
        for dep in instance.dependencies() {
            if instance.savors().is_some() {
                self.write_savors(dep.applicable_savors.as_ref())?;
            }
            self.write_u8(dep.lock.into())?;
            self.write_u8(dep.min_quality.into())?;
            self.write_u8(dep.kind.into())?;
            self.write_varint(index_of(store, &dep.target)?)?;
        }
        Ok(())
    }

    /// Writes the whole snapshot and flushes the underlying writer.
    ///
    /// # Errors
    ///
    /// * [`FormatError::DanglingReference`] if a dependency target or a feed
    ///   member is missing from the store.
    /// * [`FormatError::Io`] on write failures.
    pub fn write_database(&mut self, db: &PackageDatabase) -> Result<(), FormatError> {
        self.write_varint(FORMAT_VERSION)?;

        let store = db.instances();
        self.write_varint(store.len() as u64)?;
        let mut previous = None;
        for instance in store {
            self.write_instance(store, previous, instance)?;
            previous = Some(instance.key());
        }

        self.write_varint(db.feed_count() as u64)?;
        for feed in db.feeds() {
            self.write_type(feed.artifact_type())?;
            self.write_str(feed.name())?;
            self.write_varint(feed.instances().len() as u64)?;
            for member in feed.instances() {
                self.write_varint(index_of(store, member.key())?)?;
            }
        }

        self.write_varint(db.serial_number())?;
        let last_update = db.last_update();
        self.write_varint(zigzag_encode(last_update.timestamp()))?;
        self.write_varint(u64::from(last_update.timestamp_subsec_nanos()))?;

        self.inner.flush()?;
        Ok(())
    }
}

fn index_of(store: &InstanceStore, key: &ArtifactInstance) -> Result<u64, FormatError> {
    store
        .find(key)
        .map(|index| index as u64)
        .map_err(|_| FormatError::DanglingReference(key.to_string()))
}
