//! Self-describing binary snapshot format.
//!
//! Layout of a snapshot:
//!
//! ```text
//! varint   format version
//! varint   instance count
//! instance*
//!   u8       marker: 2 = type + name follow, 1 = name follows, 0 = same as previous
//!   [type]   shared string + installable byte   (marker 2)
//!   [name]   string                             (markers 1 and 2)
//!   string   version
//!   savors
//!   u8       state bits
//!   varint   dependency count
//!   dependency*
//!     [savors]  applicable savors, only when the instance has savors
//!     u8 lock, u8 min quality, u8 kind
//!     varint    target index in the instance array
//! varint   feed count
//! feed*    type, name, varint member count, varint member indices (increasing)
//! varint   serial number
//! varint   zig-zag Unix seconds, varint nanoseconds
//! ```
//!
//! Integers are unsigned LEB128. Instances are written in store order, so a
//! dependency may point to a later index; readers patch those once the whole
//! array is known.

mod reader;
mod writer;

use std::io::{Read, Write};

pub use reader::BinaryReader;
pub use writer::BinaryWriter;

use crate::{artifact::ArtifactTypeRegistry, database::PackageDatabase, error::FormatError};

/// Version written by [`BinaryWriter`]; readers accept `1..=FORMAT_VERSION`.
pub const FORMAT_VERSION: u64 = 1;

const MARKER_SAME: u8 = 0;
const MARKER_NEW_NAME: u8 = 1;
const MARKER_NEW_TYPE: u8 = 2;

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

impl PackageDatabase {
    /// Serializes the snapshot into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), FormatError> {
        BinaryWriter::new(writer).write_database(self)
    }

    /// Reads a snapshot, registering the artifact types it mentions.
    pub fn read_from<R: Read>(
        registry: &ArtifactTypeRegistry,
        reader: R,
    ) -> Result<Self, FormatError> {
        BinaryReader::new(registry, reader).read_database()
    }
}
