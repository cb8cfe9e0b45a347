//! World snapshot codec.
//!
//! Binary, little-endian, bit-exact. Floats are written bitwise. The layout:
//!
//! | Field | Bytes |
//! |---|---|
//! | Magic `0x45535345` ("ESSE") | 4 |
//! | Version (currently 1) | 4 |
//! | Entity count | 4 |
//! | Archetype count | 4 |
//! | Timestamp (host-provided, not validated on load) | 8 |
//! | Checksum | 4 |
//! | Zero padding to an 80-byte, cache-line friendly header | 52 |
//! | Type table: `u32 count`, then `u32 id, u32 name_len, utf8 name` each | var |
//! | Archetype blocks, one per archetype in id order | var |
//!
//! Each archetype block is a `{id, component_count, entity_count, data_len}`
//! descriptor (4xu32), the ascending type-id list, the entity handles sorted
//! by id (u64 each), then each component column in that entity order. Every
//! archetype is serialized, empty ones included, so restored archetype ids
//! are bit-identical to the saved ones.
//!
//! The checksum is an FNV-1a fold over entity count, archetype count, and
//! each archetype's `(id, entity_count, component_count, type ids in
//! order)`.
//!
//! Types are resolved on load by name against the process registry; a
//! missing name aborts with `UnknownComponent`. Restore is atomic: the
//! buffer is parsed and validated in full -- checksum included -- before any
//! world state is touched, then the directory and archetypes are rebuilt
//! wholesale. Event channels are not part of a snapshot.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use tracing::warn;

use crate::archetype::split_row;
use crate::entity::{Entity, EntityLocation};
use crate::error::{EcsError, Result};
use crate::registry::{self, ComponentId};
use crate::signature::Signature;
use crate::world::World;

/// "ESSE" when written little-endian.
pub const SNAPSHOT_MAGIC: u32 = 0x4553_5345;
pub const SNAPSHOT_VERSION: u32 = 1;

const HEADER_LEN: usize = 80;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv_fold(mut hash: u32, value: u32) -> u32 {
    for byte in value.to_le_bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The fixed-size header fields, readable without parsing the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub entity_count: u32,
    pub archetype_count: u32,
    pub timestamp: u64,
    pub checksum: u32,
}

/// Decode just the header of a snapshot buffer.
pub fn peek_header(bytes: &[u8]) -> Result<SnapshotHeader> {
    let mut reader = Reader::new(bytes);
    let magic = reader.u32()?;
    if magic != SNAPSHOT_MAGIC {
        return Err(EcsError::SnapshotMagicMismatch);
    }
    let version = reader.u32()?;
    if version != SNAPSHOT_VERSION {
        return Err(EcsError::SnapshotVersionUnsupported(version));
    }
    let entity_count = reader.u32()?;
    let archetype_count = reader.u32()?;
    let timestamp = reader.u64()?;
    let checksum = reader.u32()?;
    reader.skip_to(HEADER_LEN)?;
    Ok(SnapshotHeader {
        version,
        entity_count,
        archetype_count,
        timestamp,
        checksum,
    })
}

/// The checksum fold over a world's live tables, as stored in a header
/// written from that world.
pub fn checksum(world: &World) -> u32 {
    let mut hash = FNV_OFFSET;
    hash = fnv_fold(hash, world.entity_count() as u32);
    hash = fnv_fold(hash, world.archetype_count() as u32);
    for archetype in world.archetypes() {
        hash = fnv_fold(hash, archetype.id());
        hash = fnv_fold(hash, archetype.len() as u32);
        hash = fnv_fold(hash, archetype.component_types().len() as u32);
        for &id in archetype.component_types() {
            hash = fnv_fold(hash, id.index() as u32);
        }
    }
    hash
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize the world. `timestamp` is stored verbatim in the header and
/// never validated on load.
pub fn save(world: &World, timestamp: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 64 * world.entity_count());

    put_u32(&mut out, SNAPSHOT_MAGIC);
    put_u32(&mut out, SNAPSHOT_VERSION);
    put_u32(&mut out, world.entity_count() as u32);
    put_u32(&mut out, world.archetype_count() as u32);
    put_u64(&mut out, timestamp);
    put_u32(&mut out, checksum(world));
    out.resize(HEADER_LEN, 0);

    // Type table: every type referenced by an archetype, ascending.
    let mut used: Vec<ComponentId> = Vec::new();
    for archetype in world.archetypes() {
        for &id in archetype.component_types() {
            if !used.contains(&id) {
                used.push(id);
            }
        }
    }
    used.sort();
    put_u32(&mut out, used.len() as u32);
    for id in used {
        let meta = registry::meta(id);
        put_u32(&mut out, id.index() as u32);
        put_u32(&mut out, meta.name.len() as u32);
        out.extend_from_slice(meta.name.as_bytes());
    }

    // Archetype blocks in id order.
    for archetype in world.archetypes() {
        // Rows sorted by entity id for a deterministic, bit-exact encoding.
        let mut rows: Vec<(Entity, u32)> = Vec::with_capacity(archetype.len());
        for (chunk_index, chunk) in archetype.chunks().iter().enumerate() {
            for (local, &entity) in chunk.entities().iter().enumerate() {
                rows.push((
                    entity,
                    (chunk_index * chunk.capacity() + local) as u32,
                ));
            }
        }
        rows.sort_by_key(|&(entity, _)| entity.id());

        let types = archetype.component_types();
        let row_bytes: usize = types
            .iter()
            .map(|&id| registry::meta(id).size)
            .sum();
        let data_len = 4 * types.len() + 8 * rows.len() + row_bytes * rows.len();

        put_u32(&mut out, archetype.id());
        put_u32(&mut out, types.len() as u32);
        put_u32(&mut out, rows.len() as u32);
        put_u32(&mut out, data_len as u32);
        for &id in types {
            put_u32(&mut out, id.index() as u32);
        }
        for &(entity, _) in &rows {
            put_u64(&mut out, entity.to_bits());
        }
        for &id in types {
            for &(_, row) in &rows {
                let (chunk, local) = split_row(row);
                if let Some(bytes) = archetype.chunks()[chunk].component_bytes(id, local) {
                    out.extend_from_slice(bytes);
                }
            }
        }
    }

    out
}

/// Serialize the world to a file.
pub fn save_to_file(world: &World, path: &Path, timestamp: u64) -> Result<()> {
    fs::write(path, save(world, timestamp))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

struct StagedArchetype {
    signature: Signature,
    entities: Vec<Entity>,
    /// Host component id -> column bytes in entity order.
    columns: Vec<(ComponentId, Vec<u8>)>,
}

/// Restore `world` from a snapshot buffer, overwriting the directory and all
/// archetypes wholesale.
///
/// Atomic: on any error the world is left exactly as it was. Types are
/// resolved by name against the process registry, so the host must have
/// registered every component type the snapshot references.
pub fn restore(world: &mut World, bytes: &[u8]) -> Result<()> {
    let staged = stage(bytes).inspect_err(
        |err| warn!(error = %err, "snapshot restore rejected; world unchanged"),
    )?;
    commit(world, staged);
    Ok(())
}

/// Restore from a snapshot file.
pub fn load_from_file(world: &mut World, path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    restore(world, &bytes)
}

/// Parse and validate the whole buffer without touching any world state.
fn stage(bytes: &[u8]) -> Result<Vec<StagedArchetype>> {
    let header = peek_header(bytes)?;
    let mut reader = Reader::new(bytes);
    reader.skip_to(HEADER_LEN)?;

    // Type table: snapshot id -> host id, resolved by name.
    let type_count = reader.u32()?;
    let mut id_map: AHashMap<u32, ComponentId> = AHashMap::with_capacity(type_count as usize);
    for _ in 0..type_count {
        let snapshot_id = reader.u32()?;
        let name_len = reader.u32()? as usize;
        let name = std::str::from_utf8(reader.bytes(name_len)?)
            .map_err(|_| EcsError::SnapshotTruncated)?;
        let host_id = registry::lookup_name(name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_string()))?;
        if id_map.insert(snapshot_id, host_id).is_some() {
            return Err(EcsError::SnapshotTruncated);
        }
    }

    let mut computed = FNV_OFFSET;
    computed = fnv_fold(computed, header.entity_count);
    computed = fnv_fold(computed, header.archetype_count);

    let mut staged: Vec<StagedArchetype> = Vec::with_capacity(header.archetype_count as usize);
    let mut seen_signatures: AHashMap<Signature, ()> = AHashMap::new();
    let mut seen_entities: AHashMap<u32, ()> = AHashMap::with_capacity(header.entity_count as usize);
    let mut total_entities = 0u64;

    for expected_id in 0..header.archetype_count {
        let id = reader.u32()?;
        if id != expected_id {
            return Err(EcsError::SnapshotTruncated);
        }
        let component_count = reader.u32()? as usize;
        let entity_count = reader.u32()? as usize;
        let data_len = reader.u32()? as usize;
        let block_start = reader.position();

        computed = fnv_fold(computed, id);
        computed = fnv_fold(computed, entity_count as u32);
        computed = fnv_fold(computed, component_count as u32);

        let mut host_types = Vec::with_capacity(component_count);
        let mut signature = Signature::empty();
        for _ in 0..component_count {
            let snapshot_type = reader.u32()?;
            computed = fnv_fold(computed, snapshot_type);
            let host = *id_map
                .get(&snapshot_type)
                .ok_or(EcsError::SnapshotTruncated)?;
            if signature.has(host) {
                return Err(EcsError::SnapshotTruncated);
            }
            signature = signature.with(host);
            host_types.push(host);
        }

        let mut entities = Vec::with_capacity(entity_count);
        let mut previous_id = 0u32;
        for _ in 0..entity_count {
            let entity = Entity::from_bits(reader.u64()?);
            // Stored sorted by id; ids are non-null and globally unique.
            if entity.id() == 0 || entity.id() <= previous_id {
                return Err(EcsError::SnapshotTruncated);
            }
            previous_id = entity.id();
            if seen_entities.insert(entity.id(), ()).is_some() {
                return Err(EcsError::SnapshotTruncated);
            }
            entities.push(entity);
        }
        total_entities += entity_count as u64;

        let mut columns = Vec::with_capacity(component_count);
        for &host in &host_types {
            let size = registry::meta(host).size;
            let data = reader.bytes(size * entity_count)?.to_vec();
            columns.push((host, data));
        }

        if reader.position() - block_start != data_len {
            return Err(EcsError::SnapshotTruncated);
        }
        if seen_signatures.insert(signature.clone(), ()).is_some() {
            return Err(EcsError::SnapshotTruncated);
        }
        staged.push(StagedArchetype {
            signature,
            entities,
            columns,
        });
    }

    if reader.remaining() != 0 {
        return Err(EcsError::SnapshotTruncated);
    }
    if total_entities != header.entity_count as u64 {
        return Err(EcsError::SnapshotTruncated);
    }
    // The world always carries the empty archetype at id 0.
    match staged.first() {
        Some(first) if first.signature.is_empty() => {}
        _ => return Err(EcsError::SnapshotTruncated),
    }
    if computed != header.checksum {
        return Err(EcsError::SnapshotChecksumMismatch {
            stored: header.checksum,
            computed,
        });
    }

    Ok(staged)
}

/// Rebuild the world from validated staging. Infallible by construction:
/// signatures are unique, entity ids are unique and non-null, and column
/// byte lengths match their counts.
fn commit(world: &mut World, staged: Vec<StagedArchetype>) {
    let max_id = staged
        .iter()
        .flat_map(|archetype| archetype.entities.iter())
        .map(|entity| entity.id())
        .max()
        .unwrap_or(0);

    world.reset_storage();
    world.directory.reset_with_capacity(max_id as usize);

    for block in staged {
        let archetype_id = world.ensure_archetype(block.signature);
        let archetype = &mut world.archetypes[archetype_id as usize];
        let mut rows = Vec::with_capacity(block.entities.len());
        for &entity in &block.entities {
            let row = archetype.add_entity(entity);
            rows.push(row);
            world.directory.install(
                entity,
                EntityLocation {
                    archetype: archetype_id,
                    row,
                },
            );
        }
        for (id, data) in block.columns {
            let size = registry::meta(id).size;
            if size == 0 {
                continue;
            }
            for (index, &row) in rows.iter().enumerate() {
                let (chunk, local) = split_row(row);
                archetype.chunks_mut()[chunk].write_bytes(
                    id,
                    local,
                    &data[index * size..(index + 1) * size],
                );
            }
        }
    }

    world.directory.finish_restore();
}

// ---------------------------------------------------------------------------
// Little-endian plumbing
// ---------------------------------------------------------------------------

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, position: 0 }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(EcsError::SnapshotTruncated)?;
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.bytes(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let raw = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf))
    }

    fn skip_to(&mut self, offset: usize) -> Result<()> {
        if offset < self.position || offset > self.bytes.len() {
            return Err(EcsError::SnapshotTruncated);
        }
        self.position = offset;
        Ok(())
    }
}
