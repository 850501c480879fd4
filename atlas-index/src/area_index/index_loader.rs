//! Index file parsing and integrity verification.
//!
//! Loading is eager and fail-closed: the whole tree is decoded into the
//! per-level arenas in one pass, every declared block boundary is enforced,
//! and raw child offsets are resolved into dense entry ids before the index
//! becomes visible to callers. The query engine assumes a structurally
//! sound tree as a precondition, so nothing half-parsed ever leaves this
//! module.

use indexmap::IndexMap;

use super::index_constants::{CHILD_COUNT, NO_OFFSET};
use super::index_scanner::Scanner;
use super::index_types::{
    EntryId, FileOffset, IndexEntry, IndexError, IndexHeader, IndexLevel, IndexResult, OffsetList,
    TypedOffsets,
};

/// One parsed level whose child links are still raw file offsets.
#[derive(Debug)]
pub(crate) struct RawLevel {
    pub entries: IndexLevel,
    /// Per entry (arena order), the four on-disk child offsets.
    pub child_offsets: Vec<[FileOffset; CHILD_COUNT]>,
}

/// Reads and structurally validates the file header.
pub(crate) fn read_header(scanner: &mut Scanner<'_>) -> IndexResult<IndexHeader> {
    let magic = scanner.read_u32()?;
    let version = scanner.read_u32()?;
    let max_level = scanner.read_u32()?;

    // Magic and version are checked by validate() below, but an implausible
    // level count must be rejected before it sizes any allocation.
    let header = IndexHeader {
        magic,
        version,
        max_level,
        cell_width: Vec::new(),
        cell_height: Vec::new(),
    };
    header.validate_identity()?;

    let mut cell_width = Vec::with_capacity(max_level as usize + 1);
    let mut cell_height = Vec::with_capacity(max_level as usize + 1);
    for _ in 0..=max_level {
        cell_width.push(scanner.read_f64()?);
        cell_height.push(scanner.read_f64()?);
    }

    let header = IndexHeader {
        magic,
        version,
        max_level,
        cell_width,
        cell_height,
    };
    header.validate()?;
    Ok(header)
}

/// Reads all level blocks in depth order.
///
/// Verifies that each level consumes exactly its declared block length,
/// that nothing trails the last block, and that level 0 holds exactly the
/// root entry.
pub(crate) fn read_levels(
    scanner: &mut Scanner<'_>,
    header: &IndexHeader,
) -> IndexResult<Vec<RawLevel>> {
    let mut levels = Vec::with_capacity(header.max_level as usize + 1);
    for level in 0..=header.max_level {
        let raw = read_level(scanner, level)?;
        log::debug!("level {}: {} entries", level, raw.entries.len());
        levels.push(raw);
    }

    if scanner.remaining() != 0 {
        return Err(IndexError::format(format!(
            "{} trailing bytes after the last level block",
            scanner.remaining()
        )));
    }
    if levels[0].entries.len() != 1 {
        return Err(IndexError::format(format!(
            "level 0 must hold exactly the root entry, found {}",
            levels[0].entries.len()
        )));
    }
    Ok(levels)
}

fn read_level(scanner: &mut Scanner<'_>, level: u32) -> IndexResult<RawLevel> {
    let entry_count = scanner.read_u32()?;
    let block_len = scanner.read_u64()?;
    let block_start = scanner.position();

    // Counts come from the file; cap the pre-allocation so a corrupt count
    // cannot size an absurd buffer before the boundary checks catch it.
    let reserve = entry_count.min(1 << 16) as usize;
    let mut entries: IndexLevel = IndexMap::with_capacity(reserve);
    let mut child_offsets = Vec::with_capacity(reserve);

    for _ in 0..entry_count {
        let key = scanner.position();
        let (entry, children) = read_entry(scanner)?;

        let consumed = scanner.position() - block_start;
        if consumed > block_len {
            return Err(IndexError::format(format!(
                "entry at offset {} runs {} bytes past the block boundary of level {}",
                key,
                consumed - block_len,
                level
            )));
        }

        // Keys are strictly increasing stream positions, so they are unique
        // within the level by construction.
        entries.insert(key, entry);
        child_offsets.push(children);
    }

    let consumed = scanner.position() - block_start;
    if consumed != block_len {
        return Err(IndexError::format(format!(
            "level {} block declares {} bytes but its entries span {}",
            level, block_len, consumed
        )));
    }

    Ok(RawLevel {
        entries,
        child_offsets,
    })
}

fn read_entry(scanner: &mut Scanner<'_>) -> IndexResult<(IndexEntry, [FileOffset; CHILD_COUNT])> {
    let mut children = [NO_OFFSET; CHILD_COUNT];
    for slot in children.iter_mut() {
        *slot = scanner.read_u64()?;
    }

    let ways = read_type_groups(scanner)?;
    let rel_ways = read_type_groups(scanner)?;
    let areas = read_offset_list(scanner)?;
    let rel_areas = read_offset_list(scanner)?;

    let entry = IndexEntry {
        children: [None; CHILD_COUNT],
        ways,
        rel_ways,
        areas,
        rel_areas,
    };
    Ok((entry, children))
}

fn read_type_groups(scanner: &mut Scanner<'_>) -> IndexResult<Vec<TypedOffsets>> {
    let group_count = scanner.read_u32()?;
    let mut groups = Vec::with_capacity(group_count.min(1024) as usize);
    let mut previous_type = None;
    for _ in 0..group_count {
        let type_id = scanner.read_u16()?;
        if let Some(previous) = previous_type {
            if type_id <= previous {
                return Err(IndexError::format(format!(
                    "type groups out of order at offset {} ({} after {})",
                    scanner.position(),
                    type_id,
                    previous
                )));
            }
        }
        previous_type = Some(type_id);
        let offsets = read_offset_list(scanner)?;
        groups.push(TypedOffsets { type_id, offsets });
    }
    Ok(groups)
}

fn read_offset_list(scanner: &mut Scanner<'_>) -> IndexResult<OffsetList> {
    let count = scanner.read_u32()?;
    let mut offsets = OffsetList::new();
    for _ in 0..count {
        offsets.push(scanner.read_u64()?);
    }
    Ok(offsets)
}

/// Resolves every raw child offset into a dense id in the next level's
/// arena.
///
/// A non-zero child offset that does not key an entry one level deeper is
/// a structural error, as is any child reference on the deepest level.
pub(crate) fn link_levels(mut raw: Vec<RawLevel>) -> IndexResult<Vec<IndexLevel>> {
    let level_count = raw.len();
    for depth in 0..level_count {
        let (current_levels, deeper_levels) = raw.split_at_mut(depth + 1);
        let current = &mut current_levels[depth];
        let next = deeper_levels.first();

        for (index, (_, entry)) in current.entries.iter_mut().enumerate() {
            for (slot, &child_offset) in current.child_offsets[index].iter().enumerate() {
                if child_offset == NO_OFFSET {
                    continue;
                }
                let next = next.ok_or_else(|| {
                    IndexError::format(format!(
                        "entry at the deepest level {} declares a child in quadrant {}",
                        depth, slot
                    ))
                })?;
                let child_id = next.entries.get_index_of(&child_offset).ok_or_else(|| {
                    IndexError::format(format!(
                        "dangling child reference: offset {} (level {}, quadrant {}) \
                         has no entry at level {}",
                        child_offset,
                        depth,
                        slot,
                        depth + 1
                    ))
                })?;
                entry.children[slot] = Some(child_id as EntryId);
            }
        }
    }

    Ok(raw.into_iter().map(|level| level.entries).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area_index::index_constants::{INDEX_MAGIC, INDEX_VERSION};

    // Minimal byte-level emitters so loader tests do not depend on the
    // integration crate's reference writer.
    fn push_u16(buf: &mut Vec<u8>, value: u16) {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    fn push_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    fn push_u64(buf: &mut Vec<u8>, value: u64) {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    fn push_f64(buf: &mut Vec<u8>, value: f64) {
        buf.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    fn header_bytes(max_level: u32, root_width: f64, root_height: f64) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, INDEX_MAGIC);
        push_u32(&mut buf, INDEX_VERSION);
        push_u32(&mut buf, max_level);
        for level in 0..=max_level {
            let factor = (1u64 << level) as f64;
            push_f64(&mut buf, root_width / factor);
            push_f64(&mut buf, root_height / factor);
        }
        buf
    }

    /// An entry with no children and no references: 4 child slots, two
    /// empty group lists, two empty offset lists.
    fn empty_entry_bytes(children: [u64; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        for child in children {
            push_u64(&mut buf, child);
        }
        push_u32(&mut buf, 0); // ways groups
        push_u32(&mut buf, 0); // rel_ways groups
        push_u32(&mut buf, 0); // areas
        push_u32(&mut buf, 0); // rel_areas
        buf
    }

    fn block_bytes(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, entries.len() as u32);
        let body_len: usize = entries.iter().map(Vec::len).sum();
        push_u64(&mut buf, body_len as u64);
        for entry in entries {
            buf.extend_from_slice(entry);
        }
        buf
    }

    #[test]
    fn test_read_header_roundtrip() {
        let buf = header_bytes(2, 16.0, 8.0);
        let mut scanner = Scanner::new(&buf);
        let header = read_header(&mut scanner).unwrap();
        assert_eq!(header.max_level, 2);
        assert_eq!(header.cell_width, vec![16.0, 8.0, 4.0]);
        assert_eq!(header.cell_height, vec![8.0, 4.0, 2.0]);
        assert_eq!(scanner.remaining(), 0);
    }

    #[test]
    fn test_read_header_rejects_bad_magic() {
        let mut buf = header_bytes(0, 4.0, 4.0);
        buf[0] = 0;
        let mut scanner = Scanner::new(&buf);
        assert!(matches!(
            read_header(&mut scanner),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_read_header_rejects_absurd_level_count() {
        let mut buf = Vec::new();
        push_u32(&mut buf, INDEX_MAGIC);
        push_u32(&mut buf, INDEX_VERSION);
        push_u32(&mut buf, u32::MAX); // must not be used to size a Vec
        let mut scanner = Scanner::new(&buf);
        assert!(matches!(
            read_header(&mut scanner),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_read_header_truncated_is_io() {
        let buf = header_bytes(1, 4.0, 4.0);
        let mut scanner = Scanner::new(&buf[..buf.len() - 3]);
        assert!(matches!(read_header(&mut scanner), Err(IndexError::Io(_))));
    }

    #[test]
    fn test_read_levels_single_root() {
        let mut buf = header_bytes(0, 4.0, 4.0);
        let header_end = buf.len();
        buf.extend_from_slice(&block_bytes(&[empty_entry_bytes([0; 4])]));

        let mut scanner = Scanner::new(&buf);
        let header = read_header(&mut scanner).unwrap();
        assert_eq!(scanner.position() as usize, header_end);
        let levels = read_levels(&mut scanner, &header).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].entries.len(), 1);
        // The root is keyed by the position right after the block prelude
        let root_key = (header_end + 12) as FileOffset;
        assert!(levels[0].entries.contains_key(&root_key));
    }

    #[test]
    fn test_read_levels_rejects_block_length_mismatch() {
        let mut buf = header_bytes(0, 4.0, 4.0);
        let mut block = block_bytes(&[empty_entry_bytes([0; 4])]);
        // Declare one byte more than the entry actually spans
        let declared = u64::from_le_bytes(block[4..12].try_into().unwrap()) + 1;
        block[4..12].copy_from_slice(&declared.to_le_bytes());
        // Pad so the scanner does not hit EOF first
        block.push(0);
        buf.extend_from_slice(&block);

        let mut scanner = Scanner::new(&buf);
        let header = read_header(&mut scanner).unwrap();
        let err = read_levels(&mut scanner, &header).unwrap_err();
        assert!(matches!(err, IndexError::Format(_)));
    }

    #[test]
    fn test_read_levels_rejects_record_overrun() {
        let mut buf = header_bytes(0, 4.0, 4.0);
        let mut block = block_bytes(&[empty_entry_bytes([0; 4])]);
        // Declare one byte fewer: the single record now crosses the boundary
        let declared = u64::from_le_bytes(block[4..12].try_into().unwrap()) - 1;
        block[4..12].copy_from_slice(&declared.to_le_bytes());
        buf.extend_from_slice(&block);

        let mut scanner = Scanner::new(&buf);
        let header = read_header(&mut scanner).unwrap();
        let err = read_levels(&mut scanner, &header).unwrap_err();
        assert!(matches!(err, IndexError::Format(_)));
    }

    #[test]
    fn test_read_levels_rejects_trailing_bytes() {
        let mut buf = header_bytes(0, 4.0, 4.0);
        buf.extend_from_slice(&block_bytes(&[empty_entry_bytes([0; 4])]));
        buf.push(0xFF);

        let mut scanner = Scanner::new(&buf);
        let header = read_header(&mut scanner).unwrap();
        assert!(matches!(
            read_levels(&mut scanner, &header),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_read_levels_rejects_multiple_roots() {
        let mut buf = header_bytes(0, 4.0, 4.0);
        buf.extend_from_slice(&block_bytes(&[
            empty_entry_bytes([0; 4]),
            empty_entry_bytes([0; 4]),
        ]));

        let mut scanner = Scanner::new(&buf);
        let header = read_header(&mut scanner).unwrap();
        assert!(matches!(
            read_levels(&mut scanner, &header),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_read_entry_with_references() {
        let mut buf = Vec::new();
        for child in [0u64, 0, 0, 0] {
            push_u64(&mut buf, child);
        }
        // ways: two groups, ascending type order
        push_u32(&mut buf, 2);
        push_u16(&mut buf, 3);
        push_u32(&mut buf, 1);
        push_u64(&mut buf, 0x100);
        push_u16(&mut buf, 9);
        push_u32(&mut buf, 2);
        push_u64(&mut buf, 0x200);
        push_u64(&mut buf, 0x300);
        // rel_ways: none
        push_u32(&mut buf, 0);
        // areas: one
        push_u32(&mut buf, 1);
        push_u64(&mut buf, 0x400);
        // rel_areas: none
        push_u32(&mut buf, 0);

        let mut scanner = Scanner::new(&buf);
        let (entry, children) = read_entry(&mut scanner).unwrap();
        assert_eq!(children, [0; 4]);
        assert_eq!(entry.ways.len(), 2);
        assert_eq!(entry.ways[0].type_id, 3);
        assert_eq!(entry.ways[0].offsets.as_slice(), &[0x100]);
        assert_eq!(entry.ways[1].type_id, 9);
        assert_eq!(entry.ways[1].offsets.as_slice(), &[0x200, 0x300]);
        assert!(entry.rel_ways.is_empty());
        assert_eq!(entry.areas.as_slice(), &[0x400]);
        assert!(entry.rel_areas.is_empty());
        assert_eq!(scanner.remaining(), 0);
    }

    #[test]
    fn test_read_entry_rejects_unordered_type_groups() {
        let mut buf = Vec::new();
        for _ in 0..4 {
            push_u64(&mut buf, 0);
        }
        push_u32(&mut buf, 2);
        push_u16(&mut buf, 9);
        push_u32(&mut buf, 0);
        push_u16(&mut buf, 3); // out of order
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);

        let mut scanner = Scanner::new(&buf);
        assert!(matches!(
            read_entry(&mut scanner),
            Err(IndexError::Format(_))
        ));
    }

    #[test]
    fn test_link_levels_resolves_children() {
        // Level 0: root with one NE child; level 1: that child.
        let mut root_level: IndexLevel = IndexMap::new();
        root_level.insert(100, IndexEntry::default());
        let mut child_level: IndexLevel = IndexMap::new();
        child_level.insert(500, IndexEntry::default());

        let raw = vec![
            RawLevel {
                entries: root_level,
                child_offsets: vec![[0, 500, 0, 0]],
            },
            RawLevel {
                entries: child_level,
                child_offsets: vec![[0; 4]],
            },
        ];

        let levels = link_levels(raw).unwrap();
        let root = &levels[0][0];
        assert_eq!(root.children, [None, Some(0), None, None]);
        assert_eq!(levels[1][0].children, [None; 4]);
    }

    #[test]
    fn test_link_levels_rejects_dangling_child() {
        let mut root_level: IndexLevel = IndexMap::new();
        root_level.insert(100, IndexEntry::default());
        let child_level: IndexLevel = IndexMap::new();

        let raw = vec![
            RawLevel {
                entries: root_level,
                child_offsets: vec![[0, 500, 0, 0]],
            },
            RawLevel {
                entries: child_level,
                child_offsets: vec![],
            },
        ];

        let err = link_levels(raw).unwrap_err();
        assert!(matches!(err, IndexError::Format(_)));
        assert!(err.to_string().contains("dangling"));
    }

    #[test]
    fn test_link_levels_rejects_child_on_deepest_level() {
        let mut root_level: IndexLevel = IndexMap::new();
        root_level.insert(100, IndexEntry::default());

        let raw = vec![RawLevel {
            entries: root_level,
            child_offsets: vec![[0, 0, 0, 77]],
        }];

        assert!(matches!(link_levels(raw), Err(IndexError::Format(_))));
    }
}
