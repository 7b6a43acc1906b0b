//! L3: inode data block lists (direct pointers plus the singly-indirect block).
//!
//! Every file and directory in this toolkit stays well under the 12-direct-pointer
//! limit in ordinary use, but the singly-indirect pointer (slot 12, up to 256 further
//! block numbers) is implemented in full since nothing in the data model rules it out.

use crate::alloc::{alloc_block, mark_block_free};
use crate::error::Result;
use crate::layout::{RawInode, INDIRECT_PTRS_PER_BLOCK};
use crate::volume::Volume;

/// Returns the data block numbers referenced by `inode`, in logical order. Does not
/// include the indirect block itself.
pub fn read_block_list<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &Volume<B>, inode: &RawInode) -> Vec<u32> {
    let count = inode.data_block_count();
    let mut list = Vec::with_capacity(count as usize);
    let direct = count.min(12);
    for i in 0..direct {
        list.push(inode.block[i as usize]);
    }
    if inode.has_indirect() {
        let indirect = inode.block[12];
        let remaining = count - direct;
        let ib = vol.block(indirect);
        for i in 0..remaining {
            let off = i as usize * 4;
            let ptr = u32::from_le_bytes(ib[off..off + 4].try_into().unwrap());
            list.push(ptr);
        }
    }
    list
}

/// Appends `block` as the next data block of `inode`, allocating an indirect block
/// first if the 12 direct pointers are already in use. Updates `inode.blocks`
/// in place; the caller is responsible for writing `inode` back to the volume.
pub fn append_block<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    inode: &mut RawInode,
    block: u32,
) -> Result<()> {
    let count = inode.data_block_count();
    if count < 12 {
        inode.block[count as usize] = block;
        inode.blocks += 2;
        return Ok(());
    }

    if !inode.has_indirect() {
        let indirect = alloc_block(vol)?;
        inode.block[12] = indirect;
        inode.blocks += 2;
        vol.block_mut(indirect).fill(0);
    }

    let idx = count - 12;
    debug_assert!(idx < INDIRECT_PTRS_PER_BLOCK);
    let indirect = inode.block[12];
    let off = idx as usize * 4;
    vol.block_mut(indirect)[off..off + 4].copy_from_slice(&block.to_le_bytes());
    inode.blocks += 2;
    Ok(())
}

/// Frees every block referenced by `inode` — its data blocks and, if present, its
/// indirect block — and zeroes `inode.blocks`/the direct pointer array. The caller is
/// responsible for writing `inode` back.
pub fn free_all_blocks<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, inode: &mut RawInode) {
    mark_blocks_free_keep_pointers(vol, inode);
    inode.block = [0; 15];
    inode.blocks = 0;
}

/// Clears the bitmap bits for every block referenced by `inode` without touching the
/// inode's pointer fields, so `restore` can later re-mark the same blocks used from
/// the still-intact block list.
pub fn mark_blocks_free_keep_pointers<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    inode: &RawInode,
) {
    for b in read_block_list(vol, inode) {
        mark_block_free(vol, b);
    }
    if inode.has_indirect() {
        mark_block_free(vol, inode.block[12]);
    }
}

/// Re-marks used every block referenced by `inode`'s still-intact pointer fields,
/// undoing [`mark_blocks_free_keep_pointers`]. Fails at the first block whose bitmap
/// bit is already set — meaning the block has since been handed out to something else
/// and the original data cannot be recovered — rather than silently skipping it.
pub fn try_mark_blocks_used_from_pointers<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    inode: &RawInode,
) -> Result<()> {
    for b in read_block_list(vol, inode) {
        crate::alloc::try_mark_block_used(vol, b)?;
    }
    if inode.has_indirect() {
        crate::alloc::try_mark_block_used(vol, inode.block[12])?;
    }
    Ok(())
}
