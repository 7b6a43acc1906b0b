//! L2: inode and block allocation.
//!
//! `mkfs`'s `fill_bitmap` marks a contiguous run of bits used when formatting; here the
//! same bitmaps are scanned at run time to find and claim (or release) a single free
//! slot. Unlike the original C checker, which treats reserved inodes 1-10 as simply
//! pre-marked in the bitmap, allocation here skips that range explicitly so a corrupted
//! bitmap can never hand out a reserved inode number (see REDESIGN FLAGS).

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Claims the first free inode at or after the first non-reserved inode number and
/// marks it used, decrementing the free-inode counters. Returns the 1-based inode
/// number.
pub fn alloc_inode<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>) -> Result<u32> {
    let sb = vol.superblock();
    let start = sb.first_non_reserved_inode.max(1);
    for num in start..=sb.total_inodes {
        if !vol.inode_bitmap_bit(num) {
            mark_inode_used(vol, num);
            return Ok(num);
        }
    }
    Err(Error::NoSpace)
}

/// Claims the first free data block and marks it used, decrementing the free-block
/// counters. Returns the 1-based block number.
pub fn alloc_block<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>) -> Result<u32> {
    let sb = vol.superblock();
    for num in 1..=sb.total_blocks {
        if !vol.block_bitmap_bit(num) {
            mark_block_used(vol, num);
            return Ok(num);
        }
    }
    Err(Error::NoSpace)
}

/// Marks inode `num` used in the bitmap and decrements the free-inode counters. Used
/// both by [`alloc_inode`] and by `restore` when re-claiming a previously freed inode
/// whose bit the checker found cleared.
pub fn mark_inode_used<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, num: u32) {
    if vol.inode_bitmap_bit(num) {
        return;
    }
    vol.set_inode_bitmap_bit(num, true);
    let mut sb = vol.superblock();
    sb.total_unallocated_inodes -= 1;
    vol.set_superblock(&sb);
    let mut gd = vol.group_desc();
    gd.free_inodes -= 1;
    vol.set_group_desc(&gd);
}

/// Marks inode `num` free in the bitmap and increments the free-inode counters.
pub fn mark_inode_free<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, num: u32) {
    if !vol.inode_bitmap_bit(num) {
        return;
    }
    vol.set_inode_bitmap_bit(num, false);
    let mut sb = vol.superblock();
    sb.total_unallocated_inodes += 1;
    vol.set_superblock(&sb);
    let mut gd = vol.group_desc();
    gd.free_inodes += 1;
    vol.set_group_desc(&gd);
}

/// Marks block `num` used in the bitmap and decrements the free-block counters.
pub fn mark_block_used<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, num: u32) {
    if vol.block_bitmap_bit(num) {
        return;
    }
    vol.set_block_bitmap_bit(num, true);
    let mut sb = vol.superblock();
    sb.total_unallocated_blocks -= 1;
    vol.set_superblock(&sb);
    let mut gd = vol.group_desc();
    gd.free_blocks -= 1;
    vol.set_group_desc(&gd);
}

/// Marks inode `num` used, failing instead of silently doing nothing if the bit is
/// already set. Used by `restore`, where a set bit means the inode has been reused by
/// something else since it was freed and recovery is impossible, matching
/// `restore_inode_bitmap`'s `return -1` on an already-set bit.
pub fn try_mark_inode_used<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, num: u32) -> Result<()> {
    if vol.inode_bitmap_bit(num) {
        return Err(Error::NotRecoverable);
    }
    mark_inode_used(vol, num);
    Ok(())
}

/// Marks block `num` used, failing instead of silently doing nothing if the bit is
/// already set, mirroring `restore_block_bitmap`'s `return -1` on an already-set bit.
pub fn try_mark_block_used<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, num: u32) -> Result<()> {
    if vol.block_bitmap_bit(num) {
        return Err(Error::NotRecoverable);
    }
    mark_block_used(vol, num);
    Ok(())
}

/// Marks block `num` free in the bitmap and increments the free-block counters.
pub fn mark_block_free<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, num: u32) {
    if !vol.block_bitmap_bit(num) {
        return;
    }
    vol.set_block_bitmap_bit(num, false);
    let mut sb = vol.superblock();
    sb.total_unallocated_blocks += 1;
    vol.set_superblock(&sb);
    let mut gd = vol.group_desc();
    gd.free_blocks += 1;
    vol.set_group_desc(&gd);
}
