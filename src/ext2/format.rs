//! Pristine-image construction, grounded in `mkfs`'s `Ext2Factory`. Not a command this
//! toolkit exposes on its own — `mkfs` is a separate concern the original programs
//! never touch either — but every test in this crate needs a freshly formatted image
//! to operate on, so this module builds one the way `Ext2Factory::create` builds its
//! superblock, group descriptor table, and bitmaps, then uses this crate's own
//! directory-entry and allocator code to lay down `/` and `/lost+found`, the same two
//! objects a real `mkfs.ext2` always creates.

use crate::alloc::{alloc_block, alloc_inode};
use crate::blocklist::append_block;
use crate::dirent::{init_dir_block, insert};
use crate::layout::{
    GroupDesc, RawInode, Superblock, BLOCK_SIZE, EXT2_SIGNATURE, FT_DIR, INODE_SIZE, ROOT_INODE,
    S_IFDIR, TOTAL_BLOCKS, VOLUME_SIZE,
};
use crate::volume::Volume;

/// Number of inodes this fixture's single block group provides. Small enough to keep
/// the inode table compact, large enough to leave headroom for tests that allocate
/// several files.
const TOTAL_INODES: u32 = 32;

/// `lost+found`'s well-known inode number in a freshly formatted image: the first
/// inode `alloc_inode` hands out once inodes 1-10 are reserved.
pub const LOST_AND_FOUND_INODE: u32 = 11;

const BLOCK_BITMAP_BLOCK: u32 = 3;
const INODE_BITMAP_BLOCK: u32 = 4;
const INODE_TABLE_BLOCK: u32 = 5;

/// Builds a freshly formatted, 128 KiB, 1 KiB-block image containing only `/` and
/// `/lost+found`, as raw bytes ready to back a [`Volume`].
pub fn format_fixture() -> Vec<u8> {
    let inode_table_blocks =
        ((TOTAL_INODES as u64 * INODE_SIZE) + BLOCK_SIZE - 1) / BLOCK_SIZE;
    let metadata_blocks = INODE_TABLE_BLOCK as u64 + inode_table_blocks - 1;
    let reserved_inodes = 10u32;

    let sb = Superblock {
        total_inodes: TOTAL_INODES,
        total_blocks: TOTAL_BLOCKS,
        total_unallocated_blocks: TOTAL_BLOCKS - metadata_blocks as u32,
        total_unallocated_inodes: TOTAL_INODES - reserved_inodes,
        superblock_block_number: 1,
        blocks_per_group: TOTAL_BLOCKS,
        fragments_per_group: TOTAL_BLOCKS,
        inodes_per_group: TOTAL_INODES,
        signature: EXT2_SIGNATURE,
        fs_state: 1,
        first_non_reserved_inode: reserved_inodes + 1,
        inode_size: INODE_SIZE as u16,
        ..Superblock::default()
    };

    let gd = GroupDesc {
        block_bitmap: BLOCK_BITMAP_BLOCK,
        inode_bitmap: INODE_BITMAP_BLOCK,
        inode_table: INODE_TABLE_BLOCK,
        free_blocks: sb.total_unallocated_blocks as u16,
        free_inodes: sb.total_unallocated_inodes as u16,
        used_dirs: 0,
        ..GroupDesc::default()
    };

    let mut vol = Volume::new(vec![0u8; VOLUME_SIZE as usize]);
    vol.set_superblock(&sb);
    vol.set_group_desc(&gd);

    for b in 1..=metadata_blocks as u32 {
        vol.set_block_bitmap_bit(b, true);
    }
    for i in 1..=reserved_inodes {
        vol.set_inode_bitmap_bit(i, true);
    }

    let root_block = alloc_block(&mut vol).expect("fixture has room for root's block");
    let mut root = RawInode {
        mode: S_IFDIR,
        links_count: 3,
        ..RawInode::default()
    };
    append_block(&mut vol, &mut root, root_block).unwrap();
    init_dir_block(&mut vol, root_block, ROOT_INODE, ROOT_INODE);

    let lf_num = alloc_inode(&mut vol).expect("fixture has room for lost+found's inode");
    debug_assert_eq!(lf_num, LOST_AND_FOUND_INODE);
    let lf_block = alloc_block(&mut vol).expect("fixture has room for lost+found's block");
    let mut lost_and_found = RawInode {
        mode: S_IFDIR,
        links_count: 2,
        ..RawInode::default()
    };
    append_block(&mut vol, &mut lost_and_found, lf_block).unwrap();
    vol.set_inode(lf_num, &lost_and_found);
    init_dir_block(&mut vol, lf_block, lf_num, ROOT_INODE);

    insert(&mut vol, ROOT_INODE, &mut root, b"lost+found", lf_num, FT_DIR).unwrap();
    vol.set_inode(ROOT_INODE, &root);

    let mut gd = vol.group_desc();
    gd.used_dirs = 2;
    vol.set_group_desc(&gd);

    vol.into_inner()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dirent::find;

    #[test]
    fn fixture_has_a_signature_and_a_root() {
        let vol = Volume::new(format_fixture());
        assert_eq!(vol.superblock().signature, EXT2_SIGNATURE);
        let root = vol.inode(ROOT_INODE);
        assert!(root.is_dir());
        assert_eq!(root.links_count, 3);
    }

    #[test]
    fn fixture_has_a_findable_lost_and_found() {
        let vol = Volume::new(format_fixture());
        let root = vol.inode(ROOT_INODE);
        let located = find(&vol, &root, b"lost+found").unwrap();
        assert_eq!(located.header.inode, LOST_AND_FOUND_INODE);
        let lf = vol.inode(LOST_AND_FOUND_INODE);
        assert!(lf.is_dir());
        assert_eq!(lf.links_count, 2);
    }

    #[test]
    fn fixture_free_counters_match_the_bitmaps() {
        let vol = Volume::new(format_fixture());
        assert_eq!(vol.superblock().total_unallocated_blocks, vol.count_free_blocks());
        assert_eq!(vol.superblock().total_unallocated_inodes, vol.count_free_inodes());
        assert_eq!(vol.group_desc().free_blocks as u32, vol.count_free_blocks());
        assert_eq!(vol.group_desc().free_inodes as u32, vol.count_free_inodes());
    }
}
