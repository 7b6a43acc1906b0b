//! L7: the two-phase consistency checker.
//!
//! Phase one reconciles the four free-space counters (superblock and group descriptor,
//! inodes and blocks) against what the bitmaps actually say, always trusting the
//! bitmap. Phase two walks the directory tree from the root, fixing, per inode:
//! directory-entry type vs. inode mode mismatches, inodes missing from the inode
//! bitmap, stale deletion timestamps, and data blocks missing from the block bitmap.
//!
//! Message text and fix-counting rules are taken verbatim from the reference checker:
//! a free-counter mismatch counts as one fix regardless of how far off it was, while a
//! missing-block-bitmap-bit fix is reported once per block, naming that block's own
//! index (not a count of how many were fixed for that inode).

use crate::alloc::{mark_block_used, mark_inode_used};
use crate::blocklist::read_block_list;
use crate::dirent::{raw_entries, set_entry_file_type};
use crate::layout::{FT_DIR, FT_REG_FILE, FT_SYMLINK, ROOT_INODE, S_IFDIR, S_IFLNK, S_IFREG};
use crate::volume::Volume;

/// Every line this checker can print, alongside the running fix tally.
pub struct Report {
    pub messages: Vec<String>,
    pub fixed: u32,
}

impl Report {
    fn new() -> Self {
        Self { messages: Vec::new(), fixed: 0 }
    }

    fn fix(&mut self, message: String) {
        self.fixed += 1;
        self.messages.push(message);
    }

    /// The final summary line, matching the reference checker's wording exactly.
    pub fn summary(&self) -> String {
        if self.fixed > 0 {
            format!("{} file system inconsistencies repaired!", self.fixed)
        } else {
            "No file system inconsistencies detected!".to_string()
        }
    }
}

/// Runs the full check-and-repair pass over `vol`, returning the accumulated report.
pub fn check<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>) -> Report {
    let mut report = Report::new();
    check_free_counters(vol, &mut report);
    check_inode_rec(vol, ROOT_INODE, ROOT_INODE, FT_DIR, &mut report);
    report
}

/// Phase one: reconciles the superblock's and group descriptor's free-inode and
/// free-block counters against the bitmaps, trusting the bitmaps.
fn check_free_counters<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, report: &mut Report) {
    let free_blocks = vol.count_free_blocks();
    let free_inodes = vol.count_free_inodes();

    let mut sb = vol.superblock();
    if sb.total_unallocated_blocks != free_blocks {
        let off = sb.total_unallocated_blocks.abs_diff(free_blocks);
        sb.total_unallocated_blocks = free_blocks;
        report.fix(format!(
            "Fixed: superblock's free blocks counter was off by {off} compared to the bitmap"
        ));
    }
    if sb.total_unallocated_inodes != free_inodes {
        let off = sb.total_unallocated_inodes.abs_diff(free_inodes);
        sb.total_unallocated_inodes = free_inodes;
        report.fix(format!(
            "Fixed: superblock's free inodes counter was off by {off} compared to the bitmap"
        ));
    }
    vol.set_superblock(&sb);

    let mut gd = vol.group_desc();
    if gd.free_blocks as u32 != free_blocks {
        let off = (gd.free_blocks as u32).abs_diff(free_blocks);
        gd.free_blocks = free_blocks as u16;
        report.fix(format!(
            "Fixed: block group's free blocks counter was off by {off} compared to the bitmap"
        ));
    }
    if gd.free_inodes as u32 != free_inodes {
        let off = (gd.free_inodes as u32).abs_diff(free_inodes);
        gd.free_inodes = free_inodes as u16;
        report.fix(format!(
            "Fixed: block group's free inodes counter was off by {off} compared to the bitmap"
        ));
    }
    vol.set_group_desc(&gd);
}

/// Phase two, one inode at a time: checks `curr` (reached from `parent` via a
/// directory entry typed `entry_file_type`), fixes what it can, and recurses into
/// `curr`'s live children if it is a directory.
fn check_inode_rec<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    curr: u32,
    parent: u32,
    entry_file_type: u8,
    report: &mut Report,
) {
    let inode = vol.inode(curr);
    let actual_file_type = match inode.file_type() {
        t if t == S_IFDIR => FT_DIR,
        t if t == S_IFLNK => FT_SYMLINK,
        t if t == S_IFREG => FT_REG_FILE,
        _ => return,
    };

    if actual_file_type != entry_file_type {
        report.fix(format!("Fixed: Entry type vs inode mismatch: inode [{curr}]"));
    }

    if !vol.inode_bitmap_bit(curr) {
        mark_inode_used(vol, curr);
        report.fix(format!("Fixed: inode [{curr}] not marked as in-use"));
    }

    for block in read_block_list(vol, &inode) {
        if !vol.block_bitmap_bit(block) {
            mark_block_used(vol, block);
            report.fix(format!(
                "Fixed: {block} in-use data blocks not marked in data bitmap for inode: [{curr}]"
            ));
        }
    }
    if inode.has_indirect() {
        let ib = inode.block[12];
        if !vol.block_bitmap_bit(ib) {
            mark_block_used(vol, ib);
            report.fix(format!(
                "Fixed: {ib} in-use data blocks not marked in data bitmap for inode: [{curr}]"
            ));
        }
    }

    let mut inode = vol.inode(curr);
    if inode.dtime != 0 {
        inode.dtime = 0;
        vol.set_inode(curr, &inode);
        report.fix(format!("Fixed: valid inode marked for deletion: [{curr}]"));
    }

    if actual_file_type != FT_DIR {
        return;
    }

    for block in read_block_list(vol, &inode) {
        for (offset, header) in raw_entries(vol, block) {
            if header.inode == 0 || header.inode == parent || header.inode == curr {
                continue;
            }
            if vol.inode(header.inode).dtime != 0 {
                continue;
            }
            let child_file_type = actual_child_file_type(vol, header.inode);
            if let Some(actual) = child_file_type {
                if actual != header.file_type {
                    set_entry_file_type(vol, block, offset, actual);
                }
            }
            check_inode_rec(vol, header.inode, curr, header.file_type, report);
        }
    }
}

/// Peeks at `inode_num`'s mode to pre-correct a mismatched directory entry before
/// recursing, mirroring the fix-in-place the reference checker performs through its
/// shared `ft_type_ptr` out-parameter.
fn actual_child_file_type<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &Volume<B>, inode_num: u32) -> Option<u8> {
    let inode = vol.inode(inode_num);
    match inode.file_type() {
        t if t == S_IFDIR => Some(FT_DIR),
        t if t == S_IFLNK => Some(FT_SYMLINK),
        t if t == S_IFREG => Some(FT_REG_FILE),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alloc::mark_inode_free;
    use crate::format::format_fixture;
    use crate::ops::mkdir;

    #[test]
    fn clean_image_reports_no_inconsistencies() {
        let mut vol = Volume::new(format_fixture());
        let report = check(&mut vol);
        assert_eq!(report.fixed, 0);
        assert_eq!(report.summary(), "No file system inconsistencies detected!");
    }

    #[test]
    fn clears_stale_dtime_on_a_live_inode() {
        let mut vol = Volume::new(format_fixture());
        mkdir(&mut vol, "/sub").unwrap();
        let root = vol.inode(ROOT_INODE);
        let sub_num = crate::dirent::find(&vol, &root, b"sub").unwrap().header.inode;
        let mut sub = vol.inode(sub_num);
        sub.dtime = 12345;
        vol.set_inode(sub_num, &sub);

        let report = check(&mut vol);
        assert!(report.fixed > 0);
        assert_eq!(vol.inode(sub_num).dtime, 0);
    }

    #[test]
    fn remarks_inode_bitmap_bit_for_a_reachable_inode() {
        let mut vol = Volume::new(format_fixture());
        mkdir(&mut vol, "/sub").unwrap();
        let root = vol.inode(ROOT_INODE);
        let sub_num = crate::dirent::find(&vol, &root, b"sub").unwrap().header.inode;
        mark_inode_free(&mut vol, sub_num);

        let report = check(&mut vol);
        assert!(vol.inode_bitmap_bit(sub_num));
        assert!(report
            .messages
            .iter()
            .any(|m| m.contains("not marked as in-use")));
    }

    #[test]
    fn fixes_free_block_counter_mismatch() {
        let mut vol = Volume::new(format_fixture());
        let mut sb = vol.superblock();
        sb.total_unallocated_blocks += 5;
        vol.set_superblock(&sb);

        let report = check(&mut vol);
        assert!(report
            .messages
            .iter()
            .any(|m| m.contains("superblock's free blocks counter")));
        assert_eq!(vol.superblock().total_unallocated_blocks, vol.count_free_blocks());
    }
}
