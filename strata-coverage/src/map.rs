//! `CoverageMap` — an on-disk, per-block carve count plus an in-core bitmap
//! used to steer later carves away from blocks an earlier carve already
//! consumed, and to translate between "logical" (coverage-skipping) and
//! physical offsets in the underlying input.
//!
//! The persistent file is a flat array of little-endian `u32` counters: one
//! leading word giving the block size, followed by one counter per block.
//! A block is "covered" once its counter is non-zero.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use strata_io::{InputReader, Whence};

use crate::error::{CoverageError, Result};
use crate::fragment::Fragment;

const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Per-block carve coverage for a single input, plus the machinery to
/// translate coverage-aware "logical" positions to and from physical ones.
pub struct CoverageMap {
    block_size: u32,
    num_blocks: u64,
    bitmap: Vec<u8>,
    /// Apply coverage skipping on reads/seeks/fragment generation.
    guide: bool,
    /// Persist new coverage to `file` as carves complete.
    record: bool,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl CoverageMap {
    /// A no-op map: translation is the identity and nothing is persisted.
    /// This is the map every dig/extract pass uses when no blockmap file was
    /// configured ("coverage map is optional").
    pub fn disabled() -> Self {
        CoverageMap {
            block_size: DEFAULT_BLOCK_SIZE,
            num_blocks: 0,
            bitmap: Vec::new(),
            guide: false,
            record: false,
            file: None,
            path: None,
        }
    }

    /// Load (or create) a blockmap file for an input of `input_size` bytes.
    ///
    /// `block_size_hint` of 0 means "use the file's existing block size, or
    /// 512 for a new file." `guide` makes reads/seeks skip covered blocks;
    /// `record` opens the file for read-write and persists new coverage.
    /// At least one of `guide`/`record` must be requested by the caller
    /// before this is called; `disabled()` covers the neither case.
    pub fn open(
        path: impl AsRef<Path>,
        input_size: u64,
        block_size_hint: u32,
        guide: bool,
        record: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existing = File::open(&path).ok();

        let (block_size, mut bitmap, num_blocks) = match existing {
            Some(mut f) => {
                let on_disk_block_size = f.read_u32::<LittleEndian>()?;
                if block_size_hint != 0 && on_disk_block_size != block_size_hint {
                    return Err(CoverageError::BlockSizeMismatch {
                        path: path.clone(),
                        expected: block_size_hint,
                        found: on_disk_block_size,
                    });
                }
                let num_blocks = div_ceil(input_size, on_disk_block_size as u64);
                let mut bitmap = vec![0u8; bitmap_bytes(num_blocks)];
                for block in 0..num_blocks {
                    f.seek(SeekFrom::Start((block + 1) * 4))?;
                    let entry = f
                        .read_u32::<LittleEndian>()
                        .map_err(|_| CoverageError::Truncated(path.clone()))?;
                    if entry != 0 {
                        bitmap[(block / 8) as usize] |= 1 << (block % 8);
                    }
                }
                (on_disk_block_size, bitmap, num_blocks)
            }
            None if guide && !record => {
                return Err(CoverageError::MissingBlockmap(path));
            }
            None => {
                let block_size = if block_size_hint == 0 {
                    DEFAULT_BLOCK_SIZE
                } else {
                    block_size_hint
                };
                let num_blocks = div_ceil(input_size, block_size as u64);
                let bitmap = vec![0u8; bitmap_bytes(num_blocks)];
                (block_size, bitmap, num_blocks)
            }
        };

        let file = if record {
            let create_new = !path.exists();
            let mut f = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            if create_new {
                f.write_u32::<LittleEndian>(block_size)?;
                for _ in 0..num_blocks {
                    f.write_u32::<LittleEndian>(0)?;
                }
                f.flush()?;
            }
            Some(f)
        } else {
            None
        };

        bitmap.resize(bitmap_bytes(num_blocks), 0);

        info!(
            "coverage: opened {} ({num_blocks} blocks of {block_size} bytes, guide={guide}, record={record})",
            path.display()
        );

        Ok(CoverageMap {
            block_size,
            num_blocks,
            bitmap,
            guide,
            record,
            file,
            path: Some(path),
        })
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    pub fn is_guiding(&self) -> bool {
        self.guide
    }

    pub fn is_recording(&self) -> bool {
        self.record
    }

    fn is_covered(&self, block: u64) -> bool {
        if block >= self.num_blocks {
            return false;
        }
        self.bitmap[(block / 8) as usize] & (1 << (block % 8)) != 0
    }

    /// Increment one block's on-disk counter and mark it covered in core.
    /// Mirrors `updateCoverageBlockmap`.
    pub fn record_block(&mut self, block: u64) -> Result<()> {
        if !self.record {
            return Ok(());
        }
        let file = self.file.as_mut().expect("record implies an open file");
        file.seek(SeekFrom::Start((block + 1) * 4))?;
        let entry = file.read_u32::<LittleEndian>()?;
        file.seek(SeekFrom::Start((block + 1) * 4))?;
        file.write_u32::<LittleEndian>(entry + 1)?;
        file.flush()?;
        if block < self.num_blocks {
            let was_covered = self.bitmap[(block / 8) as usize] & (1 << (block % 8)) != 0;
            self.bitmap[(block / 8) as usize] |= 1 << (block % 8);
            if !was_covered {
                debug!("coverage: block {block} now covered (count {})", entry + 1);
            }
        }
        Ok(())
    }

    /// Record coverage for every block a physically-contiguous fragment
    /// touches. Mirrors the block-walking loop in
    /// `auditUpdateCoverageBlockmap`. `fragment` must be in physical
    /// coordinates (as produced by [`CoverageMap::fragments_for_extent`]),
    /// not the extent's logical ones — a logical extent can span physical
    /// blocks it never actually occupies once covered blocks are skipped.
    pub fn record_fragment(&mut self, fragment: &Fragment) -> Result<()> {
        if !self.record {
            return Ok(());
        }
        let first = fragment.start / self.block_size as u64;
        let last = fragment.stop / self.block_size as u64;
        for block in first..=last {
            self.record_block(block)?;
        }
        Ok(())
    }

    /// Translate a logical (coverage-skipping) position into the matching
    /// physical offset. Mirrors `positionUseCoverageBlockmap`; the caller
    /// must never pass a `logical` value that lands inside a covered block.
    pub fn physical_for_logical(&self, logical: u64) -> u64 {
        if !self.guide {
            return logical;
        }
        let mut total = 0u64;
        let mut curblock = 0u64;
        let mut curpos = 0u64;
        while total < logical && curblock < self.num_blocks {
            while curblock < self.num_blocks && self.is_covered(curblock) {
                curpos += self.block_size as u64 - curpos % self.block_size as u64;
                curblock += 1;
            }
            let mut more = 0u64;
            while curblock < self.num_blocks && !self.is_covered(curblock) && total + more < logical
            {
                more += self.block_size as u64 - curpos % self.block_size as u64;
                curblock += 1;
            }
            if total + more > logical {
                more = logical - total;
            }
            curpos += more;
            total += more;
        }
        curpos
    }

    /// Report a physical position with the contribution of covered blocks
    /// strictly preceding it removed. Mirrors `ftello_use_coverage_map`.
    /// Assumes `physical` does not lie inside a covered block.
    pub fn logical_for_physical(&self, physical: u64) -> u64 {
        if !self.guide || self.num_blocks == 0 {
            return physical;
        }
        let end_block = physical / self.block_size as u64;
        let mut decrease = 0u64;
        for block in 0..end_block {
            if self.is_covered(block) {
                decrease += self.block_size as u64;
            }
        }
        if self.is_covered(end_block) {
            decrease += self.block_size as u64 - physical % self.block_size as u64;
        }
        physical - decrease
    }

    /// Seek `reader` by `delta` logical bytes, skipping covered blocks along
    /// the way. Mirrors `fseeko_use_coverage_map`.
    pub fn seek_relative<R: InputReader>(
        &self,
        reader: &mut R,
        delta: i64,
    ) -> strata_io::Result<()> {
        if !self.guide || delta == 0 {
            return reader.seek(delta, Whence::Cur);
        }
        let sign: i64 = if delta > 0 { 1 } else { -1 };
        let mut remaining = delta;
        let mut currentpos = reader.position();
        let mut curblock = (currentpos / self.block_size as u64) as i64;
        let mut total = 0i64;
        let target = delta.abs();

        while total < target && curblock >= 0 && (curblock as u64) < self.num_blocks {
            let mut skip: i64 = 0;
            while curblock >= 0 && (curblock as u64) < self.num_blocks && self.is_covered(curblock as u64) {
                skip += self.block_size as i64 - (currentpos % self.block_size as u64) as i64;
                curblock += sign;
            }
            remaining += skip * sign;
            currentpos = (currentpos as i64 + skip * sign) as u64;

            let mut keep: i64 = 0;
            while curblock >= 0
                && (curblock as u64) < self.num_blocks
                && !self.is_covered(curblock as u64)
                && total < target
            {
                keep += self.block_size as i64 - (currentpos % self.block_size as u64) as i64;
                curblock += sign;
            }
            total += keep;
            currentpos = (currentpos as i64 + keep * sign) as u64;
        }

        reader.seek(remaining, Whence::Cur)
    }

    /// Read into `buf`, silently skipping over covered blocks. Mirrors
    /// `fread_use_coverage_map`. Returns the number of bytes placed in
    /// `buf`, which may be short at EOF or at the end of the coverage map.
    pub fn read<R: InputReader>(&self, reader: &mut R, buf: &mut [u8]) -> strata_io::Result<usize> {
        if !self.guide {
            return reader.read(buf);
        }
        let needed = buf.len();
        let mut total_read = 0usize;
        let mut curpos = reader.position();
        let mut curblock = curpos / self.block_size as u64;
        let mut short_read = false;

        while total_read < needed && curblock < self.num_blocks && !short_read {
            let mut skip = 0u64;
            while curblock < self.num_blocks && self.is_covered(curblock) {
                skip += self.block_size as u64 - curpos % self.block_size as u64;
                curblock += 1;
            }
            curpos += skip;
            reader.seek(skip as i64, Whence::Cur)?;

            let mut want = 0u64;
            while curblock < self.num_blocks
                && !self.is_covered(curblock)
                && total_read as u64 + want <= needed as u64
            {
                want += self.block_size as u64 - curpos % self.block_size as u64;
                curblock += 1;
            }
            if total_read as u64 + want > needed as u64 {
                want = needed as u64 - total_read as u64;
            }

            let n = reader.read(&mut buf[total_read..total_read + want as usize])?;
            if (n as u64) < want {
                short_read = true;
            }
            total_read += n;
            curpos += n as u64;
        }

        Ok(total_read)
    }

    /// Translate a single physical extent into the list of physically
    /// contiguous fragments it decomposes into once covered blocks have been
    /// skipped. Mirrors `generateFragments`.
    pub fn fragments_for_extent(&self, start: u64, stop: u64) -> Vec<Fragment> {
        if !self.guide {
            return vec![Fragment { start, stop }];
        }

        let needed = stop - start + 1;
        let mut fragments = Vec::new();
        let mut curpos = self.physical_for_logical(start);
        let mut curblock = curpos / self.block_size as u64;
        let mut total = 0u64;

        while total < needed && curblock < self.num_blocks {
            let mut skip = 0u64;
            while curblock < self.num_blocks && self.is_covered(curblock) {
                skip += self.block_size as u64 - curpos % self.block_size as u64;
                curblock += 1;
            }
            curpos += skip;

            let mut more = 0u64;
            while curblock < self.num_blocks && !self.is_covered(curblock) && total + more < needed {
                more += self.block_size as u64 - curpos % self.block_size as u64;
                curblock += 1;
            }
            if total + more > needed {
                more = needed - total;
            }

            let frag_start = curpos;
            curpos += more;
            fragments.push(Fragment {
                start: frag_start,
                stop: curpos - 1,
            });
            total += more;
        }

        fragments
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

fn bitmap_bytes(num_blocks: u64) -> usize {
    ((num_blocks + 7) / 8) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_io::MemoryReader;

    fn reader_with(data: Vec<u8>) -> MemoryReader {
        let mut r = MemoryReader::new("mem", data);
        r.open().unwrap();
        r
    }

    #[test]
    fn disabled_map_is_identity() {
        let map = CoverageMap::disabled();
        assert_eq!(map.physical_for_logical(12345), 12345);
        assert_eq!(map.logical_for_physical(12345), 12345);
        assert_eq!(
            map.fragments_for_extent(10, 19),
            vec![Fragment { start: 10, stop: 19 }]
        );
    }

    #[test]
    fn new_blockmap_creates_file_with_header_and_zero_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.bin");
        let map = CoverageMap::open(&path, 4096, 512, true, true).unwrap();
        assert_eq!(map.block_size(), 512);
        assert_eq!(map.num_blocks(), 8);

        let mut f = std::fs::File::open(&path).unwrap();
        let bs = f.read_u32::<LittleEndian>().unwrap();
        assert_eq!(bs, 512);
        for _ in 0..8 {
            assert_eq!(f.read_u32::<LittleEndian>().unwrap(), 0);
        }
    }

    #[test]
    fn record_block_marks_bitmap_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.bin");
        let mut map = CoverageMap::open(&path, 2048, 512, true, true).unwrap();
        assert!(!map.is_covered(1));
        map.record_block(1).unwrap();
        assert!(map.is_covered(1));

        // reopening should reflect the persisted update
        let reopened = CoverageMap::open(&path, 2048, 512, true, false).unwrap();
        assert!(reopened.is_covered(1));
    }

    #[test]
    fn missing_blockmap_with_guide_only_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let err = CoverageMap::open(&path, 1024, 512, true, false).unwrap_err();
        assert!(matches!(err, CoverageError::MissingBlockmap(_)));
    }

    #[test]
    fn physical_for_logical_skips_a_later_covered_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.bin");
        let mut map = CoverageMap::open(&path, 2048, 512, true, true).unwrap();
        map.record_block(1).unwrap();
        // block 0 is uncovered, so small logical offsets are unaffected
        assert_eq!(map.physical_for_logical(100), 100);
        // logical byte 512 falls right after all of block 0's uncovered
        // bytes; nothing has been skipped yet at that exact boundary
        assert_eq!(map.physical_for_logical(512), 512);
        // one logical byte further requires stepping over covered block 1
        assert_eq!(map.physical_for_logical(513), 1025);
    }

    #[test]
    fn fragments_split_around_a_covered_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.bin");
        let mut map = CoverageMap::open(&path, 2048, 512, true, true).unwrap();
        map.record_block(1).unwrap();
        // extent spans blocks 0-2 (0..=1535); block 1 is covered, so this
        // should split into two fragments.
        let frags = map.fragments_for_extent(0, 1535);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0], Fragment { start: 0, stop: 511 });
        assert_eq!(frags[1], Fragment { start: 1024, stop: 1535 });
    }

    #[test]
    fn coverage_aware_read_skips_covered_block_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cov.bin");
        let mut map = CoverageMap::open(&path, 1536, 512, true, true).unwrap();
        map.record_block(1).unwrap();

        let mut data = vec![0u8; 1536];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i / 512) as u8;
        }
        let mut reader = reader_with(data);

        let mut buf = vec![0u8; 1024];
        let n = map.read(&mut reader, &mut buf).unwrap();
        assert_eq!(n, 1024);
        assert!(buf[..512].iter().all(|&b| b == 0));
        assert!(buf[512..1024].iter().all(|&b| b == 2));
    }
}
