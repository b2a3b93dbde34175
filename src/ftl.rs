#[cfg(test)]
use std::{println as trace, println as debug};
use std::collections::VecDeque;

use byte_unit::Byte;
use num_integer::div_rem;

#[cfg(not(test))]
use log::{debug, trace};

use crate::config::{BlockId, Counter, Geometry, Lba, PageId};
use crate::error::{FtlError, Result};

/// One flash page. The lba of the last program lives in the out-of-band
/// area next to the data, so the collector can relocate a page without
/// consulting the mapping table.
#[derive(Clone, Default)]
pub struct Page {
    valid: bool,
    oob_lba: Lba,
}

pub struct Block {
    block_id: BlockId,
    pages: Vec<Page>,
    cursor: PageId, // next programmable offset, monotonic until erase
    is_full: bool,
    valid_pages: Counter,
    erase_count: Counter,
}

impl Block {
    fn new(block_id: BlockId, pages_per_block: usize) -> Self {
        Block {
            block_id,
            pages: vec![Page::default(); pages_per_block],
            cursor: 0,
            is_full: false,
            valid_pages: 0,
            erase_count: 0,
        }
    }

    fn program(&mut self, lba: Lba) -> PageId {
        debug_assert!(!self.is_full, "programming full block {}", self.block_id);

        let offset = self.cursor;
        let page = &mut self.pages[offset];
        page.valid = true;
        page.oob_lba = lba;

        self.cursor += 1;
        self.valid_pages += 1;
        if self.cursor == self.pages.len() {
            self.is_full = true;
        }
        offset
    }

    fn invalidate(&mut self, offset: PageId) {
        debug_assert!(self.pages[offset].valid, "page {} already stale", offset);

        self.pages[offset].valid = false;
        self.valid_pages -= 1;
    }

    fn erase(&mut self) {
        for page in &mut self.pages {
            page.valid = false;
        }
        self.cursor = 0;
        self.is_full = false;
        self.valid_pages = 0;
        self.erase_count += 1;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum L2pEntry {
    Unmapped,
    Mapped(PageId),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteOrigin {
    User,
    Gc,
}

/// Page-mapped translation layer over a fixed array of erase blocks.
///
/// Updates are out-of-place: every write programs the next free page of
/// the block at the head of the free queue and re-binds the lba there.
pub struct Ftl {
    geometry: Geometry,
    blocks: Vec<Block>,
    free_blocks: VecDeque<BlockId>,
    l2p: Vec<L2pEntry>,

    live_lbas: Counter,
    user_writes: Counter,
    gc_writes: Counter,
}

impl Ftl {
    pub fn new(geometry: Geometry) -> Result<Self> {
        geometry.validate()?;

        trace!(
            "physical capacity: {} bytes, {}",
            geometry.physical_bytes(),
            Byte::from(geometry.physical_bytes())
                .get_appropriate_unit(true)
                .to_string()
        );
        trace!(
            "logical capacity: {} bytes, {}",
            geometry.max_lba() * geometry.page_size,
            Byte::from(geometry.max_lba() * geometry.page_size)
                .get_appropriate_unit(true)
                .to_string()
        );

        let blocks = (0..geometry.blocks_per_device)
            .map(|block_id| Block::new(block_id, geometry.pages_per_block))
            .collect();
        let free_blocks = (0..geometry.blocks_per_device).collect();
        let l2p = vec![L2pEntry::Unmapped; geometry.max_lba()];

        Ok(Ftl {
            geometry,
            blocks,
            free_blocks,
            l2p,
            live_lbas: 0,
            user_writes: 0,
            gc_writes: 0,
        })
    }

    pub fn max_lba(&self) -> Lba {
        self.geometry.max_lba()
    }

    /// Handle one user write to `lba`. Any stale copy is retired before
    /// the fresh page is programmed; collection runs once afterwards if
    /// the free queue has drained to the threshold.
    pub fn write(&mut self, lba: Lba) -> Result<()> {
        let max_lba = self.geometry.max_lba();
        if lba >= max_lba {
            return Err(FtlError::LbaOutOfRange { lba, max_lba });
        }

        if let L2pEntry::Mapped(old) = self.l2p[lba] {
            let (block_id, offset) = div_rem(old, self.geometry.pages_per_block);
            self.blocks[block_id].invalidate(offset);
            self.live_lbas -= 1;
        }

        self.allocate_page(lba, WriteOrigin::User)?;
        self.live_lbas += 1;

        // One collection per write, never re-checked afterwards; under
        // sustained pressure the queue can sit at the threshold.
        if self.free_blocks.len() <= self.geometry.gc_threshold {
            self.gc()?;
        }
        Ok(())
    }

    /// Program the next free page of the head block and bind `lba` to it.
    /// Both user writes and relocations land here; `origin` only decides
    /// which counter advances.
    fn allocate_page(&mut self, lba: Lba, origin: WriteOrigin) -> Result<PageId> {
        let block_id = *self.free_blocks.front().ok_or(FtlError::DeviceExhausted)?;
        let block = &mut self.blocks[block_id];
        let offset = block.program(lba);
        if block.is_full {
            self.free_blocks.pop_front();
        }

        let page_id = block_id * self.geometry.pages_per_block + offset;
        self.l2p[lba] = L2pEntry::Mapped(page_id);

        match origin {
            WriteOrigin::User => self.user_writes += 1,
            WriteOrigin::Gc => self.gc_writes += 1,
        }
        Ok(page_id)
    }

    // Greedy victim policy: among full blocks, fewest live pages wins and
    // the lowest block index breaks ties.
    // TODO: cost-benefit selection (age-weighted) for hot/cold split workloads
    fn find_victim(&self) -> Result<BlockId> {
        let mut victim = None;
        let mut min_valid = Counter::MAX;
        for (block_id, block) in self.blocks.iter().enumerate() {
            if block.is_full && block.valid_pages < min_valid {
                min_valid = block.valid_pages;
                victim = Some(block_id);
            }
        }
        victim.ok_or(FtlError::NoVictim)
    }

    fn gc(&mut self) -> Result<()> {
        let victim = self.find_victim()?;
        debug!(
            "gc: reclaiming block {} with {} live pages",
            victim, self.blocks[victim].valid_pages
        );

        for offset in 0..self.geometry.pages_per_block {
            let page = &self.blocks[victim].pages[offset];
            if !page.valid {
                continue;
            }
            let lba = page.oob_lba;
            self.allocate_page(lba, WriteOrigin::Gc)?;
        }

        let block = &mut self.blocks[victim];
        block.erase();
        debug!("gc: block {} erased {} times", victim, block.erase_count);
        self.free_blocks.push_back(victim);
        Ok(())
    }

    pub fn user_writes(&self) -> Counter {
        self.user_writes
    }

    pub fn gc_writes(&self) -> Counter {
        self.gc_writes
    }

    pub fn live_lbas(&self) -> Counter {
        self.live_lbas
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }

    /// Write amplification factor, `None` until the first user write.
    pub fn waf(&self) -> Option<f64> {
        if self.user_writes == 0 {
            return None;
        }
        Some((self.user_writes + self.gc_writes) as f64 / self.user_writes as f64)
    }

    /// Fraction of the logical capacity currently holding live data.
    pub fn utilization(&self) -> f64 {
        self.live_lbas as f64 / self.geometry.max_lba() as f64
    }
}
