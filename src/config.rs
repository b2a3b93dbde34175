use crate::error::{FtlError, Result};

pub type BaseType = usize;

pub type Lba = BaseType;
pub type PageId = BaseType;
pub type BlockId = BaseType;
pub type Counter = BaseType;

pub const PAGE_SIZE: BaseType = 4096;
pub const BLOCK_SIZE: BaseType = 4 * 1024 * 1024;
pub const DEVICE_SIZE: BaseType = 8 * 1024 * 1024 * 1024;

pub const PAGES_PER_BLOCK: BaseType = BLOCK_SIZE / PAGE_SIZE;
pub const BLOCKS_PER_DEVICE: BaseType = DEVICE_SIZE / BLOCK_SIZE;

// Logical side is decimal gigabytes, so the gap to the 8 GiB physical
// array is the drive's built-in over-provisioning.
pub const LOGICAL_SIZE: BaseType = 8_000_000_000;

pub const GC_THRESHOLD: BaseType = 3;

/// Device shape, fixed at construction time.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub page_size: BaseType,
    pub pages_per_block: BaseType,
    pub blocks_per_device: BaseType,
    pub logical_bytes: BaseType,
    pub gc_threshold: BaseType,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            page_size: PAGE_SIZE,
            pages_per_block: PAGES_PER_BLOCK,
            blocks_per_device: BLOCKS_PER_DEVICE,
            logical_bytes: LOGICAL_SIZE,
            gc_threshold: GC_THRESHOLD,
        }
    }
}

impl Geometry {
    /// Default physical array with the logical capacity derived from an
    /// over-provisioning percentage instead of `LOGICAL_SIZE`.
    pub fn with_over_provisioning(op_percent: f64) -> Self {
        let mut geometry = Geometry::default();
        let op_pages = (geometry.total_pages() as f64 * (op_percent / 100.0)).trunc() as BaseType;
        geometry.logical_bytes = (geometry.total_pages() - op_pages) * geometry.page_size;
        geometry
    }

    pub fn total_pages(&self) -> BaseType {
        self.blocks_per_device * self.pages_per_block
    }

    pub fn physical_bytes(&self) -> BaseType {
        self.total_pages() * self.page_size
    }

    /// Number of addressable logical pages; valid lbas are `0..max_lba()`.
    pub fn max_lba(&self) -> Lba {
        self.logical_bytes / self.page_size
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FtlError::Config("page_size must be non-zero"));
        }
        if self.pages_per_block == 0 {
            return Err(FtlError::Config("pages_per_block must be non-zero"));
        }
        if self.blocks_per_device == 0 {
            return Err(FtlError::Config("blocks_per_device must be non-zero"));
        }
        if self.max_lba() == 0 {
            return Err(FtlError::Config("logical capacity below one page"));
        }
        if self.gc_threshold >= self.blocks_per_device {
            return Err(FtlError::Config("gc_threshold must be below the block count"));
        }
        if self.max_lba() > self.total_pages() {
            return Err(FtlError::Config("logical capacity exceeds physical capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_matches_device_model() {
        let geometry = Geometry::default();
        assert_eq!(geometry.pages_per_block, 1024);
        assert_eq!(geometry.blocks_per_device, 2048);
        assert_eq!(geometry.total_pages(), 2 * 1024 * 1024);
        assert_eq!(geometry.max_lba(), 1_953_125);
        geometry.validate().unwrap();
    }

    #[test]
    fn over_provisioning_shrinks_logical_capacity() {
        let geometry = Geometry::with_over_provisioning(7.0);
        let op_pages = (geometry.total_pages() as f64 * 0.07).trunc() as BaseType;
        assert_eq!(geometry.max_lba(), geometry.total_pages() - op_pages);
        geometry.validate().unwrap();
    }

    #[test]
    fn rejects_oversized_logical_capacity() {
        let mut geometry = Geometry::default();
        geometry.logical_bytes = geometry.physical_bytes() + PAGE_SIZE;
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn rejects_threshold_at_block_count() {
        let mut geometry = Geometry::default();
        geometry.gc_threshold = geometry.blocks_per_device;
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn rejects_zero_sized_fields() {
        let mut geometry = Geometry::default();
        geometry.pages_per_block = 0;
        assert!(geometry.validate().is_err());

        let mut geometry = Geometry::default();
        geometry.logical_bytes = 0;
        assert!(geometry.validate().is_err());
    }
}
