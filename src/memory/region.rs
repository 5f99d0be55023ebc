//! Anonymous memory-mapped arena backing a slab.
//!
//! The region is private to the process. Growth maps a larger region,
//! copies the old bytes across and swaps it in, so offsets stay valid
//! while raw pointers do not; callers only ever hold offsets.
use std::io;
use std::ptr;

use memmap2::MmapMut;

use super::Address;

pub struct Region {
    mmap: MmapMut,
    base: *mut u8,
    len: usize,
}

// Safety: the raw base pointer always refers to `mmap`, which the region owns.
// All reads and writes go through bounds-checked methods; callers serialize
// writes to any one allocation (bucket lock, policy lock).
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Map `len` zeroed bytes.
    pub fn anonymous(len: usize) -> io::Result<Self> {
        // A zero-length anonymous map is rejected by the kernel.
        let mut mmap = MmapMut::map_anon(len.max(1))?;
        let base = mmap.as_mut_ptr();
        Ok(Region { mmap, base, len })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grow to `new_len` bytes, preserving contents.
    pub fn grow(&mut self, new_len: usize) -> io::Result<()> {
        if new_len <= self.len {
            return Ok(());
        }
        let mut mmap = MmapMut::map_anon(new_len)?;
        mmap[..self.len].copy_from_slice(&self.mmap[..self.len]);
        self.base = mmap.as_mut_ptr();
        self.mmap = mmap;
        self.len = new_len;
        Ok(())
    }

    /// Validate `[address, address + len)` and return its start offset.
    #[inline]
    fn check(&self, address: Address, len: usize) -> usize {
        assert!(!address.is_none(), "access through the null address");
        let start = address.get() as usize;
        let end = start
            .checked_add(len)
            .unwrap_or_else(|| panic!("access at {start} of {len} bytes overflows"));
        assert!(
            end <= self.len,
            "access [{start}, {end}) outside arena of {} bytes",
            self.len
        );
        start
    }

    pub fn read(&self, address: Address, dst: &mut [u8]) {
        let start = self.check(address, dst.len());
        // Safety: bounds checked above; `dst` is a distinct heap/stack buffer.
        unsafe { ptr::copy_nonoverlapping(self.base.add(start), dst.as_mut_ptr(), dst.len()) }
    }

    pub fn write(&self, address: Address, src: &[u8]) {
        let start = self.check(address, src.len());
        // Safety: bounds checked above; `src` cannot alias the mapping.
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), self.base.add(start), src.len()) }
    }

    /// Borrow `len` bytes in place.
    ///
    /// The caller must hold whatever lock serializes writers of this
    /// allocation for as long as the slice lives.
    pub fn slice(&self, address: Address, len: usize) -> &[u8] {
        let start = self.check(address, len);
        // Safety: bounds checked above; writers are excluded by the caller.
        unsafe { std::slice::from_raw_parts(self.base.add(start), len) }
    }
}
