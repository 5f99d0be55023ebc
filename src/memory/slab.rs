use parking_lot::{Mutex, RwLock};
use tracing::info;

use super::freelist::{ExtractorKind, FreeList, RangeExtractor, Span};
use super::range::Range;
use super::region::Region;
use super::Address;
use crate::error::Result;

/// A byte arena plus its allocator.
///
/// The slab is the only owner of raw memory. Allocation, free and growth
/// are serialized by the free-list lock; byte access takes the region lock
/// shared, growth takes it exclusive.
pub struct Slab {
    region: RwLock<Region>,
    free_list: Mutex<FreeList>,
}

impl Slab {
    pub fn new(capacity: u64, extractor: Box<dyn RangeExtractor>) -> Result<Self> {
        let region = Region::anonymous(capacity as usize)?;
        info!(capacity, ?extractor, "slab created");
        Ok(Slab {
            region: RwLock::new(region),
            free_list: Mutex::new(FreeList::new(capacity, extractor)),
        })
    }

    pub fn with_extractor(capacity: u64, kind: ExtractorKind) -> Result<Self> {
        Slab::new(capacity, kind.extractor())
    }

    pub fn best_fit(capacity: u64) -> Result<Self> {
        Slab::with_extractor(capacity, ExtractorKind::BestFit)
    }

    pub fn allocate(&self, size: u64) -> Result<Address> {
        self.free_list.lock().allocate(size).map(Address::new)
    }

    /// Allocate up to `size` bytes; see [`FreeList::try_allocate`].
    pub fn try_allocate(&self, size: u64) -> Option<Span> {
        self.free_list.lock().try_allocate(size)
    }

    /// Return an allocation. Freeing twice panics.
    pub fn free(&self, address: Address, size: u64) {
        assert!(!address.is_none(), "free of the null address");
        self.free_list.lock().free(address.get(), size);
    }

    /// Grow the arena by `additional` bytes. Existing addresses stay valid.
    pub fn extend(&self, additional: u64) -> Result<()> {
        if additional == 0 {
            return Ok(());
        }
        let mut region = self.region.write();
        let mut free_list = self.free_list.lock();
        let capacity = free_list.capacity() + additional;
        region.grow(capacity as usize)?;
        free_list.extend(additional);
        info!(additional, capacity, "slab extended");
        Ok(())
    }

    pub fn capacity(&self) -> u64 {
        self.free_list.lock().capacity()
    }

    /// Bytes currently handed out.
    pub fn used(&self) -> u64 {
        let free_list = self.free_list.lock();
        free_list.capacity() - free_list.free_bytes()
    }

    /// Bytes available for allocation, possibly fragmented.
    pub fn free_bytes(&self) -> u64 {
        self.free_list.lock().free_bytes()
    }

    pub fn free_ranges(&self) -> Vec<Range> {
        self.free_list.lock().ranges()
    }

    // --- raw access ---

    pub fn read_bytes(&self, address: Address, dst: &mut [u8]) {
        self.region.read().read(address, dst);
    }

    pub fn write_bytes(&self, address: Address, src: &[u8]) {
        self.region.read().write(address, src);
    }

    /// Compare `len(expected)` bytes at `address` with `expected`.
    pub fn bytes_eq(&self, address: Address, expected: &[u8]) -> bool {
        self.region.read().slice(address, expected.len()) == expected
    }

    /// Copy `len` bytes at `address` into a fresh vector.
    pub fn to_vec(&self, address: Address, len: usize) -> Vec<u8> {
        self.region.read().slice(address, len).to_vec()
    }

    pub fn read_u8(&self, address: Address) -> u8 {
        let mut buf = [0u8; 1];
        self.read_bytes(address, &mut buf);
        buf[0]
    }

    pub fn write_u8(&self, address: Address, value: u8) {
        self.write_bytes(address, &[value]);
    }

    pub fn read_u32(&self, address: Address) -> u32 {
        let mut buf = [0u8; 4];
        self.read_bytes(address, &mut buf);
        u32::from_ne_bytes(buf)
    }

    pub fn write_u32(&self, address: Address, value: u32) {
        self.write_bytes(address, &value.to_ne_bytes());
    }

    pub fn read_i32(&self, address: Address) -> i32 {
        self.read_u32(address) as i32
    }

    pub fn write_i32(&self, address: Address, value: i32) {
        self.write_u32(address, value as u32);
    }

    pub fn read_u64(&self, address: Address) -> u64 {
        let mut buf = [0u8; 8];
        self.read_bytes(address, &mut buf);
        u64::from_ne_bytes(buf)
    }

    pub fn write_u64(&self, address: Address, value: u64) {
        self.write_bytes(address, &value.to_ne_bytes());
    }

    pub fn read_i64(&self, address: Address) -> i64 {
        self.read_u64(address) as i64
    }

    pub fn write_i64(&self, address: Address, value: i64) {
        self.write_u64(address, value as u64);
    }

    pub fn read_address(&self, address: Address) -> Address {
        Address::new(self.read_u64(address))
    }

    pub fn write_address(&self, address: Address, value: Address) {
        self.write_u64(address, value.get());
    }
}

impl std::fmt::Debug for Slab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let free_list = self.free_list.lock();
        f.debug_struct("Slab")
            .field("capacity", &free_list.capacity())
            .field("free", &free_list.free_bytes())
            .finish()
    }
}
