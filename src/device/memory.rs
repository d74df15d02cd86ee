use crate::device::capability::{BufferHandle, MemFlags, SplitDevice, check_device};
use crate::foundation::error::{SplitError, SplitResult};

/// A named device allocation whose lifetime is managed by its owner.
///
/// Freeing is explicit because it needs the device; owners call [`DeviceMemory::free`] from
/// their own `Drop`.
#[derive(Debug)]
pub struct DeviceMemory {
    name: &'static str,
    flags: MemFlags,
    handle: Option<BufferHandle>,
    size_bytes: u64,
}

impl DeviceMemory {
    pub fn new(name: &'static str, flags: MemFlags) -> Self {
        Self {
            name,
            flags,
            handle: None,
            size_bytes: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn is_allocated(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> SplitResult<BufferHandle> {
        self.handle
            .ok_or_else(|| SplitError::device(format!("buffer '{}' is not allocated", self.name)))
    }

    pub fn alloc<D: SplitDevice + ?Sized>(
        &mut self,
        device: &mut D,
        size_bytes: u64,
    ) -> SplitResult<()> {
        if self.handle.is_some() {
            return Err(SplitError::validation(format!(
                "buffer '{}' is already allocated",
                self.name
            )));
        }
        let handle = device.mem_alloc(self.name, size_bytes, self.flags)?;
        self.handle = Some(handle);
        self.size_bytes = size_bytes;
        check_device(device)
    }

    pub fn zero<D: SplitDevice + ?Sized>(&self, device: &mut D) -> SplitResult<()> {
        device.mem_zero(self.handle()?)?;
        check_device(device)
    }

    pub fn copy_from<D: SplitDevice + ?Sized>(
        &self,
        device: &mut D,
        offset: u64,
        dst: &mut [u8],
    ) -> SplitResult<()> {
        if offset + dst.len() as u64 > self.size_bytes {
            return Err(SplitError::validation(format!(
                "copy of {} bytes at {offset} exceeds buffer '{}' ({} bytes)",
                dst.len(),
                self.name,
                self.size_bytes
            )));
        }
        device.mem_copy_from(self.handle()?, offset, dst)?;
        check_device(device)
    }

    pub fn free<D: SplitDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(h) = self.handle.take() {
            device.mem_free(h);
            self.size_bytes = 0;
        }
    }
}
