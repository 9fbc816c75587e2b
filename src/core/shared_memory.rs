//! Shared buffer primitives (SPEC_FULL.md §4.1).
//!
//! A real GPU build maps one physical region into both the host's and the
//! accelerator's address spaces; writes through either alias become visible
//! to the other side after a release/acquire pair. Here both "sides" are
//! threads of the same process, so [`SharedRegion`] is an ordinary
//! `memfd_create` + `mmap` allocation (mirrored from the teacher's
//! `LinuxSharedMemory`) and [`HostPtr`]/[`DevicePtr`] are newtypes over the
//! same pointer that exist purely to keep the "which side accesses this"
//! documentation in the type system, per SPEC_FULL.md's memory-coherence
//! note.

use std::io;
use std::ptr::NonNull;

/// A pointer into [`SharedRegion`] as the host dispatcher would see it.
#[derive(Debug, Clone, Copy)]
pub struct HostPtr(pub *mut u8);

/// A pointer into [`SharedRegion`] as the accelerator-side caller would see
/// it. Bit-identical to [`HostPtr`] in this single-process reimplementation.
#[derive(Debug, Clone, Copy)]
pub struct DevicePtr(pub *mut u8);

unsafe impl Send for HostPtr {}
unsafe impl Send for DevicePtr {}

/// A single `memfd_create` + `mmap` region shared between all of a store's
/// queues and data banks. Allocation failure is fatal at store construction,
/// per SPEC_FULL.md §4.1.
pub struct SharedRegion {
    ptr: NonNull<u8>,
    size: usize,
    #[cfg(target_os = "linux")]
    fd: std::os::unix::io::RawFd,
}

unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    #[cfg(target_os = "linux")]
    pub fn create(size: usize) -> io::Result<Self> {
        use std::ffi::CString;

        let c_name = CString::new("gpukv_core").unwrap();
        let flags = 0u64;

        let fd = unsafe {
            libc::syscall(libc::SYS_memfd_create, c_name.as_ptr(), flags) as libc::c_int
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            ) as *mut u8
        };

        if ptr as isize == -1 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // The allocation is zero-filled by the kernel; callers are
        // responsible for initializing whatever layout they carve out of it.
        Ok(Self {
            ptr: NonNull::new(ptr).expect("mmap returned null on success"),
            size,
            fd,
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn create(size: usize) -> io::Result<Self> {
        // Fall back to a plain heap allocation off Linux; there is no host
        // vs. accelerator address space distinction to preserve here since
        // this crate never actually drives a GPU.
        let layout = std::alloc::Layout::from_size_align(size.max(1), 128)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "allocation failed"));
        }
        Ok(Self {
            ptr: NonNull::new(ptr).unwrap(),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn host_ptr(&self) -> HostPtr {
        HostPtr(self.ptr.as_ptr())
    }

    pub fn device_ptr(&self) -> DevicePtr {
        DevicePtr(self.ptr.as_ptr())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        #[cfg(target_os = "linux")]
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
        #[cfg(not(target_os = "linux"))]
        unsafe {
            let layout = std::alloc::Layout::from_size_align(self.size.max(1), 128).unwrap();
            std::alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}
