//! Futex-based blocking primitive used by the host dispatcher to "block on
//! SQ.pop" (SPEC_FULL.md §4.5) instead of spinning indefinitely. Only the
//! host side ever calls these; the accelerator side busy-waits exclusively
//! (§5 "no voluntary yielding inside the kernel").

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
    use std::ptr;

    if atomic.load(Ordering::Relaxed) != expected {
        return;
    }

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32) {
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32) {}

/// Bounded spin followed by a short sleep, used on the host side wherever
/// the spec calls for a busy-wait but SPEC_FULL.md's design notes ask for
/// CPU-friendly behavior off the hot accelerator path.
pub fn host_backoff(attempt: &mut u32) {
    if *attempt < 64 {
        std::hint::spin_loop();
        *attempt += 1;
    } else {
        std::thread::sleep(std::time::Duration::from_micros(50));
    }
}
