//! `mprotect`-based protection for a VRAM mapping that generated code writes to directly.
//!
//! Writes through [`crate::Vram`] never need this: its write path checks the guard before
//! storing. This backend exists for hosts that expose VRAM as raw memory (a dynarec fast path),
//! where the only way to observe a write is to trap it.

use std::ptr;
use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::error::{Result, VramError};
use crate::guard::VramGuard;
use crate::protect::WriteProtect;

fn host_page_size() -> Result<usize> {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        return Err(VramError::Protection("sysconf(_SC_PAGESIZE) failed".into()));
    }
    Ok(size as usize)
}

/// Toggles `PROT_WRITE` on pages of a host mapping.
#[derive(Debug)]
pub struct MprotectProtect {
    base: usize,
    len: usize,
    host_page: usize,
}

impl MprotectProtect {
    /// # Safety
    ///
    /// `base..base + len` must be a mapping owned by the caller, aligned to the host page size,
    /// that stays mapped for as long as this value (and any guard using it) is alive.
    pub unsafe fn new(base: *mut u8, len: usize) -> Result<Self> {
        let host_page = host_page_size()?;
        if base as usize % host_page != 0 {
            return Err(VramError::Protection(format!(
                "VRAM mapping at {base:p} is not aligned to the {host_page:#x} byte host page"
            )));
        }
        Ok(Self {
            base: base as usize,
            len,
            host_page,
        })
    }

    pub fn host_page_size(&self) -> usize {
        self.host_page
    }

    fn apply(&self, offset: u32, len: u32, prot: libc::c_int) {
        let mask = self.host_page - 1;
        let start = offset as usize & !mask;
        let end = ((offset as usize + len as usize + mask) & !mask).min(self.len);
        if start >= end {
            return;
        }
        // SAFETY: `start..end` lies inside the mapping promised to `new`.
        let rc = unsafe { libc::mprotect((self.base + start) as *mut libc::c_void, end - start, prot) };
        if rc != 0 {
            warn!(
                offset,
                len,
                error = %std::io::Error::last_os_error(),
                "mprotect on VRAM failed"
            );
        }
    }
}

impl WriteProtect for MprotectProtect {
    fn protect(&self, offset: u32, len: u32) {
        self.apply(offset, len, libc::PROT_READ);
    }

    fn unprotect(&self, offset: u32, len: u32) {
        self.apply(offset, len, libc::PROT_READ | libc::PROT_WRITE);
    }

    fn resumes_protected_writes(&self) -> bool {
        false
    }
}

struct FaultRoute {
    guard: Arc<VramGuard>,
    base: usize,
    len: usize,
}

static ROUTE: OnceLock<FaultRoute> = OnceLock::new();
static PREVIOUS: OnceLock<libc::sigaction> = OnceLock::new();

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fault_address(info: *const libc::siginfo_t) -> usize {
    (*info).si_addr() as usize
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn fault_address(info: *const libc::siginfo_t) -> usize {
    (*info).si_addr as usize
}

extern "C" fn on_fault(signal: libc::c_int, info: *mut libc::siginfo_t, _ctx: *mut libc::c_void) {
    // SAFETY: SA_SIGINFO handlers receive a valid siginfo.
    let addr = unsafe { fault_address(info) };
    if let Some(route) = ROUTE.get() {
        if addr >= route.base && addr < route.base + route.len {
            // The guard unprotects the page before returning; the write then retries.
            route.guard.on_write_fault((addr - route.base) as u32);
            return;
        }
    }
    // Not a VRAM fault: restore the previous disposition and let the retry take it.
    // SAFETY: plain libc calls with valid arguments.
    unsafe {
        match PREVIOUS.get() {
            Some(previous) => {
                libc::sigaction(signal, previous, ptr::null_mut());
            }
            None => {
                libc::signal(signal, libc::SIG_DFL);
            }
        }
    }
}

/// Routes write faults inside `base..base + len` to `guard`. Can be installed once per process.
///
/// # Safety
///
/// The mapping must stay valid for the rest of the process, and `guard` must be configured
/// with an [`MprotectProtect`] over the same mapping.
pub unsafe fn install_fault_handler(guard: Arc<VramGuard>, base: *mut u8, len: usize) -> Result<()> {
    let host_page = host_page_size()?;
    if guard.page_size() as usize % host_page != 0 {
        return Err(VramError::Protection(format!(
            "guard page size {:#x} is not a multiple of the host page size {host_page:#x}",
            guard.page_size()
        )));
    }
    let route = FaultRoute {
        guard,
        base: base as usize,
        len,
    };
    if ROUTE.set(route).is_err() {
        return Err(VramError::Protection(
            "VRAM fault handler is already installed".into(),
        ));
    }

    let mut action: libc::sigaction = std::mem::zeroed();
    action.sa_sigaction = on_fault as usize;
    action.sa_flags = libc::SA_SIGINFO;
    libc::sigemptyset(&mut action.sa_mask);

    let mut previous: libc::sigaction = std::mem::zeroed();
    if libc::sigaction(libc::SIGSEGV, &action, &mut previous) != 0 {
        return Err(VramError::Protection(format!(
            "sigaction(SIGSEGV) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    let _ = PREVIOUS.set(previous);

    // Darwin reports write-protection faults as SIGBUS.
    #[cfg(target_os = "macos")]
    {
        if libc::sigaction(libc::SIGBUS, &action, ptr::null_mut()) != 0 {
            return Err(VramError::Protection(format!(
                "sigaction(SIGBUS) failed: {}",
                std::io::Error::last_os_error()
            )));
        }
    }

    Ok(())
}
