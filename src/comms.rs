// Cross-process rejection channel: a single boolean mapped into both the
// parent and the forked child it spawns for each attempt. The child sets it
// when the example is rejected; the parent clears it before each attempt and
// reads it after reaping the child. This is the entire synchronization
// surface between the two processes - there is no other shared state.

use std::num::NonZeroUsize;
use std::os::raw::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicBool, Ordering};

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};

#[derive(Debug)]
pub struct Comms {
    ptr: NonNull<AtomicBool>,
}

// An anonymous MAP_SHARED mapping, not a borrowed allocation: both the
// parent and its forked children may read and write it concurrently with
// the discipline described above, so sharing the handle across the fork
// boundary is sound.
unsafe impl Send for Comms {}
unsafe impl Sync for Comms {}

impl Comms {
    pub fn new() -> Result<Comms, nix::Error> {
        let len = NonZeroUsize::new(std::mem::size_of::<AtomicBool>()).unwrap();
        let ptr = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )?
        };
        let ptr = ptr.cast::<AtomicBool>();
        unsafe {
            ptr.as_ptr().write(AtomicBool::new(false));
        }
        Ok(Comms { ptr })
    }

    fn flag(&self) -> &AtomicBool {
        unsafe { self.ptr.as_ref() }
    }

    /// Called by the parent immediately before spawning each attempt's
    /// child.
    pub fn clear(&self) {
        self.flag().store(false, Ordering::SeqCst);
    }

    /// Called by the child when an example rejects. The fence is the
    /// belt-and-braces sync the design calls for: the reap itself already
    /// establishes a happens-before edge on every platform we target, but
    /// the explicit fence makes that guarantee independent of how the
    /// forker is implemented.
    pub fn signal_rejected(&self) {
        self.flag().store(true, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }

    /// Called by the parent after reaping the child.
    pub fn rejected(&self) -> bool {
        self.flag().load(Ordering::SeqCst)
    }
}

impl Drop for Comms {
    fn drop(&mut self) {
        let len = std::mem::size_of::<AtomicBool>();
        unsafe {
            let _ = munmap(self.ptr.as_ptr() as *mut c_void, len);
        }
    }
}
