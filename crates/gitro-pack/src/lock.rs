//! Shared advisory locks over pack and index file handles.
//!
//! Every lookup or read holds a shared lock on the underlying file for the
//! duration of the call. External tools repacking concurrently are expected
//! to take exclusive locks; replaced files are tolerated by the callers.

use std::fs::File;

/// RAII guard for a shared advisory lock. Released on drop.
pub(crate) struct SharedLock<'a> {
    file: &'a File,
}

impl<'a> SharedLock<'a> {
    pub(crate) fn acquire(file: &'a File) -> std::io::Result<Self> {
        file.lock_shared()?;
        Ok(Self { file })
    }
}

impl Drop for SharedLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"x").unwrap();

        let f = File::open(&path).unwrap();
        {
            let _guard = SharedLock::acquire(&f).unwrap();
            // A second shared lock on another handle must not block.
            let f2 = File::open(&path).unwrap();
            let _guard2 = SharedLock::acquire(&f2).unwrap();
        }
        // Lock is released; an exclusive lock succeeds now.
        f.lock().unwrap();
        f.unlock().unwrap();
    }
}
