use std::fs;
use std::io;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

/// Open a regular file read-write and map its full contents mutably.
/// Returns `None` for an empty file — there is nothing to map or sort.
/// The mapping is MAP_SHARED: stores hit the page cache directly and the
/// kernel writes them back when the mapping is flushed or dropped.
pub fn map_file_rw(path: &Path) -> io::Result<Option<MmapMut>> {
    let file = fs::OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(None);
    }

    // SAFETY: the pass owns the file exclusively for its duration; concurrent
    // external mutation of the underlying file is out of contract.
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    #[cfg(target_os = "linux")]
    {
        // The scan walks the file front to back with bounded backtracking.
        let _ = mmap.advise(memmap2::Advice::Sequential);
    }
    Ok(Some(mmap))
}
