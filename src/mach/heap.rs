use crate::error;
use crate::lang::Error;
use tracing::trace;

type Result<T> = std::result::Result<T, Error>;

pub const PAGE_SIZE: usize = 256;
pub const MAX_TEMPS: usize = 64;

const USED: u8 = 0b01;
const LAST: u8 = 0b10;

/// Generation checked reference to an allocated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    page: usize,
    gen: u32,
}

/// ## Page allocator
///
/// Memory is a run of fixed size pages with two bits of state per page,
/// packed four pages to a byte. A block is a run of used pages, the final
/// one flagged last. Allocation scans from the top of memory down.
#[derive(Debug)]
pub struct Heap {
    memory: Vec<u8>,
    map: Vec<u8>,
    generations: Vec<u32>,
    temps: Vec<(Handle, usize)>,
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new(1024)
    }
}

impl Heap {
    pub fn new(pages: usize) -> Heap {
        Heap {
            memory: vec![0; pages * PAGE_SIZE],
            map: vec![0; (pages + 3) / 4],
            generations: vec![0; pages],
            temps: vec![],
        }
    }

    pub fn pages(&self) -> usize {
        self.generations.len()
    }

    pub fn free_pages(&self) -> usize {
        (0..self.pages()).filter(|p| self.flags(*p) & USED == 0).count()
    }

    pub fn temps(&self) -> usize {
        self.temps.len()
    }

    fn flags(&self, page: usize) -> u8 {
        (self.map[page / 4] >> ((page % 4) * 2)) & 0b11
    }

    fn set_flags(&mut self, page: usize, flags: u8) {
        let shift = (page % 4) * 2;
        let byte = &mut self.map[page / 4];
        *byte = (*byte & !(0b11 << shift)) | (flags << shift);
    }

    /// Allocates a zero filled block of at least `size` bytes.
    pub fn alloc(&mut self, size: usize) -> Result<Handle> {
        let want = (size / PAGE_SIZE + usize::from(size % PAGE_SIZE != 0)).max(1);
        let mut run = 0;
        let mut start = None;
        for page in (0..self.pages()).rev() {
            if self.flags(page) & USED == 0 {
                run += 1;
                if run == want {
                    start = Some(page);
                    break;
                }
            } else {
                run = 0;
            }
        }
        let start = match start {
            Some(start) => start,
            None => {
                self.clear_temps(0);
                return Err(error!(OutOfMemory));
            }
        };
        for page in start..start + want {
            self.set_flags(page, USED);
        }
        self.set_flags(start + want - 1, USED | LAST);
        self.memory[start * PAGE_SIZE..(start + want) * PAGE_SIZE].fill(0);
        self.generations[start] = self.generations[start].wrapping_add(1);
        trace!(page = start, pages = want, "heap alloc");
        Ok(Handle {
            page: start,
            gen: self.generations[start],
        })
    }

    fn check(&self, handle: Handle) -> Result<()> {
        if handle.page < self.pages()
            && self.flags(handle.page) & USED != 0
            && self.generations[handle.page] == handle.gen
        {
            Ok(())
        } else {
            Err(error!(InternalError; "STALE HEAP HANDLE"))
        }
    }

    fn block_end(&self, start: usize) -> usize {
        let mut page = start;
        while page + 1 < self.pages() && self.flags(page) & LAST == 0 {
            page += 1;
        }
        page + 1
    }

    pub fn free(&mut self, handle: Handle) -> Result<()> {
        self.check(handle)?;
        let end = self.block_end(handle.page);
        for page in handle.page..end {
            self.set_flags(page, 0);
        }
        self.generations[handle.page] = self.generations[handle.page].wrapping_add(1);
        trace!(page = handle.page, pages = end - handle.page, "heap free");
        Ok(())
    }

    pub fn size(&self, handle: Handle) -> Result<usize> {
        self.check(handle)?;
        Ok((self.block_end(handle.page) - handle.page) * PAGE_SIZE)
    }

    pub fn get(&self, handle: Handle) -> Result<&[u8]> {
        self.check(handle)?;
        let end = self.block_end(handle.page);
        Ok(&self.memory[handle.page * PAGE_SIZE..end * PAGE_SIZE])
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut [u8]> {
        self.check(handle)?;
        let end = self.block_end(handle.page);
        Ok(&mut self.memory[handle.page * PAGE_SIZE..end * PAGE_SIZE])
    }

    /// A block released by `clear_temps` once its level unwinds.
    pub fn temp(&mut self, size: usize, level: usize) -> Result<Handle> {
        if self.temps.len() >= MAX_TEMPS {
            return Err(error!(TooManyTemporaries));
        }
        let handle = self.alloc(size)?;
        self.temps.push((handle, level));
        Ok(handle)
    }

    /// Releases every temporary created at `level` or deeper.
    pub fn clear_temps(&mut self, level: usize) {
        let (drop, keep): (Vec<_>, Vec<_>) =
            self.temps.drain(..).partition(|(_, l)| *l >= level);
        self.temps = keep;
        for (handle, _) in drop {
            if self.free(handle).is_err() {
                tracing::warn!(page = handle.page, "temporary already released");
            }
        }
    }

    /// Frees everything, invalidating all handles.
    pub fn reset(&mut self) {
        for page in 0..self.pages() {
            if self.flags(page) & USED != 0 {
                self.generations[page] = self.generations[page].wrapping_add(1);
            }
        }
        self.map.fill(0);
        self.temps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_alloc_from_top() {
        let mut heap = Heap::new(8);
        let a = heap.alloc(10).unwrap();
        let b = heap.alloc(PAGE_SIZE + 1).unwrap();
        assert_eq!(a.page, 7);
        assert_eq!(b.page, 5);
        assert_eq!(heap.size(b).unwrap(), 2 * PAGE_SIZE);
        assert_eq!(heap.free_pages(), 5);
    }

    #[test]
    fn test_size_beyond_arena() {
        let mut heap = Heap::new(4);
        assert!(heap.alloc(usize::MAX).is_err());
        assert!(heap.alloc(4 * PAGE_SIZE + 1).is_err());
        assert_eq!(heap.free_pages(), 4);
    }

    #[test]
    fn test_zero_filled() {
        let mut heap = Heap::new(2);
        let a = heap.alloc(4).unwrap();
        heap.get_mut(a).unwrap()[0] = 9;
        heap.free(a).unwrap();
        let b = heap.alloc(4).unwrap();
        assert_eq!(heap.get(b).unwrap()[0], 0);
    }

    #[test]
    fn test_stale_handle() {
        let mut heap = Heap::new(2);
        let a = heap.alloc(4).unwrap();
        heap.free(a).unwrap();
        let b = heap.alloc(4).unwrap();
        assert_eq!(a.page, b.page);
        assert!(heap.get(a).is_err());
        assert!(heap.free(a).is_err());
        assert!(heap.get(b).is_ok());
    }

    #[test]
    fn test_out_of_memory_releases_temps() {
        let mut heap = Heap::new(2);
        heap.temp(10, 1).unwrap();
        heap.alloc(10).unwrap();
        assert_eq!(heap.alloc(10).unwrap_err().code(), crate::lang::ErrorCode::OutOfMemory);
        assert_eq!(heap.temps(), 0);
        assert!(heap.alloc(10).is_ok());
    }

    #[test]
    fn test_temp_levels() {
        let mut heap = Heap::new(16);
        heap.temp(1, 0).unwrap();
        heap.temp(1, 1).unwrap();
        heap.temp(1, 2).unwrap();
        heap.clear_temps(1);
        assert_eq!(heap.temps(), 1);
        assert_eq!(heap.free_pages(), 15);
    }

    #[test]
    fn test_too_many_temps() {
        let mut heap = Heap::new(MAX_TEMPS + 1);
        for _ in 0..MAX_TEMPS {
            heap.temp(1, 0).unwrap();
        }
        assert!(heap.temp(1, 0).is_err());
    }

    proptest! {
        #[test]
        fn blocks_never_overlap(sizes in proptest::collection::vec(1usize..700, 1..20)) {
            let mut heap = Heap::new(64);
            let mut live: Vec<(Handle, usize)> = vec![];
            for (i, size) in sizes.iter().enumerate() {
                if let Ok(h) = heap.alloc(*size) {
                    live.push((h, heap.size(h).unwrap() / PAGE_SIZE));
                }
                if i % 3 == 2 && !live.is_empty() {
                    let (h, _) = live.remove(0);
                    heap.free(h).unwrap();
                }
            }
            let mut pages: Vec<usize> = live
                .iter()
                .flat_map(|(h, n)| h.page..h.page + n)
                .collect();
            let used = pages.len();
            pages.sort_unstable();
            pages.dedup();
            prop_assert_eq!(pages.len(), used);
            prop_assert_eq!(heap.free_pages(), 64 - used);
            for (h, _) in live {
                heap.free(h).unwrap();
            }
            prop_assert_eq!(heap.free_pages(), heap.pages());
            prop_assert!(heap.alloc(64 * PAGE_SIZE).is_ok());
        }
    }
}
