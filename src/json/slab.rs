//! Slab allocator for JSON values
//!
//! Small string and node storage for the JSON document tree. Blocks come in
//! three cached size classes (32/64/128 bytes) plus an oversize path, with
//! one allocator instance per thread. Every user pointer carries an 8-byte
//! header: the byte at offset −8 is the class tag, and the `u32` at offset
//! −4 holds the payload length once a string is written into the block.
//!
//! Fixed 32-byte value nodes have their own free list and no header.

use std::alloc::{self, Layout};
use std::cell::RefCell;

/// Block sizes per class tag; usable payload is 8 bytes less.
const CLASS_BYTES: [usize; 3] = [32, 64, 128];

/// Usable payload bytes per class tag.
const CLASS_FIT: [usize; 3] = [24, 56, 120];

/// Free lists stop caching past this many entries; overflow goes back to
/// the system.
const MAX_CACHED: usize = 4095;

/// Size of the tag + length header preceding every user pointer.
const HEADER: usize = 8;

/// Value nodes are fixed-size and headerless.
pub(crate) const NODE_BYTES: usize = 32;

thread_local! {
    static SLAB: RefCell<Slab> = RefCell::new(Slab::new());
}

/// Per-thread block caches. Dropped on thread exit, returning every cached
/// block to the system.
struct Slab {
    classes: [Vec<*mut u8>; 3],
    nodes: Vec<*mut u8>,
    live_blocks: usize,
    live_nodes: usize,
}

impl Slab {
    const fn new() -> Self {
        Self {
            classes: [Vec::new(), Vec::new(), Vec::new()],
            nodes: Vec::new(),
            live_blocks: 0,
            live_nodes: 0,
        }
    }

    fn alloc(&mut self, n: usize) -> *mut u8 {
        self.live_blocks += 1;
        for tag in 0..3 {
            if n <= CLASS_FIT[tag] {
                if let Some(p) = self.classes[tag].pop() {
                    return p;
                }
                return fresh_block(tag as u8);
            }
        }
        oversize_block(n)
    }

    fn dealloc(&mut self, p: *mut u8) {
        self.live_blocks = self.live_blocks.saturating_sub(1);
        // SAFETY: `p` came from alloc(); the tag byte sits at offset −8.
        let tag = unsafe { *p.sub(HEADER) } as usize;
        if tag < 3 && self.classes[tag].len() < MAX_CACHED {
            self.classes[tag].push(p);
        } else {
            // SAFETY: tag identifies the block layout.
            unsafe { release_block(p, tag) };
        }
    }

    fn alloc_node(&mut self) -> *mut u8 {
        self.live_nodes += 1;
        if let Some(p) = self.nodes.pop() {
            return p;
        }
        fresh_node()
    }

    fn dealloc_node(&mut self, p: *mut u8) {
        self.live_nodes = self.live_nodes.saturating_sub(1);
        if self.nodes.len() < MAX_CACHED {
            self.nodes.push(p);
        } else {
            // SAFETY: `p` was produced by fresh_node().
            unsafe { alloc::dealloc(p, node_layout()) };
        }
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        for tag in 0..3 {
            for &p in &self.classes[tag] {
                // SAFETY: cached pointers keep their class layout.
                unsafe { release_block(p, tag) };
            }
        }
        for &p in &self.nodes {
            // SAFETY: as above.
            unsafe { alloc::dealloc(p, node_layout()) };
        }
    }
}

fn class_layout(tag: usize) -> Layout {
    Layout::from_size_align(CLASS_BYTES[tag], 8).expect("class layout")
}

fn node_layout() -> Layout {
    Layout::from_size_align(NODE_BYTES, 8).expect("node layout")
}

/// Allocate a fresh class block and stamp its tag. Returns the user pointer.
fn fresh_block(tag: u8) -> *mut u8 {
    let layout = class_layout(tag as usize);
    // SAFETY: layout is non-zero sized.
    let raw = unsafe { alloc::alloc(layout) };
    if raw.is_null() {
        alloc::handle_alloc_error(layout);
    }
    // SAFETY: block is at least HEADER bytes.
    unsafe {
        raw.write(tag);
        raw.add(HEADER)
    }
}

/// Oversize blocks additionally record their total allocation size in a
/// leading word so the layout can be rebuilt on release. The class tag still
/// sits at user offset −8.
fn oversize_block(n: usize) -> *mut u8 {
    let total = 8 + HEADER + n;
    let layout = Layout::from_size_align(total, 8).expect("oversize layout");
    // SAFETY: layout is non-zero sized.
    let raw = unsafe { alloc::alloc(layout) };
    if raw.is_null() {
        alloc::handle_alloc_error(layout);
    }
    // SAFETY: block is at least 16 bytes.
    unsafe {
        (raw as *mut u64).write(total as u64);
        raw.add(8).write(3);
        raw.add(8 + HEADER)
    }
}

/// Return a block to the system.
///
/// # Safety
///
/// `p` must be a user pointer produced by this module whose tag byte equals
/// `tag`.
unsafe fn release_block(p: *mut u8, tag: usize) {
    if tag < 3 {
        alloc::dealloc(p.sub(HEADER), class_layout(tag));
    } else {
        let raw = p.sub(8 + HEADER);
        let total = (raw as *const u64).read() as usize;
        alloc::dealloc(raw, Layout::from_size_align(total, 8).expect("oversize layout"));
    }
}

fn fresh_node() -> *mut u8 {
    let layout = node_layout();
    // SAFETY: layout is non-zero sized.
    let raw = unsafe { alloc::alloc(layout) };
    if raw.is_null() {
        alloc::handle_alloc_error(layout);
    }
    raw
}

/// Allocate at least `n` usable bytes. The returned pointer has the class
/// tag at offset −8 and 8 scratch header bytes at offsets −8..−1.
pub(crate) fn alloc(n: usize) -> *mut u8 {
    SLAB.try_with(|s| s.borrow_mut().alloc(n)).unwrap_or_else(|_| {
        // Thread-local storage already torn down; go straight to the system.
        for tag in 0..3u8 {
            if n <= CLASS_FIT[tag as usize] {
                return fresh_block(tag);
            }
        }
        oversize_block(n)
    })
}

/// Return a block obtained from [`alloc`].
pub(crate) fn dealloc(p: *mut u8) {
    let fallback = SLAB.try_with(|s| s.borrow_mut().dealloc(p)).is_err();
    if fallback {
        // SAFETY: `p` came from alloc().
        unsafe { release_block(p, *p.sub(HEADER) as usize) };
    }
}

/// Allocate a 32-byte headerless value node.
pub(crate) fn alloc_node() -> *mut u8 {
    SLAB.try_with(|s| s.borrow_mut().alloc_node())
        .unwrap_or_else(|_| fresh_node())
}

/// Return a node obtained from [`alloc_node`].
pub(crate) fn dealloc_node(p: *mut u8) {
    let fallback = SLAB.try_with(|s| s.borrow_mut().dealloc_node(p)).is_err();
    if fallback {
        // SAFETY: `p` came from alloc_node().
        unsafe { alloc::dealloc(p, node_layout()) };
    }
}

/// Snapshot of this thread's allocator state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabStats {
    /// Free-list lengths per class tag.
    pub cached: [usize; 3],
    /// Cached value nodes.
    pub cached_nodes: usize,
    /// Blocks handed out minus blocks returned, on this thread.
    pub live_blocks: usize,
    /// Nodes handed out minus nodes returned, on this thread.
    pub live_nodes: usize,
}

/// Per-thread allocator statistics.
pub fn stats() -> SlabStats {
    SLAB.try_with(|s| {
        let s = s.borrow();
        SlabStats {
            cached: [s.classes[0].len(), s.classes[1].len(), s.classes[2].len()],
            cached_nodes: s.nodes.len(),
            live_blocks: s.live_blocks,
            live_nodes: s.live_nodes,
        }
    })
    .unwrap_or_default()
}
