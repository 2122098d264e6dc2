//! Heap - GC-managed memory allocator with mark-sweep collection
//!
//! Design:
//! - Uses alloc::alloc for memory allocation
//! - Maintains an intrusive linked list of all allocated objects
//! - Collection is stop-the-world: a Schorr-Waite marking pass over the
//!   roots, then a linear sweep of the all-objects list
//! - Allocation triggers a collection when the live-object count reaches the
//!   soft limit, and fails if the survivors still fill it
//!
//! The runtime provides `GcContext::visit_roots` to enumerate root pointers.
//! Child traversal needs no callback: each object's class carries the
//! `start_marking`/`mark_next` rotations for its own layout, and the marking
//! state lives entirely inside the objects' temporarily reversed slots.

use core::ptr::NonNull;

use crate::{
    class::ObjectClass,
    gc_header::GcHeader,
    visitor::{GcContext, GcVisitor},
    GcPtr,
};

/// Default ceiling on the number of live objects.
///
/// A policy knob only; collector correctness does not depend on its value.
pub const DEFAULT_MAX_OBJECTS: usize = 10_000;

/// The managed heap
pub struct Heap {
    /// Head of the all-objects linked list
    all_objects: Option<NonNull<GcHeader>>,

    /// Number of objects currently allocated
    num_objects: usize,

    /// Soft limit: reaching it triggers a collection, and an allocation that
    /// still finds the heap full afterwards fails
    max_objects: usize,

    /// Collect on every allocation. Lets tests fuzz collection timings.
    stress: bool,
}

/// Result type for allocations
pub type AllocResult<T> = Result<T, AllocError>;

/// Allocation error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The host allocator returned null
    OutOfMemory,
    /// The object-count limit is still reached after a collection cycle
    LimitExceeded,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of memory"),
            AllocError::LimitExceeded => write!(f, "object count limit reached"),
        }
    }
}

impl core::error::Error for AllocError {}

impl Heap {
    /// Create a new heap with the given live-object limit
    pub fn new(max_objects: usize) -> Heap {
        Heap {
            all_objects: None,
            num_objects: 0,
            max_objects,
            stress: false,
        }
    }

    /// Get the number of objects currently allocated
    #[inline]
    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    /// Get the live-object limit
    #[inline]
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Enable or disable collect-on-every-allocation
    pub fn set_stress(&mut self, stress: bool) {
        self.stress = stress;
    }

    /// Allocate memory for an object of type T
    ///
    /// Returns a pointer to uninitialized memory. The caller must initialize
    /// the object before the next possible collection: the payload slots are
    /// traversed by the object's class as soon as the collector reaches it.
    ///
    /// # Arguments
    /// * `ctx` - The runtime context providing the root set
    /// * `class` - The class recorded in the new object's header
    pub fn alloc<T>(
        &mut self,
        ctx: &mut impl GcContext,
        class: &'static ObjectClass,
    ) -> AllocResult<GcPtr<T>> {
        self.alloc_with_size(ctx, class, core::mem::size_of::<T>())
    }

    /// Allocate memory with the given size
    ///
    /// Layout: | GcHeader | object data ... |
    pub fn alloc_with_size<T>(
        &mut self,
        ctx: &mut impl GcContext,
        class: &'static ObjectClass,
        size: usize,
    ) -> AllocResult<GcPtr<T>> {
        if self.stress || self.num_objects >= self.max_objects {
            self.collect(ctx);
        }
        if self.num_objects >= self.max_objects {
            return Err(AllocError::LimitExceeded);
        }

        let layout = GcHeader::layout_for_size(size);

        unsafe {
            let ptr = alloc::alloc::alloc(layout);
            if ptr.is_null() {
                return Err(AllocError::OutOfMemory);
            }

            // Initialize the header and link into the all-objects list
            let header = ptr as *mut GcHeader;
            header.write(GcHeader::new(class, size));
            (*header).set_next_object(self.all_objects);
            self.all_objects = Some(NonNull::new_unchecked(header));

            self.num_objects += 1;

            // Return pointer to object data (after header)
            Ok(GcPtr::from_ptr(ptr.add(GcHeader::SIZE) as *mut T))
        }
    }

    /// Run a full collection cycle
    ///
    /// Marks everything reachable from the roots reported by `ctx`, then
    /// sweeps the all-objects list: survivors get their mark bit cleared,
    /// dead objects are unlinked, disposed through their class, and freed.
    pub fn collect(&mut self, ctx: &mut impl GcContext) {
        let mut marker = Marker { _priv: () };
        ctx.visit_roots(&mut marker);
        self.sweep();
    }

    fn sweep(&mut self) {
        let mut prev: Option<NonNull<GcHeader>> = None;
        let mut current = self.all_objects;

        while let Some(header_ptr) = current {
            unsafe {
                let header = &mut *header_ptr.as_ptr();
                let next = header.next_object();

                if header.is_marked() {
                    header.set_marked(false);
                    prev = Some(header_ptr);
                } else {
                    // Dead object - unlink before freeing so no listed node
                    // ever points into released memory
                    match prev {
                        Some(p) => (*p.as_ptr()).set_next_object(next),
                        None => self.all_objects = next,
                    }
                    Self::dispose_and_free(header_ptr);
                    self.num_objects -= 1;
                }

                current = next;
            }
        }
    }

    unsafe fn dispose_and_free(header_ptr: NonNull<GcHeader>) {
        let header = header_ptr.as_ref();
        let dispose = header.class().dispose;
        let layout = GcHeader::layout_for_size(header.alloc_size());
        dispose(GcPtr::from_ptr(header.object_ptr()));
        alloc::alloc::dealloc(header_ptr.as_ptr() as *mut u8, layout);
    }
}

impl Drop for Heap {
    /// Dispose and free every remaining object, reachable or not, so owned
    /// payload resources are returned on interpreter teardown.
    fn drop(&mut self) {
        let mut current = self.all_objects.take();
        self.num_objects = 0;

        while let Some(header_ptr) = current {
            unsafe {
                current = header_ptr.as_ref().next_object();
                Self::dispose_and_free(header_ptr);
            }
        }
    }
}

// ============================================================================
// Marker - implements GcVisitor for the marking phase
// ============================================================================

/// A marker that implements `GcVisitor` for use during GC.
///
/// Each visited root is marked to completion before `visit` returns; the
/// marker itself carries no state because the traversal stack is encoded in
/// the objects' reversed slots.
pub struct Marker {
    _priv: (),
}

impl GcVisitor for Marker {
    fn visit<T>(&mut self, ptr: &mut GcPtr<T>) {
        if ptr.is_dangling() {
            return;
        }
        unsafe { mark(ptr.cast()) }
    }
}

/// Mark everything reachable from `root` using Schorr-Waite pointer reversal.
///
/// Two state variables drive the walk: `obj`, the node the traversal is at,
/// and `cursor`, the chain of reversed parent links terminated by the
/// sentinel. Each node is entered through its class's `start_marking` once
/// and re-entered through `mark_next` once per child, so the total work is
/// O(nodes + edges). Every node's slots are fully restored before the walk
/// retreats past it; cycles close on an already-marked node and simply fail
/// to descend.
///
/// # Safety
/// `root` must point to a live object on this heap, and every slot reported
/// by the class vtables must do the same.
unsafe fn mark(root: GcPtr<u8>) {
    let mut obj = root;
    let mut cursor: GcPtr<u8> = GcPtr::dangling();

    loop {
        // Descend: try to enter the node at `obj`
        let header = obj.header();
        let advanced = if header.is_marked() {
            false
        } else {
            header.set_marked(true);
            (header.class().start_marking)(&mut obj, &mut cursor)
        };

        if advanced {
            continue;
        }

        // Retreat: return to reversed parents until one yields another child
        loop {
            if cursor.is_dangling() {
                return;
            }
            if (cursor.class().mark_next)(&mut obj, &mut cursor) {
                break;
            }
        }
    }
}
