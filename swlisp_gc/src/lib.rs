//! swlisp Garbage Collector
//!
//! A precise, stop-the-world mark-sweep garbage collector whose mark phase is
//! the Schorr-Waite pointer-reversal algorithm. This crate provides the core
//! GC infrastructure without depending on the runtime types.
//!
//! Key types:
//! - `GcPtr<T>`: A pointer to a GC-managed object
//! - `GcHeader`: Header prepended to each allocation
//! - `ObjectClass`: Per-class traversal and disposal vtable
//! - `Heap`: The managed heap
//!
//! Key traits:
//! - `GcVisitor`: Implemented by the GC's `Marker`, used by the runtime to
//!   report root pointers
//! - `GcContext`: Implemented by the runtime, provides root scanning
//!
//! Marking needs no mark stack and no gray queue: while a node's children are
//! being visited, one of its outgoing slots temporarily holds the link back to
//! its parent. Each class's `start_marking`/`mark_next` pair performs the slot
//! rotations for its own layout, so the collector traverses heterogeneous
//! nodes without knowing anything about them.

#![no_std]
extern crate alloc;

mod class;
mod gc_header;
mod heap;
mod pointer;
mod visitor;

pub use class::{DisposeFn, MarkNextFn, ObjectClass, StartMarkingFn};
pub use gc_header::GcHeader;
pub use heap::{AllocError, AllocResult, Heap, Marker, DEFAULT_MAX_OBJECTS};
pub use pointer::GcPtr;
pub use visitor::{GcContext, GcVisitor};
