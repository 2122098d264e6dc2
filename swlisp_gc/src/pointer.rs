//! GC-managed pointer type
//!
//! `GcPtr<T>` is a pointer to a GC-managed object. It must not be held in a
//! plain local across a potential GC point (an allocation) unless the value is
//! also reachable from a root slot: the collector frees everything it cannot
//! see.

use core::{
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use crate::{class::ObjectClass, gc_header::GcHeader};

/// A pointer to a GC-managed object.
///
/// This is a thin wrapper around a raw pointer. The object is managed by the
/// GC and may be freed if not reachable from roots.
///
/// # Safety
/// - Must point to object data with a `GcHeader` immediately before it,
///   except for the `dangling()` sentinel
/// - Must not outlive the object's heap
#[repr(transparent)]
pub struct GcPtr<T> {
    ptr: NonNull<T>,
}

impl<T> GcPtr<T> {
    /// Get the raw pointer
    #[inline]
    pub const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Create from a raw pointer
    ///
    /// # Safety
    /// The pointer must be non-null and point to a valid GC-managed object.
    /// Note: This is marked as safe to keep allocation call sites readable,
    /// but the caller must ensure the pointer is valid.
    #[inline]
    #[allow(clippy::not_unsafe_ptr_arg_deref)]
    pub const fn from_ptr(ptr: *mut T) -> GcPtr<T> {
        unsafe {
            GcPtr {
                ptr: NonNull::new_unchecked(ptr),
            }
        }
    }

    /// Create from a NonNull pointer
    #[inline]
    pub const fn from_non_null(ptr: NonNull<T>) -> GcPtr<T> {
        GcPtr { ptr }
    }

    /// Check pointer equality
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    /// Cast to another type
    #[inline]
    pub fn cast<U>(&self) -> GcPtr<U> {
        GcPtr {
            ptr: self.ptr.cast(),
        }
    }

    /// Create the sentinel pointer.
    ///
    /// Doubles as the parent-chain terminator during marking: object slots
    /// always hold real objects, so the sentinel can never be confused with a
    /// heap reference.
    #[inline]
    pub const fn dangling() -> GcPtr<T> {
        GcPtr {
            ptr: NonNull::dangling(),
        }
    }

    /// Check if this is the sentinel pointer
    #[inline]
    pub fn is_dangling(&self) -> bool {
        self.ptr == NonNull::dangling()
    }

    /// Get the underlying NonNull
    #[inline]
    pub fn as_non_null(&self) -> NonNull<T> {
        self.ptr
    }

    /// Get this object's header.
    ///
    /// Must not be called on the sentinel pointer.
    #[inline]
    pub fn header(&self) -> &'static mut GcHeader {
        debug_assert!(!self.is_dangling());
        unsafe { GcHeader::from_object_ptr(self.ptr.as_ptr()) }
    }

    /// Get this object's class
    #[inline]
    pub fn class(&self) -> &'static ObjectClass {
        self.header().class()
    }

    /// Check whether this object's class is `class` (by address identity)
    #[inline]
    pub fn is_class(&self, class: &'static ObjectClass) -> bool {
        core::ptr::eq(self.class(), class)
    }

    /// Check whether this object is currently marked
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.header().is_marked()
    }
}

impl<T> Clone for GcPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GcPtr<T> {}

impl<T> Deref for GcPtr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for GcPtr<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> core::fmt::Debug for GcPtr<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GcPtr({:p})", self.ptr)
    }
}

impl<T> core::fmt::Pointer for GcPtr<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Pointer::fmt(&self.ptr, f)
    }
}
