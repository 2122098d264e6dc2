//! The object model
//!
//! Four heap classes: `nil` (the pinned singleton empty value), `cons` (two
//! child slots), `atom` (an owned byte buffer, compared by contents), and
//! `function` (a native apply routine plus one data child). Each class's
//! vtable implements the pointer-reversal rotations for its own layout, so
//! the collector never needs to know what it is walking.
//!
//! Every constructor that receives object-typed arguments roots them for the
//! duration of its allocation. Callers still own the rooting of anything
//! *else* they hold across the call: that is the central safety rule of the
//! whole runtime.

use swlisp_gc::{GcPtr, ObjectClass};

use crate::error::{Error, EvalResult};
use crate::interp::Interp;
use crate::roots::RootScope;

/// An erased pointer to any heap object. The class lives in the header.
pub type Obj = GcPtr<u8>;

/// The apply routine of a `function` object
pub type ApplyFn = fn(Interp, Obj) -> EvalResult<()>;

/// A tag view of an object's class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjKind {
    Nil,
    Cons,
    Atom,
    Function,
}

/// Get the kind of any heap object
pub fn kind(obj: Obj) -> ObjKind {
    let class = obj.class();
    if ObjectClass::same(class, &CONS_CLASS) {
        ObjKind::Cons
    } else if ObjectClass::same(class, &ATOM_CLASS) {
        ObjKind::Atom
    } else if ObjectClass::same(class, &FUNCTION_CLASS) {
        ObjKind::Function
    } else if ObjectClass::same(class, &NIL_CLASS) {
        ObjKind::Nil
    } else {
        unreachable!("unknown object class: {}", class.name)
    }
}

// ============================================================================
// nil
// ============================================================================

/// The empty value. Allocated once per interpreter and pinned by a permanent
/// root slot; address identity is what makes a value "nil".
#[repr(C)]
pub struct Nil {
    _empty: [u8; 0],
}

unsafe fn leaf_start_marking(_obj: &mut Obj, _cursor: &mut Obj) -> bool {
    false
}

unsafe fn leaf_mark_next(_obj: &mut Obj, _cursor: &mut Obj) -> bool {
    unreachable!("leaf object has no children to return from")
}

unsafe fn nil_dispose(_obj: Obj) {
    // Nothing owned. The sweep never reaches this (the singleton is always
    // rooted); only heap teardown does.
}

pub static NIL_CLASS: ObjectClass = ObjectClass {
    name: "nil",
    start_marking: leaf_start_marking,
    mark_next: leaf_mark_next,
    dispose: nil_dispose,
};

impl Nil {
    pub(crate) fn create(cx: Interp) -> EvalResult<GcPtr<Nil>> {
        let nil = cx.alloc::<Nil>(&NIL_CLASS)?;
        unsafe {
            nil.as_ptr().write(Nil { _empty: [] });
        }
        Ok(nil)
    }
}

// ============================================================================
// cons
// ============================================================================

/// A two-slot node, used both for program structure and for the operand and
/// continuation stacks.
#[repr(C)]
pub struct Cons {
    /// During marking of this node: whether the reversed parent link
    /// currently sits in `head` (child 0 in progress). Meaningless, and
    /// false, whenever the node is in its normal shape.
    pub(crate) tail_is_next: bool,
    pub(crate) head: Obj,
    pub(crate) tail: Obj,
}

unsafe fn cons_start_marking(obj: &mut Obj, cursor: &mut Obj) -> bool {
    let node: GcPtr<Cons> = obj.cast();
    let cons = node.as_ptr();

    let child = (*cons).head;
    (*cons).head = *cursor;
    (*cons).tail_is_next = true;
    *cursor = node.cast();
    *obj = child;
    true
}

unsafe fn cons_mark_next(obj: &mut Obj, cursor: &mut Obj) -> bool {
    let node: GcPtr<Cons> = cursor.cast();
    let cons = node.as_ptr();

    if (*cons).tail_is_next {
        // Head child done: recover it and rotate the reversed link to tail
        let grandparent = (*cons).head;
        (*cons).head = *obj;
        *obj = (*cons).tail;
        (*cons).tail = grandparent;
        (*cons).tail_is_next = false;
        true
    } else {
        // Tail child done: restore the final slot and retreat
        *cursor = (*cons).tail;
        (*cons).tail = *obj;
        *obj = node.cast();
        false
    }
}

unsafe fn cons_dispose(_obj: Obj) {
    // Child references are not owned; the heap frees the node itself
}

pub static CONS_CLASS: ObjectClass = ObjectClass {
    name: "cons",
    start_marking: cons_start_marking,
    mark_next: cons_mark_next,
    dispose: cons_dispose,
};

impl Cons {
    /// Allocate a pair. Both children are rooted across the allocation.
    pub fn create(mut cx: Interp, head: Obj, tail: Obj) -> EvalResult<GcPtr<Cons>> {
        let scope = RootScope::enter(&cx.roots);
        let head = cx.root(head);
        let tail = cx.root(tail);

        let result = cx.alloc::<Cons>(&CONS_CLASS);
        let head = head.get();
        let tail = tail.get();
        scope.exit(&mut cx.roots);
        let cons = result?;

        unsafe {
            cons.as_ptr().write(Cons {
                tail_is_next: false,
                head,
                tail,
            });
        }
        Ok(cons)
    }

    #[inline]
    pub fn head(&self) -> Obj {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Obj {
        self.tail
    }
}

/// View an object as a cons
pub fn as_cons(obj: Obj) -> EvalResult<GcPtr<Cons>> {
    if obj.is_class(&CONS_CLASS) {
        Ok(obj.cast())
    } else {
        Err(Error::Type("cons expected"))
    }
}

/// Split a cons into its two children
pub fn destruct_cons(obj: Obj) -> EvalResult<(Obj, Obj)> {
    let cons = as_cons(obj)?;
    Ok((cons.head, cons.tail))
}

// ============================================================================
// atom
// ============================================================================

/// A leaf node wrapping an exclusively owned byte buffer.
#[repr(C)]
pub struct Atom {
    bytes: Vec<u8>,
}

unsafe fn atom_dispose(obj: Obj) {
    // Release the owned buffer; the heap frees the node itself
    core::ptr::drop_in_place(obj.cast::<Atom>().as_ptr());
}

pub static ATOM_CLASS: ObjectClass = ObjectClass {
    name: "atom",
    start_marking: leaf_start_marking,
    mark_next: leaf_mark_next,
    dispose: atom_dispose,
};

impl Atom {
    /// Allocate an atom taking ownership of `bytes`.
    pub fn create(cx: Interp, bytes: Vec<u8>) -> EvalResult<GcPtr<Atom>> {
        let atom = cx.alloc::<Atom>(&ATOM_CLASS)?;
        unsafe {
            atom.as_ptr().write(Atom { bytes });
        }
        Ok(atom)
    }

    pub fn create_from_str(cx: Interp, name: &str) -> EvalResult<GcPtr<Atom>> {
        Self::create(cx, name.as_bytes().to_vec())
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// View an object as an atom
pub fn as_atom(obj: Obj) -> EvalResult<GcPtr<Atom>> {
    if obj.is_class(&ATOM_CLASS) {
        Ok(obj.cast())
    } else {
        Err(Error::Type("atom expected"))
    }
}

/// Compare two atoms by buffer contents.
///
/// Anything that is not a pair of atoms is a type error, except that an
/// object always equals itself.
pub fn atom_equals(a: Obj, b: Obj) -> EvalResult<bool> {
    if a.ptr_eq(&b) {
        return Ok(true);
    }
    if !a.is_class(&ATOM_CLASS) || !b.is_class(&ATOM_CLASS) {
        return Err(Error::Type("atom_equals: atoms expected"));
    }
    Ok(a.cast::<Atom>().bytes == b.cast::<Atom>().bytes)
}

// ============================================================================
// function
// ============================================================================

/// A native apply routine paired with a single data child. Continuations,
/// closures, and builtins are all values of this class.
#[repr(C)]
pub struct Function {
    pub(crate) apply: ApplyFn,
    pub(crate) data: Obj,
}

unsafe fn function_start_marking(obj: &mut Obj, cursor: &mut Obj) -> bool {
    let node: GcPtr<Function> = obj.cast();
    let function = node.as_ptr();

    let child = (*function).data;
    (*function).data = *cursor;
    *cursor = node.cast();
    *obj = child;
    true
}

unsafe fn function_mark_next(obj: &mut Obj, cursor: &mut Obj) -> bool {
    let node: GcPtr<Function> = cursor.cast();
    let function = node.as_ptr();

    // Only child done: restore the slot and retreat
    *cursor = (*function).data;
    (*function).data = *obj;
    *obj = node.cast();
    false
}

unsafe fn function_dispose(_obj: Obj) {
    // The data reference is not owned; the heap frees the node itself
}

pub static FUNCTION_CLASS: ObjectClass = ObjectClass {
    name: "function",
    start_marking: function_start_marking,
    mark_next: function_mark_next,
    dispose: function_dispose,
};

impl Function {
    /// Allocate a function. The data child is rooted across the allocation.
    pub fn create(mut cx: Interp, apply: ApplyFn, data: Obj) -> EvalResult<GcPtr<Function>> {
        let scope = RootScope::enter(&cx.roots);
        let data = cx.root(data);

        let result = cx.alloc::<Function>(&FUNCTION_CLASS);
        let data = data.get();
        scope.exit(&mut cx.roots);
        let function = result?;

        unsafe {
            function.as_ptr().write(Function { apply, data });
        }
        Ok(function)
    }

    #[inline]
    pub fn data(&self) -> Obj {
        self.data
    }
}

/// View an object as a function
pub fn as_function(obj: Obj) -> EvalResult<GcPtr<Function>> {
    if obj.is_class(&FUNCTION_CLASS) {
        Ok(obj.cast())
    } else {
        Err(Error::Type("apply: not a function"))
    }
}
