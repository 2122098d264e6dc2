//! Interpreter context
//!
//! All the shared state of a running interpreter (heap, root stack, the
//! `nil` singleton, the operand and continuation stacks, the global
//! environments) lives in one `InterpCell`, so multiple interpreters can
//! coexist and tests can create and tear down instances deterministically.
//!
//! `Interp` is a copyable handle to the cell and is what every runtime
//! function takes by value. `Interpreter` owns the cell and is the public
//! entry point.

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use std::io::Write;

use swlisp_gc::{GcContext, GcPtr, GcVisitor, Heap, ObjectClass};

use crate::error::{Error, EvalResult};
use crate::eval::{self, fun_form, print_atom, quote_form};
use crate::object::{self, Atom, Cons, Function, Nil, Obj, ObjKind, CONS_CLASS};
use crate::options::Options;
use crate::parser::Parser;
use crate::roots::{Root, RootScope, RootStack};

/// The state cell behind an interpreter.
pub struct InterpCell {
    pub(crate) heap: Heap,
    pub(crate) roots: RootStack,
    /// Permanent slot pinning the nil singleton
    nil: Root<u8>,
    /// Permanent slot holding the operand stack (nil or a cons chain)
    operand_stack: Root<u8>,
    /// Permanent slot holding the continuation stack (nil or a cons chain)
    cont_stack: Root<u8>,
    /// Permanent slot holding `cons(forms, env)`, the global environments
    envs: Root<u8>,
    options: Options,
}

/// View of the root stack handed to the heap during allocation, so a
/// triggered collection can scan the roots while the heap is borrowed.
struct RootsView<'a> {
    roots: &'a mut RootStack,
}

impl GcContext for RootsView<'_> {
    fn visit_roots(&mut self, visitor: &mut impl GcVisitor) {
        self.roots.visit_roots(visitor);
    }
}

/// A copyable handle to an `InterpCell`.
///
/// Passed by value through the whole runtime. All copies alias the same
/// cell; the single-threaded evaluation model makes that sound in practice.
#[derive(Clone, Copy)]
pub struct Interp {
    ptr: NonNull<InterpCell>,
}

impl Deref for Interp {
    type Target = InterpCell;

    #[inline]
    fn deref(&self) -> &InterpCell {
        unsafe { self.ptr.as_ref() }
    }
}

impl DerefMut for Interp {
    #[inline]
    fn deref_mut(&mut self) -> &mut InterpCell {
        unsafe { self.ptr.as_mut() }
    }
}

impl Interp {
    fn from_cell(cell: &mut InterpCell) -> Interp {
        Interp {
            ptr: NonNull::from(cell),
        }
    }

    /// Allocate payload memory for a new object of `class`.
    ///
    /// May run a collection first; everything the caller holds across this
    /// call must be in a root slot. The returned payload is uninitialized
    /// and must be written before the next possible collection.
    pub(crate) fn alloc<T>(mut self, class: &'static ObjectClass) -> EvalResult<GcPtr<T>> {
        let cell: &mut InterpCell = &mut *self;
        let InterpCell { heap, roots, .. } = cell;
        let mut ctx = RootsView { roots };
        heap.alloc::<T>(&mut ctx, class).map_err(Error::from)
    }

    /// Push a root slot holding `value`
    #[inline]
    pub fn root(mut self, value: Obj) -> Root<u8> {
        self.roots.push(value)
    }

    /// The nil singleton
    #[inline]
    pub fn nil(self) -> Obj {
        self.nil.get()
    }

    /// Check whether `obj` is the nil singleton
    #[inline]
    pub fn is_nil(self, obj: Obj) -> bool {
        obj.ptr_eq(&self.nil())
    }

    /// Get the kind of an object
    #[inline]
    pub fn kind(self, obj: Obj) -> ObjKind {
        object::kind(obj)
    }

    /// The global environments pair `cons(forms, env)`
    #[inline]
    pub(crate) fn envs(self) -> Obj {
        self.envs.get()
    }

    // ------------------------------------------------------------------------
    // Operand stack
    // ------------------------------------------------------------------------

    /// Push a value onto the operand stack
    pub fn push_operand(self, value: Obj) -> EvalResult<()> {
        let cons = Cons::create(self, value, self.operand_stack.get())?;
        self.operand_stack.set(cons.cast());
        Ok(())
    }

    /// Pop the top of the operand stack
    pub fn pop_operand(self) -> EvalResult<Obj> {
        let stack = self.operand_stack.get();
        if !stack.is_class(&CONS_CLASS) {
            return Err(Error::Type("pop: stack underflow"));
        }
        let cons = stack.cast::<Cons>();
        let value = cons.head();
        self.operand_stack.set(cons.tail());
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Continuation stack
    // ------------------------------------------------------------------------

    /// Push a continuation onto the continuation stack
    pub fn push_cont(self, cont: Obj) -> EvalResult<()> {
        let cons = Cons::create(self, cont, self.cont_stack.get())?;
        self.cont_stack.set(cons.cast());
        Ok(())
    }

    /// Pop the next continuation, or `None` when the stack is empty
    pub fn pop_cont(self) -> EvalResult<Option<Obj>> {
        let stack = self.cont_stack.get();
        if !stack.is_class(&CONS_CLASS) {
            return Ok(None);
        }
        let cons = stack.cast::<Cons>();
        let cont = cons.head();
        self.cont_stack.set(cons.tail());
        Ok(Some(cont))
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Write raw bytes to the configured output
    pub fn print_bytes(self, bytes: &[u8]) {
        match self.options.dump_buffer() {
            Some(mut buffer) => buffer.extend_from_slice(bytes),
            None => {
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(bytes);
                let _ = stdout.flush();
            }
        }
    }
}

/// A guard that enters a root scope and exits it when dropped, so pushes and
/// pops stay balanced on every return path.
pub struct RootScopeGuard {
    cx: Interp,
    scope: RootScope,
}

impl RootScopeGuard {
    #[inline]
    pub fn new(cx: Interp) -> RootScopeGuard {
        RootScopeGuard {
            cx,
            scope: RootScope::enter(&cx.roots),
        }
    }
}

impl Drop for RootScopeGuard {
    #[inline]
    fn drop(&mut self) {
        let mut cx = self.cx;
        self.scope.exit_ref(&mut cx.roots);
    }
}

/// An owned interpreter instance.
pub struct Interpreter {
    cell: Box<InterpCell>,
}

impl Interpreter {
    /// Create an interpreter with default options
    pub fn new() -> EvalResult<Interpreter> {
        Self::with_options(Options::default())
    }

    /// Create an interpreter
    ///
    /// Allocates the nil singleton and seeds the global environments:
    /// `forms` binds `quote` and `fun`, `env` binds `print_atom`.
    pub fn with_options(options: Options) -> EvalResult<Interpreter> {
        let mut heap = Heap::new(options.heap_limit);
        heap.set_stress(options.gc_stress);

        let mut interpreter = Interpreter {
            cell: Box::new(InterpCell {
                heap,
                roots: RootStack::new(),
                nil: Root::dangling(),
                operand_stack: Root::dangling(),
                cont_stack: Root::dangling(),
                envs: Root::dangling(),
                options,
            }),
        };
        init_globals(interpreter.cx())?;
        Ok(interpreter)
    }

    /// Get the handle used by runtime functions
    #[inline]
    pub fn cx(&mut self) -> Interp {
        Interp::from_cell(&mut self.cell)
    }

    /// Parse and evaluate every expression in `source`, discarding results.
    ///
    /// Expressions are evaluated one at a time, in order, like the
    /// interactive top level.
    pub fn eval_source(&mut self, source: &[u8]) -> EvalResult<()> {
        let cx = self.cx();
        let mut parser = Parser::new(source);
        while let Some(expr) = parser.parse_expr(cx)? {
            eval_toplevel(cx, expr)?;
        }
        Ok(())
    }

    /// Parse and evaluate a single expression, returning its value
    pub fn eval_one(&mut self, source: &[u8]) -> EvalResult<Obj> {
        let cx = self.cx();
        let mut parser = Parser::new(source);
        match parser.parse_expr(cx)? {
            Some(expr) => eval_toplevel(cx, expr),
            None => Err(Error::Parse("syntax error: empty input".to_string())),
        }
    }

    /// Parse a single expression without evaluating it
    pub fn parse_one(&mut self, source: &[u8]) -> EvalResult<Option<Obj>> {
        let cx = self.cx();
        Parser::new(source).parse_expr(cx)
    }

    /// Seed an `eval` continuation for a parsed expression without running
    /// it. Drive it with `step`; the result value lands on the operand stack.
    pub fn begin(&mut self, expr: Obj) -> EvalResult<()> {
        seed_eval(self.cx(), expr)
    }

    /// Run one step of the continuation loop; `false` once it is empty
    pub fn step(&mut self) -> EvalResult<bool> {
        eval::step(self.cx())
    }

    /// Run a full collection cycle
    pub fn collect_garbage(&mut self) {
        let InterpCell { heap, roots, .. } = &mut *self.cell;
        let mut ctx = RootsView { roots };
        heap.collect(&mut ctx);
    }

    /// Number of objects currently on the heap
    pub fn num_objects(&self) -> usize {
        self.cell.heap.num_objects()
    }

    pub fn options(&self) -> &Options {
        &self.cell.options
    }
}

/// Seed the interpreter's globals. Runs once, before any user code.
fn init_globals(mut cx: Interp) -> EvalResult<()> {
    let nil = Nil::create(cx)?;
    let nil_slot = cx.roots.push(nil.cast());
    let operand_slot = cx.roots.push(nil.cast());
    let cont_slot = cx.roots.push(nil.cast());
    let envs_slot = cx.roots.push(nil.cast());
    cx.nil = nil_slot;
    cx.operand_stack = operand_slot;
    cx.cont_stack = cont_slot;
    cx.envs = envs_slot;

    let guard = RootScopeGuard::new(cx);
    let forms = cx.root(cx.nil());
    bind_native(cx, "quote", quote_form, forms)?;
    bind_native(cx, "fun", fun_form, forms)?;

    let env = cx.root(cx.nil());
    bind_native(cx, "print_atom", print_atom, env)?;

    let envs = Cons::create(cx, forms.get(), env.get())?;
    cx.envs.set(envs.cast());
    drop(guard);
    Ok(())
}

/// Bind `name` to a native function with nil data in the map rooted at `map`
fn bind_native(
    cx: Interp,
    name: &str,
    apply: crate::object::ApplyFn,
    map: Root<u8>,
) -> EvalResult<()> {
    let _guard = RootScopeGuard::new(cx);
    let atom = Atom::create_from_str(cx, name)?;
    let atom = cx.root(atom.cast());
    let function = Function::create(cx, apply, cx.nil())?;
    eval::map_cons(cx, atom.get(), function.cast(), map)
}

/// Evaluate one parsed expression to a value: seed an `eval` continuation,
/// drive the continuation loop until it empties, pop the result.
pub fn eval_toplevel(cx: Interp, expr: Obj) -> EvalResult<Obj> {
    seed_eval(cx, expr)?;
    eval::run(cx)?;
    cx.pop_operand()
}

fn seed_eval(cx: Interp, expr: Obj) -> EvalResult<()> {
    let _guard = RootScopeGuard::new(cx);
    let expr = cx.root(expr);
    let data = Cons::create(cx, cx.envs(), expr.get())?;
    let cont = Function::create(cx, eval::eval, data.cast())?;
    cx.push_cont(cont.cast())
}
