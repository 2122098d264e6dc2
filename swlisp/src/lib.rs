//! swlisp runtime
//!
//! An interpreter for a tiny expression language (atoms, pairs, `quote`,
//! and `fun`) built around two pieces of engineering:
//!
//! - A precise, in-place mark-sweep garbage collector (`swlisp_gc`) whose
//!   mark phase is the Schorr-Waite pointer-reversal algorithm, driven
//!   through per-class vtables.
//! - An explicit continuation stack that removes all host-stack recursion
//!   from evaluation and makes form invocation a tail call.
//!
//! The operand and continuation stacks are themselves heap-allocated cons
//! chains held in root slots, so the collector walks suspended evaluation
//! state like any other data.
//!
//! ```
//! use swlisp::{Interpreter, OptionsBuilder};
//!
//! let options = OptionsBuilder::new().capture_output().build();
//! let mut interpreter = Interpreter::with_options(options).unwrap();
//! interpreter.eval_source(b"(print_atom (quote Hello))").unwrap();
//!
//! let output = interpreter.options().dump_buffer().unwrap().clone();
//! assert_eq!(output, b"Hello");
//! ```

pub mod error;
pub mod eval;
pub mod interp;
pub mod lexer;
pub mod object;
pub mod options;
pub mod parser;
pub mod roots;

pub use error::{Error, EvalResult};
pub use interp::{Interp, Interpreter, RootScopeGuard};
pub use object::{Obj, ObjKind};
pub use options::{Options, OptionsBuilder};
