//! End-to-end interpreter scenarios

use swlisp::error::Error;
use swlisp::interp::eval_toplevel;
use swlisp::object::{destruct_cons, Atom, Obj};
use swlisp::{Interp, Interpreter, ObjKind, OptionsBuilder};

fn capturing() -> Interpreter {
    Interpreter::with_options(OptionsBuilder::new().capture_output().build()).unwrap()
}

fn output(interpreter: &Interpreter) -> Vec<u8> {
    interpreter.options().dump_buffer().unwrap().clone()
}

fn atom_text(cx: Interp, obj: Obj) -> String {
    assert_eq!(cx.kind(obj), ObjKind::Atom);
    String::from_utf8_lossy(obj.cast::<Atom>().bytes()).into_owned()
}

// ============================================================================
// Printing
// ============================================================================

#[test]
fn print_quoted_atom() {
    let mut interpreter = capturing();
    interpreter
        .eval_source(b"(print_atom (quote Hello))")
        .unwrap();
    assert_eq!(output(&interpreter), b"Hello");
}

#[test]
fn print_through_identity_function() {
    let mut interpreter = capturing();
    interpreter
        .eval_source(b"((fun (x (print_atom x))) (quote World))")
        .unwrap();
    assert_eq!(output(&interpreter), b"World");
}

#[test]
fn multiple_toplevel_expressions_run_in_order() {
    let mut interpreter = capturing();
    interpreter
        .eval_source(b"(print_atom (quote a)) (print_atom (quote b)) (print_atom (quote c))")
        .unwrap();
    assert_eq!(output(&interpreter), b"abc");
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn identity_function_returns_argument() {
    let mut interpreter = capturing();
    let cx = interpreter.cx();
    let result = interpreter.eval_one(b"((fun (x x)) (quote y))").unwrap();
    assert_eq!(atom_text(cx, result), "y");
}

#[test]
fn quote_returns_tree_structurally_intact() {
    let mut interpreter = capturing();
    let cx = interpreter.cx();
    let result = interpreter.eval_one(b"(quote (a b))").unwrap();

    let (a, b) = destruct_cons(result).unwrap();
    assert_eq!(atom_text(cx, a), "a");
    assert_eq!(atom_text(cx, b), "b");
}

#[test]
fn quote_preserves_subtree_identity() {
    let mut interpreter = capturing();
    let cx = interpreter.cx();

    let expr = interpreter.parse_one(b"(quote (a b))").unwrap().unwrap();
    let (_quote, quoted) = destruct_cons(expr).unwrap();

    let result = eval_toplevel(cx, expr).unwrap();
    assert!(result.ptr_eq(&quoted));
}

#[test]
fn fun_evaluates_to_a_function() {
    let mut interpreter = capturing();
    let cx = interpreter.cx();
    let result = interpreter.eval_one(b"(fun (x x))").unwrap();
    assert_eq!(cx.kind(result), ObjKind::Function);
}

#[test]
fn closures_capture_their_environment() {
    let mut interpreter = capturing();
    let cx = interpreter.cx();
    // The inner fun's body sees the outer binding of x
    let result = interpreter
        .eval_one(b"(((fun (x (fun (ignored x)))) (quote captured)) (quote other))")
        .unwrap();
    assert_eq!(atom_text(cx, result), "captured");
}

#[test]
fn fun_parameter_may_shadow_a_form_name() {
    let mut interpreter = capturing();
    let cx = interpreter.cx();
    // `quote` in operand position is an ordinary variable; in head position
    // the form still wins
    let result = interpreter
        .eval_one(b"((fun (quote quote)) (quote value))")
        .unwrap();
    assert_eq!(atom_text(cx, result), "value");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn unbound_variable_is_an_error() {
    let mut interpreter = capturing();
    let err = interpreter.eval_one(b"nowhere").unwrap_err();
    assert!(matches!(err, Error::Unbound(ref name) if name == "nowhere"));
    assert_eq!(err.to_string(), "eval: no such binding: nowhere");
}

#[test]
fn applying_a_non_function_is_an_error() {
    let mut interpreter = capturing();
    let err = interpreter
        .eval_one(b"((fun (x (x x))) (quote notfun))")
        .unwrap_err();
    assert_eq!(err.to_string(), "apply: not a function");
}

#[test]
fn fun_param_must_be_an_atom() {
    let mut interpreter = capturing();
    let err = interpreter
        .eval_one(b"((fun ((a b) (quote x))) (quote y))")
        .unwrap_err();
    assert_eq!(err.to_string(), "fun: param should be an atom");
}

#[test]
fn print_atom_rejects_pairs() {
    let mut interpreter = capturing();
    let err = interpreter
        .eval_one(b"(print_atom (quote (a b)))")
        .unwrap_err();
    assert_eq!(err.to_string(), "print_atom: argument is not an atom");
}

#[test]
fn syntax_errors_are_fatal() {
    let mut interpreter = capturing();
    let err = interpreter.eval_source(b"(a b").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

// ============================================================================
// Garbage collection behavior
// ============================================================================

/// Everything evaluation allocates beyond the global environment is garbage
/// once the result is discarded.
#[test]
fn evaluation_garbage_is_reclaimed() {
    let mut interpreter = capturing();
    interpreter.collect_garbage();
    let baseline = interpreter.num_objects();

    for _ in 0..10 {
        interpreter
            .eval_source(b"((fun (x (print_atom x))) (quote W))")
            .unwrap();
    }

    interpreter.collect_garbage();
    assert_eq!(interpreter.num_objects(), baseline);
}

/// Operand-stack references keep objects alive; dropping them frees the lot
/// on the next cycle.
#[test]
fn operands_root_their_chains() {
    let mut interpreter = Interpreter::with_options(
        OptionsBuilder::new().heap_limit(200).capture_output().build(),
    )
    .unwrap();
    let cx = interpreter.cx();
    interpreter.collect_garbage();
    let baseline = interpreter.num_objects();

    // Build a 100-pair chain. The working reference is rooted by each
    // Cons::create while it allocates, and no collection runs in between.
    let mut chain = cx.nil();
    for _ in 0..100 {
        chain = swlisp::object::Cons::create(cx, cx.nil(), chain).unwrap().cast();
    }
    cx.push_operand(chain).unwrap();

    interpreter.collect_garbage();
    // 100 pairs + the stack cell holding them
    assert_eq!(interpreter.num_objects(), baseline + 101);

    // Drop the root; the next collection reclaims everything
    let _ = cx.pop_operand().unwrap();
    interpreter.collect_garbage();
    assert_eq!(interpreter.num_objects(), baseline);
}

/// The soft limit triggers collection rather than failure while enough of
/// the heap is garbage, and fails only when survivors genuinely fill it.
#[test]
fn soft_limit_collects_then_errors() {
    let mut interpreter = Interpreter::with_options(
        OptionsBuilder::new().heap_limit(60).capture_output().build(),
    )
    .unwrap();
    let cx = interpreter.cx();

    // Far more allocation than the limit, all garbage: never an error
    for _ in 0..500 {
        swlisp::object::Cons::create(cx, cx.nil(), cx.nil()).unwrap();
    }

    // Now pin cells until the heap is genuinely full
    let mut last = Ok(());
    for _ in 0..100 {
        last = cx.push_operand(cx.nil());
        if last.is_err() {
            break;
        }
    }
    let err = last.unwrap_err();
    assert_eq!(err.to_string(), "object count limit reached");
}

/// The infinite iteration program from the language's motivating example:
/// tail calls plus collection keep the object count bounded forever.
#[test]
fn looping_program_runs_in_bounded_memory() {
    let source = b"((fun (iter (iter iter)))
                   (fun (iter ((fun (v (iter iter)))
                               (print_atom (quote Hi))))))";

    let mut interpreter = capturing();
    let expr = interpreter.parse_one(source).unwrap().unwrap();
    interpreter.begin(expr).unwrap();

    for _ in 0..20_000 {
        assert!(interpreter.step().unwrap());
        assert!(interpreter.num_objects() <= interpreter.options().heap_limit);
    }

    let printed = output(&interpreter);
    assert!(printed.len() >= 2 * 100, "expected many iterations");
    assert!(printed.chunks(2).all(|chunk| chunk == &b"Hi"[..]));
}

/// Self-referential closure application under collect-on-every-allocation:
/// marking terminates on cyclic reference structure and nothing corrupts.
#[test]
fn cyclic_closures_survive_stress_collection() {
    let mut interpreter = Interpreter::with_options(
        OptionsBuilder::new().gc_stress(true).capture_output().build(),
    )
    .unwrap();
    let cx = interpreter.cx();

    let result = interpreter
        .eval_one(b"((fun (f (f f))) (fun (g g)))")
        .unwrap();
    assert_eq!(cx.kind(result), ObjKind::Function);

    interpreter.collect_garbage();
    interpreter
        .eval_source(b"(print_atom (quote ok))")
        .unwrap();
    assert_eq!(output(&interpreter), b"ok");
}

/// The whole printing pipeline, under stress timing.
#[test]
fn stress_mode_evaluates_identically() {
    let source = b"((fun (x (print_atom x))) (quote Same))";

    let mut plain = capturing();
    plain.eval_source(source).unwrap();

    let mut stressed = Interpreter::with_options(
        OptionsBuilder::new().gc_stress(true).capture_output().build(),
    )
    .unwrap();
    stressed.eval_source(source).unwrap();

    assert_eq!(output(&plain), output(&stressed));
}

/// Deeply right-nested applications must not consume host stack: the
/// continuation chain carries the pending work instead.
#[test]
fn deep_nesting_needs_no_host_stack() {
    let depth = 10_000;
    let mut source = Vec::new();
    for _ in 0..depth {
        source.extend_from_slice(b"((fun (x x)) ");
    }
    source.extend_from_slice(b"(quote deep)");
    for _ in 0..depth {
        source.extend_from_slice(b")");
    }

    let mut interpreter = Interpreter::with_options(
        OptionsBuilder::new()
            .heap_limit(1_000_000)
            .capture_output()
            .build(),
    )
    .unwrap();
    let cx = interpreter.cx();
    let result = interpreter.eval_one(&source).unwrap();
    assert_eq!(atom_text(cx, result), "deep");
}
