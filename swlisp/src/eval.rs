//! The evaluator
//!
//! Evaluation is a continuation loop: the driver pops a `function` object
//! from the continuation stack and invokes its apply routine, which may push
//! operands and further continuations, until the stack is empty. The host
//! stack is never used for recursion, so evaluation depth is bounded only by
//! heap memory.
//!
//! Environments are two parallel association lists carried as
//! `envs = cons(forms, env)`. `forms` is consulted only when the head of an
//! application is a bare atom; an atom in any other position is looked up in
//! `env` alone. A `fun` parameter can therefore reuse a form's name without
//! affecting applications of that form.
//!
//! Tail calls fall out of the design: invoking a form pushes no apply
//! continuation, so `fun` application (whose body continuation replaces the
//! current one) runs in constant continuation-stack space.

use crate::error::{Error, EvalResult};
use crate::interp::{Interp, RootScopeGuard};
use crate::object::{
    as_atom, as_function, atom_equals, destruct_cons, kind, Cons, Function, Obj, ObjKind,
};
use crate::roots::Root;

/// Apply a `function` object: invoke its native routine with its data
pub fn apply(cx: Interp, function: Obj) -> EvalResult<()> {
    let function = as_function(function)?;
    let apply_fn = function.apply;
    let data = function.data;
    apply_fn(cx, data)
}

/// Run one step of the continuation loop.
///
/// Pops and applies the next continuation; returns `false` once the stack is
/// empty.
pub fn step(cx: Interp) -> EvalResult<bool> {
    match cx.pop_cont()? {
        Some(cont) => {
            apply(cx, cont)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Drive the continuation loop to completion
pub fn run(cx: Interp) -> EvalResult<()> {
    while step(cx)? {}
    Ok(())
}

/// Look up `key` in an association list of `cons(key, value)` entries
pub fn assoc(cx: Interp, key: Obj, map: Obj) -> EvalResult<Option<Obj>> {
    let mut map = map;
    while !cx.is_nil(map) {
        let (entry, rest) = destruct_cons(map)?;
        let (entry_key, entry_value) = destruct_cons(entry)?;
        if atom_equals(key, entry_key)? {
            return Ok(Some(entry_value));
        }
        map = rest;
    }
    Ok(None)
}

/// Prepend a `key ↦ value` entry to the association list in the `map` slot
pub fn map_cons(cx: Interp, key: Obj, value: Obj, map: Root<u8>) -> EvalResult<()> {
    let entry = Cons::create(cx, key, value)?;
    let extended = Cons::create(cx, entry.cast(), map.get())?;
    map.set(extended.cast());
    Ok(())
}

/// The `eval` apply routine. `data` is `cons(envs, expr)`.
pub fn eval(cx: Interp, data: Obj) -> EvalResult<()> {
    let (envs, expr) = destruct_cons(data)?;
    let (forms, env) = destruct_cons(envs)?;

    match kind(expr) {
        ObjKind::Atom => {
            // Variable reference
            match assoc(cx, expr, env)? {
                Some(value) => cx.push_operand(value),
                None => Err(unbound(expr)),
            }
        }
        ObjKind::Cons => {
            let (f_expr, arg_expr) = destruct_cons(expr)?;

            // A bare atom in head position may name a form, which receives
            // its argument unevaluated
            let form = if kind(f_expr) == ObjKind::Atom {
                assoc(cx, f_expr, forms)?
            } else {
                None
            };

            if let Some(form) = form {
                let _guard = RootScopeGuard::new(cx);
                let form = cx.root(form);
                let operand = Cons::create(cx, envs, arg_expr)?;
                cx.push_operand(operand.cast())?;
                // Direct invocation: no apply continuation, so forms are
                // tail-called
                apply(cx, form.get())
            } else {
                // Ordinary application: evaluate the argument, then the
                // function, then apply. Pushed in reverse so they pop in
                // that order.
                let _guard = RootScopeGuard::new(cx);
                let envs = cx.root(envs);
                let f_expr = cx.root(f_expr);
                let arg_expr = cx.root(arg_expr);

                let cont = Function::create(cx, pop_apply, cx.nil())?;
                cx.push_cont(cont.cast())?;

                let data = Cons::create(cx, envs.get(), f_expr.get())?;
                let cont = Function::create(cx, eval, data.cast())?;
                cx.push_cont(cont.cast())?;

                let data = Cons::create(cx, envs.get(), arg_expr.get())?;
                let cont = Function::create(cx, eval, data.cast())?;
                cx.push_cont(cont.cast())?;
                Ok(())
            }
        }
        _ => Err(Error::Type("cannot evaluate: not an atom or a cons")),
    }
}

fn unbound(atom: Obj) -> Error {
    let name = match as_atom(atom) {
        Ok(atom) => String::from_utf8_lossy(atom.bytes()).into_owned(),
        Err(_) => "<non-atom>".to_string(),
    };
    Error::Unbound(name)
}

/// Continuation that applies an evaluated function to an evaluated argument:
/// the function is on top of the operand stack, the argument beneath it
pub(crate) fn pop_apply(cx: Interp, _data: Obj) -> EvalResult<()> {
    let function = cx.pop_operand()?;
    apply(cx, function)
}

/// The `quote` form: push the argument expression unevaluated
pub(crate) fn quote_form(cx: Interp, _data: Obj) -> EvalResult<()> {
    let operand = cx.pop_operand()?;
    let (_envs, body) = destruct_cons(operand)?;
    cx.push_operand(body)
}

/// The `fun` form: capture the unevaluated `(param body)` tree together with
/// the defining environments in a fresh function value
pub(crate) fn fun_form(cx: Interp, _data: Obj) -> EvalResult<()> {
    let operand = cx.pop_operand()?;
    let function = Function::create(cx, fun_apply, operand)?;
    cx.push_operand(function.cast())
}

/// Application of a `fun`-made function. `data` is `cons(envs, (param body))`;
/// the evaluated argument is on the operand stack.
pub(crate) fn fun_apply(cx: Interp, data: Obj) -> EvalResult<()> {
    let argument = cx.pop_operand()?;

    let (envs, expr) = destruct_cons(data)?;
    let (forms, env) = destruct_cons(envs)?;
    let (param, body) = destruct_cons(expr)?;

    if kind(param) != ObjKind::Atom {
        return Err(Error::Type("fun: param should be an atom"));
    }

    let _guard = RootScopeGuard::new(cx);
    let forms = cx.root(forms);
    let body = cx.root(body);
    let new_env = cx.root(env);

    // Extend the environment with param ↦ argument, then continue into the
    // body. Pushing `eval` as a continuation (rather than calling it) keeps
    // this a tail call.
    map_cons(cx, param, argument, new_env)?;
    let new_envs = Cons::create(cx, forms.get(), new_env.get())?;
    let new_data = Cons::create(cx, new_envs.cast(), body.get())?;
    let cont = Function::create(cx, eval, new_data.cast())?;
    cx.push_cont(cont.cast())
}

/// The `print_atom` builtin: write the atom's bytes, push nil
pub(crate) fn print_atom(cx: Interp, _data: Obj) -> EvalResult<()> {
    let argument = cx.pop_operand()?;
    if kind(argument) != ObjKind::Atom {
        return Err(Error::Type("print_atom: argument is not an atom"));
    }
    cx.print_bytes(argument.cast::<crate::object::Atom>().bytes());
    cx.push_operand(cx.nil())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Interpreter, RootScopeGuard};
    use crate::object::Atom;

    #[test]
    fn operand_stack_is_lifo() {
        let mut interpreter = Interpreter::new().unwrap();
        let cx = interpreter.cx();

        let a = Atom::create_from_str(cx, "a").unwrap().cast();
        cx.push_operand(a).unwrap();
        let b = Atom::create_from_str(cx, "b").unwrap().cast();
        cx.push_operand(b).unwrap();

        assert!(cx.pop_operand().unwrap().ptr_eq(&b));
        assert!(cx.pop_operand().unwrap().ptr_eq(&a));

        let err = cx.pop_operand().unwrap_err();
        assert_eq!(err.to_string(), "pop: stack underflow");
    }

    #[test]
    fn pop_cont_on_empty_stack_returns_none() {
        let mut interpreter = Interpreter::new().unwrap();
        let cx = interpreter.cx();
        assert!(cx.pop_cont().unwrap().is_none());
    }

    #[test]
    fn assoc_compares_atoms_by_contents_and_finds_newest() {
        let mut interpreter = Interpreter::new().unwrap();
        let cx = interpreter.cx();
        let _guard = RootScopeGuard::new(cx);

        let map = cx.root(cx.nil());
        let key = cx.root(Atom::create_from_str(cx, "key").unwrap().cast());
        let old = cx.root(Atom::create_from_str(cx, "old").unwrap().cast());
        let new = cx.root(Atom::create_from_str(cx, "new").unwrap().cast());

        map_cons(cx, key.get(), old.get(), map).unwrap();
        map_cons(cx, key.get(), new.get(), map).unwrap();

        // A distinct atom with the same bytes still matches
        let probe: Obj = Atom::create_from_str(cx, "key").unwrap().cast();
        assert!(!probe.ptr_eq(&key.get()));
        let found = assoc(cx, probe, map.get()).unwrap().unwrap();
        assert!(found.ptr_eq(&new.get()));

        let missing = Atom::create_from_str(cx, "other").unwrap().cast();
        assert!(assoc(cx, missing, map.get()).unwrap().is_none());
    }
}
