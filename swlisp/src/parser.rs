//! Parser adapter
//!
//! Builds expression trees on the heap from the token stream. The grammar is
//! tiny: an expression is a symbol or a parenthesized pair of expressions.
//!
//! The builder is iterative. While a pair's second element is still being
//! parsed, its `tail` slot temporarily holds the link to the enclosing
//! unfinished pair, so the chain of open pairs is threaded through the tree
//! itself; a pair whose `head` is still nil is waiting for its first
//! element. Both working references live in root slots, because every
//! `create_*` call below them can trigger a collection.

use crate::error::{Error, EvalResult};
use crate::interp::{Interp, RootScopeGuard};
use crate::lexer::{Lexer, Token};
use crate::object::{Atom, Cons, Obj};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a [u8]) -> Parser<'a> {
        Parser {
            lexer: Lexer::new(source),
        }
    }

    /// Parse one complete expression.
    ///
    /// Returns `None` at a clean end of input; end of input inside an
    /// expression is a syntax error.
    pub fn parse_expr(&mut self, cx: Interp) -> EvalResult<Option<Obj>> {
        let _guard = RootScopeGuard::new(cx);
        let parent = cx.root(cx.nil());
        let mut in_expression = false;

        loop {
            let token = match self.lexer.next_token() {
                Some(token) => token,
                None if in_expression => {
                    return Err(Error::Parse(
                        "syntax error: unexpected end of input".to_string(),
                    ))
                }
                None => return Ok(None),
            };
            in_expression = true;

            match token {
                Token::Symbol(bytes) => {
                    let atom = Atom::create(cx, bytes)?;
                    let expr = cx.root(atom.cast());

                    // Attach the finished expression to the open-pair chain,
                    // closing pairs as their second elements complete
                    loop {
                        if cx.is_nil(parent.get()) {
                            return Ok(Some(expr.get()));
                        }

                        let open = parent.get().cast::<Cons>();
                        if cx.is_nil(open.head()) {
                            // First element done; the second is parsed by the
                            // outer loop
                            unsafe {
                                (*open.as_ptr()).head = expr.get();
                            }
                            break;
                        }

                        // Second element done: close this pair and continue
                        // climbing with it as the finished expression
                        let enclosing = open.tail();
                        unsafe {
                            (*open.as_ptr()).tail = expr.get();
                        }
                        expr.set(parent.get());
                        parent.set(enclosing);

                        match self.lexer.next_token() {
                            Some(Token::RParen) => {}
                            _ => {
                                return Err(Error::Parse(
                                    "syntax error: pair: missing ')'".to_string(),
                                ))
                            }
                        }
                    }
                }
                Token::LParen => {
                    let open = Cons::create(cx, cx.nil(), parent.get())?;
                    parent.set(open.cast());
                }
                Token::RParen => {
                    return Err(Error::Parse(
                        "syntax error: expected symbol or '('".to_string(),
                    ))
                }
            }
        }
    }
}
