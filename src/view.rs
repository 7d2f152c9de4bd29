//! Normalization of programs into their two-case view.
//!
//! [`Program::view`] rewrites a program until it is either finished
//! ([`ProgramView::Return`]) or blocked on exactly one instruction
//! ([`ProgramView::Continue`]). Nested sequences are re-associated to the
//! right as they are met:
//!
//! ```text
//! Sequence(Sequence(m, g), k)  =>  Sequence(m, |r| Sequence(g(r), k))
//! ```
//!
//! so the walk always reaches the left-most step first and each sequence
//! node is rewritten at most once over a whole run, however the program was
//! nested when it was built.
//!
//! The pending continuations (`k` above, and every `k` outside it) live on an
//! explicit stack of frames rather than inside nested closures, so neither
//! resuming nor dropping a half-run program recurses over them.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::error::ProgramError;
use crate::instruction::Instruction;
use crate::program::{Frames, Node, Program};
use crate::value::{Expect, ProgramValue, Value};

/// Canonical form of a program.
pub enum ProgramView<I, A> {
    /// The computation finished with this value.
    Return(A),
    /// `I` must be interpreted next; its result resumes the rest.
    Continue(I, Resume<I, A>),
}

/// What to do with the result of the instruction a view is blocked on.
pub struct Resume<I, A> {
    tag: &'static str,
    expect: Expect,
    frames: Frames<I>,
    _output: PhantomData<fn() -> A>,
}

impl<I: Instruction, A: ProgramValue> Resume<I, A> {
    /// Type name the instruction was emitted expecting.
    pub fn expects(&self) -> &'static str {
        self.expect.name
    }

    /// Feed the instruction's result in and get the rest of the program.
    ///
    /// The same view may be resumed more than once; each call builds the
    /// continuation afresh.
    pub fn resume(&self, result: Value) -> Result<Program<I, A>, ProgramError> {
        if !self.expect.matches(&result) {
            return Err(ProgramError::ResumeType {
                tag: self.tag,
                expected: self.expect.name,
                found: result.type_name(),
            });
        }
        let node = self.frames.resume(result)?;
        Ok(Program::from_node(node))
    }

    /// Typed form of [`Resume::resume`].
    pub fn resume_with<T: ProgramValue>(&self, result: T) -> Result<Program<I, A>, ProgramError> {
        self.resume(Value::new(result))
    }
}

/// Untyped result of normalization.
pub(crate) enum Normal<I> {
    Done(Value),
    Next {
        instruction: I,
        expect: Expect,
        frames: Frames<I>,
    },
}

/// Rewrite `root` into its normal form, returning the form and the number
/// of sequence re-associations performed.
pub(crate) fn normalize<I: Instruction>(
    root: &Arc<Node<I>>,
) -> Result<(Normal<I>, usize), ProgramError> {
    let mut node = Arc::clone(root);
    let mut frames = Frames::empty();
    let mut rewrites = 0;
    loop {
        let next = match &*node {
            Node::Pure(value) => match frames.pop() {
                None => return Ok((Normal::Done(value.clone()), rewrites)),
                // Strict: the value is already here, so run the continuation now.
                Some((continuation, rest)) => {
                    frames = rest;
                    continuation(value.clone())?
                }
            },
            Node::Effect { instruction, expect } => {
                let normal = Normal::Next {
                    instruction: instruction.clone(),
                    expect: *expect,
                    frames,
                };
                return Ok((normal, rewrites));
            }
            Node::Sequence(first, continuation) => {
                if matches!(**first, Node::Sequence(..) | Node::Resumed(..)) {
                    rewrites += 1;
                }
                frames = frames.push(Arc::clone(continuation));
                Arc::clone(first)
            }
            Node::Resumed(head, pending) => {
                frames = pending.stacked_on(frames);
                Arc::clone(head)
            }
        };
        node = next;
    }
}

impl<I: Instruction, A: ProgramValue> Program<I, A> {
    /// Normalize this program into its [`ProgramView`].
    ///
    /// Pure: no handler is consulted and no instruction runs. Viewing the same
    /// program twice yields equal views.
    pub fn view(&self) -> Result<ProgramView<I, A>, ProgramError> {
        let (normal, rewrites) = normalize(&self.node)?;
        trace!(rewrites, "normalized program");
        match normal {
            Normal::Done(value) => {
                let value = value.downcast::<A>().map_err(|value| ProgramError::ValueType {
                    expected: std::any::type_name::<A>(),
                    found: value.type_name(),
                })?;
                Ok(ProgramView::Return(value))
            }
            Normal::Next {
                instruction,
                expect,
                frames,
            } => {
                let resume = Resume {
                    tag: instruction.tag(),
                    expect,
                    frames,
                    _output: PhantomData,
                };
                Ok(ProgramView::Continue(instruction, resume))
            }
        }
    }
}

impl<I: Instruction, A: ProgramValue> ProgramView<I, A> {
    /// Whether the computation has finished.
    pub fn is_return(&self) -> bool {
        matches!(self, ProgramView::Return(_))
    }

    /// The instruction this view is blocked on, if any.
    pub fn instruction(&self) -> Option<&I> {
        match self {
            ProgramView::Return(_) => None,
            ProgramView::Continue(instruction, _) => Some(instruction),
        }
    }
}

impl<I: fmt::Debug, A: fmt::Debug> fmt::Debug for ProgramView<I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramView::Return(value) => f.debug_tuple("Return").field(value).finish(),
            ProgramView::Continue(instruction, resume) => f
                .debug_tuple("Continue")
                .field(instruction)
                .field(&format_args!("<resume: {}>", resume.expect.name))
                .finish(),
        }
    }
}

/// Views are equal when they return equal values, or are blocked on equal
/// instructions emitted with the same result type. Continuations cannot be
/// compared directly; resume both to compare what follows.
impl<I: PartialEq, A: PartialEq> PartialEq for ProgramView<I, A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ProgramView::Return(a), ProgramView::Return(b)) => a == b,
            (ProgramView::Continue(i, r), ProgramView::Continue(j, s)) => {
                i == j && r.expect == s.expect
            }
            _ => false,
        }
    }
}
