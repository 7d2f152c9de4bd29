//! Programs as data.
//!
//! A [`Program`] describes a computation over an instruction vocabulary `I`
//! that eventually produces an `A`. It is built from three primitives:
//!
//! - [`Program::of`] lifts a value that needs no effect,
//! - [`Program::emit`] requests a single instruction,
//! - [`Program::chain`] sequences a program with a continuation over its result.
//!
//! Building a program performs no effects. Nodes are reference counted, so
//! cloning is cheap and every clone describes the same computation.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ProgramError;
use crate::instruction::Instruction;
use crate::value::{Expect, ProgramValue, Value};

/// What a continuation produces: the rest of the program.
pub(crate) type Step<I> = Result<Arc<Node<I>>, ProgramError>;

/// Maps the result of one step to the rest of the program.
pub(crate) type Continuation<I> = Arc<dyn Fn(Value) -> Step<I> + Send + Sync>;

/// Untyped program representation shared by every `Program<I, _>`.
pub(crate) enum Node<I> {
    Pure(Value),
    Sequence(Arc<Node<I>>, Continuation<I>),
    Effect { instruction: I, expect: Expect },
    /// A program picked up part way through: run `head`, then the frames.
    Resumed(Arc<Node<I>>, Frames<I>),
}

/// Continuations waiting for a result, innermost first.
///
/// A persistent list: pushing shares the tail, so a resumable view keeps its
/// stack while later steps push and pop their own.
pub(crate) struct Frames<I>(Option<Arc<Frame<I>>>);

struct Frame<I> {
    continuation: Continuation<I>,
    rest: Frames<I>,
}

impl<I> Frames<I> {
    pub(crate) fn empty() -> Self {
        Self(None)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub(crate) fn push(self, continuation: Continuation<I>) -> Self {
        Self(Some(Arc::new(Frame {
            continuation,
            rest: self,
        })))
    }

    pub(crate) fn pop(&self) -> Option<(Continuation<I>, Frames<I>)> {
        self.0
            .as_ref()
            .map(|frame| (Arc::clone(&frame.continuation), frame.rest.clone()))
    }

    /// These frames, innermost still on top, above `base`.
    pub(crate) fn stacked_on(&self, base: Frames<I>) -> Frames<I> {
        if base.is_empty() {
            return self.clone();
        }
        let mut continuations = Vec::new();
        let mut frames = self;
        while let Some(frame) = &frames.0 {
            continuations.push(Arc::clone(&frame.continuation));
            frames = &frame.rest;
        }
        continuations.into_iter().rev().fold(base, Frames::push)
    }

    /// Hand `value` to the innermost continuation; the rest stay pending.
    pub(crate) fn resume(&self, value: Value) -> Step<I> {
        let Some((continuation, rest)) = self.pop() else {
            return Ok(Arc::new(Node::Pure(value)));
        };
        let head = continuation(value)?;
        if rest.is_empty() {
            return Ok(head);
        }
        Ok(Arc::new(Node::Resumed(head, rest)))
    }
}

impl<I> Clone for Frames<I> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

// Unlinks the tail in a loop so a deep stack of pending frames is released
// without recursion.
impl<I> Drop for Frame<I> {
    fn drop(&mut self) {
        let mut rest = self.rest.0.take();
        while let Some(frame) = rest {
            match Arc::into_inner(frame) {
                Some(mut frame) => rest = frame.rest.0.take(),
                None => break,
            }
        }
    }
}

// Long left-nested chains would otherwise be dropped recursively, one stack
// frame per node.
impl<I> Drop for Node<I> {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_first(self, &mut pending);
        while let Some(node) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(node) {
                detach_first(&mut node, &mut pending);
            }
        }
    }
}

fn detach_first<I>(node: &mut Node<I>, pending: &mut Vec<Arc<Node<I>>>) {
    if let Node::Sequence(first, _) | Node::Resumed(first, _) = node {
        if Arc::strong_count(first) == 1 {
            pending.push(std::mem::replace(first, Arc::new(Node::Pure(Value::unit()))));
        }
    }
}

impl<I: fmt::Debug> fmt::Debug for Node<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Pure(value) => f.debug_tuple("Pure").field(value).finish(),
            Node::Sequence(first, _) => f
                .debug_tuple("Sequence")
                .field(first)
                .field(&format_args!("<continuation>"))
                .finish(),
            Node::Effect { instruction, expect } => f
                .debug_struct("Effect")
                .field("instruction", instruction)
                .field("output", &expect.name)
                .finish(),
            Node::Resumed(head, _) => f
                .debug_tuple("Resumed")
                .field(head)
                .field(&format_args!("<frames>"))
                .finish(),
        }
    }
}

/// An immutable description of a computation over the vocabulary `I`
/// producing an `A`.
pub struct Program<I, A> {
    pub(crate) node: Arc<Node<I>>,
    _output: PhantomData<fn() -> A>,
}

impl<I, A> Program<I, A> {
    pub(crate) fn from_node(node: Arc<Node<I>>) -> Self {
        Self {
            node,
            _output: PhantomData,
        }
    }

    /// Whether this program is a lifted value with nothing left to run.
    pub fn is_pure(&self) -> bool {
        matches!(*self.node, Node::Pure(_))
    }

    /// Whether this program is exactly one instruction.
    pub fn is_effect(&self) -> bool {
        matches!(*self.node, Node::Effect { .. })
    }

    /// Whether this program sequences a step with a continuation.
    pub fn is_sequence(&self) -> bool {
        matches!(*self.node, Node::Sequence(..) | Node::Resumed(..))
    }
}

impl<I: Instruction, A: ProgramValue> Program<I, A> {
    /// Lift a value into a program that produces it without any effect.
    pub fn of(value: A) -> Self {
        Self::from_node(Arc::new(Node::Pure(Value::new(value))))
    }

    /// Request a single instruction whose result is an `A`.
    ///
    /// Derived vocabularies call this from their generated constructors, which
    /// fix `A` to the output declared for each tag.
    pub fn emit(instruction: I) -> Self {
        Self::from_node(Arc::new(Node::Effect {
            instruction,
            expect: Expect::of::<A>(),
        }))
    }

    /// Run this program, then the program `f` builds from its result.
    ///
    /// `f` is only called once the result is known, so branches that are
    /// never taken are never built.
    pub fn chain<B, F>(self, f: F) -> Program<I, B>
    where
        B: ProgramValue,
        F: Fn(A) -> Program<I, B> + Send + Sync + 'static,
    {
        let continuation: Continuation<I> = Arc::new(move |value: Value| -> Step<I> {
            let input = value.downcast::<A>().map_err(|value| ProgramError::ValueType {
                expected: type_name::<A>(),
                found: value.type_name(),
            })?;
            Ok(f(input).node)
        });
        Program::from_node(Arc::new(Node::Sequence(self.node, continuation)))
    }

    /// Run this program, discard its result, then run `next`.
    pub fn and_then<B: ProgramValue>(self, next: Program<I, B>) -> Program<I, B> {
        let next = next.node;
        let continuation: Continuation<I> =
            Arc::new(move |_: Value| -> Step<I> { Ok(Arc::clone(&next)) });
        Program::from_node(Arc::new(Node::Sequence(self.node, continuation)))
    }

    /// Transform this program's result with a pure function.
    pub fn map<B, F>(self, f: F) -> Program<I, B>
    where
        B: ProgramValue,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        self.chain(move |value| Program::of(f(value)))
    }

    /// Discard this program's result.
    pub fn void(self) -> Program<I, ()> {
        self.map(|_| ())
    }
}

impl<I, A> Clone for Program<I, A> {
    fn clone(&self) -> Self {
        Self::from_node(Arc::clone(&self.node))
    }
}

impl<I: fmt::Debug, A> fmt::Debug for Program<I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Program").field(&self.node).finish()
    }
}
