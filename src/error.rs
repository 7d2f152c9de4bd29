// Errors raised while normalizing and interpreting programs.
//
// Construction never fails; everything here surfaces once a program is
// viewed or driven against a handler.

use std::fmt::{Debug, Display};
use thiserror::Error;

/// Structural failures found while stepping through a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("`{tag}` was resumed with {found}, but it was emitted expecting {expected}")]
    ResumeType {
        tag: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("continuation expected {expected}, got {found}")]
    ValueType {
        expected: &'static str,
        found: &'static str,
    },
}

/// A handler was asked for an instruction it has no entry for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no handler entry for `{vocabulary}::{tag}`")]
pub struct Unhandled {
    pub vocabulary: &'static str,
    pub tag: &'static str,
}

/// Errors that end an interpretation run.
#[derive(Debug, Error)]
pub enum InterpretError<E: Debug + Display> {
    #[error(transparent)]
    Unhandled(#[from] Unhandled),

    #[error("handler for `{tag}` failed: {error}")]
    Handler { tag: &'static str, error: E },

    #[error("program error: {0}")]
    Program(#[from] ProgramError),

    #[error("interpretation stopped after {limit} steps, before `{tag}`")]
    StepLimit { limit: u64, tag: &'static str },
}

impl<E: Debug + Display> InterpretError<E> {
    /// The handler's own error, if this run failed inside a handler.
    pub fn handler_error(&self) -> Option<&E> {
        match self {
            InterpretError::Handler { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Tag of the instruction the run stopped at, when known.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            InterpretError::Unhandled(Unhandled { tag, .. })
            | InterpretError::Handler { tag, .. }
            | InterpretError::StepLimit { tag, .. }
            | InterpretError::Program(ProgramError::ResumeType { tag, .. }) => Some(*tag),
            InterpretError::Program(ProgramError::ValueType { .. }) => None,
        }
    }
}

/// Errors raised while wiring a [`HandlerTable`](crate::HandlerTable).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("`{tag}` is not an instruction of `{vocabulary}`")]
    UnknownTag {
        vocabulary: &'static str,
        tag: String,
    },

    #[error("`{vocabulary}::{tag}` already has a handler entry")]
    DuplicateTag {
        vocabulary: &'static str,
        tag: &'static str,
    },
}
