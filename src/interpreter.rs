// Interpretation of programs against effect handlers
//
// The interpreter is the only place programs meet the outside world: it
// repeatedly views the program, hands the blocked-on instruction to the
// handler, waits for the result and resumes. Each step holds only the
// current instruction and continuation, so a run can wait on a handler for
// as long as it likes without growing the stack.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::fmt::{Debug, Display};
use tracing::{debug, debug_span, trace, warn, Instrument};

use crate::error::{InterpretError, ProgramError, Unhandled};
use crate::instruction::Instruction;
use crate::program::Program;
use crate::value::{ProgramValue, Value};
use crate::view::ProgramView;

/// Gives every instruction of the vocabulary `I` a concrete meaning.
///
/// Handlers own whatever state the instructions act on; programs never touch
/// it directly.
#[async_trait]
pub trait Handler<I: Instruction>: Send {
    /// Failure reported by the handler. Any failure ends the run.
    type Error: Debug + Display + Send + 'static;

    /// Whether this handler has an entry for `tag`.
    ///
    /// Handlers that `match` exhaustively on the vocabulary keep the default.
    fn handles(&self, tag: &str) -> bool {
        let _ = tag;
        true
    }

    /// Carry out one instruction and report its result.
    async fn handle(&mut self, instruction: I) -> Result<Value, Self::Error>;

    /// Decide what finishing with `value` means. Passes it through by default.
    async fn finish(&mut self, value: Value) -> Result<Value, Self::Error> {
        Ok(value)
    }
}

/// Settings for one interpretation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Maximum number of instructions dispatched before the run is stopped.
    pub max_steps: Option<u64>,
    /// Label attached to the run's tracing span.
    pub label: Option<String>,
}

impl InterpreterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Interpret `program` against `handler`, producing whatever the handler's
/// [`Handler::finish`] makes of the final value.
pub async fn interpret<I, A, H>(
    program: Program<I, A>,
    handler: &mut H,
) -> Result<Value, InterpretError<H::Error>>
where
    I: Instruction,
    A: ProgramValue,
    H: Handler<I>,
{
    interpret_with(program, handler, &InterpreterConfig::default()).await
}

/// [`interpret`] with explicit settings.
pub async fn interpret_with<I, A, H>(
    program: Program<I, A>,
    handler: &mut H,
    config: &InterpreterConfig,
) -> Result<Value, InterpretError<H::Error>>
where
    I: Instruction,
    A: ProgramValue,
    H: Handler<I>,
{
    let span = debug_span!(
        "interpret",
        vocabulary = I::VOCABULARY,
        label = config.label.as_deref().unwrap_or("program"),
    );
    drive(program, handler, config.max_steps).instrument(span).await
}

async fn drive<I, A, H>(
    mut program: Program<I, A>,
    handler: &mut H,
    max_steps: Option<u64>,
) -> Result<Value, InterpretError<H::Error>>
where
    I: Instruction,
    A: ProgramValue,
    H: Handler<I>,
{
    debug!("run: start");
    let mut steps: u64 = 0;
    loop {
        match program.view()? {
            ProgramView::Return(value) => {
                debug!(steps, "run: finished");
                return handler
                    .finish(Value::new(value))
                    .await
                    .map_err(|error| InterpretError::Handler {
                        tag: "Return",
                        error,
                    });
            }
            ProgramView::Continue(instruction, resume) => {
                let tag = instruction.tag();
                if !handler.handles(tag) {
                    warn!(tag, "run: no handler entry");
                    return Err(Unhandled {
                        vocabulary: I::VOCABULARY,
                        tag,
                    }
                    .into());
                }
                if let Some(limit) = max_steps {
                    if steps >= limit {
                        warn!(limit, tag, "run: step limit reached");
                        return Err(InterpretError::StepLimit { limit, tag });
                    }
                }
                steps += 1;
                trace!(step = steps, tag, "dispatch");
                let result = match handler.handle(instruction).await {
                    Ok(result) => result,
                    Err(error) => {
                        warn!(step = steps, tag, error = %error, "run: handler failed");
                        return Err(InterpretError::Handler { tag, error });
                    }
                };
                program = resume.resume(result)?;
            }
        }
    }
}

impl<I: Instruction, A: ProgramValue> Program<I, A> {
    /// Interpret this program and recover its final value as an `A`.
    ///
    /// Use [`interpret`] instead when the handler's `finish` turns the final
    /// value into something else.
    pub async fn run<H: Handler<I>>(self, handler: &mut H) -> Result<A, InterpretError<H::Error>> {
        self.run_with(handler, &InterpreterConfig::default()).await
    }

    /// [`Program::run`] with explicit settings.
    pub async fn run_with<H: Handler<I>>(
        self,
        handler: &mut H,
        config: &InterpreterConfig,
    ) -> Result<A, InterpretError<H::Error>> {
        let value = interpret_with(self, handler, config).await?;
        value.downcast::<A>().map_err(|value| {
            ProgramError::ValueType {
                expected: type_name::<A>(),
                found: value.type_name(),
            }
            .into()
        })
    }
}
