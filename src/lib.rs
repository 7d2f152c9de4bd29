//! Programs as data.
//!
//! A [`Program`] is an immutable description of a computation over a closed
//! vocabulary of instructions. Building one performs no effects: it only
//! records which instructions to request and how each result feeds the rest.
//! A [`Handler`] gives the instructions meaning, and [`interpret`] drives a
//! program against it one instruction at a time.
//!
//! ```ignore
//! use operational::{program, Handler, Instructions, Program, Value};
//!
//! #[derive(Debug, Clone, PartialEq, Instructions)]
//! enum Store {
//!     #[output(String)]
//!     Get { name: String },
//!     Put { name: String, value: String },
//! }
//!
//! let program: Program<Store, String> = program! {
//!     k <= Store::get("k".into());
//!     Store::put("l".into(), format!("{k}!!"));
//!     Store::get("l".into())
//! };
//!
//! let result = program.run(&mut my_store_handler).await?;
//! ```
//!
//! The same program can be run against any number of handlers: a real store,
//! an in-memory map for tests, or one wrapped in [`Trace`] or [`Recording`].

// Lets the derive's `::operational::...` paths resolve inside this crate.
extern crate self as operational;

pub mod builder;
mod error;
mod instruction;
mod interpreter;
mod middleware;
mod program;
mod table;
mod value;
mod view;

pub use error::{InterpretError, ProgramError, TableError, Unhandled};
pub use instruction::Instruction;
pub use interpreter::{interpret, interpret_with, Handler, InterpreterConfig};
pub use middleware::{Metrics, Outcome, RecordedStep, Recording, Trace};
pub use program::Program;
pub use table::HandlerTable;
pub use value::{ProgramValue, Value};
pub use view::{ProgramView, Resume};

pub use operational_macros::Instructions;

/// Re-exported so handlers can be written without a direct dependency.
pub use async_trait::async_trait;
