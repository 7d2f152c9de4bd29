//! Instruction vocabularies.
//!
//! A vocabulary is a closed set of instructions, declared as an enum. Each
//! variant is one tag; its fields are the instruction's payload. The
//! [`Instructions`](crate::Instructions) derive implements [`Instruction`] and
//! generates one constructor per tag that returns the instruction already
//! wrapped as a [`Program`](crate::Program):
//!
//! ```ignore
//! use operational::{Instructions, Program};
//!
//! #[derive(Debug, Clone, PartialEq, Instructions)]
//! pub enum Store {
//!     #[output(Option<String>)]
//!     Get { name: String },
//!     Put { name: String, value: String },
//! }
//!
//! let program: Program<Store, ()> = Store::put("k".into(), "v".into());
//! assert_eq!(Store::TAGS, &["Get", "Put"]);
//! ```

use std::fmt::Debug;

/// One vocabulary of effect requests.
///
/// Implementations are normally derived. Two vocabularies are always distinct
/// types, so identical tag names never collide.
pub trait Instruction: Debug + Clone + Send + Sync + 'static {
    /// Name of the vocabulary.
    const VOCABULARY: &'static str;

    /// Every tag of the vocabulary, in declaration order.
    const TAGS: &'static [&'static str];

    /// Tag of this instruction.
    fn tag(&self) -> &'static str;
}
