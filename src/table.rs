// Handler tables
//
// A `HandlerTable` is a handler assembled at runtime from one async function
// per instruction tag plus an optional `Return` entry. It suits handlers that
// are wired together from independent pieces (a store here, a prompt there)
// rather than written as a single `match`.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::future::Future;
use tracing::debug;

use crate::error::{TableError, Unhandled};
use crate::instruction::Instruction;
use crate::interpreter::Handler;
use crate::value::Value;

type Entry<I, E> = Box<dyn FnMut(I) -> BoxFuture<'static, Result<Value, E>> + Send>;
type ReturnEntry<E> = Box<dyn FnMut(Value) -> BoxFuture<'static, Result<Value, E>> + Send>;

/// A handler built from one entry per tag.
///
/// Entries produce `'static` futures, so state they share lives behind an
/// `Arc` the entries capture.
pub struct HandlerTable<I, E> {
    entries: HashMap<&'static str, Entry<I, E>>,
    on_return: Option<ReturnEntry<E>>,
}

impl<I: Instruction, E> HandlerTable<I, E>
where
    E: From<Unhandled> + Debug + Display + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            on_return: None,
        }
    }

    /// Register the entry for `tag`.
    ///
    /// Fails if `tag` is not part of the vocabulary or already has an entry.
    pub fn on<F, Fut>(mut self, tag: &str, mut entry: F) -> Result<Self, TableError>
    where
        F: FnMut(I) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
    {
        let tag = I::TAGS
            .iter()
            .copied()
            .find(|known| *known == tag)
            .ok_or_else(|| TableError::UnknownTag {
                vocabulary: I::VOCABULARY,
                tag: tag.to_string(),
            })?;
        if self.entries.contains_key(tag) {
            return Err(TableError::DuplicateTag {
                vocabulary: I::VOCABULARY,
                tag,
            });
        }
        self.entries
            .insert(tag, Box::new(move |instruction| entry(instruction).boxed()));
        Ok(self)
    }

    /// Register the entry run once the program finishes.
    pub fn on_return<F, Fut>(mut self, mut entry: F) -> Self
    where
        F: FnMut(Value) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
    {
        self.on_return = Some(Box::new(move |value| entry(value).boxed()));
        self
    }

    /// Tags of the vocabulary that have no entry yet.
    pub fn missing(&self) -> Vec<&'static str> {
        I::TAGS
            .iter()
            .copied()
            .filter(|tag| !self.entries.contains_key(tag))
            .collect()
    }

    /// Whether every tag of the vocabulary has an entry.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

impl<I: Instruction, E> Default for HandlerTable<I, E>
where
    E: From<Unhandled> + Debug + Display + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, E> Debug for HandlerTable<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.entries.keys().collect();
        tags.sort();
        f.debug_struct("HandlerTable")
            .field("entries", &tags)
            .field("on_return", &self.on_return.is_some())
            .finish()
    }
}

#[async_trait]
impl<I: Instruction, E> Handler<I> for HandlerTable<I, E>
where
    E: From<Unhandled> + Debug + Display + Send + 'static,
{
    type Error = E;

    fn handles(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    async fn handle(&mut self, instruction: I) -> Result<Value, E> {
        let tag = instruction.tag();
        let Some(entry) = self.entries.get_mut(tag) else {
            return Err(Unhandled {
                vocabulary: I::VOCABULARY,
                tag,
            }
            .into());
        };
        debug!(tag, "table: dispatch");
        entry(instruction).await
    }

    async fn finish(&mut self, value: Value) -> Result<Value, E> {
        match self.on_return.as_mut() {
            Some(entry) => entry(value).await,
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{interpret, InterpretError, Instructions};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Instructions)]
    enum Counter {
        #[output(u64)]
        Increment(u64),
        #[output(u64)]
        Current,
        Reset,
    }

    fn counting_table(count: Arc<Mutex<u64>>) -> Result<HandlerTable<Counter, anyhow::Error>, TableError> {
        let current = Arc::clone(&count);
        HandlerTable::new()
            .on("Increment", move |instruction| {
                let count = Arc::clone(&count);
                async move {
                    let Counter::Increment(by) = instruction else {
                        anyhow::bail!("unexpected {instruction:?}");
                    };
                    let mut count = count.lock().unwrap_or_else(|e| e.into_inner());
                    *count += by;
                    Ok(Value::new(*count))
                }
            })?
            .on("Current", move |_| {
                let value = *current.lock().unwrap_or_else(|e| e.into_inner());
                async move { Ok(Value::new(value)) }
            })
    }

    #[tokio::test]
    async fn dispatches_by_tag() {
        let count = Arc::new(Mutex::new(0));
        let mut table = counting_table(Arc::clone(&count)).unwrap();
        let program = Counter::increment(2)
            .and_then(Counter::increment(3))
            .and_then(Counter::current());
        assert_eq!(program.run(&mut table).await.unwrap(), 5);
        assert_eq!(*count.lock().unwrap(), 5);
    }

    #[tokio::test]
    async fn missing_entries_are_reported() {
        let mut table = counting_table(Arc::new(Mutex::new(0))).unwrap();
        assert_eq!(table.missing(), ["Reset"]);
        assert!(!table.is_complete());

        let program = Counter::increment(1).and_then(Counter::reset());
        let err = program.run(&mut table).await.unwrap_err();
        assert!(matches!(
            err,
            InterpretError::Unhandled(Unhandled { tag: "Reset", vocabulary: "Counter" })
        ));
    }

    #[test]
    fn unknown_and_duplicate_tags_are_rejected() {
        let table = HandlerTable::<Counter, anyhow::Error>::new();
        let err = table
            .on("Decrement", |_| async { Ok(Value::unit()) })
            .unwrap_err();
        assert_eq!(
            err,
            TableError::UnknownTag {
                vocabulary: "Counter",
                tag: "Decrement".into(),
            }
        );

        let err = HandlerTable::<Counter, anyhow::Error>::new()
            .on("Reset", |_| async { Ok(Value::unit()) })
            .unwrap()
            .on("Reset", |_| async { Ok(Value::unit()) })
            .unwrap_err();
        assert_eq!(
            err,
            TableError::DuplicateTag {
                vocabulary: "Counter",
                tag: "Reset",
            }
        );
    }

    #[tokio::test]
    async fn return_entry_wraps_the_final_value() {
        let mut table = counting_table(Arc::new(Mutex::new(0)))
            .unwrap()
            .on_return(|value| async move {
                let total = value.downcast::<u64>().unwrap_or_default();
                Ok(Value::new(format!("total={total}")))
            });
        let value = interpret(Counter::increment(7), &mut table).await.unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("total=7"));
    }
}
