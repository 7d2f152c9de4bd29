// Middleware layers for effect handlers
//
// These wrappers add cross-cutting concerns like tracing, counting and
// recording to any handler without touching the programs it runs.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::instruction::Instruction;
use crate::interpreter::Handler;
use crate::value::Value;

/// Tracing middleware that logs every instruction and the final value
pub struct Trace<H> {
    inner: H,
    prefix: String,
}

impl<H> Trace<H> {
    pub fn new(inner: H) -> Self {
        Self::with_prefix(inner, "operational")
    }

    pub fn with_prefix(inner: H, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

#[async_trait]
impl<I: Instruction, H: Handler<I>> Handler<I> for Trace<H> {
    type Error = H::Error;

    fn handles(&self, tag: &str) -> bool {
        self.inner.handles(tag)
    }

    async fn handle(&mut self, instruction: I) -> Result<Value, Self::Error> {
        let tag = instruction.tag();
        let start = Instant::now();
        trace!(prefix = %self.prefix, tag, ?instruction, "handle: start");
        let result = self.inner.handle(instruction).await;
        let duration = start.elapsed();
        match &result {
            Ok(value) => debug!(prefix = %self.prefix, tag, ?duration, output = value.type_name(), "handle: success"),
            Err(e) => warn!(prefix = %self.prefix, tag, ?duration, error = %e, "handle: failed"),
        }
        result
    }

    async fn finish(&mut self, value: Value) -> Result<Value, Self::Error> {
        debug!(prefix = %self.prefix, output = value.type_name(), "finish");
        self.inner.finish(value).await
    }
}

/// Metrics collection middleware
pub struct Metrics<H> {
    inner: H,
    handled_count: AtomicU64,
    error_count: AtomicU64,
    finish_count: AtomicU64,
}

impl<H> Metrics<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            handled_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            finish_count: AtomicU64::new(0),
        }
    }

    /// Instructions that completed successfully.
    pub fn handled_count(&self) -> u64 {
        self.handled_count.load(Ordering::Relaxed)
    }

    /// Instructions and finishes that failed.
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Runs that reached their final value.
    pub fn finish_count(&self) -> u64 {
        self.finish_count.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

#[async_trait]
impl<I: Instruction, H: Handler<I>> Handler<I> for Metrics<H> {
    type Error = H::Error;

    fn handles(&self, tag: &str) -> bool {
        self.inner.handles(tag)
    }

    async fn handle(&mut self, instruction: I) -> Result<Value, Self::Error> {
        let result = self.inner.handle(instruction).await;
        if result.is_ok() {
            self.handled_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn finish(&mut self, value: Value) -> Result<Value, Self::Error> {
        let result = self.inner.finish(value).await;
        if result.is_ok() {
            self.finish_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

/// One instruction seen by a [`Recording`] handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedStep {
    pub tag: &'static str,
    pub outcome: Outcome,
}

/// How a recorded instruction ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Resolved with a value of the named type.
    Resolved(&'static str),
    /// The inner handler failed with this message.
    Failed(String),
}

/// Recording middleware - captures every dispatched instruction, in order
#[derive(Clone)]
pub struct Recording<H> {
    inner: H,
    steps: Arc<Mutex<Vec<RecordedStep>>>,
}

impl<H> Recording<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            steps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything recorded so far.
    pub fn steps(&self) -> Vec<RecordedStep> {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tags of the recorded instructions, in dispatch order.
    pub fn tags(&self) -> Vec<&'static str> {
        self.steps().into_iter().map(|step| step.tag).collect()
    }

    pub fn clear(&self) {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

#[async_trait]
impl<I: Instruction, H: Handler<I>> Handler<I> for Recording<H> {
    type Error = H::Error;

    fn handles(&self, tag: &str) -> bool {
        self.inner.handles(tag)
    }

    async fn handle(&mut self, instruction: I) -> Result<Value, Self::Error> {
        let tag = instruction.tag();
        let result = self.inner.handle(instruction).await;
        let outcome = match &result {
            Ok(value) => Outcome::Resolved(value.type_name()),
            Err(e) => Outcome::Failed(e.to_string()),
        };
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedStep { tag, outcome });
        result
    }

    async fn finish(&mut self, value: Value) -> Result<Value, Self::Error> {
        self.inner.finish(value).await
    }
}
