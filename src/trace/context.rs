//! Per-context tracking of the currently open spans.
//!
//! Each logical execution context (thread, task, request handler) owns one
//! [`SpanStack`]. Starting a span pushes its identity; ending it pops in
//! strict LIFO order, which is what makes parent/child links mirror call
//! nesting. Stacks are never shared between concurrent contexts; to continue
//! a trace elsewhere, seed a fresh stack with
//! [`SpanStack::with_remote_parent`].

use crate::error::{TraceError, TraceResult};
use crate::trace::SpanContext;

/// An ordered stack of currently-open span identities for one logical
/// execution context.
///
/// The top of the stack is the "current span": it becomes the parent of the
/// next span started in this context.
#[derive(Debug, Default)]
pub struct SpanStack {
    remote_parent: Option<SpanContext>,
    stack: Vec<SpanContext>,
}

impl SpanStack {
    /// Create an empty stack. The first span started against it becomes a
    /// root span with a fresh trace id.
    pub fn new() -> Self {
        SpanStack::default()
    }

    /// Create a stack whose first span will be a child of `parent`, typically
    /// a span open in another thread or process. The parent itself is not
    /// owned by this stack and is never popped from it.
    pub fn with_remote_parent(parent: SpanContext) -> Self {
        SpanStack {
            remote_parent: Some(parent),
            stack: Vec::new(),
        }
    }

    /// The identity of the current span, i.e. the parent for the next
    /// [`Tracer::start`] call on this stack.
    ///
    /// [`Tracer::start`]: crate::trace::Tracer::start
    pub fn current(&self) -> Option<SpanContext> {
        self.stack.last().copied().or(self.remote_parent)
    }

    /// Number of spans currently open in this context.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn push(&mut self, span_context: SpanContext) {
        self.stack.push(span_context);
    }

    /// Pop `span_context`, which must be the current top. On violation the
    /// stack is left untouched so sibling spans are unaffected.
    pub(crate) fn pop(&mut self, span_context: &SpanContext) -> TraceResult<()> {
        match self.stack.last() {
            Some(top) if top == span_context => {
                self.stack.pop();
                Ok(())
            }
            Some(top) => Err(TraceError::UsageViolation(format!(
                "span {} ended out of order; current span is {}",
                span_context.span_id, top.span_id
            ))),
            None => Err(TraceError::UsageViolation(format!(
                "span {} ended but no span is open in this context",
                span_context.span_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanId, TraceId};

    fn span_context(id: u64) -> SpanContext {
        SpanContext::new(TraceId::from(1u128), SpanId::from(id))
    }

    #[test]
    fn lifo_push_pop() {
        let mut stack = SpanStack::new();
        assert_eq!(stack.current(), None);

        let (a, b) = (span_context(1), span_context(2));
        stack.push(a);
        stack.push(b);
        assert_eq!(stack.current(), Some(b));

        assert!(stack.pop(&b).is_ok());
        assert_eq!(stack.current(), Some(a));
        assert!(stack.pop(&a).is_ok());
        assert_eq!(stack.current(), None);
    }

    #[test]
    fn popping_non_top_is_a_usage_violation_and_leaves_stack_unmodified() {
        let mut stack = SpanStack::new();
        let (a, b) = (span_context(1), span_context(2));
        stack.push(a);
        stack.push(b);

        let err = stack.pop(&a).unwrap_err();
        assert!(matches!(err, TraceError::UsageViolation(_)));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.current(), Some(b));
    }

    #[test]
    fn popping_from_empty_stack_errors() {
        let mut stack = SpanStack::new();
        assert!(matches!(
            stack.pop(&span_context(1)),
            Err(TraceError::UsageViolation(_))
        ));
    }

    #[test]
    fn remote_parent_is_current_but_never_popped() {
        let parent = span_context(9);
        let mut stack = SpanStack::with_remote_parent(parent);
        assert_eq!(stack.current(), Some(parent));

        let child = span_context(10);
        stack.push(child);
        assert_eq!(stack.current(), Some(child));
        assert!(stack.pop(&child).is_ok());

        // Back to the remote parent, which cannot be popped.
        assert_eq!(stack.current(), Some(parent));
        assert!(stack.pop(&parent).is_err());
    }
}
