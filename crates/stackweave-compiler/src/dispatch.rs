//! Node dispatch.
//!
//! The [`Dispatcher`] maps each [`NodeKind`] to the handler that lowers it.
//! Handlers receive the dispatcher itself so they can lower child nodes, or
//! hand a rewritten node back for lowering. Any kind can be replaced by
//! registering a different handler.

use rustc_hash::FxHashMap;
use stackweave_core::{LoweringError, Node, NodeKind};
use tracing::trace;

use crate::context::LoweringContext;

type Result<T> = std::result::Result<T, LoweringError>;

/// Lowers one node kind.
pub type Handler = fn(&Node, &mut LoweringContext<'_>, &Dispatcher) -> Result<()>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: FxHashMap<NodeKind, Handler>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<NodeKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        f.debug_struct("Dispatcher").field("kinds", &kinds).finish()
    }
}

impl Dispatcher {
    /// A dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with a handler for every node kind.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();
        crate::lower::register_defaults(&mut dispatcher);
        dispatcher
    }

    /// Install `handler` for `kind`, returning the handler it replaces.
    pub fn register(&mut self, kind: NodeKind, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    pub fn unregister(&mut self, kind: NodeKind) -> Option<Handler> {
        self.handlers.remove(&kind)
    }

    pub fn handles(&self, kind: NodeKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Lower `node` at the current expression depth.
    pub fn process(&self, node: &Node, ctx: &mut LoweringContext<'_>) -> Result<()> {
        let kind = node.kind();
        trace!(?kind, depth = ctx.expression_depth(), "lowering node");
        match self.handlers.get(&kind) {
            Some(handler) => handler(node, ctx, self),
            None => Err(LoweringError::UnsupportedNodeKind {
                kind,
                node: Box::new(node.clone()),
            }),
        }
    }

    /// Lower `node` in expression position; its value stays on the stack.
    pub fn process_value(&self, node: &Node, ctx: &mut LoweringContext<'_>) -> Result<()> {
        ctx.in_expression(|ctx| self.process(node, ctx))
    }

    /// Lower `node` in statement position; any value it produces is
    /// discarded.
    pub fn process_statement(&self, node: &Node, ctx: &mut LoweringContext<'_>) -> Result<()> {
        ctx.in_statement(|ctx| self.process(node, ctx))
    }
}
