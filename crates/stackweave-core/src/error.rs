//! Lowering errors.
//!
//! Every error is fatal for the compilation unit being lowered: the engine
//! never emits partial output. Errors detected while lowering a specific node
//! carry that node so callers can report it.
//!
//! ```text
//! LoweringError
//! ├── tree shape      UnsupportedNodeKind, MismatchedNode
//! ├── variables       UndeclaredVariable
//! ├── switches        UnresolvableCaseValue, NonNumericSwitchSubject,
//! │                   TableCapacityExceeded, DuplicateDefaultCase,
//! │                   DuplicateCaseValue, RedirectOutsideSwitch
//! ├── control flow    BreakOutsideConstruct, ContinueOutsideLoop
//! ├── types/members   UnresolvableAlias, InvalidInvocationKind,
//! │                   InvalidOperandType, UnknownType, UnknownMember
//! └── encoding        UnboundLabel, OperandOverflow
//! ```

use thiserror::Error;

use crate::decl::TypeKind;
use crate::node::{InvokeKind, Node, NodeKind};
use crate::types::{TypeAlias, TypeRef};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoweringError {
    // ========================================================================
    // Tree shape
    // ========================================================================
    /// No handler is registered for the node's kind.
    #[error("no handler registered for {kind:?} nodes")]
    UnsupportedNodeKind { kind: NodeKind, node: Box<Node> },

    /// A handler received a node of a kind it does not lower.
    #[error("expected a {expected:?} node, found {found:?}")]
    MismatchedNode { expected: NodeKind, found: NodeKind },

    // ========================================================================
    // Variables
    // ========================================================================
    #[error("undeclared variable '{name}' of type {ty}")]
    UndeclaredVariable {
        name: String,
        ty: TypeRef,
        node: Option<Box<Node>>,
    },

    // ========================================================================
    // Switches
    // ========================================================================
    /// A case value cannot be reduced to a 32-bit dispatch key.
    #[error("case value cannot be reduced to a dispatch key")]
    UnresolvableCaseValue { node: Box<Node> },

    #[error("switch subject of type {ty} is not numeric")]
    NonNumericSwitchSubject { ty: TypeRef, node: Box<Node> },

    /// A key or dense-table range does not fit the table encoding.
    #[error("switch range [{low}, {high}] exceeds the table capacity")]
    TableCapacityExceeded { low: i64, high: i64 },

    #[error("switch declares more than one default case")]
    DuplicateDefaultCase { node: Box<Node> },

    #[error("switch declares case key {key} more than once")]
    DuplicateCaseValue { key: i32, node: Box<Node> },

    #[error("default redirect used outside of a switch")]
    RedirectOutsideSwitch,

    // ========================================================================
    // Control flow
    // ========================================================================
    #[error("break outside of a loop or switch{}", label_suffix(.label))]
    BreakOutsideConstruct { label: Option<String> },

    #[error("continue outside of a loop{}", label_suffix(.label))]
    ContinueOutsideLoop { label: Option<String> },

    // ========================================================================
    // Types and members
    // ========================================================================
    #[error("alias {alias} cannot be resolved in {context}")]
    UnresolvableAlias { alias: TypeAlias, context: String },

    /// Virtual/interface dispatch does not match the owner's actual kind.
    #[error("{kind:?} invocation of {owner}.{name} targets a {actual:?}")]
    InvalidInvocationKind {
        kind: InvokeKind,
        owner: TypeRef,
        name: String,
        actual: TypeKind,
    },

    /// An operator applied to operands of a type it does not support.
    #[error("operator {operator} cannot be applied to {ty}")]
    InvalidOperandType { operator: String, ty: TypeRef },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("type {owner} has no member '{name}'")]
    UnknownMember { owner: TypeRef, name: String },

    // ========================================================================
    // Encoding
    // ========================================================================
    #[error("jump to label {label} which was never bound")]
    UnboundLabel { label: u32 },

    #[error("{what} value {value} does not fit its operand")]
    OperandOverflow { what: &'static str, value: usize },
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(label) => format!(" (label '{label}')"),
        None => String::new(),
    }
}

impl LoweringError {
    /// The offending node, when the error was raised for a specific node.
    pub fn node(&self) -> Option<&Node> {
        match self {
            LoweringError::UnsupportedNodeKind { node, .. }
            | LoweringError::UnresolvableCaseValue { node }
            | LoweringError::NonNumericSwitchSubject { node, .. }
            | LoweringError::DuplicateDefaultCase { node }
            | LoweringError::DuplicateCaseValue { node, .. } => Some(node),
            LoweringError::UndeclaredVariable { node, .. } => node.as_deref(),
            _ => None,
        }
    }

    /// Attach `node` to an [`UndeclaredVariable`](Self::UndeclaredVariable)
    /// raised without one.
    pub fn with_node(self, at: &Node) -> Self {
        match self {
            LoweringError::UndeclaredVariable {
                name,
                ty,
                node: None,
            } => LoweringError::UndeclaredVariable {
                name,
                ty,
                node: Some(Box::new(at.clone())),
            },
            other => other,
        }
    }
}
