//! Stackweave Compiler
//!
//! Lowers an already-built instruction tree into stack-machine bytecode.
//!
//! ## Architecture
//!
//! - **Dispatch**: every [`Node`](stackweave_core::Node) is routed to the
//!   handler registered for its kind. Handlers either emit code or rewrite
//!   the node into simpler nodes and dispatch those.
//! - **Context**: one [`LoweringContext`] per routine carries the emitter,
//!   the flow records of enclosing loops and switches, the slot manager and
//!   typed data scopes.
//! - **Nest**: [`NestCompiler`] lowers every routine of a nest and the
//!   bridges they request.
//!
//! ## Modules
//!
//! - [`bytecode`]: Bytecode types (OpCode, BytecodeChunk, ConstantPool)
//! - [`bridge`]: Bridges for private access between nest types
//! - [`compile`]: Routine and nest drivers
//! - [`context`]: Per-routine lowering state
//! - [`data`]: Typed key/value scopes
//! - [`dispatch`]: Node-kind to handler registry
//! - [`emit`]: Bytecode emitter with labels and exception regions
//! - [`flow`]: Jump targets of enclosing loops and switches
//! - [`lower`]: Default node handlers
//! - [`options`]: Lowering configuration
//! - [`resolver`]: Type alias resolution
//! - [`slots`]: Local-variable slot allocation

pub mod bridge;
pub mod bytecode;
pub mod compile;
pub mod context;
pub mod data;
pub mod dispatch;
pub mod emit;
pub mod flow;
pub mod lower;
pub mod options;
pub mod resolver;
pub mod slots;

pub use bridge::{Bridge, BridgeDecl, BridgeRegistry, MemberRef};
pub use bytecode::{BytecodeChunk, Constant, ConstantPool, Instruction, OpCode, Operand};
pub use compile::{CompiledNest, CompiledRoutine, NestCompiler, RoutineDecl};
pub use context::{LoweringContext, RoutineInfo, RoutineOutput};
pub use data::{DataScopes, Key};
pub use dispatch::{Dispatcher, Handler};
pub use emit::{BytecodeEmitter, EmittedCode, ExceptionEntry, Frame, Label};
pub use flow::{FlowKind, FlowRecord, FlowTracker};
pub use lower::{SwitchEncoding, register_defaults, select_switch_encoding, text_hash};
pub use options::LoweringOptions;
pub use resolver::TypeResolver;
pub use slots::{SlotEntry, SlotManager};

// Re-export LoweringError from core for convenience
pub use stackweave_core::LoweringError;
