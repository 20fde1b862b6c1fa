//! Stackweave
//!
//! Lowers language-agnostic instruction trees into bytecode for a
//! stack-based virtual machine with local-variable slots, labelled jumps,
//! dense and sparse switch tables, monitors and exception regions.
//!
//! This crate re-exports the workspace members:
//!
//! - [`core`]: the tree, type and declaration model and [`LoweringError`]
//! - [`registry`]: [`TypeNest`], the declarations of one compilation nest
//! - [`compiler`]: the lowering engine and [`NestCompiler`]
//!
//! ```ignore
//! use stackweave::prelude::*;
//!
//! let mut nest = TypeNest::new();
//! nest.add_type(TypeDecl::class("demo.Main").with_method(
//!     MethodDecl::new("run", Modifiers::STATIC, TypeRef::VOID, vec![])
//!         .with_body(Node::ret(None)),
//! ))?;
//! let compiled = NestCompiler::new(&nest).compile_nest()?;
//! ```

pub use stackweave_compiler as compiler;
pub use stackweave_core as core;
pub use stackweave_registry as registry;

pub use stackweave_compiler::{
    CompiledNest, CompiledRoutine, Dispatcher, LoweringOptions, NestCompiler, RoutineDecl,
};
pub use stackweave_core::LoweringError;
pub use stackweave_registry::TypeNest;

// Re-export main types
pub mod prelude {
    pub use stackweave_compiler::{
        BytecodeChunk, CompiledNest, CompiledRoutine, Dispatcher, Handler, Instruction,
        LoweringContext, LoweringOptions, NestCompiler, OpCode, Operand, RoutineDecl,
    };
    pub use stackweave_core::{
        ArithOp, Case, Catch, CompareOp, ConstructorDecl, FieldDecl, InvokeKind, Iteration,
        Literal, LogicalOp, LoweringError, MethodDecl, MethodSpec, Modifiers, Node, NodeKind,
        Param, Primitive, SwitchKind, TypeAlias, TypeDecl, TypeHash, TypeKind, TypeRef, well_known,
    };
    pub use stackweave_registry::{RegistryError, TypeNest};
}
