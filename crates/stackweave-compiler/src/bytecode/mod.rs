//! Bytecode types for the lowering engine.
//!
//! This module contains the core bytecode types:
//!
//! - [`OpCode`] - The target machine's instruction set
//! - [`BytecodeChunk`] - Encoded bytecode for a routine, plus its decoder
//! - [`Constant`] and [`ConstantPool`] - Nest-level constant storage

mod chunk;
mod constant;
mod opcode;

pub use chunk::{BytecodeChunk, Instruction, Operand};
pub use constant::{Constant, ConstantPool};
pub use opcode::OpCode;
