//! Bytecode emitter for the lowering engine.
//!
//! The [`BytecodeEmitter`] is the instruction sink every handler writes to.
//! It owns the routine's chunk, allocates and binds labels, records frame
//! brackets and exception regions, and interns operands into the shared
//! constant pool.
//!
//! # Example
//!
//! ```ignore
//! use stackweave_compiler::bytecode::{ConstantPool, OpCode};
//! use stackweave_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//!
//! let end = emitter.new_label();
//! emitter.emit_int(42);
//! emitter.emit_jump(OpCode::JumpIfFalse, end);
//! emitter.bind_label(end);
//!
//! let code = emitter.finish()?;
//! ```
//!
//! Operand overflow (too many constants, too many arguments) does not abort
//! emission immediately: the first overflow is remembered and reported by
//! [`finish`](BytecodeEmitter::finish).

mod labels;

use stackweave_core::{InvokeKind, LoweringError, TypeHash, TypeRef};

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
use labels::LabelTable;

pub use labels::Label;

/// A protected code range and the handler that receives its exceptions.
///
/// `catch_type == None` catches everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start: usize,
    pub end: usize,
    pub handler: usize,
    pub catch_type: Option<TypeHash>,
}

/// A nested frame bracket `[start, end)` at the given nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub start: usize,
    pub end: usize,
    pub depth: usize,
}

/// The finished output of one emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedCode {
    pub bytecode: BytecodeChunk,
    pub exception_table: Vec<ExceptionEntry>,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRegion {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: Option<TypeHash>,
}

/// Emits bytecode instructions.
///
/// Uses a shared nest-level constant pool for deduplication across routines.
/// Each `BytecodeEmitter` produces bytecode for a single routine.
pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    constants: &'pool mut ConstantPool,
    labels: LabelTable,
    regions: Vec<PendingRegion>,
    /// Start offsets of the frames currently open.
    open_frames: Vec<usize>,
    frames: Vec<Frame>,
    /// First operand overflow, reported by `finish`.
    error: Option<LoweringError>,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            labels: LabelTable::new(),
            regions: Vec::new(),
            open_frames: Vec::new(),
            frames: Vec::new(),
            error: None,
        }
    }

    /// The shared pool, e.g. for a routine lowered from inside this one.
    pub fn constants_mut(&mut self) -> &mut ConstantPool {
        &mut *self.constants
    }

    fn overflow(&mut self, what: &'static str, value: usize) {
        if self.error.is_none() {
            self.error = Some(LoweringError::OperandOverflow { what, value });
        }
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    /// Emit a single opcode with no operands.
    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op);
    }

    /// Emit opcode with 8-bit operand.
    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op);
        self.chunk.write_byte(byte);
    }

    /// Emit opcode with 16-bit operand.
    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op);
        self.chunk.write_u16(value);
    }

    /// Intern `constant` and return its 16-bit pool index.
    fn constant_index(&mut self, constant: Constant) -> u16 {
        let index = self.constants.add(constant);
        match u16::try_from(index) {
            Ok(index) => index,
            Err(_) => {
                self.overflow("constant index", index as usize);
                0
            }
        }
    }

    fn hash_index(&mut self, hash: TypeHash) -> u16 {
        self.constant_index(Constant::TypeHash(hash))
    }

    fn arg_count(&mut self, count: usize) -> u8 {
        match u8::try_from(count) {
            Ok(count) => count,
            Err(_) => {
                self.overflow("argument count", count);
                u8::MAX
            }
        }
    }

    /// Emit a constant load instruction.
    ///
    /// Uses narrow (8-bit) or wide (16-bit) index based on pool size.
    pub fn emit_constant(&mut self, constant: Constant) {
        let index = self.constant_index(constant);
        if index < 256 {
            self.emit_byte(OpCode::Constant, index as u8);
        } else {
            self.emit_u16(OpCode::ConstantWide, index);
        }
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Emit an int constant. 0 and 1 use `PushZero`/`PushOne`.
    pub fn emit_int(&mut self, value: i32) {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => self.emit_constant(Constant::Int(value)),
        }
    }

    pub fn emit_long(&mut self, value: i64) {
        self.emit_constant(Constant::Long(value));
    }

    pub fn emit_f32(&mut self, value: f32) {
        self.emit_constant(Constant::Float32(value));
    }

    pub fn emit_f64(&mut self, value: f64) {
        self.emit_constant(Constant::Float64(value));
    }

    pub fn emit_string(&mut self, value: &str) {
        self.emit_constant(Constant::StringData(value.as_bytes().to_vec()));
    }

    /// Push a constant type hash (class literals).
    pub fn emit_type_constant(&mut self, ty: TypeHash) {
        self.emit_constant(Constant::TypeHash(ty));
    }

    pub fn emit_null(&mut self) {
        self.emit(OpCode::PushNull);
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    // ==========================================================================
    // Local Variables
    // ==========================================================================

    /// Emit get local variable.
    ///
    /// Uses narrow (8-bit) or wide (16-bit) slot index based on slot number.
    pub fn emit_get_local(&mut self, slot: u16) {
        if slot < 256 {
            self.emit_byte(OpCode::GetLocal, slot as u8);
        } else {
            self.emit_u16(OpCode::GetLocalWide, slot);
        }
    }

    pub fn emit_set_local(&mut self, slot: u16) {
        if slot < 256 {
            self.emit_byte(OpCode::SetLocal, slot as u8);
        } else {
            self.emit_u16(OpCode::SetLocalWide, slot);
        }
    }

    /// Add `delta` to the int local in `slot` without touching the stack.
    pub fn emit_inc_local(&mut self, slot: u16, delta: i16) {
        self.chunk.write_op(OpCode::IncLocal);
        self.chunk.write_u16(slot);
        self.chunk.write_i16(delta);
    }

    // ==========================================================================
    // Fields
    // ==========================================================================

    pub fn emit_get_field(&mut self, field: TypeHash) {
        let index = self.hash_index(field);
        self.emit_u16(OpCode::GetField, index);
    }

    pub fn emit_set_field(&mut self, field: TypeHash) {
        let index = self.hash_index(field);
        self.emit_u16(OpCode::SetField, index);
    }

    pub fn emit_get_static(&mut self, field: TypeHash) {
        let index = self.hash_index(field);
        self.emit_u16(OpCode::GetStatic, index);
    }

    pub fn emit_set_static(&mut self, field: TypeHash) {
        let index = self.hash_index(field);
        self.emit_u16(OpCode::SetStatic, index);
    }

    pub fn emit_get_this(&mut self) {
        self.emit(OpCode::GetThis);
    }

    // ==========================================================================
    // Invocation
    // ==========================================================================

    /// Emit a call.
    ///
    /// `arg_count` excludes the receiver.
    pub fn emit_invoke(&mut self, kind: InvokeKind, method: TypeHash, arg_count: usize) {
        let op = match kind {
            InvokeKind::Static => OpCode::InvokeStatic,
            InvokeKind::Virtual => OpCode::InvokeVirtual,
            InvokeKind::Interface => OpCode::InvokeInterface,
            InvokeKind::Special => OpCode::InvokeSpecial,
        };
        let index = self.hash_index(method);
        let argc = self.arg_count(arg_count);
        self.emit_u16(op, index);
        self.chunk.write_byte(argc);
    }

    /// Emit a return for a routine returning `ty`.
    pub fn emit_return(&mut self, ty: &TypeRef) {
        self.emit(if ty.is_void() {
            OpCode::ReturnVoid
        } else {
            OpCode::Return
        });
    }

    // ==========================================================================
    // Objects and Arrays
    // ==========================================================================

    /// Emit object creation with constructor call.
    pub fn emit_new(&mut self, ty: TypeHash, constructor: TypeHash, arg_count: usize) {
        let type_index = self.hash_index(ty);
        let ctor_index = self.hash_index(constructor);
        let argc = self.arg_count(arg_count);
        self.emit_u16(OpCode::New, type_index);
        self.chunk.write_u16(ctor_index);
        self.chunk.write_byte(argc);
    }

    pub fn emit_new_array(&mut self, element: TypeHash) {
        let index = self.hash_index(element);
        self.emit_u16(OpCode::NewArray, index);
    }

    /// Emit a checked reference cast.
    pub fn emit_cast(&mut self, target: TypeHash) {
        let index = self.hash_index(target);
        self.emit_u16(OpCode::Cast, index);
    }

    pub fn emit_instanceof(&mut self, ty: TypeHash) {
        let index = self.hash_index(ty);
        self.emit_u16(OpCode::InstanceOf, index);
    }

    // ==========================================================================
    // Stack Operations
    // ==========================================================================

    /// Discard a value of the given width (0, 1 or 2 cells).
    pub fn emit_pop(&mut self, width: u8) {
        match width {
            0 => {}
            1 => self.emit(OpCode::Pop),
            _ => self.emit(OpCode::Pop2),
        }
    }

    /// Duplicate a value of the given width.
    pub fn emit_dup(&mut self, width: u8) {
        match width {
            0 => {}
            1 => self.emit(OpCode::Dup),
            _ => self.emit(OpCode::Dup2),
        }
    }

    // ==========================================================================
    // Labels and Jumps
    // ==========================================================================

    pub fn new_label(&mut self) -> Label {
        self.labels.new_label()
    }

    /// Bind `label` to the current position.
    pub fn bind_label(&mut self, label: Label) {
        self.labels.bind(label, self.chunk.current_offset());
    }

    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.labels.position(label)
    }

    /// Emit a jump (`Jump`, `JumpIfFalse` or `JumpIfTrue`) to `target`.
    pub fn emit_jump(&mut self, op: OpCode, target: Label) {
        debug_assert!(op.is_jump(), "{} is not a jump", op.name());
        let origin = self.chunk.current_offset();
        self.chunk.write_op(op);
        self.write_target(target, origin);
    }

    fn write_target(&mut self, target: Label, origin: usize) {
        self.labels
            .add_fixup(target, self.chunk.current_offset(), origin);
        self.chunk.write_i32(0);
    }

    /// Emit a dense dispatch table over `[low, high]`.
    ///
    /// `targets` holds one label per key, in key order.
    pub fn emit_table_switch(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) {
        debug_assert_eq!(targets.len() as i64, high as i64 - low as i64 + 1);
        let origin = self.chunk.current_offset();
        self.chunk.write_op(OpCode::TableSwitch);
        self.write_target(default, origin);
        self.chunk.write_i32(low);
        self.chunk.write_i32(high);
        for &target in targets {
            self.write_target(target, origin);
        }
    }

    /// Emit a sparse dispatch over `(key, target)` pairs sorted by key.
    pub fn emit_lookup_switch(&mut self, default: Label, pairs: &[(i32, Label)]) {
        let origin = self.chunk.current_offset();
        self.chunk.write_op(OpCode::LookupSwitch);
        self.write_target(default, origin);
        self.chunk.write_i32(pairs.len() as i32);
        for &(key, target) in pairs {
            self.chunk.write_i32(key);
            self.write_target(target, origin);
        }
    }

    /// Get current bytecode offset.
    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Frames and Exception Regions
    // ==========================================================================

    /// Open a nested frame bracket at the current position.
    pub fn enter_frame(&mut self) {
        self.open_frames.push(self.chunk.current_offset());
    }

    /// Close the innermost open frame bracket.
    pub fn exit_frame(&mut self) {
        if let Some(start) = self.open_frames.pop() {
            self.frames.push(Frame {
                start,
                end: self.chunk.current_offset(),
                depth: self.open_frames.len(),
            });
        }
    }

    pub fn frame_depth(&self) -> usize {
        self.open_frames.len()
    }

    /// Protect `[start, end)` with the handler at `handler`.
    ///
    /// Regions are resolved when the routine is finished; regions that turn
    /// out to be empty are dropped.
    pub fn add_exception_region(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<TypeHash>,
    ) {
        self.regions.push(PendingRegion {
            start,
            end,
            handler,
            catch_type,
        });
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Resolve every label and return the finished code.
    pub fn finish(mut self) -> Result<EmittedCode, LoweringError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.labels.resolve(&mut self.chunk)?;

        let mut exception_table = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let position = |label: Label| {
                self.labels
                    .position(label)
                    .ok_or(LoweringError::UnboundLabel { label: label.id() })
            };
            let start = position(region.start)?;
            let end = position(region.end)?;
            let handler = position(region.handler)?;
            if start < end {
                exception_table.push(ExceptionEntry {
                    start,
                    end,
                    handler,
                    catch_type: region.catch_type,
                });
            }
        }

        self.frames.sort_by_key(|frame| (frame.start, frame.depth));

        Ok(EmittedCode {
            bytecode: self.chunk,
            exception_table,
            frames: self.frames,
        })
    }

    /// Get current chunk size (for debugging).
    pub fn code_size(&self) -> usize {
        self.chunk.len()
    }
}
