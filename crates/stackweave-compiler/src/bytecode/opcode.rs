//! Bytecode operation codes.
//!
//! The instruction set of the target stack machine. Each opcode is a single
//! byte, with operands following inline (big-endian). Jump and switch offsets
//! are signed 32-bit values relative to the address of the opcode itself.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
///
/// Values are stack cells; `long` and `double` occupy two cells, which is why
/// discards and duplicates come in single- and double-width forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool (8-bit index).
    /// Operand: u8 constant index
    Constant = 0,
    /// Push constant from pool (16-bit index).
    /// Operand: u16 constant index
    ConstantWide,
    /// Push the null reference.
    PushNull,
    /// Push boolean true.
    PushTrue,
    /// Push boolean false.
    PushFalse,
    /// Push int 0.
    PushZero,
    /// Push int 1.
    PushOne,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    /// Discard a single-width value.
    Pop,
    /// Discard a double-width value (long/double).
    Pop2,
    /// Duplicate a single-width value.
    Dup,
    /// Duplicate a double-width value.
    Dup2,
    /// Swap the two single-width values on top of the stack.
    Swap,

    // =========================================================================
    // Local Variables
    // =========================================================================
    /// Load local (8-bit slot).
    /// Operand: u8 slot
    GetLocal,
    /// Store local (8-bit slot).
    /// Operand: u8 slot
    SetLocal,
    /// Load local (16-bit slot).
    /// Operand: u16 slot
    GetLocalWide,
    /// Store local (16-bit slot).
    /// Operand: u16 slot
    SetLocalWide,
    /// Add a constant to an int local in place.
    /// Operands: u16 slot, i16 delta
    IncLocal,

    // =========================================================================
    // Fields
    // =========================================================================
    /// Load instance field. Stack: [obj] -> [value]
    /// Operand: u16 constant index (field hash)
    GetField,
    /// Store instance field. Stack: [obj, value] -> []
    /// Operand: u16 constant index (field hash)
    SetField,
    /// Load static field.
    /// Operand: u16 constant index (field hash)
    GetStatic,
    /// Store static field.
    /// Operand: u16 constant index (field hash)
    SetStatic,
    /// Push the routine receiver.
    GetThis,

    // =========================================================================
    // Arithmetic (i32)
    // =========================================================================
    /// Add two i32 values.
    AddI32,
    /// Subtract two i32 values.
    SubI32,
    /// Multiply two i32 values.
    MulI32,
    /// Divide two i32 values.
    DivI32,
    /// Remainder of two i32 values.
    ModI32,
    /// Negate i32 value.
    NegI32,

    // =========================================================================
    // Arithmetic (i64)
    // =========================================================================
    /// Add two i64 values.
    AddI64,
    /// Subtract two i64 values.
    SubI64,
    /// Multiply two i64 values.
    MulI64,
    /// Divide two i64 values.
    DivI64,
    /// Remainder of two i64 values.
    ModI64,
    /// Negate i64 value.
    NegI64,

    // =========================================================================
    // Arithmetic (f32)
    // =========================================================================
    /// Add two f32 values.
    AddF32,
    /// Subtract two f32 values.
    SubF32,
    /// Multiply two f32 values.
    MulF32,
    /// Divide two f32 values.
    DivF32,
    /// Remainder of two f32 values.
    ModF32,
    /// Negate f32 value.
    NegF32,

    // =========================================================================
    // Arithmetic (f64)
    // =========================================================================
    /// Add two f64 values.
    AddF64,
    /// Subtract two f64 values.
    SubF64,
    /// Multiply two f64 values.
    MulF64,
    /// Divide two f64 values.
    DivF64,
    /// Remainder of two f64 values.
    ModF64,
    /// Negate f64 value.
    NegF64,

    // =========================================================================
    // Bitwise Operations
    // =========================================================================
    /// Bitwise AND (i32).
    AndI32,
    /// Bitwise OR (i32).
    OrI32,
    /// Bitwise XOR (i32).
    XorI32,
    /// Shift left (i32).
    ShlI32,
    /// Arithmetic shift right (i32).
    ShrI32,
    /// Logical shift right (i32).
    UshrI32,
    /// Bitwise AND (i64).
    AndI64,
    /// Bitwise OR (i64).
    OrI64,
    /// Bitwise XOR (i64).
    XorI64,
    /// Shift left (i64).
    ShlI64,
    /// Arithmetic shift right (i64).
    ShrI64,
    /// Logical shift right (i64).
    UshrI64,

    // =========================================================================
    // Comparisons (produce bool)
    // =========================================================================
    /// i32 equality.
    EqI32,
    /// i64 equality.
    EqI64,
    /// f32 equality.
    EqF32,
    /// f64 equality.
    EqF64,
    /// i32 less than.
    LtI32,
    /// i64 less than.
    LtI64,
    /// f32 less than.
    LtF32,
    /// f64 less than.
    LtF64,
    /// i32 less than or equal.
    LeI32,
    /// i64 less than or equal.
    LeI64,
    /// f32 less than or equal.
    LeF32,
    /// f64 less than or equal.
    LeF64,
    /// i32 greater than.
    GtI32,
    /// i64 greater than.
    GtI64,
    /// f32 greater than.
    GtF32,
    /// f64 greater than.
    GtF64,
    /// i32 greater than or equal.
    GeI32,
    /// i64 greater than or equal.
    GeI64,
    /// f32 greater than or equal.
    GeF32,
    /// f64 greater than or equal.
    GeF64,
    /// Reference identity.
    EqRef,

    // =========================================================================
    // Logical Operations
    // =========================================================================
    /// Logical NOT.
    Not,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional jump.
    /// Operand: i32 offset relative to the opcode
    Jump,
    /// Pop a bool and jump if it is false.
    /// Operand: i32 offset relative to the opcode
    JumpIfFalse,
    /// Pop a bool and jump if it is true.
    /// Operand: i32 offset relative to the opcode
    JumpIfTrue,
    /// Dense dispatch on an int key.
    /// Operands: i32 default, i32 low, i32 high, then (high - low + 1) i32 offsets
    TableSwitch,
    /// Sparse dispatch on an int key; keys sorted ascending.
    /// Operands: i32 default, i32 pair count, then (i32 key, i32 offset) pairs
    LookupSwitch,

    // =========================================================================
    // Invocation
    // =========================================================================
    /// Call a static method.
    /// Operands: u16 constant index (method hash), u8 arg count
    InvokeStatic,
    /// Call through the receiver's class vtable.
    /// Stack: [obj, args...] -> [result]
    /// Operands: u16 constant index (method hash), u8 arg count
    InvokeVirtual,
    /// Call through the receiver's interface table.
    /// Operands: u16 constant index (method hash), u8 arg count
    InvokeInterface,
    /// Non-virtual call on a receiver (private, super).
    /// Operands: u16 constant index (method hash), u8 arg count
    InvokeSpecial,
    /// Return the value on top of the stack.
    Return,
    /// Return from a void routine.
    ReturnVoid,

    // =========================================================================
    // Objects and Arrays
    // =========================================================================
    /// Allocate an object and run a constructor.
    /// Operands: u16 constant index (type hash), u16 constant index (constructor hash), u8 arg count
    New,
    /// Allocate an array. Stack: [length] -> [array]
    /// Operand: u16 constant index (element type hash)
    NewArray,
    /// Stack: [array] -> [int]
    ArrayLength,
    /// Stack: [array, index] -> [value]
    ArrayLoad,
    /// Stack: [array, index, value] -> []
    ArrayStore,

    // =========================================================================
    // Type Conversions
    // =========================================================================
    /// Convert i32 to i64.
    I32toI64,
    /// Convert i32 to f32.
    I32toF32,
    /// Convert i32 to f64.
    I32toF64,
    /// Convert i64 to i32.
    I64toI32,
    /// Convert i64 to f32.
    I64toF32,
    /// Convert i64 to f64.
    I64toF64,
    /// Convert f32 to i32.
    F32toI32,
    /// Convert f32 to i64.
    F32toI64,
    /// Convert f32 to f64.
    F32toF64,
    /// Convert f64 to i32.
    F64toI32,
    /// Convert f64 to i64.
    F64toI64,
    /// Convert f64 to f32.
    F64toF32,
    /// Convert i32 to i8.
    I32toI8,
    /// Convert i32 to i16.
    I32toI16,
    /// Convert i32 to u16.
    I32toU16,

    // =========================================================================
    // Type Checking
    // =========================================================================
    /// Checked reference cast.
    /// Operand: u16 constant index (target type hash)
    Cast,
    /// Push whether the reference is an instance of the type.
    /// Operand: u16 constant index (type hash)
    InstanceOf,

    // =========================================================================
    // Exceptions and Monitors
    // =========================================================================
    /// Throw the reference on top of the stack.
    Throw,
    /// Acquire the monitor of the reference on top of the stack.
    MonitorEnter,
    /// Release the monitor of the reference on top of the stack.
    MonitorExit,
}

impl OpCode {
    /// Convert from u8, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// True for the variable-length dispatch instructions.
    pub fn is_switch(&self) -> bool {
        matches!(self, OpCode::TableSwitch | OpCode::LookupSwitch)
    }

    /// True for instructions whose operand is a relative jump offset.
    pub fn is_jump(&self) -> bool {
        matches!(self, OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue)
    }

    /// Size of the fixed operands in bytes, excluding the opcode byte.
    ///
    /// Switch instructions report 0; their operands are variable-length and
    /// decoded by [`BytecodeChunk::instructions`](super::BytecodeChunk::instructions).
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::PushNull
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::PushZero
            | OpCode::PushOne
            | OpCode::Pop
            | OpCode::Pop2
            | OpCode::Dup
            | OpCode::Dup2
            | OpCode::Swap
            | OpCode::GetThis
            | OpCode::AddI32
            | OpCode::SubI32
            | OpCode::MulI32
            | OpCode::DivI32
            | OpCode::ModI32
            | OpCode::NegI32
            | OpCode::AddI64
            | OpCode::SubI64
            | OpCode::MulI64
            | OpCode::DivI64
            | OpCode::ModI64
            | OpCode::NegI64
            | OpCode::AddF32
            | OpCode::SubF32
            | OpCode::MulF32
            | OpCode::DivF32
            | OpCode::ModF32
            | OpCode::NegF32
            | OpCode::AddF64
            | OpCode::SubF64
            | OpCode::MulF64
            | OpCode::DivF64
            | OpCode::ModF64
            | OpCode::NegF64
            | OpCode::AndI32
            | OpCode::OrI32
            | OpCode::XorI32
            | OpCode::ShlI32
            | OpCode::ShrI32
            | OpCode::UshrI32
            | OpCode::AndI64
            | OpCode::OrI64
            | OpCode::XorI64
            | OpCode::ShlI64
            | OpCode::ShrI64
            | OpCode::UshrI64
            | OpCode::EqI32
            | OpCode::EqI64
            | OpCode::EqF32
            | OpCode::EqF64
            | OpCode::LtI32
            | OpCode::LtI64
            | OpCode::LtF32
            | OpCode::LtF64
            | OpCode::LeI32
            | OpCode::LeI64
            | OpCode::LeF32
            | OpCode::LeF64
            | OpCode::GtI32
            | OpCode::GtI64
            | OpCode::GtF32
            | OpCode::GtF64
            | OpCode::GeI32
            | OpCode::GeI64
            | OpCode::GeF32
            | OpCode::GeF64
            | OpCode::EqRef
            | OpCode::Not
            | OpCode::TableSwitch
            | OpCode::LookupSwitch
            | OpCode::Return
            | OpCode::ReturnVoid
            | OpCode::ArrayLength
            | OpCode::ArrayLoad
            | OpCode::ArrayStore
            | OpCode::I32toI64
            | OpCode::I32toF32
            | OpCode::I32toF64
            | OpCode::I64toI32
            | OpCode::I64toF32
            | OpCode::I64toF64
            | OpCode::F32toI32
            | OpCode::F32toI64
            | OpCode::F32toF64
            | OpCode::F64toI32
            | OpCode::F64toI64
            | OpCode::F64toF32
            | OpCode::I32toI8
            | OpCode::I32toI16
            | OpCode::I32toU16
            | OpCode::Throw
            | OpCode::MonitorEnter
            | OpCode::MonitorExit => 0,
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal => 1,
            OpCode::ConstantWide
            | OpCode::GetLocalWide
            | OpCode::SetLocalWide
            | OpCode::GetField
            | OpCode::SetField
            | OpCode::GetStatic
            | OpCode::SetStatic
            | OpCode::NewArray
            | OpCode::Cast
            | OpCode::InstanceOf => 2,
            OpCode::InvokeStatic
            | OpCode::InvokeVirtual
            | OpCode::InvokeInterface
            | OpCode::InvokeSpecial => 3,
            OpCode::IncLocal
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue => 4,
            OpCode::New => 5,
        }
    }

    /// Get the name of this opcode for debugging.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::Pop => "POP",
            OpCode::Pop2 => "POP_2",
            OpCode::Dup => "DUP",
            OpCode::Dup2 => "DUP_2",
            OpCode::Swap => "SWAP",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetLocalWide => "GET_LOCAL_WIDE",
            OpCode::SetLocalWide => "SET_LOCAL_WIDE",
            OpCode::IncLocal => "INC_LOCAL",
            OpCode::GetField => "GET_FIELD",
            OpCode::SetField => "SET_FIELD",
            OpCode::GetStatic => "GET_STATIC",
            OpCode::SetStatic => "SET_STATIC",
            OpCode::GetThis => "GET_THIS",
            OpCode::AddI32 => "ADD_I32",
            OpCode::SubI32 => "SUB_I32",
            OpCode::MulI32 => "MUL_I32",
            OpCode::DivI32 => "DIV_I32",
            OpCode::ModI32 => "MOD_I32",
            OpCode::NegI32 => "NEG_I32",
            OpCode::AddI64 => "ADD_I64",
            OpCode::SubI64 => "SUB_I64",
            OpCode::MulI64 => "MUL_I64",
            OpCode::DivI64 => "DIV_I64",
            OpCode::ModI64 => "MOD_I64",
            OpCode::NegI64 => "NEG_I64",
            OpCode::AddF32 => "ADD_F32",
            OpCode::SubF32 => "SUB_F32",
            OpCode::MulF32 => "MUL_F32",
            OpCode::DivF32 => "DIV_F32",
            OpCode::ModF32 => "MOD_F32",
            OpCode::NegF32 => "NEG_F32",
            OpCode::AddF64 => "ADD_F64",
            OpCode::SubF64 => "SUB_F64",
            OpCode::MulF64 => "MUL_F64",
            OpCode::DivF64 => "DIV_F64",
            OpCode::ModF64 => "MOD_F64",
            OpCode::NegF64 => "NEG_F64",
            OpCode::AndI32 => "AND_I32",
            OpCode::OrI32 => "OR_I32",
            OpCode::XorI32 => "XOR_I32",
            OpCode::ShlI32 => "SHL_I32",
            OpCode::ShrI32 => "SHR_I32",
            OpCode::UshrI32 => "USHR_I32",
            OpCode::AndI64 => "AND_I64",
            OpCode::OrI64 => "OR_I64",
            OpCode::XorI64 => "XOR_I64",
            OpCode::ShlI64 => "SHL_I64",
            OpCode::ShrI64 => "SHR_I64",
            OpCode::UshrI64 => "USHR_I64",
            OpCode::EqI32 => "EQ_I32",
            OpCode::EqI64 => "EQ_I64",
            OpCode::EqF32 => "EQ_F32",
            OpCode::EqF64 => "EQ_F64",
            OpCode::LtI32 => "LT_I32",
            OpCode::LtI64 => "LT_I64",
            OpCode::LtF32 => "LT_F32",
            OpCode::LtF64 => "LT_F64",
            OpCode::LeI32 => "LE_I32",
            OpCode::LeI64 => "LE_I64",
            OpCode::LeF32 => "LE_F32",
            OpCode::LeF64 => "LE_F64",
            OpCode::GtI32 => "GT_I32",
            OpCode::GtI64 => "GT_I64",
            OpCode::GtF32 => "GT_F32",
            OpCode::GtF64 => "GT_F64",
            OpCode::GeI32 => "GE_I32",
            OpCode::GeI64 => "GE_I64",
            OpCode::GeF32 => "GE_F32",
            OpCode::GeF64 => "GE_F64",
            OpCode::EqRef => "EQ_REF",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::TableSwitch => "TABLE_SWITCH",
            OpCode::LookupSwitch => "LOOKUP_SWITCH",
            OpCode::InvokeStatic => "INVOKE_STATIC",
            OpCode::InvokeVirtual => "INVOKE_VIRTUAL",
            OpCode::InvokeInterface => "INVOKE_INTERFACE",
            OpCode::InvokeSpecial => "INVOKE_SPECIAL",
            OpCode::Return => "RETURN",
            OpCode::ReturnVoid => "RETURN_VOID",
            OpCode::New => "NEW",
            OpCode::NewArray => "NEW_ARRAY",
            OpCode::ArrayLength => "ARRAY_LENGTH",
            OpCode::ArrayLoad => "ARRAY_LOAD",
            OpCode::ArrayStore => "ARRAY_STORE",
            OpCode::I32toI64 => "I32_TO_I64",
            OpCode::I32toF32 => "I32_TO_F32",
            OpCode::I32toF64 => "I32_TO_F64",
            OpCode::I64toI32 => "I64_TO_I32",
            OpCode::I64toF32 => "I64_TO_F32",
            OpCode::I64toF64 => "I64_TO_F64",
            OpCode::F32toI32 => "F32_TO_I32",
            OpCode::F32toI64 => "F32_TO_I64",
            OpCode::F32toF64 => "F32_TO_F64",
            OpCode::F64toI32 => "F64_TO_I32",
            OpCode::F64toI64 => "F64_TO_I64",
            OpCode::F64toF32 => "F64_TO_F32",
            OpCode::I32toI8 => "I32_TO_I8",
            OpCode::I32toI16 => "I32_TO_I16",
            OpCode::I32toU16 => "I32_TO_U16",
            OpCode::Cast => "CAST",
            OpCode::InstanceOf => "INSTANCE_OF",
            OpCode::Throw => "THROW",
            OpCode::MonitorEnter => "MONITOR_ENTER",
            OpCode::MonitorExit => "MONITOR_EXIT",
        }
    }
}
