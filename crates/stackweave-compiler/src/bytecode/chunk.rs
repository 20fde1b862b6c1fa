//! Bytecode chunk for a lowered routine.
//!
//! A `BytecodeChunk` holds the encoded instruction stream of one routine.
//! Writing is append-only apart from [`patch_i32`](BytecodeChunk::patch_i32),
//! which the emitter uses to resolve forward label references.

use super::OpCode;

/// A chunk of encoded bytecode for a single routine.
///
/// Constants are stored at nest level in a `ConstantPool`, not per routine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BytecodeChunk {
    code: Vec<u8>,
}

/// A decoded instruction. Jump targets are absolute offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub op: OpCode,
    pub operand: Operand,
}

/// Decoded operands of an [`Instruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    Byte(u8),
    Short(u16),
    Inc { slot: u16, delta: i16 },
    Invoke { constant: u16, argc: u8 },
    New { ty: u16, constructor: u16, argc: u8 },
    Jump(usize),
    Table {
        default: usize,
        low: i32,
        high: i32,
        targets: Vec<usize>,
    },
    Lookup {
        default: usize,
        pairs: Vec<(i32, usize)>,
    },
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
        }
    }

    // ==========================================================================
    // Writing
    // ==========================================================================

    pub fn write_op(&mut self, op: OpCode) {
        self.code.push(op.into());
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a 32-bit operand (big-endian).
    pub fn write_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Overwrite a previously written 32-bit operand.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` is past the end of the chunk.
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        self.code[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Get current code offset (for label binding).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    // ==========================================================================
    // Reading
    // ==========================================================================

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.code.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&self, offset: usize) -> Option<i16> {
        self.read_u16(offset).map(|v| v as i16)
    }

    /// Read an i32 at the given offset (big-endian).
    pub fn read_i32(&self, offset: usize) -> Option<i32> {
        let bytes = self.code.get(offset..offset + 4)?;
        Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// Decode the whole chunk.
    ///
    /// Decoding stops at the first invalid opcode or truncated operand.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            match self.decode_at(offset) {
                Some((instruction, next)) => {
                    out.push(instruction);
                    offset = next;
                }
                None => break,
            }
        }
        out
    }

    /// Decode the instruction at `offset`, returning it with the offset of
    /// the next instruction.
    pub fn decode_at(&self, offset: usize) -> Option<(Instruction, usize)> {
        let op = self.read_op(offset)?;
        let at = offset + 1;
        let target = |rel: i32| -> Option<usize> { usize::try_from(offset as i64 + rel as i64).ok() };

        let (operand, next) = match op {
            OpCode::TableSwitch => {
                let default = target(self.read_i32(at)?)?;
                let low = self.read_i32(at + 4)?;
                let high = self.read_i32(at + 8)?;
                let count = usize::try_from(high as i64 - low as i64 + 1).ok()?;
                let mut targets = Vec::with_capacity(count);
                let mut pos = at + 12;
                for _ in 0..count {
                    targets.push(target(self.read_i32(pos)?)?);
                    pos += 4;
                }
                (
                    Operand::Table {
                        default,
                        low,
                        high,
                        targets,
                    },
                    pos,
                )
            }
            OpCode::LookupSwitch => {
                let default = target(self.read_i32(at)?)?;
                let count = usize::try_from(self.read_i32(at + 4)?).ok()?;
                let mut pairs = Vec::with_capacity(count);
                let mut pos = at + 8;
                for _ in 0..count {
                    let key = self.read_i32(pos)?;
                    pairs.push((key, target(self.read_i32(pos + 4)?)?));
                    pos += 8;
                }
                (Operand::Lookup { default, pairs }, pos)
            }
            op if op.is_jump() => (Operand::Jump(target(self.read_i32(at)?)?), at + 4),
            OpCode::IncLocal => (
                Operand::Inc {
                    slot: self.read_u16(at)?,
                    delta: self.read_i16(at + 2)?,
                },
                at + 4,
            ),
            OpCode::InvokeStatic
            | OpCode::InvokeVirtual
            | OpCode::InvokeInterface
            | OpCode::InvokeSpecial => (
                Operand::Invoke {
                    constant: self.read_u16(at)?,
                    argc: self.read_byte(at + 2)?,
                },
                at + 3,
            ),
            OpCode::New => (
                Operand::New {
                    ty: self.read_u16(at)?,
                    constructor: self.read_u16(at + 2)?,
                    argc: self.read_byte(at + 4)?,
                },
                at + 5,
            ),
            op => match op.operand_size() {
                0 => (Operand::None, at),
                1 => (Operand::Byte(self.read_byte(at)?), at + 1),
                _ => (Operand::Short(self.read_u16(at)?), at + 2),
            },
        };

        Some((
            Instruction {
                offset,
                op,
                operand,
            },
            next,
        ))
    }

    /// Extract all opcodes from the chunk, skipping operands.
    ///
    /// This is useful for testing bytecode sequences without worrying about
    /// specific operand values or instruction offsets.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.instructions().into_iter().map(|i| i.op).collect()
    }

    /// Check if this chunk contains exactly the given opcode sequence.
    ///
    /// This ignores operand values, only checking the opcodes themselves.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Check if this chunk contains the given opcodes (in order, but not necessarily contiguous).
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut expected_iter = expected.iter().peekable();

        for op in &actual {
            if expected_iter.peek() == Some(&op) {
                expected_iter.next();
            }
        }

        if expected_iter.peek().is_some() {
            let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
            panic!(
                "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
                remaining,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}
