//! Constant pool shared by every routine of a compiled nest.
//!
//! Instructions refer to numeric literals, text and member hashes through
//! indices into this pool.

use rustc_hash::FxHashMap;
use stackweave_core::TypeHash;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float32(f32),
    Float64(f64),
    /// UTF-8 bytes of a text literal.
    StringData(Vec<u8>),
    /// Type or member hash (invocation targets, field ids, cast targets).
    TypeHash(TypeHash),
}

/// Nest-level constant pool with deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<ConstantKey, u32>,
}

/// Hashable mirror of [`Constant`]; floats are keyed by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(i32),
    Long(i64),
    Float32(u32),
    Float64(u64),
    StringData(Vec<u8>),
    TypeHash(TypeHash),
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get existing constant, returns index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = Self::to_key(&constant);

        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    pub fn add_type_hash(&mut self, hash: TypeHash) -> u32 {
        self.add(Constant::TypeHash(hash))
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Float32(v) => ConstantKey::Float32(v.to_bits()),
            Constant::Float64(v) => ConstantKey::Float64(v.to_bits()),
            Constant::StringData(b) => ConstantKey::StringData(b.clone()),
            Constant::TypeHash(h) => ConstantKey::TypeHash(*h),
        }
    }
}
