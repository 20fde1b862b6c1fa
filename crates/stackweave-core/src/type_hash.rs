//! Deterministic hash-based member identity.
//!
//! [`TypeHash`] is a 64-bit hash that identifies a type, field, method or
//! constructor. Instruction operands refer to members through these hashes
//! (stored in the constant pool), so the same member always encodes to the
//! same operand regardless of declaration order.
//!
//! # Examples
//!
//! ```
//! use stackweave_core::TypeHash;
//!
//! let int_hash = TypeHash::from_name("int");
//! assert_eq!(int_hash, TypeHash::from_name("int"));
//!
//! let owner = TypeHash::from_name("demo.Counter");
//! let a = TypeHash::from_method(owner, "add", &[int_hash]);
//! let b = TypeHash::from_method(owner, "add", &[TypeHash::from_name("long")]);
//! assert_ne!(a, b);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants.
///
/// Different member kinds sharing a name still hash apart.
pub mod hash_constants {
    /// Separator for chained components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for field hashes.
    pub const FIELD: u64 = 0x1a095090689d4647;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constructor hashes.
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Parameter position markers; position matters for overloads.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x0f1e2d3c4b5a6978,
    ];
}

/// A deterministic 64-bit hash identifying a type or member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash of a canonical type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash of a field, identified by owner and name.
    #[inline]
    pub fn from_field(owner: TypeHash, name: &str) -> Self {
        TypeHash(hash_constants::FIELD ^ owner.0.rotate_left(17) ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash of a method from owner, name and parameter type hashes.
    ///
    /// Parameter order matters: `(int, long)` and `(long, int)` differ.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::METHOD ^ owner.0.rotate_left(17) ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_params(seed, param_hashes))
    }

    /// Hash of a constructor. Constructors are identified by owner and params.
    #[inline]
    pub fn from_constructor(owner: TypeHash, param_hashes: &[TypeHash]) -> Self {
        TypeHash(mix_params(hash_constants::CONSTRUCTOR ^ owner.0, param_hashes))
    }

    /// Check if this is the empty hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

fn mix_params(seed: u64, param_hashes: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, param) in param_hashes.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the mix order-dependent
        hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ param.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("demo.Outer"), TypeHash::from_name("demo.Outer"));
        assert_ne!(TypeHash::from_name("demo.Outer"), TypeHash::from_name("demo.Inner"));
    }

    #[test]
    fn member_domains_do_not_collide() {
        let owner = TypeHash::from_name("demo.Outer");
        let field = TypeHash::from_field(owner, "value");
        let method = TypeHash::from_method(owner, "value", &[]);
        assert_ne!(field, method);
    }

    #[test]
    fn parameter_order_matters() {
        let owner = TypeHash::from_name("demo.Outer");
        let int = TypeHash::from_name("int");
        let long = TypeHash::from_name("long");
        assert_ne!(
            TypeHash::from_method(owner, "f", &[int, long]),
            TypeHash::from_method(owner, "f", &[long, int])
        );
        assert_ne!(
            TypeHash::from_constructor(owner, &[int]),
            TypeHash::from_constructor(owner, &[long])
        );
    }

    #[test]
    fn owner_distinguishes_methods() {
        let a = TypeHash::from_name("demo.A");
        let b = TypeHash::from_name("demo.B");
        assert_ne!(
            TypeHash::from_method(a, "run", &[]),
            TypeHash::from_method(b, "run", &[])
        );
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(!TypeHash::from_name("int").is_empty());
    }
}
