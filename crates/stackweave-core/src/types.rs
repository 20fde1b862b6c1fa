//! Type descriptors.
//!
//! [`TypeRef`] is the symbolic type reference carried by tree nodes. It
//! exposes canonical names, binary descriptors and the primitive/reference
//! classification the lowering engine needs (notably value width).

use std::fmt;

use crate::TypeHash;

// ============================================================================
// Primitives
// ============================================================================

/// Primitive value types of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Void,
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    /// Number of slots/stack cells a value of this type occupies.
    pub const fn width(self) -> u8 {
        match self {
            Primitive::Void => 0,
            Primitive::Long | Primitive::Double => 2,
            _ => 1,
        }
    }

    /// Canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }

    /// Single-character binary descriptor.
    pub const fn descriptor(self) -> char {
        match self {
            Primitive::Void => 'V',
            Primitive::Bool => 'Z',
            Primitive::Byte => 'B',
            Primitive::Char => 'C',
            Primitive::Short => 'S',
            Primitive::Int => 'I',
            Primitive::Long => 'J',
            Primitive::Float => 'F',
            Primitive::Double => 'D',
        }
    }

    /// Types computed on the machine as 32-bit integers.
    pub const fn is_int_like(self) -> bool {
        matches!(
            self,
            Primitive::Bool | Primitive::Byte | Primitive::Char | Primitive::Short | Primitive::Int
        )
    }

    /// Types usable directly as a 32-bit dispatch key.
    pub const fn is_switchable(self) -> bool {
        matches!(
            self,
            Primitive::Byte | Primitive::Char | Primitive::Short | Primitive::Int
        )
    }

    /// The wrapper type boxing this primitive, if any.
    pub fn boxed(self) -> Option<TypeRef> {
        let name = match self {
            Primitive::Void => return None,
            Primitive::Bool => well_known::BOOLEAN,
            Primitive::Byte => well_known::BYTE,
            Primitive::Char => well_known::CHARACTER,
            Primitive::Short => well_known::SHORT,
            Primitive::Int => well_known::INTEGER,
            Primitive::Long => well_known::LONG,
            Primitive::Float => well_known::FLOAT,
            Primitive::Double => well_known::DOUBLE,
        };
        Some(TypeRef::object(name))
    }
}

// ============================================================================
// Aliases
// ============================================================================

/// Symbolic types resolved against the type currently being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeAlias {
    /// The enclosing type itself.
    This,
    /// The direct supertype of the enclosing type.
    Super,
    /// The n-th declared interface of the enclosing type.
    Interface(usize),
}

impl fmt::Display for TypeAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeAlias::This => write!(f, "this"),
            TypeAlias::Super => write!(f, "super"),
            TypeAlias::Interface(n) => write!(f, "interface#{n}"),
        }
    }
}

// ============================================================================
// TypeRef
// ============================================================================

/// A symbolic type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(Primitive),
    /// A class, interface or enum by dotted canonical name.
    ///
    /// Nested types use `$` between the outer and inner simple names.
    Object(String),
    Array(Box<TypeRef>),
    Alias(TypeAlias),
}

impl TypeRef {
    pub const VOID: TypeRef = TypeRef::Primitive(Primitive::Void);
    pub const BOOL: TypeRef = TypeRef::Primitive(Primitive::Bool);
    pub const BYTE: TypeRef = TypeRef::Primitive(Primitive::Byte);
    pub const CHAR: TypeRef = TypeRef::Primitive(Primitive::Char);
    pub const SHORT: TypeRef = TypeRef::Primitive(Primitive::Short);
    pub const INT: TypeRef = TypeRef::Primitive(Primitive::Int);
    pub const LONG: TypeRef = TypeRef::Primitive(Primitive::Long);
    pub const FLOAT: TypeRef = TypeRef::Primitive(Primitive::Float);
    pub const DOUBLE: TypeRef = TypeRef::Primitive(Primitive::Double);
    pub const THIS: TypeRef = TypeRef::Alias(TypeAlias::This);

    /// Reference to a named class, interface or enum.
    pub fn object(name: impl Into<String>) -> Self {
        TypeRef::Object(name.into())
    }

    /// Array of `element`.
    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn object_root() -> Self {
        TypeRef::object(well_known::OBJECT)
    }

    pub fn string() -> Self {
        TypeRef::object(well_known::STRING)
    }

    /// Slots/stack cells occupied by a value of this type.
    pub fn width(&self) -> u8 {
        match self {
            TypeRef::Primitive(p) => p.width(),
            _ => 1,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Primitive(Primitive::Void))
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            TypeRef::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, TypeRef::Primitive(_))
    }

    /// Canonical name of an object type.
    pub fn object_name(&self) -> Option<&str> {
        match self {
            TypeRef::Object(name) => Some(name),
            _ => None,
        }
    }

    /// Element type of an array.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Name after the last package separator.
    pub fn simple_name(&self) -> String {
        let name = self.to_string();
        match name.rfind('.') {
            Some(idx) => name[idx + 1..].to_string(),
            None => name,
        }
    }

    /// Primitive wrapped by a boxed wrapper type.
    pub fn unboxed(&self) -> Option<Primitive> {
        let name = self.object_name()?;
        Some(match name {
            well_known::BOOLEAN => Primitive::Bool,
            well_known::BYTE => Primitive::Byte,
            well_known::CHARACTER => Primitive::Char,
            well_known::SHORT => Primitive::Short,
            well_known::INTEGER => Primitive::Int,
            well_known::LONG => Primitive::Long,
            well_known::FLOAT => Primitive::Float,
            well_known::DOUBLE => Primitive::Double,
            _ => return None,
        })
    }

    /// Binary descriptor, e.g. `I`, `Ldemo/Outer;`, `[J`.
    ///
    /// Aliases are expected to be resolved first; an unresolved alias
    /// renders as `L$this;` style placeholders.
    pub fn descriptor(&self) -> String {
        match self {
            TypeRef::Primitive(p) => p.descriptor().to_string(),
            TypeRef::Object(name) => format!("L{};", name.replace('.', "/")),
            TypeRef::Array(element) => format!("[{}", element.descriptor()),
            TypeRef::Alias(alias) => format!("L${alias};"),
        }
    }

    /// Identity hash used in instruction operands.
    pub fn type_hash(&self) -> TypeHash {
        TypeHash::from_name(&self.to_string())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => f.write_str(p.name()),
            TypeRef::Object(name) => f.write_str(name),
            TypeRef::Array(element) => write!(f, "{element}[]"),
            TypeRef::Alias(alias) => write!(f, "<{alias}>"),
        }
    }
}

impl From<Primitive> for TypeRef {
    fn from(p: Primitive) -> Self {
        TypeRef::Primitive(p)
    }
}

// ============================================================================
// Method signatures
// ============================================================================

/// Structural signature of a method: name plus parameter and return types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSpec {
    pub name: String,
    pub return_type: TypeRef,
    pub params: Vec<TypeRef>,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, return_type: TypeRef, params: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
        }
    }

    /// Method descriptor, e.g. `(ILdemo/Outer;)V`.
    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(TypeRef::descriptor).collect();
        format!("({params}){}", self.return_type.descriptor())
    }

    /// Member hash of this signature declared on `owner`.
    pub fn member_hash(&self, owner: &TypeRef) -> TypeHash {
        let params: Vec<TypeHash> = self.params.iter().map(TypeRef::type_hash).collect();
        TypeHash::from_method(owner.type_hash(), &self.name, &params)
    }
}

/// Canonical names of the types the lowering engine refers to by itself.
pub mod well_known {
    pub const OBJECT: &str = "lang.Object";
    pub const STRING: &str = "lang.String";
    pub const ENUM: &str = "lang.Enum";
    pub const ITERABLE: &str = "lang.Iterable";
    pub const ITERATOR: &str = "lang.Iterator";
    pub const THROWABLE: &str = "lang.Throwable";
    pub const CLASS: &str = "lang.Class";
    pub const BOOLEAN: &str = "lang.Boolean";
    pub const BYTE: &str = "lang.Byte";
    pub const CHARACTER: &str = "lang.Character";
    pub const SHORT: &str = "lang.Short";
    pub const INTEGER: &str = "lang.Integer";
    pub const LONG: &str = "lang.Long";
    pub const FLOAT: &str = "lang.Float";
    pub const DOUBLE: &str = "lang.Double";

    /// Name used for constructors in member hashes and descriptors.
    pub const CONSTRUCTOR: &str = "<init>";
}
