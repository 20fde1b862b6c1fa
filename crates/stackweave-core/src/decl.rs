//! Type and member declarations of a compilation nest.

use bitflags::bitflags;

use crate::node::Node;
use crate::types::{MethodSpec, TypeRef};

bitflags! {
    /// Access and property flags of types and members.
    ///
    /// A member carrying none of `PUBLIC`, `PROTECTED` or `PRIVATE` is
    /// package-visible.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

impl Modifiers {
    pub fn is_private(self) -> bool {
        self.contains(Modifiers::PRIVATE)
    }

    pub fn is_static(self) -> bool {
        self.contains(Modifiers::STATIC)
    }
}

/// What a declared type is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
}

/// A routine parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub modifiers: Modifiers,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeRef, modifiers: Modifiers) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub return_type: TypeRef,
    pub params: Vec<Param>,
    /// `None` for abstract and external methods.
    pub body: Option<Node>,
}

impl MethodDecl {
    pub fn new(
        name: impl Into<String>,
        modifiers: Modifiers,
        return_type: TypeRef,
        params: Vec<Param>,
    ) -> Self {
        Self {
            name: name.into(),
            modifiers,
            return_type,
            params,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Node) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param_types(&self) -> Vec<TypeRef> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn spec(&self) -> MethodSpec {
        MethodSpec::new(self.name.clone(), self.return_type.clone(), self.param_types())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub modifiers: Modifiers,
    pub params: Vec<Param>,
    pub body: Option<Node>,
}

impl ConstructorDecl {
    pub fn new(modifiers: Modifiers, params: Vec<Param>) -> Self {
        Self {
            modifiers,
            params,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Node) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param_types(&self) -> Vec<TypeRef> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

/// A class, interface or enum declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub ty: TypeRef,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    /// Directly enclosing type for nested declarations.
    pub outer: Option<TypeRef>,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub constructors: Vec<ConstructorDecl>,
    /// Enum constants in ordinal order.
    pub enum_constants: Vec<String>,
}

impl TypeDecl {
    fn new(ty: TypeRef, kind: TypeKind) -> Self {
        Self {
            ty,
            kind,
            modifiers: Modifiers::empty(),
            outer: None,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            enum_constants: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(TypeRef::object(name), TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(TypeRef::object(name), TypeKind::Interface)
    }

    pub fn enumeration(name: impl Into<String>, constants: &[&str]) -> Self {
        let mut decl = Self::new(TypeRef::object(name), TypeKind::Enum);
        decl.enum_constants = constants.iter().map(|c| c.to_string()).collect();
        decl
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_outer(mut self, outer: TypeRef) -> Self {
        self.outer = Some(outer);
        self
    }

    pub fn with_superclass(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn with_interface(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorDecl) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn name(&self) -> &str {
        self.ty.object_name().unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Ordinal of an enum constant.
    pub fn ordinal(&self, constant: &str) -> Option<usize> {
        self.enum_constants.iter().position(|c| c == constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_members() {
        let decl = TypeDecl::class("demo.Outer")
            .with_field(FieldDecl::new("count", TypeRef::INT, Modifiers::PRIVATE))
            .with_method(MethodDecl::new(
                "run",
                Modifiers::PUBLIC,
                TypeRef::VOID,
                vec![Param::new("n", TypeRef::INT)],
            ));

        assert_eq!(decl.name(), "demo.Outer");
        assert!(decl.field("count").unwrap().modifiers.is_private());
        assert_eq!(decl.methods[0].spec().descriptor(), "(I)V");
    }

    #[test]
    fn enum_ordinals() {
        let decl = TypeDecl::enumeration("demo.Color", &["RED", "GREEN", "BLUE"]);
        assert_eq!(decl.kind, TypeKind::Enum);
        assert_eq!(decl.ordinal("BLUE"), Some(2));
        assert_eq!(decl.ordinal("PINK"), None);
    }

    #[test]
    fn package_visibility_is_no_flag() {
        let m = Modifiers::STATIC | Modifiers::FINAL;
        assert!(!m.is_private());
        assert!(m.is_static());
    }
}
