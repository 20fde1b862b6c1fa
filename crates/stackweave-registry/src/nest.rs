//! The declarations of one top-level compilation nest.
//!
//! A nest is a top-level type together with every type nested in it. Types
//! inside the nest may reach each other's private members through
//! synthesized bridges; everything else (library types, other nests) is
//! registered as an external declaration and is only consulted for its kind.

use rustc_hash::FxHashMap;
use stackweave_core::{
    ConstructorDecl, FieldDecl, MethodDecl, MethodSpec, Modifiers, TypeDecl, TypeKind, TypeRef,
    well_known,
};
use thiserror::Error;

/// Errors raised while populating a [`TypeNest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type '{name}' is already registered")]
    DuplicateType { name: String },

    #[error("declaration type {ty} is not a named object type")]
    NotAnObjectType { ty: TypeRef },

    #[error("type '{name}' is nested in '{outer}', which is not part of this nest")]
    OuterNotInNest { name: String, outer: String },
}

/// Type declarations of one compilation nest plus known external types.
#[derive(Debug, Clone)]
pub struct TypeNest {
    /// Nest members by canonical name.
    types: FxHashMap<String, TypeDecl>,
    /// Registration order of nest members.
    order: Vec<String>,
    /// Types outside the nest.
    externals: FxHashMap<String, TypeDecl>,
}

impl Default for TypeNest {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeNest {
    /// Create an empty nest that knows the well-known library types.
    pub fn new() -> Self {
        let mut nest = Self {
            types: FxHashMap::default(),
            order: Vec::new(),
            externals: FxHashMap::default(),
        };
        for decl in well_known_externals() {
            nest.externals.insert(decl.name().to_string(), decl);
        }
        nest
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a member of the nest.
    ///
    /// Nested declarations must be registered after their outer type.
    pub fn add_type(&mut self, decl: TypeDecl) -> Result<(), RegistryError> {
        let name = Self::decl_name(&decl)?;
        if self.types.contains_key(&name) {
            return Err(RegistryError::DuplicateType { name });
        }
        if let Some(outer) = decl.outer.as_ref().and_then(TypeRef::object_name) {
            if !self.types.contains_key(outer) {
                return Err(RegistryError::OuterNotInNest {
                    name,
                    outer: outer.to_string(),
                });
            }
        }
        self.order.push(name.clone());
        self.types.insert(name, decl);
        Ok(())
    }

    /// Register a type outside the nest, replacing any previous declaration.
    pub fn add_external(&mut self, decl: TypeDecl) -> Result<(), RegistryError> {
        let name = Self::decl_name(&decl)?;
        if self.types.contains_key(&name) {
            return Err(RegistryError::DuplicateType { name });
        }
        self.externals.insert(name, decl);
        Ok(())
    }

    fn decl_name(decl: &TypeDecl) -> Result<String, RegistryError> {
        decl.ty
            .object_name()
            .map(str::to_string)
            .ok_or_else(|| RegistryError::NotAnObjectType { ty: decl.ty.clone() })
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// True if `ty` is declared inside this nest.
    pub fn contains(&self, ty: &TypeRef) -> bool {
        ty.object_name().is_some_and(|name| self.types.contains_key(name))
    }

    /// Declaration of a nest member or external type.
    pub fn get(&self, ty: &TypeRef) -> Option<&TypeDecl> {
        let name = ty.object_name()?;
        self.types.get(name).or_else(|| self.externals.get(name))
    }

    /// Nest members in registration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn kind_of(&self, ty: &TypeRef) -> Option<TypeKind> {
        self.get(ty).map(|decl| decl.kind)
    }

    /// Enclosing types of `ty`, innermost first, excluding `ty` itself.
    pub fn enclosing_chain(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut chain = Vec::new();
        let mut current = self.get(ty).and_then(|decl| decl.outer.clone());
        while let Some(outer) = current {
            current = self.get(&outer).and_then(|decl| decl.outer.clone());
            chain.push(outer);
        }
        chain
    }

    /// Top-level type enclosing `ty` (or `ty` itself when top-level).
    pub fn outermost(&self, ty: &TypeRef) -> TypeRef {
        self.enclosing_chain(ty).pop().unwrap_or_else(|| ty.clone())
    }

    // ==========================================================================
    // Members
    // ==========================================================================

    pub fn find_field(&self, owner: &TypeRef, name: &str) -> Option<&FieldDecl> {
        self.get(owner)?.field(name)
    }

    /// Find a method by structural signature: name, parameter and return types.
    pub fn find_method(&self, owner: &TypeRef, spec: &MethodSpec) -> Option<&MethodDecl> {
        self.get(owner)?.methods.iter().find(|m| {
            m.name == spec.name
                && m.return_type == spec.return_type
                && m.params.len() == spec.params.len()
                && m.params.iter().zip(&spec.params).all(|(p, ty)| p.ty == *ty)
        })
    }

    pub fn find_constructor(&self, owner: &TypeRef, params: &[TypeRef]) -> Option<&ConstructorDecl> {
        self.get(owner)?.constructors.iter().find(|c| {
            c.params.len() == params.len() && c.params.iter().zip(params).all(|(p, ty)| p.ty == *ty)
        })
    }

    /// Ordinal of an enum constant declared on `ty`.
    pub fn enum_ordinal(&self, ty: &TypeRef, constant: &str) -> Option<usize> {
        let decl = self.get(ty)?;
        if decl.kind != TypeKind::Enum {
            return None;
        }
        decl.ordinal(constant)
    }
}

/// Library types the lowering engine references on its own.
fn well_known_externals() -> Vec<TypeDecl> {
    let public = Modifiers::PUBLIC;
    let sealed = Modifiers::PUBLIC | Modifiers::FINAL;
    let mut decls = vec![
        TypeDecl::class(well_known::OBJECT).with_modifiers(public),
        TypeDecl::class(well_known::STRING).with_modifiers(sealed),
        TypeDecl::class(well_known::CLASS).with_modifiers(sealed),
        TypeDecl::class(well_known::ENUM).with_modifiers(public | Modifiers::ABSTRACT),
        TypeDecl::class(well_known::THROWABLE).with_modifiers(public),
        TypeDecl::interface(well_known::ITERABLE).with_modifiers(public),
        TypeDecl::interface(well_known::ITERATOR).with_modifiers(public),
    ];
    for boxed in [
        well_known::BOOLEAN,
        well_known::BYTE,
        well_known::CHARACTER,
        well_known::SHORT,
        well_known::INTEGER,
        well_known::LONG,
        well_known::FLOAT,
        well_known::DOUBLE,
    ] {
        decls.push(TypeDecl::class(boxed).with_modifiers(sealed));
    }
    decls
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackweave_core::Param;

    fn outer() -> TypeRef {
        TypeRef::object("demo.Outer")
    }

    fn inner() -> TypeRef {
        TypeRef::object("demo.Outer$Inner")
    }

    fn sample_nest() -> TypeNest {
        let mut nest = TypeNest::new();
        nest.add_type(
            TypeDecl::class("demo.Outer")
                .with_field(FieldDecl::new("secret", TypeRef::INT, Modifiers::PRIVATE))
                .with_method(MethodDecl::new(
                    "helper",
                    Modifiers::PRIVATE,
                    TypeRef::INT,
                    vec![Param::new("x", TypeRef::INT)],
                )),
        )
        .unwrap();
        nest.add_type(TypeDecl::class("demo.Outer$Inner").with_outer(outer()))
            .unwrap();
        nest.add_type(
            TypeDecl::class("demo.Outer$Inner$Deep").with_outer(inner()),
        )
        .unwrap();
        nest
    }

    #[test]
    fn nest_membership() {
        let nest = sample_nest();
        assert!(nest.contains(&outer()));
        assert!(nest.contains(&inner()));
        assert!(!nest.contains(&TypeRef::string()));
        assert!(nest.get(&TypeRef::string()).is_some());
        assert_eq!(nest.len(), 3);
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let mut nest = sample_nest();
        let err = nest.add_type(TypeDecl::class("demo.Outer")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateType {
                name: "demo.Outer".into()
            }
        );
    }

    #[test]
    fn outer_must_be_registered_first() {
        let mut nest = TypeNest::new();
        let err = nest
            .add_type(TypeDecl::class("demo.A$B").with_outer(TypeRef::object("demo.A")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::OuterNotInNest { .. }));
    }

    #[test]
    fn enclosing_chain_is_innermost_first() {
        let nest = sample_nest();
        let deep = TypeRef::object("demo.Outer$Inner$Deep");
        assert_eq!(nest.enclosing_chain(&deep), vec![inner(), outer()]);
        assert_eq!(nest.outermost(&deep), outer());
        assert_eq!(nest.outermost(&outer()), outer());
    }

    #[test]
    fn structural_method_lookup() {
        let nest = sample_nest();
        let found = MethodSpec::new("helper", TypeRef::INT, vec![TypeRef::INT]);
        let wrong_params = MethodSpec::new("helper", TypeRef::INT, vec![TypeRef::LONG]);
        let wrong_return = MethodSpec::new("helper", TypeRef::VOID, vec![TypeRef::INT]);

        assert!(nest.find_method(&outer(), &found).is_some());
        assert!(nest.find_method(&outer(), &wrong_params).is_none());
        assert!(nest.find_method(&outer(), &wrong_return).is_none());
    }

    #[test]
    fn well_known_kinds() {
        let nest = TypeNest::new();
        assert_eq!(
            nest.kind_of(&TypeRef::object(well_known::ITERATOR)),
            Some(TypeKind::Interface)
        );
        assert_eq!(nest.kind_of(&TypeRef::string()), Some(TypeKind::Class));
    }

    #[test]
    fn enum_ordinals() {
        let mut nest = TypeNest::new();
        nest.add_type(TypeDecl::enumeration("demo.Color", &["RED", "GREEN"]))
            .unwrap();
        let color = TypeRef::object("demo.Color");
        assert_eq!(nest.enum_ordinal(&color, "GREEN"), Some(1));
        assert_eq!(nest.enum_ordinal(&color, "BLUE"), None);
        assert_eq!(nest.enum_ordinal(&outer(), "GREEN"), None);
    }
}
