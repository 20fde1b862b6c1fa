//! Resolution of symbolic type aliases.
//!
//! Tree nodes may refer to `this`, `super` and the n-th declared interface of
//! the type being lowered instead of naming them. [`TypeResolver`] replaces
//! those aliases with concrete types using the nest's declarations.

use stackweave_core::{LoweringError, MethodSpec, TypeAlias, TypeRef};
use stackweave_registry::TypeNest;

type Result<T> = std::result::Result<T, LoweringError>;

/// Resolves aliases against one enclosing type.
pub struct TypeResolver<'a> {
    nest: &'a TypeNest,
    current: &'a TypeRef,
}

impl<'a> TypeResolver<'a> {
    pub fn new(nest: &'a TypeNest, current: &'a TypeRef) -> Self {
        Self { nest, current }
    }

    /// Resolve `ty`, descending into array element types.
    pub fn resolve(&self, ty: &TypeRef) -> Result<TypeRef> {
        match ty {
            TypeRef::Alias(alias) => self.resolve_alias(*alias),
            TypeRef::Array(element) => Ok(TypeRef::array(self.resolve(element)?)),
            other => Ok(other.clone()),
        }
    }

    pub fn resolve_alias(&self, alias: TypeAlias) -> Result<TypeRef> {
        if alias == TypeAlias::This {
            return Ok(self.current.clone());
        }

        let unresolvable = || LoweringError::UnresolvableAlias {
            alias,
            context: self.current.to_string(),
        };
        let decl = self.nest.get(self.current).ok_or_else(unresolvable)?;
        let resolved = match alias {
            TypeAlias::This => None,
            TypeAlias::Super => decl.superclass.clone(),
            TypeAlias::Interface(n) => decl.interfaces.get(n).cloned(),
        };
        resolved.ok_or_else(unresolvable)
    }

    /// Resolve every type mentioned by a method signature.
    pub fn resolve_method(&self, spec: &MethodSpec) -> Result<MethodSpec> {
        Ok(MethodSpec {
            name: spec.name.clone(),
            return_type: self.resolve(&spec.return_type)?,
            params: spec
                .params
                .iter()
                .map(|p| self.resolve(p))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}
