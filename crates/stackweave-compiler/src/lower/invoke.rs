//! Method invocation and object creation.

use stackweave_core::{
    InvokeKind, LoweringError, MethodSpec, Node, NodeKind, TypeHash, TypeKind, TypeRef,
    well_known,
};

use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;
use crate::resolver::TypeResolver;

use super::{Result, mismatch};

/// Call a method.
///
/// ```text
/// [receiver]          (GetThis when an instance call names none)
/// [args...]
/// Invoke<kind> method, argc
/// Pop                 (statement position, non-void)
/// ```
///
/// Private methods of other nest types are called through a bridge
/// forwarder instead.
pub(super) fn lower_invocation(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::Invocation {
        kind,
        owner,
        method,
        receiver,
        args,
    } = node
    else {
        return Err(mismatch(NodeKind::Invocation, node));
    };

    let owner = ctx.resolve(owner)?;
    let method = {
        let current = ctx.current_type();
        TypeResolver::new(ctx.nest(), &current).resolve_method(method)?
    };
    check_dispatch(ctx, *kind, &owner, &method)?;

    let resolved = Node::Invocation {
        kind: *kind,
        owner: owner.clone(),
        method: method.clone(),
        receiver: receiver.clone(),
        args: args.clone(),
    };
    if let Some(bridged) = ctx.bridge_access(&resolved) {
        return d.process(&bridged, ctx);
    }

    match receiver {
        Some(receiver) => d.process_value(receiver, ctx)?,
        None if *kind != InvokeKind::Static => ctx.emitter().emit_get_this(),
        None => {}
    }
    for arg in args {
        d.process_value(arg, ctx)?;
    }

    let hash = member_hash(&owner, &method);
    ctx.emitter().emit_invoke(*kind, hash, args.len());
    ctx.discard_if_unused(&method.return_type);
    Ok(())
}

/// Create an object.
///
/// ```text
/// [args...]
/// New type, constructor, argc
/// ```
pub(super) fn lower_new(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::New { ty, params, args } = node else {
        return Err(mismatch(NodeKind::New, node));
    };

    let ty = ctx.resolve(ty)?;
    let params = params
        .iter()
        .map(|p| ctx.resolve(p))
        .collect::<Result<Vec<_>>>()?;
    let resolved = Node::New {
        ty: ty.clone(),
        params: params.clone(),
        args: args.clone(),
    };
    if let Some(bridged) = ctx.bridge_access(&resolved) {
        return d.process(&bridged, ctx);
    }

    for arg in args {
        d.process_value(arg, ctx)?;
    }
    let param_hashes: Vec<TypeHash> = params.iter().map(TypeRef::type_hash).collect();
    let constructor = TypeHash::from_constructor(ty.type_hash(), &param_hashes);
    ctx.emitter()
        .emit_new(ty.type_hash(), constructor, args.len());
    ctx.discard_if_unused(&ty);
    Ok(())
}

/// Virtual dispatch needs a class owner, interface dispatch an interface.
///
/// Owners the nest knows nothing about are not checked.
fn check_dispatch(
    ctx: &LoweringContext<'_>,
    kind: InvokeKind,
    owner: &TypeRef,
    method: &MethodSpec,
) -> Result<()> {
    let Some(actual) = ctx.nest().kind_of(owner) else {
        return Ok(());
    };
    let valid = match kind {
        InvokeKind::Virtual => actual != TypeKind::Interface,
        InvokeKind::Interface => actual == TypeKind::Interface,
        InvokeKind::Static | InvokeKind::Special => true,
    };
    if valid {
        Ok(())
    } else {
        Err(LoweringError::InvalidInvocationKind {
            kind,
            owner: owner.clone(),
            name: method.name.clone(),
            actual,
        })
    }
}

/// Constructors are hashed by owner and parameters only.
fn member_hash(owner: &TypeRef, method: &MethodSpec) -> TypeHash {
    if method.name == well_known::CONSTRUCTOR {
        let params: Vec<TypeHash> = method.params.iter().map(TypeRef::type_hash).collect();
        TypeHash::from_constructor(owner.type_hash(), &params)
    } else {
        method.member_hash(owner)
    }
}
