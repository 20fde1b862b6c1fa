//! Field reads and writes.
//!
//! Reads of another nest type's private fields are routed through a bridge
//! accessor; the rewritten invocation is handed back to the dispatcher.
//! Writes are always emitted directly.

use stackweave_core::{Node, NodeKind, TypeHash};

use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::{Result, mismatch};

/// Read a field.
///
/// ```text
/// [receiver]          (instance fields)
/// GetField field      (or GetStatic)
/// ```
pub(super) fn lower_access(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::FieldAccess {
        owner,
        name,
        ty,
        receiver,
    } = node
    else {
        return Err(mismatch(NodeKind::FieldAccess, node));
    };

    let owner = ctx.resolve(owner)?;
    let ty = ctx.resolve(ty)?;
    let resolved = Node::FieldAccess {
        owner: owner.clone(),
        name: name.clone(),
        ty: ty.clone(),
        receiver: receiver.clone(),
    };
    if let Some(bridged) = ctx.bridge_access(&resolved) {
        return d.process(&bridged, ctx);
    }

    let field = TypeHash::from_field(owner.type_hash(), name);
    match receiver {
        Some(receiver) => {
            d.process_value(receiver, ctx)?;
            ctx.emitter().emit_get_field(field);
        }
        None => ctx.emitter().emit_get_static(field),
    }
    ctx.discard_if_unused(&ty);
    Ok(())
}

/// Store into a field.
///
/// ```text
/// [receiver]          (instance fields)
/// [value]
/// SetField field      (or SetStatic)
/// ```
pub(super) fn lower_definition(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::FieldDefinition {
        owner,
        name,
        receiver,
        value,
        ..
    } = node
    else {
        return Err(mismatch(NodeKind::FieldDefinition, node));
    };

    let owner = ctx.resolve(owner)?;
    let field = TypeHash::from_field(owner.type_hash(), name);
    if let Some(receiver) = receiver {
        d.process_value(receiver, ctx)?;
    }
    d.process_value(value, ctx)?;
    if receiver.is_some() {
        ctx.emitter().emit_set_field(field);
    } else {
        ctx.emitter().emit_set_static(field);
    }
    Ok(())
}

/// Enum constants are static fields of their enum type.
pub(super) fn lower_enum_constant(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    _: &Dispatcher,
) -> Result<()> {
    let Node::EnumConstant { ty, name } = node else {
        return Err(mismatch(NodeKind::EnumConstant, node));
    };
    let ty = ctx.resolve(ty)?;
    ctx.emitter()
        .emit_get_static(TypeHash::from_field(ty.type_hash(), name));
    ctx.discard_if_unused(&ty);
    Ok(())
}
