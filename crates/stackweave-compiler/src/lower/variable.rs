//! Local variable reads, declarations and assignments.

use stackweave_core::{ArithOp, Literal, Node, NodeKind, TypeRef};

use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::{Result, mismatch};

pub(super) fn lower_access(node: &Node, ctx: &mut LoweringContext<'_>, _: &Dispatcher) -> Result<()> {
    let Node::VariableAccess { name, ty } = node else {
        return Err(mismatch(NodeKind::VariableAccess, node));
    };
    let ty = ctx.resolve(ty)?;
    let slot = ctx
        .slots()
        .require(name, &ty)
        .map_err(|err| err.with_node(node))?;
    ctx.emitter().emit_get_local(slot);
    ctx.discard_if_unused(&ty);
    Ok(())
}

/// Declare a variable in the innermost scope, storing its initial value.
///
/// The value is lowered before the name is bound, so an initializer still
/// sees any outer binding the declaration shadows.
pub(super) fn lower_declaration(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::VariableDeclaration { name, ty, value } = node else {
        return Err(mismatch(NodeKind::VariableDeclaration, node));
    };
    let ty = ctx.resolve(ty)?;

    if let Some(value) = value {
        d.process_value(value, ctx)?;
    }
    let slot = ctx.slots_mut().declare(name, &ty)?;
    if value.is_some() {
        ctx.emitter().emit_set_local(slot);
    }
    Ok(())
}

/// Assign to a declared variable.
///
/// `x = x + c` and `x = x - c` on an int local become a single `IncLocal`
/// when the constant fits 16 bits.
pub(super) fn lower_definition(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::VariableDefinition { name, ty, value } = node else {
        return Err(mismatch(NodeKind::VariableDefinition, node));
    };
    let ty = ctx.resolve(ty)?;
    let slot = ctx
        .slots()
        .require(name, &ty)
        .map_err(|err| err.with_node(node))?;

    if ctx.options().fuse_local_updates {
        if let Some(delta) = fused_delta(name, &ty, value) {
            ctx.emitter().emit_inc_local(slot, delta);
            return Ok(());
        }
    }

    d.process_value(value, ctx)?;
    ctx.emitter().emit_set_local(slot);
    Ok(())
}

/// The constant added to `name` by `value`, if `value` is `name + c`,
/// `c + name` or `name - c`.
fn fused_delta(name: &str, ty: &TypeRef, value: &Node) -> Option<i16> {
    if *ty != TypeRef::INT {
        return None;
    }
    let Node::Operate {
        op,
        ty: op_ty,
        left,
        right,
    } = value
    else {
        return None;
    };
    if *op_ty != TypeRef::INT {
        return None;
    }

    let is_self = |node: &Node| {
        matches!(node, Node::VariableAccess { name: n, ty: t } if n == name && t == ty)
    };
    let constant = |node: &Node| match node {
        Node::Literal(Literal::Int(c)) => Some(*c),
        _ => None,
    };

    // The variable may sit on the right only when the operands commute.
    let operand = if is_self(left) {
        right
    } else if op.is_commutative() && is_self(right) {
        left
    } else {
        return None;
    };
    let delta = match op {
        ArithOp::Add => constant(operand)?,
        ArithOp::Sub => constant(operand)?.checked_neg()?,
        _ => return None,
    };
    i16::try_from(delta).ok()
}
