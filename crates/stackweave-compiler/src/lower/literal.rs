//! Constants, the receiver, stack duplication and plain sequences.

use stackweave_core::{Literal, Node, NodeKind, TypeRef};

use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::{Result, mismatch};

/// Push a compile-time constant.
///
/// Integers narrower than `long` share the int encoding; `long`, floating
/// point and text values go through the constant pool.
pub(super) fn lower_literal(node: &Node, ctx: &mut LoweringContext<'_>, _: &Dispatcher) -> Result<()> {
    let Node::Literal(literal) = node else {
        return Err(mismatch(NodeKind::Literal, node));
    };

    if let Literal::Class(ty) = literal {
        let ty = ctx.resolve(ty)?;
        ctx.emitter().emit_type_constant(ty.type_hash());
    } else {
        let emitter = ctx.emitter();
        match literal {
            Literal::Null => emitter.emit_null(),
            Literal::Bool(value) => emitter.emit_bool(*value),
            Literal::Byte(value) => emitter.emit_int(i32::from(*value)),
            Literal::Char(value) => emitter.emit_int(i32::from(*value)),
            Literal::Short(value) => emitter.emit_int(i32::from(*value)),
            Literal::Int(value) => emitter.emit_int(*value),
            Literal::Long(value) => emitter.emit_long(*value),
            Literal::Float(value) => emitter.emit_f32(value.into_inner()),
            Literal::Double(value) => emitter.emit_f64(value.into_inner()),
            Literal::Text(value) => emitter.emit_string(value),
            Literal::Class(_) => {}
        }
    }

    ctx.discard_if_unused(&literal.value_type());
    Ok(())
}

pub(super) fn lower_this(node: &Node, ctx: &mut LoweringContext<'_>, _: &Dispatcher) -> Result<()> {
    if !matches!(node, Node::This) {
        return Err(mismatch(NodeKind::This, node));
    }
    ctx.emitter().emit_get_this();
    ctx.discard_if_unused(&TypeRef::object_root());
    Ok(())
}

/// Duplicate the value on top of the stack.
pub(super) fn lower_dup(node: &Node, ctx: &mut LoweringContext<'_>, _: &Dispatcher) -> Result<()> {
    let Node::Dup(ty) = node else {
        return Err(mismatch(NodeKind::Dup, node));
    };
    ctx.emitter().emit_dup(ty.width());
    ctx.discard_if_unused(ty);
    Ok(())
}

pub(super) fn lower_nothing(node: &Node, _: &mut LoweringContext<'_>, _: &Dispatcher) -> Result<()> {
    match node {
        Node::Nothing => Ok(()),
        other => Err(mismatch(NodeKind::Nothing, other)),
    }
}

/// Lower each node in order, at the surrounding depth.
///
/// A sequence opens no scope: declarations inside it stay visible to the
/// nodes that follow, which is what desugared trees rely on.
pub(super) fn lower_instructions(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::Instructions(nodes) = node else {
        return Err(mismatch(NodeKind::Instructions, node));
    };
    for child in nodes {
        d.process(child, ctx)?;
    }
    Ok(())
}
