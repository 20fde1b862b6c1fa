//! Array element access, length and allocation.

use stackweave_core::{Node, NodeKind, TypeRef};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::operate::emit_conversion;
use super::{Result, mismatch};

pub(super) fn lower_length(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::ArrayLength(array) = node else {
        return Err(mismatch(NodeKind::ArrayLength, node));
    };
    d.process_value(array, ctx)?;
    ctx.emitter().emit(OpCode::ArrayLength);
    ctx.discard_if_unused(&TypeRef::INT);
    Ok(())
}

/// Load an element, converting it to the type it is consumed as.
pub(super) fn lower_load(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::ArrayLoad { array, index, ty } = node else {
        return Err(mismatch(NodeKind::ArrayLoad, node));
    };
    let ty = ctx.resolve(ty)?;
    let component = ctx
        .resolve(&array.value_type())?
        .element()
        .cloned()
        .unwrap_or_else(|| ty.clone());

    d.process_value(array, ctx)?;
    d.process_value(index, ctx)?;
    ctx.emitter().emit(OpCode::ArrayLoad);
    emit_conversion(ctx, &component, &ty);
    ctx.discard_if_unused(&ty);
    Ok(())
}

pub(super) fn lower_store(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::ArrayStore {
        array,
        index,
        value,
    } = node
    else {
        return Err(mismatch(NodeKind::ArrayStore, node));
    };
    d.process_value(array, ctx)?;
    d.process_value(index, ctx)?;
    d.process_value(value, ctx)?;
    ctx.emitter().emit(OpCode::ArrayStore);
    Ok(())
}

pub(super) fn lower_new_array(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::NewArray { element, length } = node else {
        return Err(mismatch(NodeKind::NewArray, node));
    };
    let element = ctx.resolve(element)?;
    d.process_value(length, ctx)?;
    ctx.emitter().emit_new_array(element.type_hash());
    ctx.discard_if_unused(&TypeRef::array(element));
    Ok(())
}
