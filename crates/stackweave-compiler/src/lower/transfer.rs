//! Non-local transfers of control: `return`, `break`, `continue`, `throw`
//! and the switch-default redirect.
//!
//! Leaving a try region with a pending `finally` runs a copy of the finally
//! body first. Each copy is lowered with its own entry (and everything
//! inside it) set aside, so a transfer inside a finally body never re-enters
//! that same finally.

use stackweave_core::{LoweringError, Node, NodeKind};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;
use crate::emit::Label;

use super::{Result, mismatch};

/// Hidden variable holding a return value while finally bodies run.
const RESULT_VAR: &str = "$result";

/// Lower `return`, running every pending finally body first.
///
/// ```text
/// [value]
/// SetLocal $result    (only with pending finally bodies)
/// [finally bodies, innermost first]
/// GetLocal $result
/// Return
/// ```
pub(super) fn lower_return(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Return(value) = node else {
        return Err(mismatch(NodeKind::Return, node));
    };

    let Some(value) = value else {
        inline_finally(ctx, d, 0)?;
        ctx.emitter().emit(OpCode::ReturnVoid);
        return Ok(());
    };

    let declared = ctx.return_type();
    let ty = if declared.is_void() {
        ctx.resolve(&value.value_type())?
    } else {
        declared
    };
    d.process_value(value, ctx)?;

    if ctx.finally_entries().is_empty() {
        ctx.emitter().emit_return(&ty);
        return Ok(());
    }

    ctx.with_slot_scope(|ctx| {
        let name = ctx.slots_mut().unique_name(RESULT_VAR);
        let slot = ctx.slots_mut().declare(&name, &ty)?;
        ctx.emitter().emit_set_local(slot);
        inline_finally(ctx, d, 0)?;
        ctx.emitter().emit_get_local(slot);
        ctx.emitter().emit_return(&ty);
        Ok(())
    })
}

/// Jump to the exit of the innermost (or labelled) loop or switch.
pub(super) fn lower_break(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Break(label) = node else {
        return Err(mismatch(NodeKind::Break, node));
    };
    let (depth, target) = ctx
        .flows()
        .find_breakable(label.as_deref())
        .map(|(depth, record)| (depth, record.exit))
        .ok_or_else(|| LoweringError::BreakOutsideConstruct {
            label: label.clone(),
        })?;

    inline_finally(ctx, d, first_finally_inside(ctx, depth))?;
    ctx.emitter().emit_jump(OpCode::Jump, target);
    Ok(())
}

/// Jump to the continue target of the innermost (or labelled) loop.
pub(super) fn lower_continue(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::Continue(label) = node else {
        return Err(mismatch(NodeKind::Continue, node));
    };
    let (depth, target) = ctx
        .flows()
        .find_loop(label.as_deref())
        .map(|(depth, record)| (depth, record.body_exit))
        .ok_or_else(|| LoweringError::ContinueOutsideLoop {
            label: label.clone(),
        })?;

    inline_finally(ctx, d, first_finally_inside(ctx, depth))?;
    ctx.emitter().emit_jump(OpCode::Jump, target);
    Ok(())
}

pub(super) fn lower_throw(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Throw(value) = node else {
        return Err(mismatch(NodeKind::Throw, node));
    };
    d.process_value(value, ctx)?;
    ctx.emitter().emit(OpCode::Throw);
    Ok(())
}

/// Continue at the default case of the innermost switch, running the
/// finally bodies opened inside it first.
pub(super) fn lower_redirect(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    if !matches!(node, Node::RedirectToEnclosingDefault) {
        return Err(mismatch(NodeKind::RedirectToEnclosingDefault, node));
    }
    let (depth, target) = default_target(ctx)?;
    inline_finally(ctx, d, first_finally_inside(ctx, depth))?;
    ctx.emitter().emit_jump(OpCode::Jump, target);
    Ok(())
}

/// Flow depth and default label of the innermost switch.
pub(super) fn default_target(ctx: &LoweringContext<'_>) -> Result<(usize, Label)> {
    ctx.flows()
        .innermost_switch()
        .map(|(depth, record)| (depth, record.body_exit))
        .ok_or(LoweringError::RedirectOutsideSwitch)
}

/// Index of the first finally entry opened inside the flow record at
/// `depth`; those are the bodies a jump to that record leaves.
pub(super) fn first_finally_inside(ctx: &LoweringContext<'_>, depth: usize) -> usize {
    let entries = ctx.finally_entries();
    entries
        .iter()
        .position(|entry| entry.flow_depth > depth)
        .unwrap_or(entries.len())
}

/// Lower a copy of every finally body from index `from` up, innermost
/// first.
pub(super) fn inline_finally(ctx: &mut LoweringContext<'_>, d: &Dispatcher, from: usize) -> Result<()> {
    let mut index = ctx.finally_entries().len();
    while index > from {
        index -= 1;
        let taken = ctx.take_finally_from(index);
        let result = match taken.first() {
            Some(entry) => ctx.with_scope(|ctx| d.process_statement(&entry.body, ctx)),
            None => Ok(()),
        };
        ctx.restore_finally(taken);
        result?;
    }
    Ok(())
}
