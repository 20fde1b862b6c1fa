//! `try`/`catch`/`finally`.

use stackweave_core::{Node, NodeKind, TypeRef, well_known};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;
use crate::emit::Label;

use super::transfer::inline_finally;
use super::{Result, mismatch};

/// Hidden variable holding an exception while the finally body runs.
const THROWABLE_VAR: &str = "$throwable";

/// Lower a try statement.
///
/// The finally body is copied onto every exit: after the try body, after
/// each catch body, into every `return`/`break`/`continue` leaving the try,
/// and into a catch-all handler that rethrows.
///
/// Bytecode layout:
/// ```text
/// start:
/// [body]
/// end:
/// [finally]
/// Jump exit
/// handler_n:          (one per catch, covering start..end)
/// SetLocal var
/// [catch body]
/// [finally]
/// Jump exit
/// catch_all:          (finally only; covers start..end and each catch body)
/// SetLocal $throwable
/// [finally]
/// GetLocal $throwable
/// Throw
/// exit:
/// ```
pub(super) fn lower_try(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Try {
        body,
        catches,
        finally,
    } = node
    else {
        return Err(mismatch(NodeKind::Try, node));
    };

    let start = ctx.emitter().new_label();
    let end = ctx.emitter().new_label();
    let exit = ctx.emitter().new_label();

    let finally_index = ctx.finally_entries().len();
    if let Some(finally) = finally {
        ctx.push_finally(finally.as_ref().clone());
    }

    ctx.emitter().bind_label(start);
    ctx.with_scope(|ctx| d.process_statement(body, ctx))?;
    ctx.emitter().bind_label(end);
    inline_finally(ctx, d, finally_index)?;
    ctx.emitter().emit_jump(OpCode::Jump, exit);

    // Ranges the catch-all handler protects.
    let mut protected: Vec<(Label, Label)> = vec![(start, end)];

    for catch in catches {
        let ty = ctx.resolve(&catch.ty)?;
        let handler = ctx.emitter().new_label();
        let handler_end = ctx.emitter().new_label();

        ctx.emitter().bind_label(handler);
        ctx.emitter()
            .add_exception_region(start, end, handler, Some(ty.type_hash()));
        ctx.with_scope(|ctx| {
            let slot = ctx.slots_mut().declare(&catch.variable, &ty)?;
            ctx.emitter().emit_set_local(slot);
            d.process_statement(&catch.body, ctx)
        })?;
        ctx.emitter().bind_label(handler_end);
        protected.push((handler, handler_end));

        inline_finally(ctx, d, finally_index)?;
        ctx.emitter().emit_jump(OpCode::Jump, exit);
    }

    let pending = if finally.is_some() {
        ctx.pop_finally()
    } else {
        None
    };
    if let Some(entry) = pending {
        let catch_all = ctx.emitter().new_label();
        ctx.emitter().bind_label(catch_all);
        for (from, to) in protected {
            ctx.emitter().add_exception_region(from, to, catch_all, None);
        }

        ctx.with_slot_scope(|ctx| {
            let name = ctx.slots_mut().unique_name(THROWABLE_VAR);
            let slot = ctx
                .slots_mut()
                .declare(&name, &TypeRef::object(well_known::THROWABLE))?;
            ctx.emitter().emit_set_local(slot);
            ctx.with_scope(|ctx| d.process_statement(&entry.body, ctx))?;
            ctx.emitter().emit_get_local(slot);
            ctx.emitter().emit(OpCode::Throw);
            Ok(())
        })?;
    }

    ctx.emitter().bind_label(exit);
    Ok(())
}
