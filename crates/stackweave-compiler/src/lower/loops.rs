//! `for`, `while` and `do`/`while` loops.
//!
//! Loops test their condition at the bottom, so each iteration runs a
//! single conditional jump. The flow record of a loop is active while its
//! body and update section are lowered.

use stackweave_core::{Node, NodeKind};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;
use crate::emit::Label;
use crate::flow::{FlowKind, FlowRecord};

use super::operate::jump_if;
use super::{Result, mismatch};

/// Lower a `for` loop. Declarations in the init section are scoped to the
/// loop.
///
/// Bytecode layout:
/// ```text
/// [init]
/// Jump condition
/// body:
/// [body]
/// update:             (continue target)
/// [update]
/// condition:
/// [condition, jumping to body when true]
/// exit:               (break target)
/// ```
pub(super) fn lower_for(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::For {
        label,
        init,
        condition,
        update,
        body,
    } = node
    else {
        return Err(mismatch(NodeKind::For, node));
    };

    ctx.with_scope(|ctx| {
        for node in init {
            d.process_statement(node, ctx)?;
        }

        let labels = LoopLabels::new(ctx);
        ctx.emitter().emit_jump(OpCode::Jump, labels.condition);
        ctx.flows_mut().push(labels.record(label, labels.update));

        ctx.emitter().bind_label(labels.body);
        ctx.with_scope(|ctx| d.process_statement(body, ctx))?;

        ctx.emitter().bind_label(labels.update);
        for node in update {
            d.process_statement(node, ctx)?;
        }
        ctx.flows_mut().pop();

        ctx.emitter().bind_label(labels.condition);
        match condition {
            Some(condition) => jump_if(condition, true, labels.body, ctx, d)?,
            None => ctx.emitter().emit_jump(OpCode::Jump, labels.body),
        }
        ctx.emitter().bind_label(labels.exit);
        Ok(())
    })
}

/// Lower a `while` or `do`/`while` loop. Only `while` jumps to its
/// condition before the first iteration.
///
/// Bytecode layout:
/// ```text
/// Jump condition      (while only)
/// body:
/// [body]
/// condition:          (continue target)
/// [condition, jumping to body when true]
/// exit:               (break target)
/// ```
pub(super) fn lower_while(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::While {
        label,
        condition,
        body,
        do_while,
    } = node
    else {
        return Err(mismatch(NodeKind::While, node));
    };

    let labels = LoopLabels::new(ctx);
    if !do_while {
        ctx.emitter().emit_jump(OpCode::Jump, labels.condition);
    }
    ctx.flows_mut().push(labels.record(label, labels.condition));

    ctx.emitter().bind_label(labels.body);
    ctx.with_scope(|ctx| d.process_statement(body, ctx))?;
    ctx.flows_mut().pop();

    ctx.emitter().bind_label(labels.condition);
    jump_if(condition, true, labels.body, ctx, d)?;
    ctx.emitter().bind_label(labels.exit);
    Ok(())
}

struct LoopLabels {
    condition: Label,
    body: Label,
    update: Label,
    exit: Label,
}

impl LoopLabels {
    fn new(ctx: &mut LoweringContext<'_>) -> Self {
        let emitter = ctx.emitter();
        Self {
            condition: emitter.new_label(),
            body: emitter.new_label(),
            update: emitter.new_label(),
            exit: emitter.new_label(),
        }
    }

    fn record(&self, label: &Option<String>, continue_target: Label) -> FlowRecord {
        FlowRecord {
            kind: FlowKind::Loop,
            label: label.clone(),
            entry: self.condition,
            body_entry: self.body,
            body_exit: continue_target,
            exit: self.exit,
        }
    }
}
