//! Monitor regions.
//!
//! A synchronized block is desugared into monitor instructions around a
//! try/finally, so the monitor is released on every exit including
//! exceptional ones:
//!
//! ```text
//! MonitorEnter({ [lock]; $lock = Dup })
//! try {
//!     [body]
//! } finally {
//!     MonitorExit($lock)
//! }
//! ```

use stackweave_core::{Node, NodeKind};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::{Result, mismatch};

/// Hidden variable holding the locked reference.
const LOCK_VAR: &str = "$lock";

pub(super) fn lower_synchronized(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::Synchronized { lock, body } = node else {
        return Err(mismatch(NodeKind::Synchronized, node));
    };

    ctx.with_slot_scope(|ctx| {
        let ty = ctx.resolve(&lock.value_type())?;
        let name = ctx.slots_mut().unique_name(LOCK_VAR);

        let acquire = Node::MonitorEnter(Box::new(Node::seq(vec![
            lock.as_ref().clone(),
            Node::declare(name.clone(), ty.clone(), Node::Dup(ty.clone())),
        ])));
        let guarded = Node::Try {
            body: body.clone(),
            catches: Vec::new(),
            finally: Some(Box::new(Node::MonitorExit(Box::new(Node::var(name, ty))))),
        };
        d.process(&Node::seq(vec![acquire, guarded]), ctx)
    })
}

pub(super) fn lower_monitor_enter(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::MonitorEnter(value) = node else {
        return Err(mismatch(NodeKind::MonitorEnter, node));
    };
    d.process_value(value, ctx)?;
    ctx.emitter().emit(OpCode::MonitorEnter);
    Ok(())
}

pub(super) fn lower_monitor_exit(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::MonitorExit(value) = node else {
        return Err(mismatch(NodeKind::MonitorExit, node));
    };
    d.process_value(value, ctx)?;
    ctx.emitter().emit(OpCode::MonitorExit);
    Ok(())
}
