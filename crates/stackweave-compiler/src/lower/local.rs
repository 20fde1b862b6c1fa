//! Routines declared inside a body.
//!
//! A local routine is lowered on the spot as a separate routine of the
//! innermost enclosing type. It gets its own slots, flows, finally stack and
//! expression depth; only the bridge registry and the constant pool are
//! shared with the routine it was declared in. Nothing is emitted in place.

use stackweave_core::{Node, NodeKind};
use tracing::trace;

use crate::compile::{RoutineDecl, lower_routine};
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::{Result, mismatch};

pub(super) fn lower_local_routine(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::LocalRoutine { decl } = node else {
        return Err(mismatch(NodeKind::LocalRoutine, node));
    };
    let owner = ctx.current_type();
    // A declaration without a body has no code of its own.
    let Some(routine) = RoutineDecl::from_method(&owner, decl) else {
        return Ok(());
    };

    let (nest, bridges, options, constants) = ctx.shared();
    let (compiled, nested) = lower_routine(nest, bridges, options, constants, d, &routine)?;
    trace!(owner = %owner, name = %routine.name, "local routine lowered");

    ctx.add_local_routine(compiled);
    for inner in nested {
        ctx.add_local_routine(inner);
    }
    Ok(())
}
