//! Conditional branches.

use stackweave_core::{Node, NodeKind};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::operate::jump_if;
use super::transfer::{default_target, first_finally_inside, inline_finally};
use super::{Result, mismatch};

/// Lower an `if`/`else`.
///
/// Bytecode layout:
/// ```text
/// start:
/// [condition, jumping to else (or end) when false]
/// body:
/// [body]
/// Jump end            (only with an else branch)
/// else:
/// [else branch]
/// end:
/// ```
///
/// A body ending in a default redirect is a guarded switch case: a failed
/// guard continues at the enclosing switch's default instead. When finally
/// bodies were opened inside that switch, the failed guard goes through a
/// stub that runs them first:
/// ```text
/// [condition, jumping to stub when false]
/// [body]
/// stub:
/// [finally bodies, innermost first]
/// Jump default
/// ```
pub(super) fn lower_if(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::If {
        condition,
        body,
        otherwise,
    } = node
    else {
        return Err(mismatch(NodeKind::If, node));
    };

    let start = ctx.emitter().new_label();
    let body_label = ctx.emitter().new_label();
    let else_label = ctx.emitter().new_label();
    let end = ctx.emitter().new_label();

    // Default label of the enclosing switch, and whether finally bodies
    // must run before reaching it.
    let mut stub = None;
    let false_target = if body.ends_with_redirect() {
        let (depth, default) = default_target(ctx)?;
        let from = first_finally_inside(ctx, depth);
        if from < ctx.finally_entries().len() {
            let label = ctx.emitter().new_label();
            stub = Some((label, from, default));
            label
        } else {
            default
        }
    } else if otherwise.is_some() {
        else_label
    } else {
        end
    };

    ctx.emitter().bind_label(start);
    jump_if(condition, false, false_target, ctx, d)?;

    ctx.emitter().bind_label(body_label);
    ctx.with_scope(|ctx| d.process_statement(body, ctx))?;

    // The body ends in a redirect, so nothing falls into the stub.
    if let Some((label, from, default)) = stub {
        ctx.emitter().bind_label(label);
        inline_finally(ctx, d, from)?;
        ctx.emitter().emit_jump(OpCode::Jump, default);
    }

    if let Some(otherwise) = otherwise {
        ctx.emitter().emit_jump(OpCode::Jump, end);
        ctx.emitter().bind_label(else_label);
        ctx.with_scope(|ctx| d.process_statement(otherwise, ctx))?;
    }

    ctx.emitter().bind_label(end);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::bytecode::Operand;
    use stackweave_core::{CompareOp, LoweringError, TypeRef};

    fn positive() -> Node {
        Node::check(CompareOp::Gt, Node::var("n", TypeRef::INT), Node::int(0))
    }

    #[test]
    fn if_else_layout() {
        let node = Node::if_then(
            positive(),
            Node::ret(Some(Node::int(1))),
            Some(Node::ret(Some(Node::int(2)))),
        );
        let output = Harness::new()
            .returning(TypeRef::INT)
            .with_param("n", TypeRef::INT)
            .lower(&node)
            .unwrap();
        let instructions = output.code.bytecode.instructions();
        let ops: Vec<OpCode> = instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                OpCode::GetLocal,
                OpCode::PushZero,
                OpCode::GtI32,
                OpCode::JumpIfFalse,
                OpCode::PushOne,
                OpCode::Return,
                OpCode::Jump,
                OpCode::Constant,
                OpCode::Return,
            ]
        );
        // False path enters the else branch; the body's exit skips it.
        assert_eq!(instructions[3].operand, Operand::Jump(instructions[7].offset));
        let end = output.code.bytecode.len();
        assert_eq!(instructions[6].operand, Operand::Jump(end));
    }

    #[test]
    fn if_without_else_falls_to_end() {
        let node = Node::if_then(positive(), Node::int(5), None);
        let output = Harness::new()
            .with_param("n", TypeRef::INT)
            .lower(&node)
            .unwrap();
        let instructions = output.code.bytecode.instructions();
        assert_eq!(instructions[3].op, OpCode::JumpIfFalse);
        assert_eq!(instructions[3].operand, Operand::Jump(output.code.bytecode.len()));
    }

    #[test]
    fn constant_conditions_emit_no_test() {
        let output = Harness::new()
            .lower(&Node::if_then(Node::boolean(true), Node::int(3), None))
            .unwrap();
        output
            .code
            .bytecode
            .assert_opcodes(&[OpCode::Constant, OpCode::Pop]);
    }

    #[test]
    fn redirecting_body_needs_a_switch() {
        let node = Node::if_then(
            positive(),
            Node::seq(vec![Node::int(5), Node::RedirectToEnclosingDefault]),
            None,
        );
        let err = Harness::new()
            .with_param("n", TypeRef::INT)
            .lower(&node)
            .unwrap_err();
        assert_eq!(err, LoweringError::RedirectOutsideSwitch);
    }
}
