//! Operators, conditions and conversions.
//!
//! Arithmetic picks its opcode from the operand category (32-bit integer,
//! 64-bit integer, `float`, `double`). Conditions used for branching go
//! through [`jump_if`], which short-circuits `&&`/`||` and folds `!` into
//! the jump sense instead of materializing booleans.

use stackweave_core::{
    ArithOp, CompareOp, Literal, LogicalOp, LoweringError, Node, NodeKind, Primitive, TypeRef,
};

use crate::bytecode::OpCode;
use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;
use crate::emit::Label;

use super::{Result, mismatch};

/// Machine representation of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    I32,
    I64,
    F32,
    F64,
    Ref,
}

fn category(ty: &TypeRef) -> Category {
    match ty.as_primitive() {
        Some(Primitive::Long) => Category::I64,
        Some(Primitive::Float) => Category::F32,
        Some(Primitive::Double) => Category::F64,
        Some(_) => Category::I32,
        None => Category::Ref,
    }
}

fn arith_opcode(op: ArithOp, category: Category) -> Option<OpCode> {
    use ArithOp::*;
    use Category::*;
    Some(match (op, category) {
        (Add, I32) => OpCode::AddI32,
        (Sub, I32) => OpCode::SubI32,
        (Mul, I32) => OpCode::MulI32,
        (Div, I32) => OpCode::DivI32,
        (Rem, I32) => OpCode::ModI32,
        (And, I32) => OpCode::AndI32,
        (Or, I32) => OpCode::OrI32,
        (Xor, I32) => OpCode::XorI32,
        (Shl, I32) => OpCode::ShlI32,
        (Shr, I32) => OpCode::ShrI32,
        (Ushr, I32) => OpCode::UshrI32,

        (Add, I64) => OpCode::AddI64,
        (Sub, I64) => OpCode::SubI64,
        (Mul, I64) => OpCode::MulI64,
        (Div, I64) => OpCode::DivI64,
        (Rem, I64) => OpCode::ModI64,
        (And, I64) => OpCode::AndI64,
        (Or, I64) => OpCode::OrI64,
        (Xor, I64) => OpCode::XorI64,
        (Shl, I64) => OpCode::ShlI64,
        (Shr, I64) => OpCode::ShrI64,
        (Ushr, I64) => OpCode::UshrI64,

        (Add, F32) => OpCode::AddF32,
        (Sub, F32) => OpCode::SubF32,
        (Mul, F32) => OpCode::MulF32,
        (Div, F32) => OpCode::DivF32,
        (Rem, F32) => OpCode::ModF32,

        (Add, F64) => OpCode::AddF64,
        (Sub, F64) => OpCode::SubF64,
        (Mul, F64) => OpCode::MulF64,
        (Div, F64) => OpCode::DivF64,
        (Rem, F64) => OpCode::ModF64,

        _ => return None,
    })
}

fn compare_opcode(op: CompareOp, category: Category) -> Option<OpCode> {
    use Category::*;
    use CompareOp::*;
    Some(match (op, category) {
        (Eq | Ne, I32) => OpCode::EqI32,
        (Eq | Ne, I64) => OpCode::EqI64,
        (Eq | Ne, F32) => OpCode::EqF32,
        (Eq | Ne, F64) => OpCode::EqF64,
        (Eq | Ne, Ref) => OpCode::EqRef,
        (Lt, I32) => OpCode::LtI32,
        (Lt, I64) => OpCode::LtI64,
        (Lt, F32) => OpCode::LtF32,
        (Lt, F64) => OpCode::LtF64,
        (Le, I32) => OpCode::LeI32,
        (Le, I64) => OpCode::LeI64,
        (Le, F32) => OpCode::LeF32,
        (Le, F64) => OpCode::LeF64,
        (Gt, I32) => OpCode::GtI32,
        (Gt, I64) => OpCode::GtI64,
        (Gt, F32) => OpCode::GtF32,
        (Gt, F64) => OpCode::GtF64,
        (Ge, I32) => OpCode::GeI32,
        (Ge, I64) => OpCode::GeI64,
        (Ge, F32) => OpCode::GeF32,
        (Ge, F64) => OpCode::GeF64,
        _ => return None,
    })
}

// ============================================================================
// Value handlers
// ============================================================================

pub(super) fn lower_operate(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Operate {
        op,
        ty,
        left,
        right,
    } = node
    else {
        return Err(mismatch(NodeKind::Operate, node));
    };

    let ty = ctx.resolve(ty)?;
    let opcode = arith_opcode(*op, category(&ty)).ok_or_else(|| LoweringError::InvalidOperandType {
        operator: format!("{op:?}"),
        ty: ty.clone(),
    })?;

    d.process_value(left, ctx)?;
    d.process_value(right, ctx)?;
    ctx.emitter().emit(opcode);
    ctx.discard_if_unused(&ty);
    Ok(())
}

/// Compare two values, leaving a boolean.
///
/// `!=` is the equality test followed by `Not`.
pub(super) fn lower_check(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Check { op, left, right } = node else {
        return Err(mismatch(NodeKind::Check, node));
    };

    let operand = operand_type(ctx, left, right)?;
    let opcode = compare_opcode(*op, category(&operand)).ok_or_else(|| {
        LoweringError::InvalidOperandType {
            operator: format!("{op:?}"),
            ty: operand.clone(),
        }
    })?;

    d.process_value(left, ctx)?;
    d.process_value(right, ctx)?;
    ctx.emitter().emit(opcode);
    if *op == CompareOp::Ne {
        ctx.emitter().emit(OpCode::Not);
    }
    ctx.discard_if_unused(&TypeRef::BOOL);
    Ok(())
}

/// `&&`/`||` as a value.
///
/// ```text
/// [condition, jumping to false_path when false]
/// PushTrue
/// Jump end
/// false_path:
/// PushFalse
/// end:
/// ```
pub(super) fn lower_logical(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    if !matches!(node, Node::Logical { .. }) {
        return Err(mismatch(NodeKind::Logical, node));
    }

    let false_path = ctx.emitter().new_label();
    let end = ctx.emitter().new_label();
    jump_if(node, false, false_path, ctx, d)?;

    let emitter = ctx.emitter();
    emitter.emit_bool(true);
    emitter.emit_jump(OpCode::Jump, end);
    emitter.bind_label(false_path);
    emitter.emit_bool(false);
    emitter.bind_label(end);

    ctx.discard_if_unused(&TypeRef::BOOL);
    Ok(())
}

pub(super) fn lower_not(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Not(inner) = node else {
        return Err(mismatch(NodeKind::Not, node));
    };
    d.process_value(inner, ctx)?;
    ctx.emitter().emit(OpCode::Not);
    ctx.discard_if_unused(&TypeRef::BOOL);
    Ok(())
}

pub(super) fn lower_cast(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Cast { target, value } = node else {
        return Err(mismatch(NodeKind::Cast, node));
    };
    let target = ctx.resolve(target)?;
    let source = ctx.resolve(&value.value_type())?;

    d.process_value(value, ctx)?;
    emit_conversion(ctx, &source, &target);
    ctx.discard_if_unused(&target);
    Ok(())
}

pub(super) fn lower_instanceof(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::InstanceOf { ty, value } = node else {
        return Err(mismatch(NodeKind::InstanceOf, node));
    };
    let ty = ctx.resolve(ty)?;
    d.process_value(value, ctx)?;
    ctx.emitter().emit_instanceof(ty.type_hash());
    ctx.discard_if_unused(&TypeRef::BOOL);
    Ok(())
}

/// Type both sides of a comparison are computed in. A `null` literal takes
/// the type of the other side.
fn operand_type(ctx: &LoweringContext<'_>, left: &Node, right: &Node) -> Result<TypeRef> {
    let side = match left {
        Node::Literal(Literal::Null) => right,
        _ => left,
    };
    ctx.resolve(&side.value_type())
}

// ============================================================================
// Conversions
// ============================================================================

/// Convert the value on top of the stack from `from` to `to`.
///
/// Primitive conversions change representation first and then narrow to
/// `byte`, `short` or `char`. Conversions involving a reference (boxing,
/// unboxing, downcasts) are a checked `Cast` to the target type; widening to
/// the root object type needs no code.
pub(super) fn emit_conversion(ctx: &mut LoweringContext<'_>, from: &TypeRef, to: &TypeRef) {
    if from == to || to.is_void() {
        return;
    }

    let emitter = ctx.emitter();
    let (Some(src), Some(dst)) = (from.as_primitive(), to.as_primitive()) else {
        if *to != TypeRef::object_root() {
            emitter.emit_cast(to.type_hash());
        }
        return;
    };
    if src == Primitive::Bool || dst == Primitive::Bool || src == Primitive::Void {
        return;
    }

    let representation = match (category(from), category(to)) {
        (Category::I32, Category::I64) => Some(OpCode::I32toI64),
        (Category::I32, Category::F32) => Some(OpCode::I32toF32),
        (Category::I32, Category::F64) => Some(OpCode::I32toF64),
        (Category::I64, Category::I32) => Some(OpCode::I64toI32),
        (Category::I64, Category::F32) => Some(OpCode::I64toF32),
        (Category::I64, Category::F64) => Some(OpCode::I64toF64),
        (Category::F32, Category::I32) => Some(OpCode::F32toI32),
        (Category::F32, Category::I64) => Some(OpCode::F32toI64),
        (Category::F32, Category::F64) => Some(OpCode::F32toF64),
        (Category::F64, Category::I32) => Some(OpCode::F64toI32),
        (Category::F64, Category::I64) => Some(OpCode::F64toI64),
        (Category::F64, Category::F32) => Some(OpCode::F64toF32),
        _ => None,
    };
    if let Some(op) = representation {
        emitter.emit(op);
    }

    let narrowing = match (src, dst) {
        (Primitive::Byte, Primitive::Short) => None,
        (_, Primitive::Byte) => Some(OpCode::I32toI8),
        (_, Primitive::Short) => Some(OpCode::I32toI16),
        (_, Primitive::Char) => Some(OpCode::I32toU16),
        _ => None,
    };
    if let Some(op) = narrowing {
        emitter.emit(op);
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Jump to `target` when `condition` evaluates to `when`; fall through
/// otherwise. Nothing is left on the stack on either path.
pub(super) fn jump_if(
    condition: &Node,
    when: bool,
    target: Label,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    match condition {
        Node::Logical { op, left, right } => {
            // Jump when the left side alone decides the result in our favor;
            // skip the right side when it decides against us.
            let decides = matches!(op, LogicalOp::Or);
            if decides == when {
                jump_if(left, when, target, ctx, d)?;
                jump_if(right, when, target, ctx, d)
            } else {
                let skip = ctx.emitter().new_label();
                jump_if(left, !when, skip, ctx, d)?;
                jump_if(right, when, target, ctx, d)?;
                ctx.emitter().bind_label(skip);
                Ok(())
            }
        }
        Node::Not(inner) => jump_if(inner, !when, target, ctx, d),
        Node::Literal(Literal::Bool(value)) => {
            if *value == when {
                ctx.emitter().emit_jump(OpCode::Jump, target);
            }
            Ok(())
        }
        _ => {
            d.process_value(condition, ctx)?;
            let op = if when {
                OpCode::JumpIfTrue
            } else {
                OpCode::JumpIfFalse
            };
            ctx.emitter().emit_jump(op, target);
            Ok(())
        }
    }
}
