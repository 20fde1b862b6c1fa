//! Multi-way branches.
//!
//! Int switches are emitted directly as a `TableSwitch` or `LookupSwitch`.
//! Enum, text and object switches are first rewritten into int switches
//! (see [`normalize`]).

mod normalize;
mod strategy;

use stackweave_core::{Case, Literal, LoweringError, Node, NodeKind, SwitchKind, TypeRef};
use tracing::debug;

use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;
use crate::emit::Label;
use crate::flow::{FlowKind, FlowRecord};

use super::{Result, mismatch};

pub use normalize::text_hash;
pub use strategy::{SwitchEncoding, select_switch_encoding};

pub(super) fn lower_switch(node: &Node, ctx: &mut LoweringContext<'_>, d: &Dispatcher) -> Result<()> {
    let Node::Switch {
        label,
        kind,
        subject,
        cases,
    } = node
    else {
        return Err(mismatch(NodeKind::Switch, node));
    };

    match kind {
        SwitchKind::Int => lower_int_switch(node, label, subject, cases, ctx, d),
        SwitchKind::Enum => {
            let lowered = normalize::enum_switch(ctx, label, subject, cases)?;
            d.process(&lowered, ctx)
        }
        SwitchKind::Text | SwitchKind::Object => ctx.with_slot_scope(|ctx| {
            let lowered = normalize::hashed_switch(ctx, *kind, label, subject, cases)?;
            d.process(&lowered, ctx)
        }),
    }
}

/// Lower a switch over an int-like subject.
///
/// Bytecode layout:
/// ```text
/// entry:
/// [subject]
/// TableSwitch/LookupSwitch default, case_1..case_n
/// body_entry:
/// case_1:
/// [body 1]
/// ...
/// case_n:
/// [body n]
/// default:            (redirect target)
/// [default body]
/// exit:               (break target)
/// ```
///
/// Bodies are laid out in ascending key order and fall through into the
/// next one. Keys whose body is a bare redirect dispatch straight to the
/// default label and emit no code.
fn lower_int_switch(
    node: &Node,
    label: &Option<String>,
    subject: &Node,
    cases: &[Case],
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let subject = int_subject(ctx, subject)?;
    let (keyed, default) = collect_cases(node, cases)?;

    let keys: Vec<i32> = keyed.iter().map(|(key, _)| *key).collect();
    let encoding = select_switch_encoding(&keys);
    let dispatched = match encoding {
        SwitchEncoding::Table => {
            let (low, high) = (keys[0], keys[keys.len() - 1]);
            if strategy::table_size(low, high) > i64::from(ctx.options().max_table_entries) {
                return Err(LoweringError::TableCapacityExceeded {
                    low: i64::from(low),
                    high: i64::from(high),
                });
            }
            strategy::fill_gaps(&keyed)
        }
        SwitchEncoding::Lookup => keyed,
    };
    debug!(?encoding, cases = dispatched.len(), "int switch encoding selected");

    let entry = ctx.emitter().new_label();
    let body_entry = ctx.emitter().new_label();
    let default_label = ctx.emitter().new_label();
    let exit = ctx.emitter().new_label();

    ctx.emitter().bind_label(entry);
    ctx.flows_mut().push(FlowRecord {
        kind: FlowKind::Switch,
        label: label.clone(),
        entry,
        body_entry,
        body_exit: default_label,
        exit,
    });

    d.process_value(&subject, ctx)?;

    let targets: Vec<(i32, Label)> = dispatched
        .iter()
        .map(|(key, body)| {
            let target = if body.is_pure_redirect() {
                default_label
            } else {
                ctx.emitter().new_label()
            };
            (*key, target)
        })
        .collect();
    match (encoding, targets.first(), targets.last()) {
        (SwitchEncoding::Table, Some(&(low, _)), Some(&(high, _))) => {
            let labels: Vec<Label> = targets.iter().map(|(_, target)| *target).collect();
            ctx.emitter()
                .emit_table_switch(low, high, default_label, &labels);
        }
        _ => ctx.emitter().emit_lookup_switch(default_label, &targets),
    }

    ctx.emitter().bind_label(body_entry);
    for ((_, body), (_, target)) in dispatched.iter().zip(&targets) {
        if *target == default_label {
            continue;
        }
        ctx.emitter().bind_label(*target);
        ctx.with_scope(|ctx| d.process_statement(body, ctx))?;
    }

    ctx.emitter().bind_label(default_label);
    if let Some(default) = default {
        ctx.with_scope(|ctx| d.process_statement(default, ctx))?;
    }

    ctx.flows_mut().pop();
    ctx.emitter().bind_label(exit);
    Ok(())
}

/// Check that the subject yields a 32-bit key, unboxing wrapper types.
fn int_subject(ctx: &LoweringContext<'_>, subject: &Node) -> Result<Node> {
    let ty = ctx.resolve(&subject.value_type())?;
    if ty.as_primitive().is_some_and(|p| p.is_switchable()) {
        return Ok(subject.clone());
    }
    match ty.unboxed() {
        Some(primitive) if primitive.is_switchable() => {
            Ok(Node::cast(TypeRef::Primitive(primitive), subject.clone()))
        }
        _ => Err(LoweringError::NonNumericSwitchSubject {
            ty,
            node: Box::new(subject.clone()),
        }),
    }
}

/// Split the cases into value cases sorted by key and the default body.
fn collect_cases<'n>(node: &Node, cases: &'n [Case]) -> Result<(Vec<(i32, &'n Node)>, Option<&'n Node>)> {
    let mut keyed = Vec::with_capacity(cases.len());
    let mut default = None;

    for case in cases {
        match &case.value {
            None if default.is_some() => {
                return Err(LoweringError::DuplicateDefaultCase {
                    node: Box::new(node.clone()),
                });
            }
            None => default = Some(&case.body),
            Some(value) => keyed.push((case_key(value)?, value, &case.body)),
        }
    }

    keyed.sort_by_key(|(key, _, _)| *key);
    if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(LoweringError::DuplicateCaseValue {
            key: pair[1].0,
            node: Box::new(pair[1].1.clone()),
        });
    }
    let keyed = keyed.into_iter().map(|(key, _, body)| (key, body)).collect();
    Ok((keyed, default))
}

/// Constant key of a case value.
fn case_key(value: &Node) -> Result<i32> {
    match value {
        Node::Literal(Literal::Int(v)) => Ok(*v),
        Node::Literal(Literal::Short(v)) => Ok(i32::from(*v)),
        Node::Literal(Literal::Byte(v)) => Ok(i32::from(*v)),
        Node::Literal(Literal::Char(v)) => Ok(i32::from(*v)),
        Node::Literal(Literal::Long(v)) => {
            i32::try_from(*v).map_err(|_| LoweringError::TableCapacityExceeded { low: *v, high: *v })
        }
        _ => Err(LoweringError::UnresolvableCaseValue {
            node: Box::new(value.clone()),
        }),
    }
}
