//! Enhanced `for` loops.
//!
//! Both forms are rewritten into a plain [`Node::For`] over hidden
//! variables and handed back to the dispatcher.
//!
//! Indexed (arrays):
//! ```text
//! for ($array = source, $arrayIndex = 0; $arrayIndex < $array.length; $arrayIndex += 1) {
//!     T variable = (T) $array[$arrayIndex];
//!     body
//! }
//! ```
//!
//! Iterator (everything iterable):
//! ```text
//! for ($iterator = source.iterator(); $iterator.hasNext(); ) {
//!     T variable = (T) $iterator.next();
//!     body
//! }
//! ```

use stackweave_core::{
    ArithOp, CompareOp, InvokeKind, Iteration, MethodSpec, Node, NodeKind, TypeRef, well_known,
};

use crate::context::LoweringContext;
use crate::dispatch::Dispatcher;

use super::{Result, mismatch};

pub(super) fn lower_for_each(
    node: &Node,
    ctx: &mut LoweringContext<'_>,
    d: &Dispatcher,
) -> Result<()> {
    let Node::ForEach {
        label,
        variable,
        ty,
        iteration,
        source,
        body,
    } = node
    else {
        return Err(mismatch(NodeKind::ForEach, node));
    };

    ctx.with_slot_scope(|ctx| {
        let ty = ctx.resolve(ty)?;
        let lowered = match iteration {
            Iteration::Indexed => indexed(ctx, label, variable, &ty, source, body)?,
            Iteration::Iterator => iterator(ctx, label, variable, &ty, source, body),
        };
        d.process(&lowered, ctx)
    })
}

fn indexed(
    ctx: &mut LoweringContext<'_>,
    label: &Option<String>,
    variable: &str,
    ty: &TypeRef,
    source: &Node,
    body: &Node,
) -> Result<Node> {
    let array_ty = ctx.resolve(&source.value_type())?;
    let component = array_ty.element().cloned().unwrap_or_else(|| ty.clone());
    let array = ctx.slots_mut().unique_name("$array");
    let index = ctx.slots_mut().unique_name("$arrayIndex");

    let array_var = || Node::var(array.clone(), array_ty.clone());
    let index_var = || Node::var(index.clone(), TypeRef::INT);

    let load = Node::ArrayLoad {
        array: Box::new(array_var()),
        index: Box::new(index_var()),
        ty: component.clone(),
    };
    let element = if component == *ty {
        load
    } else {
        Node::cast(ty.clone(), load)
    };

    Ok(Node::For {
        label: label.clone(),
        init: vec![
            Node::declare(array.clone(), array_ty.clone(), source.clone()),
            Node::declare(index.clone(), TypeRef::INT, Node::int(0)),
        ],
        condition: Some(Box::new(Node::check(
            CompareOp::Lt,
            index_var(),
            Node::ArrayLength(Box::new(array_var())),
        ))),
        update: vec![Node::assign(
            index.clone(),
            TypeRef::INT,
            Node::operate(ArithOp::Add, TypeRef::INT, index_var(), Node::int(1)),
        )],
        body: Box::new(Node::seq(vec![
            Node::declare(variable, ty.clone(), element),
            body.clone(),
        ])),
    })
}

fn iterator(
    ctx: &mut LoweringContext<'_>,
    label: &Option<String>,
    variable: &str,
    ty: &TypeRef,
    source: &Node,
    body: &Node,
) -> Node {
    let iterable = TypeRef::object(well_known::ITERABLE);
    let iterator_ty = TypeRef::object(well_known::ITERATOR);
    let iterator = ctx.slots_mut().unique_name("$iterator");
    let iterator_var = || Node::var(iterator.clone(), iterator_ty.clone());

    let call = |name: &str, ret: TypeRef| {
        Node::invoke(
            InvokeKind::Interface,
            iterator_ty.clone(),
            MethodSpec::new(name, ret, vec![]),
            Some(iterator_var()),
            vec![],
        )
    };

    let next = call("next", TypeRef::object_root());
    let element = if *ty == TypeRef::object_root() {
        next
    } else {
        Node::cast(ty.clone(), next)
    };

    Node::For {
        label: label.clone(),
        init: vec![Node::declare(
            iterator.clone(),
            iterator_ty.clone(),
            Node::invoke(
                InvokeKind::Interface,
                iterable,
                MethodSpec::new("iterator", iterator_ty.clone(), vec![]),
                Some(source.clone()),
                vec![],
            ),
        )],
        condition: Some(Box::new(call("hasNext", TypeRef::BOOL))),
        update: Vec::new(),
        body: Box::new(Node::seq(vec![
            Node::declare(variable, ty.clone(), element),
            body.clone(),
        ])),
    }
}
