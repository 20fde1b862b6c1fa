//! Rewriting of enum and hashed switches into int switches.
//!
//! Enum switches dispatch on `ordinal()`; each constant case becomes its
//! declaration index.
//!
//! Text and object switches dispatch on `hashCode()` of a hidden copy of
//! the subject. Each bucket confirms the match with `equals` and redirects
//! to the default case when no value in the bucket matches:
//!
//! ```text
//! $subject = subject
//! switch ($subject.hashCode()) {
//!     case h1:
//!         if (!$subject.equals(a)) {
//!             if ($subject.equals(b)) { [body b]; redirect }
//!         } else { [body a]; redirect }
//!     default:
//!         [default body]
//! }
//! ```

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use stackweave_core::{
    Case, InvokeKind, Literal, LogicalOp, LoweringError, MethodSpec, Node, SwitchKind, TypeRef,
    well_known,
};

use crate::context::LoweringContext;

use super::super::Result;

/// Hidden variable holding a hashed switch subject.
const SUBJECT_VAR: &str = "$subject";

/// Rewrite an enum switch to dispatch on the constant's ordinal.
pub(super) fn enum_switch(
    ctx: &LoweringContext<'_>,
    label: &Option<String>,
    subject: &Node,
    cases: &[Case],
) -> Result<Node> {
    let ordinal = Node::invoke(
        InvokeKind::Virtual,
        TypeRef::object(well_known::ENUM),
        MethodSpec::new("ordinal", TypeRef::INT, vec![]),
        Some(subject.clone()),
        vec![],
    );

    let cases = cases
        .iter()
        .map(|case| {
            let Some(value) = &case.value else {
                return Ok(case.clone());
            };
            let key = match value {
                Node::EnumConstant { ty, name } => {
                    let ty = ctx.resolve(ty)?;
                    ctx.nest()
                        .enum_ordinal(&ty, name)
                        .and_then(|ordinal| i32::try_from(ordinal).ok())
                }
                _ => None,
            };
            let key = key.ok_or_else(|| LoweringError::UnresolvableCaseValue {
                node: Box::new(value.clone()),
            })?;
            Ok(Case::new(Node::int(key), case.body.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Node::Switch {
        label: label.clone(),
        kind: SwitchKind::Int,
        subject: Box::new(ordinal),
        cases,
    })
}

/// Case values sharing one body, in source order.
struct Group<'n> {
    values: Vec<&'n Node>,
    body: Node,
}

/// Rewrite a text or object switch to dispatch on `hashCode()`.
///
/// Must run inside a slot scope; it reserves a hidden subject variable.
pub(super) fn hashed_switch(
    ctx: &mut LoweringContext<'_>,
    kind: SwitchKind,
    label: &Option<String>,
    subject: &Node,
    cases: &[Case],
) -> Result<Node> {
    let subject_ty = ctx.resolve(&subject.value_type())?;
    let owner = match kind {
        SwitchKind::Text => TypeRef::string(),
        _ => TypeRef::object_root(),
    };
    let name = ctx.slots_mut().unique_name(SUBJECT_VAR);
    let subject_var = || Node::var(name.clone(), subject_ty.clone());

    let (groups, defaults) = group_cases(cases);

    // Buckets in ascending hash order; entries keep source order.
    let mut buckets: BTreeMap<i32, Vec<(Vec<Node>, Node)>> = BTreeMap::new();
    let mut seen: FxHashSet<&Literal> = FxHashSet::default();
    for group in groups {
        let mut by_hash: Vec<(i32, Vec<Node>)> = Vec::new();
        for value in group.values {
            let hash = match value {
                Node::Literal(literal) => case_hash(literal),
                _ => None,
            }
            .ok_or_else(|| LoweringError::UnresolvableCaseValue {
                node: Box::new(value.clone()),
            })?;
            if let Node::Literal(literal) = value
                && !seen.insert(literal)
            {
                return Err(LoweringError::DuplicateCaseValue {
                    key: hash,
                    node: Box::new(value.clone()),
                });
            }
            let argument = boxed_argument(value);
            match by_hash.iter_mut().find(|(h, _)| *h == hash) {
                Some((_, values)) => values.push(argument),
                None => by_hash.push((hash, vec![argument])),
            }
        }
        // A group split over several buckets gets a copy of its body in each.
        for (hash, values) in by_hash {
            buckets
                .entry(hash)
                .or_default()
                .push((values, group.body.clone()));
        }
    }

    let guard = |value: Node| {
        Node::invoke(
            InvokeKind::Virtual,
            owner.clone(),
            MethodSpec::new("equals", TypeRef::BOOL, vec![TypeRef::object_root()]),
            Some(subject_var()),
            vec![value],
        )
    };

    let mut lowered: Vec<Case> = buckets
        .into_iter()
        .map(|(hash, entries)| Case::new(Node::int(hash), bucket_chain(entries, &guard)))
        .collect();
    lowered.extend(defaults.into_iter().map(Case::otherwise));

    let hash_code = Node::invoke(
        InvokeKind::Virtual,
        owner.clone(),
        MethodSpec::new("hashCode", TypeRef::INT, vec![]),
        Some(subject_var()),
        vec![],
    );

    Ok(Node::seq(vec![
        Node::declare(name.clone(), subject_ty.clone(), subject.clone()),
        Node::Switch {
            label: label.clone(),
            kind: SwitchKind::Int,
            subject: Box::new(hash_code),
            cases: lowered,
        },
    ]))
}

/// Collect value cases into groups ending at the first non-empty body.
///
/// Values falling through into the default case are dropped, since the
/// default is reached for them anyway. A trailing group with no body
/// breaks out of the switch.
fn group_cases(cases: &[Case]) -> (Vec<Group<'_>>, Vec<Node>) {
    let mut groups = Vec::new();
    let mut defaults = Vec::new();
    let mut pending: Vec<&Node> = Vec::new();

    for case in cases {
        match &case.value {
            None => {
                pending.clear();
                defaults.push(case.body.clone());
            }
            Some(value) => {
                pending.push(value);
                if !case.body.is_empty() {
                    groups.push(Group {
                        values: std::mem::take(&mut pending),
                        body: case.body.clone(),
                    });
                }
            }
        }
    }
    if !pending.is_empty() {
        groups.push(Group {
            values: pending,
            body: Node::Break(None),
        });
    }
    (groups, defaults)
}

/// Chain the entries of one bucket so the first matching entry runs and a
/// miss continues at the default case.
fn bucket_chain(entries: Vec<(Vec<Node>, Node)>, guard: &impl Fn(Node) -> Node) -> Node {
    let any_equal = |values: Vec<Node>| {
        values
            .into_iter()
            .map(guard)
            .reduce(|left, right| Node::logical(LogicalOp::Or, left, right))
            .unwrap_or_else(|| Node::boolean(false))
    };
    let redirecting = |body: Node| Node::seq(vec![body, Node::RedirectToEnclosingDefault]);

    let mut entries = entries.into_iter().rev();
    let Some((values, body)) = entries.next() else {
        return Node::RedirectToEnclosingDefault;
    };
    let mut chain = Node::if_then(any_equal(values), redirecting(body), None);
    for (values, body) in entries {
        chain = Node::if_then(
            Node::Not(Box::new(any_equal(values))),
            chain,
            Some(redirecting(body)),
        );
    }
    chain
}

/// Primitive case values are boxed before being passed to `equals`.
fn boxed_argument(value: &Node) -> Node {
    match value.value_type().as_primitive().and_then(|p| p.boxed()) {
        Some(boxed) => Node::cast(boxed, value.clone()),
        None => value.clone(),
    }
}

/// Compile-time `hashCode()` of a literal case value.
pub(super) fn case_hash(literal: &Literal) -> Option<i32> {
    Some(match literal {
        Literal::Text(text) => text_hash(text),
        Literal::Int(v) => *v,
        Literal::Short(v) => i32::from(*v),
        Literal::Byte(v) => i32::from(*v),
        Literal::Char(v) => i32::from(*v),
        Literal::Long(v) => (*v ^ ((*v as u64) >> 32) as i64) as i32,
        Literal::Bool(v) => {
            if *v {
                1231
            } else {
                1237
            }
        }
        Literal::Float(v) => v.0.to_bits() as i32,
        Literal::Double(v) => {
            let bits = v.0.to_bits();
            (bits ^ (bits >> 32)) as i32
        }
        Literal::Null | Literal::Class(_) => return None,
    })
}

/// Hash of a text value: `s[0]*31^(n-1) + ... + s[n-1]` over its UTF-16
/// code units, with wrapping 32-bit arithmetic.
pub fn text_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_hashes() {
        assert_eq!(text_hash(""), 0);
        assert_eq!(text_hash("a"), 97);
        assert_eq!(text_hash("hello"), 99_162_322);
        // Classic collision pair.
        assert_eq!(text_hash("Aa"), text_hash("BB"));
        // Non-BMP text hashes its surrogate pair.
        assert_eq!(text_hash("\u{1F600}"), 0xD83D * 31 + 0xDE00);
    }

    #[test]
    fn literal_hashes() {
        assert_eq!(case_hash(&Literal::Int(-5)), Some(-5));
        assert_eq!(case_hash(&Literal::Char(65)), Some(65));
        assert_eq!(case_hash(&Literal::Bool(true)), Some(1231));
        assert_eq!(case_hash(&Literal::Bool(false)), Some(1237));
        assert_eq!(case_hash(&Literal::Long(1 << 32)), Some(1));
        assert_eq!(case_hash(&Literal::Long(-1)), Some(0));
        assert_eq!(
            case_hash(&Literal::Float(1.0.into())),
            Some(0x3f80_0000)
        );
        assert_eq!(
            case_hash(&Literal::Double(1.0.into())),
            Some(0x3ff0_0000)
        );
        assert_eq!(case_hash(&Literal::Null), None);
    }

    #[test]
    fn empty_cases_join_the_next_group() {
        let cases = vec![
            Case::new(Node::text("a"), Node::Nothing),
            Case::new(Node::text("b"), Node::int(1)),
            Case::new(Node::text("c"), Node::Nothing),
            Case::otherwise(Node::int(2)),
            Case::new(Node::text("d"), Node::Nothing),
        ];
        let (groups, defaults) = group_cases(&cases);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].values, vec![&Node::text("a"), &Node::text("b")]);
        assert_eq!(groups[0].body, Node::int(1));
        // "c" falls into the default and is dropped; "d" breaks.
        assert_eq!(groups[1].values, vec![&Node::text("d")]);
        assert_eq!(groups[1].body, Node::Break(None));
        assert_eq!(defaults, vec![Node::int(2)]);
    }

    #[test]
    fn single_entry_bucket_is_a_guarded_body() {
        let guard = |value: Node| Node::Not(Box::new(value));
        let chain = bucket_chain(vec![(vec![Node::text("a")], Node::int(1))], &guard);
        assert_eq!(
            chain,
            Node::if_then(
                Node::Not(Box::new(Node::text("a"))),
                Node::seq(vec![Node::int(1), Node::RedirectToEnclosingDefault]),
                None,
            )
        );
        assert!(matches!(chain, Node::If { ref body, .. } if body.ends_with_redirect()));
    }

    #[test]
    fn primitive_values_are_boxed() {
        assert_eq!(
            boxed_argument(&Node::int(3)),
            Node::cast(TypeRef::object(well_known::INTEGER), Node::int(3))
        );
        assert_eq!(boxed_argument(&Node::text("x")), Node::text("x"));
    }
}
