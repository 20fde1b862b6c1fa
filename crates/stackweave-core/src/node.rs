//! The instruction tree.
//!
//! A [`Node`] is immutable value data. Lowering never mutates a node in
//! place: desugaring passes build replacement nodes and hand them back to the
//! dispatcher.
//!
//! ## Statement vs. expression nodes
//!
//! Value-producing nodes report their type through [`Node::value_type`];
//! statement nodes report `void`. Whether a produced value is consumed is not
//! a property of the node but of the position it is lowered in.

use ordered_float::OrderedFloat;

use crate::decl::MethodDecl;
use crate::types::{MethodSpec, TypeRef, well_known};

// ============================================================================
// Literals and operators
// ============================================================================

/// Compile-time constant values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Bool(bool),
    Byte(i8),
    /// A UTF-16 code unit.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Text(String),
    /// A class object constant.
    Class(TypeRef),
}

impl Literal {
    pub fn value_type(&self) -> TypeRef {
        match self {
            Literal::Null => TypeRef::object_root(),
            Literal::Bool(_) => TypeRef::BOOL,
            Literal::Byte(_) => TypeRef::BYTE,
            Literal::Char(_) => TypeRef::CHAR,
            Literal::Short(_) => TypeRef::SHORT,
            Literal::Int(_) => TypeRef::INT,
            Literal::Long(_) => TypeRef::LONG,
            Literal::Float(_) => TypeRef::FLOAT,
            Literal::Double(_) => TypeRef::DOUBLE,
            Literal::Text(_) => TypeRef::string(),
            Literal::Class(_) => TypeRef::object(well_known::CLASS),
        }
    }
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl ArithOp {
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            ArithOp::Add | ArithOp::Mul | ArithOp::And | ArithOp::Or | ArithOp::Xor
        )
    }
}

/// Comparison operators producing a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

/// How an invocation is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    /// Dispatch through a class vtable.
    Virtual,
    /// Dispatch through an interface table.
    Interface,
    /// Non-virtual call on a receiver: constructors, private and super methods.
    Special,
}

/// Source protocol of an iteration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Iteration {
    /// An array with a length and indexed element access.
    Indexed,
    /// A source exposing `iterator()`, with `hasNext()`/`next()`.
    Iterator,
}

/// Subject category of a multi-way branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    /// Subject is already an integer dispatch key.
    Int,
    Enum,
    Text,
    /// Any other object dispatched through `hashCode`/`equals`.
    Object,
}

/// A switch case. `value == None` marks the default case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Case {
    pub value: Option<Node>,
    pub body: Node,
}

impl Case {
    pub fn new(value: Node, body: Node) -> Self {
        Self {
            value: Some(value),
            body,
        }
    }

    pub fn otherwise(body: Node) -> Self {
        Self { value: None, body }
    }

    pub fn is_default(&self) -> bool {
        self.value.is_none()
    }
}

/// A typed catch clause binding the caught exception to `variable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Catch {
    pub ty: TypeRef,
    pub variable: String,
    pub body: Node,
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Literal(Literal),
    /// The receiver of the routine being lowered.
    This,
    /// Duplicate the value on top of the stack.
    Dup(TypeRef),
    /// Emits nothing.
    Nothing,
    /// An unscoped sequence of nodes.
    Instructions(Vec<Node>),

    VariableAccess {
        name: String,
        ty: TypeRef,
    },
    VariableDeclaration {
        name: String,
        ty: TypeRef,
        value: Option<Box<Node>>,
    },
    /// Assignment to an already declared variable.
    VariableDefinition {
        name: String,
        ty: TypeRef,
        value: Box<Node>,
    },
    /// Field read. `receiver == None` reads a static field.
    FieldAccess {
        owner: TypeRef,
        name: String,
        ty: TypeRef,
        receiver: Option<Box<Node>>,
    },
    FieldDefinition {
        owner: TypeRef,
        name: String,
        ty: TypeRef,
        receiver: Option<Box<Node>>,
        value: Box<Node>,
    },
    Invocation {
        kind: InvokeKind,
        owner: TypeRef,
        method: MethodSpec,
        receiver: Option<Box<Node>>,
        args: Vec<Node>,
    },
    /// Object creation through the constructor taking `params`.
    New {
        ty: TypeRef,
        params: Vec<TypeRef>,
        args: Vec<Node>,
    },
    EnumConstant {
        ty: TypeRef,
        name: String,
    },

    Operate {
        op: ArithOp,
        ty: TypeRef,
        left: Box<Node>,
        right: Box<Node>,
    },
    Check {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Not(Box<Node>),
    Cast {
        target: TypeRef,
        value: Box<Node>,
    },
    InstanceOf {
        ty: TypeRef,
        value: Box<Node>,
    },

    ArrayLength(Box<Node>),
    /// Element read; `ty` is the type the element is consumed as.
    ArrayLoad {
        array: Box<Node>,
        index: Box<Node>,
        ty: TypeRef,
    },
    ArrayStore {
        array: Box<Node>,
        index: Box<Node>,
        value: Box<Node>,
    },
    NewArray {
        element: TypeRef,
        length: Box<Node>,
    },

    If {
        condition: Box<Node>,
        body: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    For {
        label: Option<String>,
        init: Vec<Node>,
        condition: Option<Box<Node>>,
        update: Vec<Node>,
        body: Box<Node>,
    },
    While {
        label: Option<String>,
        condition: Box<Node>,
        body: Box<Node>,
        do_while: bool,
    },
    ForEach {
        label: Option<String>,
        variable: String,
        ty: TypeRef,
        iteration: Iteration,
        source: Box<Node>,
        body: Box<Node>,
    },
    Switch {
        label: Option<String>,
        kind: SwitchKind,
        subject: Box<Node>,
        cases: Vec<Case>,
    },
    Synchronized {
        lock: Box<Node>,
        body: Box<Node>,
    },
    Try {
        body: Box<Node>,
        catches: Vec<Catch>,
        finally: Option<Box<Node>>,
    },
    Throw(Box<Node>),
    Return(Option<Box<Node>>),
    Break(Option<String>),
    Continue(Option<String>),
    MonitorEnter(Box<Node>),
    MonitorExit(Box<Node>),
    /// Inside a switch case: continue at the enclosing switch's default.
    RedirectToEnclosingDefault,
    /// A routine declared inside a body. It becomes a separate routine of
    /// the enclosing type and emits nothing in place.
    LocalRoutine {
        decl: Box<MethodDecl>,
    },
}

/// Fieldless tag of a [`Node`], used to key handler registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Literal,
    This,
    Dup,
    Nothing,
    Instructions,
    VariableAccess,
    VariableDeclaration,
    VariableDefinition,
    FieldAccess,
    FieldDefinition,
    Invocation,
    New,
    EnumConstant,
    Operate,
    Check,
    Logical,
    Not,
    Cast,
    InstanceOf,
    ArrayLength,
    ArrayLoad,
    ArrayStore,
    NewArray,
    If,
    For,
    While,
    ForEach,
    Switch,
    Synchronized,
    Try,
    Throw,
    Return,
    Break,
    Continue,
    MonitorEnter,
    MonitorExit,
    RedirectToEnclosingDefault,
    LocalRoutine,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Literal(_) => NodeKind::Literal,
            Node::This => NodeKind::This,
            Node::Dup(_) => NodeKind::Dup,
            Node::Nothing => NodeKind::Nothing,
            Node::Instructions(_) => NodeKind::Instructions,
            Node::VariableAccess { .. } => NodeKind::VariableAccess,
            Node::VariableDeclaration { .. } => NodeKind::VariableDeclaration,
            Node::VariableDefinition { .. } => NodeKind::VariableDefinition,
            Node::FieldAccess { .. } => NodeKind::FieldAccess,
            Node::FieldDefinition { .. } => NodeKind::FieldDefinition,
            Node::Invocation { .. } => NodeKind::Invocation,
            Node::New { .. } => NodeKind::New,
            Node::EnumConstant { .. } => NodeKind::EnumConstant,
            Node::Operate { .. } => NodeKind::Operate,
            Node::Check { .. } => NodeKind::Check,
            Node::Logical { .. } => NodeKind::Logical,
            Node::Not(_) => NodeKind::Not,
            Node::Cast { .. } => NodeKind::Cast,
            Node::InstanceOf { .. } => NodeKind::InstanceOf,
            Node::ArrayLength(_) => NodeKind::ArrayLength,
            Node::ArrayLoad { .. } => NodeKind::ArrayLoad,
            Node::ArrayStore { .. } => NodeKind::ArrayStore,
            Node::NewArray { .. } => NodeKind::NewArray,
            Node::If { .. } => NodeKind::If,
            Node::For { .. } => NodeKind::For,
            Node::While { .. } => NodeKind::While,
            Node::ForEach { .. } => NodeKind::ForEach,
            Node::Switch { .. } => NodeKind::Switch,
            Node::Synchronized { .. } => NodeKind::Synchronized,
            Node::Try { .. } => NodeKind::Try,
            Node::Throw(_) => NodeKind::Throw,
            Node::Return(_) => NodeKind::Return,
            Node::Break(_) => NodeKind::Break,
            Node::Continue(_) => NodeKind::Continue,
            Node::MonitorEnter(_) => NodeKind::MonitorEnter,
            Node::MonitorExit(_) => NodeKind::MonitorExit,
            Node::RedirectToEnclosingDefault => NodeKind::RedirectToEnclosingDefault,
            Node::LocalRoutine { .. } => NodeKind::LocalRoutine,
        }
    }

    /// Type of the value this node leaves on the stack; `void` for statements.
    pub fn value_type(&self) -> TypeRef {
        match self {
            Node::Literal(lit) => lit.value_type(),
            Node::This => TypeRef::THIS,
            Node::Dup(ty)
            | Node::VariableAccess { ty, .. }
            | Node::FieldAccess { ty, .. }
            | Node::New { ty, .. }
            | Node::EnumConstant { ty, .. }
            | Node::Operate { ty, .. }
            | Node::ArrayLoad { ty, .. } => ty.clone(),
            Node::Invocation { method, .. } => method.return_type.clone(),
            Node::Check { .. } | Node::Logical { .. } | Node::Not(_) | Node::InstanceOf { .. } => {
                TypeRef::BOOL
            }
            Node::Cast { target, .. } => target.clone(),
            Node::ArrayLength(_) => TypeRef::INT,
            Node::NewArray { element, .. } => TypeRef::array(element.clone()),
            _ => TypeRef::VOID,
        }
    }

    /// Direct subnodes in evaluation order. Case values and bodies are
    /// listed case by case.
    pub fn children(&self) -> Vec<&Node> {
        fn push_opt<'n>(out: &mut Vec<&'n Node>, node: &'n Option<Box<Node>>) {
            if let Some(node) = node {
                out.push(node);
            }
        }

        let mut out: Vec<&Node> = Vec::new();
        match self {
            Node::Literal(_)
            | Node::This
            | Node::Dup(_)
            | Node::Nothing
            | Node::VariableAccess { .. }
            | Node::EnumConstant { .. }
            | Node::Break(_)
            | Node::Continue(_)
            | Node::RedirectToEnclosingDefault
            | Node::LocalRoutine { .. } => {}
            Node::Instructions(nodes) => out.extend(nodes),
            Node::VariableDeclaration { value, .. } | Node::FieldAccess { receiver: value, .. } => {
                push_opt(&mut out, value)
            }
            Node::Return(value) => push_opt(&mut out, value),
            Node::VariableDefinition { value, .. }
            | Node::Not(value)
            | Node::Cast { value, .. }
            | Node::InstanceOf { value, .. }
            | Node::ArrayLength(value)
            | Node::NewArray { length: value, .. }
            | Node::Throw(value)
            | Node::MonitorEnter(value)
            | Node::MonitorExit(value) => out.push(value),
            Node::FieldDefinition {
                receiver, value, ..
            } => {
                push_opt(&mut out, receiver);
                out.push(value);
            }
            Node::Invocation { receiver, args, .. } => {
                push_opt(&mut out, receiver);
                out.extend(args);
            }
            Node::New { args, .. } => out.extend(args),
            Node::Operate { left, right, .. }
            | Node::Check { left, right, .. }
            | Node::Logical { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Node::ArrayLoad { array, index, .. } => {
                out.push(array);
                out.push(index);
            }
            Node::ArrayStore {
                array,
                index,
                value,
            } => {
                out.push(array);
                out.push(index);
                out.push(value);
            }
            Node::If {
                condition,
                body,
                otherwise,
            } => {
                out.push(condition);
                out.push(body);
                push_opt(&mut out, otherwise);
            }
            Node::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                out.extend(init);
                push_opt(&mut out, condition);
                out.push(body);
                out.extend(update);
            }
            Node::While {
                condition, body, ..
            } => {
                out.push(condition);
                out.push(body);
            }
            Node::ForEach { source, body, .. } => {
                out.push(source);
                out.push(body);
            }
            Node::Switch { subject, cases, .. } => {
                out.push(subject);
                for case in cases {
                    if let Some(value) = &case.value {
                        out.push(value);
                    }
                    out.push(&case.body);
                }
            }
            Node::Synchronized { lock, body } => {
                out.push(lock);
                out.push(body);
            }
            Node::Try {
                body,
                catches,
                finally,
            } => {
                out.push(body);
                out.extend(catches.iter().map(|catch| &catch.body));
                push_opt(&mut out, finally);
            }
        }
        out
    }

    /// Every variable name declared, assigned or read anywhere in the tree,
    /// including for-each and catch variables.
    pub fn variable_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::VariableAccess { name, .. }
                | Node::VariableDeclaration { name, .. }
                | Node::VariableDefinition { name, .. }
                | Node::ForEach { variable: name, .. } => names.push(name.as_str()),
                Node::Try { catches, .. } => {
                    names.extend(catches.iter().map(|catch| catch.variable.as_str()))
                }
                _ => {}
            }
            stack.extend(node.children().into_iter().rev());
        }
        names
    }

    /// True when the node is, or ends in, a redirect to the switch default.
    pub fn ends_with_redirect(&self) -> bool {
        match self {
            Node::RedirectToEnclosingDefault => true,
            Node::Instructions(nodes) => nodes.last().is_some_and(Node::ends_with_redirect),
            _ => false,
        }
    }

    /// True when the node does nothing but redirect to the switch default.
    pub fn is_pure_redirect(&self) -> bool {
        match self {
            Node::RedirectToEnclosingDefault => true,
            Node::Instructions(nodes) => {
                !nodes.is_empty() && nodes.iter().all(Node::is_pure_redirect)
            }
            _ => false,
        }
    }

    /// True when the node emits no code at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Nothing => true,
            Node::Instructions(nodes) => nodes.iter().all(Node::is_empty),
            _ => false,
        }
    }

    // ==========================================================================
    // Builders
    // ==========================================================================

    pub fn int(value: i32) -> Self {
        Node::Literal(Literal::Int(value))
    }

    pub fn long(value: i64) -> Self {
        Node::Literal(Literal::Long(value))
    }

    pub fn boolean(value: bool) -> Self {
        Node::Literal(Literal::Bool(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Node::Literal(Literal::Text(value.into()))
    }

    pub fn null() -> Self {
        Node::Literal(Literal::Null)
    }

    pub fn seq(nodes: Vec<Node>) -> Self {
        Node::Instructions(nodes)
    }

    pub fn var(name: impl Into<String>, ty: TypeRef) -> Self {
        Node::VariableAccess {
            name: name.into(),
            ty,
        }
    }

    pub fn declare(name: impl Into<String>, ty: TypeRef, value: Node) -> Self {
        Node::VariableDeclaration {
            name: name.into(),
            ty,
            value: Some(Box::new(value)),
        }
    }

    pub fn assign(name: impl Into<String>, ty: TypeRef, value: Node) -> Self {
        Node::VariableDefinition {
            name: name.into(),
            ty,
            value: Box::new(value),
        }
    }

    pub fn operate(op: ArithOp, ty: TypeRef, left: Node, right: Node) -> Self {
        Node::Operate {
            op,
            ty,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn check(op: CompareOp, left: Node, right: Node) -> Self {
        Node::Check {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: LogicalOp, left: Node, right: Node) -> Self {
        Node::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cast(target: TypeRef, value: Node) -> Self {
        Node::Cast {
            target,
            value: Box::new(value),
        }
    }

    pub fn invoke(
        kind: InvokeKind,
        owner: TypeRef,
        method: MethodSpec,
        receiver: Option<Node>,
        args: Vec<Node>,
    ) -> Self {
        Node::Invocation {
            kind,
            owner,
            method,
            receiver: receiver.map(Box::new),
            args,
        }
    }

    pub fn if_then(condition: Node, body: Node, otherwise: Option<Node>) -> Self {
        Node::If {
            condition: Box::new(condition),
            body: Box::new(body),
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn ret(value: Option<Node>) -> Self {
        Node::Return(value.map(Box::new))
    }

    pub fn local_routine(decl: MethodDecl) -> Self {
        Node::LocalRoutine {
            decl: Box::new(decl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_tags() {
        assert_eq!(Node::int(1).kind(), NodeKind::Literal);
        assert_eq!(Node::var("x", TypeRef::INT).kind(), NodeKind::VariableAccess);
        assert_eq!(
            Node::RedirectToEnclosingDefault.kind(),
            NodeKind::RedirectToEnclosingDefault
        );
    }

    #[test]
    fn value_types() {
        assert_eq!(Node::int(1).value_type(), TypeRef::INT);
        assert_eq!(Node::long(1).value_type(), TypeRef::LONG);
        assert_eq!(
            Node::check(CompareOp::Lt, Node::int(1), Node::int(2)).value_type(),
            TypeRef::BOOL
        );
        assert_eq!(Node::declare("x", TypeRef::INT, Node::int(1)).value_type(), TypeRef::VOID);
        assert_eq!(Node::This.value_type(), TypeRef::THIS);
    }

    #[test]
    fn redirect_detection() {
        let guarded = Node::seq(vec![Node::Break(None), Node::RedirectToEnclosingDefault]);
        assert!(guarded.ends_with_redirect());
        assert!(!guarded.is_pure_redirect());
        assert!(Node::seq(vec![Node::RedirectToEnclosingDefault]).is_pure_redirect());
        assert!(!Node::seq(vec![]).is_pure_redirect());
        assert!(!Node::Break(None).ends_with_redirect());
    }

    #[test]
    fn local_routine_locals_stay_in_their_own_frame() {
        use crate::decl::{MethodDecl, Modifiers};

        let inner = MethodDecl::new("helper", Modifiers::PRIVATE, TypeRef::VOID, Vec::new())
            .with_body(Node::declare("hidden", TypeRef::INT, Node::int(1)));
        let body = Node::seq(vec![
            Node::declare("outer", TypeRef::INT, Node::int(0)),
            Node::local_routine(inner),
        ]);
        assert_eq!(body.variable_names(), vec!["outer"]);
        assert_eq!(body.children().len(), 2);
        assert_eq!(body.children()[1].kind(), NodeKind::LocalRoutine);
        assert_eq!(body.children()[1].value_type(), TypeRef::VOID);
    }

    #[test]
    fn children_follow_evaluation_order() {
        let node = Node::ArrayStore {
            array: Box::new(Node::var("a", TypeRef::array(TypeRef::INT))),
            index: Box::new(Node::int(0)),
            value: Box::new(Node::int(1)),
        };
        assert_eq!(node.children().len(), 3);
        assert_eq!(node.children()[1], &Node::int(0));
        assert!(Node::Break(None).children().is_empty());
    }

    #[test]
    fn variable_names_reach_nested_scopes() {
        let node = Node::seq(vec![
            Node::declare("x", TypeRef::INT, Node::int(1)),
            Node::Try {
                body: Box::new(Node::assign("y", TypeRef::INT, Node::var("x", TypeRef::INT))),
                catches: vec![Catch {
                    ty: TypeRef::object(well_known::THROWABLE),
                    variable: "e".into(),
                    body: Node::Nothing,
                }],
                finally: None,
            },
        ]);
        assert_eq!(node.variable_names(), vec!["x", "e", "y", "x"]);
    }

    #[test]
    fn empty_nodes() {
        assert!(Node::Nothing.is_empty());
        assert!(Node::seq(vec![Node::Nothing, Node::seq(vec![])]).is_empty());
        assert!(!Node::seq(vec![Node::Break(None)]).is_empty());
    }

    #[test]
    fn commutative_operators() {
        assert!(ArithOp::Add.is_commutative());
        assert!(ArithOp::Xor.is_commutative());
        assert!(!ArithOp::Sub.is_commutative());
        assert!(!ArithOp::Shl.is_commutative());
    }
}
