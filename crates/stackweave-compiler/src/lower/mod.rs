//! Default node handlers.
//!
//! One module per construct family. Each handler lowers exactly one node
//! kind; desugaring handlers build a replacement tree and hand it back to
//! the dispatcher instead of emitting code themselves.
//!
//! | Module          | Node kinds                                              |
//! |-----------------|---------------------------------------------------------|
//! | `literal`       | Literal, This, Dup, Nothing, Instructions               |
//! | `variable`      | VariableAccess, VariableDeclaration, VariableDefinition |
//! | `field`         | FieldAccess, FieldDefinition, EnumConstant              |
//! | `invoke`        | Invocation, New                                         |
//! | `operate`       | Operate, Check, Logical, Not, Cast, InstanceOf          |
//! | `array`         | ArrayLength, ArrayLoad, ArrayStore, NewArray            |
//! | `branch`        | If                                                      |
//! | `loops`         | For, While                                              |
//! | `iteration`     | ForEach                                                 |
//! | `switch`        | Switch                                                  |
//! | `synchronized`  | Synchronized, MonitorEnter, MonitorExit                 |
//! | `exceptions`    | Try                                                     |
//! | `transfer`      | Return, Break, Continue, Throw, RedirectToEnclosingDefault |
//! | `local`         | LocalRoutine                                            |

mod array;
mod branch;
mod exceptions;
mod field;
mod invoke;
mod iteration;
mod literal;
mod local;
mod loops;
mod operate;
mod switch;
mod synchronized;
mod transfer;
mod variable;

use stackweave_core::{LoweringError, Node, NodeKind};

use crate::dispatch::Dispatcher;

pub use switch::{SwitchEncoding, select_switch_encoding, text_hash};

type Result<T> = std::result::Result<T, LoweringError>;

/// Install the built-in handler for every node kind.
pub fn register_defaults(dispatcher: &mut Dispatcher) {
    dispatcher.register(NodeKind::Literal, literal::lower_literal);
    dispatcher.register(NodeKind::This, literal::lower_this);
    dispatcher.register(NodeKind::Dup, literal::lower_dup);
    dispatcher.register(NodeKind::Nothing, literal::lower_nothing);
    dispatcher.register(NodeKind::Instructions, literal::lower_instructions);

    dispatcher.register(NodeKind::VariableAccess, variable::lower_access);
    dispatcher.register(NodeKind::VariableDeclaration, variable::lower_declaration);
    dispatcher.register(NodeKind::VariableDefinition, variable::lower_definition);

    dispatcher.register(NodeKind::FieldAccess, field::lower_access);
    dispatcher.register(NodeKind::FieldDefinition, field::lower_definition);
    dispatcher.register(NodeKind::EnumConstant, field::lower_enum_constant);

    dispatcher.register(NodeKind::Invocation, invoke::lower_invocation);
    dispatcher.register(NodeKind::New, invoke::lower_new);

    dispatcher.register(NodeKind::Operate, operate::lower_operate);
    dispatcher.register(NodeKind::Check, operate::lower_check);
    dispatcher.register(NodeKind::Logical, operate::lower_logical);
    dispatcher.register(NodeKind::Not, operate::lower_not);
    dispatcher.register(NodeKind::Cast, operate::lower_cast);
    dispatcher.register(NodeKind::InstanceOf, operate::lower_instanceof);

    dispatcher.register(NodeKind::ArrayLength, array::lower_length);
    dispatcher.register(NodeKind::ArrayLoad, array::lower_load);
    dispatcher.register(NodeKind::ArrayStore, array::lower_store);
    dispatcher.register(NodeKind::NewArray, array::lower_new_array);

    dispatcher.register(NodeKind::If, branch::lower_if);
    dispatcher.register(NodeKind::For, loops::lower_for);
    dispatcher.register(NodeKind::While, loops::lower_while);
    dispatcher.register(NodeKind::ForEach, iteration::lower_for_each);
    dispatcher.register(NodeKind::Switch, switch::lower_switch);

    dispatcher.register(NodeKind::Synchronized, synchronized::lower_synchronized);
    dispatcher.register(NodeKind::MonitorEnter, synchronized::lower_monitor_enter);
    dispatcher.register(NodeKind::MonitorExit, synchronized::lower_monitor_exit);
    dispatcher.register(NodeKind::Try, exceptions::lower_try);

    dispatcher.register(NodeKind::Return, transfer::lower_return);
    dispatcher.register(NodeKind::Break, transfer::lower_break);
    dispatcher.register(NodeKind::Continue, transfer::lower_continue);
    dispatcher.register(NodeKind::Throw, transfer::lower_throw);
    dispatcher.register(
        NodeKind::RedirectToEnclosingDefault,
        transfer::lower_redirect,
    );

    dispatcher.register(NodeKind::LocalRoutine, local::lower_local_routine);
}

/// Error for a handler invoked with a node of another kind.
fn mismatch(expected: NodeKind, node: &Node) -> LoweringError {
    LoweringError::MismatchedNode {
        expected,
        found: node.kind(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Lowering a single routine body without going through a nest.

    use stackweave_core::{LoweringError, Node, TypeRef};
    use stackweave_registry::TypeNest;

    use crate::bridge::BridgeRegistry;
    use crate::bytecode::ConstantPool;
    use crate::context::{LoweringContext, RoutineInfo, RoutineOutput};
    use crate::dispatch::Dispatcher;
    use crate::options::LoweringOptions;

    pub struct Harness {
        pub nest: TypeNest,
        pub options: LoweringOptions,
        pub owner: TypeRef,
        pub return_type: TypeRef,
        pub is_static: bool,
        pub params: Vec<(String, TypeRef)>,
        pub bridges: BridgeRegistry,
        pub constants: ConstantPool,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                nest: TypeNest::new(),
                options: LoweringOptions::default(),
                owner: TypeRef::object("demo.Main"),
                return_type: TypeRef::VOID,
                is_static: true,
                params: Vec::new(),
                bridges: BridgeRegistry::new(),
                constants: ConstantPool::new(),
            }
        }

        pub fn with_nest(mut self, nest: TypeNest) -> Self {
            self.nest = nest;
            self
        }

        pub fn with_options(mut self, options: LoweringOptions) -> Self {
            self.options = options;
            self
        }

        pub fn with_owner(mut self, owner: TypeRef, is_static: bool) -> Self {
            self.owner = owner;
            self.is_static = is_static;
            self
        }

        pub fn returning(mut self, ty: TypeRef) -> Self {
            self.return_type = ty;
            self
        }

        pub fn with_param(mut self, name: &str, ty: TypeRef) -> Self {
            self.params.push((name.to_string(), ty));
            self
        }

        /// Lower `body` as the whole routine body.
        pub fn lower(&mut self, body: &Node) -> Result<RoutineOutput, LoweringError> {
            let routine = RoutineInfo {
                owner: self.owner.clone(),
                name: "run".into(),
                return_type: self.return_type.clone(),
                is_static: self.is_static,
            };
            let mut ctx = LoweringContext::new(
                &self.nest,
                &mut self.bridges,
                &self.options,
                &mut self.constants,
                routine,
            );
            for (name, ty) in &self.params {
                ctx.slots_mut().declare_param(name, ty)?;
            }
            Dispatcher::with_defaults().process(body, &mut ctx)?;
            ctx.finish()
        }
    }
}
