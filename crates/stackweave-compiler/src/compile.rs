//! Nest compiler - lowers every routine of a nest.
//!
//! [`NestCompiler`] owns everything shared by the routines of one nest: the
//! handler registry, the bridge memo and the constant pool. Each routine is
//! lowered with a fresh [`LoweringContext`].
//!
//! Compiling a whole nest runs to a fixpoint: bridges requested while
//! lowering are themselves lowered as routines of their owning type, until
//! no new bridge is requested. Routines declared inside a body are listed
//! right after the routine that declares them.
//!
//! # Example
//!
//! ```ignore
//! let compiled = NestCompiler::new(&nest)
//!     .with_options(LoweringOptions::new().with_bridges(true))
//!     .compile_nest()?;
//! for routine in &compiled.routines {
//!     println!("{}.{}{}", routine.owner, routine.name, routine.descriptor);
//! }
//! ```

use stackweave_core::{
    ConstructorDecl, LoweringError, MethodDecl, MethodSpec, Node, Param, TypeDecl, TypeRef,
    well_known,
};
use stackweave_registry::TypeNest;
use tracing::debug;

use crate::bridge::{Bridge, BridgeDecl, BridgeRegistry};
use crate::bytecode::{BytecodeChunk, ConstantPool, OpCode};
use crate::context::{LoweringContext, RoutineInfo};
use crate::dispatch::Dispatcher;
use crate::emit::{ExceptionEntry, Frame};
use crate::options::LoweringOptions;
use crate::slots::SlotEntry;

type Result<T> = std::result::Result<T, LoweringError>;

/// A routine ready to be lowered.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDecl {
    pub owner: TypeRef,
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub is_static: bool,
    pub body: Node,
}

impl RoutineDecl {
    /// The routine of a method, or `None` for a method without a body.
    pub fn from_method(owner: &TypeRef, method: &MethodDecl) -> Option<Self> {
        Some(Self {
            owner: owner.clone(),
            name: method.name.clone(),
            params: method.params.clone(),
            return_type: method.return_type.clone(),
            is_static: method.modifiers.is_static(),
            body: method.body.clone()?,
        })
    }

    /// The routine of a constructor, or `None` for one without a body.
    pub fn from_constructor(owner: &TypeRef, constructor: &ConstructorDecl) -> Option<Self> {
        Some(Self {
            owner: owner.clone(),
            name: well_known::CONSTRUCTOR.to_string(),
            params: constructor.params.clone(),
            return_type: TypeRef::VOID,
            is_static: false,
            body: constructor.body.clone()?,
        })
    }

    fn from_bridge(bridge: &Bridge) -> Option<Self> {
        match &bridge.declaration {
            BridgeDecl::Method(method) => Self::from_method(bridge.owner(), method),
            BridgeDecl::Constructor(constructor) => {
                Self::from_constructor(bridge.owner(), constructor)
            }
        }
    }

    /// Method descriptor, e.g. `(IJ)V`.
    pub fn descriptor(&self) -> String {
        let params = self.params.iter().map(|p| p.ty.clone()).collect();
        MethodSpec::new(self.name.clone(), self.return_type.clone(), params).descriptor()
    }
}

/// The lowered form of one routine.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRoutine {
    pub owner: TypeRef,
    pub name: String,
    pub descriptor: String,
    pub bytecode: BytecodeChunk,
    pub exception_table: Vec<ExceptionEntry>,
    pub frames: Vec<Frame>,
    pub slot_table: Vec<SlotEntry>,
    pub max_locals: u32,
}

/// Everything produced for one nest.
#[derive(Debug)]
pub struct CompiledNest {
    /// Declared routines in nest order, each followed by the local routines
    /// declared inside it, then bridge routines.
    pub routines: Vec<CompiledRoutine>,
    pub bridges: Vec<Bridge>,
    /// Marker types introduced by constructor bridges.
    pub synthetic_types: Vec<TypeDecl>,
    pub constants: ConstantPool,
}

impl CompiledNest {
    /// First routine named `name` declared on `owner`.
    pub fn routine(&self, owner: &TypeRef, name: &str) -> Option<&CompiledRoutine> {
        self.routines
            .iter()
            .find(|routine| routine.owner == *owner && routine.name == name)
    }
}

/// Lowers the routines of one nest.
pub struct NestCompiler<'n> {
    nest: &'n TypeNest,
    options: LoweringOptions,
    dispatcher: Dispatcher,
    bridges: BridgeRegistry,
    constants: ConstantPool,
    local_routines: Vec<CompiledRoutine>,
}

impl<'n> NestCompiler<'n> {
    pub fn new(nest: &'n TypeNest) -> Self {
        Self {
            nest,
            options: LoweringOptions::default(),
            dispatcher: Dispatcher::with_defaults(),
            bridges: BridgeRegistry::new(),
            constants: ConstantPool::new(),
            local_routines: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: LoweringOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the handler registry, e.g. with one carrying custom handlers.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn bridges(&self) -> &BridgeRegistry {
        &self.bridges
    }

    /// Constants referenced by the routines lowered so far.
    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    /// Lower one routine.
    ///
    /// Routines declared inside its body are kept until
    /// [`take_local_routines`](Self::take_local_routines).
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_routine(&mut self, routine: &RoutineDecl) -> Result<CompiledRoutine> {
        let (compiled, locals) = lower_routine(
            self.nest,
            &mut self.bridges,
            &self.options,
            &mut self.constants,
            &self.dispatcher,
            routine,
        )?;
        self.local_routines.extend(locals);
        Ok(compiled)
    }

    /// Local routines lowered since the last call, in declaration order.
    pub fn take_local_routines(&mut self) -> Vec<CompiledRoutine> {
        std::mem::take(&mut self.local_routines)
    }

    /// Lower the method of `owner` matching `spec`.
    pub fn compile_method(&mut self, owner: &TypeRef, spec: &MethodSpec) -> Result<CompiledRoutine> {
        let decl = self
            .nest
            .get(owner)
            .ok_or_else(|| LoweringError::UnknownType {
                name: owner.to_string(),
            })?;
        let routine = decl
            .methods
            .iter()
            .find(|method| method.spec() == *spec)
            .and_then(|method| RoutineDecl::from_method(owner, method))
            .ok_or_else(|| LoweringError::UnknownMember {
                owner: owner.clone(),
                name: spec.name.clone(),
            })?;
        self.compile_routine(&routine)
    }

    /// Lower every routine with a body in the nest, then every bridge they
    /// requested, transitively.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_nest(mut self) -> Result<CompiledNest> {
        let nest = self.nest;
        let mut routines = Vec::new();

        for decl in nest.types() {
            let declared = decl
                .constructors
                .iter()
                .filter_map(|c| RoutineDecl::from_constructor(&decl.ty, c))
                .chain(
                    decl.methods
                        .iter()
                        .filter_map(|m| RoutineDecl::from_method(&decl.ty, m)),
                );
            for routine in declared {
                routines.push(self.compile_routine(&routine)?);
                routines.append(&mut self.local_routines);
            }
        }

        let mut lowered = 0;
        while lowered < self.bridges.len() {
            let pending: Vec<RoutineDecl> = self
                .bridges
                .pending_from(lowered)
                .iter()
                .filter_map(RoutineDecl::from_bridge)
                .collect();
            lowered = self.bridges.len();
            for routine in &pending {
                routines.push(self.compile_routine(routine)?);
                routines.append(&mut self.local_routines);
            }
        }

        debug!(
            routines = routines.len(),
            bridges = self.bridges.len(),
            "nest lowered"
        );
        Ok(CompiledNest {
            routines,
            bridges: self.bridges.bridges().to_vec(),
            synthetic_types: self.bridges.synthetic_types().to_vec(),
            constants: self.constants,
        })
    }
}

/// Lower `routine` with fresh per-routine state against the shared
/// collaborators. Returns the routine and, separately, every local routine
/// declared inside it.
///
/// Every variable name of the body is reserved before lowering, so the
/// hidden variables of desugared constructs never collide with them. A void
/// routine that can fall off its end gets a trailing `ReturnVoid`.
pub(crate) fn lower_routine(
    nest: &TypeNest,
    bridges: &mut BridgeRegistry,
    options: &LoweringOptions,
    constants: &mut ConstantPool,
    dispatcher: &Dispatcher,
    routine: &RoutineDecl,
) -> Result<(CompiledRoutine, Vec<CompiledRoutine>)> {
    let info = RoutineInfo {
        owner: routine.owner.clone(),
        name: routine.name.clone(),
        return_type: routine.return_type.clone(),
        is_static: routine.is_static,
    };
    let mut ctx = LoweringContext::new(nest, bridges, options, constants, info);

    for name in routine.body.variable_names() {
        ctx.slots_mut().reserve(name);
    }
    for param in &routine.params {
        let ty = ctx.resolve(&param.ty)?;
        ctx.slots_mut().declare_param(&param.name, &ty)?;
    }

    dispatcher.process_statement(&routine.body, &mut ctx)?;
    if routine.return_type.is_void() && !ends_in_transfer(&routine.body) {
        ctx.emitter().emit(OpCode::ReturnVoid);
    }

    let output = ctx.finish()?;
    debug!(
        owner = %routine.owner,
        name = %routine.name,
        size = output.code.bytecode.len(),
        max_locals = output.max_locals,
        locals = output.local_routines.len(),
        "routine lowered"
    );
    let compiled = CompiledRoutine {
        owner: routine.owner.clone(),
        name: routine.name.clone(),
        descriptor: routine.descriptor(),
        bytecode: output.code.bytecode,
        exception_table: output.code.exception_table,
        frames: output.code.frames,
        slot_table: output.slot_table,
        max_locals: output.max_locals,
    };
    Ok((compiled, output.local_routines))
}

/// True when control cannot fall off the end of `body`.
fn ends_in_transfer(body: &Node) -> bool {
    match body {
        Node::Return(_) | Node::Throw(_) => true,
        Node::Instructions(nodes) => nodes.last().is_some_and(ends_in_transfer),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stackweave_core::{FieldDecl, Modifiers, TypeDecl};

    fn outer() -> TypeRef {
        TypeRef::object("demo.Outer")
    }

    fn holder() -> TypeRef {
        TypeRef::object("demo.Outer$Holder")
    }

    fn read_secret() -> Node {
        Node::FieldAccess {
            owner: holder(),
            name: "secret".into(),
            ty: TypeRef::INT,
            receiver: Some(Box::new(Node::var("h", holder()))),
        }
    }

    fn reader(name: &str) -> MethodDecl {
        MethodDecl::new(
            name,
            Modifiers::STATIC,
            TypeRef::INT,
            vec![Param::new("h", holder())],
        )
        .with_body(Node::ret(Some(read_secret())))
    }

    fn nest() -> TypeNest {
        let mut nest = TypeNest::new();
        nest.add_type(TypeDecl::class("demo.Outer").with_method(reader("peek")))
            .unwrap();
        nest.add_type(
            TypeDecl::class("demo.Outer$Holder")
                .with_outer(outer())
                .with_field(FieldDecl::new("secret", TypeRef::INT, Modifiers::PRIVATE)),
        )
        .unwrap();
        nest.add_type(
            TypeDecl::class("demo.Outer$Other")
                .with_outer(outer())
                .with_method(reader("look"))
                .with_method(MethodDecl::new("abstractly", Modifiers::PUBLIC, TypeRef::VOID, vec![])),
        )
        .unwrap();
        nest
    }

    #[test]
    fn nest_compiles_routines_and_bridges() {
        let nest = nest();
        let compiled = NestCompiler::new(&nest).compile_nest().unwrap();

        // peek, look, then the single shared accessor.
        let names: Vec<(String, &str)> = compiled
            .routines
            .iter()
            .map(|r| (r.owner.to_string(), r.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("demo.Outer".to_string(), "peek"),
                ("demo.Outer$Other".to_string(), "look"),
                ("demo.Outer$Holder".to_string(), "accessor$0"),
            ]
        );
        assert_eq!(compiled.bridges.len(), 1);
        assert_eq!(
            compiled.bridges[0].requesters,
            vec![outer(), TypeRef::object("demo.Outer$Other")]
        );

        let peek = compiled.routine(&outer(), "peek").unwrap();
        peek.bytecode
            .assert_opcodes(&[OpCode::GetLocal, OpCode::InvokeStatic, OpCode::Return]);
        assert_eq!(peek.descriptor, "(Ldemo/Outer$Holder;)I");

        let accessor = compiled.routine(&holder(), "accessor$0").unwrap();
        accessor
            .bytecode
            .assert_opcodes(&[OpCode::GetLocal, OpCode::GetField, OpCode::Return]);
    }

    #[test]
    fn bridges_can_be_disabled() {
        let nest = nest();
        let compiled = NestCompiler::new(&nest)
            .with_options(LoweringOptions::new().with_bridges(false))
            .compile_nest()
            .unwrap();
        assert!(compiled.bridges.is_empty());
        compiled
            .routine(&outer(), "peek")
            .unwrap()
            .bytecode
            .assert_opcodes(&[OpCode::GetLocal, OpCode::GetField, OpCode::Return]);
    }

    #[test]
    fn void_routines_return_implicitly() {
        let nest = TypeNest::new();
        let mut compiler = NestCompiler::new(&nest);
        let routine = RoutineDecl {
            owner: outer(),
            name: "touch".into(),
            params: vec![Param::new("n", TypeRef::LONG)],
            return_type: TypeRef::VOID,
            is_static: true,
            body: Node::declare("copy", TypeRef::LONG, Node::var("n", TypeRef::LONG)),
        };
        let compiled = compiler.compile_routine(&routine).unwrap();
        compiled
            .bytecode
            .assert_opcodes(&[OpCode::GetLocal, OpCode::SetLocal, OpCode::ReturnVoid]);
        assert_eq!(compiled.max_locals, 4);
        assert_eq!(compiled.descriptor, "(J)V");

        let explicit = RoutineDecl {
            body: Node::seq(vec![Node::ret(None)]),
            ..routine
        };
        compiler
            .compile_routine(&explicit)
            .unwrap()
            .bytecode
            .assert_opcodes(&[OpCode::ReturnVoid]);
    }

    #[test]
    fn hidden_names_avoid_every_body_name() {
        let nest = TypeNest::new();
        let mut compiler = NestCompiler::new(&nest);
        let lock = Node::var("guard", TypeRef::object_root());
        // "$lock0" is declared after the synchronized block but still reserved.
        let routine = RoutineDecl {
            owner: outer(),
            name: "run".into(),
            params: vec![Param::new("guard", TypeRef::object_root())],
            return_type: TypeRef::VOID,
            is_static: true,
            body: Node::seq(vec![
                Node::Synchronized {
                    lock: Box::new(lock),
                    body: Box::new(Node::Nothing),
                },
                Node::declare("$lock0", TypeRef::INT, Node::int(0)),
            ]),
        };
        let compiled = compiler.compile_routine(&routine).unwrap();
        let names: Vec<&str> = compiled.slot_table.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["guard", "$lock1", "$throwable2", "$lock0"]);
    }

    #[test]
    fn unknown_methods_are_reported() {
        let nest = nest();
        let mut compiler = NestCompiler::new(&nest);
        let spec = MethodSpec::new("peek", TypeRef::INT, vec![holder()]);

        assert_eq!(
            compiler
                .compile_method(&TypeRef::object("demo.Missing"), &spec)
                .unwrap_err(),
            LoweringError::UnknownType {
                name: "demo.Missing".into(),
            }
        );
        assert_eq!(
            compiler
                .compile_method(&outer(), &MethodSpec::new("poke", TypeRef::INT, vec![]))
                .unwrap_err(),
            LoweringError::UnknownMember {
                owner: outer(),
                name: "poke".into(),
            }
        );
        // Bodiless methods cannot be lowered.
        assert!(matches!(
            compiler
                .compile_method(
                    &TypeRef::object("demo.Outer$Other"),
                    &MethodSpec::new("abstractly", TypeRef::VOID, vec![]),
                )
                .unwrap_err(),
            LoweringError::UnknownMember { .. }
        ));

        let peek = compiler.compile_method(&outer(), &spec).unwrap();
        assert_eq!(peek.name, "peek");
        assert_eq!(compiler.bridges().len(), 1);
    }

    #[test]
    fn custom_handlers_replace_defaults() {
        use crate::context::LoweringContext;
        use stackweave_core::NodeKind;

        // Lowers `throw` as an early return.
        fn silent_throw(
            _: &Node,
            ctx: &mut LoweringContext<'_>,
            _: &Dispatcher,
        ) -> Result<()> {
            ctx.emitter().emit(OpCode::ReturnVoid);
            Ok(())
        }

        let nest = TypeNest::new();
        let mut compiler = NestCompiler::new(&nest);
        compiler
            .dispatcher_mut()
            .register(NodeKind::Throw, silent_throw);
        let routine = RoutineDecl {
            owner: outer(),
            name: "fail".into(),
            params: vec![],
            return_type: TypeRef::VOID,
            is_static: true,
            body: Node::Throw(Box::new(Node::null())),
        };
        compiler
            .compile_routine(&routine)
            .unwrap()
            .bytecode
            .assert_opcodes(&[OpCode::ReturnVoid]);
    }

    #[test]
    fn local_routines_follow_their_declarer_and_share_bridges() {
        let mut nest = TypeNest::new();
        let run = MethodDecl::new("run", Modifiers::STATIC, TypeRef::VOID, vec![]).with_body(
            Node::seq(vec![
                Node::local_routine(reader("peekLocal")),
                Node::ret(None),
            ]),
        );
        nest.add_type(TypeDecl::class("demo.Outer").with_method(run))
            .unwrap();
        nest.add_type(
            TypeDecl::class("demo.Outer$Holder")
                .with_outer(outer())
                .with_field(FieldDecl::new("secret", TypeRef::INT, Modifiers::PRIVATE)),
        )
        .unwrap();

        let compiled = NestCompiler::new(&nest).compile_nest().unwrap();
        let names: Vec<&str> = compiled.routines.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["run", "peekLocal", "accessor$0"]);

        compiled
            .routine(&outer(), "run")
            .unwrap()
            .bytecode
            .assert_opcodes(&[OpCode::ReturnVoid]);
        let local = compiled.routine(&outer(), "peekLocal").unwrap();
        assert_eq!(local.descriptor, "(Ldemo/Outer$Holder;)I");
        local
            .bytecode
            .assert_opcodes(&[OpCode::GetLocal, OpCode::InvokeStatic, OpCode::Return]);
        assert_eq!(compiled.bridges[0].requesters, vec![outer()]);
    }

    #[test]
    fn single_routine_keeps_its_local_routines_aside() {
        let nest = TypeNest::new();
        let mut compiler = NestCompiler::new(&nest);
        let routine = RoutineDecl {
            owner: outer(),
            name: "run".into(),
            params: vec![],
            return_type: TypeRef::VOID,
            is_static: true,
            body: Node::local_routine(
                MethodDecl::new("noop", Modifiers::STATIC, TypeRef::VOID, vec![])
                    .with_body(Node::Nothing),
            ),
        };
        compiler
            .compile_routine(&routine)
            .unwrap()
            .bytecode
            .assert_opcodes(&[OpCode::ReturnVoid]);

        let locals = compiler.take_local_routines();
        assert_eq!(locals.len(), 1);
        locals[0].bytecode.assert_opcodes(&[OpCode::ReturnVoid]);
        assert!(compiler.take_local_routines().is_empty());
    }
}
