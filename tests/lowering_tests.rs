//! Integration tests for the lowering pipeline.
//!
//! Routines are lowered through `NestCompiler` and then executed on a small
//! interpreter covering the int subset of the instruction set, so the tests
//! check behavior (iteration order, fallthrough, finally paths) rather than
//! exact instruction sequences.

use pretty_assertions::assert_eq;
use stackweave::compiler::{
    Constant, ConstantPool, SwitchEncoding, select_switch_encoding, text_hash,
};
use stackweave::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Interpreter
// =============================================================================

/// Observable side effects, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Effect {
    Log(i64),
    Enter,
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Returned(Option<i64>),
    Thrown(i64),
}

/// Value thrown by a call to `Main.fail()`.
const FAILURE: i64 = -99;

struct Machine<'a> {
    routine: &'a CompiledRoutine,
    constants: &'a ConstantPool,
    instructions: Vec<Instruction>,
    stack: Vec<i64>,
    locals: Vec<i64>,
    /// Arrays, addressed by index + 1 so that 0 stays null.
    heap: Vec<Vec<i64>>,
    effects: Vec<Effect>,
}

impl<'a> Machine<'a> {
    fn new(routine: &'a CompiledRoutine, constants: &'a ConstantPool, args: &[i64]) -> Self {
        let mut locals = vec![0; routine.max_locals as usize];
        locals[..args.len()].copy_from_slice(args);
        Self {
            routine,
            constants,
            instructions: routine.bytecode.instructions(),
            stack: Vec::new(),
            locals,
            heap: Vec::new(),
            effects: Vec::new(),
        }
    }

    fn pop(&mut self) -> i64 {
        self.stack.pop().expect("stack underflow")
    }

    fn index_of(&self, offset: usize) -> usize {
        self.instructions
            .binary_search_by_key(&offset, |i| i.offset)
            .unwrap_or_else(|_| panic!("no instruction at offset {offset}"))
    }

    fn constant(&self, index: u16) -> &Constant {
        self.constants.get(u32::from(index)).expect("constant")
    }

    fn fail_hash() -> TypeHash {
        MethodSpec::new("fail", TypeRef::VOID, vec![]).member_hash(&TypeRef::object("demo.Main"))
    }

    /// Continue at the handler covering `offset`, or report an uncaught throw.
    fn throw(&mut self, offset: usize, value: i64) -> Result<usize, Outcome> {
        let entry = self
            .routine
            .exception_table
            .iter()
            .find(|e| e.start <= offset && offset < e.end);
        match entry {
            Some(entry) => {
                self.stack.clear();
                self.stack.push(value);
                Ok(self.index_of(entry.handler))
            }
            None => Err(Outcome::Thrown(value)),
        }
    }

    fn run(&mut self) -> Outcome {
        let mut pc = 0;
        for _ in 0..100_000 {
            let instruction = self.instructions[pc].clone();
            let mut next = pc + 1;
            let compare = |machine: &mut Self, f: fn(i64, i64) -> bool| {
                let right = machine.pop();
                let left = machine.pop();
                machine.stack.push(i64::from(f(left, right)));
            };
            let arith = |machine: &mut Self, f: fn(i64, i64) -> i64| {
                let right = machine.pop();
                let left = machine.pop();
                machine.stack.push(f(left, right));
            };

            match (instruction.op, &instruction.operand) {
                (OpCode::PushZero | OpCode::PushFalse | OpCode::PushNull, _) => self.stack.push(0),
                (OpCode::PushOne | OpCode::PushTrue, _) => self.stack.push(1),
                (OpCode::Constant, Operand::Byte(index)) => {
                    let value = match self.constant(u16::from(*index)) {
                        Constant::Int(v) => i64::from(*v),
                        Constant::Long(v) => *v,
                        other => panic!("unsupported constant {other:?}"),
                    };
                    self.stack.push(value);
                }
                (OpCode::Pop, _) => {
                    self.pop();
                }
                (OpCode::Dup, _) => {
                    let top = *self.stack.last().expect("stack underflow");
                    self.stack.push(top);
                }
                (OpCode::GetLocal, Operand::Byte(slot)) => {
                    self.stack.push(self.locals[usize::from(*slot)]);
                }
                (OpCode::SetLocal, Operand::Byte(slot)) => {
                    let value = self.pop();
                    self.locals[usize::from(*slot)] = value;
                }
                (OpCode::IncLocal, Operand::Inc { slot, delta }) => {
                    self.locals[usize::from(*slot)] += i64::from(*delta);
                }
                (OpCode::AddI32, _) => arith(self, |a, b| a + b),
                (OpCode::SubI32, _) => arith(self, |a, b| a - b),
                (OpCode::MulI32, _) => arith(self, |a, b| a * b),
                (OpCode::EqI32 | OpCode::EqRef, _) => compare(self, |a, b| a == b),
                (OpCode::LtI32, _) => compare(self, |a, b| a < b),
                (OpCode::LeI32, _) => compare(self, |a, b| a <= b),
                (OpCode::GtI32, _) => compare(self, |a, b| a > b),
                (OpCode::GeI32, _) => compare(self, |a, b| a >= b),
                (OpCode::Not, _) => {
                    let value = self.pop();
                    self.stack.push(i64::from(value == 0));
                }
                (OpCode::Jump, Operand::Jump(target)) => next = self.index_of(*target),
                (OpCode::JumpIfTrue, Operand::Jump(target)) => {
                    if self.pop() != 0 {
                        next = self.index_of(*target);
                    }
                }
                (OpCode::JumpIfFalse, Operand::Jump(target)) => {
                    if self.pop() == 0 {
                        next = self.index_of(*target);
                    }
                }
                (
                    OpCode::TableSwitch,
                    Operand::Table {
                        default,
                        low,
                        high,
                        targets,
                    },
                ) => {
                    let key = self.pop();
                    let target = if (i64::from(*low)..=i64::from(*high)).contains(&key) {
                        targets[(key - i64::from(*low)) as usize]
                    } else {
                        *default
                    };
                    next = self.index_of(target);
                }
                (OpCode::LookupSwitch, Operand::Lookup { default, pairs }) => {
                    let key = self.pop();
                    let target = pairs
                        .iter()
                        .find(|(k, _)| i64::from(*k) == key)
                        .map_or(*default, |(_, target)| *target);
                    next = self.index_of(target);
                }
                (OpCode::SetStatic, _) => {
                    let value = self.pop();
                    self.effects.push(Effect::Log(value));
                }
                (OpCode::NewArray, _) => {
                    let length = self.pop();
                    self.heap.push(vec![0; length as usize]);
                    self.stack.push(self.heap.len() as i64);
                }
                (OpCode::ArrayLength, _) => {
                    let array = self.pop();
                    self.stack.push(self.heap[array as usize - 1].len() as i64);
                }
                (OpCode::ArrayLoad, _) => {
                    let index = self.pop();
                    let array = self.pop();
                    self.stack.push(self.heap[array as usize - 1][index as usize]);
                }
                (OpCode::ArrayStore, _) => {
                    let value = self.pop();
                    let index = self.pop();
                    let array = self.pop();
                    self.heap[array as usize - 1][index as usize] = value;
                }
                (OpCode::MonitorEnter, _) => {
                    self.pop();
                    self.effects.push(Effect::Enter);
                }
                (OpCode::MonitorExit, _) => {
                    self.pop();
                    self.effects.push(Effect::Exit);
                }
                (OpCode::InvokeStatic, Operand::Invoke { constant, argc }) => {
                    for _ in 0..*argc {
                        self.pop();
                    }
                    if *self.constant(*constant) == Constant::TypeHash(Self::fail_hash()) {
                        match self.throw(instruction.offset, FAILURE) {
                            Ok(handler) => next = handler,
                            Err(outcome) => return outcome,
                        }
                    }
                }
                (OpCode::Throw, _) => {
                    let value = self.pop();
                    match self.throw(instruction.offset, value) {
                        Ok(handler) => next = handler,
                        Err(outcome) => return outcome,
                    }
                }
                (OpCode::Return, _) => return Outcome::Returned(Some(self.pop())),
                (OpCode::ReturnVoid, _) => return Outcome::Returned(None),
                (op, operand) => panic!("unsupported instruction {op:?} {operand:?}"),
            }
            pc = next;
        }
        panic!("step limit exceeded");
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn main_type() -> TypeRef {
    TypeRef::object("demo.Main")
}

fn log(value: Node) -> Node {
    Node::FieldDefinition {
        owner: TypeRef::object("demo.Log"),
        name: "last".into(),
        ty: TypeRef::INT,
        receiver: None,
        value: Box::new(value),
    }
}

fn int(name: &str) -> Node {
    Node::var(name, TypeRef::INT)
}

fn fail() -> Node {
    Node::invoke(
        InvokeKind::Static,
        main_type(),
        MethodSpec::new("fail", TypeRef::VOID, vec![]),
        None,
        vec![],
    )
}

fn routine(params: Vec<Param>, return_type: TypeRef, body: Node) -> RoutineDecl {
    RoutineDecl {
        owner: main_type(),
        name: "run".into(),
        params,
        return_type,
        is_static: true,
        body,
    }
}

/// Lower `routine` and run it with `args` bound to its leading slots.
fn execute(routine: &RoutineDecl, args: &[i64]) -> (Outcome, Vec<Effect>) {
    init_tracing();
    let nest = TypeNest::new();
    let mut compiler = NestCompiler::new(&nest);
    let compiled = compiler.compile_routine(routine).unwrap();
    let mut machine = Machine::new(&compiled, compiler.constants(), args);
    let outcome = machine.run();
    (outcome, machine.effects)
}

fn counting_for(label: &str, var: &str, limit: i32, body: Node) -> Node {
    Node::For {
        label: Some(label.into()),
        init: vec![Node::declare(var, TypeRef::INT, Node::int(0))],
        condition: Some(Box::new(Node::check(
            CompareOp::Lt,
            int(var),
            Node::int(limit),
        ))),
        update: vec![Node::assign(
            var,
            TypeRef::INT,
            Node::operate(ArithOp::Add, TypeRef::INT, int(var), Node::int(1)),
        )],
        body: Box::new(body),
    }
}

// =============================================================================
// Iteration
// =============================================================================

#[test]
fn for_each_visits_elements_in_order() {
    let values = TypeRef::array(TypeRef::INT);
    let store = |index: i32, value: i32| Node::ArrayStore {
        array: Box::new(Node::var("values", values.clone())),
        index: Box::new(Node::int(index)),
        value: Box::new(Node::int(value)),
    };
    let body = Node::seq(vec![
        Node::declare(
            "values",
            values.clone(),
            Node::NewArray {
                element: TypeRef::INT,
                length: Box::new(Node::int(3)),
            },
        ),
        store(0, 5),
        store(1, 6),
        store(2, 7),
        Node::ForEach {
            label: None,
            variable: "item".into(),
            ty: TypeRef::INT,
            iteration: Iteration::Indexed,
            source: Box::new(Node::var("values", values.clone())),
            body: Box::new(log(int("item"))),
        },
    ]);
    let (outcome, effects) = execute(&routine(vec![], TypeRef::VOID, body), &[]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(effects, vec![Effect::Log(5), Effect::Log(6), Effect::Log(7)]);
}

#[test]
fn labelled_transfers_leave_the_named_loop() {
    // outer: for i in 0..3 { inner: for j in 0..3 {
    //     if j == 1 continue outer; if i == 2 break outer; log(i * 10 + j) } }
    let inner_body = Node::seq(vec![
        Node::if_then(
            Node::check(CompareOp::Eq, int("j"), Node::int(1)),
            Node::Continue(Some("outer".into())),
            None,
        ),
        Node::if_then(
            Node::check(CompareOp::Eq, int("i"), Node::int(2)),
            Node::Break(Some("outer".into())),
            None,
        ),
        log(Node::operate(
            ArithOp::Add,
            TypeRef::INT,
            Node::operate(ArithOp::Mul, TypeRef::INT, int("i"), Node::int(10)),
            int("j"),
        )),
    ]);
    let body = counting_for("outer", "i", 3, counting_for("inner", "j", 3, inner_body));
    let (_, effects) = execute(&routine(vec![], TypeRef::VOID, body), &[]);
    assert_eq!(effects, vec![Effect::Log(0), Effect::Log(10)]);
}

// =============================================================================
// Switches
// =============================================================================

fn int_switch(keys: [i32; 3]) -> RoutineDecl {
    let [first, second, third] = keys;
    let body = Node::Switch {
        label: None,
        kind: SwitchKind::Int,
        subject: Box::new(int("k")),
        cases: vec![
            // Falls through into the second case.
            Case::new(Node::int(first), log(Node::int(10))),
            Case::new(
                Node::int(second),
                Node::seq(vec![log(Node::int(20)), Node::Break(None)]),
            ),
            Case::new(
                Node::int(third),
                Node::seq(vec![log(Node::int(50)), Node::Break(None)]),
            ),
            Case::otherwise(log(Node::int(0))),
        ],
    };
    routine(vec![Param::new("k", TypeRef::INT)], TypeRef::VOID, body)
}

fn expected_switch_effects(keys: [i32; 3], k: i32) -> Vec<Effect> {
    let logs: Vec<i64> = match k {
        _ if k == keys[0] => vec![10, 20],
        _ if k == keys[1] => vec![20],
        _ if k == keys[2] => vec![50],
        _ => vec![0],
    };
    logs.into_iter().map(Effect::Log).collect()
}

#[test]
fn int_switches_dispatch_and_fall_through() {
    for keys in [[1, 2, 5], [1, 2, 500]] {
        let routine = int_switch(keys);
        for k in [-1, 0, 1, 2, 3, 4, 5, 6, 500, 501] {
            let (outcome, effects) = execute(&routine, &[i64::from(k)]);
            assert_eq!(outcome, Outcome::Returned(None));
            assert_eq!(effects, expected_switch_effects(keys, k), "keys {keys:?}, k = {k}");
        }
    }
}

#[test]
fn switch_encoding_follows_density() {
    assert_eq!(select_switch_encoding(&[0, 1, 2, 3]), SwitchEncoding::Table);
    assert_eq!(select_switch_encoding(&[0, 1, 2, 100]), SwitchEncoding::Lookup);
    assert_eq!(select_switch_encoding(&[1, 2, 5]), SwitchEncoding::Table);
    assert_eq!(select_switch_encoding(&[1, 2, 500]), SwitchEncoding::Lookup);
}

#[test]
fn text_switch_emits_each_body_once() {
    init_tracing();
    // "Aa" and "BB" collide; "c" and "Aa" share a body but not a bucket.
    let body = Node::Switch {
        label: None,
        kind: SwitchKind::Text,
        subject: Box::new(Node::var("s", TypeRef::string())),
        cases: vec![
            Case::new(Node::text("c"), Node::Nothing),
            Case::new(
                Node::text("Aa"),
                Node::seq(vec![log(Node::int(1)), Node::Break(None)]),
            ),
            Case::new(
                Node::text("BB"),
                Node::seq(vec![log(Node::int(2)), Node::Break(None)]),
            ),
            Case::otherwise(log(Node::int(9))),
        ],
    };
    let nest = TypeNest::new();
    let mut compiler = NestCompiler::new(&nest);
    let compiled = compiler
        .compile_routine(&routine(
            vec![Param::new("s", TypeRef::string())],
            TypeRef::VOID,
            body,
        ))
        .unwrap();

    let instructions = compiled.bytecode.instructions();
    let switch = instructions.iter().find(|i| i.op.is_switch()).unwrap();
    let Operand::Lookup { pairs, .. } = &switch.operand else {
        panic!("expected a lookup switch");
    };
    let keys: Vec<i32> = pairs.iter().map(|(k, _)| *k).collect();
    let mut expected = vec![text_hash("Aa"), text_hash("c")];
    expected.sort();
    assert_eq!(keys, expected);

    let logs = compiled
        .bytecode
        .opcodes()
        .into_iter()
        .filter(|op| *op == OpCode::SetStatic)
        .count();
    // Body 1 is copied into the "c" bucket; the default body appears once.
    assert_eq!(logs, 4);
}

#[test]
fn redirect_to_default_releases_the_monitor() {
    // switch (k) { case 1: synchronized (guard) { log(1); <redirect> } default: log(0) }
    let body = Node::Switch {
        label: None,
        kind: SwitchKind::Int,
        subject: Box::new(int("k")),
        cases: vec![
            Case::new(
                Node::int(1),
                Node::Synchronized {
                    lock: Box::new(Node::var("guard", TypeRef::object_root())),
                    body: Box::new(Node::seq(vec![
                        log(Node::int(1)),
                        Node::RedirectToEnclosingDefault,
                    ])),
                },
            ),
            Case::otherwise(log(Node::int(0))),
        ],
    };
    let routine = routine(
        vec![
            Param::new("k", TypeRef::INT),
            Param::new("guard", TypeRef::object_root()),
        ],
        TypeRef::VOID,
        body,
    );

    let (outcome, effects) = execute(&routine, &[1, 7]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(
        effects,
        vec![Effect::Enter, Effect::Log(1), Effect::Exit, Effect::Log(0)]
    );

    let (_, effects) = execute(&routine, &[2, 7]);
    assert_eq!(effects, vec![Effect::Log(0)]);
}

#[test]
fn failed_guard_runs_finally_before_default() {
    // switch (k) { case 1: try { if (flag) { log(1); <redirect> } } finally { log(9) }
    //              default: log(0) }
    let guarded = Node::if_then(
        Node::var("flag", TypeRef::BOOL),
        Node::seq(vec![log(Node::int(1)), Node::RedirectToEnclosingDefault]),
        None,
    );
    let body = Node::Switch {
        label: None,
        kind: SwitchKind::Int,
        subject: Box::new(int("k")),
        cases: vec![
            Case::new(
                Node::int(1),
                Node::Try {
                    body: Box::new(guarded),
                    catches: vec![],
                    finally: Some(Box::new(log(Node::int(9)))),
                },
            ),
            Case::otherwise(log(Node::int(0))),
        ],
    };
    let routine = routine(
        vec![
            Param::new("k", TypeRef::INT),
            Param::new("flag", TypeRef::BOOL),
        ],
        TypeRef::VOID,
        body,
    );

    let (_, effects) = execute(&routine, &[1, 0]);
    assert_eq!(effects, vec![Effect::Log(9), Effect::Log(0)]);

    let (_, effects) = execute(&routine, &[1, 1]);
    assert_eq!(effects, vec![Effect::Log(1), Effect::Log(9), Effect::Log(0)]);
}

// =============================================================================
// Monitors and exceptions
// =============================================================================

fn synchronized(body: Node) -> RoutineDecl {
    routine(
        vec![Param::new("guard", TypeRef::object_root())],
        TypeRef::VOID,
        Node::Synchronized {
            lock: Box::new(Node::var("guard", TypeRef::object_root())),
            body: Box::new(body),
        },
    )
}

#[test]
fn monitor_is_released_on_normal_exit() {
    let (outcome, effects) = execute(&synchronized(log(Node::int(1))), &[7]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(effects, vec![Effect::Enter, Effect::Log(1), Effect::Exit]);
}

#[test]
fn monitor_is_released_when_the_body_throws() {
    let body = Node::seq(vec![fail(), log(Node::int(1))]);
    let (outcome, effects) = execute(&synchronized(body), &[7]);
    assert_eq!(outcome, Outcome::Thrown(FAILURE));
    assert_eq!(effects, vec![Effect::Enter, Effect::Exit]);
}

#[test]
fn monitor_is_released_on_return() {
    let body = Node::seq(vec![Node::ret(None), log(Node::int(1))]);
    let (outcome, effects) = execute(&synchronized(body), &[7]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(effects, vec![Effect::Enter, Effect::Exit]);
}

#[test]
fn catch_then_finally_then_continue() {
    let body = Node::seq(vec![
        Node::Try {
            body: Box::new(Node::seq(vec![fail(), log(Node::int(1))])),
            catches: vec![Catch {
                ty: TypeRef::object(well_known::THROWABLE),
                variable: "e".into(),
                body: log(Node::int(2)),
            }],
            finally: Some(Box::new(log(Node::int(3)))),
        },
        log(Node::int(4)),
    ]);
    let (outcome, effects) = execute(&routine(vec![], TypeRef::VOID, body), &[]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(
        effects,
        vec![Effect::Log(2), Effect::Log(3), Effect::Log(4)]
    );
}

#[test]
fn returned_value_survives_finally() {
    let body = Node::Try {
        body: Box::new(Node::ret(Some(Node::int(7)))),
        catches: vec![],
        finally: Some(Box::new(log(Node::int(1)))),
    };
    let (outcome, effects) = execute(&routine(vec![], TypeRef::INT, body), &[]);
    assert_eq!(outcome, Outcome::Returned(Some(7)));
    assert_eq!(effects, vec![Effect::Log(1)]);
}

// =============================================================================
// Slots and bridges
// =============================================================================

#[test]
fn shadowing_does_not_disturb_the_outer_slot() {
    let body = Node::seq(vec![
        Node::declare("x", TypeRef::INT, Node::int(1)),
        Node::While {
            label: None,
            condition: Box::new(Node::var("flag", TypeRef::BOOL)),
            body: Box::new(Node::declare("x", TypeRef::INT, Node::int(2))),
            do_while: false,
        },
        log(int("x")),
    ]);
    let routine = routine(vec![Param::new("flag", TypeRef::BOOL)], TypeRef::VOID, body);

    let nest = TypeNest::new();
    let compiled = NestCompiler::new(&nest).compile_routine(&routine).unwrap();
    let slots: Vec<(&str, u16)> = compiled
        .slot_table
        .iter()
        .map(|e| (e.name.as_str(), e.slot))
        .collect();
    assert_eq!(slots, vec![("flag", 0), ("x", 1), ("x", 2)]);

    let (_, effects) = execute(&routine, &[0]);
    assert_eq!(effects, vec![Effect::Log(1)]);
}

#[test]
fn bridges_are_shared_per_member() {
    init_tracing();
    let outer = TypeRef::object("demo.Outer");
    let holder = TypeRef::object("demo.Outer$Holder");
    let read = |name: &str, ty: TypeRef| Node::FieldAccess {
        owner: holder.clone(),
        name: name.into(),
        ty,
        receiver: Some(Box::new(Node::var("h", holder.clone()))),
    };
    let reader = |name: &str, field: &str, ty: TypeRef| {
        MethodDecl::new(
            name,
            Modifiers::STATIC,
            ty.clone(),
            vec![Param::new("h", holder.clone())],
        )
        .with_body(Node::ret(Some(read(field, ty))))
    };

    let mut nest = TypeNest::new();
    nest.add_type(TypeDecl::class("demo.Outer")).unwrap();
    nest.add_type(
        TypeDecl::class("demo.Outer$Holder")
            .with_outer(outer.clone())
            .with_field(FieldDecl::new("secret", TypeRef::INT, Modifiers::PRIVATE))
            .with_field(FieldDecl::new("other", TypeRef::INT, Modifiers::PRIVATE)),
    )
    .unwrap();
    nest.add_type(
        TypeDecl::class("demo.Outer$Left")
            .with_outer(outer.clone())
            .with_method(reader("left", "secret", TypeRef::INT)),
    )
    .unwrap();
    nest.add_type(
        TypeDecl::class("demo.Outer$Right")
            .with_outer(outer.clone())
            .with_method(reader("right", "secret", TypeRef::INT))
            .with_method(reader("rightOther", "other", TypeRef::INT)),
    )
    .unwrap();

    let compiled = NestCompiler::new(&nest).compile_nest().unwrap();
    assert_eq!(compiled.bridges.len(), 2);
    assert_eq!(
        compiled.bridges[0].requesters,
        vec![
            TypeRef::object("demo.Outer$Left"),
            TypeRef::object("demo.Outer$Right"),
        ]
    );
    assert_eq!(
        compiled.bridges[1].requesters,
        vec![TypeRef::object("demo.Outer$Right")]
    );
    assert!(compiled.routine(&holder, "accessor$0").is_some());
    assert!(compiled.routine(&holder, "accessor$1").is_some());
}
