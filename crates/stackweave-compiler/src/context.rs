//! LoweringContext - the mutable state threaded through every handler.
//!
//! One context lowers one routine. It owns the routine's emitter, flow
//! tracker, slot manager and typed data scopes, and borrows the nest-wide
//! collaborators: the declarations, the bridge registry and the options.

use stackweave_core::{LoweringError, Node, TypeRef};
use stackweave_registry::TypeNest;

use crate::bridge::BridgeRegistry;
use crate::bytecode::ConstantPool;
use crate::compile::CompiledRoutine;
use crate::data::{DataScopes, Key};
use crate::emit::{BytecodeEmitter, EmittedCode};
use crate::flow::FlowTracker;
use crate::options::LoweringOptions;
use crate::resolver::TypeResolver;
use crate::slots::{SlotEntry, SlotManager};

type Result<T> = std::result::Result<T, LoweringError>;

/// The routine being lowered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineInfo {
    pub owner: TypeRef,
    pub name: String,
    pub return_type: TypeRef,
    pub is_static: bool,
}

/// Routine info, stored in the root scope.
pub const ROUTINE: Key<RoutineInfo> = Key::new("routine");
/// Type whose code is being lowered; one entry per nested type scope.
pub const ENCLOSING_TYPE: Key<TypeRef> = Key::new("enclosing-type");

/// A `finally` body that must run when control leaves its try region.
#[derive(Debug, Clone)]
pub struct FinallyEntry {
    pub body: Node,
    /// Number of flow records active when the try was entered.
    pub flow_depth: usize,
}

/// Everything a finished routine produced.
#[derive(Debug)]
pub struct RoutineOutput {
    pub code: EmittedCode,
    pub slot_table: Vec<SlotEntry>,
    pub max_locals: u32,
    /// Routines declared inside the body, in declaration order.
    pub local_routines: Vec<CompiledRoutine>,
}

pub struct LoweringContext<'a> {
    nest: &'a TypeNest,
    bridges: &'a mut BridgeRegistry,
    options: &'a LoweringOptions,
    emitter: BytecodeEmitter<'a>,
    data: DataScopes,
    flows: FlowTracker,
    slots: SlotManager,
    finally: Vec<FinallyEntry>,
    expression_depth: usize,
    local_routines: Vec<CompiledRoutine>,
}

impl<'a> LoweringContext<'a> {
    pub fn new(
        nest: &'a TypeNest,
        bridges: &'a mut BridgeRegistry,
        options: &'a LoweringOptions,
        constants: &'a mut ConstantPool,
        routine: RoutineInfo,
    ) -> Self {
        let mut data = DataScopes::new();
        // One scope per enclosing type, outermost first.
        let mut chain = nest.enclosing_chain(&routine.owner);
        chain.reverse();
        chain.push(routine.owner.clone());
        for ty in chain {
            data.push_scope();
            data.set(ENCLOSING_TYPE, ty);
        }
        data.set_root(ROUTINE, routine);
        Self {
            nest,
            bridges,
            options,
            emitter: BytecodeEmitter::new(constants),
            data,
            flows: FlowTracker::new(),
            slots: SlotManager::new(),
            finally: Vec::new(),
            expression_depth: 0,
            local_routines: Vec::new(),
        }
    }

    // ==========================================================================
    // Collaborators
    // ==========================================================================

    pub fn nest(&self) -> &'a TypeNest {
        self.nest
    }

    pub fn options(&self) -> &'a LoweringOptions {
        self.options
    }

    pub fn bridges(&mut self) -> &mut BridgeRegistry {
        &mut *self.bridges
    }

    pub fn emitter(&mut self) -> &mut BytecodeEmitter<'a> {
        &mut self.emitter
    }

    pub fn flows(&self) -> &FlowTracker {
        &self.flows
    }

    pub fn flows_mut(&mut self) -> &mut FlowTracker {
        &mut self.flows
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut SlotManager {
        &mut self.slots
    }

    pub fn data(&self) -> &DataScopes {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataScopes {
        &mut self.data
    }

    /// The nest-wide collaborators, borrowed together so another routine
    /// can be lowered against them.
    pub fn shared(
        &mut self,
    ) -> (
        &'a TypeNest,
        &mut BridgeRegistry,
        &'a LoweringOptions,
        &mut ConstantPool,
    ) {
        (
            self.nest,
            &mut *self.bridges,
            self.options,
            self.emitter.constants_mut(),
        )
    }

    pub fn add_local_routine(&mut self, routine: CompiledRoutine) {
        self.local_routines.push(routine);
    }

    // ==========================================================================
    // Routine and Enclosing Types
    // ==========================================================================

    pub fn routine(&self) -> Option<&RoutineInfo> {
        self.data.get(ROUTINE)
    }

    /// Return type of the routine; `void` when unknown.
    pub fn return_type(&self) -> TypeRef {
        self.routine()
            .map(|r| r.return_type.clone())
            .unwrap_or(TypeRef::VOID)
    }

    /// Innermost enclosing type.
    pub fn current_type(&self) -> TypeRef {
        self.data
            .get(ENCLOSING_TYPE)
            .cloned()
            .unwrap_or_else(TypeRef::object_root)
    }

    /// Enclosing types, innermost first.
    pub fn type_chain(&self) -> Vec<TypeRef> {
        self.data.get_all(ENCLOSING_TYPE).into_iter().cloned().collect()
    }

    /// Enter the code of a nested type.
    pub fn push_type(&mut self, ty: TypeRef) {
        self.data.push_scope();
        self.data.set(ENCLOSING_TYPE, ty);
    }

    pub fn pop_type(&mut self) {
        self.data.pop_scope();
    }

    /// Resolve aliases in `ty` against the innermost enclosing type.
    pub fn resolve(&self, ty: &TypeRef) -> Result<TypeRef> {
        let current = self.current_type();
        TypeResolver::new(self.nest, &current).resolve(ty)
    }

    /// Route a private cross-type access through a bridge when required.
    pub fn bridge_access(&mut self, access: &Node) -> Option<Node> {
        if !self.options.generate_bridges {
            return None;
        }
        let requester = self.current_type();
        self.bridges.resolve_access(self.nest, &requester, access)
    }

    // ==========================================================================
    // Expression Depth
    // ==========================================================================

    /// Run `f` in expression position: values produced inside are consumed
    /// by the surrounding code.
    pub fn in_expression<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.expression_depth += 1;
        let result = f(self);
        self.expression_depth -= 1;
        result
    }

    /// Run `f` in statement position, whatever the surrounding depth.
    pub fn in_statement<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = std::mem::take(&mut self.expression_depth);
        let result = f(self);
        self.expression_depth = saved;
        result
    }

    pub fn expression_depth(&self) -> usize {
        self.expression_depth
    }

    pub fn is_value_used(&self) -> bool {
        self.expression_depth > 0
    }

    /// Discard a just-produced value of type `ty` in statement position.
    pub fn discard_if_unused(&mut self, ty: &TypeRef) {
        if self.expression_depth == 0 {
            self.emitter.emit_pop(ty.width());
        }
    }

    // ==========================================================================
    // Scopes
    // ==========================================================================

    /// Run `f` inside a nested slot scope and frame bracket.
    pub fn with_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.emitter.enter_frame();
        self.slots.push_scope();
        let result = f(self);
        self.slots.pop_scope();
        self.emitter.exit_frame();
        result
    }

    /// Run `f` inside a nested slot scope only.
    pub fn with_slot_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.slots.push_scope();
        let result = f(self);
        self.slots.pop_scope();
        result
    }

    // ==========================================================================
    // Finally Blocks
    // ==========================================================================

    pub fn push_finally(&mut self, body: Node) {
        let flow_depth = self.flows.len();
        self.finally.push(FinallyEntry { body, flow_depth });
    }

    pub fn pop_finally(&mut self) -> Option<FinallyEntry> {
        self.finally.pop()
    }

    pub fn finally_entries(&self) -> &[FinallyEntry] {
        &self.finally
    }

    /// Temporarily remove every finally entry from index `from` upwards.
    ///
    /// A finally body is lowered without itself (or anything inside it) on
    /// the stack; [`restore_finally`](Self::restore_finally) puts them back.
    pub fn take_finally_from(&mut self, from: usize) -> Vec<FinallyEntry> {
        let from = from.min(self.finally.len());
        self.finally.split_off(from)
    }

    pub fn restore_finally(&mut self, entries: Vec<FinallyEntry>) {
        self.finally.extend(entries);
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    pub fn finish(self) -> Result<RoutineOutput> {
        let code = self.emitter.finish()?;
        let (slot_table, max_locals) = self.slots.finish();
        Ok(RoutineOutput {
            code,
            slot_table,
            max_locals,
            local_routines: self.local_routines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;
    use stackweave_core::TypeDecl;

    fn routine(owner: &str) -> RoutineInfo {
        RoutineInfo {
            owner: TypeRef::object(owner),
            name: "run".into(),
            return_type: TypeRef::VOID,
            is_static: true,
        }
    }

    #[test]
    fn expression_depth_is_restored_on_error() {
        let nest = TypeNest::new();
        let mut bridges = BridgeRegistry::new();
        let options = LoweringOptions::default();
        let mut constants = ConstantPool::new();
        let mut ctx =
            LoweringContext::new(&nest, &mut bridges, &options, &mut constants, routine("demo.A"));

        let result: Result<()> = ctx.in_expression(|ctx| {
            assert!(ctx.is_value_used());
            ctx.in_expression(|_| Err(LoweringError::RedirectOutsideSwitch))
        });
        assert!(result.is_err());
        assert_eq!(ctx.expression_depth(), 0);
    }

    #[test]
    fn unused_values_are_discarded_by_width() {
        let nest = TypeNest::new();
        let mut bridges = BridgeRegistry::new();
        let options = LoweringOptions::default();
        let mut constants = ConstantPool::new();
        let mut ctx =
            LoweringContext::new(&nest, &mut bridges, &options, &mut constants, routine("demo.A"));

        ctx.discard_if_unused(&TypeRef::INT);
        ctx.discard_if_unused(&TypeRef::DOUBLE);
        ctx.discard_if_unused(&TypeRef::VOID);
        ctx.in_expression(|ctx| {
            ctx.discard_if_unused(&TypeRef::INT);
            Ok(())
        })
        .unwrap();

        let output = ctx.finish().unwrap();
        output
            .code
            .bytecode
            .assert_opcodes(&[OpCode::Pop, OpCode::Pop2]);
    }

    #[test]
    fn enclosing_type_chain() {
        let mut nest = TypeNest::new();
        nest.add_type(TypeDecl::class("demo.A")).unwrap();
        let mut bridges = BridgeRegistry::new();
        let options = LoweringOptions::default();
        let mut constants = ConstantPool::new();
        let mut ctx =
            LoweringContext::new(&nest, &mut bridges, &options, &mut constants, routine("demo.A"));

        assert_eq!(ctx.current_type(), TypeRef::object("demo.A"));
        ctx.push_type(TypeRef::object("demo.A$B"));
        assert_eq!(
            ctx.type_chain(),
            vec![TypeRef::object("demo.A$B"), TypeRef::object("demo.A")]
        );
        assert_eq!(ctx.resolve(&TypeRef::THIS).unwrap(), TypeRef::object("demo.A$B"));
        ctx.pop_type();
        assert_eq!(ctx.current_type(), TypeRef::object("demo.A"));
        assert_eq!(ctx.routine().map(|r| r.name.as_str()), Some("run"));
    }

    #[test]
    fn finally_entries_can_be_set_aside() {
        let nest = TypeNest::new();
        let mut bridges = BridgeRegistry::new();
        let options = LoweringOptions::default();
        let mut constants = ConstantPool::new();
        let mut ctx =
            LoweringContext::new(&nest, &mut bridges, &options, &mut constants, routine("demo.A"));

        ctx.push_finally(Node::Nothing);
        ctx.push_finally(Node::Break(None));
        let taken = ctx.take_finally_from(1);
        assert_eq!(taken.len(), 1);
        assert_eq!(ctx.finally_entries().len(), 1);
        ctx.restore_finally(taken);
        assert_eq!(ctx.finally_entries().len(), 2);
        assert!(ctx.pop_finally().is_some());
    }

    #[test]
    fn scopes_bracket_frames_and_slots() {
        let nest = TypeNest::new();
        let mut bridges = BridgeRegistry::new();
        let options = LoweringOptions::default();
        let mut constants = ConstantPool::new();
        let mut ctx =
            LoweringContext::new(&nest, &mut bridges, &options, &mut constants, routine("demo.A"));

        ctx.with_scope(|ctx| {
            ctx.slots_mut().declare("x", &TypeRef::INT)?;
            ctx.emitter().emit(OpCode::PushOne);
            Ok(())
        })
        .unwrap();
        assert!(ctx.slots().lookup("x").is_none());

        let output = ctx.finish().unwrap();
        assert_eq!(output.code.frames.len(), 1);
        assert_eq!(output.max_locals, 1);
    }
}
