//! Local-variable slot management for one routine.
//!
//! `SlotManager` maps variable names and types to storage slots. It handles:
//! - Slot allocation sized by the value width (one or two cells)
//! - Nested scopes with shadowing and restoration on scope exit
//! - Hidden variable names that never collide with names in the routine
//!
//! Slots are never reused within a routine: leaving a scope hides its
//! bindings but keeps their slots allocated, so the frame size is the number
//! of slots ever handed out.

use rustc_hash::{FxHashMap, FxHashSet};
use stackweave_core::{LoweringError, TypeRef};
use tracing::trace;

type Result<T> = std::result::Result<T, LoweringError>;

/// An entry of the routine's slot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub name: String,
    pub ty: TypeRef,
    pub slot: u16,
}

#[derive(Debug, Clone)]
struct Binding {
    ty: TypeRef,
    slot: u16,
    depth: u32,
}

#[derive(Debug, Default)]
pub struct SlotManager {
    /// Visible bindings by name.
    bindings: FxHashMap<String, Binding>,
    /// Bindings hidden by a declaration at a deeper scope: (shadowing depth, name, binding).
    shadowed: Vec<(u32, String, Binding)>,
    depth: u32,
    next_slot: u32,
    /// Every slot handed out, in allocation order.
    table: Vec<SlotEntry>,
    /// Names declared or reserved anywhere in the routine.
    used_names: FxHashSet<String>,
    name_counter: usize,
}

impl SlotManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Scope Management
    // ==========================================================================

    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Exit the current scope, restoring the bindings it shadowed.
    pub fn pop_scope(&mut self) {
        if self.depth == 0 {
            return;
        }
        let depth = self.depth;
        self.bindings.retain(|_, binding| binding.depth < depth);

        while self
            .shadowed
            .last()
            .is_some_and(|(shadowing_depth, _, _)| *shadowing_depth == depth)
        {
            if let Some((_, name, binding)) = self.shadowed.pop() {
                self.bindings.insert(name, binding);
            }
        }

        self.depth -= 1;
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    /// Bind a routine parameter. Parameters live at the routine scope.
    pub fn declare_param(&mut self, name: &str, ty: &TypeRef) -> Result<u16> {
        debug_assert_eq!(self.depth, 0, "parameters are declared before any scope");
        self.declare(name, ty)
    }

    /// Bind `name` in the current scope and return its slot.
    ///
    /// Re-declaring a name with the same type in the same scope reuses the
    /// existing slot. A binding from an enclosing scope is shadowed until the
    /// current scope is popped.
    pub fn declare(&mut self, name: &str, ty: &TypeRef) -> Result<u16> {
        if let Some(existing) = self.bindings.get(name) {
            if existing.depth == self.depth {
                if existing.ty == *ty {
                    return Ok(existing.slot);
                }
            } else {
                self.shadowed
                    .push((self.depth, name.to_string(), existing.clone()));
            }
        }

        let slot = self.allocate(ty)?;
        trace!(variable = name, %ty, slot, depth = self.depth, "slot allocated");
        self.bindings.insert(
            name.to_string(),
            Binding {
                ty: ty.clone(),
                slot,
                depth: self.depth,
            },
        );
        self.used_names.insert(name.to_string());
        self.table.push(SlotEntry {
            name: name.to_string(),
            ty: ty.clone(),
            slot,
        });
        Ok(slot)
    }

    fn allocate(&mut self, ty: &TypeRef) -> Result<u16> {
        let slot = u16::try_from(self.next_slot).map_err(|_| LoweringError::OperandOverflow {
            what: "local slot",
            value: self.next_slot as usize,
        })?;
        self.next_slot += u32::from(ty.width().max(1));
        Ok(slot)
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Slot and declared type of a visible binding.
    pub fn lookup(&self, name: &str) -> Option<(u16, &TypeRef)> {
        self.bindings
            .get(name)
            .map(|binding| (binding.slot, &binding.ty))
    }

    /// Slot of the visible binding of `name` with type `ty`.
    pub fn require(&self, name: &str, ty: &TypeRef) -> Result<u16> {
        match self.bindings.get(name) {
            Some(binding) if binding.ty == *ty => Ok(binding.slot),
            _ => Err(LoweringError::UndeclaredVariable {
                name: name.to_string(),
                ty: ty.clone(),
                node: None,
            }),
        }
    }

    // ==========================================================================
    // Hidden Names
    // ==========================================================================

    /// Mark a name as taken so generated names avoid it.
    pub fn reserve(&mut self, name: &str) {
        if !self.used_names.contains(name) {
            self.used_names.insert(name.to_string());
        }
    }

    /// A fresh name starting with `base`, distinct from every name used in
    /// the routine so far. Deterministic for a given routine.
    pub fn unique_name(&mut self, base: &str) -> String {
        loop {
            let candidate = format!("{base}{}", self.name_counter);
            self.name_counter += 1;
            if !self.used_names.contains(&candidate) {
                self.used_names.insert(candidate.clone());
                return candidate;
            }
        }
    }

    // ==========================================================================
    // Results
    // ==========================================================================

    /// Number of slots the routine's frame needs.
    pub fn frame_size(&self) -> u32 {
        self.next_slot
    }

    pub fn table(&self) -> &[SlotEntry] {
        &self.table
    }

    /// Consume the manager, returning the slot table and frame size.
    pub fn finish(self) -> (Vec<SlotEntry>, u32) {
        (self.table, self.next_slot)
    }
}
