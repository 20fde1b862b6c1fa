//! Label allocation and jump fixups.
//!
//! Jumps are emitted before their targets are known. Every jump operand is
//! recorded as a fixup against a [`Label`] and patched once the routine is
//! finished, when all labels must have been bound.

use stackweave_core::LoweringError;

use crate::bytecode::BytecodeChunk;

/// A jump target within one routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

impl Label {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// A 32-bit jump operand waiting for its label's position.
#[derive(Debug, Clone, Copy)]
struct Fixup {
    label: Label,
    /// Offset of the operand bytes.
    site: usize,
    /// Offset of the instruction the jump is relative to.
    origin: usize,
}

#[derive(Debug, Default)]
pub struct LabelTable {
    positions: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> Label {
        let id = self.positions.len() as u32;
        self.positions.push(None);
        Label(id)
    }

    /// Bind `label` to `offset`. A label is bound at most once.
    pub fn bind(&mut self, label: Label, offset: usize) {
        if let Some(slot) = self.positions.get_mut(label.0 as usize) {
            debug_assert!(slot.is_none(), "label {} bound twice", label.0);
            *slot = Some(offset);
        }
    }

    pub fn position(&self, label: Label) -> Option<usize> {
        self.positions.get(label.0 as usize).copied().flatten()
    }

    pub fn is_bound(&self, label: Label) -> bool {
        self.position(label).is_some()
    }

    pub fn add_fixup(&mut self, label: Label, site: usize, origin: usize) {
        self.fixups.push(Fixup {
            label,
            site,
            origin,
        });
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Patch every recorded jump operand with its relative offset.
    pub fn resolve(&self, chunk: &mut BytecodeChunk) -> Result<(), LoweringError> {
        for fixup in &self.fixups {
            let target = self
                .position(fixup.label)
                .ok_or(LoweringError::UnboundLabel { label: fixup.label.0 })?;
            let relative = i32::try_from(target as i64 - fixup.origin as i64).map_err(|_| {
                LoweringError::OperandOverflow {
                    what: "jump offset",
                    value: target.abs_diff(fixup.origin),
                }
            })?;
            chunk.patch_i32(fixup.site, relative);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{OpCode, Operand};

    #[test]
    fn labels_are_sequential() {
        let mut labels = LabelTable::new();
        assert_eq!(labels.new_label(), Label(0));
        assert_eq!(labels.new_label(), Label(1));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn bind_and_resolve_forward_jump() {
        let mut labels = LabelTable::new();
        let mut chunk = BytecodeChunk::new();
        let end = labels.new_label();

        chunk.write_op(OpCode::Jump);
        labels.add_fixup(end, 1, 0);
        chunk.write_i32(0);
        chunk.write_op(OpCode::PushOne);
        labels.bind(end, chunk.current_offset());
        chunk.write_op(OpCode::ReturnVoid);

        labels.resolve(&mut chunk).unwrap();
        assert_eq!(chunk.instructions()[0].operand, Operand::Jump(6));
    }

    #[test]
    fn unbound_label_is_an_error() {
        let mut labels = LabelTable::new();
        let mut chunk = BytecodeChunk::new();
        let dangling = labels.new_label();
        chunk.write_op(OpCode::Jump);
        labels.add_fixup(dangling, 1, 0);
        chunk.write_i32(0);

        assert_eq!(
            labels.resolve(&mut chunk),
            Err(LoweringError::UnboundLabel { label: 0 })
        );
        assert!(!labels.is_bound(dangling));
    }
}
