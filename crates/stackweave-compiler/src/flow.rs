//! Jump-target records of the control constructs being generated.
//!
//! Every loop and switch pushes a [`FlowRecord`] while its body is lowered
//! and pops it exactly once when generation leaves the construct. `break`,
//! `continue` and the switch-default redirect marker find their targets here.

use crate::emit::Label;

/// What kind of construct a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Loop,
    Switch,
}

/// Jump targets of one active control construct.
///
/// For loops, `body_exit` is the continue target (the update section). For
/// switches, `body_exit` is the default case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub kind: FlowKind,
    pub label: Option<String>,
    pub entry: Label,
    pub body_entry: Label,
    pub body_exit: Label,
    pub exit: Label,
}

#[derive(Debug, Default)]
pub struct FlowTracker {
    records: Vec<FlowRecord>,
}

impl FlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a record and return its index.
    pub fn push(&mut self, record: FlowRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn pop(&mut self) -> Option<FlowRecord> {
        self.records.pop()
    }

    pub fn innermost(&self) -> Option<&FlowRecord> {
        self.records.last()
    }

    /// Target of a `break`: the labeled construct, or the innermost one.
    pub fn find_breakable(&self, label: Option<&str>) -> Option<(usize, &FlowRecord)> {
        self.records
            .iter()
            .enumerate()
            .rev()
            .find(|(_, record)| match label {
                Some(label) => record.label.as_deref() == Some(label),
                None => true,
            })
    }

    /// Target of a `continue`: the labeled loop, or the innermost loop.
    pub fn find_loop(&self, label: Option<&str>) -> Option<(usize, &FlowRecord)> {
        self.records
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, record)| record.kind == FlowKind::Loop)
            .find(|(_, record)| label.is_none() || record.label.as_deref() == label)
    }

    /// Target of a default redirect, with the record's index.
    pub fn innermost_switch(&self) -> Option<(usize, &FlowRecord)> {
        self.records
            .iter()
            .enumerate()
            .rev()
            .find(|(_, record)| record.kind == FlowKind::Switch)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
