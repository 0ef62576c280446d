use crate::bytecode::load_error::LoadError;
use crate::bytecode::op::Op;
use serde::{Deserialize, Serialize};

/// An ordered instruction sequence; the index of an instruction is its
/// address.
///
/// While instructions are appended the program keeps two auxiliary index
/// lists: where the `LABEL` instructions sit, and which instructions carry a
/// label argument that still needs an address. `resolve_addresses` runs once
/// after the last append and before the first fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    ops: Vec<Op>,
    label_indices: Vec<usize>,
    resolve_indices: Vec<usize>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Append an instruction, classifying it for the resolution pass.
    pub fn add(&mut self, op: Op) {
        let index = self.ops.len();
        if op.defined_label().is_some() {
            self.label_indices.push(index);
        } else if op.label_ref().is_some() {
            self.resolve_indices.push(index);
        }
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn op_at(&self, addr: usize) -> Option<&Op> {
        self.ops.get(addr)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Resolve every label reference to the address of the first `LABEL`
    /// whose name matches, in program order. A reference with no matching
    /// label aborts the load. Resolving an already-resolved program is a
    /// no-op rewrite of the same addresses.
    pub fn resolve_addresses(&mut self) -> Result<(), LoadError> {
        let labels: Vec<(usize, String)> = self
            .label_indices
            .iter()
            .filter_map(|&i| self.ops[i].defined_label().map(|l| (i, l.to_string())))
            .collect();

        for &index in &self.resolve_indices {
            let op = &mut self.ops[index];
            let target = match op.label_ref() {
                Some(label) => label.to_string(),
                None => continue,
            };
            match labels.iter().find(|(_, label)| *label == target) {
                Some(&(addr, _)) => op.set_addr(addr),
                None => {
                    return Err(LoadError::unresolved_label(index, op.name(), target));
                }
            }
        }
        Ok(())
    }

    /// Encode the program as compact postcard bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LoadError> {
        postcard::to_allocvec(self).map_err(|e| LoadError::bad_binary(e.to_string()))
    }

    /// Decode a program from postcard bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Program, LoadError> {
        postcard::from_bytes(bytes).map_err(|e| LoadError::bad_binary(e.to_string()))
    }
}
