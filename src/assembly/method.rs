//! Method bodies: an instruction arena with a linear order and a try/catch table.
//!
//! A [`MethodBody`] owns every instruction ever created for it in an arena indexed by
//! [`InsnId`]. The executable program is the `order` vector, a sequence of ids that refer
//! into the arena. Deleting an instruction removes its id from the order but leaves the
//! arena slot in place, so ids stay valid and are never reused.
//!
//! # Editing
//!
//! Single mutations ([`MethodBody::push`], [`MethodBody::insert_before`],
//! [`MethodBody::remove`], [`MethodBody::replace`]) are available for construction and
//! small fixes. Optimization passes collect [`Edit`]s while scanning analysis results and
//! apply them in one go with [`MethodBody::apply`], which validates the whole batch
//! against the pre-edit order before changing anything.
//!
//! # Examples
//!
//! ```rust
//! use boxelide::assembly::{Edit, MethodBuilder, Opcode, PrimitiveType};
//!
//! let mut body = MethodBuilder::new("answer")
//!     .returns(PrimitiveType::Int)
//!     .const_int(42)
//!     .nop()
//!     .ret()
//!     .build()?;
//!
//! let nop = body.iter().find(|insn| insn.op == Opcode::Nop).map(|insn| insn.id).unwrap();
//! body.apply(vec![Edit::Remove(nop)])?;
//! assert_eq!(body.len(), 2);
//! # Ok::<(), boxelide::Error>(())
//! ```

use std::{collections::HashMap, fmt};

use crate::{
    assembly::{
        instruction::{InsnId, Instruction, LabelId, Opcode},
        types::TypeSig,
    },
    Error, Result,
};

/// A protected region and its handler.
///
/// The region covers every instruction placed after the `start` label and before the
/// `end` label. When an exception is raised inside it and `catch_type` matches (or is
/// `None`, catching everything), control transfers to `handler` with the operand stack
/// cleared down to the single exception reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Label opening the protected region
    pub start: LabelId,
    /// Label closing the protected region (exclusive)
    pub end: LabelId,
    /// Label of the handler entry point
    pub handler: LabelId,
    /// Caught class, or `None` for a catch-all handler
    pub catch_type: Option<String>,
}

/// A single pending modification of a [`MethodBody`].
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Remove the instruction from the order
    Remove(InsnId),
    /// Replace the instruction's opcode, keeping its id
    Replace(InsnId, Opcode),
    /// Insert a new instruction immediately before the given one
    InsertBefore(InsnId, Opcode),
}

impl Edit {
    /// The instruction this edit is anchored on.
    #[must_use]
    pub fn target(&self) -> InsnId {
        match self {
            Edit::Remove(id) | Edit::Replace(id, _) | Edit::InsertBefore(id, _) => *id,
        }
    }
}

/// Code of a single method.
#[derive(Debug, Clone)]
pub struct MethodBody {
    name: String,
    params: Vec<TypeSig>,
    return_type: TypeSig,
    max_locals: u16,
    arena: Vec<Instruction>,
    order: Vec<InsnId>,
    /// Position of each arena entry in `order`, `None` once removed
    positions: Vec<Option<usize>>,
    try_catch: Vec<TryCatchBlock>,
    next_label: u32,
}

impl MethodBody {
    /// Creates an empty method body.
    ///
    /// Parameters occupy local slots `0..params.len()`.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<TypeSig>, return_type: TypeSig) -> Self {
        let max_locals = u16::try_from(params.len()).unwrap_or(u16::MAX);
        MethodBody {
            name: name.into(),
            params,
            return_type,
            max_locals,
            arena: Vec::new(),
            order: Vec::new(),
            positions: Vec::new(),
            try_catch: Vec::new(),
            next_label: 0,
        }
    }

    /// Name of the method, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter types.
    #[must_use]
    pub fn params(&self) -> &[TypeSig] {
        &self.params
    }

    /// Declared return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeSig {
        &self.return_type
    }

    /// Number of local slots, including parameters.
    #[must_use]
    pub fn max_locals(&self) -> usize {
        usize::from(self.max_locals)
    }

    /// Number of live instructions, labels included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the body holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the instruction at the given position.
    #[must_use]
    pub fn instruction_at(&self, position: usize) -> Option<&Instruction> {
        self.order.get(position).map(|id| &self.arena[id.index()])
    }

    /// Returns a live instruction by id.
    #[must_use]
    pub fn get(&self, id: InsnId) -> Option<&Instruction> {
        self.position_of(id).map(|_| &self.arena[id.index()])
    }

    /// Returns the current position of a live instruction.
    #[must_use]
    pub fn position_of(&self, id: InsnId) -> Option<usize> {
        self.positions.get(id.index()).copied().flatten()
    }

    /// Iterates over the live instructions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.order.iter().map(|id| &self.arena[id.index()])
    }

    /// The protected regions of this method.
    #[must_use]
    pub fn try_catch_blocks(&self) -> &[TryCatchBlock] {
        &self.try_catch
    }

    /// Registers a protected region.
    pub fn add_try_catch(&mut self, block: TryCatchBlock) {
        self.try_catch.push(block);
    }

    /// Allocates a fresh label id. The label still has to be placed with
    /// [`Opcode::Label`] before any branch can use it.
    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    /// Maps every placed label to its position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if a label is placed more than once.
    pub fn label_positions(&self) -> Result<HashMap<LabelId, usize>> {
        let mut labels = HashMap::new();
        for (position, insn) in self.iter().enumerate() {
            if let Opcode::Label(label) = insn.op {
                if labels.insert(label, position).is_some() {
                    return Err(malformed_error!(
                        "Label {} is placed twice in '{}'",
                        label,
                        self.name
                    ));
                }
            }
        }
        Ok(labels)
    }

    /// Appends an instruction and returns its id.
    pub fn push(&mut self, op: Opcode) -> InsnId {
        let id = self.allocate(op);
        self.order.push(id);
        self.positions[id.index()] = Some(self.order.len() - 1);
        id
    }

    /// Inserts an instruction immediately before `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEdit`] if `anchor` is not live.
    pub fn insert_before(&mut self, anchor: InsnId, op: Opcode) -> Result<InsnId> {
        let position = self.live_position(anchor)?;
        let id = self.allocate(op);
        self.order.insert(position, id);
        self.reindex();
        Ok(id)
    }

    /// Removes a live instruction from the order and returns its opcode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEdit`] if the instruction is not live or is a label.
    pub fn remove(&mut self, id: InsnId) -> Result<Opcode> {
        self.apply(vec![Edit::Remove(id)])?;
        Ok(self.arena[id.index()].op.clone())
    }

    /// Replaces the opcode of a live instruction, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEdit`] if the instruction is not live.
    pub fn replace(&mut self, id: InsnId, op: Opcode) -> Result<Opcode> {
        self.live_position(id)?;
        self.track_locals(&op);
        Ok(std::mem::replace(&mut self.arena[id.index()].op, op))
    }

    /// Applies a batch of edits atomically.
    ///
    /// All anchors are resolved against the order as it was before the batch. Inserted
    /// instructions land in the order their edits appear. Either every edit is applied,
    /// or none is and an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEdit`] if an edit names an instruction that is not live,
    /// removes a label, or if two edits both remove or replace the same instruction.
    pub fn apply(&mut self, edits: Vec<Edit>) -> Result<usize> {
        let mut removed = vec![false; self.arena.len()];
        let mut rewritten = vec![false; self.arena.len()];
        for edit in &edits {
            let target = edit.target();
            self.live_position(target)?;
            match edit {
                Edit::Remove(id) | Edit::Replace(id, _) => {
                    if rewritten[id.index()] {
                        return Err(Error::InvalidEdit(format!(
                            "instruction {id} of '{}' is edited twice in one batch",
                            self.name
                        )));
                    }
                    rewritten[id.index()] = true;
                    if matches!(edit, Edit::Remove(_)) {
                        if matches!(self.arena[id.index()].op, Opcode::Label(_)) {
                            return Err(Error::InvalidEdit(format!(
                                "label {id} of '{}' cannot be removed",
                                self.name
                            )));
                        }
                        removed[id.index()] = true;
                    }
                }
                Edit::InsertBefore(..) => {}
            }
        }

        let count = edits.len();
        let mut inserted: HashMap<InsnId, Vec<Opcode>> = HashMap::new();
        for edit in edits {
            match edit {
                Edit::Remove(_) => {}
                Edit::Replace(id, op) => {
                    self.track_locals(&op);
                    self.arena[id.index()].op = op;
                }
                Edit::InsertBefore(anchor, op) => inserted.entry(anchor).or_default().push(op),
            }
        }

        let old_order = std::mem::take(&mut self.order);
        let mut order = Vec::with_capacity(old_order.len());
        for id in old_order {
            if let Some(ops) = inserted.remove(&id) {
                for op in ops {
                    order.push(self.allocate(op));
                }
            }
            if !removed[id.index()] {
                order.push(id);
            }
        }
        self.order = order;
        self.reindex();
        Ok(count)
    }

    fn allocate(&mut self, op: Opcode) -> InsnId {
        let id = InsnId(u32::try_from(self.arena.len()).unwrap_or(u32::MAX));
        self.track_locals(&op);
        self.arena.push(Instruction { id, op });
        self.positions.push(None);
        id
    }

    fn track_locals(&mut self, op: &Opcode) {
        if let Opcode::Load(slot) | Opcode::Store(slot) = op {
            self.max_locals = self.max_locals.max(slot.saturating_add(1));
        }
    }

    fn live_position(&self, id: InsnId) -> Result<usize> {
        self.position_of(id).ok_or_else(|| {
            Error::InvalidEdit(format!(
                "instruction {id} is not part of '{}'",
                self.name
            ))
        })
    }

    fn reindex(&mut self) {
        self.positions.iter_mut().for_each(|slot| *slot = None);
        for (position, id) in self.order.iter().enumerate() {
            self.positions[id.index()] = Some(position);
        }
    }
}

impl fmt::Display for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        writeln!(f, ") -> {}", self.return_type)?;
        for insn in self.iter() {
            writeln!(f, "{insn}")?;
        }
        for block in &self.try_catch {
            writeln!(
                f,
                "  try {}..{} catch {} -> {}",
                block.start,
                block.end,
                block.catch_type.as_deref().unwrap_or("*"),
                block.handler
            )?;
        }
        Ok(())
    }
}
