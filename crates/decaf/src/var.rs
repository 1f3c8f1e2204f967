//! Local variable bookkeeping.
//!
//! Slots follow VM rules: `long` and `double` occupy two adjacent slots.
//! A variable's type starts from the local-variable debug table when one
//! is present, otherwise from the first typed store, and is narrowed by
//! later uses. Display names come from the debug table or are generated
//! from the type's stem (`n`, `n2`, `s`, `arrayList`, ...) once types
//! have settled.

use ahash::AHashSet;

use crate::types::{Type, TypeStore, var_name};

/// Index of a variable in the method's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) u32);

/// One local variable.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Slot the variable lives in; `None` for a catch-handler variable
    /// until its `astore` binds it.
    pub slot: Option<u16>,
    pub ty: Type,
    /// Display name; `None` until the naming pass runs.
    pub name: Option<String>,
    /// Whether the declaration statement has been emitted.
    pub declared: bool,
    /// Typed by the debug table; the type never widens.
    pub from_debug: bool,
    pub is_parameter: bool,
}

/// The slot-indexed locals table.
#[derive(Debug, Default)]
pub struct Locals {
    slots: Vec<Option<VarId>>,
    vars: Vec<Variable>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0 as usize]
    }

    /// The variable currently occupying a slot.
    pub fn at_slot(&self, slot: u16) -> Option<VarId> {
        self.slots.get(slot as usize).copied().flatten()
    }

    /// Creates a variable and binds it to its slot (and the next one for
    /// two-word types).
    pub fn define(&mut self, slot: u16, ty: Type, name: Option<String>, from_debug: bool, is_parameter: bool) -> VarId {
        let id = VarId(u32::try_from(self.vars.len()).expect("variable count exceeds u32"));
        self.vars.push(Variable {
            slot: Some(slot),
            ty,
            name,
            declared: is_parameter,
            from_debug,
            is_parameter,
        });
        self.bind_slot(id, slot);
        id
    }

    /// Creates a variable not yet bound to a slot (a catch handler's
    /// exception variable before its `astore`).
    pub fn define_detached(&mut self, ty: Type) -> VarId {
        let id = VarId(u32::try_from(self.vars.len()).expect("variable count exceeds u32"));
        self.vars.push(Variable {
            slot: None,
            ty,
            name: None,
            declared: true,
            from_debug: false,
            is_parameter: false,
        });
        id
    }

    /// Binds a variable to a slot, claiming the adjacent slot too for
    /// two-word types.
    pub fn bind_slot(&mut self, id: VarId, slot: u16) {
        let ty = self.vars[id.0 as usize].ty;
        self.vars[id.0 as usize].slot = Some(slot);
        let width = if ty.size() == crate::types::TypeSize::Eight { 2 } else { 1 };
        let needed = slot as usize + width;
        if self.slots.len() < needed {
            self.slots.resize(needed, None);
        }
        self.slots[slot as usize] = Some(id);
        if width == 2 {
            self.slots[slot as usize + 1] = None;
        }
    }

    /// Narrows a variable's type toward `target`. Returns the refined
    /// type, or `None` when the constraint cannot be reconciled.
    pub fn narrow(&mut self, id: VarId, target: Type, store: &TypeStore) -> Option<Type> {
        let variable = &mut self.vars[id.0 as usize];
        let refined = variable.ty.cast(target, store)?;
        variable.ty = refined;
        Some(refined)
    }

    /// Widens a variable's type to cover a newly stored value. Debug-typed
    /// variables keep their declared type.
    pub fn unify_store(&mut self, id: VarId, value_ty: Type, store: &TypeStore) -> Option<Type> {
        let variable = &mut self.vars[id.0 as usize];
        if variable.from_debug {
            return Some(variable.ty);
        }
        let unified = value_ty.reversed_cast_to_widest(variable.ty, store)?;
        variable.ty = unified;
        Some(unified)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Assigns display names to every unnamed variable: the type stem,
    /// then `stem2`, `stem3`, ... on collision.
    pub fn assign_names(&mut self, store: &TypeStore) {
        let mut used: AHashSet<String> = self.vars.iter().filter_map(|v| v.name.clone()).collect();
        for variable in &mut self.vars {
            if variable.name.is_some() {
                continue;
            }
            let stem = var_name(variable.ty, store);
            let mut candidate = stem.clone();
            let mut counter = 1u32;
            while !used.insert(candidate.clone()) {
                counter += 1;
                candidate = format!("{stem}{counter}");
            }
            variable.name = Some(candidate);
        }
    }

    /// Display name after the naming pass; the raw stem beforehand.
    pub fn name(&self, id: VarId) -> &str {
        self.get(id).name.as_deref().unwrap_or("local")
    }
}
