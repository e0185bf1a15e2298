extern crate alloc;

use alloc::{
    boxed::Box,
    collections::BTreeMap,
    string::{String, ToString as _},
    vec::Vec,
};
use core::fmt;

use crate::{
    code::OpId,
    error::MachineErrorType,
    machine::{MachineStatus, RunState},
};

/// The behavior bound to an opcode.
///
/// An action receives the run state and the instruction's immediate
/// argument. It returns [`MachineStatus::Exited`] to stop the machine.
/// Any closure or function with the right signature is an `Action`.
pub trait Action: Send + Sync {
    /// Execute the instruction.
    fn execute(&self, rs: &mut RunState<'_>, arg: i64) -> Result<MachineStatus, MachineErrorType>;
}

impl<F> Action for F
where
    F: Fn(&mut RunState<'_>, i64) -> Result<MachineStatus, MachineErrorType> + Send + Sync,
{
    fn execute(&self, rs: &mut RunState<'_>, arg: i64) -> Result<MachineStatus, MachineErrorType> {
        self(rs, arg)
    }
}

/// The set of instructions known to a [`Machine`][crate::Machine].
///
/// Name→id, id→name and id→action are kept aligned: every id handed
/// out by [`register`](Self::register) has an entry in all three.
#[derive(Default)]
pub struct InstructionRegistry {
    ids: BTreeMap<String, OpId>,
    names: Vec<String>,
    actions: Vec<Box<dyn Action>>,
}

impl InstructionRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            ids: BTreeMap::new(),
            names: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Registers `action` under `name` and returns its id.
    ///
    /// Registering a name twice fails with
    /// [`MachineErrorType::AlreadyDefined`] and leaves the registry
    /// untouched.
    pub fn register<A>(&mut self, name: &str, action: A) -> Result<OpId, MachineErrorType>
    where
        A: Action + 'static,
    {
        if self.ids.contains_key(name) {
            return Err(MachineErrorType::AlreadyDefined(name.to_string()));
        }
        let id = OpId::new(self.names.len());
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.actions.push(Box::new(action));
        Ok(id)
    }

    /// Look up the id of an instruction by name.
    pub fn id(&self, name: &str) -> Option<OpId> {
        self.ids.get(name).copied()
    }

    /// Look up the name of an instruction by id.
    pub fn name(&self, id: OpId) -> Option<&str> {
        self.names.get(id.get()).map(String::as_str)
    }

    /// Look up the action bound to an id.
    pub fn action(&self, id: OpId) -> Option<&dyn Action> {
        self.actions.get(id.get()).map(|a| &**a)
    }

    /// The number of registered instructions.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Reports whether no instructions are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (OpId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (OpId::new(i), name.as_str()))
    }
}

impl fmt::Debug for InstructionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
