use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Get the inner u32 value.
            pub fn inner(self) -> u32 {
                self.0
            }

            /// Create an ID from a u32 value.
            pub fn new(value: u32) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id_type!(VariableId);
define_id_type!(ConstraintId);
define_id_type!(ObjectiveId);
define_id_type!(ModelId);
define_id_type!(EngineId);

#[derive(Debug, Default)]
struct Counters {
    variable: Cell<u32>,
    constraint: Cell<u32>,
    objective: Cell<u32>,
    model: Cell<u32>,
    engine: Cell<u32>,
}

fn bump(counter: &Cell<u32>) -> u32 {
    let value = counter.get();
    counter.set(value + 1);
    value
}

/// Hands out creation-order ids for one model graph.
///
/// Cloning shares the counters. Variables order by these ids, so every entity that
/// ends up in the same expression must come from the same allocator.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: Rc<Counters>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_variable(&self) -> VariableId {
        VariableId(bump(&self.counters.variable))
    }

    pub fn next_constraint(&self) -> ConstraintId {
        ConstraintId(bump(&self.counters.constraint))
    }

    pub fn next_objective(&self) -> ObjectiveId {
        ObjectiveId(bump(&self.counters.objective))
    }

    pub fn next_model(&self) -> ModelId {
        ModelId(bump(&self.counters.model))
    }

    pub fn next_engine(&self) -> EngineId {
        EngineId(bump(&self.counters.engine))
    }
}
