//! Engine registration shared by variables, constraints and objectives.
//!
//! An entity may be registered with any number of engines but is assigned to at most
//! one of them at a time: the engine whose solution its values currently reflect.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::engine::EngineState;
use crate::error::{Error, Result};
use crate::ids::EngineId;

/// Non-owning back-reference from an entity to an engine.
#[derive(Debug, Clone)]
pub(crate) struct EngineLink {
    pub(crate) id: EngineId,
    pub(crate) state: Weak<RefCell<EngineState>>,
}

#[derive(Debug, Default)]
pub(crate) struct Registration {
    engines: Vec<EngineLink>,
    assigned: Option<(EngineId, usize)>,
}

impl Registration {
    pub(crate) fn register(&mut self, link: &EngineLink, label: &str) -> Result<()> {
        if self.is_registered(link.id) {
            return Err(Error::registration(format!(
                "{label} is already registered with engine {}",
                link.id
            )));
        }
        self.engines.push(link.clone());
        Ok(())
    }

    pub(crate) fn unregister(&mut self, engine: EngineId, label: &str) -> Result<()> {
        let Some(position) = self.engines.iter().position(|l| l.id == engine) else {
            return Err(Error::registration(format!(
                "{label} is not registered with engine {engine}"
            )));
        };
        self.engines.remove(position);
        if matches!(self.assigned, Some((id, _)) if id == engine) {
            self.assigned = None;
        }
        Ok(())
    }

    /// Point the entity at `offset` in `engine`.
    pub(crate) fn assign(&mut self, engine: EngineId, offset: usize, label: &str) -> Result<()> {
        if !self.is_registered(engine) {
            return Err(Error::registration(format!(
                "{label} cannot be assigned to engine {engine} without being registered"
            )));
        }
        match self.assigned {
            Some((id, _)) if id != engine => Err(Error::registration(format!(
                "{label} is already assigned to engine {id}"
            ))),
            Some((_, current)) if current != offset => Err(Error::registration(format!(
                "{label} is already assigned to offset {current} of engine {engine}"
            ))),
            _ => {
                self.assigned = Some((engine, offset));
                Ok(())
            }
        }
    }

    /// Move the assignment to `engine` after it produced a solution.
    pub(crate) fn transfer(&mut self, engine: EngineId, offset: usize) {
        self.assigned = Some((engine, offset));
    }

    pub(crate) fn is_registered(&self, engine: EngineId) -> bool {
        self.engines.iter().any(|l| l.id == engine)
    }

    pub(crate) fn is_assigned(&self) -> bool {
        self.assigned.is_some()
    }

    pub(crate) fn assigned(&self) -> Option<(EngineId, usize)> {
        self.assigned
    }

    pub(crate) fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Live engines in registration order.
    pub(crate) fn engines(&self) -> Vec<Rc<RefCell<EngineState>>> {
        self.engines.iter().filter_map(|l| l.state.upgrade()).collect()
    }
}

/// Access to an entity's registration record, with the protocol built on top.
pub(crate) trait Registered {
    fn with_registration<R>(&self, f: impl FnOnce(&mut Registration) -> R) -> R;

    /// Human-readable identification for error messages.
    fn label(&self) -> String;

    fn unregister(&self, engine: EngineId) -> Result<()> {
        let label = self.label();
        self.with_registration(|r| r.unregister(engine, &label))
    }

    /// Register with `link` and take the assignment unless another engine holds it.
    fn attach(&self, link: &EngineLink, offset: usize) -> Result<()> {
        let label = self.label();
        self.with_registration(|r| {
            r.register(link, &label)?;
            if !r.is_assigned() {
                r.assign(link.id, offset, &label)?;
            }
            Ok(())
        })
    }

    fn is_registered_with(&self, engine: EngineId) -> bool {
        self.with_registration(|r| r.is_registered(engine))
    }

    fn engines(&self) -> Vec<Rc<RefCell<EngineState>>> {
        self.with_registration(|r| r.engines())
    }
}
