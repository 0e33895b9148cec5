//! Bringing circuits described elsewhere into a [CircuitBuilder]

#[cfg(feature = "yosys-import")]
pub mod yosys;

use std::collections::HashMap;

use crate::circuit_builder::CircuitBuilder;
use crate::graph::WireId;

/// The port wires of an imported module, by port name
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleConnections {
    pub inputs: HashMap<Box<str>, WireId>,
    pub outputs: HashMap<Box<str>, WireId>,
}

/// A source of circuits that can be added to a builder
pub trait ModuleImporter {
    type Error;

    fn module_name(&self) -> &str;

    /// Adds the module's wires and gates to `builder`
    ///
    /// May leave `builder` half-populated on error; use
    /// [CircuitBuilder::import_module] to import atomically.
    fn import_into(&self, builder: &mut CircuitBuilder) -> Result<ModuleConnections, Self::Error>;
}
