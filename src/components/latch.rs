use std::{cell::RefCell, rc::Rc};

use crate::{
    circuit_builder::{ops::*, CircuitBuilder, Connector},
    error::BuildError,
    GateKind, LogicWidth, WireId,
};

/// Cross-coupled NOR gates
///
/// Starts out with both outputs undefined; a set or reset pulse brings it
/// into a defined state. Releasing set and reset in the same round after
/// both were high makes it oscillate.
#[derive(Debug, Clone)]
pub struct SrLatch {
    pub set: WireId,
    pub reset: WireId,
    pub q: WireId,
    pub q_not: WireId,
}

impl SrLatch {
    pub fn new(builder: Rc<RefCell<CircuitBuilder>>) -> Result<Self, BuildError> {
        let set = Connector::new(builder.clone(), LogicWidth::MIN);
        let reset = Connector::new(builder, LogicWidth::MIN);
        Self::with_inputs(&set, &reset)
    }

    pub fn with_inputs(set: &Connector, reset: &Connector) -> Result<Self, BuildError> {
        let q = Connector::new(set.builder(), LogicWidth::MIN);
        let q_not = Connector::new(set.builder(), LogicWidth::MIN);
        q.drive_from(GateKind::Nor, &[reset, &q_not])?;
        q_not.drive_from(GateKind::Nor, &[set, &q])?;
        Ok(Self {
            set: set.wire,
            reset: reset.wire,
            q: q.wire,
            q_not: q_not.wire,
        })
    }
}

/// Transparent while `enable` is high, holds `q` otherwise
#[derive(Debug, Clone)]
pub struct DLatch {
    pub data: WireId,
    pub enable: WireId,
    pub q: WireId,
}

impl DLatch {
    pub fn new(builder: Rc<RefCell<CircuitBuilder>>) -> Result<Self, BuildError> {
        let data = Connector::new(builder.clone(), LogicWidth::MIN);
        let enable = Connector::new(builder, LogicWidth::MIN);
        let set = and!(data, enable)?;
        let reset = and!(data.invert()?, enable)?;
        let latch = SrLatch::with_inputs(&set, &reset)?;
        Ok(Self {
            data: data.wire,
            enable: enable.wire,
            q: latch.q,
        })
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::{DLatch, SrLatch};
    use crate::{
        circuit_builder::CircuitBuilder, circuit_sim::*, Circuit, LogicBitState, WireId,
    };

    fn bit(circuit: &Circuit, wire: WireId) -> LogicBitState {
        circuit.get_wire_state(wire).unwrap().get_bit_state(0)
    }

    #[test]
    fn sr_latch_test() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let latch = SrLatch::new(builder.clone()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();

        circuit.set_wire_drive(latch.set, &false.into()).unwrap();
        circuit.set_wire_drive(latch.reset, &false.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Undefined);

        circuit.set_wire_drive(latch.set, &true.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic1);
        assert_eq!(bit(&circuit, latch.q_not), LogicBitState::Logic0);

        circuit.set_wire_drive(latch.set, &false.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic1);

        circuit.set_wire_drive(latch.reset, &true.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic0);
        assert_eq!(bit(&circuit, latch.q_not), LogicBitState::Logic1);
    }

    #[test]
    fn sr_latch_release_race_oscillates() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let latch = SrLatch::new(builder.clone()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();

        circuit.set_wire_drive(latch.set, &true.into()).unwrap();
        circuit.set_wire_drive(latch.reset, &true.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic0);
        assert_eq!(bit(&circuit, latch.q_not), LogicBitState::Logic0);

        circuit.set_wire_drive(latch.set, &false.into()).unwrap();
        circuit.set_wire_drive(latch.reset, &false.into()).unwrap();
        assert_eq!(
            circuit.run(100),
            RunResult::ReachedMaxSteps { max_steps: 100 }
        );
    }

    #[test]
    fn d_latch_test() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let latch = DLatch::new(builder.clone()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();

        circuit.set_wire_drive(latch.enable, &true.into()).unwrap();
        circuit.set_wire_drive(latch.data, &true.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic1);

        circuit.set_wire_drive(latch.enable, &false.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        circuit.set_wire_drive(latch.data, &false.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic1);

        circuit.set_wire_drive(latch.enable, &true.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        assert_eq!(bit(&circuit, latch.q), LogicBitState::Logic0);
    }

    #[test]
    fn d_latch_random_sequence() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let latch = DLatch::new(builder.clone()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        circuit.set_wire_drive(latch.enable, &true.into()).unwrap();
        circuit.set_wire_drive(latch.data, &false.into()).unwrap();
        assert!(circuit.run(100).is_finished());
        let mut stored = false;

        for _ in 0..200 {
            let data: bool = rng.gen();
            let enable: bool = rng.gen();
            circuit.set_wire_drive(latch.data, &data.into()).unwrap();
            assert!(circuit.run(100).is_finished());
            circuit.set_wire_drive(latch.enable, &enable.into()).unwrap();
            assert!(circuit.run(100).is_finished());
            if enable {
                stored = data;
            }
            assert_eq!(
                bit(&circuit, latch.q),
                LogicBitState::from_bool(stored),
                "data={data} enable={enable}"
            );
        }
    }
}
