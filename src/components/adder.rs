use std::{cell::RefCell, rc::Rc};

use crate::{
    circuit_builder::{ops::*, CircuitBuilder, Connector},
    circuit_sim::CircuitSim,
    error::{BuildError, SimulationError},
    Circuit, LogicState, LogicWidth, WireId,
};

struct FullAdder {
    sum: Connector,
    cout: Connector,
}

fn full_adder(a: Connector, b: Connector, cin: Connector) -> Result<FullAdder, BuildError> {
    let sum = xor!(a, b, cin)?;
    let cout = or!(and!(a, b)?, and!(a, cin)?, and!(b, cin)?)?;
    Ok(FullAdder { sum, cout })
}

/// A chain of 1-bit full adders over two operand wires
///
/// Operands and sums travel as `u64`, so the adder is at most 64 lines wide.
#[derive(Debug, Clone)]
pub struct RippleCarryAdder {
    width: LogicWidth,
    pub input_a: WireId,
    pub input_b: WireId,
    pub cin: WireId,
    pub sum: WireId,
    pub cout: WireId,
}

impl RippleCarryAdder {
    pub const MAX_WIDTH: u32 = u64::BITS;

    pub fn new(builder: Rc<RefCell<CircuitBuilder>>, width: LogicWidth) -> Result<Self, BuildError> {
        if width.get() > Self::MAX_WIDTH {
            return Err(BuildError::InvalidWidth(width.get()));
        }
        let a = Connector::new(builder.clone(), width);
        let b = Connector::new(builder.clone(), width);
        let cin = Connector::new(builder, LogicWidth::MIN);

        let mut carry = cin.clone();
        let mut sums = Vec::with_capacity(width.get() as usize);
        for i in 0..width.get() {
            let a_i = a.slice(i, LogicWidth::MIN)?;
            let b_i = b.slice(i, LogicWidth::MIN)?;
            let FullAdder { sum, cout } = full_adder(a_i, b_i, carry)?;
            sums.push(sum);
            carry = cout;
        }
        let sum = merge(sums.iter().collect())?;

        Ok(Self {
            width,
            input_a: a.wire,
            input_b: b.wire,
            cin: cin.wire,
            sum: sum.wire,
            cout: carry.wire,
        })
    }

    pub fn width(&self) -> LogicWidth {
        self.width
    }

    pub fn set(&self, circuit: &mut Circuit, a: u64, b: u64, cin: bool) -> Result<(), SimulationError> {
        circuit.set_wire_drive(self.input_a, &LogicState::from_u64(a))?;
        circuit.set_wire_drive(self.input_b, &LogicState::from_u64(b))?;
        circuit.set_wire_drive(self.cin, &cin.into())
    }

    /// Sum and carry out, or `None` while any of their lines is X or Z
    pub fn read(&self, circuit: &Circuit) -> Result<Option<(u64, bool)>, SimulationError> {
        let sum = circuit
            .get_wire_state(self.sum)?
            .to_unsigned::<u64>(self.width);
        let cout = circuit.get_wire_state(self.cout)?.get_bit_state(0).to_bool();
        Ok(sum.zip(cout))
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::{
        circuit_builder::{CircuitBuilder, Connector},
        circuit_sim::CircuitSim,
        Circuit, LogicWidth,
    };
    use std::{cell::RefCell, rc::Rc};

    use super::{full_adder, RippleCarryAdder};

    fn test_adder(a: bool, b: bool, cin: bool) {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let ca = Connector::new(builder.clone(), LogicWidth::MIN);
        let cb = Connector::new(builder.clone(), LogicWidth::MIN);
        let ccin = Connector::new(builder.clone(), LogicWidth::MIN);
        let (ia, ib, icin) = (ca.wire, cb.wire, ccin.wire);
        let adder = full_adder(ca, cb, ccin).unwrap();

        let mut circuit = builder.borrow().build().unwrap();
        circuit.set_wire_drive(ia, &a.into()).unwrap();
        circuit.set_wire_drive(ib, &b.into()).unwrap();
        circuit.set_wire_drive(icin, &cin.into()).unwrap();
        assert!(circuit.run(100).is_finished());

        let bit = |wire: crate::WireId| circuit.get_wire_state(wire).unwrap().get_bit_state(0).to_bool();
        assert_eq!(bit(adder.sum.wire), Some(a ^ b ^ cin));
        assert_eq!(
            bit(adder.cout.wire),
            Some((a && b) || (a && cin) || (b && cin))
        );
    }

    #[test]
    fn adder_tests() {
        test_adder(false, false, false);
        test_adder(true, false, false);
        test_adder(false, true, false);
        test_adder(true, true, false);
        test_adder(false, false, true);
        test_adder(true, false, true);
        test_adder(false, true, true);
        test_adder(true, true, true);
    }

    fn test_rca_add(circuit: &mut Circuit, rca: &RippleCarryAdder, a: u64, b: u64, cin: bool) {
        let bits = rca.width().get();
        let overflow = 1u128 << bits;
        rca.set(circuit, a, b, cin).unwrap();
        assert!(circuit.run(1000).is_finished());

        let expected = a as u128 + b as u128 + cin as u128;
        let expected_sum = (expected % overflow) as u64;
        let expected_cout = expected >= overflow;
        assert_eq!(
            rca.read(circuit).unwrap(),
            Some((expected_sum, expected_cout)),
            "{a} + {b} + {cin} with {bits} bits"
        );
    }

    fn rca_tests(bits: u32) {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let rca = RippleCarryAdder::new(builder.clone(), LogicWidth::new(bits).unwrap()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mask = u64::MAX >> (64 - bits);
        for _ in 0..100 {
            let a = rng.gen::<u64>() & mask;
            let b = rng.gen::<u64>() & mask;
            test_rca_add(&mut circuit, &rca, a, b, rng.gen());
        }
        test_rca_add(&mut circuit, &rca, mask, 1, false);
    }

    #[test]
    fn rca_16_bits() {
        rca_tests(16);
    }

    #[test]
    fn rca_across_word_boundary() {
        rca_tests(40);
    }

    #[test]
    fn rca_64_bits_carries_out() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let rca = RippleCarryAdder::new(builder.clone(), LogicWidth::new(64).unwrap()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();
        test_rca_add(&mut circuit, &rca, u64::MAX, 1, false);
        test_rca_add(&mut circuit, &rca, u64::MAX, u64::MAX, true);
    }

    #[test]
    fn rca_wider_than_u64_is_rejected() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        assert_eq!(
            RippleCarryAdder::new(builder.clone(), LogicWidth::new(65).unwrap()).unwrap_err(),
            crate::BuildError::InvalidWidth(65)
        );
        assert_eq!(builder.borrow().wire_count(), 0);
    }

    #[test]
    fn floating_carry_poisons_the_sum() {
        let builder = Rc::new(RefCell::new(CircuitBuilder::default()));
        let rca = RippleCarryAdder::new(builder.clone(), LogicWidth::new(4).unwrap()).unwrap();
        let mut circuit = builder.borrow().build().unwrap();
        circuit
            .set_wire_drive(rca.input_a, &crate::LogicState::from_int(3))
            .unwrap();
        circuit
            .set_wire_drive(rca.input_b, &crate::LogicState::from_int(4))
            .unwrap();
        assert!(circuit.run(1000).is_finished());
        assert_eq!(rca.read(&circuit).unwrap(), None);
    }
}
