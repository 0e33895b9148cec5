use std::fmt::Debug;

pub type Step = u64;
pub type Steps = u64;

/// How a bounded propagation run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// No pending work was left after `after_steps` rounds
    Finished { after_steps: Steps },
    /// The budget ran out with work still pending; the circuit may oscillate
    ReachedMaxSteps { max_steps: Steps },
}

impl RunResult {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

/// A circuit that advances in discrete, synchronous propagation rounds
pub trait CircuitSim {
    type WireId: Clone + Copy + Eq + Debug;
    type State;
    type Error;

    /// Total number of rounds executed so far
    fn steps(&self) -> Step;
    fn work_left(&self) -> bool;

    /// Executes one propagation round
    fn step(&mut self);

    fn set_wire_drive(&mut self, wire: Self::WireId, state: &Self::State) -> Result<(), Self::Error>;
    fn get_wire_state(&self, wire: Self::WireId) -> Result<Self::State, Self::Error>;

    /// Steps until the circuit quiesces or `max_steps` rounds have executed
    fn run(&mut self, max_steps: Steps) -> RunResult {
        for steps in 0..max_steps {
            if self.work_left() {
                self.step();
            } else {
                return RunResult::Finished { after_steps: steps };
            };
        }
        if self.work_left() {
            log::debug!("still unsettled after {max_steps} steps");
            RunResult::ReachedMaxSteps { max_steps }
        } else {
            RunResult::Finished {
                after_steps: max_steps,
            }
        }
    }
}
