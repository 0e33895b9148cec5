//! Reusable circuits built gate by gate through [Connector](crate::circuit_builder::Connector)

pub mod adder;
pub mod latch;
