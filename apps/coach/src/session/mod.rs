//! The interview session: state machine, timer, voice channel, evaluation
//! fan-out and the actor that runs them.

pub mod config;
pub mod controller;
pub mod evaluation;
pub mod report;
pub mod state;
pub mod timer;
pub mod voice;
