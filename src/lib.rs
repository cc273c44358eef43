//! Racetrack Environment Library
//!
//! A reinforcement-learning racetrack environment that can run against a
//! live simulator or headless.

pub mod simulation;
