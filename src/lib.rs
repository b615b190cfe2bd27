//! animforge library crate
//!
//! Turns a topic description into a rendered animation: an LLM plans and
//! writes the scene, an external renderer turns it into video, and failed
//! renders are diagnosed and routed to a targeted fix prompt.
//!
//! The diagnosis engine (`diagnose`) is pure and total; everything with I/O
//! lives under `llm` and `pipeline`.

pub mod config;
pub mod diagnose;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod player;
pub mod util;
