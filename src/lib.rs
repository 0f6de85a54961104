//! dqbench — data-quality benchmarking for stream processing engines
//!
//! Injects controlled, reproducible data-quality defects into sensor
//! time-series datasets and independently recomputes the tumbling-window
//! accuracy/completeness/timeliness metrics a Data Stream Management System
//! computes over the same data, so the engine's streaming output can be
//! verified window by window against a trusted offline reference.
//!
//! ```text
//! raw sensor CSV
//!    ↓ preprocess (split / extract / normalize)
//! per-sensor dataset
//!    ↓ inject (seeded, per-family RNG sub-streams)
//! degraded dataset ───────────────→ DSMS (external)
//!    ↓ quality (tumbling windows)        ↓
//! local WindowMetrics ──→ verify ←── engine result CSV
//! ```
//!
//! Everything is a single-pass, chunked batch computation: chunking bounds
//! memory and is invisible to window boundaries, which are defined over the
//! global row index.

pub mod bench;
pub mod config;
pub mod dataset;
pub mod inject;
pub mod preprocess;
pub mod quality;
pub mod verify;
