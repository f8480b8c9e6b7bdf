//! Observability setup for Parley: structured logging via `tracing` and an
//! optional OpenTelemetry stdout exporter.

pub mod tracing_setup;
