//! HTTP read API over the risk pipeline: dashboard rows, supplier detail,
//! trend history, recent alerts and signal ingestion.

pub mod app;
