// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sizefit-engine — Compression backends and the budget pipeline.
//
// Local and remote compression backends behind one contract, the
// orchestrator that decides between a single artifact and a partitioned set,
// idempotency-aware retry for the remote protocol, and a background worker
// that reports completion over a channel.

pub mod backend;
pub mod orchestrator;
pub mod remote;
pub mod retry;
pub mod worker;

pub use backend::{Backend, CompressedDocument, CompressionBackend, LocalBackend};
pub use orchestrator::{CompressionOrchestrator, CompressionRequest};
pub use remote::RemoteBackend;
pub use worker::{CompressionTicket, CompressionWorker};
