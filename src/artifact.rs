//! Per-service startup artifact seam.
//!
//! Some services mount a generated file at a fixed path: the log pipeline,
//! for example, consumes a forwarder configuration derived from every
//! service's declared log files. The generator itself lives outside this
//! crate; the supervisor only owns the contract: the writer is invoked once
//! per service, immediately before its container is created, and a write
//! failure fails that one service's start without touching its siblings.

use crate::definition::LogSpec;
use async_trait::async_trait;
use std::collections::HashMap;

/// Everything a writer gets to work with: the service's identity, its
/// effective environment snapshot, and its declared log files.
#[derive(Debug, Clone)]
pub struct ArtifactContext {
    pub service: String,
    pub env: HashMap<String, String>,
    pub logs: Vec<LogSpec>,
}

/// Writes a service's startup artifact before its container is created.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    async fn write(
        &self,
        ctx: &ArtifactContext,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
