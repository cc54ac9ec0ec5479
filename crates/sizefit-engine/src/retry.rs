// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine with exponential backoff + jitter for the remote backend.
//
// Classifies errors into Transient (auto-retry), UserAction (wait for user),
// and Permanent (give up). Only transient errors in idempotent phases are
// retried; task creation never is.

use std::future::Future;
use std::time::Duration;

use sizefit_core::config::RetrySettings;
use sizefit_core::error::{Result, SizefitError};
use sizefit_core::types::{ErrorClass, RemotePhase};
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry — error is permanent, user action is needed, or the
    /// phase cannot be repeated safely.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a `SizefitError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &SizefitError) -> ErrorClass {
    match err {
        SizefitError::Backend { detail, .. } => classify_backend_detail(detail),
        SizefitError::Worker(_) => ErrorClass::Transient,

        SizefitError::Configuration(_) | SizefitError::OversizedPage { .. } => {
            ErrorClass::UserAction
        }

        SizefitError::ImageDecode { .. }
        | SizefitError::Pdf(_)
        | SizefitError::Serialization(_)
        | SizefitError::Json(_) => ErrorClass::Permanent,

        SizefitError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Transient,
        },
    }
}

/// Classify a remote failure from its detail string.
fn classify_backend_detail(detail: &str) -> ErrorClass {
    let lower = detail.to_ascii_lowercase();

    if lower.starts_with("http 401") || lower.starts_with("http 403") {
        return ErrorClass::UserAction;
    }

    if lower.starts_with("http 408") || lower.starts_with("http 429") || lower.starts_with("http 5") {
        return ErrorClass::Transient;
    }

    // Remaining client errors and unreadable replies will not improve.
    if lower.starts_with("http 4") || lower.starts_with("invalid response") {
        return ErrorClass::Permanent;
    }

    // Timeouts, refused or reset connections, and anything unrecognised.
    ErrorClass::Transient
}

/// Decide whether to retry a failure of `phase` after `attempt` retries.
pub fn should_retry(
    err: &SizefitError,
    phase: RemotePhase,
    attempt: u32,
    config: &RetryConfig,
) -> RetryDecision {
    let class = classify_error(err);

    if !phase.is_idempotent() {
        info!(%phase, "phase creates server-side state — not retrying");
        return RetryDecision::GiveUp(class);
    }

    match class {
        ErrorClass::Permanent => {
            info!(%phase, "permanent error — not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::UserAction => {
            info!(%phase, "user action required — not auto-retrying");
            RetryDecision::GiveUp(ErrorClass::UserAction)
        }
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                if config.max_retries > 0 {
                    warn!(%phase, attempt, max = config.max_retries, "retry limit exhausted");
                }
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(%phase, attempt, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// Run `operation` for `phase`, retrying as [`should_retry`] allows.
///
/// The operation is rebuilt for every attempt, so request bodies that are
/// consumed on send (such as multipart forms) are recreated each time.
pub async fn with_retry<T, F, Fut>(
    phase: RemotePhase,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => match should_retry(&err, phase, attempt, config) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(%phase, attempt, error = %err, "remote call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            },
        }
    }
}

/// Compute exponential backoff delay with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay)
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));

    let jitter_ms = jitter(base_ms, attempt);
    let total_ms = exp_ms.saturating_add(jitter_ms);
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);

    Duration::from_millis(capped_ms)
}

/// Deterministic jitter in [0, base) derived from the attempt number.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
