//! Ordered selector-candidate resolution.
//!
//! The automated UI ships no API contract and its DOM changes often, so
//! every uncertain element (search box, attach control, send button, ...)
//! is described as an ordered list of candidate selectors. Resolution tries
//! each candidate in turn with its own bounded wait and stops at the first
//! match; cosmetic DOM changes only ever require extending a candidate
//! list, never rewriting workflow logic.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Interval between presence probes while a candidate's budget lasts.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Minimal page capability needed to resolve selectors.
#[async_trait]
pub trait ElementProbe: Send + Sync {
	/// Returns whether an element matching `selector` currently exists.
	async fn is_present(&self, selector: &str) -> bool;
}

/// Resolves the first present candidate, trying strictly in order.
///
/// Each candidate is polled for up to `per_candidate` before the next one is
/// tried; a hit short-circuits the remaining candidates. Fails with
/// [`EngineError::ElementNotFound`] only once every candidate's budget is
/// exhausted.
pub async fn resolve_first<P: ElementProbe + ?Sized>(
	probe: &P,
	element: &'static str,
	candidates: &[&str],
	per_candidate: Duration,
) -> Result<String> {
	for candidate in candidates {
		let deadline = Instant::now() + per_candidate;
		loop {
			if probe.is_present(candidate).await {
				debug!(target: "ticketry.selector", element, selector = candidate, "candidate resolved");
				return Ok((*candidate).to_string());
			}
			if Instant::now() >= deadline {
				break;
			}
			sleep(POLL_INTERVAL).await;
		}
	}
	debug!(target: "ticketry.selector", element, candidates = candidates.len(), "no candidate matched");
	Err(EngineError::ElementNotFound {
		element,
		candidates: candidates.len(),
	})
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	struct FixedProbe {
		present: HashSet<&'static str>,
	}

	#[async_trait]
	impl ElementProbe for FixedProbe {
		async fn is_present(&self, selector: &str) -> bool {
			self.present.contains(selector)
		}
	}

	#[tokio::test(start_paused = true)]
	async fn returns_first_present_candidate_without_draining_later_budgets() {
		let probe = FixedProbe {
			present: HashSet::from(["b"]),
		};
		let started = Instant::now();
		let resolved = resolve_first(&probe, "thing", &["a", "b", "c"], Duration::from_secs(3))
			.await
			.unwrap();
		assert_eq!(resolved, "b");
		// One full budget for "a", immediate hit on "b", "c" never tried.
		assert!(started.elapsed() < Duration::from_secs(6));
	}

	#[tokio::test(start_paused = true)]
	async fn fails_with_not_found_after_all_candidates() {
		let probe = FixedProbe {
			present: HashSet::new(),
		};
		let err = resolve_first(&probe, "thing", &["a", "b", "c"], Duration::from_millis(300))
			.await
			.unwrap_err();
		match err {
			EngineError::ElementNotFound { element, candidates } => {
				assert_eq!(element, "thing");
				assert_eq!(candidates, 3);
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn empty_candidate_list_fails_immediately() {
		let probe = FixedProbe {
			present: HashSet::new(),
		};
		let err = resolve_first(&probe, "thing", &[], Duration::from_secs(3))
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::ElementNotFound { candidates: 0, .. }));
	}
}
