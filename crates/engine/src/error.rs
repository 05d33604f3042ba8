//! Engine error taxonomy shared across queue, session and workflow modules.

use thiserror::Error;

/// Errors surfaced by the automation engine.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Browser process could not be started (configuration problem).
	#[error("failed to launch browser: {0}")]
	Launch(String),

	/// A previously live session was found disconnected.
	///
	/// The built-in shared manager recovers from this transparently (a dead
	/// cached session is discarded and relaunched, and a failed relaunch
	/// surfaces as [`EngineError::Launch`]), so it never emits this variant
	/// itself. It is part of the taxonomy for other [`PageSource`]
	/// implementations whose transport can drop mid-task, and the delivery
	/// retry treats it like any other attempt failure.
	///
	/// [`PageSource`]: crate::delivery::PageSource
	#[error("browser session lost: {0}")]
	SessionLost(String),

	/// Every candidate selector for a UI element was tried and none matched.
	#[error("no matching element for {element} ({candidates} candidates tried)")]
	ElementNotFound {
		/// Logical name of the UI element being resolved.
		element: &'static str,
		/// Number of candidate selectors exhausted.
		candidates: usize,
	},

	/// Neither the search input nor the deep-link fallback opened the chat.
	#[error("could not open conversation: {0}")]
	ChatOpen(String),

	/// No usable file input was found, or the upload call itself failed.
	#[error("attachment upload failed: {0}")]
	AttachmentUpload(String),

	/// Document render workflow failed after retries.
	#[error("ticket render failed: {0}")]
	Render(String),

	/// The serial queue worker is gone; no further tasks can run.
	#[error("task queue closed")]
	QueueClosed,

	/// A queued task panicked; the queue itself keeps running.
	#[error("queued task panicked")]
	TaskPanicked,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// Underlying DevTools protocol failure.
	#[error("browser protocol error: {0}")]
	Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for EngineError {
	fn from(err: chromiumoxide::error::CdpError) -> Self {
		EngineError::Cdp(err.to_string())
	}
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
