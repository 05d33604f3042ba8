//! Shared interactive browser session: lazy launch, liveness probing and
//! cooperative invalidation.
//!
//! One headful Chromium instance stays logged into the messaging web client
//! across tasks and process restarts (persistent profile directory). The
//! manager owns the only reference; callers must reach it through the serial
//! queue, which is what makes the swap-on-failure discipline safe.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Chrome flags shared by the interactive and render sessions.
pub(crate) const CHROME_ARGS: &[&str] = &[
	"--no-sandbox",
	"--disable-setuid-sandbox",
	"--no-first-run",
	"--disable-session-crashed-bubble",
	"--disable-infobars",
	"--disable-extensions",
	"--disable-background-networking",
];

/// Where and how to start browser processes.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
	/// Explicit browser executable; the driver auto-detects one when absent.
	pub executable: Option<PathBuf>,
	/// Persistent profile directory keeping the messaging login alive.
	pub profile_dir: PathBuf,
}

/// A live interactive browser plus its connection-liveness flag.
pub struct SharedHandle {
	browser: Mutex<Browser>,
	alive: Arc<AtomicBool>,
	created_at: Instant,
}

impl SharedHandle {
	/// Whether the CDP event stream is still being serviced.
	pub fn is_connected(&self) -> bool {
		self.alive.load(Ordering::Relaxed)
	}

	/// Age of this session, for logging.
	pub fn age(&self) -> std::time::Duration {
		self.created_at.elapsed()
	}

	/// Opens a fresh blank page in this session.
	pub async fn new_page(&self) -> Result<chromiumoxide::Page> {
		let browser = self.browser.lock().await;
		let page = browser.new_page("about:blank").await?;
		Ok(page)
	}

	/// Probes liveness: the event stream must still run and the browser must
	/// answer a version round trip.
	async fn probe(&self) -> bool {
		if !self.is_connected() {
			return false;
		}
		self.browser.lock().await.version().await.is_ok()
	}

	/// Closes the browser process, tolerating an already-dead connection.
	async fn shutdown(&self) {
		let mut browser = self.browser.lock().await;
		if let Err(err) = browser.close().await {
			debug!(target: "ticketry.session", error = %err, "browser close failed (already gone?)");
		}
		let _ = browser.wait().await;
	}
}

/// Process-wide owner of the single interactive session.
///
/// `acquire` is idempotent: a healthy cached handle is returned as-is, a
/// dead one is discarded and replaced. The slot mutex is held across the
/// launch, so concurrent acquirers share one launch instead of racing
/// several browser processes into existence.
pub struct SharedBrowser {
	profile: BrowserProfile,
	slot: Mutex<Option<Arc<SharedHandle>>>,
}

impl SharedBrowser {
	pub fn new(profile: BrowserProfile) -> Self {
		Self {
			profile,
			slot: Mutex::new(None),
		}
	}

	/// Returns a live session handle, launching or relaunching as needed.
	///
	/// A launch failure leaves the slot empty and surfaces the error, so a
	/// later call can retry from scratch.
	pub async fn acquire(&self) -> Result<Arc<SharedHandle>> {
		let mut slot = self.slot.lock().await;

		if let Some(handle) = slot.as_ref() {
			if handle.probe().await {
				return Ok(Arc::clone(handle));
			}
			info!(
				target: "ticketry.session",
				age_secs = handle.age().as_secs(),
				"cached browser session disconnected; relaunching"
			);
			if let Some(stale) = slot.take() {
				tokio::spawn(async move { stale.shutdown().await });
			}
		}

		let handle = Arc::new(self.launch().await?);
		*slot = Some(Arc::clone(&handle));
		Ok(handle)
	}

	/// Drops the cached session so the next acquirer relaunches.
	///
	/// Called by failing workflow attempts; safe to call concurrently and
	/// when no session is cached.
	pub async fn invalidate(&self) {
		let taken = self.slot.lock().await.take();
		if let Some(handle) = taken {
			info!(target: "ticketry.session", "invalidating shared browser session");
			tokio::spawn(async move { handle.shutdown().await });
		}
	}

	async fn launch(&self) -> Result<SharedHandle> {
		let mut builder = BrowserConfig::builder()
			.with_head()
			.user_data_dir(&self.profile.profile_dir)
			.window_size(1200, 900);
		for arg in CHROME_ARGS {
			builder = builder.arg(*arg);
		}
		if let Some(path) = &self.profile.executable {
			builder = builder.chrome_executable(path);
		}
		let config = builder.build().map_err(EngineError::Launch)?;

		info!(
			target: "ticketry.session",
			executable = ?self.profile.executable,
			profile_dir = %self.profile.profile_dir.display(),
			"launching interactive browser"
		);
		let (browser, mut handler) = Browser::launch(config)
			.await
			.map_err(|err| EngineError::Launch(err.to_string()))?;

		let alive = Arc::new(AtomicBool::new(true));
		let alive_for_handler = Arc::clone(&alive);
		tokio::spawn(async move {
			while handler.next().await.is_some() {}
			// Stream end means the browser disconnected or crashed.
			warn!(target: "ticketry.session", "interactive browser disconnected (event stream ended)");
			alive_for_handler.store(false, Ordering::Relaxed);
		});

		Ok(SharedHandle {
			browser: Mutex::new(browser),
			alive,
			created_at: Instant::now(),
		})
	}
}
