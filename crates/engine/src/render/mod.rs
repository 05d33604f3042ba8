//! Document render workflow: template substitution plus an isolated,
//! disposable headless session per PDF capture.
//!
//! Rendering never touches the shared interactive session; every render
//! launches its own short-lived browser and tears it down unconditionally.
//! The whole capture runs through the serial queue so renders cannot race
//! each other (or deliveries) into simultaneous browser launches.

pub mod template;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::queue::SerialQueue;
use crate::session::CHROME_ARGS;
use crate::types::{EventDetails, Registration};

use template::{compose_ticket_html, qr_data_url, ticket_id_from};

/// Built-in A5 ticket template; replaceable via
/// [`TicketRenderer::with_template`].
pub const DEFAULT_TEMPLATE: &str = include_str!("ticket.html");

/// A5 paper, inches.
const PAPER_WIDTH_IN: f64 = 5.83;
const PAPER_HEIGHT_IN: f64 = 8.27;

/// Pause between the two render attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(300);

const MAX_ATTEMPTS: u32 = 2;

/// One disposable control session able to capture a document as PDF.
#[async_trait]
pub trait RenderSession: Send {
	/// Loads `html`, waits for activity to settle and writes the PDF to
	/// `output`.
	async fn capture(&mut self, html: &str, output: &Path) -> Result<()>;

	/// Tears the session down; called whether or not capture succeeded.
	async fn dispose(self);
}

/// Opens isolated render sessions, one per capture.
#[async_trait]
pub trait RenderSessionFactory: Send + Sync {
	type Session: RenderSession + Send;

	async fn open(&self) -> Result<Self::Session>;
}

/// Headless Chromium factory used in production.
pub struct HeadlessChromium {
	executable: Option<PathBuf>,
}

impl HeadlessChromium {
	pub fn new(executable: Option<PathBuf>) -> Self {
		Self { executable }
	}
}

#[async_trait]
impl RenderSessionFactory for HeadlessChromium {
	type Session = ChromiumRenderSession;

	async fn open(&self) -> Result<ChromiumRenderSession> {
		let mut builder = BrowserConfig::builder();
		for arg in CHROME_ARGS {
			builder = builder.arg(*arg);
		}
		if let Some(path) = &self.executable {
			builder = builder.chrome_executable(path);
		}
		let config = builder.build().map_err(EngineError::Launch)?;

		let (browser, mut handler) = Browser::launch(config)
			.await
			.map_err(|err| EngineError::Launch(err.to_string()))?;
		tokio::spawn(async move { while handler.next().await.is_some() {} });

		let page = browser.new_page("about:blank").await?;
		Ok(ChromiumRenderSession { browser, page })
	}
}

/// Short-lived headless browser plus the single page it renders into.
pub struct ChromiumRenderSession {
	browser: Browser,
	page: chromiumoxide::Page,
}

#[async_trait]
impl RenderSession for ChromiumRenderSession {
	async fn capture(&mut self, html: &str, output: &Path) -> Result<()> {
		self.page.set_content(html).await?;
		self.page.wait_for_navigation().await?;
		let params = PrintToPdfParams {
			print_background: Some(true),
			paper_width: Some(PAPER_WIDTH_IN),
			paper_height: Some(PAPER_HEIGHT_IN),
			..Default::default()
		};
		self.page.save_pdf(params, output).await?;
		Ok(())
	}

	async fn dispose(mut self) {
		if let Err(err) = self.page.clone().close().await {
			tracing::debug!(target: "ticketry.render", error = %err, "render page close failed");
		}
		if let Err(err) = self.browser.close().await {
			tracing::debug!(target: "ticketry.render", error = %err, "render browser close failed");
		}
		let _ = self.browser.wait().await;
	}
}

/// End-to-end ticket rendering: substitution, QR generation and queued PDF
/// capture with a bounded retry.
pub struct TicketRenderer<F: RenderSessionFactory> {
	factory: Arc<F>,
	queue: SerialQueue,
	event: EventDetails,
	template: String,
	logo_data_url: String,
}

impl<F: RenderSessionFactory + 'static> TicketRenderer<F> {
	pub fn new(factory: F, queue: SerialQueue, event: EventDetails, logo_data_url: String) -> Self {
		Self {
			factory: Arc::new(factory),
			queue,
			event,
			template: DEFAULT_TEMPLATE.to_string(),
			logo_data_url,
		}
	}

	/// Replaces the built-in template (placeholder contract unchanged).
	pub fn with_template(mut self, template: String) -> Self {
		self.template = template;
		self
	}

	/// Renders one ticket to `output`. Must complete before the caller hands
	/// ticket links back, so this awaits the queued capture.
	pub async fn render(&self, registration: &Registration, output: &Path) -> Result<()> {
		let file_name = output
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default();
		let ticket_id = ticket_id_from(&file_name);

		// QR failure is non-fatal: the ticket still renders, with an empty
		// code placeholder.
		let qr = match qr_data_url(&format!("TICKET:{ticket_id}")) {
			Ok(url) => url,
			Err(err) => {
				warn!(target: "ticketry.render", error = %err, "qr generation failed; rendering without code");
				String::new()
			}
		};

		let html = compose_ticket_html(
			&self.template,
			registration,
			&self.event,
			&ticket_id,
			&qr,
			&self.logo_data_url,
		);

		let factory = Arc::clone(&self.factory);
		let output = output.to_path_buf();
		self.queue
			.enqueue("render", async move {
				render_with_retry(factory.as_ref(), &html, &output).await
			})
			.await
	}
}

/// Bounded retry around one capture; a failed attempt's session is already
/// disposed before the next launch.
async fn render_with_retry<F: RenderSessionFactory>(
	factory: &F,
	html: &str,
	output: &Path,
) -> Result<()> {
	let mut attempt = 0;
	loop {
		attempt += 1;
		match render_once(factory, html, output).await {
			Ok(()) => {
				info!(target: "ticketry.render", output = %output.display(), "ticket rendered");
				return Ok(());
			}
			Err(err) => {
				warn!(target: "ticketry.render", attempt, error = %err, "render attempt failed");
				if attempt >= MAX_ATTEMPTS {
					return Err(err);
				}
				sleep(RETRY_PAUSE).await;
			}
		}
	}
}

async fn render_once<F: RenderSessionFactory>(factory: &F, html: &str, output: &Path) -> Result<()> {
	let mut session = factory.open().await?;
	let captured = session.capture(html, output).await;
	session.dispose().await;
	captured
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;
	use std::sync::Mutex as StdMutex;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

	use super::*;

	struct FakeSession {
		fail_capture: bool,
		disposed: Arc<AtomicBool>,
	}

	#[async_trait]
	impl RenderSession for FakeSession {
		async fn capture(&mut self, html: &str, output: &Path) -> Result<()> {
			if self.fail_capture {
				return Err(EngineError::Render("capture crashed".into()));
			}
			std::fs::write(output, html)?;
			Ok(())
		}

		async fn dispose(self) {
			self.disposed.store(true, Ordering::SeqCst);
		}
	}

	/// Scripted factory: each entry is whether that session's capture fails.
	struct ScriptedFactory {
		script: StdMutex<VecDeque<bool>>,
		opened: AtomicUsize,
		disposed: StdMutex<Vec<Arc<AtomicBool>>>,
	}

	impl ScriptedFactory {
		fn new(failures: &[bool]) -> Self {
			Self {
				script: StdMutex::new(failures.iter().copied().collect()),
				opened: AtomicUsize::new(0),
				disposed: StdMutex::new(Vec::new()),
			}
		}
	}

	#[async_trait]
	impl RenderSessionFactory for ScriptedFactory {
		type Session = FakeSession;

		async fn open(&self) -> Result<FakeSession> {
			self.opened.fetch_add(1, Ordering::SeqCst);
			let fail_capture = self.script.lock().unwrap().pop_front().unwrap_or(false);
			let disposed = Arc::new(AtomicBool::new(false));
			self.disposed.lock().unwrap().push(Arc::clone(&disposed));
			Ok(FakeSession { fail_capture, disposed })
		}
	}

	#[tokio::test(start_paused = true)]
	async fn retry_succeeds_after_one_failure_and_disposes_the_failed_session() {
		let factory = ScriptedFactory::new(&[true, false]);
		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("out.pdf");

		render_with_retry(&factory, "<html></html>", &output)
			.await
			.unwrap();

		assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
		let disposed = factory.disposed.lock().unwrap();
		assert!(disposed[0].load(Ordering::SeqCst), "failed session not disposed");
		assert!(disposed[1].load(Ordering::SeqCst));
		assert!(output.exists());
	}

	#[tokio::test(start_paused = true)]
	async fn error_propagates_after_two_failed_attempts() {
		let factory = ScriptedFactory::new(&[true, true]);
		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("out.pdf");

		let err = render_with_retry(&factory, "<html></html>", &output)
			.await
			.unwrap_err();

		assert!(matches!(err, EngineError::Render(_)));
		assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
		assert!(!output.exists());
	}

	#[tokio::test(start_paused = true)]
	async fn renderer_substitutes_fields_and_embeds_a_code() {
		let factory = ScriptedFactory::new(&[false]);
		let queue = SerialQueue::new();
		let renderer = TicketRenderer::new(
			factory,
			queue,
			EventDetails {
				title: "Launch Night".into(),
				date: "2026-02-13".into(),
				venue: "Main Hall".into(),
			},
			String::new(),
		);

		let dir = tempfile::tempdir().unwrap();
		let file_name = template::ticket_filename("Jane Doe");
		let output = dir.path().join(&file_name);
		renderer
			.render(
				&Registration {
					full_name: "Jane Doe".into(),
					email: "jane@x.com".into(),
					phone: "+27831112222".into(),
					sector: Some("Tech".into()),
					role: Some("CEO".into()),
				},
				&output,
			)
			.await
			.unwrap();

		let html = std::fs::read_to_string(&output).unwrap();
		assert!(html.contains("Jane Doe"));
		assert!(html.contains("Launch Night"));
		assert!(html.contains("data:image/svg+xml;base64,"));
	}

	#[tokio::test(start_paused = true)]
	async fn replacement_template_is_rendered_instead_of_the_builtin() {
		let factory = ScriptedFactory::new(&[false]);
		let queue = SerialQueue::new();
		let renderer = TicketRenderer::new(
			factory,
			queue,
			EventDetails {
				title: "Launch Night".into(),
				date: "2026-02-13".into(),
				venue: "Main Hall".into(),
			},
			String::new(),
		)
		.with_template("<b>{{full_name}}</b> @ {{event_venue}} #{{ticket_id}}".into());

		let dir = tempfile::tempdir().unwrap();
		let output = dir.path().join("jane_doe-1700000000000.pdf");
		renderer
			.render(
				&Registration {
					full_name: "Jane Doe".into(),
					email: "jane@x.com".into(),
					phone: "+27831112222".into(),
					sector: None,
					role: None,
				},
				&output,
			)
			.await
			.unwrap();

		let html = std::fs::read_to_string(&output).unwrap();
		assert_eq!(html, "<b>Jane Doe</b> @ Main Hall #1700000000000");
	}
}
