//! Message delivery workflow: open a conversation in the messaging web
//! client and deliver a text message or a file attachment with optional
//! caption.
//!
//! Per attempt the workflow walks Start -> SessionAcquired -> ChatOpened ->
//! {TextSent | AttachmentSent} -> Done, with Failed reachable from any
//! state. Each UI step resolves its element through an ordered candidate
//! list; optional elements (attach control, caption box) are tolerated when
//! absent, essential ones (message box, send control, file input) escalate.
//! The whole attempt runs at most twice, invalidating the shared session
//! between attempts, and every invocation is serialized through the task
//! queue so two deliveries can never interleave on the shared session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::{EngineError, Result};
use crate::page::{ChromiumPage, UiPage};
use crate::queue::SerialQueue;
use crate::selector::resolve_first;
use crate::session::SharedBrowser;
use crate::types::DeliveryRequest;

const WHATSAPP_URL: &str = "https://web.whatsapp.com";
const DEEP_LINK_BASE: &str = "https://web.whatsapp.com/send";

/// Presence of any of these means the client is logged in and usable.
const CHAT_PANE: &[&str] = &[
	"#pane-side",
	"div[role=\"grid\"]",
	".app",
	"[aria-label=\"Chat list\"]",
];

/// Search input candidates; the target renames these classes regularly.
const SEARCH_BOX: &[&str] = &[
	"div[title=\"Search or start new chat\"]",
	"div[role=\"textbox\"][contenteditable=\"true\"][data-tab]",
	"._2_1wd.copyable-text.selectable-text",
	"._3FRCZ.copyable-text.selectable-text",
];

const ATTACH_CONTROL: &[&str] = &[
	"span[data-icon=\"clip\"]",
	"button[title=\"Attach\"]",
	"div[title=\"Attach\"]",
];

const CAPTION_BOX: &[&str] = &["div[contenteditable=\"true\"][data-tab]"];

const MESSAGE_BOX: &[&str] = &[
	"div[contenteditable=\"true\"][data-tab]",
	"div[role=\"textbox\"][contenteditable=\"true\"]",
];

const SEND_CONTROL: &[&str] = &["span[data-icon=\"send\"]", "button[aria-label=\"Send\"]"];

/// Budget for the logged-in pane to appear after navigation.
const PANE_TIMEOUT: Duration = Duration::from_secs(60);
/// Per-candidate budget for ordinary element resolution.
const CANDIDATE_TIMEOUT: Duration = Duration::from_secs(3);
/// Short budget for the optional caption box.
const CAPTION_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause between the two workflow attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(500);

const MAX_ATTEMPTS: u32 = 2;

/// Supplies pages on the shared session and accepts invalidation when an
/// attempt decides the session is unusable.
#[async_trait]
pub trait PageSource: Send + Sync {
	type Page: UiPage + Send + Sync;

	/// Acquires the shared session and opens a fresh page in it.
	async fn open_page(&self) -> Result<Self::Page>;

	/// Drops the cached session so the next attempt relaunches.
	async fn invalidate(&self);
}

#[async_trait]
impl PageSource for SharedBrowser {
	type Page = ChromiumPage;

	async fn open_page(&self) -> Result<ChromiumPage> {
		let handle = self.acquire().await?;
		Ok(ChromiumPage::new(handle.new_page().await?))
	}

	async fn invalidate(&self) {
		SharedBrowser::invalidate(self).await;
	}
}

/// Entry point for message/attachment delivery, always queue-serialized.
pub struct Messenger<S: PageSource> {
	sessions: Arc<S>,
	queue: SerialQueue,
}

impl<S: PageSource + 'static> Messenger<S> {
	pub fn new(sessions: Arc<S>, queue: SerialQueue) -> Self {
		Self { sessions, queue }
	}

	/// Delivers one request; best effort, bounded retries.
	///
	/// The request is submitted to the serial queue immediately; awaiting
	/// the returned future only waits for the outcome, so callers may also
	/// discard it for fire-and-forget submission.
	pub fn send(&self, request: DeliveryRequest) -> impl std::future::Future<Output = Result<()>> {
		let sessions = Arc::clone(&self.sessions);
		self.queue.enqueue("delivery", async move {
			deliver_with_retry(sessions.as_ref(), &request).await
		})
	}
}

/// Bounded retry loop around one delivery; invalidates the shared session on
/// every failed attempt so the next one starts from a fresh launch.
async fn deliver_with_retry<S: PageSource>(sessions: &S, request: &DeliveryRequest) -> Result<()> {
	let mut attempt = 0;
	loop {
		attempt += 1;
		match deliver_once(sessions, request).await {
			Ok(()) => return Ok(()),
			Err(err) => {
				warn!(
					target: "ticketry.delivery",
					attempt,
					to = %request.to,
					error = %err,
					"delivery attempt failed"
				);
				sessions.invalidate().await;
				if attempt >= MAX_ATTEMPTS {
					return Err(err);
				}
				sleep(RETRY_PAUSE).await;
			}
		}
	}
}

/// One full attempt on a fresh page; the page is closed whichever way the
/// attempt ends.
async fn deliver_once<S: PageSource>(sessions: &S, request: &DeliveryRequest) -> Result<()> {
	let page = sessions.open_page().await?;
	let outcome = run_attempt(&page, request).await;
	if let Err(err) = page.close().await {
		debug!(target: "ticketry.delivery", error = %err, "page close failed");
	}
	outcome
}

async fn run_attempt<P: UiPage>(page: &P, request: &DeliveryRequest) -> Result<()> {
	let digits = normalize_contact(&request.to);
	let attachment = request
		.attachment
		.as_deref()
		.filter(|path| path.exists());

	page.navigate(WHATSAPP_URL).await?;

	if resolve_first(page, "chat pane", CHAT_PANE, PANE_TIMEOUT).await.is_err() {
		warn!(target: "ticketry.delivery", "chat pane not detected; session may need pairing");
	}

	// Dismiss any upgrade/download overlay that could block the UI.
	if let Err(err) = page.press_key("body", "Escape").await {
		debug!(target: "ticketry.delivery", error = %err, "escape press failed");
	}
	sleep(Duration::from_millis(400)).await;

	match resolve_first(page, "search box", SEARCH_BOX, CANDIDATE_TIMEOUT).await {
		Ok(search) => {
			// The chat may still have opened even if a sub-step failed, so
			// this path is tolerant; the send steps below will escalate if
			// it did not.
			if let Err(err) = open_chat_via_search(page, &search, &digits).await {
				warn!(target: "ticketry.delivery", error = %err, "opening chat via search input failed");
			}
		}
		Err(_) => {
			warn!(
				target: "ticketry.delivery",
				to = %digits,
				"search input not found; falling back to deep-link navigation"
			);
			// Prefilled text and attachments cannot be combined reliably:
			// the text is only URL-embedded when no file is pending.
			let prefilled = if attachment.is_some() {
				None
			} else {
				request.text.as_deref()
			};
			let link = deep_link(&digits, prefilled);
			page.navigate(&link)
				.await
				.map_err(|err| EngineError::ChatOpen(err.to_string()))?;
			sleep(Duration::from_secs(2)).await;
		}
	}

	if let Some(path) = attachment {
		send_attachment(page, path, request.text.as_deref()).await?;
	} else if let Some(text) = request.text.as_deref() {
		send_text(page, text).await?;
	}

	// Let the send flush before the page is torn down.
	sleep(Duration::from_millis(1500)).await;
	Ok(())
}

async fn open_chat_via_search<P: UiPage>(page: &P, search: &str, digits: &str) -> Result<()> {
	page.click(search).await?;
	sleep(Duration::from_millis(200)).await;
	page.type_text(search, digits).await?;
	sleep(Duration::from_millis(1200)).await;
	page.press_key(search, "Enter").await?;
	sleep(Duration::from_millis(800)).await;
	Ok(())
}

async fn send_attachment<P: UiPage>(page: &P, path: &Path, caption: Option<&str>) -> Result<()> {
	match resolve_first(page, "attach control", ATTACH_CONTROL, CANDIDATE_TIMEOUT).await {
		Ok(attach) => {
			if let Err(err) = page.click(&attach).await {
				warn!(target: "ticketry.delivery", error = %err, "attach control click failed");
			}
			sleep(Duration::from_millis(300)).await;
		}
		Err(_) => {
			debug!(target: "ticketry.delivery", "attach control not found; trying file input directly");
		}
	}
	sleep(Duration::from_millis(300)).await;

	let accepts = page.file_input_accepts().await?;
	let index = preferred_file_input(&accepts).ok_or_else(|| {
		EngineError::AttachmentUpload("no file input found after opening attach panel".into())
	})?;
	page.upload_file(index, path).await?;
	sleep(Duration::from_millis(1200)).await;

	// Best-effort detection of the unsupported-file-type toast.
	if let Ok(text) = page.body_text().await {
		if text.to_lowercase().contains("not supported") {
			warn!(target: "ticketry.delivery", "target reported the attached file type as not supported");
		}
	}

	if let Some(caption) = caption {
		match resolve_first(page, "caption box", CAPTION_BOX, CAPTION_TIMEOUT).await {
			Ok(selector) => {
				if let Err(err) = page.type_text(&selector, caption).await {
					warn!(target: "ticketry.delivery", error = %err, "caption typing failed; sending without caption");
				}
			}
			Err(_) => {
				debug!(target: "ticketry.delivery", "caption box not available; sending without caption");
			}
		}
	}

	let send = resolve_first(page, "send control", SEND_CONTROL, CANDIDATE_TIMEOUT).await?;
	page.click(&send).await?;
	Ok(())
}

async fn send_text<P: UiPage>(page: &P, text: &str) -> Result<()> {
	let selector = resolve_first(page, "message box", MESSAGE_BOX, CANDIDATE_TIMEOUT).await?;
	page.type_text(&selector, text).await?;
	// The UI send gesture, not a literal line break in the message body.
	page.press_key(&selector, "Enter").await?;
	Ok(())
}

/// Strips a contact identifier down to its digits. Idempotent.
pub fn normalize_contact(raw: &str) -> String {
	raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Picks the file input to upload into: the first whose `accept` metadata
/// indicates document/any-file support, else the last one present.
pub fn preferred_file_input(accepts: &[Option<String>]) -> Option<usize> {
	if accepts.is_empty() {
		return None;
	}
	accepts
		.iter()
		.position(|accept| {
			accept
				.as_deref()
				.is_some_and(|a| a.contains("pdf") || a.contains("*/*"))
		})
		.or(Some(accepts.len() - 1))
}

/// Deep-link URL opening a conversation by phone digits, optionally with
/// prefilled text.
fn deep_link(digits: &str, prefilled: Option<&str>) -> String {
	let mut params = vec![("phone", digits)];
	if let Some(text) = prefilled {
		params.push(("text", text));
	}
	Url::parse_with_params(DEEP_LINK_BASE, params)
		.map(|url| url.to_string())
		.unwrap_or_else(|_| format!("{DEEP_LINK_BASE}?phone={digits}"))
}
