//! Page-level primitives behind a trait seam.
//!
//! The delivery workflow only ever talks to [`UiPage`]; `ChromiumPage`
//! adapts a real driver page, and tests substitute scripted fakes.

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::selector::ElementProbe;

/// DOM query collecting the page's file inputs in document order.
const FILE_INPUT_SELECTOR: &str = "input[type=file]";

/// Primitive operations a delivery attempt performs on one open page.
#[async_trait]
pub trait UiPage: ElementProbe {
	/// Navigates and waits for the load to settle.
	async fn navigate(&self, url: &str) -> Result<()>;

	async fn click(&self, selector: &str) -> Result<()>;

	/// Focuses the element and types `text` into it.
	async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

	/// Sends a single key (e.g. `Enter`, `Escape`) to the element.
	async fn press_key(&self, selector: &str, key: &str) -> Result<()>;

	/// `accept` attribute of every file input on the page, document order.
	async fn file_input_accepts(&self) -> Result<Vec<Option<String>>>;

	/// Submits `path` to the file input at `index` (as previously reported
	/// by [`UiPage::file_input_accepts`]).
	async fn upload_file(&self, index: usize, path: &Path) -> Result<()>;

	/// Full visible page text, for best-effort toast inspection.
	async fn body_text(&self) -> Result<String>;

	async fn close(&self) -> Result<()>;
}

/// [`UiPage`] implementation over a live `chromiumoxide` page.
pub struct ChromiumPage {
	page: Page,
}

impl ChromiumPage {
	pub fn new(page: Page) -> Self {
		Self { page }
	}
}

#[async_trait]
impl ElementProbe for ChromiumPage {
	async fn is_present(&self, selector: &str) -> bool {
		self.page.find_element(selector).await.is_ok()
	}
}

#[async_trait]
impl UiPage for ChromiumPage {
	async fn navigate(&self, url: &str) -> Result<()> {
		self.page.goto(url).await?;
		self.page.wait_for_navigation().await?;
		Ok(())
	}

	async fn click(&self, selector: &str) -> Result<()> {
		let element = self.page.find_element(selector).await?;
		element.click().await?;
		Ok(())
	}

	async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
		let element = self.page.find_element(selector).await?;
		element.click().await?;
		element.type_str(text).await?;
		Ok(())
	}

	async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
		let element = self.page.find_element(selector).await?;
		element.press_key(key).await?;
		Ok(())
	}

	async fn file_input_accepts(&self) -> Result<Vec<Option<String>>> {
		let inputs = match self.page.find_elements(FILE_INPUT_SELECTOR).await {
			Ok(inputs) => inputs,
			Err(err) => {
				debug!(target: "ticketry.delivery", error = %err, "no file inputs found");
				return Ok(Vec::new());
			}
		};
		let mut accepts = Vec::with_capacity(inputs.len());
		for input in &inputs {
			accepts.push(input.attribute("accept").await.unwrap_or(None));
		}
		Ok(accepts)
	}

	async fn upload_file(&self, index: usize, path: &Path) -> Result<()> {
		let inputs = self.page.find_elements(FILE_INPUT_SELECTOR).await?;
		let input = inputs.get(index).ok_or_else(|| {
			EngineError::AttachmentUpload(format!("file input {index} no longer present"))
		})?;
		let params = SetFileInputFilesParams {
			files: vec![path.to_string_lossy().into_owned()],
			node_id: Some(input.node_id.clone()),
			backend_node_id: Some(input.backend_node_id.clone()),
			object_id: None,
		};
		self.page
			.execute(params)
			.await
			.map_err(|err| EngineError::AttachmentUpload(err.to_string()))?;
		Ok(())
	}

	async fn body_text(&self) -> Result<String> {
		let text: String = self
			.page
			.evaluate("document.body ? document.body.innerText : ''")
			.await?
			.into_value()
			.map_err(|err| EngineError::Cdp(err.to_string()))?;
		Ok(text)
	}

	async fn close(&self) -> Result<()> {
		self.page.clone().close().await?;
		Ok(())
	}
}
