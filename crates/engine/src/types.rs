//! Shared record types consumed by the render and delivery workflows.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Attendee registration record handed in by the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
	/// Attendee full name; drives the ticket file name.
	pub full_name: String,
	pub email: String,
	/// Phone-number-like contact identifier, any formatting accepted.
	pub phone: String,
	#[serde(default)]
	pub sector: Option<String>,
	#[serde(default)]
	pub role: Option<String>,
}

/// Event strings substituted into the ticket template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
	pub title: String,
	pub date: String,
	pub venue: String,
}

/// One message/attachment delivery to one contact.
///
/// When both `text` and `attachment` are set, the text rides along as the
/// attachment caption in a single UI transaction; it is never sent as a
/// separate plain-text bubble.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
	/// Target contact identifier; normalized to digits before use.
	pub to: String,
	pub text: Option<String>,
	pub attachment: Option<PathBuf>,
}
