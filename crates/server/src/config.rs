//! Environment-driven server settings.
//!
//! All knobs the engine consumes but does not own: browser executable and
//! profile location, organiser contact, event strings, the autosend feature
//! flag, and where ticket artifacts live.

use std::env;
use std::path::PathBuf;

use ticketry_engine::EventDetails;

#[derive(Debug, Clone)]
pub struct Settings {
	/// Explicit browser executable; driver auto-detection when unset.
	pub chrome_executable: Option<PathBuf>,
	/// Persistent profile directory for the shared messaging session.
	pub profile_dir: PathBuf,
	/// Directory receiving rendered ticket PDFs.
	pub ticket_dir: PathBuf,
	/// Organiser contact identifier notified on each registration.
	pub organiser_contact: String,
	/// Event strings substituted into the ticket template.
	pub event: EventDetails,
	/// Gates the delivery workflows entirely.
	pub autosend: bool,
	/// Optional logo asset embedded into tickets.
	pub logo_path: Option<PathBuf>,
	/// External base URL used when composing ticket links.
	pub public_host: Option<String>,
}

impl Settings {
	pub fn from_env() -> Self {
		Self {
			chrome_executable: env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from),
			profile_dir: env::var("BROWSER_PROFILE_DIR")
				.map(PathBuf::from)
				.unwrap_or_else(|_| PathBuf::from("browser_profile")),
			ticket_dir: env::var("TICKET_DIR")
				.map(PathBuf::from)
				.unwrap_or_else(|_| PathBuf::from("tmp")),
			organiser_contact: env::var("ORGANISER_CONTACT").unwrap_or_default(),
			event: EventDetails {
				title: env::var("EVENT_TITLE").unwrap_or_else(|_| "Untitled Event".into()),
				date: env::var("EVENT_DATE").unwrap_or_else(|_| "TBA".into()),
				venue: env::var("EVENT_VENUE").unwrap_or_else(|_| "TBA".into()),
			},
			// Any value other than an explicit "false" keeps autosend on.
			autosend: env::var("AUTOSEND").map(|v| v != "false").unwrap_or(true),
			logo_path: env::var("LOGO_PATH").ok().map(PathBuf::from),
			public_host: env::var("PUBLIC_HOST").ok(),
		}
	}
}
