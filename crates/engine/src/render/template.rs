//! Ticket template substitution and the helpers feeding it.
//!
//! Placeholder syntax (`{{name}}`) and escaping are a hard compatibility
//! contract: unescaped user input must never reach the substituted output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use qrcode::QrCode;
use qrcode::render::svg;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{EngineError, Result};
use crate::types::{EventDetails, Registration};

/// Escapes `&`, `<`, `>`, `"` and `'` so field values cannot break the
/// template's structure.
pub fn escape_html(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			other => escaped.push(other),
		}
	}
	escaped
}

/// Substitutes every placeholder in `template`, escaping all attendee and
/// event fields. The data URLs are engine-generated and embedded verbatim.
pub fn compose_ticket_html(
	template: &str,
	registration: &Registration,
	event: &EventDetails,
	ticket_id: &str,
	qr_data_url: &str,
	logo_data_url: &str,
) -> String {
	template
		.replace("{{logo_data_url}}", logo_data_url)
		.replace("{{qr_data_url}}", qr_data_url)
		.replace("{{ticket_id}}", &escape_html(ticket_id))
		.replace("{{full_name}}", &escape_html(&registration.full_name))
		.replace("{{email}}", &escape_html(&registration.email))
		.replace("{{phone}}", &escape_html(&registration.phone))
		.replace("{{sector}}", &escape_html(registration.sector.as_deref().unwrap_or("-")))
		.replace("{{role}}", &escape_html(registration.role.as_deref().unwrap_or("-")))
		.replace("{{event_title}}", &escape_html(&event.title))
		.replace("{{event_date}}", &escape_html(&event.date))
		.replace("{{event_venue}}", &escape_html(&event.venue))
}

/// Output artifact file name: sanitized attendee name plus a millisecond
/// timestamp. Only letters, digits and hyphens survive; everything else
/// becomes an underscore.
pub fn ticket_filename(full_name: &str) -> String {
	let safe: String = full_name
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' {
				c.to_ascii_lowercase()
			} else {
				'_'
			}
		})
		.collect();
	let base = if safe.is_empty() { "ticket".to_string() } else { safe };
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or_default();
	format!("{base}-{millis}.pdf")
}

/// Ticket identifier encoded into the QR code: the trailing
/// timestamp segment of the artifact file name.
pub fn ticket_id_from(file_name: &str) -> String {
	file_name
		.rsplit('-')
		.next()
		.unwrap_or(file_name)
		.trim_end_matches(".pdf")
		.to_string()
}

/// Renders a QR code for `payload` as an inline SVG data URL.
pub fn qr_data_url(payload: &str) -> Result<String> {
	let code = QrCode::new(payload.as_bytes())
		.map_err(|err| EngineError::Render(format!("qr generation failed: {err}")))?;
	let image = code
		.render::<svg::Color>()
		.min_dimensions(160, 160)
		.build();
	Ok(format!("data:image/svg+xml;base64,{}", BASE64.encode(image)))
}

/// Reads an image asset into an inline data URL.
pub fn image_data_url(path: &Path) -> Result<String> {
	let bytes = std::fs::read(path)?;
	let mime = match path.extension().and_then(|e| e.to_str()) {
		Some("jpg") | Some("jpeg") => "image/jpeg",
		Some("svg") => "image/svg+xml",
		_ => "image/png",
	};
	Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn registration() -> Registration {
		Registration {
			full_name: "Jane <Doe> & \"Co\"".into(),
			email: "jane@x.com".into(),
			phone: "+27831112222".into(),
			sector: Some("Tech".into()),
			role: None,
		}
	}

	fn event() -> EventDetails {
		EventDetails {
			title: "Launch Night '26".into(),
			date: "2026-02-13".into(),
			venue: "Main Hall".into(),
		}
	}

	#[test]
	fn escaping_covers_all_structural_characters() {
		assert_eq!(
			escape_html("<a href=\"x\">&'</a>"),
			"&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
		);
	}

	#[test]
	fn substituted_template_contains_no_unescaped_field_input() {
		let html = compose_ticket_html(
			"<p>{{full_name}}</p><p>{{event_title}}</p><p>{{role}}</p>",
			&registration(),
			&event(),
			"1700000000000",
			"",
			"",
		);
		assert!(!html.contains("<Doe>"));
		assert!(!html.contains("\"Co\""));
		assert!(!html.contains('\''));
		assert!(html.contains("Jane &lt;Doe&gt; &amp; &quot;Co&quot;"));
		assert!(html.contains("Launch Night &#39;26"));
		assert!(html.contains("<p>-</p>"));
	}

	#[test]
	fn default_template_has_no_leftover_placeholders() {
		let html = compose_ticket_html(
			super::super::DEFAULT_TEMPLATE,
			&registration(),
			&event(),
			"1700000000000",
			"data:image/svg+xml;base64,abc",
			"",
		);
		assert!(!html.contains("{{"));
		assert!(!html.contains("}}"));
	}

	#[test]
	fn filename_is_sanitized_and_timestamped() {
		let name = ticket_filename("Jane Doe");
		assert!(name.starts_with("jane_doe-"));
		assert!(name.ends_with(".pdf"));
		let stamp = ticket_id_from(&name);
		assert!(!stamp.is_empty());
		assert!(stamp.chars().all(|c| c.is_ascii_digit()));
	}

	#[test]
	fn filename_never_collapses_to_nothing() {
		assert!(ticket_filename("日本").starts_with("__-"));
		assert!(ticket_filename("").starts_with("ticket-"));
	}

	#[test]
	fn qr_payload_round_trips_into_a_data_url() {
		let url = qr_data_url("TICKET:1700000000000").unwrap();
		assert!(url.starts_with("data:image/svg+xml;base64,"));
		assert!(url.len() > "data:image/svg+xml;base64,".len());
	}
}
