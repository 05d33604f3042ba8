//! HTTP routes: registration intake, ticket file serving, health.
//!
//! The `/register` response is returned as soon as the ticket is rendered;
//! deliveries are fire-and-forget submissions to the engine's serial queue
//! and never block (or fail) the request.

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use ticketry_engine::{
	BrowserProfile, DeliveryRequest, EventDetails, HeadlessChromium, Messenger, Registration,
	SerialQueue, SharedBrowser, TicketRenderer, image_data_url, normalize_contact,
	ticket_filename,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Settings;

const BODY_LIMIT: usize = 2 * 1024 * 1024;

pub struct AppState {
	pub settings: Settings,
	pub renderer: TicketRenderer<HeadlessChromium>,
	pub messenger: Messenger<SharedBrowser>,
}

impl AppState {
	/// Wires the engine: one serial queue shared by both workflows, one
	/// shared interactive session, one headless render factory.
	pub fn new(settings: Settings) -> Self {
		let queue = SerialQueue::new();

		let shared = Arc::new(SharedBrowser::new(BrowserProfile {
			executable: settings.chrome_executable.clone(),
			profile_dir: settings.profile_dir.clone(),
		}));
		let messenger = Messenger::new(shared, queue.clone());

		let logo = match &settings.logo_path {
			Some(path) => image_data_url(path).unwrap_or_else(|err| {
				warn!(error = %err, path = %path.display(), "logo asset unavailable");
				String::new()
			}),
			None => String::new(),
		};
		let renderer = TicketRenderer::new(
			HeadlessChromium::new(settings.chrome_executable.clone()),
			queue,
			settings.event.clone(),
			logo,
		);

		Self {
			settings,
			renderer,
			messenger,
		}
	}
}

pub fn router(state: Arc<AppState>) -> Router {
	Router::new()
		.route("/register", post(register))
		.route("/ticket/{name}", get(ticket))
		.route("/health", get(health))
		.layer(CorsLayer::permissive())
		.layer(DefaultBodyLimit::max(BODY_LIMIT))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterPayload {
	#[serde(default)]
	full_name: String,
	#[serde(default)]
	email: String,
	#[serde(default)]
	phone: String,
	#[serde(default)]
	sector: Option<String>,
	#[serde(default)]
	role: Option<String>,
}

async fn register(
	State(state): State<Arc<AppState>>,
	Json(payload): Json<RegisterPayload>,
) -> Response {
	if payload.full_name.trim().is_empty()
		|| payload.email.trim().is_empty()
		|| payload.phone.trim().is_empty()
	{
		return (
			StatusCode::BAD_REQUEST,
			Json(json!({ "error": "fullName, email and phone are required" })),
		)
			.into_response();
	}

	let registration = Registration {
		full_name: payload.full_name,
		email: payload.email,
		phone: payload.phone,
		sector: payload.sector,
		role: payload.role,
	};
	info!(name = %registration.full_name, "incoming registration");

	let file_name = ticket_filename(&registration.full_name);
	let output = state.settings.ticket_dir.join(&file_name);

	// The ticket must exist before links are handed back; render failures
	// are fatal to this registration.
	if let Err(err) = state.renderer.render(&registration, &output).await {
		error!(error = %err, "ticket render failed");
		return (
			StatusCode::INTERNAL_SERVER_ERROR,
			Json(json!({ "error": err.to_string() })),
		)
			.into_response();
	}

	let event_title = state.settings.event.title.clone();
	let organiser_text = organiser_message(&registration, &state.settings.event);
	let participant_text = participant_message(&registration.full_name, &event_title);

	if state.settings.autosend {
		// Fire-and-forget: the response does not wait on delivery, and a
		// failed delivery is logged, never surfaced to the registrant.
		let app = Arc::clone(&state);
		let reg = registration.clone();
		let organiser_text = organiser_text.clone();
		let participant_text = participant_text.clone();
		let attachment = output.clone();
		tokio::spawn(async move {
			if let Err(err) = app
				.messenger
				.send(DeliveryRequest {
					to: app.settings.organiser_contact.clone(),
					text: Some(organiser_text),
					attachment: Some(attachment.clone()),
				})
				.await
			{
				warn!(error = %err, "organiser notification failed");
			}
			if let Err(err) = app
				.messenger
				.send(DeliveryRequest {
					to: reg.phone.clone(),
					text: Some(participant_text),
					attachment: Some(attachment),
				})
				.await
			{
				warn!(error = %err, "participant receipt failed");
			}
		});
	}

	let ticket_url = format!("{}/ticket/{}", public_host(&state.settings), file_name);
	let organiser_wa = wa_me_link(&state.settings.organiser_contact, Some(&organiser_text));
	let participant_wa = wa_me_link(
		&registration.phone,
		Some(&format!("{participant_text} - {ticket_url}")),
	);

	Json(json!({
		"ok": true,
		"ticketFilename": file_name,
		"ticketUrl": ticket_url,
		"organiserWa": organiser_wa,
		"participantWa": participant_wa,
	}))
	.into_response()
}

async fn ticket(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
	// Artifact names are flat; anything path-like is a miss.
	if name.contains("..") || name.contains('/') || name.contains('\\') {
		return (StatusCode::NOT_FOUND, "Not found").into_response();
	}
	let file = state.settings.ticket_dir.join(&name);
	match tokio::fs::read(&file).await {
		Ok(bytes) => ([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response(),
		Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
	}
}

async fn health() -> Json<Value> {
	Json(json!({ "ok": true }))
}

fn public_host(settings: &Settings) -> String {
	settings
		.public_host
		.clone()
		.unwrap_or_else(|| "http://localhost:3333".to_string())
}

fn organiser_message(registration: &Registration, event: &EventDetails) -> String {
	format!(
		"New registration:\nName: {}\nEmail: {}\nPhone: {}\nSector: {}\nRole: {}\nEvent: {}",
		registration.full_name,
		registration.email,
		registration.phone,
		registration.sector.as_deref().unwrap_or("-"),
		registration.role.as_deref().unwrap_or("-"),
		event.title,
	)
}

fn participant_message(full_name: &str, event_title: &str) -> String {
	format!("Thanks {full_name}! Here is your ticket for {event_title}.")
}

/// Client-side share link for opening the chat app directly.
fn wa_me_link(number: &str, text: Option<&str>) -> Option<String> {
	let digits = normalize_contact(number);
	if digits.is_empty() {
		return None;
	}
	let base = format!("https://wa.me/{digits}");
	match text {
		Some(text) => Url::parse_with_params(&base, [("text", text)])
			.map(|url| url.to_string())
			.ok(),
		None => Some(base),
	}
}
