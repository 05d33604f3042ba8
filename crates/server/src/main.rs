//! `ticketryd` — event registration server.
//!
//! Accepts registrations over HTTP, renders an A5 ticket PDF per registrant
//! and pushes organiser/participant notifications through a shared
//! browser-driven messaging session.

mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::routes::AppState;

#[derive(Debug, Parser)]
#[command(name = "ticketryd", about = "Event registration and ticket delivery server")]
struct Args {
	/// Port to listen on.
	#[arg(long, env = "PORT", default_value_t = 3333)]
	port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let args = Args::parse();
	let settings = Settings::from_env();

	tokio::fs::create_dir_all(&settings.ticket_dir)
		.await
		.with_context(|| format!("creating ticket dir {}", settings.ticket_dir.display()))?;

	info!(
		port = args.port,
		ticket_dir = %settings.ticket_dir.display(),
		autosend = settings.autosend,
		"starting"
	);

	let state = Arc::new(AppState::new(settings));
	let app = routes::router(state);

	let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
		.await
		.with_context(|| format!("binding port {}", args.port))?;
	axum::serve(listener, app).await.context("serving")?;
	Ok(())
}
