//! Browser-session automation engine.
//!
//! Serializes access to one shared, stateful interactive browser session
//! (logged into a messaging web client) to perform unattended tasks:
//! rendering ticket PDFs through isolated short-lived sessions, and
//! delivering messages/attachments through a web UI with unstable selectors
//! and recoverable login-state loss. The serial task queue is the single
//! ordering primitive; everything that touches a browser goes through it.

/// Message delivery workflow and its page-source seam.
pub mod delivery;
/// Engine error taxonomy.
pub mod error;
/// Driver-page adapter and the page primitive trait.
pub mod page;
/// FIFO task serialization for exclusive browser access.
pub mod queue;
/// Ticket render workflow, template substitution and QR helpers.
pub mod render;
/// Ordered selector-candidate resolution.
pub mod selector;
/// Shared interactive session lifecycle.
pub mod session;
/// Shared record types.
pub mod types;

pub use delivery::{Messenger, PageSource, normalize_contact};
pub use error::{EngineError, Result};
pub use page::{ChromiumPage, UiPage};
pub use queue::SerialQueue;
pub use render::template::{image_data_url, ticket_filename};
pub use render::{HeadlessChromium, RenderSession, RenderSessionFactory, TicketRenderer};
pub use selector::{ElementProbe, resolve_first};
pub use session::{BrowserProfile, SharedBrowser, SharedHandle};
pub use types::{DeliveryRequest, EventDetails, Registration};
