//! Access to the card portal via its server-rendered forms.
//!
//! - `form_state` pulls the hidden anti-forgery and view-state fields out of a page
//! - `session` runs the sign-in sequence and downloads card usage exports

pub mod form_state;
pub mod session;

pub use form_state::FormState;
pub use session::{AuthOutcome, Credentials, PortalConfig, Session, SessionState};
