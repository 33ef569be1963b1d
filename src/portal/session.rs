//! Authenticated scrape session against the card portal.
//!
//! The portal exposes no API. A session replays what a browser does: fetch
//! the sign-in page, echo its hidden tokens back with the credentials, then
//! reuse the cookie jar for the card list and the usage export.

use super::form_state::{self, FormState};
use crate::error::{Error, Result};
use crate::usage::{decode, UsageOptions, UsageRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.compasscard.ca";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const SIGN_IN_PATH: &str = "/SignIn";
const MANAGE_CARDS_PATH: &str = "/ManageCards";
const USAGE_EXPORT_PATH: &str = "/handlers/compasscardusagepdf.ashx";

/// Submit button of the sign-in form. Its presence after a login post means
/// the portal bounced us back to the sign-in page.
pub const SIGN_IN_BUTTON: &str = "ctl00$Content$btnSignIn";
const SIGN_OUT_TARGET: &str = "ctl00$btnSignOut";
const CARD_SERIAL_INPUT_ID: &str = "Content_ManageCard_hfSerialNo";
const USAGE_REPORT_TYPE: &str = "2";

/// Layout the export endpoint expects for `start`/`end`: a 24-hour clock hour
/// followed by an AM/PM marker, e.g. `31/01/2024 23:59:59 PM`.
const PORTAL_TIME_LAYOUT: &str = "%d/%m/%Y %H:%M:%S %p";

/// Where and how to reach the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Global timeout for each request. `None` waits indefinitely.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_SECS)
}

/// Portal account credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a session is in the sign-in sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    TokensCaptured,
    Authenticated,
}

/// Result of submitting credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    InvalidCredentials,
}

/// A cookie-bearing client holding the tokens of one sign-in page fetch.
///
/// Requests are strictly sequential. A session must not be shared between
/// concurrent callers: the captured tokens belong to a single sign-in flow.
pub struct Session {
    agent: ureq::Agent,
    base_url: String,
    tokens: FormState,
    state: SessionState,
}

impl Session {
    /// Fetches the sign-in page and captures its form tokens.
    pub fn open(config: &PortalConfig) -> Result<Self> {
        Self::open_with_agent(config, build_agent(config))
    }

    /// Like [`Session::open`], but issues every request through `agent`.
    ///
    /// The agent's cookie jar is shared with the caller, who can inspect or
    /// reuse the portal cookies. `config.timeout_secs` is ignored; the agent's
    /// own configuration applies.
    pub fn open_with_agent(config: &PortalConfig, agent: ureq::Agent) -> Result<Self> {
        let mut session = Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens: FormState::default(),
            state: SessionState::Unauthenticated,
        };
        session.capture_tokens()?;
        Ok(session)
    }

    /// Opens a session and signs in, failing on rejected credentials.
    pub fn connect(config: &PortalConfig, credentials: &Credentials) -> Result<Self> {
        let mut session = Self::open(config)?;
        match session.login(credentials)? {
            AuthOutcome::Authenticated => Ok(session),
            AuthOutcome::InvalidCredentials => Err(Error::InvalidCredentials),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tokens(&self) -> &FormState {
        &self.tokens
    }

    fn capture_tokens(&mut self) -> Result<()> {
        let page = self.get_page(SIGN_IN_PATH)?;
        self.tokens = form_state::extract(&page);
        if self.tokens.csrf_token.is_empty() {
            tracing::warn!("Sign-in page carried no anti-forgery token; login will likely fail");
        } else if !self.tokens.is_complete() {
            tracing::debug!("Sign-in page is missing some view-state tokens");
        }
        self.state = SessionState::TokensCaptured;
        Ok(())
    }

    /// Posts the credentials together with the captured tokens.
    ///
    /// The portal answers a failed sign-in by rendering the sign-in form
    /// again, so the response page is checked for its submit button.
    pub fn login(&mut self, credentials: &Credentials) -> Result<AuthOutcome> {
        match self.state {
            SessionState::Authenticated => return Ok(AuthOutcome::Authenticated),
            SessionState::Unauthenticated => self.capture_tokens()?,
            SessionState::TokensCaptured => {}
        }

        let tokens = &self.tokens;
        let form = [
            ("__CSRFTOKEN", tokens.csrf_token.as_str()),
            ("__EVENTTARGET", ""),
            ("__EVENTARGUMENT", ""),
            ("ctl00$txtSignInEmail", ""),
            ("ctl00$txtSignInPassword", ""),
            ("ctl00$Content$passwordInfo$email", ""),
            ("__VIEWSTATE", tokens.view_state.as_str()),
            ("__VIEWSTATEGENERATOR", tokens.view_state_generator.as_str()),
            ("__EVENTVALIDATION", tokens.event_validation.as_str()),
            (SIGN_IN_BUTTON, "Sign in"),
            (
                "ctl00$Content$emailInfo$txtEmail",
                credentials.username.as_str(),
            ),
            (
                "ctl00$Content$passwordInfo$txtPassword",
                credentials.password.as_str(),
            ),
        ];

        let page = self
            .agent
            .post(self.url(SIGN_IN_PATH))
            .send_form(form)?
            .body_mut()
            .read_to_string()?;

        if form_state::has_named_input(&page, SIGN_IN_BUTTON) {
            tracing::warn!(username = %credentials.username, "Portal rejected sign-in");
            return Ok(AuthOutcome::InvalidCredentials);
        }

        tracing::debug!(username = %credentials.username, "Signed in to portal");
        self.state = SessionState::Authenticated;
        Ok(AuthOutcome::Authenticated)
    }

    /// Lists the serial numbers of the cards on the account, in page order.
    pub fn cards(&self) -> Result<Vec<String>> {
        self.require_authenticated()?;
        let page = self.get_page(MANAGE_CARDS_PATH)?;
        Ok(form_state::values_by_id(&page, CARD_SERIAL_INPUT_ID))
    }

    /// Downloads and decodes the usage export for one card.
    ///
    /// Returns the decoded records together with the raw export bytes.
    pub fn usage(
        &self,
        card: &str,
        options: &UsageOptions,
    ) -> Result<(Vec<UsageRecord>, Vec<u8>)> {
        self.require_authenticated()?;
        let start = format_portal_time(options.start);
        let end = format_portal_time(options.end);

        tracing::debug!(card, %start, %end, "Requesting usage export");
        let raw = self
            .agent
            .get(self.url(USAGE_EXPORT_PATH))
            .query_pairs([
                ("type", USAGE_REPORT_TYPE),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("ccsn", card),
                ("csv", "true"),
            ])
            .call()?
            .body_mut()
            .read_to_vec()?;

        let records = decode(&raw)?;
        Ok((records, raw))
    }

    /// Posts the sign-out event back to the portal. Best-effort: the session
    /// state is left as is.
    pub fn sign_out(&self) -> Result<()> {
        let tokens = &self.tokens;
        let form = [
            ("__CSRFTOKEN", tokens.csrf_token.as_str()),
            ("__VIEWSTATE", tokens.view_state.as_str()),
            ("__EVENTTARGET", SIGN_OUT_TARGET),
            ("__EVENTARGUMENT", ""),
            ("__VIEWSTATEGENERATOR", tokens.view_state_generator.as_str()),
            ("__EVENTVALIDATION", tokens.event_validation.as_str()),
        ];
        self.agent
            .post(self.url(MANAGE_CARDS_PATH))
            .send_form(form)?;
        Ok(())
    }

    fn require_authenticated(&self) -> Result<()> {
        if self.state == SessionState::Authenticated {
            Ok(())
        } else {
            Err(Error::NotAuthenticated)
        }
    }

    fn get_page(&self, path: &str) -> Result<String> {
        let page = self
            .agent
            .get(self.url(path))
            .call()?
            .body_mut()
            .read_to_string()?;
        Ok(page)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn build_agent(config: &PortalConfig) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(config.timeout_secs.map(Duration::from_secs))
        .build()
        .into()
}

/// Formats an instant the way the export endpoint parses it.
pub fn format_portal_time(instant: NaiveDateTime) -> String {
    instant.format(PORTAL_TIME_LAYOUT).to_string()
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
