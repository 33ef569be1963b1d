//! Shared fixtures for tests: a local fake of the card portal and a helper
//! to serve any router on an ephemeral port.

use axum::extract::{Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const FAKE_CSRF: &str = "csrf-token-1";
pub const FAKE_VIEW_STATE: &str = "view-state-1";
pub const FAKE_GENERATOR: &str = "C2EE9ABB";
pub const FAKE_VALIDATION: &str = "validation-1";
pub const FAKE_USERNAME: &str = "rider@example.com";
pub const FAKE_PASSWORD: &str = "correct horse";
pub const FAKE_CARDS: [&str; 2] = ["01640000000000000001", "01640000000000000002"];
const SESSION_COOKIE: &str = "PortalSession=abc123";

pub const USAGE_CSV: &str = "DateTime,Transaction,Product,Line Item,Amount,BalanceDetails,OrderDate,Payment,OrderNumber,AuthCode,Total\n\
Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,\n";

/// Everything the fake portal received.
#[derive(Debug, Default)]
pub struct Recorded {
    pub sign_in_page_loads: usize,
    pub login_forms: Vec<HashMap<String, String>>,
    pub manage_cards_cookies: Vec<Option<String>>,
    pub usage_queries: Vec<HashMap<String, String>>,
    pub sign_out_forms: Vec<HashMap<String, String>>,
}

#[derive(Clone, Default)]
struct PortalState {
    recorded: Arc<Mutex<Recorded>>,
}

pub struct FakePortal {
    pub base_url: String,
    pub recorded: Arc<Mutex<Recorded>>,
}

/// Serves `router` on 127.0.0.1 from a background thread and returns its
/// base URL.
pub fn serve(router: Router) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    format!("http://{}", addr)
}

pub fn spawn_fake_portal() -> FakePortal {
    let state = PortalState::default();
    let recorded = state.recorded.clone();
    let router = Router::new()
        .route("/SignIn", get(sign_in_page).post(sign_in_post))
        .route("/ManageCards", get(manage_cards).post(sign_out))
        .route("/handlers/compasscardusagepdf.ashx", get(usage_export))
        .with_state(state);
    FakePortal {
        base_url: serve(router),
        recorded,
    }
}

fn sign_in_markup() -> String {
    format!(
        r#"<!DOCTYPE html><html><body><form method="post" action="./SignIn">
<input type="hidden" name="__CSRFTOKEN" value="{}" />
<input type="hidden" name="__VIEWSTATE" value="{}" />
<input type="hidden" name="__VIEWSTATEGENERATOR" value="{}" />
<input type="hidden" name="__EVENTVALIDATION" value="{}" />
<input type="email" name="ctl00$Content$emailInfo$txtEmail" />
<input type="password" name="ctl00$Content$passwordInfo$txtPassword" />
<input type="submit" name="ctl00$Content$btnSignIn" value="Sign in" />
</form></body></html>"#,
        FAKE_CSRF, FAKE_VIEW_STATE, FAKE_GENERATOR, FAKE_VALIDATION
    )
}

async fn sign_in_page(State(state): State<PortalState>) -> Html<String> {
    state.recorded.lock().unwrap().sign_in_page_loads += 1;
    Html(sign_in_markup())
}

async fn sign_in_post(
    State(state): State<PortalState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let accepted = form.get("__CSRFTOKEN").map(String::as_str) == Some(FAKE_CSRF)
        && form.get("ctl00$Content$emailInfo$txtEmail").map(String::as_str) == Some(FAKE_USERNAME)
        && form.get("ctl00$Content$passwordInfo$txtPassword").map(String::as_str)
            == Some(FAKE_PASSWORD);
    state.recorded.lock().unwrap().login_forms.push(form);

    if accepted {
        (
            [(SET_COOKIE, format!("{}; Path=/", SESSION_COOKIE))],
            Html("<html><body><h1>My Cards</h1></body></html>".to_string()),
        )
            .into_response()
    } else {
        Html(sign_in_markup()).into_response()
    }
}

async fn manage_cards(State(state): State<PortalState>, headers: HeaderMap) -> Html<String> {
    let cookie = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .recorded
        .lock()
        .unwrap()
        .manage_cards_cookies
        .push(cookie);

    let cards: String = FAKE_CARDS
        .iter()
        .map(|serial| {
            format!(
                r#"<div class="card"><input type="hidden" id="Content_ManageCard_hfSerialNo" value="{}" /></div>"#,
                serial
            )
        })
        .collect();
    Html(format!("<html><body>{}</body></html>", cards))
}

async fn sign_out(
    State(state): State<PortalState>,
    Form(form): Form<HashMap<String, String>>,
) -> Html<String> {
    state.recorded.lock().unwrap().sign_out_forms.push(form);
    Html(sign_in_markup())
}

async fn usage_export(
    State(state): State<PortalState>,
    Query(query): Query<HashMap<String, String>>,
) -> String {
    state.recorded.lock().unwrap().usage_queries.push(query);
    USAGE_CSV.to_string()
}
