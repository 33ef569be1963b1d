//! Extraction of hidden form fields from portal pages.
//!
//! The portal is a server-rendered form application: every postback must echo
//! the anti-forgery and view-state values the previous page embedded as
//! hidden inputs.

use scraper::{ElementRef, Html};

pub const CSRF_TOKEN_FIELD: &str = "__CSRFTOKEN";
pub const EVENT_VALIDATION_FIELD: &str = "__EVENTVALIDATION";
pub const VIEW_STATE_FIELD: &str = "__VIEWSTATE";
pub const VIEW_STATE_GENERATOR_FIELD: &str = "__VIEWSTATEGENERATOR";

/// Hidden values captured from a single page fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub csrf_token: String,
    pub event_validation: String,
    pub view_state: String,
    pub view_state_generator: String,
}

impl FormState {
    /// True when every token was found on the page.
    pub fn is_complete(&self) -> bool {
        !self.csrf_token.is_empty()
            && !self.event_validation.is_empty()
            && !self.view_state.is_empty()
            && !self.view_state_generator.is_empty()
    }
}

/// Captures the four form tokens from a page.
///
/// Inputs are visited in document order, so when a token appears more than
/// once the last occurrence wins. Missing tokens are left empty.
pub fn extract(markup: &str) -> FormState {
    let doc = Html::parse_document(markup);
    let mut state = FormState::default();

    for input in inputs(&doc) {
        let Some(value) = input.value().attr("value") else {
            continue;
        };
        let slot = if has_name(input, CSRF_TOKEN_FIELD) {
            &mut state.csrf_token
        } else if has_name(input, EVENT_VALIDATION_FIELD) {
            &mut state.event_validation
        } else if has_name(input, VIEW_STATE_FIELD) {
            &mut state.view_state
        } else if has_name(input, VIEW_STATE_GENERATOR_FIELD) {
            &mut state.view_state_generator
        } else {
            continue;
        };
        *slot = value.to_string();
    }

    state
}

/// Values of every input whose `id` equals `id`, in document order.
pub fn values_by_id(markup: &str, id: &str) -> Vec<String> {
    let doc = Html::parse_document(markup);
    inputs(&doc)
        .filter(|input| input.value().id() == Some(id))
        .filter_map(|input| input.value().attr("value").map(str::to_string))
        .collect()
}

/// True when the page contains an input named `name`.
pub fn has_named_input(markup: &str, name: &str) -> bool {
    let doc = Html::parse_document(markup);
    for input in inputs(&doc) {
        if has_name(input, name) {
            return true;
        }
    }
    false
}

/// Depth-first walk over every `input` element.
fn inputs(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "input")
}

fn has_name(input: ElementRef<'_>, name: &str) -> bool {
    input
        .value()
        .attrs()
        .any(|(key, value)| key == "name" && value == name)
}

#[cfg(test)]
#[path = "tests/form_state_tests.rs"]
mod tests;
