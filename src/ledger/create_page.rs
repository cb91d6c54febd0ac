//! Defines the route handler for the page for adding a new record.

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error, endpoints,
    html::{FORM_CONTAINER_STYLE, base, dollar_input_styles},
    ledger::form::{RecordFormValues, record_form},
    navigation::NavBar,
    timezone::get_local_offset,
};

/// The state needed for the new record page.
#[derive(Debug, Clone)]
pub struct NewRecordPageState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for NewRecordPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

fn new_record_view(today: Date) -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_RECORD_VIEW).into_html();
    let form = record_form(&RecordFormValues::new(today), &Default::default());

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md"
            {
                (form)
            }
        }
    };

    base("Add Record", &[dollar_input_styles()], &content)
}

/// Renders the page for adding a record, with the date set to today in the server's timezone.
pub async fn get_new_record_page(State(state): State<NewRecordPageState>) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        return Error::InvalidTimezoneError(state.local_timezone).into_response();
    };

    let today = OffsetDateTime::now_utc().to_offset(local_offset).date();

    new_record_view(today).into_response()
}
