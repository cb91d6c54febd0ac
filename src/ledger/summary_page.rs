//! The summary page: the ledger counters above the record table.

use axum::{
    Extension,
    extract::State,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};

use crate::{
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, PAGE_CONTAINER_STYLE, base},
    identity::Identity,
    ledger::{
        LedgerCounters, LedgerState, RecordList,
        core::{get_records, read_counters},
        counters_endpoint::counters_view,
        records_table::{record_filters, records_table},
    },
    navigation::NavBar,
};

fn summary_view(identity: &Identity, counters: &LedgerCounters, records: &RecordList) -> Markup {
    let nav_bar = NavBar::new(endpoints::SUMMARY_VIEW).into_html();
    let greeting = match &identity.email {
        Some(email) => email.as_str(),
        None => "Guest",
    };

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="flex flex-wrap items-center justify-between gap-4 mb-6"
            {
                div
                {
                    h1 class="text-2xl font-bold text-gray-900 dark:text-white" { "Summary" }
                    p class="text-sm text-gray-500 dark:text-gray-400" { "Signed in as " (greeting) }
                }

                a href=(endpoints::NEW_RECORD_VIEW) class={"max-w-48 text-center " (BUTTON_PRIMARY_STYLE)}
                {
                    "Add Record"
                }
            }

            (counters_view(counters))

            (record_filters(records))
            (records_table(records))
        }
    };

    base("Summary", &[], &content)
}

/// Renders the summary page of the signed-in identity.
pub async fn get_summary_page(
    State(state): State<LedgerState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let counters = match read_counters(state.store.as_ref(), &identity) {
        Ok(counters) => counters,
        Err(error) => {
            tracing::error!("Could not read the counters of {}: {error}", identity.id);
            return error.into_response();
        }
    };

    let records = match get_records(state.store.as_ref(), &identity) {
        Ok(records) => RecordList::new(records),
        Err(error) => {
            tracing::error!("Could not get the records of {}: {error}", identity.id);
            return error.into_response();
        }
    };

    summary_view(&identity, &counters, &records).into_response()
}
