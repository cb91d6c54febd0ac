//! The table of records and the endpoint that re-renders it with the filters
//! and sort order from the query string.

use axum::{
    Extension,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use serde::{Deserialize, Deserializer};

use crate::{
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_DELETE_STYLE, CREDIT_BADGE_STYLE, DEBIT_BADGE_STYLE, FORM_TEXT_INPUT_STYLE,
        LINK_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, format_currency,
    },
    identity::Identity,
    ledger::{LedgerState, Record, RecordList, TransactionType, core::get_records},
};

/// The filters and sort order of the record table.
#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    /// Only show records whose date contains this text.
    #[serde(default)]
    pub date: String,
    /// Only show records of this type. The empty string means every type.
    #[serde(default, rename = "type", deserialize_with = "empty_as_none")]
    pub transaction_type: Option<TransactionType>,
    /// Show the oldest records first.
    #[serde(default)]
    pub ascending: bool,
    /// Clear the filters and the sort order, ignoring the other fields.
    #[serde(default)]
    pub reset: bool,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<TransactionType>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;

    match text.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl RecordsQuery {
    /// Build a [RecordList] from `records` with this query's filters and sort order applied.
    pub fn apply(&self, records: Vec<Record>) -> RecordList {
        let mut list = RecordList::new(records);

        list.set_date_filter(&self.date);
        list.set_type_filter(self.transaction_type);
        if self.ascending {
            list.toggle_sort();
        }
        if self.reset {
            list.reset();
        }

        list
    }
}

/// Sent by the reset button in place of the form fields.
const RESET_VALUES: &str = r#"{"reset": true}"#;

/// The filter controls that drive the record table.
pub fn record_filters(list: &RecordList) -> Markup {
    let type_filter = list.type_filter();

    html! {
        form
            id="record-filters"
            hx-get=(endpoints::RECORDS_API)
            hx-target="#records-table"
            hx-swap="outerHTML"
            hx-trigger="input delay:300ms, change"
            hx-include="#sort-order"
            hx-target-error="#alert-container"
            class="flex flex-wrap items-center gap-2 mb-4"
        {
            input
                type="search"
                name="date"
                aria-label="Search by date"
                placeholder="Search by date, e.g. Mar 2024"
                value=(list.date_filter())
                class={"max-w-64 " (FORM_TEXT_INPUT_STYLE)};

            select
                name="type"
                aria-label="Filter by type"
                class={"max-w-32 " (FORM_TEXT_INPUT_STYLE)}
            {
                option value="" selected[type_filter.is_none()] { "All" }
                @for transaction_type in [TransactionType::Credit, TransactionType::Debit] {
                    option
                        value=(transaction_type.as_str())
                        selected[type_filter == Some(transaction_type)]
                    {
                        (transaction_type.as_str())
                    }
                }
            }

            button
                type="reset"
                hx-get=(endpoints::RECORDS_API)
                hx-target="#records-table"
                hx-swap="outerHTML"
                hx-vals=(RESET_VALUES)
                hx-params="reset"
                class=(LINK_STYLE)
            {
                "Reset"
            }
        }
    }
}

fn type_badge(transaction_type: TransactionType) -> Markup {
    let style = match transaction_type {
        TransactionType::Credit => CREDIT_BADGE_STYLE,
        TransactionType::Debit => DEBIT_BADGE_STYLE,
    };

    html!( span class=(style) { (transaction_type) } )
}

fn record_row(serial_number: usize, record: &Record) -> Markup {
    html! {
        tr class=(TABLE_ROW_STYLE) data-record-id=(record.id)
        {
            td class=(TABLE_CELL_STYLE) { (serial_number) }
            td class=(TABLE_CELL_STYLE) { (record.date) }
            td class=(TABLE_CELL_STYLE) { (record.tag) }
            td class={"text-right " (TABLE_CELL_STYLE)} { (format_currency(record.amount)) }
            td class=(TABLE_CELL_STYLE) { (type_badge(record.transaction_type)) }
            td class=(TABLE_CELL_STYLE)
            {
                button
                    hx-delete=(format_endpoint(endpoints::RECORD, &record.id))
                    hx-confirm={
                        "Are you sure you want to delete the " (record.transaction_type)
                        " of " (format_currency(record.amount)) " on " (record.date) "?"
                    }
                    hx-target="closest tr"
                    hx-target-error="#alert-container"
                    hx-swap="delete"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }
            }
        }
    }
}

/// The record table, including the sort toggle and the hidden sort order that
/// the filter form sends along.
pub fn records_table(list: &RecordList) -> Markup {
    let ascending = list.is_ascending();
    let sort_label = if ascending { "Date ▲" } else { "Date ▼" };
    let toggled_sort = format!(r#"{{"ascending": {}}}"#, !ascending);

    html! {
        div id="records-table" class="relative overflow-x-auto"
        {
            input type="hidden" id="sort-order" name="ascending" value=(ascending);

            table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "#" }
                        th scope="col" class=(TABLE_CELL_STYLE)
                        {
                            button
                                id="sort-toggle"
                                type="button"
                                hx-get=(endpoints::RECORDS_API)
                                hx-include="#record-filters"
                                hx-vals=(toggled_sort)
                                hx-target="#records-table"
                                hx-swap="outerHTML"
                                hx-target-error="#alert-container"
                                class="uppercase"
                            {
                                (sort_label)
                            }
                        }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Tag" }
                        th scope="col" class={"text-right " (TABLE_CELL_STYLE)} { "Amount" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Type" }
                        th scope="col" class=(TABLE_CELL_STYLE) { span class="sr-only" { "Actions" } }
                    }
                }

                tbody
                {
                    @for (index, record) in list.records().iter().enumerate() {
                        (record_row(index + 1, record))
                    }

                    @if list.records().is_empty() {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td colspan="6" class={"text-center " (TABLE_CELL_STYLE)}
                            {
                                @if list.master().is_empty() {
                                    "No records yet. Add a credit to get started."
                                } @else {
                                    "No records match the filters."
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// A route handler that renders the record table for the filters and sort
/// order in the query string.
pub async fn get_records_table(
    State(state): State<LedgerState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<RecordsQuery>,
) -> Response {
    match get_records(state.store.as_ref(), &identity) {
        Ok(records) => records_table(&query.apply(records)).into_response(),
        Err(error) => {
            tracing::error!("Could not get records for {}: {error}", identity.id);
            error.into_alert_response()
        }
    }
}
