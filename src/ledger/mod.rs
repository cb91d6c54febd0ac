//! The ledger: records of credits and debits and the counters they keep up to date.

mod core;
mod counters_endpoint;
mod create_endpoint;
mod create_page;
mod delete_endpoint;
mod form;
mod record_list;
mod records_table;
mod summary_page;

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{AppState, store::DocumentStore};

pub use core::{
    LedgerCounters, NewRecord, Record, RecordDate, Tag, TransactionType, create_record,
    delete_record, get_records, read_counters,
};
pub use counters_endpoint::get_counters;
pub use create_endpoint::create_record_endpoint;
pub use create_page::get_new_record_page;
pub use delete_endpoint::delete_record_endpoint;
pub use record_list::RecordList;
pub use records_table::get_records_table;
pub use summary_page::get_summary_page;

/// The state needed by the ledger route handlers that read or write the store.
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub store: Arc<dyn DocumentStore>,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }
}
