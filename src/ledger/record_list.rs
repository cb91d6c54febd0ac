//! The filterable, sortable list of records shown on the summary page.

use std::cmp::Ordering;

use crate::ledger::{Record, TransactionType};

/// Holds the master list of an identity's records and the filtered, sorted
/// view derived from it.
///
/// The master list is sorted newest first when the list is built. The view is
/// recomputed whenever a filter or the sort direction changes. Ascending order
/// is the master order reversed, so records with the same date swap places.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordList {
    master: Vec<Record>,
    view: Vec<Record>,
    date_filter: String,
    type_filter: Option<TransactionType>,
    ascending: bool,
}

impl RecordList {
    /// Build the list from records in the order they were fetched.
    ///
    /// Records are sorted by date, newest first. Records with the same date
    /// keep their fetch order and dates that cannot be parsed go last.
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| match (a.date.to_date(), b.date.to_date()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        Self {
            view: records.clone(),
            master: records,
            date_filter: String::new(),
            type_filter: None,
            ascending: false,
        }
    }

    /// The records to display, filtered and in the current sort order.
    pub fn records(&self) -> &[Record] {
        &self.view
    }

    /// Every record, newest first, ignoring the filters.
    pub fn master(&self) -> &[Record] {
        &self.master
    }

    pub fn date_filter(&self) -> &str {
        &self.date_filter
    }

    pub fn type_filter(&self) -> Option<TransactionType> {
        self.type_filter
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Only show records whose formatted date contains `filter`, ignoring case.
    ///
    /// An empty string shows every date.
    pub fn set_date_filter(&mut self, filter: &str) {
        self.date_filter = filter.to_owned();
        self.derive();
    }

    /// Only show records of `transaction_type`, or every type for `None`.
    pub fn set_type_filter(&mut self, transaction_type: Option<TransactionType>) {
        self.type_filter = transaction_type;
        self.derive();
    }

    /// Switch between newest first and oldest first.
    pub fn toggle_sort(&mut self) {
        self.ascending = !self.ascending;
        self.derive();
    }

    /// Clear the filters and the sort flag and show the master list again.
    pub fn reset(&mut self) {
        self.date_filter.clear();
        self.type_filter = None;
        self.ascending = false;
        self.view = self.master.clone();
    }

    fn derive(&mut self) {
        let date_filter = self.date_filter.to_lowercase();

        let mut view: Vec<Record> = self
            .master
            .iter()
            .filter(|record| {
                date_filter.is_empty()
                    || record
                        .date
                        .as_str()
                        .to_lowercase()
                        .contains(&date_filter)
            })
            .filter(|record| {
                self.type_filter
                    .is_none_or(|transaction_type| record.transaction_type == transaction_type)
            })
            .cloned()
            .collect();

        if self.ascending {
            view.reverse();
        }

        self.view = view;
    }
}
