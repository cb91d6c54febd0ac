//! Defines the ledger data model and the sequences that keep the ledger
//! counters in step with the records.
//!
//! Every identity owns three counters (`balance`, `income` and `expense`) and a
//! map of records under `records/<id>`. Creating or deleting a record reads the
//! counters, writes the changed counters and then writes or removes the record.
//! Each step is a separate store call: concurrent mutations for the same
//! identity can lose updates, and a failure part way through leaves the earlier
//! writes in place.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, Month};
use uuid::Uuid;

use crate::{
    Error,
    identity::Identity,
    store::{DocumentStore, StorePath},
};

/// The short English month names used in record dates.
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Whether a record adds money to or takes money from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "Credit",
            TransactionType::Debit => "Debit",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(TransactionType::Credit),
            "Debit" => Ok(TransactionType::Debit),
            other => Err(Error::InvalidTransactionType(other.to_owned())),
        }
    }
}

/// The sector a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    #[serde(rename = "Food 🍜")]
    Food,
    #[serde(rename = "Income 💰")]
    Income,
    #[serde(rename = "Entertainment 📺")]
    Entertainment,
    #[serde(rename = "Lifestyle 🏋️‍♂️")]
    Lifestyle,
}

impl Tag {
    /// Every tag, in the order they are offered in the record form.
    pub const ALL: [Tag; 4] = [Tag::Food, Tag::Income, Tag::Entertainment, Tag::Lifestyle];

    pub fn label(&self) -> &'static str {
        match self {
            Tag::Food => "Food 🍜",
            Tag::Income => "Income 💰",
            Tag::Entertainment => "Entertainment 📺",
            Tag::Lifestyle => "Lifestyle 🏋️‍♂️",
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.label() == s)
            .ok_or_else(|| Error::InvalidTag(s.to_owned()))
    }
}

/// The date of a record as it is stored and shown, e.g. "5 Mar 2024".
///
/// Records written by other clients may hold dates in any format, so the
/// string is kept as is and only parsed when needed for sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordDate(String);

impl RecordDate {
    /// Format `date` as "D Mon YYYY" without zero padding.
    pub fn from_date(date: Date) -> Self {
        let month = MONTHS[usize::from(u8::from(date.month())) - 1];

        Self(format!("{} {} {}", date.day(), month, date.year()))
    }

    /// Build a date from the day, short month name and year entered in the record form.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDate] if `month` is not one of [MONTHS] or the
    /// day does not exist in that month.
    pub fn from_parts(day: u8, month: &str, year: i32) -> Result<Self, Error> {
        let month = parse_month(month)
            .ok_or_else(|| Error::InvalidDate(format!("{month} is not a month")))?;
        let date = Date::from_calendar_date(year, month, day)
            .map_err(|error| Error::InvalidDate(error.to_string()))?;

        Ok(Self::from_date(date))
    }

    /// Wrap a date string read from the store.
    pub fn new_unchecked(date: &str) -> Self {
        Self(date.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the date, or `None` if it is not in the "D Mon YYYY" format.
    pub fn to_date(&self) -> Option<Date> {
        let mut parts = self.0.split_whitespace();
        let day = parts.next()?.parse::<u8>().ok()?;
        let month = parse_month(parts.next()?)?;
        let year = parts.next()?.parse::<i32>().ok()?;

        if parts.next().is_some() {
            return None;
        }

        Date::from_calendar_date(year, month, day).ok()
    }
}

impl Display for RecordDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_month(month: &str) -> Option<Month> {
    let index = MONTHS.iter().position(|name| name.eq_ignore_ascii_case(month))?;

    Month::try_from(index as u8 + 1).ok()
}

/// The last day of `month` (one of [MONTHS]) in `year`, or `None` for an unknown month.
pub fn last_day_of_month(month: &str, year: i32) -> Option<u8> {
    parse_month(month).map(|month| time::util::days_in_year_month(year, month))
}

/// A credit or debit stored under `<identity>/records/<id>`.
///
/// Records are never changed after they are created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub date: RecordDate,
    pub tag: Tag,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
}

/// The fields of a record that is about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub date: RecordDate,
    pub tag: Tag,
    pub transaction_type: TransactionType,
    pub amount: f64,
}

/// The running totals of an identity's ledger.
///
/// The ledger tries to keep `balance == income - expense` and never lets a
/// debit take the balance below zero, but neither is enforced by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerCounters {
    pub balance: f64,
    pub income: f64,
    pub expense: f64,
}

/// The store paths of one identity's ledger.
#[derive(Debug, Clone)]
pub(crate) struct LedgerPaths {
    pub balance: StorePath,
    pub income: StorePath,
    pub expense: StorePath,
    pub records: StorePath,
}

impl LedgerPaths {
    pub(crate) fn new(identity: &Identity) -> Result<Self, Error> {
        let root = identity.store_root()?;

        Ok(Self {
            balance: root.child("balance")?,
            income: root.child("income")?,
            expense: root.child("expense")?,
            records: root.child("records")?,
        })
    }

    fn record(&self, record_id: &str) -> Result<StorePath, Error> {
        self.records.child(record_id)
    }
}

/// Read one counter, treating a missing value as zero.
fn read_counter(store: &dyn DocumentStore, path: &StorePath) -> Result<f64, Error> {
    match store.get(path)? {
        None => Ok(0.0),
        Some(value) => counter_from_value(path, &value),
    }
}

pub(crate) fn counter_from_value(path: &StorePath, value: &Value) -> Result<f64, Error> {
    value.as_f64().ok_or_else(|| Error::InvalidStoredValue {
        path: path.to_string(),
        reason: format!("expected a number, got {value}"),
    })
}

/// Read the three ledger counters of `identity`, each defaulting to zero.
///
/// # Errors
///
/// Returns an error if the store could not be read or a counter is not a number.
pub fn read_counters(
    store: &dyn DocumentStore,
    identity: &Identity,
) -> Result<LedgerCounters, Error> {
    let paths = LedgerPaths::new(identity)?;

    Ok(LedgerCounters {
        balance: read_counter(store, &paths.balance)?,
        income: read_counter(store, &paths.income)?,
        expense: read_counter(store, &paths.expense)?,
    })
}

/// Record a credit or debit for `identity` and update the ledger counters.
///
/// The counters are read one by one. A debit larger than the balance fails
/// before anything is written. Otherwise the income (credit) or expense
/// (debit) counter is written, then the balance, then the record under a
/// fresh random ID. A failure part way through is returned as is; the writes
/// that already happened are not undone.
///
/// # Errors
///
/// Returns:
/// - [Error::InvalidAmount] if the amount is not a finite number greater than zero,
/// - [Error::InsufficientFunds] if a debit is larger than the balance,
/// - any error from the store.
pub fn create_record(
    store: &dyn DocumentStore,
    identity: &Identity,
    new_record: NewRecord,
) -> Result<Record, Error> {
    let amount = new_record.amount;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount(amount));
    }

    let paths = LedgerPaths::new(identity)?;

    let mut balance = read_counter(store, &paths.balance)?;
    let mut income = read_counter(store, &paths.income)?;
    let mut expense = read_counter(store, &paths.expense)?;

    match new_record.transaction_type {
        TransactionType::Debit => {
            if amount > balance {
                tracing::debug!(
                    "Rejected debit of {amount} for {}, balance is {balance}",
                    identity.id
                );
                return Err(Error::InsufficientFunds { balance, amount });
            }

            expense += amount;
            balance -= amount;
            store.set(&paths.expense, Value::from(expense))?;
            store.set(&paths.balance, Value::from(balance))?;
        }
        TransactionType::Credit => {
            income += amount;
            balance += amount;
            store.set(&paths.income, Value::from(income))?;
            store.set(&paths.balance, Value::from(balance))?;
        }
    }

    let record = Record {
        id: Uuid::new_v4().to_string(),
        date: new_record.date,
        tag: new_record.tag,
        transaction_type: new_record.transaction_type,
        amount,
    };
    store.set(&paths.record(&record.id)?, serde_json::to_value(&record)?)?;

    tracing::info!(
        "Created {} record {} of {amount} for {}",
        record.transaction_type,
        record.id,
        identity.id
    );

    Ok(record)
}

/// Delete the record `record_id` of `identity` and reverse its effect on the counters.
///
/// Removing a debit gives the amount back to the balance and takes it off the
/// expense counter. Removing a credit takes the amount off the balance and the
/// income counter. The changed counter and the balance are written before the
/// record is removed, and nothing is undone if a later step fails.
///
/// # Errors
///
/// Returns [Error::DeleteMissingRecord] if there is no such record, or any
/// error from the store.
pub fn delete_record(
    store: &dyn DocumentStore,
    identity: &Identity,
    record_id: &str,
) -> Result<(), Error> {
    let paths = LedgerPaths::new(identity)?;
    let record_path = paths
        .record(record_id)
        .map_err(|_| Error::DeleteMissingRecord)?;

    let record = match store.get(&record_path)? {
        Some(value) => decode_record(&record_path, value)?,
        None => return Err(Error::DeleteMissingRecord),
    };

    let mut balance = read_counter(store, &paths.balance)?;
    let mut income = read_counter(store, &paths.income)?;
    let mut expense = read_counter(store, &paths.expense)?;

    match record.transaction_type {
        TransactionType::Debit => {
            expense -= record.amount;
            balance += record.amount;
            store.set(&paths.expense, Value::from(expense))?;
        }
        TransactionType::Credit => {
            income -= record.amount;
            balance -= record.amount;
            store.set(&paths.income, Value::from(income))?;
        }
    }
    store.set(&paths.balance, Value::from(balance))?;

    store.remove(&record_path)?;

    tracing::info!("Deleted record {record_id} for {}", identity.id);

    Ok(())
}

fn decode_record(path: &StorePath, value: Value) -> Result<Record, Error> {
    serde_json::from_value(value).map_err(|error| Error::InvalidStoredValue {
        path: path.to_string(),
        reason: error.to_string(),
    })
}

/// Fetch every record of `identity` in the order the store returns them.
///
/// Records that cannot be decoded are logged and skipped.
///
/// # Errors
///
/// Returns an error if the store could not be read or the records node is not an object.
pub fn get_records(store: &dyn DocumentStore, identity: &Identity) -> Result<Vec<Record>, Error> {
    let paths = LedgerPaths::new(identity)?;

    let records = match store.get(&paths.records)? {
        None => return Ok(Vec::new()),
        Some(Value::Object(records)) => records,
        Some(other) => {
            return Err(Error::InvalidStoredValue {
                path: paths.records.to_string(),
                reason: format!("expected an object, got {other}"),
            });
        }
    };

    let records = records
        .into_iter()
        .filter_map(|(id, value)| {
            let path = paths.record(&id).ok()?;

            decode_record(&path, value)
                .inspect_err(|error| tracing::warn!("Skipping record {id}: {error}"))
                .ok()
        })
        .collect();

    Ok(records)
}


#[cfg(test)]
mod record_date_tests {
    use time::macros::date;

    use crate::{
        Error,
        ledger::core::{RecordDate, Tag, TransactionType, last_day_of_month},
    };

    #[test]
    fn formats_without_zero_padding() {
        assert_eq!(RecordDate::from_date(date!(2024 - 03 - 05)).as_str(), "5 Mar 2024");
        assert_eq!(RecordDate::from_date(date!(2023 - 12 - 31)).as_str(), "31 Dec 2023");
    }

    #[test]
    fn parses_formatted_dates() {
        assert_eq!(
            RecordDate::new_unchecked("5 Mar 2024").to_date(),
            Some(date!(2024 - 03 - 05))
        );
        assert_eq!(RecordDate::new_unchecked("2024-03-05").to_date(), None);
        assert_eq!(RecordDate::new_unchecked("31 Feb 2024").to_date(), None);
    }

    #[test]
    fn builds_from_form_parts() {
        assert_eq!(
            RecordDate::from_parts(29, "Feb", 2024),
            Ok(RecordDate::new_unchecked("29 Feb 2024"))
        );
        assert!(matches!(
            RecordDate::from_parts(29, "Feb", 2023),
            Err(Error::InvalidDate(_))
        ));
        assert!(matches!(
            RecordDate::from_parts(1, "Foo", 2023),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn last_day_accounts_for_leap_years() {
        assert_eq!(last_day_of_month("Feb", 2024), Some(29));
        assert_eq!(last_day_of_month("Feb", 2023), Some(28));
        assert_eq!(last_day_of_month("Apr", 2023), Some(30));
        assert_eq!(last_day_of_month("Foo", 2023), None);
    }

    #[test]
    fn tags_round_trip_through_labels() {
        for tag in Tag::ALL {
            assert_eq!(tag.label().parse::<Tag>(), Ok(tag));
        }

        assert_eq!(
            "Rent".parse::<Tag>(),
            Err(Error::InvalidTag("Rent".to_owned()))
        );
        assert_eq!("Debit".parse::<TransactionType>(), Ok(TransactionType::Debit));
    }

    #[test]
    fn record_uses_stored_field_names() {
        let record = crate::ledger::Record {
            id: "abc".to_owned(),
            date: RecordDate::new_unchecked("5 Mar 2024"),
            tag: Tag::Income,
            transaction_type: TransactionType::Credit,
            amount: 100.0,
        };

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "id": "abc",
                "date": "5 Mar 2024",
                "tag": "Income 💰",
                "type": "Credit",
                "amount": 100.0,
            })
        );
    }
}
