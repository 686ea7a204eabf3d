use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned record identifier. Ids start at 1.
pub type RecordId = u32;

/// Number of minor units in one whole unit of [`Income`].
pub const INCOME_SCALE: i64 = 100;

/// Annual income as a fixed-point decimal with two fractional digits.
///
/// Stored as signed minor units so that the binary slot layout can hold it in
/// a single fixed-width integer. Negative amounts are representable but
/// rejected by the income validation rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Income(i64);

impl Income {
    /// Zero income.
    pub const ZERO: Self = Self(0);

    /// Creates an income from minor units (hundredths).
    #[must_use]
    pub const fn from_minor_units(units: i64) -> Self {
        Self(units)
    }

    /// Creates an income from a whole amount with no fractional part.
    ///
    /// Overflows for amounts beyond `i64::MAX / 100`; use
    /// [`Income::checked_from_whole`] for untrusted input.
    #[must_use]
    pub const fn from_whole(amount: i64) -> Self {
        Self(amount * INCOME_SCALE)
    }

    /// Like [`Income::from_whole`], returning `None` if the amount does not
    /// fit in minor units.
    #[must_use]
    pub const fn checked_from_whole(amount: i64) -> Option<Self> {
        match amount.checked_mul(INCOME_SCALE) {
            Some(units) => Some(Self(units)),
            None => None,
        }
    }

    /// Returns the amount in minor units (hundredths).
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Income {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = INCOME_SCALE.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / scale, abs % scale)
    }
}

/// Error returned when text cannot be read as an [`Income`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid income amount: {0:?}")]
pub struct ParseIncomeError(String);

impl FromStr for Income {
    type Err = ParseIncomeError;

    /// Parses `"1234"`, `"1234.5"` or `"1234.56"`, with an optional leading `-`.
    /// More than two fractional digits are rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIncomeError(s.to_string());
        let text = s.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        let whole: i64 = whole.parse().map_err(|_| err())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| err())? * 10,
            _ => fraction.parse().map_err(|_| err())?,
        };
        let units = whole
            .checked_mul(INCOME_SCALE)
            .and_then(|w| w.checked_add(fraction))
            .ok_or_else(err)?;
        Ok(Self(if negative { -units } else { units }))
    }
}

/// Single-character gender code.
///
/// The set of accepted codes is a validation concern; the model only carries
/// the character. Comparisons through [`Gender::eq_ignore_case`] fold case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gender(char);

impl Gender {
    /// Wraps a gender code.
    #[must_use]
    pub const fn new(code: char) -> Self {
        Self(code)
    }

    /// Returns the raw gender code.
    #[must_use]
    pub const fn code(self) -> char {
        self.0
    }

    /// Returns the upper-case form of the code.
    #[must_use]
    pub fn normalized(self) -> char {
        self.0.to_uppercase().next().unwrap_or(self.0)
    }

    /// Case-insensitive comparison of two codes.
    #[must_use]
    pub fn eq_ignore_case(self, other: Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutable portion of a record: everything except the id.
///
/// Passed to `create`, `insert` and `update`, and handed to the validator
/// before any mutation starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub dependents: u16,
    pub income: Income,
    pub gender: Gender,
}

/// A personal record as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub dependents: u16,
    pub income: Income,
    pub gender: Gender,
}

impl Record {
    /// Builds a record from an id and its field values.
    #[must_use]
    pub fn from_fields(id: RecordId, fields: RecordFields) -> Self {
        Self {
            id,
            first_name: fields.first_name,
            last_name: fields.last_name,
            date_of_birth: fields.date_of_birth,
            dependents: fields.dependents,
            income: fields.income,
            gender: fields.gender,
        }
    }

    /// Returns a copy of the record's field values without the id.
    #[must_use]
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
            dependents: self.dependents,
            income: self.income,
            gender: self.gender,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}, {}, {}, {}, {}, {}, {}",
            self.id,
            self.first_name,
            self.last_name,
            self.date_of_birth.format("%Y-%b-%d"),
            self.dependents,
            self.income,
            self.gender,
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_fields() -> RecordFields {
        RecordFields {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 12, 10).unwrap(),
            dependents: 2,
            income: Income::from_minor_units(1_234_567),
            gender: Gender::new('F'),
        }
    }

    #[test]
    fn income_parses_whole_and_fractional_amounts() {
        assert_eq!("1234".parse::<Income>().unwrap().minor_units(), 123_400);
        assert_eq!("1234.5".parse::<Income>().unwrap().minor_units(), 123_450);
        assert_eq!("1234.56".parse::<Income>().unwrap().minor_units(), 123_456);
        assert_eq!("-0.05".parse::<Income>().unwrap().minor_units(), -5);
        assert_eq!(" 7 ".parse::<Income>().unwrap(), Income::from_whole(7));
    }

    #[test]
    fn income_rejects_malformed_text() {
        for bad in ["", ".5", "1.234", "12a", "1,000", "--1", "99999999999999999999"] {
            assert!(bad.parse::<Income>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn income_display_pads_minor_units() {
        assert_eq!(Income::from_minor_units(123_405).to_string(), "1234.05");
        assert_eq!(Income::from_minor_units(-150).to_string(), "-1.50");
        assert_eq!(Income::ZERO.to_string(), "0.00");
    }

    #[test]
    fn gender_compares_case_insensitively() {
        assert!(Gender::new('m').eq_ignore_case(Gender::new('M')));
        assert!(!Gender::new('m').eq_ignore_case(Gender::new('F')));
        assert_eq!(Gender::new('f').normalized(), 'F');
    }

    #[test]
    fn record_fields_round_trip_through_record() {
        let fields = sample_fields();
        let record = Record::from_fields(7, fields.clone());
        assert_eq!(record.id, 7);
        assert_eq!(record.fields(), fields);
    }

    #[test]
    fn record_display_is_human_readable() {
        let record = Record::from_fields(3, sample_fields());
        assert_eq!(
            record.to_string(),
            "#3, Ada, Lovelace, 1980-Dec-10, 2, 12345.67, F"
        );
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let record = Record::from_fields(1, sample_fields());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["dateOfBirth"], "1980-12-10");
        assert_eq!(json["income"], 1_234_567);
        assert_eq!(json["gender"], "F");
    }

    proptest! {
        #[test]
        fn income_display_parses_back(units in -10_000_000_000_i64..10_000_000_000_i64) {
            let income = Income::from_minor_units(units);
            prop_assert_eq!(income.to_string().parse::<Income>().unwrap(), income);
        }
    }
}
