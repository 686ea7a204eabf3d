//! Field-equality queries over records.
//!
//! A query is a list of `field = value` conditions given as text. Each
//! condition is resolved to a [`Field`] and its value converted to the field's
//! native type up front, so evaluation against a record is a plain comparison.
//! Names and the gender code compare case-insensitively; everything else
//! compares by exact value.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::types::{Gender, Income, Record, RecordId};

/// Date formats accepted in textual conditions, tried in order.
pub const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// A record field addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    FirstName,
    LastName,
    DateOfBirth,
    Dependents,
    Income,
    Gender,
}

impl Field {
    /// All fields in slot layout order.
    pub const ALL: [Field; 7] = [
        Field::Id,
        Field::FirstName,
        Field::LastName,
        Field::DateOfBirth,
        Field::Dependents,
        Field::Income,
        Field::Gender,
    ];

    /// Canonical camel-case name of the field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::DateOfBirth => "dateOfBirth",
            Field::Dependents => "dependents",
            Field::Income => "income",
            Field::Gender => "gender",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = QueryError;

    /// Resolves a field name, ignoring case and `_`/`-` separators.
    ///
    /// The historical names `numberOfChildren` and `yearIncome` are accepted
    /// as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "id" => Ok(Field::Id),
            "firstname" => Ok(Field::FirstName),
            "lastname" => Ok(Field::LastName),
            "dateofbirth" => Ok(Field::DateOfBirth),
            "dependents" | "numberofchildren" => Ok(Field::Dependents),
            "income" | "yearincome" => Ok(Field::Income),
            "gender" => Ok(Field::Gender),
            _ => Err(QueryError::UnknownField {
                name: s.to_string(),
            }),
        }
    }
}

/// Errors raised while building a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown field: {name}")]
    UnknownField { name: String },
    #[error("invalid value {value:?} for field {field}")]
    InvalidValue { field: Field, value: String },
}

/// A condition value converted to its field's native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Id(RecordId),
    FirstName(String),
    LastName(String),
    DateOfBirth(NaiveDate),
    Dependents(u16),
    Income(Income),
    Gender(Gender),
}

/// Parses a date using [`DATE_FORMATS`].
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// A single `field = value` equality condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    value: FieldValue,
}

impl Condition {
    /// Builds a condition from a field name and textual value.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownField`] for an unrecognised field name and
    /// [`QueryError::InvalidValue`] when the text cannot be converted to the
    /// field's type.
    pub fn parse(field: &str, value: &str) -> Result<Self, QueryError> {
        let field: Field = field.parse()?;
        let invalid = || QueryError::InvalidValue {
            field,
            value: value.to_string(),
        };
        let value = match field {
            Field::Id => FieldValue::Id(value.trim().parse().map_err(|_| invalid())?),
            Field::FirstName => FieldValue::FirstName(value.to_string()),
            Field::LastName => FieldValue::LastName(value.to_string()),
            Field::DateOfBirth => FieldValue::DateOfBirth(parse_date(value).ok_or_else(invalid)?),
            Field::Dependents => {
                FieldValue::Dependents(value.trim().parse().map_err(|_| invalid())?)
            }
            Field::Income => FieldValue::Income(value.parse().map_err(|_| invalid())?),
            Field::Gender => {
                let mut chars = value.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(code), None) => FieldValue::Gender(Gender::new(code)),
                    _ => return Err(invalid()),
                }
            }
        };
        Ok(Self { value })
    }

    /// The field this condition tests.
    #[must_use]
    pub fn field(&self) -> Field {
        match self.value {
            FieldValue::Id(_) => Field::Id,
            FieldValue::FirstName(_) => Field::FirstName,
            FieldValue::LastName(_) => Field::LastName,
            FieldValue::DateOfBirth(_) => Field::DateOfBirth,
            FieldValue::Dependents(_) => Field::Dependents,
            FieldValue::Income(_) => Field::Income,
            FieldValue::Gender(_) => Field::Gender,
        }
    }

    /// The converted condition value.
    #[must_use]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Whether `record` satisfies this condition.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match &self.value {
            FieldValue::Id(id) => record.id == *id,
            FieldValue::FirstName(name) => eq_ignore_case(&record.first_name, name),
            FieldValue::LastName(name) => eq_ignore_case(&record.last_name, name),
            FieldValue::DateOfBirth(date) => record.date_of_birth == *date,
            FieldValue::Dependents(n) => record.dependents == *n,
            FieldValue::Income(income) => record.income == *income,
            FieldValue::Gender(gender) => record.gender.eq_ignore_case(*gender),
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

/// A conjunction of [`Condition`]s. An empty set matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    conditions: Vec<Condition>,
}

impl Conditions {
    /// Parses `(field, value)` pairs into a condition set.
    ///
    /// # Errors
    ///
    /// Returns the first [`QueryError`] encountered.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let conditions = pairs
            .into_iter()
            .map(|(k, v)| Condition::parse(k.as_ref(), v.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { conditions })
    }

    /// Whether `record` satisfies every condition.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// The individual conditions.
    #[must_use]
    pub fn as_slice(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether there are no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            id: 42,
            first_name: "Smith".to_string(),
            last_name: "Johnson".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 14).unwrap(),
            dependents: 3,
            income: Income::from_minor_units(5_000_050),
            gender: Gender::new('M'),
        }
    }

    #[test]
    fn field_names_resolve_case_insensitively() {
        assert_eq!("FIRSTNAME".parse::<Field>().unwrap(), Field::FirstName);
        assert_eq!("first_name".parse::<Field>().unwrap(), Field::FirstName);
        assert_eq!("dateOfBirth".parse::<Field>().unwrap(), Field::DateOfBirth);
        assert_eq!("NumberOfChildren".parse::<Field>().unwrap(), Field::Dependents);
        assert_eq!("yearincome".parse::<Field>().unwrap(), Field::Income);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = "salary".parse::<Field>().unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                name: "salary".to_string()
            }
        );
    }

    #[test]
    fn field_display_uses_canonical_name() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>().unwrap(), field);
        }
        assert_eq!(Field::DateOfBirth.to_string(), "dateOfBirth");
    }

    #[test]
    fn names_compare_case_insensitively() {
        let r = record();
        assert!(Condition::parse("firstname", "SMITH").unwrap().matches(&r));
        assert!(Condition::parse("lastname", "johnson").unwrap().matches(&r));
        assert!(!Condition::parse("lastname", "john").unwrap().matches(&r));
    }

    #[test]
    fn gender_compares_case_insensitively() {
        let r = record();
        assert!(Condition::parse("gender", "m").unwrap().matches(&r));
        assert!(!Condition::parse("gender", "f").unwrap().matches(&r));
    }

    #[test]
    fn typed_fields_compare_by_value() {
        let r = record();
        assert!(Condition::parse("id", "42").unwrap().matches(&r));
        assert!(!Condition::parse("id", "41").unwrap().matches(&r));
        assert!(Condition::parse("dependents", "3").unwrap().matches(&r));
        assert!(Condition::parse("income", "50000.50").unwrap().matches(&r));
        assert!(Condition::parse("income", "50000.5").unwrap().matches(&r));
        assert!(!Condition::parse("income", "50000").unwrap().matches(&r));
        assert!(Condition::parse("dateofbirth", "1985-03-14").unwrap().matches(&r));
        assert!(Condition::parse("dateofbirth", "03/14/1985").unwrap().matches(&r));
    }

    #[test]
    fn unconvertible_values_are_rejected() {
        for (field, value) in [
            ("id", "x"),
            ("dependents", "-1"),
            ("income", "lots"),
            ("dateofbirth", "yesterday"),
            ("gender", "MF"),
            ("gender", ""),
        ] {
            let err = Condition::parse(field, value).unwrap_err();
            assert!(
                matches!(err, QueryError::InvalidValue { .. }),
                "{field}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn conditions_are_a_conjunction() {
        let r = record();
        let both = Conditions::parse([("firstname", "smith"), ("gender", "M")]).unwrap();
        assert!(both.matches(&r));
        let one_wrong = Conditions::parse([("firstname", "smith"), ("gender", "F")]).unwrap();
        assert!(!one_wrong.matches(&r));
    }

    #[test]
    fn empty_conditions_match_everything() {
        let none = Conditions::parse(Vec::<(String, String)>::new()).unwrap();
        assert!(none.is_empty());
        assert!(none.matches(&record()));
    }

    #[test]
    fn condition_reports_its_field() {
        let c = Condition::parse("LASTNAME", "x").unwrap();
        assert_eq!(c.field(), Field::LastName);
        assert_eq!(c.value(), &FieldValue::LastName("x".to_string()));
    }
}
