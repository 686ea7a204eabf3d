//! Record validation.
//!
//! The store consumes validation through the [`RecordValidator`] trait and
//! calls it before every mutation. This module also provides the rule-based
//! validators used by the application: one rule per field, combined by
//! [`CompositeValidator`] and configured from a JSON rule file
//! ([`ValidationRules`]).

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::query::Field;
use crate::types::{Income, RecordFields};

/// Built-in rule file shipped with the crate.
const BUILTIN_RULES: &str = include_str!("../validation-rules.json");

/// A record rejected by a validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// The offending field.
    pub field: Field,
    /// Human-readable description of the violation.
    pub reason: String,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    #[must_use]
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validation capability consumed by record stores.
///
/// Invoked with the incoming field values before any mutation starts; an
/// `Err` aborts the mutation with nothing changed.
///
/// Used as `Arc<dyn RecordValidator>`.
pub trait RecordValidator: Send + Sync {
    /// Checks the field values of a record about to be written.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first field that violates a rule.
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError>;
}

impl<T: RecordValidator + ?Sized> RecordValidator for Arc<T> {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        (**self).validate(fields)
    }
}

/// Validator that accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RecordValidator for AcceptAll {
    fn validate(&self, _fields: &RecordFields) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Errors in a rule configuration.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("invalid range for {field}: min {min} exceeds max {max}")]
    InvalidRange { field: Field, min: i64, max: i64 },
    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
    #[error("gender allow-list is empty")]
    EmptyGenderList,
    #[error("malformed rule file: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

/// Bounds the length (in characters) of a name field and rejects blank names.
#[derive(Debug, Clone)]
pub struct NameLengthRule {
    field: Field,
    min: usize,
    max: usize,
}

impl NameLengthRule {
    /// Creates a length rule for [`Field::FirstName`] or [`Field::LastName`].
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidRange`] if `min > max`.
    pub fn new(field: Field, min: usize, max: usize) -> Result<Self, RulesError> {
        if min > max {
            return Err(RulesError::InvalidRange {
                field,
                min: i64::try_from(min).unwrap_or(i64::MAX),
                max: i64::try_from(max).unwrap_or(i64::MAX),
            });
        }
        Ok(Self { field, min, max })
    }
}

impl RecordValidator for NameLengthRule {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        let value = match self.field {
            Field::LastName => &fields.last_name,
            _ => &fields.first_name,
        };
        if value.trim().is_empty() {
            return Err(ValidationError::new(self.field, "must not be blank"));
        }
        let len = value.chars().count();
        if len < self.min || len > self.max {
            return Err(ValidationError::new(
                self.field,
                format!("must be {} to {} characters long", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Restricts the date of birth to an inclusive range.
#[derive(Debug, Clone)]
pub struct DateOfBirthRule {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateOfBirthRule {
    /// Creates a date rule accepting `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidDateRange`] if `from > to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, RulesError> {
        if from > to {
            return Err(RulesError::InvalidDateRange { from, to });
        }
        Ok(Self { from, to })
    }
}

impl RecordValidator for DateOfBirthRule {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        if fields.date_of_birth < self.from || fields.date_of_birth > self.to {
            return Err(ValidationError::new(
                Field::DateOfBirth,
                format!("must be between {} and {}", self.from, self.to),
            ));
        }
        Ok(())
    }
}

/// Bounds the number of dependents.
#[derive(Debug, Clone)]
pub struct DependentsRule {
    min: u16,
    max: u16,
}

impl DependentsRule {
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidRange`] if `min > max`.
    pub fn new(min: u16, max: u16) -> Result<Self, RulesError> {
        if min > max {
            return Err(RulesError::InvalidRange {
                field: Field::Dependents,
                min: i64::from(min),
                max: i64::from(max),
            });
        }
        Ok(Self { min, max })
    }
}

impl RecordValidator for DependentsRule {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        if !(self.min..=self.max).contains(&fields.dependents) {
            return Err(ValidationError::new(
                Field::Dependents,
                format!("must be in range {}-{}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Rejects dependents for people younger than a minimum age.
///
/// Age is the difference of calendar years relative to `today`.
#[derive(Debug, Clone)]
pub struct DependentsAgeRule {
    min_age: u16,
    today: NaiveDate,
}

impl DependentsAgeRule {
    #[must_use]
    pub fn new(min_age: u16, today: NaiveDate) -> Self {
        Self { min_age, today }
    }
}

impl RecordValidator for DependentsAgeRule {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        let age = self.today.year() - fields.date_of_birth.year();
        if age < i32::from(self.min_age) && fields.dependents > 0 {
            return Err(ValidationError::new(
                Field::Dependents,
                format!("person younger than {} cannot have dependents", self.min_age),
            ));
        }
        Ok(())
    }
}

/// Bounds the annual income.
#[derive(Debug, Clone)]
pub struct IncomeRule {
    min: Income,
    max: Income,
}

impl IncomeRule {
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidRange`] if `min > max`.
    pub fn new(min: Income, max: Income) -> Result<Self, RulesError> {
        if min > max {
            return Err(RulesError::InvalidRange {
                field: Field::Income,
                min: min.minor_units(),
                max: max.minor_units(),
            });
        }
        Ok(Self { min, max })
    }
}

impl RecordValidator for IncomeRule {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        if fields.income < self.min || fields.income > self.max {
            return Err(ValidationError::new(
                Field::Income,
                format!(
                    "must be in range {}-{}, but was {}",
                    self.min, self.max, fields.income
                ),
            ));
        }
        Ok(())
    }
}

/// Restricts the gender code to an allow-list, ignoring case.
#[derive(Debug, Clone)]
pub struct GenderRule {
    allowed: Vec<char>,
}

impl GenderRule {
    /// # Errors
    ///
    /// Returns [`RulesError::EmptyGenderList`] if `allowed` is empty.
    pub fn new(allowed: impl IntoIterator<Item = char>) -> Result<Self, RulesError> {
        let allowed: Vec<char> = allowed
            .into_iter()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .collect();
        if allowed.is_empty() {
            return Err(RulesError::EmptyGenderList);
        }
        Ok(Self { allowed })
    }
}

impl RecordValidator for GenderRule {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        if !self.allowed.contains(&fields.gender.normalized()) {
            let list: Vec<String> = self.allowed.iter().map(char::to_string).collect();
            return Err(ValidationError::new(
                Field::Gender,
                format!("must be one of the following: {}", list.join(", ")),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Runs a list of validators in order; the first failure wins.
#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Box<dyn RecordValidator>>,
}

impl CompositeValidator {
    #[must_use]
    pub fn new(validators: Vec<Box<dyn RecordValidator>>) -> Self {
        Self { validators }
    }

    /// Number of rules in the composite.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl RecordValidator for CompositeValidator {
    fn validate(&self, fields: &RecordFields) -> Result<(), ValidationError> {
        for validator in &self.validators {
            if let Err(err) = validator.validate(fields) {
                tracing::debug!(field = %err.field, reason = %err.reason, "record rejected");
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Assembles a [`CompositeValidator`] rule by rule.
#[derive(Default)]
pub struct ValidatorBuilder {
    validators: Vec<Box<dyn RecordValidator>>,
}

impl ValidatorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, validator: impl RecordValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Builds the validator for a configured rule set.
    ///
    /// `today` is the upper bound for dates of birth when the rule set leaves
    /// it open, and the reference date for the dependents-age rule.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] if any configured range is inconsistent.
    pub fn from_rule_set(set: &RuleSet, today: NaiveDate) -> Result<CompositeValidator, RulesError> {
        let mut builder = Self::new()
            .rule(NameLengthRule::new(Field::FirstName, set.first_name.min, set.first_name.max)?)
            .rule(NameLengthRule::new(Field::LastName, set.last_name.min, set.last_name.max)?)
            .rule(DateOfBirthRule::new(
                set.date_of_birth.from,
                set.date_of_birth.to.unwrap_or(today),
            )?)
            .rule(DependentsRule::new(set.dependents.min, set.dependents.max)?);
        if let Some(min_age) = set.min_age_for_dependents {
            builder = builder.rule(DependentsAgeRule::new(min_age, today));
        }
        let Range { min, max } = set.income;
        let (Some(min_income), Some(max_income)) =
            (Income::checked_from_whole(min), Income::checked_from_whole(max))
        else {
            return Err(RulesError::InvalidRange { field: Field::Income, min, max });
        };
        Ok(builder
            .rule(IncomeRule::new(min_income, max_income)?)
            .rule(GenderRule::new(set.gender.allowed.iter().copied())?)
            .build())
    }

    #[must_use]
    pub fn build(self) -> CompositeValidator {
        CompositeValidator::new(self.validators)
    }
}

// ---------------------------------------------------------------------------
// Rule configuration
// ---------------------------------------------------------------------------

/// Inclusive `min..=max` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

/// Date-of-birth bounds. A missing `to` means "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// Accepted gender codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderRange {
    pub allowed: Vec<char>,
}

/// One named set of field rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub first_name: Range<usize>,
    pub last_name: Range<usize>,
    pub date_of_birth: DateRange,
    pub dependents: Range<u16>,
    /// Minimum age to have dependents; no age rule when absent.
    #[serde(default)]
    pub min_age_for_dependents: Option<u16>,
    /// Income bounds in whole units.
    pub income: Range<i64>,
    pub gender: GenderRange,
}

impl RuleSet {
    /// Builds the validator for this rule set using the local date as "today".
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] if any configured range is inconsistent.
    pub fn validator(&self) -> Result<CompositeValidator, RulesError> {
        ValidatorBuilder::from_rule_set(self, chrono::Local::now().date_naive())
    }
}

/// Selects one of the rule sets in a [`ValidationRules`] file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetKind {
    #[default]
    Default,
    Custom,
}

/// The contents of a validation rule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub default: RuleSet,
    pub custom: RuleSet,
}

impl ValidationRules {
    /// Parses a rule file.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Malformed`] if the JSON does not describe both rule sets.
    pub fn from_json(text: &str) -> Result<Self, RulesError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The rules embedded in the crate.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Malformed`] if the embedded file is broken.
    pub fn builtin() -> Result<Self, RulesError> {
        Self::from_json(BUILTIN_RULES)
    }

    /// Returns the selected rule set.
    #[must_use]
    pub fn get(&self, kind: RuleSetKind) -> &RuleSet {
        match kind {
            RuleSetKind::Default => &self.default,
            RuleSetKind::Custom => &self.custom,
        }
    }
}
