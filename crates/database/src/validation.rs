//! Input validation for lead submissions and bids.
//!
//! Validation never touches the database and never fails: every check
//! contributes a field-keyed [`ValidationError`] to a [`LeadValidation`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::LeadMetadata;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    /// Invalid email format.
    InvalidEmail(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
    /// Numeric value outside its allowed range.
    OutOfRange { field: String, message: String },
}

impl ValidationError {
    /// The form field this error belongs to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::InvalidEmail(_) => "email",
            ValidationError::TooLong { field, .. } => field,
            ValidationError::Empty(field) => field,
            ValidationError::OutOfRange { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::OutOfRange { field, message } => write!(f, "{} {}", field, message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum allowed length for lead titles.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum allowed length for lead descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// A lead as submitted by a form, before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadInput {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: LeadMetadata,
}

/// Outcome of [`validate_lead_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl LeadValidation {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Errors for a single field.
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.field() == field)
    }
}

/// Validate a lead submission.
///
/// Checks, in order: title, description and category are non-empty after
/// trimming; the email (when present) is well formed; the title and
/// description fit their length limits.
pub fn validate_lead_data(input: &LeadInput) -> LeadValidation {
    let email = input.email.as_deref().filter(|e| !e.trim().is_empty());
    LeadValidation::from_errors(lead_errors(input, true, email))
}

/// Validate a lead submitted without an account.
///
/// The contact email is mandatory and the description may be left out;
/// every other rule of [`validate_lead_data`] applies. `input.email` is
/// ignored in favour of `email`.
pub fn validate_anonymous_lead(input: &LeadInput, email: &str) -> LeadValidation {
    LeadValidation::from_errors(lead_errors(input, false, Some(email)))
}

fn lead_errors(
    input: &LeadInput,
    description_required: bool,
    email: Option<&str>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if input.title.trim().is_empty() {
        errors.push(ValidationError::Empty("title".to_string()));
    }
    if description_required && input.description.trim().is_empty() {
        errors.push(ValidationError::Empty("description".to_string()));
    }
    if input.category.trim().is_empty() {
        errors.push(ValidationError::Empty("category".to_string()));
    }

    if let Some(email) = email {
        if let Err(e) = validate_email(email) {
            errors.push(e);
        }
    }

    let title_len = input.title.chars().count();
    if title_len > MAX_TITLE_LENGTH {
        errors.push(ValidationError::TooLong {
            field: "title".to_string(),
            max: MAX_TITLE_LENGTH,
            actual: title_len,
        });
    }

    let description_len = input.description.chars().count();
    if description_len > MAX_DESCRIPTION_LENGTH {
        errors.push(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LENGTH,
            actual: description_len,
        });
    }

    errors
}

/// Boolean form of [`validate_email`].
pub fn is_valid_email(email: &str) -> bool {
    validate_email(email).is_ok()
}

/// Validate an email address (basic RFC 5322 format check).
///
/// This is a basic validation that checks:
/// - Contains exactly one @
/// - Has at least one character before @
/// - Has at least one dot after @
/// - Contains no whitespace
/// - Is not too long
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Empty("email".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail(
            "must not contain whitespace".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail(
            "must contain exactly one @ symbol".to_string(),
        ));
    };

    if domain.contains('@') {
        return Err(ValidationError::InvalidEmail(
            "must contain exactly one @ symbol".to_string(),
        ));
    }

    if local.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "missing local part (before @)".to_string(),
        ));
    }

    if domain.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "missing domain (after @)".to_string(),
        ));
    }

    if !domain.contains('.') {
        return Err(ValidationError::InvalidEmail(
            "domain must contain at least one dot".to_string(),
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(ValidationError::InvalidEmail(
            "domain cannot start or end with a dot".to_string(),
        ));
    }

    if domain.contains("..") {
        return Err(ValidationError::InvalidEmail(
            "domain cannot contain consecutive dots".to_string(),
        ));
    }

    Ok(())
}

/// Largest accepted bid or bid budget, in øre (100 million kroner).
pub const MAX_BID_CENTS: i64 = 10_000_000_000;

/// Validate the amounts of a bid.
pub fn validate_bid_amounts(
    bid_amount_cents: i64,
    max_budget_cents: i64,
) -> Result<(), ValidationError> {
    if bid_amount_cents <= 0 {
        return Err(ValidationError::OutOfRange {
            field: "bid_amount".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if bid_amount_cents > MAX_BID_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "bid_amount".to_string(),
            message: format!("must be at most {}", MAX_BID_CENTS),
        });
    }

    if max_budget_cents > MAX_BID_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "max_budget".to_string(),
            message: format!("must be at most {}", MAX_BID_CENTS),
        });
    }

    if max_budget_cents < bid_amount_cents {
        return Err(ValidationError::OutOfRange {
            field: "max_budget".to_string(),
            message: "must be at least the bid amount".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> LeadInput {
        LeadInput {
            title: "Ny kjøkkeninnredning".to_string(),
            description: "Trenger hjelp med montering av kjøkken".to_string(),
            category: "carpentry".to_string(),
            email: Some("ola@example.no".to_string()),
            metadata: LeadMetadata::default(),
        }
    }

    #[test]
    fn test_valid_lead_has_no_errors() {
        let result = validate_lead_data(&valid_input());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_whitespace_only_required_fields() {
        for field in ["title", "description", "category"] {
            let mut input = valid_input();
            match field {
                "title" => input.title = "   ".to_string(),
                "description" => input.description = "\n\t".to_string(),
                _ => input.category = String::new(),
            }

            let result = validate_lead_data(&input);
            assert!(!result.is_valid, "{} should be required", field);
            assert_eq!(
                result.errors_for(field).next(),
                Some(&ValidationError::Empty(field.to_string()))
            );
        }
    }

    #[test]
    fn test_errors_are_reported_in_order() {
        let input = LeadInput {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            email: Some("invalid@".to_string()),
            metadata: LeadMetadata::default(),
        };

        let result = validate_lead_data(&input);
        let fields: Vec<&str> = result
            .errors
            .iter()
            .map(|e| e.field())
            .collect();
        assert_eq!(fields, vec!["title", "description", "category", "email"]);
    }

    #[test]
    fn test_length_limits() {
        let mut input = valid_input();
        input.title = "a".repeat(MAX_TITLE_LENGTH);
        input.description = "b".repeat(MAX_DESCRIPTION_LENGTH);
        assert!(validate_lead_data(&input).is_valid);

        input.title.push('a');
        input.description.push('b');
        let result = validate_lead_data(&input);
        assert!(matches!(
            result.errors_for("title").next(),
            Some(ValidationError::TooLong { actual: 201, .. })
        ));
        assert!(matches!(
            result.errors_for("description").next(),
            Some(ValidationError::TooLong { actual: 2001, .. })
        ));
    }

    #[test]
    fn test_blank_email_is_ignored() {
        let mut input = valid_input();
        input.email = Some("  ".to_string());
        assert!(validate_lead_data(&input).is_valid);
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name+tag@sub.example.no"));
        assert!(!is_valid_email("invalid@"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@.example.com"));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_validate_email_too_long() {
        let long_email = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            validate_email(&long_email),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_bid_amounts() {
        assert!(validate_bid_amounts(50_000, 75_000).is_ok());
        assert!(validate_bid_amounts(50_000, 50_000).is_ok());
        assert!(validate_bid_amounts(0, 10).is_err());
        assert!(validate_bid_amounts(-5, 10).is_err());
        assert_eq!(
            validate_bid_amounts(100, 50).unwrap_err().field(),
            "max_budget"
        );
    }

    #[test]
    fn test_validate_bid_amounts_upper_bound() {
        assert!(validate_bid_amounts(MAX_BID_CENTS, MAX_BID_CENTS).is_ok());
        assert_eq!(
            validate_bid_amounts(i64::MAX, i64::MAX).unwrap_err().field(),
            "bid_amount"
        );
        assert_eq!(
            validate_bid_amounts(50_000, MAX_BID_CENTS + 1).unwrap_err().field(),
            "max_budget"
        );
    }

    #[test]
    fn test_anonymous_lead_needs_email_not_description() {
        let input = LeadInput {
            description: String::new(),
            email: None,
            ..valid_input()
        };
        assert!(validate_anonymous_lead(&input, "a@b.com").is_valid);

        let result = validate_anonymous_lead(&input, "  ");
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec![ValidationError::Empty("email".to_string())]);

        let blank = LeadInput {
            title: " ".to_string(),
            category: String::new(),
            ..input
        };
        let result = validate_anonymous_lead(&blank, "a@b.com");
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field()).collect();
        assert_eq!(fields, vec!["title", "category"]);
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::Empty("title".to_string()).to_string(),
            "title cannot be empty"
        );
        assert_eq!(
            ValidationError::TooLong {
                field: "title".to_string(),
                max: 200,
                actual: 250
            }
            .to_string(),
            "title is too long (250 chars, max 200)"
        );
    }
}
