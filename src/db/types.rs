use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "questiontype", rename_all = "lowercase")]
pub(crate) enum QuestionType {
    Single,
    Multiple,
}

impl QuestionType {
    /// Uses the declared type when it is recognised, otherwise infers it from
    /// the number of correct options.
    pub(crate) fn resolve(declared: Option<&str>, correct_count: usize) -> Self {
        match declared.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("single") => Self::Single,
            Some("multiple") => Self::Multiple,
            _ if correct_count > 1 => Self::Multiple,
            _ => Self::Single,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_declared_type() {
        assert_eq!(QuestionType::resolve(Some("Multiple"), 1), QuestionType::Multiple);
        assert_eq!(QuestionType::resolve(Some("single"), 3), QuestionType::Single);
        assert_eq!(QuestionType::resolve(None, 2), QuestionType::Multiple);
        assert_eq!(QuestionType::resolve(Some("mcq"), 1), QuestionType::Single);
    }
}
