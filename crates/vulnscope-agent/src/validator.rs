//! Guard applied to every engine-proposed SQL statement before execution.
//!
//! The check is lexical: a mutating keyword anywhere in the text rejects the
//! query, and the text must mention the permitted namespace. It does not
//! parse SQL, so a keyword inside a string literal or column name also
//! rejects the query.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AgentError;

/// Default `project.dataset` namespace queries must reference.
pub const DEFAULT_NAMESPACE: &str = vulnscope_warehouse::tables::NAMESPACE;

static MUTATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(DELETE|UPDATE|INSERT|MERGE|DROP|ALTER)\b").expect("valid pattern")
});

/// Reasons a query is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryRejection {
    #[error("Only SELECT queries are allowed.")]
    Mutating,

    #[error("Query must reference {0} tables.")]
    OutsideNamespace(String),
}

impl From<QueryRejection> for AgentError {
    fn from(rejection: QueryRejection) -> Self {
        AgentError::Validation(rejection.to_string())
    }
}

/// Lexical read-only and namespace guard.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    namespace: String,
}

impl QueryValidator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Accept or reject `sql`. The mutating check runs first.
    pub fn validate(&self, sql: &str) -> Result<(), QueryRejection> {
        if MUTATING.is_match(sql) {
            return Err(QueryRejection::Mutating);
        }
        if !sql.contains(&self.namespace) {
            return Err(QueryRejection::OutsideNamespace(self.namespace.clone()));
        }
        Ok(())
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_select_in_namespace() {
        let v = QueryValidator::default();
        assert!(
            v.validate("SELECT COUNT(*) FROM `gostlm.gost_bq.state_open` WHERE severity = 'High'")
                .is_ok()
        );
    }

    #[test]
    fn test_rejects_mutating_keywords_any_case() {
        let v = QueryValidator::default();
        for sql in [
            "DELETE FROM gostlm.gost_bq.state_open",
            "update gostlm.gost_bq.state_open SET a = 1",
            "SELECT 1; Drop TABLE gostlm.gost_bq.x",
            "MERGE gostlm.gost_bq.a USING b ON true",
            "insert into gostlm.gost_bq.x values (1)",
            "ALTER TABLE gostlm.gost_bq.x ADD COLUMN y INT64",
        ] {
            assert_eq!(v.validate(sql), Err(QueryRejection::Mutating), "{sql}");
        }
    }

    #[test]
    fn test_mutating_check_runs_first() {
        let v = QueryValidator::default();
        assert_eq!(
            v.validate("DELETE FROM other.dataset.t"),
            Err(QueryRejection::Mutating)
        );
    }

    #[test]
    fn test_keyword_in_identifier_is_still_rejected() {
        // Lexical guard: a column ending in a mutating keyword trips it.
        let v = QueryValidator::default();
        assert_eq!(
            v.validate("SELECT last_update FROM gostlm.gost_bq.update_history"),
            Err(QueryRejection::Mutating)
        );
    }

    #[test]
    fn test_rejects_outside_namespace() {
        let v = QueryValidator::default();
        let err = v.validate("SELECT * FROM other.dataset.t").unwrap_err();
        assert_eq!(err.to_string(), "Query must reference gostlm.gost_bq tables.");
        assert_eq!(
            AgentError::from(err).to_string(),
            "Query must reference gostlm.gost_bq tables."
        );
    }

    #[test]
    fn test_custom_namespace() {
        let v = QueryValidator::new("acme.sec");
        assert!(v.validate("SELECT 1 FROM acme.sec.t").is_ok());
        assert_eq!(
            v.validate("SELECT 1 FROM gostlm.gost_bq.t").unwrap_err().to_string(),
            "Query must reference acme.sec tables."
        );
    }
}
