//! Value-equal identity for a statement request.

/// Whether a key identifies a prepared statement or a callable
/// (stored-procedure) statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// A parameterized statement prepared from SQL text.
    Prepared,
    /// A callable statement invoking a stored procedure.
    Callable,
}

/// Immutable identity of a distinct statement request.
///
/// Two keys built from logically identical prepare calls compare and
/// hash equal regardless of object identity, which is what lets the
/// pool find a reusable handle. Every execution option is carried as
/// an `Option` so "not specified by the caller" stays distinct from
/// any explicit value — including an explicit zero, which some drivers
/// use as a legitimate option constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
    sql: String,
    kind: StatementKind,
    result_set_type: Option<i32>,
    result_set_concurrency: Option<i32>,
    result_set_holdability: Option<i32>,
    auto_generated_keys: Option<i32>,
    column_indexes: Option<Vec<i32>>,
    column_names: Option<Vec<String>>,
}

impl StatementKey {
    fn bare(sql: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            sql: sql.into(),
            kind,
            result_set_type: None,
            result_set_concurrency: None,
            result_set_holdability: None,
            auto_generated_keys: None,
            column_indexes: None,
            column_names: None,
        }
    }

    /// Key for a prepared statement with no execution options.
    pub fn prepared(sql: impl Into<String>) -> Self {
        Self::bare(sql, StatementKind::Prepared)
    }

    /// Key for a prepared statement with an auto-generated-keys mode.
    pub fn prepared_with_generated_keys(sql: impl Into<String>, mode: i32) -> Self {
        Self {
            auto_generated_keys: Some(mode),
            ..Self::bare(sql, StatementKind::Prepared)
        }
    }

    /// Key for a prepared statement with result-set type and
    /// concurrency.
    pub fn prepared_with_result_set(
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
    ) -> Self {
        Self {
            result_set_type: Some(result_set_type),
            result_set_concurrency: Some(result_set_concurrency),
            ..Self::bare(sql, StatementKind::Prepared)
        }
    }

    /// Key for a prepared statement with result-set type, concurrency,
    /// and holdability.
    pub fn prepared_with_holdability(
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
        result_set_holdability: i32,
    ) -> Self {
        Self {
            result_set_holdability: Some(result_set_holdability),
            ..Self::prepared_with_result_set(sql, result_set_type, result_set_concurrency)
        }
    }

    /// Key for a prepared statement returning generated keys for the
    /// given column indexes. Order is significant.
    pub fn prepared_with_column_indexes(sql: impl Into<String>, indexes: Vec<i32>) -> Self {
        Self {
            column_indexes: Some(indexes),
            ..Self::bare(sql, StatementKind::Prepared)
        }
    }

    /// Key for a prepared statement returning generated keys for the
    /// given column names. Order is significant.
    pub fn prepared_with_column_names(sql: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            column_names: Some(names),
            ..Self::bare(sql, StatementKind::Prepared)
        }
    }

    /// Key for a callable statement with no execution options.
    pub fn callable(sql: impl Into<String>) -> Self {
        Self::bare(sql, StatementKind::Callable)
    }

    /// Key for a callable statement with result-set type and
    /// concurrency.
    pub fn callable_with_result_set(
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
    ) -> Self {
        Self {
            result_set_type: Some(result_set_type),
            result_set_concurrency: Some(result_set_concurrency),
            ..Self::bare(sql, StatementKind::Callable)
        }
    }

    /// Key for a callable statement with result-set type, concurrency,
    /// and holdability.
    pub fn callable_with_holdability(
        sql: impl Into<String>,
        result_set_type: i32,
        result_set_concurrency: i32,
        result_set_holdability: i32,
    ) -> Self {
        Self {
            result_set_holdability: Some(result_set_holdability),
            ..Self::callable_with_result_set(sql, result_set_type, result_set_concurrency)
        }
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The statement kind.
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Result-set type, if the caller specified one.
    #[must_use]
    pub fn result_set_type(&self) -> Option<i32> {
        self.result_set_type
    }

    /// Result-set concurrency mode, if the caller specified one.
    #[must_use]
    pub fn result_set_concurrency(&self) -> Option<i32> {
        self.result_set_concurrency
    }

    /// Result-set holdability, if the caller specified one.
    #[must_use]
    pub fn result_set_holdability(&self) -> Option<i32> {
        self.result_set_holdability
    }

    /// Auto-generated-keys mode, if the caller specified one.
    #[must_use]
    pub fn auto_generated_keys(&self) -> Option<i32> {
        self.auto_generated_keys
    }

    /// Generated-key column indexes, if the caller specified them.
    #[must_use]
    pub fn column_indexes(&self) -> Option<&[i32]> {
        self.column_indexes.as_deref()
    }

    /// Generated-key column names, if the caller specified them.
    #[must_use]
    pub fn column_names(&self) -> Option<&[String]> {
        self.column_names.as_deref()
    }
}
