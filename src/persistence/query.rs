/// Shared criteria for builder-style store queries
///
/// Store queries accumulate restrictions into a `QueryCriteria` and render it
/// into SELECT or DELETE statements through sqlx's `QueryBuilder`.
/// Values are always bound, never interpolated into the SQL text.

use crate::persistence::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// Sort direction for ordered queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

impl OrderDirection {
    fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASC",
            OrderDirection::Descending => "DESC",
        }
    }
}

/// Bound value of a comparison restriction
#[derive(Debug, Clone)]
pub(crate) enum QueryValue {
    Text(String),
    Integer(i64),
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Integer(i64::from(value))
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(value: DateTime<Utc>) -> Self {
        QueryValue::Integer(to_millis(value))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Comparison {
    Equal,
    LessThan,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparison {
    fn operator(self) -> &'static str {
        match self {
            Comparison::Equal => " = ",
            Comparison::LessThan => " < ",
            Comparison::GreaterThan => " > ",
            Comparison::GreaterThanOrEqual => " >= ",
        }
    }
}

#[derive(Debug, Clone)]
enum Restriction {
    Compare {
        column: &'static str,
        comparison: Comparison,
        value: QueryValue,
        include_null: bool,
    },
    Membership {
        column: &'static str,
        values: Vec<String>,
        include_null: bool,
    },
}

/// Accumulated predicates, ordering and paging of one query
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryCriteria {
    restrictions: Vec<Restriction>,
    order: Option<(&'static str, OrderDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QueryCriteria {
    pub fn compare(&mut self, column: &'static str, comparison: Comparison, value: impl Into<QueryValue>) {
        self.restrictions.push(Restriction::Compare {
            column,
            comparison,
            value: value.into(),
            include_null: false,
        });
    }

    /// `column IS NULL OR column <comparison> value`
    pub fn null_or_compare(&mut self, column: &'static str, comparison: Comparison, value: impl Into<QueryValue>) {
        self.restrictions.push(Restriction::Compare {
            column,
            comparison,
            value: value.into(),
            include_null: true,
        });
    }

    pub fn equal(&mut self, column: &'static str, value: impl Into<QueryValue>) {
        self.compare(column, Comparison::Equal, value);
    }

    /// `column IN (values)`; an empty list matches nothing
    pub fn any_of(&mut self, column: &'static str, values: Vec<String>) {
        self.restrictions.push(Restriction::Membership {
            column,
            values,
            include_null: false,
        });
    }

    /// `column IS NULL OR column IN (values)`
    pub fn null_or_any_of(&mut self, column: &'static str, values: Vec<String>) {
        self.restrictions.push(Restriction::Membership {
            column,
            values,
            include_null: true,
        });
    }

    pub fn order_by(&mut self, column: &'static str, direction: OrderDirection) {
        self.order = Some((column, direction));
    }

    pub fn limit(&mut self, limit: i64) {
        self.limit = Some(limit);
    }

    pub fn offset(&mut self, offset: i64) {
        self.offset = Some(offset);
    }

    /// Render a SELECT with restrictions, ordering and paging applied
    pub fn select(&self, table: &str, columns: &str) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new(format!("SELECT {columns} FROM {table}"));
        self.push_where(&mut builder);

        if let Some((column, direction)) = self.order {
            builder.push(format!(" ORDER BY {} {}", column, direction.as_sql()));
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                builder.push(" LIMIT ").push_bind(limit);
                if let Some(offset) = offset {
                    builder.push(" OFFSET ").push_bind(offset);
                }
            }
            // SQLite only accepts OFFSET together with LIMIT
            (None, Some(offset)) => {
                builder.push(" LIMIT -1 OFFSET ").push_bind(offset);
            }
            (None, None) => {}
        }

        builder
    }

    /// Render a DELETE with the same restrictions (ordering and paging are ignored)
    pub fn delete(&self, table: &str) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new(format!("DELETE FROM {table}"));
        self.push_where(&mut builder);
        builder
    }

    fn push_where(&self, builder: &mut QueryBuilder<'static, Sqlite>) {
        for (index, restriction) in self.restrictions.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });

            match restriction {
                Restriction::Compare {
                    column,
                    comparison,
                    value,
                    include_null,
                } => {
                    if *include_null {
                        builder.push("(").push(*column).push(" IS NULL OR ");
                    }
                    builder.push(*column).push(comparison.operator());
                    match value {
                        QueryValue::Text(text) => builder.push_bind(text.clone()),
                        QueryValue::Integer(number) => builder.push_bind(*number),
                    };
                    if *include_null {
                        builder.push(")");
                    }
                }
                Restriction::Membership {
                    column,
                    values,
                    include_null,
                } => {
                    if values.is_empty() {
                        if *include_null {
                            builder.push(*column).push(" IS NULL");
                        } else {
                            builder.push("1 = 0");
                        }
                        continue;
                    }

                    builder.push("(");
                    if *include_null {
                        builder.push(*column).push(" IS NULL OR ");
                    }
                    builder.push(*column).push(" IN (");
                    let mut separated = builder.separated(", ");
                    for value in values {
                        separated.push_bind(value.clone());
                    }
                    separated.push_unseparated("))");
                }
            }
        }
    }
}

pub(crate) fn to_millis(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {millis}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_renders_restrictions_order_and_paging() {
        let mut criteria = QueryCriteria::default();
        criteria.equal("space_id", "space-1");
        criteria.compare("started_at", Comparison::LessThan, 5000_i64);
        criteria.order_by("process_id", OrderDirection::Ascending);
        criteria.limit(2);
        criteria.offset(4);

        let builder = criteria.select("operation", "*");
        assert_eq!(
            builder.sql(),
            "SELECT * FROM operation WHERE space_id = ? AND started_at < ? ORDER BY process_id ASC LIMIT ? OFFSET ?"
        );
    }

    #[test]
    fn membership_restrictions_handle_null_and_empty_lists() {
        let mut criteria = QueryCriteria::default();
        criteria.null_or_any_of("state", vec!["RUNNING".to_string(), "ERROR".to_string()]);
        criteria.null_or_any_of("mta_id", Vec::new());

        let builder = criteria.delete("operation");
        assert_eq!(
            builder.sql(),
            "DELETE FROM operation WHERE (state IS NULL OR state IN (?, ?)) AND mta_id IS NULL"
        );
    }

    #[test]
    fn nullable_comparison_binds_a_single_value() {
        let mut criteria = QueryCriteria::default();
        criteria.compare("started_at", Comparison::LessThan, 5000_i64);
        criteria.null_or_compare("ended_at", Comparison::LessThan, 9000_i64);

        let builder = criteria.delete("operation");
        assert_eq!(
            builder.sql(),
            "DELETE FROM operation WHERE started_at < ? AND (ended_at IS NULL OR ended_at < ?)"
        );
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut criteria = QueryCriteria::default();
        criteria.any_of("lock_owner", Vec::new());

        assert_eq!(criteria.delete("lock_owner").sql(), "DELETE FROM lock_owner WHERE 1 = 0");
    }

    #[test]
    fn millis_round_trip_keeps_instant() {
        let timestamp = DateTime::from_timestamp_millis(1_605_447_025_010).unwrap();
        assert_eq!(from_millis(to_millis(timestamp)).unwrap(), timestamp);
    }
}
