//! Report query construction.
//!
//! A [`ReportFilter`] says which reports to read; [`ReportQuery::build`] turns
//! it into parameterized SQL. Only the predicates the filter supplies are
//! added, so an empty filter selects every row.

use chrono::{DateTime, Utc};

const SELECT_REPORTS: &str = "SELECT id, shop_id, order_id, order_creation_time_ms, \
     order_payment_time_ms, order_settlement_time_ms, fee_id, details, \
     creation_time_ms, update_time_ms FROM report";

/// Inclusive time window; either bound may be left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Report selection criteria.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Ignored unless positive.
    pub shop_id: Option<i64>,
    /// Applied to the order settlement time.
    pub settlement_time: Option<TimeRange>,
}

/// SQL text plus its positional parameters.
///
/// All parameters are integers: ids, and timestamps as milliseconds since
/// the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    sql: String,
    binds: Vec<i64>,
}

impl ReportQuery {
    /// Builds the query for `filter`.
    pub fn build(filter: &ReportFilter) -> Self {
        let mut query = ReportQuery {
            sql: SELECT_REPORTS.to_string(),
            binds: Vec::new(),
        };
        let mut has_where = false;

        if let Some(shop_id) = filter.shop_id.filter(|id| *id > 0) {
            query.push_clause(&mut has_where, "shop_id = ?");
            query.binds.push(shop_id);
        }

        if let Some(range) = filter.settlement_time.filter(|r| !r.is_empty()) {
            let mut bounds = Vec::with_capacity(2);
            if let Some(start) = range.start {
                bounds.push("order_settlement_time_ms >= ?");
                query.binds.push(start.timestamp_millis());
            }
            if let Some(end) = range.end {
                bounds.push("order_settlement_time_ms <= ?");
                query.binds.push(end.timestamp_millis());
            }
            query.push_clause(&mut has_where, &format!("({})", bounds.join(" AND ")));
        }

        query
    }

    fn push_clause(&mut self, has_where: &mut bool, clause: &str) {
        if *has_where {
            self.sql.push_str(" AND ");
        } else {
            self.sql.push_str(" WHERE ");
            *has_where = true;
        }
        self.sql.push_str(clause);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[i64] {
        &self.binds
    }
}
