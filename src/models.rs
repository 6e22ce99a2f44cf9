//! Report data structures.
//!
//! A [`Report`] is one stored row: an order-level fee entry that owns an
//! ordered list of [`ReportFeeDetail`] line items. The export flattens each
//! report into one [`ReportLine`] per detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time format used in export file names (`YYYYMMDD`).
pub const REPORT_NAME_TIME_FORMAT: &str = "%Y%m%d";

/// Time format used in CSV rows (`YYYY-MM-DD HH:MM:SS`).
pub const REPORT_LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One stored report row.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: i64,
    pub shop_id: i64,
    pub order_id: i64,
    pub order_creation_time: DateTime<Utc>,
    pub order_payment_time: DateTime<Utc>,
    pub order_settlement_time: DateTime<Utc>,
    pub fee_id: i64,
    pub details: Vec<ReportFeeDetail>,
    pub creation_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// One fee line item owned by a [`Report`].
///
/// Stored as an element of the JSON array in the `details` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFeeDetail {
    pub order_detail_id: i64,
    pub category_id: i64,
    pub product_id: i64,
    pub product_price_amount: f64,
    pub promo_amount: f64,
    pub fee_base_amount: f64,
    pub fee_final_amount: f64,
}

/// A report's scalar fields joined with exactly one of its details.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub shop_id: i64,
    pub order_id: i64,
    pub order_creation_time: DateTime<Utc>,
    pub order_payment_time: DateTime<Utc>,
    pub order_settlement_time: DateTime<Utc>,
    pub fee_id: i64,
    pub detail: ReportFeeDetail,
}

impl Report {
    /// Flattens this report into one line per detail, in detail order.
    ///
    /// Consumes the report; a report without details yields nothing.
    pub fn into_lines(self) -> impl Iterator<Item = ReportLine> {
        let Report {
            shop_id,
            order_id,
            order_creation_time,
            order_payment_time,
            order_settlement_time,
            fee_id,
            details,
            ..
        } = self;

        details.into_iter().map(move |detail| ReportLine {
            shop_id,
            order_id,
            order_creation_time,
            order_payment_time,
            order_settlement_time,
            fee_id,
            detail,
        })
    }
}
