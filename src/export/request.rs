//! Export requests and their validation.

use chrono::{DateTime, Duration, Utc};

use crate::error_handling::ValidationError;
use crate::models::REPORT_NAME_TIME_FORMAT;
use crate::storage::{ReportFilter, TimeRange};

/// An export request as received from a caller.
///
/// A timestamp equal to the Unix epoch is treated the same as a missing one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRequest {
    pub shop_id: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A request that passed validation. Only [`ExportRequest::validate`] builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRequest {
    shop_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl ExportRequest {
    pub fn new(shop_id: i64, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            shop_id,
            start_time: Some(start_time),
            end_time: Some(end_time),
        }
    }

    /// Checks the request against the export rules.
    ///
    /// Rules, in order: positive shop id, both bounds present, start not after
    /// end, window no longer than `max_window_days`.
    pub fn validate(&self, max_window_days: u32) -> Result<ValidatedRequest, ValidationError> {
        if self.shop_id <= 0 {
            return Err(ValidationError::MissingShopId);
        }
        let start_time = present(self.start_time).ok_or(ValidationError::MissingStartTime)?;
        let end_time = present(self.end_time).ok_or(ValidationError::MissingEndTime)?;

        if start_time > end_time {
            return Err(ValidationError::StartAfterEnd);
        }
        if end_time - start_time > Duration::days(i64::from(max_window_days)) {
            return Err(ValidationError::WindowTooLong {
                limit_days: max_window_days,
            });
        }

        Ok(ValidatedRequest {
            shop_id: self.shop_id,
            start_time,
            end_time,
        })
    }
}

fn present(time: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    time.filter(|t| *t != DateTime::<Utc>::UNIX_EPOCH)
}

impl ValidatedRequest {
    pub fn shop_id(&self) -> i64 {
        self.shop_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// `<shop_id>_<start:YYYYMMDD>_<end:YYYYMMDD>.csv`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.csv",
            self.shop_id,
            self.start_time.format(REPORT_NAME_TIME_FORMAT),
            self.end_time.format(REPORT_NAME_TIME_FORMAT)
        )
    }

    /// Reports of this shop settled inside the window, bounds inclusive.
    pub fn filter(&self) -> ReportFilter {
        ReportFilter {
            shop_id: Some(self.shop_id),
            settlement_time: Some(TimeRange::new(Some(self.start_time), Some(self.end_time))),
        }
    }
}
