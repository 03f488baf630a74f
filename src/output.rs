//! Output options for the processing/export step.

use crate::date_range::DateRange;
use serde::{Deserialize, Serialize};

/// Export configuration supplied by the UI and consumed by URL synthesis.
///
/// The string fields map one-to-one onto query-string parameters and are kept
/// verbatim; the crate does not interpret them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    /// `style` parameter, e.g. `tab` or `csv`.
    pub file_format: String,
    /// `DateFormat` parameter, e.g. `Excel` or `ISO`.
    pub date_format: String,
    /// `TZ` parameter, e.g. `0_GMT` or `-5_CDT`.
    pub time_zone: String,
    /// `timeInt` parameter: the acceptable data gap, in hours.
    pub time_gap_interval: String,
    /// `fill` parameter: the marker written for missing values.
    pub missing_value: String,
    /// `beginPosition`/`endPosition` parameters.
    pub date_range: Option<DateRange>,
}

impl OutputOptions {
    /// The defaults applied when the workflow enters the processing step.
    pub fn process_defaults() -> Self {
        Self {
            file_format: "tab".to_string(),
            date_format: "Excel".to_string(),
            time_zone: "0_GMT".to_string(),
            time_gap_interval: "6".to_string(),
            missing_value: "NaN".to_string(),
            date_range: None,
        }
    }
}
