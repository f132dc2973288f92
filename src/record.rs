use csv::StringRecord;
use serde::Serialize;
use thiserror::Error;

/// Number of positional columns a source row must carry.
pub const FIELD_COUNT: usize = 10;

const SUNDAY: &str = "Sunday";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("row has {found} fields, expected at least {expected}")]
    TooFewFields { expected: usize, found: usize },
}

/// One trade observation, as stored in the destination table.
///
/// Column names follow the destination table schema, which is why
/// `transport_mode` serializes as `Transport_Mode`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TradeRecord {
    #[serde(rename = "Direction")]
    pub direction: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "Transport_Mode")]
    pub transport_mode: String,
    #[serde(rename = "Measure")]
    pub measure: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Cumulative")]
    pub cumulative: String,
}

impl TradeRecord {
    /// Build a record from a raw CSV row. Fields past the tenth are ignored.
    pub fn from_record(raw: &StringRecord) -> Result<Self, RowError> {
        if raw.len() < FIELD_COUNT {
            return Err(RowError::TooFewFields {
                expected: FIELD_COUNT,
                found: raw.len(),
            });
        }

        let field = |i: usize| raw.get(i).unwrap_or_default().to_string();
        Ok(Self {
            direction: field(0),
            year: field(1),
            date: field(2),
            weekday: field(3),
            country: field(4),
            commodity: field(5),
            transport_mode: field(6),
            measure: field(7),
            value: field(8),
            cumulative: field(9),
        })
    }

    /// Zero `value` and `cumulative` on Sunday rows. Returns whether the rule fired.
    pub fn apply_sunday_rule(&mut self) -> bool {
        if self.weekday != SUNDAY {
            return false;
        }
        self.value = "0".to_string();
        self.cumulative = "0".to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    fn sample(weekday: &str) -> TradeRecord {
        TradeRecord::from_record(&raw(&[
            "Exports",
            "2020",
            "01/01/2020",
            weekday,
            "All",
            "All",
            "All",
            "$",
            "42",
            "100",
        ]))
        .unwrap()
    }

    #[test]
    fn test_sunday_rows_are_zeroed() {
        let mut record = sample("Sunday");
        let before = record.clone();

        assert!(record.apply_sunday_rule());
        assert_eq!(record.value, "0");
        assert_eq!(record.cumulative, "0");

        // everything else is untouched
        assert_eq!(
            TradeRecord {
                value: before.value.clone(),
                cumulative: before.cumulative.clone(),
                ..record.clone()
            },
            before
        );
    }

    #[test]
    fn test_other_days_are_untouched() {
        for day in ["Monday", "Saturday", "sunday", "SUNDAY", ""] {
            let mut record = sample(day);
            let before = record.clone();
            assert!(!record.apply_sunday_rule(), "rule fired for {day:?}");
            assert_eq!(record, before);
        }
    }

    #[test]
    fn test_short_row_is_rejected() {
        let err = TradeRecord::from_record(&raw(&["Exports", "2020", "01/01/2020"])).unwrap_err();
        assert_eq!(
            err,
            RowError::TooFewFields {
                expected: 10,
                found: 3
            }
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let record = TradeRecord::from_record(&raw(&[
            "Imports", "2021", "02/01/2021", "Tuesday", "China", "Logs", "Sea", "Tonnes", "7",
            "9", "extra",
        ]))
        .unwrap();
        assert_eq!(record.country, "China");
        assert_eq!(record.cumulative, "9");
    }

    #[test]
    fn test_serializes_with_table_column_names() {
        let json = serde_json::to_value(sample("Friday")).unwrap();
        assert_eq!(json["Transport_Mode"], "All");
        assert_eq!(json["Weekday"], "Friday");
        assert_eq!(json["Value"], "42");
        assert_eq!(json.as_object().unwrap().len(), FIELD_COUNT);
    }
}
