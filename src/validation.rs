use chrono::{Datelike, NaiveDate};

use crate::error::ApiError;
use crate::records::{COLLECTIONS, Collection};

pub fn validate_month(value: u32) -> Result<u32, ApiError> {
    if (1..=12).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest("month must be between 1 and 12".into()))
    }
}

pub fn validate_year(value: i32) -> Result<i32, ApiError> {
    if (1900..=9999).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest("year must be between 1900 and 9999".into()))
    }
}

/// Year and month to show, defaulting to the month of `today`.
pub fn calendar_month(
    year: Option<i32>,
    month: Option<u32>,
    today: NaiveDate,
) -> Result<(i32, u32), ApiError> {
    let year = validate_year(year.unwrap_or(today.year()))?;
    let month = validate_month(month.unwrap_or(today.month()))?;
    Ok((year, month))
}

pub fn validate_collection(name: &str) -> Result<Collection, ApiError> {
    Collection::from_name(name).ok_or_else(|| {
        ApiError::NotFound(format!(
            "Unknown collection '{name}', expected one of: {}",
            COLLECTIONS.join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_month() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn test_calendar_month_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert_eq!(calendar_month(None, None, today).unwrap(), (2024, 5));
        assert_eq!(calendar_month(Some(2023), Some(2), today).unwrap(), (2023, 2));
        assert!(calendar_month(Some(20000), None, today).is_err());
    }

    #[test]
    fn test_validate_collection() {
        assert_eq!(validate_collection("students").unwrap(), Collection::Students);
        assert_eq!(validate_collection("cars").unwrap(), Collection::Cars);
        assert!(validate_collection("weather").is_err());
    }
}
