/*
 * Daily-unique names for temporary projects: `project_<YYYYMMDD><suffix>`, where the
 * suffix is a bijective base-26 numeral (`a` = 1 ... `z` = 26, `aa` = 27). There is no
 * zero digit, so every positive count has exactly one spelling and names sort into
 * creation order within a day.
 */
use thiserror::Error;
use time::Date;
use time::macros::format_description;

pub const TEMPORARY_NAME_PREFIX: &str = "project_";
const DATE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Temporary name suffix '{suffix}' is not a lowercase base-26 numeral")]
    InvalidSuffix { suffix: String },
    #[error("Temporary name counter overflowed")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, NameError>;

pub fn encode_suffix(mut value: u64) -> String {
    let mut digits = Vec::new();
    while value > 0 {
        let digit = ((value - 1) % 26) as u8;
        digits.push(char::from(b'a' + digit));
        value = (value - 1) / 26;
    }
    digits.iter().rev().collect()
}

pub fn decode_suffix(suffix: &str) -> Result<u64> {
    suffix.chars().try_fold(0u64, |total, c| {
        if !c.is_ascii_lowercase() {
            return Err(NameError::InvalidSuffix {
                suffix: suffix.to_string(),
            });
        }
        let digit = u64::from(c as u8 - b'a' + 1);
        total
            .checked_mul(26)
            .and_then(|t| t.checked_add(digit))
            .ok_or(NameError::Overflow)
    })
}

pub fn format_day(day: Date) -> String {
    let format = format_description!("[year][month][day]");
    day.format(&format)
        .unwrap_or_else(|_| format!("{:04}{:02}{:02}", day.year(), u8::from(day.month()), day.day()))
}

/*
 * Next name after `last_name`. The counter continues when `last_name` was handed out
 * on `today` and starts over at `a` otherwise, including when there is no previous
 * name or it does not have the expected shape. A suffix that is not a valid numeral
 * on the same day is an error rather than a silent restart, since a restart would
 * hand out a name that may already exist.
 */
pub fn next_name(last_name: Option<&str>, today: Date) -> Result<String> {
    let today_str = format_day(today);
    let date_end = TEMPORARY_NAME_PREFIX.len() + DATE_LEN;

    let counter = match last_name {
        Some(last)
            if last.len() >= date_end
                && last.is_char_boundary(TEMPORARY_NAME_PREFIX.len())
                && last.is_char_boundary(date_end)
                && last[TEMPORARY_NAME_PREFIX.len()..date_end] == today_str =>
        {
            decode_suffix(&last[date_end..])?
                .checked_add(1)
                .ok_or(NameError::Overflow)?
        }
        _ => 1,
    };

    let name = format!("{TEMPORARY_NAME_PREFIX}{today_str}{}", encode_suffix(counter));
    log::debug!("TempNames: Allocated '{name}' after {last_name:?}.");
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_encode_is_bijective_base_26() {
        assert_eq!(encode_suffix(0), "");
        assert_eq!(encode_suffix(1), "a");
        assert_eq!(encode_suffix(26), "z");
        assert_eq!(encode_suffix(27), "aa");
        assert_eq!(encode_suffix(28), "ab");
        assert_eq!(encode_suffix(52), "az");
        assert_eq!(encode_suffix(53), "ba");
        assert_eq!(encode_suffix(702), "zz");
        assert_eq!(encode_suffix(703), "aaa");
    }

    #[test]
    fn test_decode_inverts_encode() {
        for value in [0u64, 1, 25, 26, 27, 700, 18_279] {
            assert_eq!(decode_suffix(&encode_suffix(value)), Ok(value));
        }
    }

    #[test]
    fn test_decode_rejects_foreign_characters() {
        assert!(matches!(decode_suffix("a1"), Err(NameError::InvalidSuffix { .. })));
        assert!(matches!(decode_suffix("A"), Err(NameError::InvalidSuffix { .. })));
        assert_eq!(decode_suffix(&"z".repeat(20)), Err(NameError::Overflow));
    }

    #[test]
    fn test_same_day_increments() {
        let today = date!(2024 - 01 - 01);
        assert_eq!(
            next_name(Some("project_20240101z"), today).unwrap(),
            "project_20240101aa"
        );
        assert_eq!(
            next_name(Some("project_20240101"), today).unwrap(),
            "project_20240101a"
        );
    }

    #[test]
    fn test_new_day_resets() {
        let today = date!(2024 - 03 - 15);
        assert_eq!(
            next_name(Some("project_20240101ab"), today).unwrap(),
            "project_20240315a"
        );
        assert_eq!(next_name(None, today).unwrap(), "project_20240315a");
        assert_eq!(next_name(Some("short"), today).unwrap(), "project_20240315a");
    }

    #[test]
    fn test_corrupt_suffix_on_same_day_is_an_error() {
        let today = date!(2024 - 01 - 01);
        assert!(matches!(
            next_name(Some("project_20240101a-b"), today),
            Err(NameError::InvalidSuffix { .. })
        ));
    }
}
