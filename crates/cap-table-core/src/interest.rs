use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::CapTableError;
use crate::rounding::{as_currency, round_to};
use crate::types::{Money, Rate};
use crate::CapTableResult;

const DAYS_PER_YEAR: Decimal = dec!(365);

/// Simple (non-compounding) interest, rounded to cents.
pub fn simple_interest(principal: Money, rate: Rate, period_years: Decimal) -> Money {
    as_currency(rate * principal * period_years)
}

/// Actual/365 year fraction between two dates, rounded to hundredths of a year.
pub fn year_fraction(start: NaiveDate, end: NaiveDate) -> CapTableResult<Decimal> {
    let days = (end - start).num_days();
    if days < 0 {
        return Err(CapTableError::DateError(format!(
            "conversion date {end} precedes interest start date {start}"
        )));
    }
    Ok(round_to(Decimal::from(days) / DAYS_PER_YEAR, 2))
}

/// Interest accrued on `principal` from `start` to `end`.
pub fn accrued_interest(
    principal: Money,
    rate: Rate,
    start: NaiveDate,
    end: NaiveDate,
) -> CapTableResult<Money> {
    if rate.is_zero() || principal.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let period = year_fraction(start, end)?;
    Ok(simple_interest(principal, rate, period))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_simple_interest_basic() {
        assert_eq!(simple_interest(dec!(500000), dec!(0.06), dec!(5)), dec!(150000));
    }

    #[test]
    fn test_simple_interest_rounds_to_cents() {
        // 1000 * 0.0333 * 0.33 = 10.989
        assert_eq!(simple_interest(dec!(1000), dec!(0.0333), dec!(0.33)), dec!(10.99));
    }

    #[test]
    fn test_year_fraction_spanning_leap_year() {
        // 1826 days / 365 = 5.0027 -> 5.00
        let yf = year_fraction(date(2018, 12, 17), date(2023, 12, 17)).unwrap();
        assert_eq!(yf, dec!(5.00));
    }

    #[test]
    fn test_year_fraction_half_year() {
        // 182 days / 365 = 0.4986 -> 0.50
        let yf = year_fraction(date(2023, 1, 1), date(2023, 7, 2)).unwrap();
        assert_eq!(yf, dec!(0.50));
    }

    #[test]
    fn test_year_fraction_same_day() {
        let d = date(2024, 3, 1);
        assert_eq!(year_fraction(d, d).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_year_fraction_reversed_dates() {
        assert!(year_fraction(date(2024, 1, 1), date(2023, 1, 1)).is_err());
    }

    #[test]
    fn test_accrued_interest_zero_rate_skips_dates() {
        // Reversed dates are irrelevant when nothing accrues
        let interest =
            accrued_interest(dec!(200000), Decimal::ZERO, date(2024, 1, 1), date(2023, 1, 1))
                .unwrap();
        assert_eq!(interest, Decimal::ZERO);
    }

    #[test]
    fn test_accrued_interest() {
        // 2020-11-10 -> 2023-05-15 = 916 days -> 2.51 years; 200000 * 0.06 * 2.51 = 30120
        let interest =
            accrued_interest(dec!(200000), dec!(0.06), date(2020, 11, 10), date(2023, 5, 15))
                .unwrap();
        assert_eq!(interest, dec!(30120));
    }
}
