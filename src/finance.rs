//! Revenue and profit over the sales log.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;

use std::{collections::BTreeMap, sync::LazyLock};

use crate::{clock::parse_date, Error, Money, PurchaseRecord, Result, SaleRecord};

static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("month pattern is valid"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year pattern is valid"));

/// A closed interval of dates.
///
/// A range whose start is after its end contains no dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parses a range from two `YYYY-MM-DD` dates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDate`] if either date cannot be parsed.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Total revenue over a date range, in the shape reports and exports use.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_revenue: Money,
}

/// Revenue taken on one day.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Money,
}

fn takings(sale: &SaleRecord) -> Result<Money> {
    sale.unit_price.try_mul(sale.quantity)
}

/// Returns the sum of quantity times unit price over the sales in `range`.
///
/// # Errors
///
/// Returns [`Error::Overflow`] if the total does not fit.
pub fn total_revenue(sales: &[SaleRecord], range: DateRange) -> Result<Money> {
    sales
        .iter()
        .filter(|s| range.contains(s.sale_date))
        .try_fold(Money::ZERO, |total, sale| total.try_add(takings(sale)?))
}

/// # Errors
///
/// Returns [`Error::Overflow`] if the total does not fit.
pub fn revenue_summary(sales: &[SaleRecord], range: DateRange) -> Result<RevenueSummary> {
    Ok(RevenueSummary {
        start_date: range.start,
        end_date: range.end,
        total_revenue: total_revenue(sales, range)?,
    })
}

/// Returns revenue per day over `range`, earliest first.
///
/// Only days with at least one sale appear.
///
/// # Errors
///
/// Returns [`Error::Overflow`] if a day's total does not fit.
pub fn daily_revenue(sales: &[SaleRecord], range: DateRange) -> Result<Vec<DailyRevenue>> {
    let mut days: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for sale in sales.iter().filter(|s| range.contains(s.sale_date)) {
        let day = days.entry(sale.sale_date).or_default();
        *day = day.try_add(takings(sale)?)?;
    }
    Ok(days
        .into_iter()
        .map(|(date, revenue)| DailyRevenue { date, revenue })
        .collect())
}

/// Selects which sales a profit report covers.
///
/// Each variant's value is optional; without one, every sale passes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProfitFilter {
    All,
    Day(Option<NaiveDate>),
    Month(Option<(i32, u32)>),
    Year(Option<i32>),
    Product(Option<String>),
}

impl ProfitFilter {
    /// Builds a filter from a period kind (`day`, `month`, `year`, `all` or
    /// `product`) and an optional value for it.
    ///
    /// The value is `YYYY-MM-DD` for a day, `YYYY-MM` for a month, `YYYY` for
    /// a year and a product name for a product. It is ignored for `all`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPeriod`] for an unknown kind, or
    /// [`Error::InvalidDate`] if a date value doesn't fit its kind.
    pub fn parse(kind: &str, value: Option<&str>) -> Result<Self> {
        match kind {
            "all" => Ok(Self::All),
            "day" => Ok(Self::Day(value.map(parse_date).transpose()?)),
            "month" => Ok(Self::Month(value.map(parse_month).transpose()?)),
            "year" => Ok(Self::Year(value.map(parse_year).transpose()?)),
            "product" => Ok(Self::Product(value.map(str::to_string))),
            other => Err(Error::InvalidPeriod(other.to_string())),
        }
    }

    #[must_use]
    pub fn matches(&self, sale: &SaleRecord) -> bool {
        let date = sale.sale_date;
        match self {
            Self::All
            | Self::Day(None)
            | Self::Month(None)
            | Self::Year(None)
            | Self::Product(None) => true,
            Self::Day(Some(day)) => date == *day,
            Self::Month(Some((year, month))) => date.year() == *year && date.month() == *month,
            Self::Year(Some(year)) => date.year() == *year,
            Self::Product(Some(product)) => sale.product == *product,
        }
    }
}

fn parse_month(input: &str) -> Result<(i32, u32)> {
    let invalid = || Error::InvalidDate {
        input: input.to_string(),
        expected: "YYYY-MM",
    };
    let caps = YEAR_MONTH.captures(input.trim()).ok_or_else(invalid)?;
    let year = caps[1].parse().map_err(|_| invalid())?;
    let month = caps[2].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

fn parse_year(input: &str) -> Result<i32> {
    let invalid = || Error::InvalidDate {
        input: input.to_string(),
        expected: "YYYY",
    };
    if !YEAR.is_match(input.trim()) {
        return Err(invalid());
    }
    input.trim().parse().map_err(|_| invalid())
}

/// Profit made on one sale.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProfitLine {
    pub product: String,
    pub date: NaiveDate,
    pub profit: Money,
}

/// Computes the profit of each sale that passes `filter`, in sales-log order.
///
/// A sale's cost basis is the unit price of the first purchase of the same
/// product in the purchase log, whichever lot the goods actually came from.
/// Sales of products never purchased produce no line.
///
/// # Errors
///
/// Returns [`Error::Overflow`] if a sale's profit does not fit.
pub fn profit_lines(
    purchases: &[PurchaseRecord],
    sales: &[SaleRecord],
    filter: &ProfitFilter,
) -> Result<Vec<ProfitLine>> {
    let mut lines = Vec::new();
    for sale in sales.iter().filter(|s| filter.matches(s)) {
        let Some(basis) = purchases.iter().find(|p| p.product == sale.product) else {
            continue;
        };
        let margin = sale.unit_price.try_sub(basis.unit_price)?;
        lines.push(ProfitLine {
            product: sale.product.clone(),
            date: sale.sale_date,
            profit: margin.try_mul(sale.quantity)?,
        });
    }
    Ok(lines)
}

/// # Errors
///
/// Returns [`Error::Overflow`] if the total does not fit.
pub fn total_profit(lines: &[ProfitLine]) -> Result<Money> {
    Money::try_sum(lines.iter().map(|l| l.profit))
}

/// Sums profit lines per product, in order of each product's first line.
///
/// # Errors
///
/// Returns [`Error::Overflow`] if a product's total does not fit.
pub fn profit_by_product(lines: &[ProfitLine]) -> Result<Vec<(String, Money)>> {
    let mut totals: Vec<(String, Money)> = Vec::new();
    for line in lines {
        match totals.iter_mut().find(|(name, _)| *name == line.product) {
            Some((_, total)) => *total = total.try_add(line.profit)?,
            None => totals.push((line.product.clone(), line.profit)),
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::Store;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn shop() -> (Vec<PurchaseRecord>, Vec<SaleRecord>) {
        let store = Store::open("testdata/shop");
        (store.read_all().unwrap(), store.read_all().unwrap())
    }

    #[test]
    fn total_revenue_fn_sums_sales_in_closed_range() {
        let (_, sales) = shop();
        let range = DateRange::parse("2024-01-05", "2024-01-10").unwrap();
        // bread 4 x 2.00, milk 3 x 3.50, eggs 12 x 0.50
        assert_eq!(total_revenue(&sales, range).unwrap(), money("24.50"));
        let everything = DateRange::parse("2000-01-01", "2100-01-01").unwrap();
        assert_eq!(total_revenue(&sales, everything).unwrap(), money("40.49"));
    }

    #[test]
    fn total_revenue_fn_is_additive_over_adjacent_ranges() {
        let (_, sales) = shop();
        let revenue = |start, end| {
            total_revenue(&sales, DateRange::parse(start, end).unwrap()).unwrap()
        };
        let whole = revenue("2024-01-01", "2024-02-28");
        let first = revenue("2024-01-01", "2024-01-10");
        let rest = revenue("2024-01-11", "2024-02-28");
        assert_eq!(whole, first.try_add(rest).unwrap());
    }

    #[test]
    fn total_revenue_fn_returns_zero_for_inverted_range() {
        let (_, sales) = shop();
        let range = DateRange::parse("2024-02-01", "2024-01-01").unwrap();
        assert_eq!(total_revenue(&sales, range).unwrap(), Money::ZERO);
    }

    #[test]
    fn date_range_parse_fn_rejects_bad_dates() {
        assert!(matches!(
            DateRange::parse("2024-01-01", "tomorrow"),
            Err(Error::InvalidDate { .. })
        ));
    }

    #[test]
    fn daily_revenue_fn_groups_by_date_in_order() {
        let (_, sales) = shop();
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        let day = |d, revenue| DailyRevenue {
            date: date(d),
            revenue: money(revenue),
        };
        assert_eq!(
            daily_revenue(&sales, range).unwrap(),
            vec![
                day("2024-01-05", "8.00"),
                day("2024-01-10", "16.50"),
                day("2024-01-12", "9.99"),
            ]
        );
    }

    #[test]
    fn profit_lines_fn_matches_single_day() {
        let purchases = [PurchaseRecord {
            id: 1,
            product: "milk".into(),
            quantity: 10,
            unit_price: money("2.00"),
            purchase_date: date("2024-01-01"),
            expiration_date: date("2024-02-01"),
        }];
        let sales = [SaleRecord {
            id: 1,
            product: "milk".into(),
            quantity: 3,
            unit_price: money("3.50"),
            sale_date: date("2024-01-10"),
        }];
        let filter = ProfitFilter::parse("day", Some("2024-01-10")).unwrap();
        assert_eq!(
            profit_lines(&purchases, &sales, &filter).unwrap(),
            vec![ProfitLine {
                product: "milk".into(),
                date: date("2024-01-10"),
                profit: money("4.50"),
            }]
        );
        let other_day = ProfitFilter::parse("day", Some("2024-01-11")).unwrap();
        assert!(profit_lines(&purchases, &sales, &other_day)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn profit_lines_fn_uses_first_purchase_as_cost_basis() {
        let (purchases, sales) = shop();
        let filter = ProfitFilter::parse("product", Some("milk")).unwrap();
        let lines = profit_lines(&purchases, &sales, &filter).unwrap();
        let milk = |d, profit| ProfitLine {
            product: "milk".into(),
            date: date(d),
            profit: money(profit),
        };
        // Both milk sales are costed at lot 1's 2.00, not lot 3's 1.80.
        assert_eq!(
            lines,
            vec![milk("2024-01-10", "4.50"), milk("2024-02-03", "2.00")]
        );
    }

    #[test]
    fn profit_lines_fn_skips_sales_without_purchase_and_keeps_log_order() {
        let (purchases, sales) = shop();
        let lines = profit_lines(&purchases, &sales, &ProfitFilter::All).unwrap();
        let products: Vec<&str> = lines.iter().map(|l| l.product.as_str()).collect();
        assert_eq!(products, vec!["milk", "bread", "eggs", "milk"]);
        assert_eq!(total_profit(&lines).unwrap(), money("13.50"));
    }

    #[test]
    fn profit_filter_fn_filters_by_month_and_year() {
        let (purchases, sales) = shop();
        let count = |filter: &ProfitFilter| profit_lines(&purchases, &sales, filter).unwrap().len();
        let january = ProfitFilter::parse("month", Some("2024-01")).unwrap();
        assert_eq!(count(&january), 3);
        let february = ProfitFilter::parse("month", Some("2024-02")).unwrap();
        assert_eq!(count(&february), 1);
        let year = ProfitFilter::parse("year", Some("2024")).unwrap();
        assert_eq!(count(&year), 4);
        let last_year = ProfitFilter::parse("year", Some("2023")).unwrap();
        assert_eq!(count(&last_year), 0);
    }

    #[test]
    fn profit_filter_parse_fn_without_value_matches_everything() {
        let (purchases, sales) = shop();
        for kind in ["day", "month", "year", "product", "all"] {
            let filter = ProfitFilter::parse(kind, None).unwrap();
            let lines = profit_lines(&purchases, &sales, &filter).unwrap();
            assert_eq!(lines.len(), 4, "{kind}");
        }
        assert_eq!(
            ProfitFilter::parse("all", Some("ignored")).unwrap(),
            ProfitFilter::All
        );
    }

    #[test]
    fn profit_filter_parse_fn_rejects_bad_values() {
        assert!(matches!(
            ProfitFilter::parse("week", None),
            Err(Error::InvalidPeriod(_))
        ));
        let bad = [
            ("day", "2024-01"),
            ("month", "2024-13"),
            ("month", "2024"),
            ("year", "24"),
        ];
        for (kind, value) in bad {
            assert!(
                matches!(
                    ProfitFilter::parse(kind, Some(value)),
                    Err(Error::InvalidDate { .. })
                ),
                "accepted {kind} {value}"
            );
        }
    }

    #[test]
    fn profit_by_product_fn_totals_in_first_seen_order() {
        let (purchases, sales) = shop();
        let lines = profit_lines(&purchases, &sales, &ProfitFilter::All).unwrap();
        assert_eq!(
            profit_by_product(&lines).unwrap(),
            vec![
                ("milk".to_string(), money("6.50")),
                ("bread".to_string(), money("4.00")),
                ("eggs".to_string(), money("3.00")),
            ]
        );
    }

    #[test]
    fn revenue_and_profit_fns_report_overflow() {
        let price = Money::from_cents(i64::MAX / 4);
        let sale = |id| SaleRecord {
            id,
            product: "caviar".into(),
            quantity: 3,
            unit_price: price,
            sale_date: date("2024-01-10"),
        };
        let everything = DateRange::parse("2024-01-01", "2024-12-31").unwrap();
        // Each sale fits on its own; two of them together do not.
        assert!(total_revenue(&[sale(1)], everything).is_ok());
        let sales = [sale(1), sale(2)];
        assert!(matches!(total_revenue(&sales, everything), Err(Error::Overflow)));
        assert!(matches!(daily_revenue(&sales, everything), Err(Error::Overflow)));
        assert!(matches!(revenue_summary(&sales, everything), Err(Error::Overflow)));

        let purchases = [PurchaseRecord {
            id: 1,
            product: "caviar".into(),
            quantity: 1,
            unit_price: Money::from_cents(-price.cents()),
            purchase_date: date("2024-01-01"),
            expiration_date: date("2024-02-01"),
        }];
        assert!(matches!(
            profit_lines(&purchases, &sales, &ProfitFilter::All),
            Err(Error::Overflow)
        ));

        let line = |profit| ProfitLine {
            product: "caviar".into(),
            date: date("2024-01-10"),
            profit,
        };
        let lines = [line(price.try_mul(3).unwrap()), line(price.try_mul(3).unwrap())];
        assert!(matches!(total_profit(&lines), Err(Error::Overflow)));
        assert!(matches!(profit_by_product(&lines), Err(Error::Overflow)));
    }
}
