use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use stockroom::{
    clock::{parse_date, DATE_FORMAT},
    finance::{self, DateRange, ProfitFilter},
    report::{self, BarChart, ExportFormat, Table},
    Clock, ClockFile, Money, NewPurchase, NewSale, Store, Supermarket,
};

const PERIODS: [&str; 5] = ["day", "month", "year", "all", "product"];

/// Track supermarket stock, revenue and profit in CSV files.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Directory holding the purchase, sale, inventory and time shift files
    #[arg(long, global = true, env = "STOCKROOM_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register the purchase of a product
    Buy {
        /// Product name
        product: String,
        /// Number of items bought
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,
        /// Price per item
        price: Money,
        /// Date of purchase (YYYY-MM-DD), today if omitted
        date: Option<String>,
        /// Expiration date of the lot (YYYY-MM-DD)
        #[arg(long, visible_alias = "expiration_date")]
        expiration_date: String,
    },
    /// Register the sale of a product
    Sell {
        /// Product name
        product: String,
        /// Number of items sold
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,
        /// Price per item
        price: Money,
        /// Date of sale (YYYY-MM-DD), today if omitted
        date: Option<String>,
    },
    /// Show purchases, sales or the current inventory
    Report {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// Export purchases, sales or the current inventory to a spreadsheet or delimited file
    Export {
        #[arg(value_enum)]
        kind: Kind,
        #[command(flatten)]
        target: Target,
    },
    /// Move the date treated as today by DAYS (negative to go back), or "now" to reset it
    AdvanceTime {
        #[arg(allow_hyphen_values = true)]
        days: String,
    },
    /// Show total revenue between two dates, inclusive
    ReportRevenue {
        /// Start date (YYYY-MM-DD)
        start_date: String,
        /// End date (YYYY-MM-DD)
        end_date: String,
        /// Also draw revenue per day
        #[arg(long)]
        chart: bool,
    },
    /// Export total revenue between two dates to a spreadsheet or delimited file
    ExportRevenue {
        /// Start date (YYYY-MM-DD)
        start_date: String,
        /// End date (YYYY-MM-DD)
        end_date: String,
        #[command(flatten)]
        target: Target,
    },
    /// Show the profit made on each sale
    ReportProfit {
        #[arg(value_parser = PERIODS)]
        period: String,
        /// YYYY-MM-DD for a day, YYYY-MM for a month, YYYY for a year, or a product name
        value: Option<String>,
        /// Also draw profit per product
        #[arg(long)]
        chart: bool,
    },
    /// Export the profit made on each sale to a spreadsheet or delimited file
    ExportProfit {
        #[arg(value_parser = PERIODS)]
        period: String,
        /// YYYY-MM-DD for a day, YYYY-MM for a month, YYYY for a year, or a product name
        value: Option<String>,
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum Kind {
    #[value(alias = "bought")]
    Purchases,
    #[value(alias = "sold")]
    Sales,
    Inventory,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Purchases => "bought",
            Kind::Sales => "sold",
            Kind::Inventory => "inventory",
        }
    }
}

#[derive(Debug, clap::Args)]
struct Target {
    /// Export format: xlsx, csv or tsv
    #[arg(long, short, default_value_t)]
    format: ExportFormat,
    /// Path to the output file [default: <kind>_data.<format> in the data directory]
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Target {
    /// An explicit output path is used as given; the default lands next to
    /// the logs it was exported from.
    fn path(&self, data_dir: &Path, name: &str) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            data_dir.join(format!("{name}_data.{}", self.format.extension()))
        })
    }
}

/// Prints command output, noting the virtual date whenever it isn't the real one.
#[derive(Clone, Copy, Debug)]
struct Console {
    clock: Clock,
}

impl Console {
    fn annotate(&self, message: &str) -> String {
        let message = message.trim_end();
        if self.clock.is_shifted() {
            format!(
                "{message} (Date context: {})",
                self.clock.today().format(DATE_FORMAT)
            )
        } else {
            message.to_string()
        }
    }

    fn say(&self, message: &str) {
        println!("{}", self.annotate(message));
    }

    fn fail(&self, message: &str) {
        eprintln!("{}", self.annotate(message));
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let clock = match ClockFile::in_dir(&cli.data_dir).load() {
        Ok(clock) => clock,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    match run(cli.command, &cli.data_dir, clock) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Console { clock }.fail(&format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn date_or_today(date: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    Ok(date.map(parse_date).transpose()?.unwrap_or(today))
}

#[allow(clippy::too_many_lines)]
fn run(command: Command, data_dir: &Path, clock: Clock) -> Result<()> {
    let console = Console { clock };
    let shop = Supermarket::new(Store::open(data_dir), clock.today());
    let today = shop.today();
    match command {
        Command::Buy {
            product,
            quantity,
            price,
            date,
            expiration_date,
        } => {
            let record = shop.buy(NewPurchase {
                product,
                quantity,
                unit_price: price,
                purchase_date: date_or_today(date.as_deref(), today)?,
                expiration_date: parse_date(&expiration_date)?,
            })?;
            console.say(&format!(
                "Registered purchase {}: {} x {} at {} on {}, expiring {}",
                record.id,
                record.quantity,
                record.product,
                record.unit_price,
                record.purchase_date,
                record.expiration_date,
            ));
        }
        Command::Sell {
            product,
            quantity,
            price,
            date,
        } => {
            let record = shop.sell(NewSale {
                product,
                quantity,
                unit_price: price,
                sale_date: date_or_today(date.as_deref(), today)?,
            })?;
            console.say(&format!(
                "Registered sale {}: {} x {} at {} on {}",
                record.id, record.quantity, record.product, record.unit_price, record.sale_date,
            ));
        }
        Command::Report { kind } => {
            let table = match kind {
                Kind::Purchases => Table::from_rows(&shop.purchases()?),
                Kind::Sales => Table::from_rows(&shop.sales()?),
                Kind::Inventory => Table::from_rows(&shop.reconstruct()?),
            };
            console.say(&table.to_string());
        }
        Command::Export { kind, target } => {
            let path = target.path(data_dir, kind.name());
            match kind {
                Kind::Purchases => report::export(&path, &shop.purchases()?, target.format)?,
                Kind::Sales => report::export(&path, &shop.sales()?, target.format)?,
                Kind::Inventory => report::export(&path, &shop.reconstruct()?, target.format)?,
            }
            console.say(&format!("Exported {} to {}", kind.name(), path.display()));
        }
        Command::AdvanceTime { days } => {
            let mut clock = clock;
            if days.trim().eq_ignore_ascii_case("now") {
                clock.reset();
            } else {
                let delta: i64 = days.trim().parse().with_context(|| {
                    format!("invalid number of days {days:?} (expected a whole number or \"now\")")
                })?;
                clock.advance(delta);
            }
            ClockFile::in_dir(data_dir).save(&clock)?;
            Console { clock }.say(&format!(
                "Current date set to: {}",
                clock.today().format(DATE_FORMAT)
            ));
        }
        Command::ReportRevenue {
            start_date,
            end_date,
            chart,
        } => {
            let range = DateRange::parse(&start_date, &end_date)?;
            let summary = shop.revenue(range)?;
            console.say(&Table::from_rows(&[summary]).to_string());
            if chart {
                let days = shop.daily_revenue(range)?;
                let title = format!("Revenue from {} to {}", range.start, range.end);
                console.say(&BarChart::daily_revenue(title, &days).to_string());
            }
        }
        Command::ExportRevenue {
            start_date,
            end_date,
            target,
        } => {
            let range = DateRange::parse(&start_date, &end_date)?;
            let summary = shop.revenue(range)?;
            let path = target.path(data_dir, "revenue");
            report::export(&path, &[summary], target.format)?;
            console.say(&format!("Exported revenue to {}", path.display()));
        }
        Command::ReportProfit {
            period,
            value,
            chart,
        } => {
            let filter = ProfitFilter::parse(&period, value.as_deref())?;
            let lines = shop.profit(&filter)?;
            let total = finance::total_profit(&lines)?;
            let table = Table::from_rows(&lines).with_footer(vec![
                "Total".to_string(),
                String::new(),
                total.to_string(),
            ]);
            console.say(&table.to_string());
            if chart {
                let bars = finance::profit_by_product(&lines)?;
                console.say(&BarChart::new("Profit per product", bars).to_string());
            }
        }
        Command::ExportProfit {
            period,
            value,
            target,
        } => {
            let filter = ProfitFilter::parse(&period, value.as_deref())?;
            let lines = shop.profit(&filter)?;
            let path = target.path(data_dir, "profit");
            report::export(&path, &lines, target.format)?;
            console.say(&format!("Exported profit to {}", path.display()));
        }
    }
    Ok(())
}
