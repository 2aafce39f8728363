use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use snappy_grid_lib::config::{self, Settings};
use snappy_grid_lib::date::{self, ApiRangeOptions};
use snappy_grid_lib::error::{Error, Result};
use snappy_grid_lib::export::{self, Column, ColumnFormat, CsvOptions, ExcelOptions};
use snappy_grid_lib::file::{load_records, write_export};
use snappy_grid_lib::pagination::compute_window;
use snappy_grid_lib::search::search_page;
use snappy_grid_lib::types::{Operator, Strategy};

#[derive(Parser)]
#[command(name = "snappy-grid")]
#[command(about = "Page windows, record search and tabular export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the page buttons to show for a result set
    Window {
        /// Total number of items
        total: usize,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        #[arg(long, value_name = "N")]
        per_page: Option<usize>,
        #[arg(long, value_name = "N")]
        max_visible: Option<usize>,
    },
    /// Filter a JSON array of records and print one page of results
    Search {
        /// JSON file holding an array of records
        file: PathBuf,
        /// Search term (empty keeps every record)
        #[arg(default_value = "")]
        term: String,
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Restrict the search to these dotted paths
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,
        #[arg(long, value_enum)]
        operator: Option<OperatorArg>,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long)]
        exact: bool,
        /// Require every field to match
        #[arg(long)]
        match_all: bool,
        /// Minimum similarity for fuzzy search
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        #[arg(long, value_name = "N")]
        per_page: Option<usize>,
    },
    /// Write records as CSV or Excel XML
    Export {
        /// JSON file holding an array of records
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Columns as KEY or KEY=FORMAT; detected from the first record when omitted
        #[arg(short, long = "column", value_name = "KEY[=FORMAT]")]
        columns: Vec<String>,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        no_header: bool,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        timestamp: bool,
        #[arg(long)]
        date_format: Option<String>,
        /// Skip the UTF-8 byte order mark
        #[arg(long)]
        no_bom: bool,
    },
    /// Turn a date range string into request parameters
    Dates {
        /// e.g. "01/12/2024 - 31/12/2024"; omit with --presets
        range: Option<String>,
        #[arg(long, default_value = date::DEFAULT_RANGE_SEPARATOR)]
        separator: String,
        /// Input layout, e.g. MM/DD/YYYY
        #[arg(long)]
        input_format: Option<String>,
        #[arg(long)]
        with_time: bool,
        /// Print the preset ranges instead
        #[arg(long)]
        presets: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Substring,
    MultiTerm,
    Fuzzy,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Substring => Strategy::Substring,
            StrategyArg::MultiTerm => Strategy::MultiTerm,
            StrategyArg::Fuzzy => Strategy::Fuzzy,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OperatorArg {
    And,
    Or,
}

impl From<OperatorArg> for Operator {
    fn from(arg: OperatorArg) -> Self {
        match arg {
            OperatorArg::And => Operator::And,
            OperatorArg::Or => Operator::Or,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Excel,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| Error::json("output", e))?;
    println!("{text}");
    Ok(())
}

fn parse_column(spec: &str) -> Result<Column> {
    let (key, format) = match spec.split_once('=') {
        Some((key, format)) => (key, Some(format.parse::<ColumnFormat>()?)),
        None => (spec, None),
    };
    if key.is_empty() {
        return Err(Error::InvalidArgument {
            reason: format!("empty column key in `{spec}`"),
        });
    }
    let last = key.rsplit('.').next().unwrap_or(key);
    let mut column = Column::new(key).with_header(export::format_header(last));
    column.format = format;
    Ok(column)
}

fn run(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Window {
            total,
            page,
            per_page,
            max_visible,
        } => {
            let pages = compute_window(
                total,
                per_page.unwrap_or(settings.items_per_page),
                page,
                max_visible.unwrap_or(settings.max_visible_pages),
            );
            print_json(&pages)
        }
        Commands::Search {
            file,
            term,
            strategy,
            fields,
            operator,
            case_sensitive,
            exact,
            match_all,
            threshold,
            page,
            per_page,
        } => {
            let records = load_records(&file)?;
            let mut options = settings.search.clone();
            if let Some(strategy) = strategy {
                options.strategy = strategy.into();
            }
            if let Some(operator) = operator {
                options.operator = operator.into();
            }
            if !fields.is_empty() {
                options.fields = Some(fields);
            }
            options.case_sensitive |= case_sensitive;
            options.exact_match |= exact;
            options.match_all |= match_all;
            if let Some(threshold) = threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(Error::InvalidArgument {
                        reason: format!("threshold {threshold} is outside 0..=1"),
                    });
                }
                options.threshold = threshold;
            }

            let mut paging = settings.pagination_options(0);
            paging.current_page = page;
            if let Some(per_page) = per_page {
                paging.items_per_page = per_page;
            }
            print_json(&search_page(&records, &term, &options, paging))
        }
        Commands::Export {
            file,
            output,
            format,
            columns,
            delimiter,
            no_header,
            sheet,
            title,
            timestamp,
            date_format,
            no_bom,
        } => {
            let records = load_records(&file)?;
            let columns = if columns.is_empty() {
                None
            } else {
                Some(
                    columns
                        .iter()
                        .map(|c| parse_column(c))
                        .collect::<Result<Vec<_>>>()?,
                )
            };
            let document = match format {
                ExportFormat::Csv => export::to_csv(
                    &records,
                    &CsvOptions {
                        columns,
                        delimiter: delimiter.unwrap_or(settings.export.delimiter),
                        include_header: settings.export.include_header && !no_header,
                        date_format: date_format.unwrap_or(settings.date_format),
                    },
                )?,
                ExportFormat::Excel => export::to_excel_xml(
                    &records,
                    &ExcelOptions {
                        sheet_name: sheet.unwrap_or(settings.export.sheet_name),
                        columns,
                        title,
                        include_timestamp: timestamp,
                        date_format: date_format
                            .unwrap_or_else(|| export::DEFAULT_EXCEL_DATE_FORMAT.into()),
                        ..ExcelOptions::default()
                    },
                )?,
            };
            write_export(&output, &document, !no_bom)?;
            eprintln!("exported {} records to {}", records.len(), output.display());
            Ok(())
        }
        Commands::Dates {
            range,
            separator,
            input_format,
            with_time,
            presets,
        } => {
            if presets {
                return print_json(&date::preset_ranges(&settings.date_format));
            }
            let range = range.ok_or_else(|| Error::InvalidArgument {
                reason: "a range or --presets is required".into(),
            })?;
            let parsed = date::parse_range(&range, &separator, input_format.as_deref());
            let (Some(start), Some(end)) = (parsed.start, parsed.end) else {
                return Err(Error::InvalidDate { input: range });
            };
            let options = ApiRangeOptions {
                format: settings.date_format,
                include_time: with_time,
                ..ApiRangeOptions::default()
            };
            print_json(&date::format_range_for_api(start, end, &options))
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let settings = config::load_settings_or_default();

    match run(cli.command, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
