use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;

use rusty_scholar::config::{load_filter_spec, LoadOptions, DEFAULT_DELIMITER};
use rusty_scholar::data::derive::AVERAGE_GRADE;
use rusty_scholar::data::insights::{
    column_correlation, column_quantile, group_means, key_metrics, strong_correlations, GroupMean,
    KeyMetrics, STRONG_CORRELATION,
};
use rusty_scholar::data::loader::load_file;
use rusty_scholar::data::normalize::normalized_box_stats;
use rusty_scholar::data::stats::{dataset_info, null_counts};
use rusty_scholar::{report, Constraint, Session, Value};

/// rusty-scholar - explore a student performance dataset
#[derive(Parser)]
#[command(name = "rusty-scholar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Column types, non-null and null counts
    Info(Common),
    /// Display the first N filtered rows
    Head {
        #[command(flatten)]
        common: Common,
        /// Number of rows to display
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,
    },
    /// Descriptive statistics of the numeric columns
    Describe(Common),
    /// Correlation matrix and strongly correlated pairs
    Correlation {
        #[command(flatten)]
        common: Common,
        /// Report pairs with |r| above this value
        #[arg(long, default_value_t = STRONG_CORRELATION)]
        threshold: f64,
    },
    /// Key metrics and per-school comparisons
    Overview(Common),
    /// Box statistics of min-max normalised numeric columns
    Boxplot(Common),
    /// Print the default filter spec as JSON
    Defaults {
        /// Path to dataset file
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_DELIMITER as char)]
        delimiter: char,
    },
}

/// Dataset path and sidebar filters shared by every subcommand.
#[derive(Args)]
struct Common {
    /// Path to dataset file (.csv, .json or .parquet)
    path: PathBuf,
    /// Field separator for CSV input
    #[arg(long, default_value_t = DEFAULT_DELIMITER as char)]
    delimiter: char,
    /// JSON filter spec applied before the per-column options below
    #[arg(long)]
    filters: Option<PathBuf>,
    /// Schools to keep (repeatable)
    #[arg(long)]
    school: Vec<String>,
    /// Sexes to keep (repeatable)
    #[arg(long)]
    sex: Vec<String>,
    /// Address types to keep (repeatable)
    #[arg(long)]
    address: Vec<String>,
    /// Age range, MIN..MAX
    #[arg(long, value_parser = parse_range)]
    age: Option<(f64, f64)>,
    /// Study time range, MIN..MAX
    #[arg(long, value_parser = parse_range)]
    studytime: Option<(f64, f64)>,
    /// Failures range, MIN..MAX
    #[arg(long, value_parser = parse_range)]
    failures: Option<(f64, f64)>,
    /// Absences range, MIN..MAX
    #[arg(long, value_parser = parse_range)]
    absences: Option<(f64, f64)>,
    /// Emit JSON instead of text tables
    #[arg(long)]
    json: bool,
}

fn parse_range(s: &str) -> std::result::Result<(f64, f64), String> {
    let (lo, hi) = s
        .split_once("..")
        .ok_or_else(|| format!("expected MIN..MAX, got '{s}'"))?;
    let lo = lo.trim().parse::<f64>().map_err(|e| format!("bad minimum '{lo}': {e}"))?;
    let hi = hi.trim().parse::<f64>().map_err(|e| format!("bad maximum '{hi}': {e}"))?;
    Ok((lo, hi))
}

fn load_options(delimiter: char) -> Result<LoadOptions> {
    let delimiter = u8::try_from(delimiter).context("delimiter must be a single-byte character")?;
    Ok(LoadOptions {
        delimiter,
        ..LoadOptions::default()
    })
}

impl Common {
    /// Load the dataset and apply filter file and command-line overrides.
    fn session(&self) -> Result<Session> {
        let dataset = load_file(&self.path, &load_options(self.delimiter)?)?;
        let mut session = Session::new(dataset).context("preparing dataset")?;

        if let Some(path) = &self.filters {
            session
                .replace_filters(load_filter_spec(path)?)
                .context("applying filter file")?;
        }
        for (column, values) in [
            ("school", &self.school),
            ("sex", &self.sex),
            ("address", &self.address),
        ] {
            if !values.is_empty() {
                let constraint =
                    Constraint::categorical(values.iter().map(|v| Value::from(v.as_str())));
                session
                    .set_constraint(column, constraint)
                    .with_context(|| format!("filtering {column}"))?;
            }
        }
        for (column, range) in [
            ("age", self.age),
            ("studytime", self.studytime),
            ("failures", self.failures),
            ("absences", self.absences),
        ] {
            if let Some((min, max)) = range {
                session
                    .set_range(column, min, max)
                    .with_context(|| format!("filtering {column}"))?;
            }
        }

        info!(
            "{} out of {} records remain",
            session.visible_indices().len(),
            session.dataset().len()
        );
        Ok(session)
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", text());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Overview {
    metrics: KeyMetrics,
    by_school: Vec<GroupMean>,
    studytime_vs_grade: Option<f64>,
    absences_vs_grade: Option<f64>,
    absences_p75: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info(common) => {
            let session = common.session()?;
            let view = session.view();
            let info = dataset_info(&view);
            let nulls = null_counts(&view);
            common.emit(&(&info, &nulls), || report::info_table(&info, &nulls, view.len()))
        }
        Commands::Head { common, rows } => {
            let session = common.session()?;
            let view = session.view();
            let head = view.head(rows);
            common.emit(&head, || report::head_table(&view, rows))
        }
        Commands::Describe(common) => {
            let session = common.session()?;
            let summary = session.summary();
            common.emit(&summary.describe, || report::describe_table(&summary))
        }
        Commands::Correlation { common, threshold } => {
            let session = common.session()?;
            let matrix = session.summary().correlation;
            let pairs = strong_correlations(&matrix, threshold);
            common.emit(&(&matrix, &pairs), || {
                report::correlation_table(&matrix)
                    + "\n"
                    + &report::strong_pairs_table(&pairs, threshold)
            })
        }
        Commands::Overview(common) => {
            let session = common.session()?;
            let view = session.view();
            let overview = Overview {
                metrics: key_metrics(&view)?,
                by_school: group_means(&view, "school", AVERAGE_GRADE)?,
                studytime_vs_grade: column_correlation(&view, "studytime", AVERAGE_GRADE)?,
                absences_vs_grade: column_correlation(&view, "absences", AVERAGE_GRADE)?,
                absences_p75: column_quantile(&view, "absences", 0.75)?,
            };
            common.emit(&overview, || {
                let mut out = report::key_metrics_text(&overview.metrics);
                out += &report::group_means_text("Average grade by school:", &overview.by_school);
                out += &format!(
                    "Study time vs. average grade: r = {}\n",
                    fmt_opt(overview.studytime_vs_grade, 3)
                );
                out += &format!(
                    "Absences vs. average grade: r = {} (75th percentile of absences: {})\n",
                    fmt_opt(overview.absences_vs_grade, 3),
                    fmt_opt(overview.absences_p75, 0),
                );
                out
            })
        }
        Commands::Boxplot(common) => {
            let session = common.session()?;
            let stats = normalized_box_stats(&session.view());
            common.emit(&stats, || report::box_table(&stats))
        }
        Commands::Defaults { path, delimiter } => {
            let dataset = load_file(&path, &load_options(delimiter)?)?;
            let session = Session::new(dataset).context("preparing dataset")?;
            println!("{}", serde_json::to_string_pretty(session.filters())?);
            Ok(())
        }
    }
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.precision$}"))
}
