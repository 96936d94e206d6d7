use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::style::{BLUE, MAGENTA, RED};
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod plot;
mod prepare;
mod present;
mod session;
mod source;
mod wide;

use present::{Metric, NotReady};
use session::Session;
use source::{FileSource, HttpSource, SeriesSource};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "covidanalysis",
    about = "Summarize and chart the JHU CSSE COVID-19 time series for one country"
)]
struct Opt {
    #[structopt(long, default_value = "US", help = "Country/Region to analyze (exact match)")]
    region: String,
    #[structopt(
        long,
        parse(from_os_str),
        requires = "deaths",
        help = "Read confirmed cases from this CSV instead of downloading"
    )]
    confirmed: Option<PathBuf>,
    #[structopt(
        long,
        parse(from_os_str),
        requires = "confirmed",
        help = "Read deaths from this CSV instead of downloading"
    )]
    deaths: Option<PathBuf>,
    #[structopt(long, parse(from_os_str), default_value = ".", help = "Where charts are written")]
    outdir: PathBuf,
    #[structopt(long, parse(from_os_str), help = "Also write the prepared table as CSV")]
    export: Option<PathBuf>,
    #[structopt(long)]
    summary: bool,
    #[structopt(long)]
    total_cases: bool,
    #[structopt(long)]
    new_cases: bool,
    #[structopt(long)]
    heatmap: bool,
    #[structopt(long)]
    bar: bool,
    #[structopt(
        long = "series",
        help = "Extra line chart: total_cases, new_cases, total_deaths or new_deaths"
    )]
    series: Vec<Metric>,
}

impl Opt {
    fn all_reports(&self) -> bool {
        !(self.summary
            || self.total_cases
            || self.new_cases
            || self.heatmap
            || self.bar
            || !self.series.is_empty())
    }
}

fn show_summary(session: &Session) {
    match present::summarize(session) {
        Ok(summary) => println!("{}", summary),
        Err(e) => println!("{}", e),
    }
}

fn plot_series(session: &Session, outdir: &Path, metric: Metric) -> Result<()> {
    let points = match present::series_over_time(session, metric) {
        Ok(points) => points,
        Err(NotReady) => {
            println!("{}", NotReady);
            return Ok(());
        }
    };
    let region = session.table().map(|t| t.region.as_str()).unwrap_or_default();
    let (what, label, color) = match metric {
        Metric::TotalCases => ("Total COVID-19 Cases", "Total Cases", BLUE),
        Metric::NewCases => ("Daily New COVID-19 Cases", "New Cases", plot::ORANGE),
        Metric::TotalDeaths => ("Total COVID-19 Deaths", "Total Deaths", RED),
        Metric::NewDeaths => ("Daily New COVID-19 Deaths", "New Deaths", MAGENTA),
    };
    plot::line_chart(
        &outdir.join(format!("{}.png", metric.name())),
        &format!("{} in {} (JHU Data)", what, region),
        label,
        label,
        color,
        &points,
    )
}

fn plot_correlation(session: &Session, outdir: &Path) -> Result<()> {
    match present::correlation_matrix(session) {
        Ok(matrix) => plot::heatmap(&outdir.join("correlation.png"), &matrix),
        Err(e) => {
            println!("{}", e);
            Ok(())
        }
    }
}

fn plot_bar(session: &Session, outdir: &Path) -> Result<()> {
    match present::totals_bar(session) {
        Ok(bars) => {
            let region = session.table().map(|t| t.region.as_str()).unwrap_or_default();
            plot::totals_bar(&outdir.join("totals.png"), region, &bars)
        }
        Err(e) => {
            println!("{}", e);
            Ok(())
        }
    }
}

fn export(session: &Session, path: &Path) -> Result<()> {
    match session.table() {
        Some(table) => {
            table.write_csv(std::fs::File::create(path)?)?;
            info!("exported {} rows to {}", table.len(), path.display());
        }
        None => println!("{}", NotReady),
    }
    Ok(())
}

fn run(opt: &Opt) -> Result<()> {
    let source: Box<dyn SeriesSource> = match (&opt.confirmed, &opt.deaths) {
        (Some(confirmed), Some(deaths)) => Box::new(FileSource {
            confirmed: confirmed.clone(),
            deaths: deaths.clone(),
        }),
        _ => Box::new(HttpSource::new()?),
    };

    let mut session = Session::new();
    match session.load(source.as_ref(), &opt.region) {
        Ok(table) => println!("Data loaded and analyzed successfully ({} days).", table.len()),
        Err(e) => anyhow::bail!("Failed to load data:\n{}", e),
    }

    let all = opt.all_reports();
    if all || opt.summary {
        show_summary(&session);
    }
    std::fs::create_dir_all(&opt.outdir)?;
    if all || opt.total_cases {
        plot_series(&session, &opt.outdir, Metric::TotalCases)?;
    }
    if all || opt.new_cases {
        plot_series(&session, &opt.outdir, Metric::NewCases)?;
    }
    if all || opt.heatmap {
        plot_correlation(&session, &opt.outdir)?;
    }
    if all || opt.bar {
        plot_bar(&session, &opt.outdir)?;
    }
    for metric in &opt.series {
        plot_series(&session, &opt.outdir, *metric)?;
    }
    if let Some(path) = &opt.export {
        export(&session, path)?;
    }
    Ok(())
}

fn main() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let opt = Opt::from_args();
    info!("analyzing {}", opt.region);
    if let Err(e) = run(&opt) {
        println!("{}", e);
        std::process::exit(1);
    }
}
