#[macro_use]
extern crate log;

use std::path::Path;

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use serde::Serialize;
use structopt::StructOpt;

use gtfs::{FeedFilter, TripID, GTFS};
use segments::route_stats::route_stats;
use segments::stats::{SpacingSummary, DEFAULT_SPACING_THRESHOLD};
use segments::{export, Config, Diagnostics, SegmentPipeline};

#[derive(StructOpt)]
#[structopt(
    name = "gtfs_segments",
    about = "Cuts the bus routes of a GTFS feed into segments between stops"
)]
struct Args {
    /// The path to a GTFS zip file or directory
    feed: String,
    /// Write the segment tables, route statistics, and a summary here
    #[structopt(long, default_value = "output")]
    output: String,
    /// Drop segments longer than this many meters
    #[structopt(long)]
    max_spacing: Option<f64>,
    /// Snap trips on one thread
    #[structopt(long)]
    sequential: bool,
    /// Use shapes as they are, without adding points
    #[structopt(long)]
    no_densify: bool,
    /// Drop segments used by fewer trips than this
    #[structopt(long)]
    min_traversals: Option<usize>,
    /// Keep all routes, not just buses
    #[structopt(long)]
    all_routes: bool,
    /// Keep trips from every day, instead of only the busiest one
    #[structopt(long)]
    all_days: bool,
    /// Only keep routes of this agency
    #[structopt(long)]
    agency: Option<String>,
    /// A JSON file with pipeline settings. Flags override it.
    #[structopt(long)]
    config: Option<String>,
}

impl Args {
    fn pipeline_config(&self) -> Result<Config> {
        let mut config = match self.config {
            Some(ref path) => Config::load(path)?,
            None => Config::default(),
        };
        if self.max_spacing.is_some() {
            config.max_spacing = self.max_spacing;
        }
        if self.sequential {
            config.parallel = false;
        }
        if self.no_densify {
            config.densify_spacing = None;
        }
        if let Some(n) = self.min_traversals {
            config.min_traversals = n;
        }
        config.validate()?;
        Ok(config)
    }

    fn feed_filter(&self) -> FeedFilter {
        FeedFilter {
            bus_only: !self.all_routes,
            busiest_day: !self.all_days,
            agency_id: self.agency.clone(),
            ..FeedFilter::default()
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    feed: &'a str,
    busiest_date: Option<String>,
    malformed_trips: &'a [TripID],
    num_segments: usize,
    spacing: Option<SpacingSummary>,
    diagnostics: &'a Diagnostics,
}

fn main() {
    abstutil::logger::setup();

    let args = Args::from_iter(abstutil::cli_args());
    if let Err(err) = run(&args) {
        error!("{}: {err:#}", args.feed);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.pipeline_config()?;
    let mut timer = Timer::new("gtfs_segments");
    let gtfs = GTFS::load(&args.feed, &args.feed_filter(), &mut timer)?;
    let output = SegmentPipeline::new(config.clone())?.run(&gtfs, &mut timer)?;

    let dir = Path::new(&args.output);
    fs_err::create_dir_all(dir)?;
    export::write_csv(
        &output.segments,
        fs_err::File::create(dir.join("segments.csv"))?,
        true,
    )?;
    export::write_csv(
        &output.segments,
        fs_err::File::create(dir.join("spacings.csv"))?,
        false,
    )?;
    export::write_geojson(
        &output.segments,
        fs_err::File::create(dir.join("segments.geojson"))?,
    )?;

    timer.start("route stats");
    let routes = route_stats(&gtfs);
    timer.stop("route stats");
    export::write_route_stats(&routes, fs_err::File::create(dir.join("route_stats.csv"))?)?;

    let threshold = config.max_spacing.unwrap_or(DEFAULT_SPACING_THRESHOLD);
    let summary = Summary {
        feed: &args.feed,
        busiest_date: gtfs.busiest_date.map(|d| d.to_string()),
        malformed_trips: &gtfs.malformed_trips,
        num_segments: output.segments.len(),
        spacing: SpacingSummary::new(&output.segments, threshold),
        diagnostics: &output.diagnostics,
    };
    fs_err::write(
        dir.join("summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;

    info!(
        "Wrote {} segments to {}",
        prettyprint_usize(output.segments.len()),
        dir.display()
    );
    if let Some(spacing) = summary.spacing {
        info!(
            "Mean stop spacing {:.0}m, or {:.0}m weighted by traversals",
            spacing.stop_weighted_mean, spacing.traversal_weighted_mean
        );
    }
    Ok(())
}
