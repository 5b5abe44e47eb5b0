use crate::cluster::Params;
use crate::utils::Result;
use chrono::Datelike;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| env!("CARGO_PKG_VERSION").to_string());

#[derive(Parser)]
#[command(name="svnet",
          version=&**FULL_VERSION,
          long_about = None,
          disable_help_subcommand = true,
          after_help = format!("Copyright (C) 2022-{}     svnet developers
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Structural Variant Signal Clustering")]
    Call(CallArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("call")))]
#[command(arg_required_else_help(true))]
pub struct CallArgs {
    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "bam")]
    #[clap(help = "Coordinate-sorted BAM file with aligned reads")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub bam_path: PathBuf,

    #[clap(short = 'o')]
    #[clap(long = "out")]
    #[clap(help = "Output TSV of candidate components (default: stdout)")]
    #[clap(value_name = "OUT")]
    pub out_path: Option<PathBuf>,

    #[clap(long = "regions")]
    #[clap(help = "BED file restricting the scan to the given regions")]
    #[clap(value_name = "REGIONS")]
    #[arg(value_parser = check_file_exists)]
    pub regions_path: Option<PathBuf>,

    #[clap(long = "sites")]
    #[clap(help = "TSV of prior sites to inject into the graph")]
    #[clap(value_name = "SITES")]
    #[arg(value_parser = check_file_exists)]
    pub sites_path: Option<PathBuf>,

    #[clap(long = "max-cov")]
    #[clap(value_name = "MAX_COV")]
    #[clap(help = "Depth cap per 100-bp bin; over-covered bins are skipped")]
    #[clap(default_value = "200")]
    pub max_cov: f32,

    #[clap(long = "min-support")]
    #[clap(value_name = "MIN_SUPPORT")]
    #[clap(help = "Minimum read support per candidate")]
    #[clap(default_value = "3")]
    pub min_support: usize,

    #[clap(long = "min-size")]
    #[clap(value_name = "MIN_SIZE")]
    #[clap(help = "Minimum SV size reported from within-read events")]
    #[clap(default_value = "30")]
    pub min_sv_size: i64,

    #[clap(long = "clip-length")]
    #[clap(value_name = "CLIP_LENGTH")]
    #[clap(help = "Minimum soft-clip length counted as SV signal")]
    #[clap(default_value = "30")]
    pub clip_length: i64,

    #[clap(long = "mapq")]
    #[clap(value_name = "MAPQ")]
    #[clap(help = "Minimum mapping quality for positional clustering")]
    #[clap(default_value = "1")]
    pub mapq_thresh: u8,

    #[clap(long = "buffer-size")]
    #[clap(value_name = "BUFFER_SIZE")]
    #[clap(help = "Read-buffer cap when the input lacks random access")]
    #[clap(default_value = "100000")]
    pub buffer_size: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "single")]
    #[clap(help = "Treat the library as single-end")]
    pub single_end: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "mm-only")]
    #[clap(help = "Cluster clipped reads through minimizers only")]
    pub mm_only: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "no-trust-ins-len")]
    #[clap(help = "Do not compare insertion lengths strictly when pairing events")]
    pub no_trust_ins_len: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "spd")]
    #[clap(value_name = "SPD")]
    #[clap(help = "Acceptance threshold of the span-position distance")]
    #[clap(default_value = "0.3")]
    #[arg(value_parser = ensure_unit_float)]
    pub spd_thresh: f32,
}

impl CallArgs {
    pub fn to_params(&self) -> Params {
        let mut params = Params {
            max_cov: self.max_cov,
            buffer_size: self.buffer_size,
            clip_length: self.clip_length,
            min_sv_size: self.min_sv_size,
            mapq_thresh: self.mapq_thresh,
            paired_end: !self.single_end,
            mm_only: self.mm_only,
            trust_ins_len: !self.no_trust_ins_len,
            spd_thresh: self.spd_thresh,
            min_support: self.min_support,
            ..Params::default()
        };
        params.derive_distances();
        params
    }
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn ensure_unit_float(s: &str) -> Result<f32> {
    let value = s
        .parse::<f32>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}
