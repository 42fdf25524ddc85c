use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use log::{debug, error, info};

use cycletrace::config::Config;
use cycletrace::decode::{DecodeError, EventReader};
use cycletrace::dot::{self, DotOptions};
use cycletrace::profile::Profile;
use cycletrace::progress::Progress;
use cycletrace::resolver::Addr2Line;

#[derive(Parser, Debug)]
#[command(name = "cycletrace")]
#[command(about = "Generate a weighted call graph from an instrumented trace")]
struct Args {
    /// Path to the instrumented program image (used by the resolver)
    program: PathBuf,

    /// Trace file to analyze
    #[arg(short = 't', long = "trace", value_name = "PATH")]
    trace: Option<PathBuf>,

    /// Path to the address-to-name tool (sh-elf-addr2line)
    #[arg(short = 'a', long = "addr2line", value_name = "PATH")]
    addr2line: Option<PathBuf>,

    /// Hide functions below this cumulative percent (0-100)
    #[arg(short = 'p', long = "percent", value_name = "FLOAT")]
    percent: Option<f64>,

    /// Verbose diagnostics
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    let filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(err) = run(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load();

    let trace_path = args
        .trace
        .unwrap_or_else(|| PathBuf::from(&config.trace.file));
    let resolver_path = args
        .addr2line
        .or_else(|| config.resolver.path.clone().map(PathBuf::from));
    let threshold = args
        .percent
        .unwrap_or(config.graph.percent_threshold)
        .clamp(0.0, 100.0);

    let file = File::open(&trace_path)
        .with_context(|| format!("can't open {}", trace_path.display()))?;
    let trace_len = file.metadata()?.len();

    let resolver = Addr2Line::new(resolver_path, args.program.clone());
    let mut profile = Profile::new(Box::new(resolver));
    let mut reader = EventReader::new(BufReader::new(file));
    let mut progress = Progress::new(trace_len);

    // Percentages are ratios, so the delta unit never matters here;
    // the canonical codec carries raw cycle counts.
    debug!("decoding {} ({trace_len} bytes)", trace_path.display());

    let mut framing_error: Option<DecodeError> = None;
    loop {
        match reader.next_event() {
            Ok(Some(event)) => {
                profile
                    .observe(event)
                    .with_context(|| format!("at trace byte {}", reader.bytes_read()))?;
                progress.update(reader.bytes_read());
            }
            Ok(None) => break,
            // Halt decoding but still emit everything accumulated.
            Err(err) => {
                framing_error = Some(err);
                break;
            }
        }
    }
    progress.finish();
    profile.finish();
    let report = profile.reduce();

    info!(
        "{} functions over {} cycles",
        profile.symbols().len(),
        report.total
    );

    let output_path = &config.graph.output;
    let out = File::create(output_path).with_context(|| format!("couldn't open {output_path}"))?;
    let mut out = BufWriter::new(out);
    dot::write_graph(
        &mut out,
        profile.symbols(),
        profile.matrix(),
        &report,
        &DotOptions {
            program_name: args.program.display().to_string(),
            percent_threshold: threshold,
        },
    )
    .and_then(|()| out.flush())
    .with_context(|| format!("couldn't write {output_path}"))?;

    if let Some(err) = framing_error {
        return Err(anyhow::Error::new(err)
            .context("trace ended mid-record; the graph reflects the decoded prefix"));
    }
    Ok(())
}
