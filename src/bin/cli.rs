use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::{LevelFilter, error, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tubedl::assembler::{StreamBundle, StreamOption};
use tubedl::download::download_option;
use tubedl::error::{Error, Result};
use tubedl::{Config, HttpFetcher, Resolver, player};

/// Exit status when the video itself could not be resolved, as opposed to a local failure.
const RESOLUTION_FAILURE: u8 = 2;

const PROGRESS_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";

#[derive(Parser, Clone)]
pub struct Cli {
    /// Watch URL, short link or bare video id.
    pub url: String,

    #[arg(long = "output-dir", short)]
    pub output_dir: Option<String>,

    /// Quality to download, e.g. 720p, 1080p60-webm or 160k.
    #[arg(long = "quality", short)]
    pub quality: Option<String>,

    /// Only list the available options.
    #[arg(long = "list", short, action = clap::ArgAction::SetTrue)]
    pub list: bool,

    #[arg(
        long = "verbosity",
        short,
        default_value = "info",
        value_parser = clap::builder::PossibleValuesParser::new([
            "info", "debug", "error", "none", "full"
        ])
    )]
    pub verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let multi = MultiProgress::new();
    init_logging(&args.verbosity, multi.clone());

    match run(args, &multi).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_resolution_error() => {
            error!("{}", describe(&e));
            ExitCode::from(RESOLUTION_FAILURE)
        }
        Err(e) => {
            error!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: &str, multi: MultiProgress) {
    let level = match verbosity {
        "none" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "debug" => LevelFilter::Debug,
        "full" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::new();
    if verbosity == "full" {
        builder.filter_level(level);
    } else {
        builder
            .filter_level(level.min(LevelFilter::Warn))
            .filter_module("tubedl", level);
    }
    let logger = builder.parse_default_env().build();
    let max_level = logger.filter();

    if LogWrapper::new(multi, logger).try_init().is_ok() {
        log::set_max_level(max_level);
    }
}

async fn run(args: Cli, multi: &MultiProgress) -> Result<()> {
    let mut config = Config::load_or_default();
    if let Some(dir) = args.output_dir {
        config.output_dir = PathBuf::from(dir);
    }

    let resolver = Resolver::new(HttpFetcher::new(&config)?);
    let bundle = match config.timeout() {
        Some(timeout) => tokio::time::timeout(timeout, resolver.resolve(&args.url))
            .await
            .map_err(|_| Error::FetchFailed(format!("no answer after {:?}", timeout)))??,
        None => resolver.resolve(&args.url).await?,
    };

    print_options(&bundle);
    if args.list {
        return Ok(());
    }

    let option = match args.quality {
        Some(quality) => bundle
            .find(&quality)
            .ok_or(Error::OptionNotFound(quality))?,
        None => choose_option(&bundle)?,
    };

    if option.needs_descrambling() {
        inspect_player(resolver.fetcher(), &bundle).await;
    }

    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let mut bars: HashMap<PathBuf, ProgressBar> = HashMap::new();

    let paths = download_option(
        resolver.fetcher(),
        &bundle,
        option,
        &config.output_dir,
        |path, written, total| {
            let bar = bars.entry(path.to_path_buf()).or_insert_with(|| {
                let bar = match total {
                    Some(total) => ProgressBar::new(total),
                    None => ProgressBar::no_length(),
                };
                let bar = multi.add(bar);
                bar.set_style(style.clone());
                if let Some(name) = path.file_name() {
                    bar.set_message(name.to_string_lossy().into_owned());
                }
                bar
            });
            bar.set_position(written);
        },
    )
    .await?;

    for bar in bars.values() {
        bar.finish();
    }
    for path in paths {
        info!("Saved {}", path.display());
    }
    Ok(())
}

fn print_options(bundle: &StreamBundle) {
    println!("{}", bundle.title);
    for (index, option) in bundle.options.iter().enumerate() {
        println!("{:>3}) {}  -> {}", index + 1, option, bundle.filename(option));
    }
}

/// Asks on stdin until the user names an option by number, key or label.
fn choose_option(bundle: &StreamBundle) -> Result<&StreamOption> {
    let mut input = String::new();
    loop {
        print!("Choose a quality: ");
        std::io::stdout().flush()?;
        input.clear();
        if std::io::stdin().read_line(&mut input)? == 0 {
            return Err(Error::OptionNotFound("nothing selected".to_string()));
        }

        let selection = input.trim();
        let by_index = selection
            .parse::<usize>()
            .ok()
            .and_then(|number| number.checked_sub(1))
            .and_then(|index| bundle.options.get(index));
        if let Some(option) = by_index.or_else(|| bundle.find(selection)) {
            return Ok(option);
        }
        println!("Unknown option '{}'. Pick one of: {}", selection, bundle.labels().join(", "));
    }
}

async fn inspect_player(fetcher: &HttpFetcher, bundle: &StreamBundle) {
    let Some(script_url) = &bundle.player_script else {
        warn!("The page does not reference a player script");
        return;
    };

    match fetcher.fetch_text(script_url).await {
        Ok(script) => match player::find_decipher_function(&script) {
            Some(name) => warn!("Signatures are decoded by function '{}' in {}", name, script_url),
            None => warn!("No signature function found in {}", script_url),
        },
        Err(e) => warn!("Could not fetch the player script: {}", e),
    }
}

fn describe(e: &Error) -> String {
    match e {
        Error::InvalidReference(input) => {
            format!("'{}' is neither a YouTube link nor a video id.", input)
        }
        Error::FetchFailed(reason) => format!(
            "Could not load the video page ({}). Check your connection and try again.",
            reason
        ),
        Error::ManifestNotFound(reason) => format!(
            "The video page has no player data ({}). YouTube may have changed its layout.",
            reason
        ),
        Error::NoResolvableFormats(id) => {
            format!("Video {} has no downloadable formats.", id)
        }
        Error::DescramblingRequired { .. } => format!(
            "{}. This stream cannot be downloaded until its signature is descrambled.",
            e
        ),
        other => other.to_string(),
    }
}
