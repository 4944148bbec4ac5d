use std::path::PathBuf;

use clap::Parser;
use gif_scroll::reddit::SortOption;
use gif_scroll::settings::sort_option_from_key;

#[derive(Parser)]
#[command(
    name = "gif-scroll",
    version,
    about = "gif-scroll - Infinite gif feeds from Reddit listings."
)]
struct Cli {
    /// Subreddit to read (default from config, "gifs")
    #[arg(short, long)]
    term: Option<String>,
    /// hot, new, top, best or rising
    #[arg(short, long, value_parser = sort_option_from_key)]
    sort: Option<SortOption>,
    /// Gifs per page
    #[arg(short = 'n', long)]
    per_page: Option<usize>,
    /// Pages to fetch
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
    /// Config file (default ~/.config/gif-scroll/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl From<Cli> for gif_scroll::app::Options {
    fn from(cli: Cli) -> Self {
        Self {
            config_file: cli.config,
            term: cli.term,
            sort: cli.sort,
            per_page: cli.per_page,
            pages: cli.pages,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    gif_scroll::app::init_logging();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = gif_scroll::run(cli.into(), &mut out) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
