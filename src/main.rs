use std::sync::Arc;

use clap::{
    ArgAction, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use log::LevelFilter;

use partymix::{cli, config, error, types::PkceToken, types::SearchFilters};
use tokio::sync::Mutex;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// More diagnostic output (-v debug, -vv trace)
    #[clap(short, long, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[clap(short, long, global = true)]
    quiet: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth,

    /// Search the catalog for tracks
    Search(SearchOptions),

    /// Manage the working playlist
    Playlist(PlaylistOptions),

    /// Play tracks on a Spotify Connect device
    Play(PlayOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Free text query
    pub query: String,

    /// Only tracks by this artist
    #[clap(long)]
    pub artist: Option<String>,

    /// Only tracks of this genre
    #[clap(long)]
    pub genre: Option<String>,

    /// First year of the release year range (needs --year-end)
    #[clap(long, requires = "year_end")]
    pub year_start: Option<String>,

    /// Last year of the release year range (needs --year-start)
    #[clap(long, requires = "year_start")]
    pub year_end: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistOptions {
    #[command(subcommand)]
    pub command: PlaylistSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlaylistSubcommand {
    /// Add rows of the last search result
    Add {
        #[clap(required = true, num_args = 1..)]
        rows: Vec<usize>,
    },

    /// Remove a row from the playlist
    Remove { row: usize },

    /// Show the playlist
    Show,

    /// Remove all tracks
    Clear,

    /// Save the playlist to your Spotify account
    Save {
        #[clap(long)]
        name: String,

        /// Create a private playlist
        #[clap(long)]
        private: bool,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct PlayOptions {
    /// Row to start with (last search result, then playlist)
    pub row: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_logger(cli: &Cli) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );

    if cli.quiet || cli.verbose > 0 {
        let level = match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Only this crate; dependencies stay at the default.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(&cli);

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    match cli.command {
        Command::Auth => {
            let oauth_result: Arc<Mutex<Option<PkceToken>>> = Arc::new(Mutex::new(None));
            cli::auth(Arc::clone(&oauth_result)).await;
        }
        Command::Search(opt) => {
            let filters = SearchFilters {
                artist: opt.artist,
                genre: opt.genre,
                year_start: opt.year_start,
                year_end: opt.year_end,
            };
            cli::search(opt.query, filters).await
        }
        Command::Playlist(opt) => match opt.command {
            PlaylistSubcommand::Add { rows } => cli::playlist_add(rows).await,
            PlaylistSubcommand::Remove { row } => cli::playlist_remove(row).await,
            PlaylistSubcommand::Show => cli::playlist_show().await,
            PlaylistSubcommand::Clear => cli::playlist_clear().await,
            PlaylistSubcommand::Save { name, private } => cli::playlist_save(name, !private).await,
        },
        Command::Play(opt) => cli::play(opt.row).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
