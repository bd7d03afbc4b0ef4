mod app;
mod commands;
mod tui;
mod ui;

use std::io::{self, stdout};
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dusql_core::{HumanPredicate, QueryConfig, QueryEngine, SqliteStore};
use ratatui::{Terminal, backend::CrosstermBackend, style::Style, widgets::Widget};
use tracing_subscriber::EnvFilter;

use app::{Action, AppMode, AppState, SortKey};
use tui::{AppEvent, EventHandler, handle_key};
use ui::{AppLayout, Footer, Header, HelpView, ListView, Theme};

/// dusql - filesystem inventory with find and du queries
#[derive(Parser, Debug)]
#[command(name = "dusql")]
#[command(about = "Crawl filesystems into an inventory and answer find/du queries from it")]
#[command(version)]
struct Args {
    /// More logging on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl directory trees and emit one record per entry
    Scan {
        /// Roots to crawl, each in its own thread
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Write CSV to FILE instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Load records into this inventory database instead of writing CSV
        #[arg(long, value_name = "DB", conflicts_with = "output")]
        db: Option<PathBuf>,

        /// Load records into the default inventory database
        #[arg(long, conflicts_with_all = ["output", "db"])]
        store: bool,

        /// Descend into directories already on the current path
        #[arg(long)]
        no_ancestry_guard: bool,
    },

    /// Print the paths of matching entries below each root
    Find {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print the total size and entry count of matching entries below each root
    Du {
        #[command(flatten)]
        query: QueryArgs,

        /// Print `{"size": .., "inodes": ..}`
        #[arg(long)]
        json: bool,
    },

    /// Answer a JSON request read from stdin
    Query {
        #[arg(value_enum)]
        kind: QueryKind,

        #[command(flatten)]
        db: DbArg,

        /// Leave the root entries out of the results
        #[arg(long)]
        exclude_root: bool,
    },

    /// Browse a directory with inventory totals per entry
    Browse {
        /// Directory to open (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        db: DbArg,
    },
}

#[derive(clap::Args, Debug)]
struct DbArg {
    /// Inventory database [default: <data dir>/dusql/inventory.db]
    #[arg(long, env = "DUSQL_DB")]
    db: Option<PathBuf>,
}

/// Predicate options; names and sizes are resolved before querying
#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Group name or gid; prefix `!` or `-` to exclude it
    #[arg(long, allow_hyphen_values = true)]
    group: Option<String>,

    /// User name or uid; prefix `!` or `-` to exclude it
    #[arg(long, allow_hyphen_values = true)]
    user: Option<String>,

    /// Modified since a date or age (2018, 20170602, 30d); `-` for before
    #[arg(long, allow_hyphen_values = true)]
    mtime: Option<String>,

    /// At least this size (16m, 1g); `-` for at most
    #[arg(long, allow_hyphen_values = true)]
    size: Option<String>,
}

impl FilterArgs {
    fn to_human(&self) -> HumanPredicate {
        HumanPredicate {
            group: self.group.clone(),
            user: self.user.clone(),
            mtime: self.mtime.clone(),
            size: self.size.clone(),
        }
    }
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Paths whose inventory subtrees are searched
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    #[command(flatten)]
    filter: FilterArgs,

    #[command(flatten)]
    db: DbArg,

    /// Leave the root entries out of the results
    #[arg(long)]
    exclude_root: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum QueryKind {
    Find,
    Du,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.verbose, matches!(args.command, Command::Browse { .. }));

    match args.command {
        Command::Scan {
            paths,
            output,
            db,
            store,
            no_ancestry_guard,
        } => {
            let target = if db.is_some() || store {
                commands::ScanTarget::Database(database_path(db)?)
            } else {
                commands::ScanTarget::Csv(output)
            };
            commands::scan(paths, target, !no_ancestry_guard)
        }
        Command::Find { query } => {
            let engine = open_engine(query.db.db.clone(), !query.exclude_root)?;
            commands::find(&engine, &query.roots, &query.filter.to_human())
        }
        Command::Du { query, json } => {
            let engine = open_engine(query.db.db.clone(), !query.exclude_root)?;
            commands::du(&engine, &query.roots, &query.filter.to_human(), json)
        }
        Command::Query {
            kind,
            db,
            exclude_root,
        } => {
            let engine = open_engine(db.db, !exclude_root)?;
            let code = commands::query(&engine, kind, io::stdin().lock(), io::stdout().lock())?;
            std::process::exit(code)
        }
        Command::Browse { path, filter, db } => browse(path, &filter, db.db),
    }
}

/// Log to stderr; the browser only logs when RUST_LOG asks for it
fn init_logging(verbose: u8, interactive: bool) {
    let default = match (interactive, verbose) {
        (true, _) => "off",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// `--db`, else `$DUSQL_DB`, else the user data directory
fn database_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os("DUSQL_DB") {
        return Ok(PathBuf::from(path));
    }
    dirs::data_dir()
        .map(|d| d.join("dusql").join("inventory.db"))
        .ok_or_else(|| eyre!("no data directory on this system, pass --db"))
}

fn open_engine(db: Option<PathBuf>, include_root: bool) -> Result<QueryEngine<SqliteStore>> {
    let path = database_path(db)?;
    if !path.exists() {
        return Err(eyre!(
            "no inventory at {}; run `dusql scan --store PATH...` first",
            path.display()
        ));
    }
    let store = SqliteStore::open(&path)?;
    Ok(QueryEngine::new(store, QueryConfig { include_root }))
}

fn browse(path: PathBuf, filter: &FilterArgs, db: Option<PathBuf>) -> Result<()> {
    let path = path.canonicalize().unwrap_or(path);
    if !path.is_dir() {
        eprintln!("Error: Not a directory: {}", path.display());
        std::process::exit(1);
    }

    let predicate = filter.to_human().resolve(chrono::Utc::now())?;
    let engine = open_engine(db, true)?;
    let mut state = AppState::new(engine, predicate, path);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState<SqliteStore>,
) -> Result<()> {
    let theme = Theme::default();
    let event_handler = EventHandler::new(250);

    loop {
        terminal.draw(|frame| {
            let area = frame.area();
            let layout = AppLayout::new(area);

            frame
                .buffer_mut()
                .set_style(area, Style::default().bg(theme.bg));

            state.visible_height = layout.list.height as usize;

            Header::new(&state.current_dir, state.totals, &theme)
                .render(layout.header, frame.buffer_mut());
            render_status(state, &theme, layout.status, frame.buffer_mut());
            ListView::new(
                &state.entries,
                state.selected_index,
                state.scroll_offset,
                state.sort_key,
                state.largest(),
                &theme,
            )
            .render(layout.list, frame.buffer_mut());

            if state.mode == AppMode::Help {
                HelpView::new(&theme).render(area, frame.buffer_mut());
            }

            Footer::new(state.mode, state.sort_key, state.reverse, &theme)
                .render(layout.footer, frame.buffer_mut());
        })?;

        if let AppEvent::Key(key) = event_handler.next()? {
            let action = handle_key(key, state.mode);
            handle_action(state, action);
        }

        if state.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_action(state: &mut AppState<SqliteStore>, action: Action) {
    match action {
        Action::MoveUp => state.move_up(),
        Action::MoveDown => state.move_down(),
        Action::PageUp => state.page_up(),
        Action::PageDown => state.page_down(),
        Action::GoToFirst => state.go_to_first(),
        Action::GoToLast => state.go_to_last(),
        Action::Enter => state.enter_selected(),
        Action::GoUp => state.go_up(),
        Action::SortBySize => state.sort_by(SortKey::Size),
        Action::SortByInodes => state.sort_by(SortKey::Inodes),
        Action::Reverse => state.toggle_reverse(),
        Action::Refresh => state.reload(),
        Action::ShowHelp => state.show_help(),
        Action::HideHelp => state.hide_help(),
        Action::Quit => state.quit(),
        Action::Tick => {}
    }
}

/// Share bar of the selected entry, or the last error
fn render_status(
    state: &AppState<SqliteStore>,
    theme: &Theme,
    area: ratatui::layout::Rect,
    buf: &mut ratatui::buffer::Buffer,
) {
    if area.width < 20 {
        return;
    }

    if let Some(error) = &state.error_message {
        buf.set_string(area.x + 1, area.y, error, Style::default().fg(theme.red));
        return;
    }

    let Some(entry) = state.selected_entry() else {
        return;
    };
    let percentage = dusql_core::size_percentage(entry.size, state.totals.size);
    let label = format!("{:.1}% of {}", percentage, dusql_core::format_size(state.totals.size));
    let bar_width = (area.width as usize).saturating_sub(label.len() + 4);
    buf.set_string(
        area.x + 1,
        area.y,
        ui::bar_chart::render_bar(percentage, bar_width),
        Style::default().fg(theme.share_color(percentage)),
    );
    buf.set_string(
        area.x + area.width.saturating_sub(label.len() as u16 + 1),
        area.y,
        &label,
        Style::default().fg(theme.fg_dim),
    );
}
