use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lms_relabel::theme::page_stylesheet;
use lms_relabel::{
    Command, Delivery, Disconnected, EngineConfig, JsonFileStore, Page, PaletteInput, PersistedState,
    Response, SettingsController, ThemePalette,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lms-relabel")]
#[command(about = "Rename course labels and re-theme LMS pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON engine config (missing fields use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply saved names and theme to a page and print the result
    Render {
        /// HTML page to transform
        #[arg(short, long)]
        page: PathBuf,

        /// Saved settings (JSON object)
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Force dark mode on regardless of saved settings
        #[arg(long)]
        dark: bool,
    },

    /// Print the targets found on a page as JSON
    Items {
        #[arg(short, long)]
        page: PathBuf,

        #[arg(short, long)]
        state: Option<PathBuf>,
    },

    /// Validate a palette and print the page stylesheet it produces
    Theme {
        #[arg(long, default_value = "121417")]
        background: String,
        #[arg(long, default_value = "1e2228")]
        surface: String,
        #[arg(long, default_value = "3a3f47")]
        border: String,
        #[arg(long, default_value = "4d9de0")]
        accent: String,

        /// Also save the palette to this settings file
        #[arg(short, long)]
        state: Option<PathBuf>,
    },

    /// Save a custom name (omit NAME to revert to the original)
    Rename {
        #[arg(short, long)]
        state: PathBuf,

        /// Page to apply the change to right away
        #[arg(short, long)]
        page: Option<PathBuf>,

        /// Numeric item id
        id: String,

        name: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            Ok(EngineConfig::from_json(&text)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn load_state(path: Option<&Path>) -> Result<PersistedState> {
    match path {
        Some(p) => Ok(PersistedState::load(&JsonFileStore::new(p))?),
        None => Ok(PersistedState::default()),
    }
}

fn open_page(path: &Path, config: EngineConfig, state: PersistedState) -> Result<Page> {
    let html = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut page = Page::from_html(&html, config, state)?;
    page.run_until_idle();
    Ok(page)
}

fn print_page(page: &Page) {
    let doc = page.document();
    println!("{}", doc.to_html(doc.root()));
}

fn report(delivery: Delivery) {
    match delivery {
        Delivery::Applied => eprintln!("saved and applied"),
        Delivery::Deferred => eprintln!("saved; will apply on next load"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render { page, state, dark } => {
            let mut state = load_state(state.as_deref())?;
            state.dark_mode |= dark;
            let page = open_page(&page, config, state)?;
            print_page(&page);
            log::info!("{:?}", page.stats());
        }
        Commands::Items { page, state } => {
            let state = load_state(state.as_deref())?;
            let mut page = open_page(&page, config, state)?;
            match page.dispatch(Command::GetItems) {
                Response::Items { items } => println!("{}", serde_json::to_string_pretty(&items)?),
                other => anyhow::bail!("unexpected response: {:?}", other),
            }
        }
        Commands::Theme {
            background,
            surface,
            border,
            accent,
            state,
        } => {
            let input = PaletteInput {
                background,
                surface,
                border,
                accent,
            };
            let palette = ThemePalette::validate(&input)?;
            if let Some(path) = state {
                let mut controller = SettingsController::new(JsonFileStore::new(path), Disconnected);
                report(controller.save_palette(&input)?);
            }
            println!("{}", page_stylesheet(&palette));
        }
        Commands::Rename { state, page, id, name } => {
            let mut edit = BTreeMap::new();
            edit.insert(id, name.unwrap_or_default());
            let store = JsonFileStore::new(state);
            match page {
                Some(path) => {
                    let saved = PersistedState::load(&store)?;
                    let mut page = open_page(&path, config, saved)?;
                    let mut controller = SettingsController::new(store, &mut page);
                    report(controller.save_names(&edit)?);
                    page.run_until_idle();
                    print_page(&page);
                }
                None => {
                    let mut controller = SettingsController::new(store, Disconnected);
                    report(controller.save_names(&edit)?);
                }
            }
        }
    }
    Ok(())
}
