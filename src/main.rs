mod config;
mod db;
mod export;
mod logging;
mod meta;
mod model;
mod repository;
mod search;
mod selection;
mod session;
mod ui;
mod view;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use tracing::warn;

use config::Config;
use db::Database;
use meta::MetaStore;
use model::{format_last_activity, ContactDraft, ContactId};
use session::{NoticeKind, Session};
use view::{DisplayEntry, SortOption};

#[derive(Parser, Debug)]
#[command(name = "cstudio", version, about = "Manage contacts from the terminal")]
struct Cli {
    /// Configuration file (defaults to the per-user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Contact API base URL; selects the remote backend
    #[arg(long, global = true, env = "CSTUDIO_SERVER", value_name = "URL")]
    server: Option<String>,

    /// Use the offline SQLite backend
    #[arg(long, global = true, default_value_t = false)]
    local: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the display list
    List(ViewArgs),
    /// Print summary statistics
    Stats,
    /// Create a contact
    Add(AddArgs),
    /// Update fields of a contact
    Edit(EditArgs),
    /// Delete one or more contacts
    Delete {
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
    },
    /// Toggle the favorite flag
    Favorite { id: String },
    /// Toggle the pinned flag
    Pin { id: String },
    /// Set the note of a contact (empty text clears it)
    Note { id: String, text: String },
    /// Write the display list as CSV
    Export {
        /// Directory to write into (defaults to `export_dir`)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Search term (matches name, email, phone)
    #[arg(long)]
    search: Option<String>,

    #[arg(long, value_enum)]
    sort: Option<SortOption>,

    /// Only contacts with an address
    #[arg(long, default_value_t = false)]
    with_address: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    address: Option<String>,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// New address; an empty string removes it
    #[arg(long)]
    address: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?.with_overrides(cli.server, cli.local);

    match cli.command {
        None => {
            logging::init_file(&config.log_path())?;
            log_config_warnings(&config);
            run_tui(&config)
        }
        Some(command) => {
            logging::init_stderr()?;
            log_config_warnings(&config);
            run_command(command, &config)
        }
    }
}

fn log_config_warnings(config: &Config) {
    for warning in &config.warnings {
        warn!("{}: {}", config.config_path.display(), warning);
    }
}

fn open_session(config: &Config) -> Result<Session> {
    let repo = repository::open(config)?;
    let meta = MetaStore::load(Database::open(&config.db_path())?);
    Ok(Session::new(
        repo,
        meta,
        config.default_sort,
        config.notice_ttl(),
    ))
}

fn run_tui(config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    // a failed load leaves a notice on screen; retry with refresh
    let _ = session.refresh();
    let mut app = ui::app::App::new(session, config);
    app.run()
}

fn run_command(command: Command, config: &Config) -> Result<()> {
    let mut session = open_session(config)?;
    session.refresh()?;

    match command {
        Command::List(args) => {
            apply_view(&mut session, &args)?;
            let display = session.display();
            if display.is_empty() {
                println!("No contacts");
            }
            for entry in &display.entries {
                println!("{}", list_row(entry));
            }
        }
        Command::Stats => {
            let summary = session.display().summary;
            println!("Total contacts: {}", summary.total);
            println!("Email domains:  {}", summary.unique_domains);
            println!(
                "Last activity:  {}",
                format_last_activity(summary.last_activity)
            );
        }
        Command::Add(args) => {
            let draft = ContactDraft {
                name: args.name,
                email: args.email,
                phone: args.phone,
                address: args.address,
            };
            let contact = session.create(draft)?;
            print_success(&session);
            println!("{}", contact.id);
        }
        Command::Edit(args) => {
            let id = ContactId::from(args.id);
            let existing = session.fetch_contact(&id)?;
            let mut draft = ContactDraft::from_contact(&existing);
            if let Some(name) = args.name {
                draft.name = name;
            }
            if let Some(email) = args.email {
                draft.email = email;
            }
            if let Some(phone) = args.phone {
                draft.phone = phone;
            }
            if let Some(address) = args.address {
                draft.address = Some(address);
            }
            session.update(&id, draft)?;
            print_success(&session);
        }
        Command::Delete { ids } => {
            let mut ids = ids
                .into_iter()
                .map(|id| existing_id(&session, id))
                .collect::<Result<Vec<_>>>()?;
            ids.sort();
            ids.dedup();
            if let [id] = ids.as_slice() {
                session.delete(id)?;
            } else {
                for id in &ids {
                    session.toggle_selection(id);
                }
                session.bulk_delete()?;
            }
            print_success(&session);
        }
        Command::Favorite { id } => {
            let id = existing_id(&session, id)?;
            session.toggle_favorite(&id)?;
            let state = if session.metadata().is_favorite(&id) {
                "on"
            } else {
                "off"
            };
            println!("Favorite {} for {}", state, id);
        }
        Command::Pin { id } => {
            let id = existing_id(&session, id)?;
            session.toggle_pinned(&id)?;
            let state = if session.metadata().is_pinned(&id) {
                "on"
            } else {
                "off"
            };
            println!("Pinned {} for {}", state, id);
        }
        Command::Note { id, text } => {
            let id = existing_id(&session, id)?;
            session.set_note(&id, &text)?;
            if text.trim().is_empty() {
                println!("Note cleared for {}", id);
            } else {
                println!("Note saved for {}", id);
            }
        }
        Command::Export { output, view } => {
            apply_view(&mut session, &view)?;
            let dir = output.unwrap_or_else(|| config.export_dir.clone());
            let path = session.export_csv(&dir, OffsetDateTime::now_utc())?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn apply_view(session: &mut Session, args: &ViewArgs) -> Result<()> {
    if let Some(sort) = args.sort {
        session.set_sort(sort);
    }
    session.set_address_filter(args.with_address);
    if let Some(term) = args.search.as_deref() {
        session.search(term)?;
    }
    Ok(())
}

fn existing_id(session: &Session, raw: String) -> Result<ContactId> {
    let id = ContactId::from(raw);
    if session.contact(&id).is_none() {
        bail!("Contact not found with id: {}", id);
    }
    Ok(id)
}

fn print_success(session: &Session) {
    if let Some(notice) = session.notice() {
        if notice.kind == NoticeKind::Success {
            println!("{}", notice.text);
        }
    }
}

fn list_row(entry: &DisplayEntry) -> String {
    let pin = if entry.pinned { '^' } else { ' ' };
    let star = if entry.favorite { '*' } else { ' ' };
    let mark = if entry.selected { 'x' } else { ' ' };
    let contact = &entry.contact;
    format!(
        "{}{}{} {:>4}  {:<24} {:<32} {}",
        mark, pin, star, contact.id, contact.name, contact.email, contact.phone
    )
}
