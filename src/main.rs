//! Guardian Angel - SOS alerts and live location sharing
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result};

use guardian_angel::app::config::{self, Settings};
use guardian_angel::core::{describe_duration, ContactId};
use guardian_angel::services::{ContactBook, FixedGeoSource, LogNotificationChannel};

/// Guardian Angel - SOS alerts and live location sharing
#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(about = "SOS alerts and live location sharing for trusted contacts", long_about = None)]
struct Args {
    /// Directory holding `.guardian/` (defaults to the home directory)
    #[arg(long, value_name = "PATH", global = true)]
    dir: Option<PathBuf>,

    /// Log at debug level (overridden by `GUARDIAN_LOG`)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage trusted contacts
    Contacts {
        #[command(subcommand)]
        action: ContactsAction,
    },

    /// Send an SOS alert to every trusted contact
    Sos {
        /// Cancel the alert automatically after this many seconds
        #[arg(long, value_name = "SECS")]
        for_secs: Option<u64>,
    },

    /// Share live location with the given contacts
    Share {
        /// Contact ids (see `guardian contacts list`)
        #[arg(required = true, value_name = "CONTACT_ID")]
        contacts: Vec<String>,

        /// Sharing duration in minutes, 0 to share until stopped
        #[arg(long, short)]
        minutes: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum ContactsAction {
    /// List trusted contacts
    List,

    /// Add a trusted contact
    Add { name: String, phone: String },

    /// Remove a trusted contact by id
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let base = args.dir.unwrap_or_else(config::default_base_dir);
    config::init_config_dir(&base)?;
    let _log_guard = guardian_angel::core::logging::init(&config::log_dir(&base), args.verbose)?;

    let settings = config::load_settings(&base);
    let book = ContactBook::load(config::contacts_path(&base, &settings));

    match args.command {
        Command::Contacts { action } => run_contacts(&book, action),
        Command::Sos { for_secs } => {
            let geo = FixedGeoSource::from_coords(settings.location.coords());
            guardian_angel::run_sos(
                settings,
                geo,
                LogNotificationChannel,
                Arc::new(book),
                for_secs.map(Duration::from_secs),
            )
            .await?;
            Ok(())
        }
        Command::Share { contacts, minutes } => {
            let minutes = minutes.unwrap_or(settings.sharing.default_duration_minutes);
            check_duration(&settings, minutes)?;

            let geo = FixedGeoSource::from_coords(settings.location.coords());
            let ids = contacts.into_iter().map(ContactId::from).collect();
            guardian_angel::run_share(
                settings,
                geo,
                LogNotificationChannel,
                Arc::new(book),
                ids,
                minutes,
            )
            .await?;
            Ok(())
        }
    }
}

fn run_contacts(book: &ContactBook, action: ContactsAction) -> Result<()> {
    match action {
        ContactsAction::List => {
            let contacts = guardian_angel::services::ContactDirectory::list(book);
            if contacts.is_empty() {
                eprintln!("No trusted contacts yet. Add one with `guardian contacts add`.");
            }
            for contact in contacts {
                println!("{}\t{}\t{}", contact.id, contact.name, contact.phone_number);
            }
        }
        ContactsAction::Add { name, phone } => {
            let contact = book.add(&name, &phone)?;
            println!("Added {} ({})", contact.name, contact.id);
        }
        ContactsAction::Remove { id } => {
            let contact = book.remove(&ContactId::from(id))?;
            println!("Removed {} ({})", contact.name, contact.id);
        }
    }
    Ok(())
}

/// Only the configured duration choices are offered
fn check_duration(settings: &Settings, minutes: u32) -> Result<()> {
    let options = &settings.sharing.duration_options;
    if !options.contains(&minutes) {
        let choices: Vec<_> = options.iter().map(|m| describe_duration(*m)).collect();
        bail!(
            "Unsupported sharing duration: {} minutes (choose one of: {})",
            minutes,
            choices.join(", ")
        );
    }
    Ok(())
}
