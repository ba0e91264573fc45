//! `studyshelf` command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `Organizer` use cases for one data directory.
//! - Ask for explicit `--yes` before destructive operations.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use studyshelf_core::backup::codec::to_json;
use studyshelf_core::db::open_db;
use studyshelf_core::{
    backup_file_name, core_version, init_logging, FileMetadataStore, ImportOutcome, Item,
    ItemKind, Organizer, OrganizerConfig, PendingDelete, SelectionController, SqliteItemStore,
    Subject, SubjectDraft, Upload,
};

type CliOrganizer<'conn> = Organizer<FileMetadataStore, SqliteItemStore<'conn>>;

#[derive(Parser)]
#[command(name = "studyshelf")]
#[command(about = "Organize study subjects with notes, files, images and audio", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (defaults to ./.studyshelf)
    #[arg(long, global = true, env = "STUDYSHELF_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STUDYSHELF_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage subjects
    Subjects {
        #[command(subcommand)]
        action: SubjectsAction,
    },

    /// Manage items of one subject
    Items {
        #[command(subcommand)]
        action: ItemsAction,
    },

    /// Export or import subject backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Remove items whose subject no longer exists
    Sweep,

    /// Print the core version
    Version,
}

#[derive(Subcommand)]
enum SubjectsAction {
    /// List subjects, optionally filtered by name or mood
    List {
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Create a subject
    Add(SubjectFields),

    /// Edit a subject
    Edit {
        id: String,

        #[command(flatten)]
        fields: SubjectFields,
    },

    /// Delete a subject and all of its items
    Delete {
        id: String,

        #[arg(long)]
        yes: bool,
    },

    /// Open a subject (omit the id to return home)
    Select { id: Option<String> },
}

#[derive(Args)]
struct SubjectFields {
    name: String,

    #[arg(long)]
    icon: Option<String>,

    #[arg(long)]
    mood: Option<String>,

    /// `#RRGGBB` color
    #[arg(long)]
    color: Option<String>,
}

impl SubjectFields {
    fn into_draft(self, base: SubjectDraft) -> SubjectDraft {
        SubjectDraft {
            name: self.name,
            icon: self.icon.unwrap_or(base.icon),
            mood: self.mood.unwrap_or(base.mood),
            color: self.color.unwrap_or(base.color),
        }
    }
}

#[derive(Subcommand)]
enum ItemsAction {
    /// List one tab of a subject, newest first
    List {
        subject_id: String,

        /// notes, files, images or audio
        #[arg(short, long, default_value = "notes")]
        kind: String,
    },

    /// Add a text note
    AddNote { subject_id: String, text: String },

    /// Add a file with an optional title
    AddFile {
        subject_id: String,
        path: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        mime: MimeArg,
    },

    /// Add an image
    AddImage {
        subject_id: String,
        path: PathBuf,

        #[command(flatten)]
        mime: MimeArg,
    },

    /// Add an audio recording
    AddAudio {
        subject_id: String,
        path: PathBuf,

        #[command(flatten)]
        mime: MimeArg,
    },

    /// Delete items by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct MimeArg {
    /// MIME type recorded with the upload
    #[arg(long = "mime", default_value = "application/octet-stream")]
    mime_type: String,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Write all subjects to a backup file
    Export {
        /// Output path (defaults to studyshelf-backup-<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all subjects with the ones in a backup file
    Import {
        path: PathBuf,

        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("studyshelf {}", core_version());
        return Ok(());
    }

    let data_dir = resolve_data_dir(cli.data_dir)?;
    let config = OrganizerConfig::new(&data_dir, cli.log_level.as_deref())?;
    std::fs::create_dir_all(config.data_dir()).with_context(|| {
        format!(
            "failed to create data directory {}",
            config.data_dir().display()
        )
    })?;
    init_logging(&config)?;

    let mut conn = open_db(config.items_db_path())?;
    let items = SqliteItemStore::try_new(&mut conn)?;
    let mut organizer = Organizer::open(FileMetadataStore::new(config.metadata_path()), items)?;

    match cli.command {
        Commands::Subjects { action } => run_subjects(&mut organizer, action),
        Commands::Items { action } => run_items(&mut organizer, action),
        Commands::Backup { action } => run_backup(&mut organizer, action),
        Commands::Sweep => {
            let removed = organizer.sweep_orphans()?;
            println!("Removed {removed} orphaned item(s).");
            Ok(())
        }
        Commands::Version => Ok(()),
    }
}

fn resolve_data_dir(requested: Option<PathBuf>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(match requested {
        Some(path) if path.is_absolute() => path,
        Some(path) => cwd.join(path),
        None => cwd.join(".studyshelf"),
    })
}

fn run_subjects(organizer: &mut CliOrganizer<'_>, action: SubjectsAction) -> Result<()> {
    match action {
        SubjectsAction::List { query } => {
            let selected = organizer.selected_subject_id().map(str::to_string);
            let subjects = organizer.search_subjects(query.as_deref().unwrap_or_default());
            if subjects.is_empty() {
                println!("No subjects.");
            }
            for subject in subjects {
                let marker = if selected.as_deref() == Some(subject.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}", describe_subject(subject));
            }
        }
        SubjectsAction::Add(fields) => {
            let subject = organizer.create_subject(&fields.into_draft(SubjectDraft::default()))?;
            println!("Created {}", describe_subject(&subject));
        }
        SubjectsAction::Edit { id, fields } => {
            let current = organizer
                .subject(&id)
                .ok_or_else(|| anyhow!("subject not found: {id}"))?;
            let base = SubjectDraft {
                name: current.name.clone(),
                icon: current.icon.clone(),
                mood: current.mood.clone(),
                color: current.color.clone(),
            };
            let subject = organizer.edit_subject(&id, &fields.into_draft(base))?;
            println!("Updated {}", describe_subject(&subject));
        }
        SubjectsAction::Delete { id, yes } => {
            if !yes {
                bail!("deleting a subject removes all of its items; pass --yes to confirm");
            }
            let removed = organizer.delete_subject(&id)?;
            println!("Deleted subject {id} and {removed} item(s).");
        }
        SubjectsAction::Select { id: Some(id) } => {
            let subject = organizer.select_subject(&id)?;
            println!("Opened {}", describe_subject(subject));
        }
        SubjectsAction::Select { id: None } => {
            organizer.clear_selected_subject()?;
            println!("Back to home.");
        }
    }
    Ok(())
}

fn run_items(organizer: &mut CliOrganizer<'_>, action: ItemsAction) -> Result<()> {
    match action {
        ItemsAction::List { subject_id, kind } => {
            let kind = ItemKind::parse(&kind).ok_or_else(|| {
                anyhow!("unknown item kind `{kind}`; expected notes, files, images or audio")
            })?;
            let items = organizer.list_items(&subject_id, kind)?;
            if items.is_empty() {
                println!("No {kind}.");
            }
            for item in &items {
                println!("{}", describe_item(item));
            }
        }
        ItemsAction::AddNote { subject_id, text } => {
            let item = organizer.add_note(&subject_id, &text)?;
            println!("Added {}", describe_item(&item));
        }
        ItemsAction::AddFile {
            subject_id,
            path,
            title,
            mime,
        } => {
            let upload = read_upload(&path, mime.mime_type)?;
            let item = organizer.add_file(&subject_id, title.as_deref(), upload)?;
            println!("Added {}", describe_item(&item));
        }
        ItemsAction::AddImage {
            subject_id,
            path,
            mime,
        } => {
            let upload = read_upload(&path, mime.mime_type)?;
            let item = organizer.add_image(&subject_id, upload)?;
            println!("Added {}", describe_item(&item));
        }
        ItemsAction::AddAudio {
            subject_id,
            path,
            mime,
        } => {
            let upload = read_upload(&path, mime.mime_type)?;
            let item = organizer.add_audio(&subject_id, upload)?;
            println!("Added {}", describe_item(&item));
        }
        ItemsAction::Delete { ids, yes } => {
            let Some(pending) = select_for_delete(organizer.selection_mut(), ids) else {
                println!("Nothing selected.");
                return Ok(());
            };
            if !yes {
                organizer.selection_mut().cancel();
                bail!(
                    "about to delete {} item(s); pass --yes to confirm",
                    pending.count()
                );
            }
            let removed = organizer.delete_selected(pending)?;
            println!("Deleted {removed} item(s).");
        }
    }
    Ok(())
}

fn run_backup(organizer: &mut CliOrganizer<'_>, action: BackupAction) -> Result<()> {
    match action {
        BackupAction::Export { output } => {
            let exported_at = Utc::now();
            let output = output.unwrap_or_else(|| default_backup_path(exported_at));
            let document = organizer.export_backup(exported_at);
            std::fs::write(&output, to_json(&document)?)
                .with_context(|| format!("failed to write backup to {}", output.display()))?;
            info!(
                "event=backup_write module=cli status=ok subjects={}",
                document.subjects.len()
            );
            println!(
                "Exported {} subject(s) to {}",
                document.subjects.len(),
                output.display()
            );
        }
        BackupAction::Import { path, yes } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read backup {}", path.display()))?;
            let mut requested = 0;
            let outcome = organizer.import_backup(&text, |count| {
                requested = count;
                yes
            })?;
            match outcome {
                ImportOutcome::Installed(count) => println!("Imported {count} subject(s)."),
                ImportOutcome::Declined => bail!(
                    "import would replace all subjects with {requested} from the backup; pass --yes to confirm"
                ),
            }
        }
    }
    Ok(())
}

/// Puts every id into one selection session; repeated ids count once.
fn select_for_delete(
    selection: &mut SelectionController,
    ids: Vec<String>,
) -> Option<PendingDelete> {
    for id in ids {
        selection.begin(id);
    }
    selection.request_delete()
}

/// Backup name dated like `exportedAt`, in UTC.
fn default_backup_path(exported_at: DateTime<Utc>) -> PathBuf {
    PathBuf::from(backup_file_name(exported_at.date_naive()))
}

fn read_upload(path: &Path, mime_type: String) -> Result<Upload> {
    let payload =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Upload {
        name,
        mime_type,
        payload,
    })
}

fn describe_subject(subject: &Subject) -> String {
    format!(
        "{} {} {} {} [{}]",
        subject.id, subject.icon, subject.name, subject.mood, subject.color
    )
}

fn describe_item(item: &Item) -> String {
    let created = chrono::DateTime::from_timestamp_millis(item.created_at)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| item.created_at.to_string());
    match item.content.payload() {
        Some(payload) => format!(
            "{} {created} {} ({} bytes)",
            item.id,
            item.label(),
            payload.len()
        ),
        None => format!("{} {created} {}", item.id, item.label()),
    }
}
