use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use steep::store::LogSink;
use steep::utils::ensure_database_directory;
use steep::{Config, Database, Note, NoteKey, NoteService, ReportError, TagQuery, logging};
use time::{Date, OffsetDateTime};

/// steep - tea inventory ledger over markdown notes
#[derive(Parser)]
#[command(name = "steep")]
#[command(about = "Tea consumption, reserve and purchase reports from markdown notes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Add a new note with optional tags
    Add(AddCommand),
    /// List notes, optionally filtered by a tag query
    List(QueryArgs),
    /// Print a note
    Show(ShowCommand),
    /// Replace the content or tags of a note
    Edit(EditCommand),
    /// Move a note to the trash
    Trash(KeyArgs),
    /// Delete a note permanently
    Delete(KeyArgs),
    /// Regenerate a report note
    #[command(subcommand)]
    Report(ReportCommand),
    /// Show remaining stock, optionally refreshing annotations first
    Remaining(RemainingCommand),
    /// Copy mix brews into their ingredient notes
    Mixes,
}

/// Add a new note
#[derive(Args)]
struct AddCommand {
    /// The content of the note
    #[arg(value_name = "CONTENT", required_unless_present = "file")]
    content: Option<String>,

    /// Read the content from a file instead
    #[arg(short, long, value_name = "PATH", conflicts_with = "content")]
    file: Option<PathBuf>,

    /// Comma-separated tags to apply to the note
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,
}

#[derive(Args)]
struct QueryArgs {
    /// Tag query such as "+`green -Japan"
    #[arg(short, long, value_name = "QUERY", allow_hyphen_values = true)]
    query: Option<String>,
}

#[derive(Args)]
struct KeyArgs {
    /// Key of the note
    #[arg(value_name = "KEY")]
    key: String,
}

#[derive(Args)]
struct ShowCommand {
    #[command(flatten)]
    note: KeyArgs,

    /// Print the note as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EditCommand {
    #[command(flatten)]
    note: KeyArgs,

    /// New content
    #[arg(short, long, value_name = "CONTENT")]
    content: Option<String>,

    /// Read the new content from a file
    #[arg(short, long, value_name = "PATH", conflicts_with = "content")]
    file: Option<PathBuf>,

    /// Comma-separated tags replacing the current ones
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Yearly consumption per category and month
    Consumption {
        /// Two-digit year; repeat for several, omit for every year
        #[arg(short, long = "year", value_name = "YY")]
        years: Vec<u8>,

        /// Only the current year
        #[arg(long, conflicts_with = "years")]
        current: bool,
    },
    /// Today's remaining stock per category
    Reserve,
    /// Grams bought per category and year
    Purchase,
}

#[derive(Args)]
struct RemainingCommand {
    #[command(flatten)]
    filter: QueryArgs,

    /// Refresh remaining annotations and derived tags first
    #[arg(long)]
    update: bool,
}

fn main() {
    let cli = Cli::parse();

    let result = Config::from_env().and_then(|config| {
        logging::init(&config.log_filter);
        let service = open_service(&config)?;
        let today = OffsetDateTime::now_utc().date();
        execute(&cli.command, &service, &config, today)
    });

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are report errors, empty content and unknown keys.
/// Internal errors include database failures and I/O errors.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if cause.downcast_ref::<ReportError>().is_some() {
            return true;
        }
        let msg = cause.to_string();
        msg.contains("cannot be empty") || msg.contains("Note not found")
    })
}

fn open_service(config: &Config) -> Result<NoteService> {
    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).context("Failed to open database")?;
    Ok(NoteService::new(db))
}

/// Executes a command against a service.
///
/// Separated from `main` to allow testing with in-memory databases.
fn execute(command: &Commands, service: &NoteService, config: &Config, today: Date) -> Result<()> {
    match command {
        Commands::Add(cmd) => execute_add(cmd, service),
        Commands::List(args) => execute_list(args, service),
        Commands::Show(cmd) => execute_show(cmd, service),
        Commands::Edit(cmd) => execute_edit(cmd, service),
        Commands::Trash(args) => {
            let note = service.trash_note(&NoteKey::new(args.key.as_str()))?;
            println!("Note trashed (key: {})", note.key);
            Ok(())
        }
        Commands::Delete(args) => {
            service.delete_note(&NoteKey::new(args.key.as_str()))?;
            println!("Note deleted (key: {})", args.key);
            Ok(())
        }
        Commands::Report(report) => execute_report(report, service, config, today),
        Commands::Remaining(cmd) => execute_remaining(cmd, service, config, today),
        Commands::Mixes => {
            let written = service.update_mixes(&mut LogSink)?;
            print_written(&written);
            Ok(())
        }
    }
}

fn execute_add(cmd: &AddCommand, service: &NoteService) -> Result<()> {
    let content = read_content(cmd.content.as_deref(), cmd.file.as_ref())?.unwrap_or_default();
    if content.trim().is_empty() {
        anyhow::bail!("Note content cannot be empty");
    }

    let tags = cmd.tags.as_deref().map(parse_tags).unwrap_or_default();
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
    let note = service
        .create_note(&content, &tag_refs)
        .context("Failed to create note")?;

    print!("Note created (key: {})", note.key);
    if !tags.is_empty() {
        print!(" with tags: {}", tags.join(", "));
    }
    println!();

    Ok(())
}

fn execute_list(args: &QueryArgs, service: &NoteService) -> Result<()> {
    let query = parse_query(args.query.as_deref());
    for note in service.list_notes(&query)? {
        println!("{}", format_listing(&note));
    }
    Ok(())
}

fn execute_show(cmd: &ShowCommand, service: &NoteService) -> Result<()> {
    let key = NoteKey::new(cmd.note.key.as_str());
    let note = service
        .get_note(&key)?
        .with_context(|| format!("Note not found: {key}"))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!("{}", format_listing(&note));
        println!();
        print!("{}", note.content);
        if !note.content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn execute_edit(cmd: &EditCommand, service: &NoteService) -> Result<()> {
    let key = NoteKey::new(cmd.note.key.as_str());
    let mut note = service
        .get_note(&key)?
        .with_context(|| format!("Note not found: {key}"))?;

    if let Some(content) = read_content(cmd.content.as_deref(), cmd.file.as_ref())? {
        if content.trim().is_empty() {
            anyhow::bail!("Note content cannot be empty");
        }
        note.content = content;
    }
    if let Some(tags) = cmd.tags.as_deref() {
        note.tags = parse_tags(tags);
    }

    let note = service.update_note(&note).context("Failed to update note")?;
    println!("Note updated (key: {})", note.key);
    Ok(())
}

fn execute_report(
    report: &ReportCommand,
    service: &NoteService,
    config: &Config,
    today: Date,
) -> Result<()> {
    let engine = &config.engine;
    let written = match report {
        ReportCommand::Consumption { current: true, .. } => {
            service.generate_current_consumption(engine, today, &mut LogSink)?
        }
        ReportCommand::Consumption { years, .. } => {
            service.generate_consumption(engine, years, &mut LogSink)?
        }
        ReportCommand::Reserve => service.generate_reserve(engine, today, &mut LogSink)?,
        ReportCommand::Purchase => service.generate_purchase(engine, today, &mut LogSink)?,
    };
    print_written(&written);
    Ok(())
}

fn execute_remaining(
    cmd: &RemainingCommand,
    service: &NoteService,
    config: &Config,
    today: Date,
) -> Result<()> {
    if cmd.update {
        let written = service.update_remaining(&config.engine, today, &mut LogSink)?;
        print_written(&written);
    }
    let query = parse_query(cmd.filter.query.as_deref());
    println!("{}", service.remaining_summary(&query)?);
    Ok(())
}

/// Returns the inline content, the file content, or `None` if neither is given.
fn read_content(inline: Option<&str>, file: Option<&PathBuf>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(content), _) => Ok(Some(content.to_string())),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map(Some),
        (None, None) => Ok(None),
    }
}

fn parse_query(query: Option<&str>) -> TagQuery {
    query.map(TagQuery::parse).unwrap_or_default()
}

fn format_listing(note: &Note) -> String {
    if note.tags.is_empty() {
        format!("{}  {}", note.key, note.title)
    } else {
        format!("{}  {}  [{}]", note.key, note.title, note.tags.join(", "))
    }
}

fn print_written(written: &[Note]) {
    if written.is_empty() {
        println!("No changes");
    }
    for note in written {
        println!("Updated {} (key: {})", note.title, note.key);
    }
}

/// Parses comma-separated tags from a string.
///
/// Splits on commas, trims whitespace from each tag, and filters out empty strings.
fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use steep::EngineConfig;

    fn service() -> NoteService {
        NoteService::new(Database::in_memory().unwrap())
    }

    fn config() -> Config {
        Config {
            database_path: PathBuf::from(":memory:"),
            log_filter: "warn".to_string(),
            engine: EngineConfig::default(),
        }
    }

    fn today() -> Date {
        time::macros::date!(2026 - 10 - 14)
    }

    #[test]
    fn parse_tags_with_normal_input() {
        let result = parse_tags("`green,China");
        assert_eq!(result, vec!["`green", "China"]);
    }

    #[test]
    fn parse_tags_with_whitespace_and_empty_elements() {
        let result = parse_tags(" `green , ,China, ");
        assert_eq!(result, vec!["`green", "China"]);
    }

    #[test]
    fn parse_tags_only_whitespace() {
        let result = parse_tags("  ,  ,  ");
        assert!(result.is_empty());
    }

    #[test]
    fn cli_parses_repeated_years() {
        let cli =
            Cli::try_parse_from(["steep", "report", "consumption", "-y", "25", "--year", "26"])
                .unwrap();
        match cli.command {
            Commands::Report(ReportCommand::Consumption { years, current }) => {
                assert_eq!(years, vec![25, 26]);
                assert!(!current);
            }
            _ => panic!("expected consumption report"),
        }
    }

    #[test]
    fn cli_accepts_negative_query_terms() {
        let cli = Cli::try_parse_from(["steep", "list", "--query", "-Japan"]).unwrap();
        match cli.command {
            Commands::List(args) => assert_eq!(args.query.as_deref(), Some("-Japan")),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn add_rejects_empty_content_as_user_error() {
        let cmd = AddCommand {
            content: Some("   ".to_string()),
            file: None,
            tags: None,
        };
        let err = execute_add(&cmd, &service()).unwrap_err();
        assert!(is_user_error(&err));
    }

    #[test]
    fn add_reads_content_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tea.md");
        std::fs::write(&path, "# Bancha\n").unwrap();

        let service = service();
        let cmd = AddCommand {
            content: None,
            file: Some(path),
            tags: Some("`green".to_string()),
        };
        execute_add(&cmd, &service).unwrap();

        let notes = service.list_notes(&TagQuery::parse("+`green")).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Bancha");
    }

    #[test]
    fn unknown_key_is_a_user_error() {
        let cmd = ShowCommand {
            note: KeyArgs {
                key: "missing".to_string(),
            },
            json: false,
        };
        let err = execute_show(&cmd, &service()).unwrap_err();
        assert!(is_user_error(&err));
    }

    #[test]
    fn missing_report_note_is_a_user_error() {
        let err = execute(
            &Commands::Report(ReportCommand::Reserve),
            &service(),
            &config(),
            today(),
        )
        .unwrap_err();
        assert!(is_user_error(&err));
    }

    #[test]
    fn internal_errors_are_not_user_errors() {
        let err = anyhow::anyhow!("disk I/O error");
        assert!(!is_user_error(&err));
    }

    #[test]
    fn edit_replaces_tags_and_keeps_content() {
        let service = service();
        let note = service.create_note("# Sencha\n", &["old"]).unwrap();
        let cmd = EditCommand {
            note: KeyArgs {
                key: note.key.to_string(),
            },
            content: None,
            file: None,
            tags: Some("`green, Japan".to_string()),
        };
        execute_edit(&cmd, &service).unwrap();

        let stored = service.get_note(&note.key).unwrap().unwrap();
        assert_eq!(stored.tags, vec!["`green", "Japan"]);
        assert_eq!(stored.content, "# Sencha\n");
    }
}
