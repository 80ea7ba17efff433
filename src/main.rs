use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lcams_tools::config::Settings;
use lcams_tools::io::workbook_read;
use lcams_tools::model::{Scope, Term};
use lcams_tools::store::admin;
use lcams_tools::sync::{self, Workspace};
use lcams_tools::{Result, ToolError, logging};

const RESET_CONFIRMATION: &str = "CONFIRMER";

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose)?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        settings = settings.with_data_dir(data_dir);
    }

    if let Command::Export(args) = &cli.command {
        return execute_export(args);
    }

    let workspace = Workspace::open(settings)?;
    match cli.command {
        Command::Init => {
            println!("store ready at {}", workspace.store().path().display());
            Ok(())
        }
        Command::Import(args) => {
            let scope = args.scope.resolve()?;
            let report = workspace.import_term(&args.input, &scope)?;
            println!(
                "{}: {} averages, {} grades, {} rows skipped, {} values rejected",
                report.scope,
                report.load.averages_written,
                report.load.grades_written,
                report.load.rows_skipped,
                report.load.cells_rejected
            );
            if report.ledger.corrupt {
                eprintln!("warning: the previous ledger was unreadable and has been rebuilt");
            }
            Ok(())
        }
        Command::DeleteStudent(args) => {
            let scope = args.scope.resolve()?;
            let report = workspace.delete_student(&args.student_id, &scope)?;
            println!(
                "removed {} student, {} facts, {} ledger rows",
                report.counts.students, report.counts.facts, report.ledger.removed_rows
            );
            Ok(())
        }
        Command::DeleteImport(args) => {
            let scope = args.scope.resolve()?;
            if !args.input.exists() {
                return Err(ToolError::MissingInput(args.input));
            }
            let parsed = workbook_read::parse_workbook(&args.input)?;
            let report = workspace.delete_import(&parsed, &scope)?;
            println!(
                "removed {} students, {} facts, {} ledger rows",
                report.counts.students, report.counts.facts, report.ledger.removed_rows
            );
            Ok(())
        }
        Command::DeleteClass(args) => {
            let report = workspace.delete_class(&args.resolve()?)?;
            println!(
                "removed {} students, {} facts, {} ledger rows",
                report.counts.students, report.counts.facts, report.ledger.removed_rows
            );
            Ok(())
        }
        Command::DeleteLevel(args) => {
            let term = Term::try_from(args.term)?;
            let report = workspace.delete_level(&args.level, term)?;
            println!(
                "removed {} classes, {} students, {} ledger rows",
                report.counts.classes, report.counts.students, report.ledger.removed_rows
            );
            Ok(())
        }
        Command::Reconcile(args) => {
            let scope = args.resolve()?;
            let report = workspace.reconcile_scope(&scope)?;
            println!("{scope}: ledger now holds {} summary rows", report.summary_rows);
            Ok(())
        }
        Command::History => {
            for record in workspace.import_history()? {
                println!("{}\t{} students", record.scope, record.students);
            }
            Ok(())
        }
        Command::PurgeTerm(args) => {
            let term = Term::try_from(args.term)?;
            let removed = workspace.purge_term(term, &args.school_year)?;
            println!("removed {removed} rows");
            Ok(())
        }
        Command::Backup => {
            let target = workspace.backup_store()?;
            println!("backup written to {}", target.display());
            Ok(())
        }
        Command::Restore(args) => {
            let Some(source) = args.backup else {
                for backup in workspace.list_backups()? {
                    println!("{}", backup.display());
                }
                return Ok(());
            };
            let safety = workspace.restore_store(&source)?;
            if let Some(safety) = safety {
                println!("previous database saved to {}", safety.display());
            }
            println!("database restored from {}", source.display());
            Ok(())
        }
        Command::Reset(args) => {
            if args.confirm.as_deref() != Some(RESET_CONFIRMATION) {
                return Err(ToolError::NotConfirmed {
                    command: "reset",
                    expected: RESET_CONFIRMATION,
                });
            }
            match workspace.reset_store()? {
                Some(safety) => println!("database removed, copy kept at {}", safety.display()),
                None => println!("no database to remove"),
            }
            Ok(())
        }
        Command::SchoolYear(command) => execute_school_year(&workspace, command),
        Command::Level(command) => execute_level(&workspace, command),
        Command::Class(command) => execute_class(&workspace, command),
        Command::Export(_) => Ok(()),
    }
}

fn execute_export(args: &ExportArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(ToolError::MissingInput(args.input.clone()));
    }
    let parsed = workbook_read::parse_workbook(&args.input)?;
    sync::export_processed(&parsed, &args.output)
}

fn execute_school_year(workspace: &Workspace, command: SchoolYearCommand) -> Result<()> {
    let mut conn = workspace.store().open()?;
    match command {
        SchoolYearCommand::Add { label, start, end } => {
            let id = admin::add_school_year(&conn, &label, start.as_deref(), end.as_deref())?;
            println!("school year {label} registered with id {id}");
        }
        SchoolYearCommand::Activate { id } => {
            admin::activate_school_year(&mut conn, id)?;
            println!("school year {id} is now active");
        }
        SchoolYearCommand::List => {
            for year in admin::list_school_years(&conn)? {
                println!("{}\t{}\t{}", year.id, year.label, year.state.as_str());
            }
        }
    }
    Ok(())
}

fn execute_level(workspace: &Workspace, command: LevelCommand) -> Result<()> {
    let conn = workspace.store().open()?;
    match command {
        LevelCommand::Add { label } => {
            admin::add_level(&conn, &label)?;
        }
        LevelCommand::Disable { label } => admin::set_level_active(&conn, &label, false)?,
        LevelCommand::Enable { label } => admin::set_level_active(&conn, &label, true)?,
        LevelCommand::List => {
            for level in admin::list_levels(&conn)? {
                let state = if level.active { "active" } else { "inactive" };
                println!("{}\t{}\t{state}", level.id, level.label);
            }
        }
    }
    Ok(())
}

fn execute_class(workspace: &Workspace, command: ClassCommand) -> Result<()> {
    let conn = workspace.store().open()?;
    match command {
        ClassCommand::Add {
            level,
            label,
            headcount,
        } => {
            admin::add_class(&conn, &level, &label, headcount)?;
        }
        ClassCommand::List { level } => {
            for class in admin::list_classes(&conn, &level)? {
                println!("{}\t{}\t{}", class.id, class.label, class.headcount);
            }
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Import grading workbooks into the school database and central ledger."
)]
struct Cli {
    /// Optional JSON settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the database and the ledger workbook.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Raise log verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and seed the database.
    Init,
    /// Import a grading workbook for one class and term.
    Import(ImportArgs),
    /// Delete a student from both stores.
    DeleteStudent(DeleteStudentArgs),
    /// Delete the students of an imported workbook from both stores.
    DeleteImport(ImportArgs),
    /// Delete a class and its students from both stores.
    DeleteClass(ScopeArgs),
    /// Delete a level and all of its classes from both stores.
    DeleteLevel(LevelTermArgs),
    /// Rebuild the ledger rows of a scope from the database.
    Reconcile(ScopeArgs),
    /// List imported scopes recorded in the ledger.
    History,
    /// Delete every grade and average of a term for a school year.
    PurgeTerm(PurgeArgs),
    /// Write the normalized sheets of a grading workbook to a new workbook.
    Export(ExportArgs),
    /// Copy the database to a timestamped backup file.
    Backup,
    /// Replace the database with a backup, or list backups when none is given.
    Restore(RestoreArgs),
    /// Remove the database after a safety copy; the next run recreates it.
    Reset(ResetArgs),
    /// Manage school years.
    #[command(subcommand)]
    SchoolYear(SchoolYearCommand),
    /// Manage levels.
    #[command(subcommand)]
    Level(LevelCommand),
    /// Manage classes.
    #[command(subcommand)]
    Class(ClassCommand),
}

#[derive(clap::Args)]
struct ScopeArgs {
    #[arg(long)]
    level: String,

    #[arg(long)]
    class: String,

    /// 1 or 2.
    #[arg(long)]
    term: u8,
}

impl ScopeArgs {
    fn resolve(&self) -> Result<Scope> {
        Ok(Scope::new(
            self.level.trim(),
            self.class.trim(),
            Term::try_from(self.term)?,
        ))
    }
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Workbook exported by the grading platform.
    #[arg(long)]
    input: PathBuf,

    #[command(flatten)]
    scope: ScopeArgs,
}

#[derive(clap::Args)]
struct DeleteStudentArgs {
    #[arg(long)]
    student_id: String,

    #[command(flatten)]
    scope: ScopeArgs,
}

#[derive(clap::Args)]
struct LevelTermArgs {
    #[arg(long)]
    level: String,

    #[arg(long)]
    term: u8,
}

#[derive(clap::Args)]
struct PurgeArgs {
    #[arg(long)]
    term: u8,

    #[arg(long)]
    school_year: String,
}

#[derive(clap::Args)]
struct ExportArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct RestoreArgs {
    /// Backup file name (looked up in the backups directory) or path.
    backup: Option<PathBuf>,
}

#[derive(clap::Args)]
struct ResetArgs {
    /// Must be CONFIRMER.
    #[arg(long)]
    confirm: Option<String>,
}

#[derive(Subcommand)]
enum SchoolYearCommand {
    Add {
        label: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Make one year active and every other inactive.
    Activate { id: i64 },
    List,
}

#[derive(Subcommand)]
enum LevelCommand {
    Add { label: String },
    Enable { label: String },
    Disable { label: String },
    List,
}

#[derive(Subcommand)]
enum ClassCommand {
    Add {
        level: String,
        label: String,
        #[arg(long, default_value_t = 0)]
        headcount: i64,
    },
    List { level: String },
}
