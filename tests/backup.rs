mod common;

use std::fs;

use common::{GradingWorkbook, count, scope, settings, workspace};
use lcams_tools::ToolError;
use lcams_tools::model::Term;
use lcams_tools::store::backup::{PRE_RESET_PREFIX, PRE_RESTORE_PREFIX};
use lcams_tools::sync::Workspace;
use tempfile::tempdir;

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .expect("utf-8 file name")
        .to_string()
}

#[test]
fn backups_are_listed_newest_first() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);

    let first = workspace.backup_store().expect("first backup");
    let second = workspace.backup_store().expect("second backup");

    assert_ne!(first, second);
    assert!(file_name(&first).starts_with("lcams_backup_"));
    assert!(file_name(&first).ends_with(".db"));
    assert_eq!(first.parent(), Some(workspace.settings().backups_dir().as_path()));
    assert_eq!(workspace.list_backups().expect("listed"), vec![second, first]);
}

#[test]
fn restore_brings_back_the_backed_up_database() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let input = GradingWorkbook::scenario().write(&dir.path().join("6A.xlsx"));
    let scope = scope("A", Term::First);
    workspace.import_term(&input, &scope).expect("import");
    let saved = workspace.backup_store().expect("backup");

    workspace.delete_class(&scope).expect("class deleted");
    assert_eq!(count(&workspace, "SELECT COUNT(*) FROM students"), 0);

    let name = saved.file_name().expect("backup name");
    let safety = workspace
        .restore_store(std::path::Path::new(name))
        .expect("restored")
        .expect("safety copy taken");

    assert!(file_name(&safety).starts_with(PRE_RESTORE_PREFIX));
    assert_eq!(count(&workspace, "SELECT COUNT(*) FROM students"), 2);
    assert_eq!(count(&workspace, "SELECT COUNT(*) FROM term_averages_s1"), 2);
    assert_eq!(workspace.list_backups().expect("listed"), vec![saved]);
}

#[test]
fn restoring_a_missing_backup_leaves_the_database_alone() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let before = fs::read(workspace.store().path()).expect("database bytes");

    let error = workspace
        .restore_store(std::path::Path::new("lcams_backup_19990101_000000.db"))
        .expect_err("missing backup");

    assert!(matches!(error, ToolError::MissingInput(_)));
    assert_eq!(fs::read(workspace.store().path()).expect("database bytes"), before);
    assert!(!workspace.settings().backups_dir().exists());
}

#[test]
fn reset_keeps_a_copy_and_the_next_open_starts_empty() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let input = GradingWorkbook::scenario().write(&dir.path().join("6A.xlsx"));
    workspace
        .import_term(&input, &scope("A", Term::First))
        .expect("import");

    let safety = workspace
        .reset_store()
        .expect("reset")
        .expect("safety copy taken");

    assert!(file_name(&safety).starts_with(PRE_RESET_PREFIX));
    assert!(!workspace.store().path().exists());
    assert!(workspace.list_backups().expect("listed").is_empty());

    let reopened = Workspace::open(settings(&dir)).expect("reopened");
    assert_eq!(count(&reopened, "SELECT COUNT(*) FROM students"), 0);
    assert_eq!(count(&reopened, "SELECT COUNT(*) FROM levels"), 2);

    reopened
        .restore_store(&safety)
        .expect("reset undone");
    assert_eq!(count(&reopened, "SELECT COUNT(*) FROM students"), 2);
}
