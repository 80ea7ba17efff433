mod common;

use common::{count, settings, workspace};
use lcams_tools::ToolError;
use lcams_tools::model::{Establishment, YearState};
use lcams_tools::store::admin;
use lcams_tools::sync::Workspace;
use tempfile::tempdir;

#[test]
fn initialisation_is_idempotent() {
    let dir = tempdir().expect("temporary directory");
    let first = workspace(&dir);
    let second = Workspace::open(settings(&dir)).expect("reopened");

    assert_eq!(first.store().path(), second.store().path());
    assert_eq!(count(&second, "SELECT COUNT(*) FROM levels"), 2);
    assert_eq!(count(&second, "SELECT COUNT(*) FROM school_years"), 1);
    assert_eq!(
        count(&second, "SELECT COUNT(*) FROM school_years WHERE state = 'active'"),
        1
    );
}

#[test]
fn seeding_skips_tables_that_already_hold_data() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    {
        let conn = workspace.store().open().expect("store opened");
        admin::add_level(&conn, "4th").expect("level added");
    }
    let mut reseeded = settings(&dir);
    reseeded.default_levels = vec!["Seconde".to_string()];
    let reopened = Workspace::open(reseeded).expect("reopened");

    let conn = reopened.store().open().expect("store opened");
    let labels: Vec<String> = admin::list_levels(&conn)
        .expect("levels")
        .into_iter()
        .map(|level| level.label)
        .collect();
    assert_eq!(labels, ["6th", "5th", "4th"]);
}

#[test]
fn activating_a_year_deactivates_the_others() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let mut conn = workspace.store().open().expect("store opened");

    let next = admin::add_school_year(&conn, "2024-2025", Some("2024-09-01"), Some("2025-07-15"))
        .expect("year added");
    let later = admin::add_school_year(&conn, "2025-2026", None, None).expect("year added");
    admin::activate_school_year(&mut conn, next).expect("activated");
    admin::activate_school_year(&mut conn, later).expect("activated");

    let years = admin::list_school_years(&conn).expect("years");
    let active: Vec<&str> = years
        .iter()
        .filter(|year| year.state == YearState::Active)
        .map(|year| year.label.as_str())
        .collect();
    assert_eq!(active, ["2025-2026"]);
    assert_eq!(
        admin::active_school_year_label(&conn).expect("active label"),
        "2025-2026"
    );
}

#[test]
fn activating_an_unknown_year_changes_nothing() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let mut conn = workspace.store().open().expect("store opened");

    let error = admin::activate_school_year(&mut conn, 999).expect_err("unknown year");

    assert!(matches!(error, ToolError::UnknownSchoolYear(999)));
    let active = admin::active_school_year(&conn)
        .expect("query")
        .expect("seeded year still active");
    assert_eq!(active.label, "2023-2024");
}

#[test]
fn classes_need_a_known_level() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let conn = workspace.store().open().expect("store opened");

    admin::add_class(&conn, "6th", "A", 32).expect("class added");
    let error = admin::add_class(&conn, "CM2", "A", 20).expect_err("unknown level");

    assert!(matches!(error, ToolError::UnknownLevel(_)));
    let classes = admin::list_classes(&conn, "6th").expect("classes");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].headcount, 32);
}

#[test]
fn levels_can_be_disabled() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let conn = workspace.store().open().expect("store opened");

    admin::set_level_active(&conn, "5th", false).expect("disabled");
    let levels = admin::list_levels(&conn).expect("levels");
    assert!(levels.iter().any(|level| level.label == "5th" && !level.active));
    assert!(matches!(
        admin::set_level_active(&conn, "CM2", true),
        Err(ToolError::UnknownLevel(_))
    ));
}

#[test]
fn disciplines_keep_exact_labels_and_accept_updates() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let conn = workspace.store().open().expect("store opened");

    let group = admin::resolve_or_create_discipline(&conn, "Sciences").expect("group");
    let physics = admin::resolve_or_create_discipline(&conn, "Physique").expect("physics");
    let spaced = admin::resolve_or_create_discipline(&conn, "Physique ").expect("spaced");
    assert_ne!(physics, spaced);
    assert_eq!(
        admin::resolve_or_create_discipline(&conn, "Physique").expect("existing"),
        physics
    );

    assert!(admin::update_discipline(&conn, physics, 3.0, "science", Some(group)).expect("updated"));
    assert!(!admin::update_discipline(&conn, 999, 1.0, "main", None).expect("no such row"));

    let stored = admin::list_disciplines(&conn)
        .expect("disciplines")
        .into_iter()
        .find(|discipline| discipline.id == physics)
        .expect("physics listed");
    assert_eq!(stored.coefficient, 3.0);
    assert_eq!(stored.parent_id, Some(group));
}

#[test]
fn establishment_profile_round_trips() {
    let dir = tempdir().expect("temporary directory");
    let workspace = workspace(&dir);
    let conn = workspace.store().open().expect("store opened");

    assert_eq!(admin::establishment(&conn).expect("default"), Establishment::default());

    let profile = Establishment {
        name: "Lycée de Thiès".into(),
        address: "BP 12".into(),
        phone: "33 951 00 00".into(),
        academy_inspection: "IA Thiès".into(),
        education_inspection: "IEF Thiès".into(),
    };
    admin::save_establishment(&conn, &profile).expect("saved");
    admin::save_establishment(&conn, &profile).expect("saved twice");

    assert_eq!(admin::establishment(&conn).expect("loaded"), profile);
    assert_eq!(count(&workspace, "SELECT COUNT(*) FROM configuration"), 1);
}
