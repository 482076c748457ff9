// tests/classifier_props.rs

use proptest::prelude::*;

use devloop::config::WatchSection;
use devloop::types::ChangeKind;
use devloop::watch::PathClassifier;

fn classifier() -> PathClassifier {
    PathClassifier::from_config(&WatchSection::default()).unwrap()
}

fn segment() -> impl Strategy<Value = String> {
    // Plain lowercase names can never collide with the special segments.
    "[a-l]{1,8}"
}

fn dirs() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(segment(), 0..4)
}

/// Directory names including the ones that steer classification.
fn any_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => segment(),
        1 => Just("migrations".to_string()),
        1 => Just("seed".to_string()),
        1 => Just("graph".to_string()),
    ]
}

fn any_dirs() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(any_segment(), 0..4)
}

fn any_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,12}"
}

fn ext() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("go"),
        Just("sql"),
        Just("graphql"),
        Just("txt"),
        Just("md"),
        Just("json"),
    ]
}

fn join(dirs: &[String], file: &str) -> String {
    let mut parts: Vec<&str> = dirs.iter().map(String::as_str).collect();
    parts.push(file);
    parts.join("/")
}

proptest! {
    #[test]
    fn generated_prefix_always_wins(dirs in dirs(), stem in segment(), ext in ext()) {
        let path = join(&dirs, &format!("zz_generated_{stem}.{ext}"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::GeneratedArtifact);
    }

    #[test]
    fn generated_prefix_wins_in_any_directory(
        dirs in any_dirs(),
        prefix in prop_oneof![Just("zz_generated"), Just("generated")],
        name in any_name(),
        ext in ext(),
    ) {
        let path = join(&dirs, &format!("{prefix}{name}.{ext}"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::GeneratedArtifact);
    }

    #[test]
    fn anything_under_models_is_generated(dirs in any_dirs(), name in any_name(), ext in ext()) {
        let mut all = vec!["models".to_string()];
        all.extend(dirs);
        let path = join(&all, &format!("{name}.{ext}"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::GeneratedArtifact);
    }

    #[test]
    fn anything_under_a_generated_dir_is_generated(
        before in any_dirs(),
        after in any_dirs(),
        name in any_name(),
        ext in ext(),
    ) {
        let mut all = before;
        all.push("generated".to_string());
        all.extend(after);
        let path = join(&all, &format!("{name}.{ext}"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::GeneratedArtifact);
    }

    #[test]
    fn anything_under_migrations_is_a_migration(
        before in dirs(),
        after in dirs(),
        stem in segment(),
        ext in ext(),
    ) {
        let mut all = before.clone();
        all.push("migrations".to_string());
        all.extend(after);
        let path = join(&all, &format!("{stem}.{ext}"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::MigrationSource);
    }

    #[test]
    fn sql_outside_migrations_is_schema(dirs in dirs(), stem in segment()) {
        let path = join(&dirs, &format!("{stem}.sql"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::SchemaDefinition);
    }

    #[test]
    fn go_files_outside_special_dirs_are_server_source(dirs in dirs(), stem in segment()) {
        let path = join(&dirs, &format!("{stem}.go"));
        prop_assert_eq!(classifier().classify(&path), ChangeKind::ServerSource);
    }

    #[test]
    fn separators_do_not_matter(dirs in dirs(), stem in segment(), ext in ext()) {
        let c = classifier();
        let forward = join(&dirs, &format!("{stem}.{ext}"));
        let backward = forward.replace('/', "\\");
        prop_assert_eq!(c.classify(&forward), c.classify(&backward));
    }

    #[test]
    fn classification_is_deterministic(path in "[a-z_./]{0,40}") {
        let c = classifier();
        prop_assert_eq!(c.classify(&path), c.classify(&path));
    }
}
