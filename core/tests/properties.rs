//! Property-based tests for naming and resolution.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use cmdpipe_core::{
    ArgumentDecl, CommandDecl, CommandModel, ModelOptions, NameCase, ValueType, edit_distance,
    suggest,
};

/// Strategy for identifier-like declared names.
fn declared_name() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,16}"
}

fn tree() -> CommandModel {
    let decl = CommandDecl::new("app")
        .with_argument(ArgumentDecl::option("verbose", ValueType::Bool).inherited())
        .with_subcommand(
            CommandDecl::new("remote")
                .with_subcommand(CommandDecl::new("add"))
                .with_subcommand(CommandDecl::new("remove"))
                .with_subcommand(CommandDecl::new("rename")),
        )
        .with_subcommand(CommandDecl::new("status"))
        .with_subcommand(CommandDecl::new("stash"));
    CommandModel::build(&decl, &ModelOptions::default()).unwrap()
}

fn token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("remote".to_string()),
        Just("add".to_string()),
        Just("status".to_string()),
        Just("--verbose".to_string()),
        "[a-z]{1,8}",
    ]
}

proptest! {
    #[test]
    fn name_case_is_idempotent(name in declared_name()) {
        for case in NameCase::ALL {
            let once = case.apply(&name);
            prop_assert_eq!(case.apply(&once), once);
        }
    }

    #[test]
    fn resolution_is_deterministic(tokens in prop::collection::vec(token(), 0..5)) {
        let model = tree();
        let first = model.resolve(&tokens[..], 2);
        let second = model.resolve(&tokens[..], 2);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn edit_distance_is_symmetric(a in "[a-z]{0,10}", b in "[a-z]{0,10}") {
        prop_assert_eq!(edit_distance(&a, &b), edit_distance(&b, &a));
    }

    #[test]
    fn suggestions_respect_threshold(input in "[a-z]{1,8}") {
        for found in suggest(&input, ["status", "stash", "remote"], 2) {
            prop_assert!(found.distance <= 2);
        }
    }
}

#[test]
fn test_not_found_lists_nearest_sibling() {
    let model = tree();
    let err = model.resolve(&["remote", "renam"], 2).unwrap_err();

    assert_eq!(err.available, vec!["add", "remove", "rename"]);
    assert_eq!(err.suggestions[0].name, "rename");
    assert_eq!(err.suggestions[0].distance, 1);
}

#[test]
fn test_group_without_default_action_resolves_but_is_not_invocable() {
    let model = tree();
    let resolved = model.resolve(&["remote"], 2).unwrap();
    let node = model.node(resolved.node);

    assert!(!node.is_invocable());
    let err = model.not_found(node.id, None, 2);
    assert_eq!(err.to_string(), "'remote' requires a subcommand");
    assert!(err.suggestions.is_empty());
}
