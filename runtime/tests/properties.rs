//! Property-based tests for the invocation pipeline.
//!
//! Arbitrary argument vectors must never panic the runner, must map to a
//! known exit code, and must produce identical results when replayed.

use std::sync::Arc;

use proptest::prelude::*;

use cmdpipe_core::{ArgumentDecl, Arity, CommandDecl, ValueType};
use cmdpipe_runtime::{
    BufferConsole, CommandContext, ExitCode, InvocationRunner, Result, exit_code, tokenize,
};

fn decl() -> CommandDecl {
    CommandDecl::new("app")
        .with_argument(
            ArgumentDecl::option("verbose", ValueType::Bool)
                .with_short('v')
                .inherited(),
        )
        .with_subcommand(
            CommandDecl::new("build")
                .with_argument(ArgumentDecl::option("jobs", ValueType::Integer).with_short('j'))
                .with_argument(
                    ArgumentDecl::option("profile", ValueType::Enum(vec![
                        "debug".into(),
                        "release".into(),
                    ]))
                    .with_default("debug"),
                )
                .with_argument(ArgumentDecl::operand("targets", ValueType::String).with_arity(Arity::List)),
        )
        .with_subcommand(CommandDecl::new("clean"))
}

fn echo(ctx: &mut CommandContext) -> Result<ExitCode> {
    let json = ctx.values().to_json().to_string();
    ctx.write(&json);
    Ok(exit_code::SUCCESS)
}

/// Runs `args` on a fresh runner and returns (code, stdout, stderr).
fn run(args: &[String]) -> (ExitCode, String, String) {
    let console = Arc::new(BufferConsole::new());
    let runner = InvocationRunner::builder(decl())
        .console(console.clone())
        .fallback_handler(echo)
        .build()
        .unwrap();
    let code = runner.run(args.iter().cloned());
    (code, console.output(), console.errors())
}

fn word() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("build".to_string()),
        Just("clean".to_string()),
        Just("--jobs".to_string()),
        Just("-j".to_string()),
        Just("-v".to_string()),
        Just("--profile".to_string()),
        Just("release".to_string()),
        Just("--".to_string()),
        Just("[parse]".to_string()),
        "[0-9]{1,3}",
        "[a-z-]{1,8}",
    ]
}

proptest! {
    #[test]
    fn runs_are_deterministic(args in prop::collection::vec(word(), 0..8)) {
        let first = run(&args);
        let second = run(&args);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn exit_codes_are_known(args in prop::collection::vec(word(), 0..8)) {
        let (code, _, _) = run(&args);
        let known = [
            exit_code::SUCCESS,
            exit_code::PARSE_ERROR,
            exit_code::VALIDATION_ERROR,
            exit_code::COMMAND_NOT_FOUND,
        ];
        prop_assert!(known.contains(&code), "unexpected exit code {code} for {args:?}");
    }

    #[test]
    fn tokenize_preserves_words(args in prop::collection::vec(word(), 0..8)) {
        let stream = tokenize(&args, false);
        prop_assert_eq!(stream.argument_words(), args);
    }
}
