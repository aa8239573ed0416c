//! Command-line parsing tests.

use clap::Parser;
use quire::cli::commands::checkpoint::CheckpointCommands;
use quire::cli::commands::gate::GateCommands;
use quire::cli::commands::hook::HookCommands;
use quire::cli::commands::score::ScoreCommands;
use quire::cli::{Cli, Commands};
use quire::{HookEventType, Severity};

#[test]
fn test_hook_record_parses_event_type() {
    let cli = Cli::try_parse_from([
        "quire", "hook", "record", "hedging", "false-positive", "--context", "draft.md#p2", "--run", "run-3",
    ])
    .unwrap();
    match cli.command {
        Commands::Hook(args) => match args.command {
            HookCommands::Record {
                hook_id,
                event_type,
                context,
                run,
                at,
            } => {
                assert_eq!(hook_id, "hedging");
                assert_eq!(event_type, HookEventType::FalsePositive);
                assert_eq!(context, "draft.md#p2");
                assert_eq!(run.as_deref(), Some("run-3"));
                assert!(at.is_none());
            }
            HookCommands::Stats { .. } => panic!("expected record"),
        },
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_unknown_event_type_is_rejected() {
    assert!(Cli::try_parse_from(["quire", "hook", "record", "hedging", "maybe"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["quire", "score", "aggregate", "2", "--run", "r1", "--json"]).unwrap();
    assert!(cli.json);
    match cli.command {
        Commands::Score(args) => {
            assert_eq!(args.run.as_deref(), Some("r1"));
            assert!(matches!(args.command, ScoreCommands::Aggregate { round: 2 }));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_gate_check_flags() {
    let cli = Cli::try_parse_from(["quire", "gate", "check", "5", "--summary", "summary.json", "--advance"]).unwrap();
    let Commands::Gate(args) = cli.command else {
        panic!("expected gate");
    };
    let GateCommands::Check {
        phase,
        summary,
        round,
        advance,
        ..
    } = args.command;
    assert_eq!(phase, 5);
    assert_eq!(summary.unwrap().to_str(), Some("summary.json"));
    assert_eq!(round, None);
    assert!(advance);
}

#[test]
fn test_checkpoint_issue_severity() {
    let cli = Cli::try_parse_from([
        "quire", "checkpoint", "issue", "5", "I-7", "claim lacks a source", "--severity", "critical",
    ])
    .unwrap();
    let Commands::Checkpoint(args) = cli.command else {
        panic!("expected checkpoint");
    };
    match args.command {
        CheckpointCommands::Issue { phase, severity, .. } => {
            assert_eq!(phase, 5);
            assert_eq!(severity, Severity::Critical);
        }
        other => panic!("unexpected subcommand: {other:?}"),
    }
}

#[test]
fn test_confirm_requires_uuid() {
    assert!(Cli::try_parse_from(["quire", "confirm", "not-a-uuid"]).is_err());
    let cli = Cli::try_parse_from([
        "quire",
        "confirm",
        "6f1c2a0e-3b7d-4c55-9a51-2f8e0d4b7c11",
        "--decline",
    ])
    .unwrap();
    let Commands::Confirm(args) = cli.command else {
        panic!("expected confirm");
    };
    assert!(args.decline);
    assert!(args.run.is_none());
}

#[test]
fn test_verify_accepts_run_dirs() {
    let cli = Cli::try_parse_from(["quire", "verify", ".quire/runs/a", ".quire/runs/b"]).unwrap();
    let Commands::Verify(args) = cli.command else {
        panic!("expected verify");
    };
    assert_eq!(args.run_dirs.len(), 2);
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
