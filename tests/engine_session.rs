//! Whole-session tests: the engine driven line by line over a scripted git.

use std::sync::Arc;

use git_raid::challenge::{Challenge, RepositoryChallenge, Rule, SetupStep};
use git_raid::domain::{ChallengeId, Game, RoomId};
use git_raid::exec::CommandOutcome;
use git_raid::test_support::{
    end_room, fake_engine, init_room, new_game, quiz_room, three_rooms, FakeGit, RecordingAllocator,
};
use git_raid::{EngineConfig, GameEngine, ResultType, Room, SessionSnapshot, SessionState};

#[test]
fn init_then_move_forward() {
    let (mut engine, git, _allocator) = fake_engine(three_rooms());

    let intro = engine.start();
    assert_eq!(intro.kind, ResultType::Look);
    assert!(intro.message.contains("vault room"));
    assert_eq!(engine.state(), SessionState::Active);

    let blocked = engine.process("forward");
    assert_eq!(blocked.kind, ResultType::Movement);
    assert!(!blocked.success);
    assert_eq!(engine.game().current_room_id().as_str(), "vault");
    assert_eq!(engine.game().player().move_count(), 0);

    let init = engine.process("git init");
    assert_eq!(init.kind, ResultType::Command);
    assert!(init.success, "{init:?}");
    assert!(init.message.contains("Challenge complete!"));
    assert_eq!(git.commands().first().map(String::as_str), Some("git init"));

    let moved = engine.process("go forward");
    assert_eq!(moved.kind, ResultType::Movement);
    assert!(moved.success, "{moved:?}");
    assert_eq!(engine.game().current_room_id().as_str(), "scroll");
    assert_eq!(engine.game().player().move_count(), 1);
    assert!(engine
        .game()
        .player()
        .has_completed_room(&RoomId::from("vault")));
}

#[test]
fn blocked_moves_change_nothing() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    let before = engine.game().player().clone();

    for _ in 0..3 {
        let result = engine.process("forward");
        assert!(!result.success);
    }
    let result = engine.process("go sideways");
    assert_eq!(result.kind, ResultType::Movement);
    assert!(!result.success);

    assert_eq!(engine.game().player(), &before);
    assert_eq!(engine.game().current_room_id().as_str(), "vault");
}

#[test]
fn quiz_answers_are_one_based() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    engine.process("git init");
    engine.process("forward");

    let wrong = engine.process("answer 1");
    assert_eq!(wrong.kind, ResultType::Answer);
    assert!(!wrong.success);
    assert_eq!(wrong.hint.as_deref(), Some("It makes a commit."));

    let out_of_range = engine.process("answer 9");
    assert!(!out_of_range.success);
    assert!(out_of_range.message.contains("choose between 1 and 3"));

    let not_a_number = engine.process("answer two");
    assert!(!not_a_number.success);

    let right = engine.process("a 2");
    assert!(right.success, "{right:?}");
    assert!(engine
        .game()
        .player()
        .has_completed_challenge(&ChallengeId::from("scroll-quiz")));

    let again = engine.process("answer 1");
    assert!(again.success);
    assert!(again.message.contains("already answered"));
}

#[test]
fn reaching_the_end_completes_the_session() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    engine.process("git init");
    engine.process("forward");
    engine.process("answer 2");

    let last = engine.process("forward");
    assert!(last.success);
    assert!(last.message.contains("cleared the dungeon"));
    assert!(engine.game().is_completed());
    assert_eq!(engine.state(), SessionState::Completed);
    assert_eq!(engine.game().player().completed_rooms().len(), 3);

    let ended = engine.process("git status");
    assert_eq!(ended.kind, ResultType::SessionEnded);
    assert!(engine.process("status").success);
    assert_eq!(engine.process("look").kind, ResultType::Look);

    let exit = engine.process("exit");
    assert_eq!(exit.kind, ResultType::Exit);
    assert_eq!(engine.state(), SessionState::Exited { completed: true });
    assert_eq!(engine.process("exit").kind, ResultType::SessionEnded);
}

#[test]
fn exit_ends_an_unfinished_session() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();

    let exit = engine.process("quit");
    assert_eq!(exit.kind, ResultType::Exit);
    assert_eq!(engine.state(), SessionState::Exited { completed: false });

    let ended = engine.process("git init");
    assert_eq!(ended.kind, ResultType::SessionEnded);
    assert_eq!(engine.process("forward").kind, ResultType::SessionEnded);
    assert_eq!(engine.process("help").kind, ResultType::Help);
}

#[test]
fn answer_outside_a_quiz_is_unknown() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    let result = engine.process("answer 1");
    assert_eq!(result.kind, ResultType::Unknown);
    assert!(!result.success);
}

#[test]
fn unknown_input_is_reported_not_run() {
    let (mut engine, git, _allocator) = fake_engine(three_rooms());
    engine.start();
    let result = engine.process("rm -rf /");
    assert_eq!(result.kind, ResultType::Unknown);
    assert!(git.commands().is_empty());
}

#[test]
fn hint_follows_the_last_validation() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();

    let before = engine.process("hint");
    assert_eq!(before.kind, ResultType::Hint);
    assert!(before.message.contains("No hint available"));

    let status = engine.process("git status");
    assert!(!status.success);
    assert_eq!(status.hint.as_deref(), Some("Try `git init`."));
    assert_eq!(engine.process("hint").message, "Try `git init`.");
}

#[test]
fn files_checklist_lists_every_missing_file() {
    let names: Vec<String> = (1..=11).map(|i| format!("scroll_{i:02}.txt")).collect();
    let mut repo = RepositoryChallenge::new();
    for name in &names {
        repo = repo.with_rule(Rule::FilesExist {
            paths: vec![name.clone()],
        });
    }
    let rooms = vec![
        Room::new("library", "Library")
            .with_challenge(Challenge::repository("collect", "Collect the scrolls.", repo))
            .with_exit("forward", "hall")
            .start(),
        end_room("hall"),
    ];
    let (mut engine, _git, _allocator) = fake_engine(rooms);
    engine.start();

    let sandbox = engine.sandbox().expect("sandbox").primary().to_path_buf();
    for name in &names[..3] {
        std::fs::write(sandbox.join(name), "scroll").expect("write");
    }

    let result = engine.process("git status");
    assert!(result.message.contains("3/11 checks passed"), "{}", result.message);
    let unmet: Vec<&str> = result
        .message
        .lines()
        .filter(|line| line.starts_with("  - "))
        .collect();
    assert_eq!(unmet.len(), 8);
    assert!(unmet.iter().all(|line| !line.contains("scroll_01.txt")));
    assert!(unmet.iter().any(|line| line.contains("scroll_11.txt")));
}

#[test]
fn validation_is_repeatable() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    let first = engine.process("git status");
    let second = engine.process("git status");
    assert_eq!(first, second);
    assert_eq!(engine.last_validation().map(|v| v.success), Some(false));
}

#[test]
fn missing_git_does_not_end_the_session() {
    let git = Arc::new(FakeGit::new().missing_git());
    let allocator = Arc::new(RecordingAllocator::new());
    let mut engine = GameEngine::new(
        new_game(three_rooms()),
        git,
        allocator,
        &EngineConfig::default(),
    );
    engine.start();

    let result = engine.process("git init");
    assert_eq!(result.kind, ResultType::Command);
    assert!(!result.success);
    assert!(result.message.contains("Environment error"), "{}", result.message);
    assert!(result.hint.is_some());

    assert_eq!(engine.state(), SessionState::Active);
    assert!(engine.process("look").success);
    assert!(!engine.process("forward").success);
}

#[test]
fn failed_setup_is_reported_on_entry() {
    let repo = RepositoryChallenge::new()
        .with_setup_step(SetupStep::Run {
            command: "git fetch origin".into(),
        })
        .with_rule(Rule::MinCommits { count: 1 });
    let rooms = vec![
        init_room("vault", "forge"),
        Room::new("forge", "Forge")
            .with_challenge(Challenge::repository("forge-commit", "Commit.", repo))
            .with_exit("forward", "hall"),
        end_room("hall"),
    ];
    let git = Arc::new(FakeGit::new().with_response(
        "git fetch origin",
        CommandOutcome::exited(
            "git fetch origin",
            Some(128),
            "",
            "fatal: 'origin' does not appear to be a git repository",
        ),
    ));
    let mut engine = GameEngine::new(
        new_game(rooms),
        git,
        Arc::new(RecordingAllocator::new()),
        &EngineConfig::default(),
    );
    engine.start();
    engine.process("git init");

    let moved = engine.process("forward");
    assert_eq!(moved.kind, ResultType::Movement);
    assert!(!moved.success);
    assert!(moved.message.contains("could not be prepared"), "{}", moved.message);
    assert_eq!(engine.game().current_room_id().as_str(), "forge");
    assert_eq!(engine.state(), SessionState::Active);
}

#[test]
fn failed_setup_is_retried_on_a_fresh_sandbox() {
    let repo = RepositoryChallenge::new()
        .with_setup_step(SetupStep::Run {
            command: "git fetch origin".into(),
        })
        .with_rule(Rule::MinCommits { count: 1 });
    let rooms = vec![
        init_room("vault", "forge"),
        Room::new("forge", "Forge")
            .with_challenge(Challenge::repository("forge-commit", "Commit.", repo))
            .with_exit("forward", "hall"),
        end_room("hall"),
    ];
    let git = Arc::new(FakeGit::new().with_response_once(
        "git fetch origin",
        CommandOutcome::exited("git fetch origin", Some(128), "", "fatal: unable to access origin"),
    ));
    let allocator = Arc::new(RecordingAllocator::new());
    let mut engine = GameEngine::new(
        new_game(rooms),
        git.clone(),
        allocator.clone(),
        &EngineConfig::default(),
    );
    engine.start();
    engine.process("git init");

    let moved = engine.process("forward");
    assert!(!moved.success);
    assert!(moved.message.contains("prepared again"), "{}", moved.message);
    let broken = engine.sandbox().expect("sandbox").primary().to_path_buf();

    let committed = engine.process("git commit -m first");
    assert!(committed.message.contains("Challenge complete!"), "{}", committed.message);
    assert_eq!(git.commit_count(), 1);
    let fetches = git.commands().iter().filter(|c| *c == "git fetch origin").count();
    assert_eq!(fetches, 2);
    assert_ne!(engine.sandbox().expect("sandbox").primary(), broken.as_path());
    assert!(allocator.cleaned().contains(&broken));
    assert!(engine.process("forward").success);
}

#[test]
fn setup_that_keeps_failing_does_not_run_the_command() {
    let repo = RepositoryChallenge::new()
        .with_setup_step(SetupStep::Run {
            command: "git fetch origin".into(),
        })
        .with_rule(Rule::MinCommits { count: 1 });
    let rooms = vec![
        Room::new("forge", "Forge")
            .with_challenge(Challenge::repository("forge-commit", "Commit.", repo))
            .with_exit("forward", "hall")
            .start(),
        end_room("hall"),
    ];
    let git = Arc::new(FakeGit::new().with_response(
        "git fetch origin",
        CommandOutcome::exited("git fetch origin", Some(128), "", "fatal: unable to access origin"),
    ));
    let mut engine = GameEngine::new(
        new_game(rooms),
        git.clone(),
        Arc::new(RecordingAllocator::new()),
        &EngineConfig::default(),
    );
    assert!(!engine.start().success);

    let result = engine.process("git commit -m first");
    assert_eq!(result.kind, ResultType::Command);
    assert!(!result.success);
    assert!(result.message.contains("was not run"), "{}", result.message);
    assert!(!git.commands().iter().any(|c| c.starts_with("git commit")));
    assert_eq!(git.commit_count(), 0);
    assert_eq!(engine.state(), SessionState::Active);
}

#[test]
fn panicking_setup_is_reported_on_entry() {
    let repo = RepositoryChallenge::new()
        .with_setup(|_| panic!("the floor gave way"))
        .with_rule(Rule::RepositoryInitialized);
    let rooms = vec![
        init_room("vault", "pit"),
        Room::new("pit", "Pit")
            .with_challenge(Challenge::repository("pit-trap", "Survive the pit.", repo))
            .with_exit("forward", "hall"),
        end_room("hall"),
    ];
    let (mut engine, _git, _allocator) = fake_engine(rooms);
    engine.start();
    engine.process("git init");

    let moved = engine.process("forward");
    assert_eq!(moved.kind, ResultType::Movement);
    assert!(!moved.success);
    assert!(moved.message.contains("the floor gave way"), "{}", moved.message);
    assert_eq!(engine.game().current_room_id().as_str(), "pit");
    assert_eq!(engine.state(), SessionState::Active);
    assert!(engine.process("look").success);
}

#[test]
fn program_name_is_normalized_before_running() {
    let (mut engine, git, _allocator) = fake_engine(three_rooms());
    engine.start();
    let result = engine.process("GIT init");
    assert!(result.message.contains("Challenge complete!"), "{}", result.message);
    assert_eq!(git.commands().first().map(String::as_str), Some("git init"));
}

#[test]
fn completed_rooms_are_not_set_up_again() {
    let repo = RepositoryChallenge::new()
        .with_setup_step(SetupStep::Run {
            command: "git init".into(),
        })
        .with_rule(Rule::MinCommits { count: 1 });
    let rooms = vec![
        Room::new("forge", "Forge")
            .with_challenge(Challenge::repository("forge-commit", "Commit once.", repo))
            .with_exit("forward", "scroll")
            .start(),
        quiz_room("scroll", "hall").with_exit("back", "forge"),
        end_room("hall"),
    ];
    let (mut engine, git, _allocator) = fake_engine(rooms);
    engine.start();
    assert!(engine.process("git commit -m first").success);
    assert!(engine.process("forward").success);
    assert!(engine.process("answer 2").success);
    assert!(engine.process("back").success);

    let inits = git.commands().iter().filter(|c| *c == "git init").count();
    assert_eq!(inits, 1);
    assert!(engine.game().current_challenge_satisfied());
    assert_eq!(engine.game().player().move_count(), 2);
}

#[test]
fn leaving_a_room_releases_its_sandbox() {
    let (mut engine, _git, allocator) = fake_engine(three_rooms());
    engine.start();
    let vault = engine.sandbox().expect("sandbox").primary().to_path_buf();
    engine.process("git init");
    engine.process("forward");

    assert_eq!(allocator.created().len(), 2);
    assert!(allocator.cleaned().contains(&vault));
    assert!(!vault.exists());

    drop(engine);
    assert!(allocator.live().is_empty());
}

#[test]
fn reused_sandbox_survives_the_move() {
    let rooms = vec![
        init_room("vault", "scroll"),
        quiz_room("scroll", "hall").with_sandbox_policy(git_raid::domain::SandboxPolicy::Reuse),
        end_room("hall"),
    ];
    let (mut engine, _git, allocator) = fake_engine(rooms);
    engine.start();
    let vault = engine.sandbox().expect("sandbox").primary().to_path_buf();
    engine.process("git init");
    engine.process("forward");

    assert_eq!(engine.sandbox().map(|s| s.primary().to_path_buf()), Some(vault.clone()));
    assert!(vault.is_dir());
    assert_eq!(allocator.created().len(), 1);
}

#[test]
fn snapshot_restores_progress() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    engine.process("git init");
    engine.process("forward");
    let snapshot = engine.snapshot();

    assert_eq!(snapshot.current_room_id.as_str(), "scroll");
    assert_eq!(snapshot.move_count, 1);

    let restored = Game::from_snapshot(&snapshot, three_rooms()).expect("restore");
    assert_eq!(restored.current_room_id().as_str(), "scroll");
    assert_eq!(restored.player().move_count(), 1);
    assert!(restored
        .player()
        .has_completed_challenge(&ChallengeId::from("vault-init")));
    assert!(!restored.is_completed());

    let json = serde_json::to_string(&snapshot).expect("json");
    let parsed: SessionSnapshot = serde_json::from_str(&json).expect("parse");
    assert_eq!(snapshot, parsed);
}

#[test]
fn progress_only_grows() {
    let (mut engine, _git, _allocator) = fake_engine(three_rooms());
    engine.start();
    let script = [
        "forward", "git init", "git status", "forward", "answer 3", "answer 2", "back", "forward",
    ];
    let mut rooms = 0;
    let mut challenges = 0;
    let mut moves = 0;
    for line in script {
        engine.process(line);
        let player = engine.game().player();
        assert!(player.completed_rooms().len() >= rooms, "after {line}");
        assert!(player.completed_challenges().len() >= challenges, "after {line}");
        assert!(player.move_count() >= moves, "after {line}");
        rooms = player.completed_rooms().len();
        challenges = player.completed_challenges().len();
        moves = player.move_count();
    }
    assert!(engine.game().is_completed());
}
