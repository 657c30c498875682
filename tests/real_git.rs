//! Walkthroughs against the real git binary. Skipped when git is not installed.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use chrono::Utc;
use git_raid::content::{load_game, load_rooms};
use git_raid::exec::{quote_arg, SystemExecutor, TempSandboxAllocator};
use git_raid::{EngineConfig, Game, GameEngine, Player, SessionState};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn engine(game: Game, root: &Path) -> GameEngine {
    let config = EngineConfig::default();
    GameEngine::new(
        game,
        Arc::new(SystemExecutor::from_config(&config)),
        Arc::new(TempSandboxAllocator::in_dir(root)),
        &config,
    )
}

fn rooms_dir() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("rooms")
}

fn run(engine: &mut GameEngine, line: &str) -> git_raid::CommandResult {
    let result = engine.process(line);
    eprintln!("> {line}\n{}\n", result.message);
    result
}

fn write(engine: &GameEngine, relative: &str, contents: &str) {
    let sandbox = engine.sandbox().expect("sandbox").primary();
    std::fs::write(sandbox.join(relative), contents).expect("write sandbox file");
}

#[test]
fn east_route_through_the_gauntlet() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let root = tempfile::tempdir().expect("tempdir");
    let game = load_game(&rooms_dir(), Player::new("tester", Utc::now())).expect("rooms");
    let mut engine = engine(game, root.path());
    engine.start();

    // Vault
    assert!(run(&mut engine, "git init").message.contains("Challenge complete!"));
    assert!(run(&mut engine, "forward").success);

    // Scroll room: the sandbox is kept for the forge
    assert!(run(&mut engine, "answer 2").success);
    assert!(run(&mut engine, "forward").success);

    // Forge
    write(&engine, "README.md", "# Raid log\n");
    run(&mut engine, "git add README.md");
    let first = run(&mut engine, "git commit -m \"Start the raid log\"");
    assert!(first.message.contains("4/5 checks passed"), "{}", first.message);
    write(&engine, "README.md", "# Raid log\n\nVault opened.\n");
    let second = run(&mut engine, "git commit -am \"Record the vault\"");
    assert!(second.message.contains("Challenge complete!"), "{}", second.message);
    assert!(run(&mut engine, "forward").success);

    // Crossroads
    run(&mut engine, "git checkout -b explore");
    write(&engine, "torch.txt", "lit\n");
    run(&mut engine, "git add torch.txt");
    let lit = run(&mut engine, "git commit -m \"Light the torch\"");
    assert!(lit.message.contains("Challenge complete!"), "{}", lit.message);
    let east = run(&mut engine, "east");
    assert!(east.success, "{}", east.message);

    // Gauntlet
    let stashed = run(&mut engine, "git stash");
    assert!(stashed.success, "{}", stashed.message);
    let conflict = run(&mut engine, "git cherry-pick hotfix");
    assert!(!conflict.success);
    assert!(conflict.message.contains("no file is left in conflict"), "{}", conflict.message);
    write(&engine, "README.md", "gate: open\n");
    run(&mut engine, "git add README.md");
    run(&mut engine, "git commit --no-edit");
    let tagged = run(&mut engine, "git tag v1.0");
    assert!(tagged.message.contains("Challenge complete!"), "{}", tagged.message);

    assert!(run(&mut engine, "forward").success);
    assert!(engine.game().is_completed());
    assert_eq!(engine.state(), SessionState::Completed);
}

#[test]
fn harbor_push_reaches_origin() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let root = tempfile::tempdir().expect("tempdir");
    let rooms: Vec<_> = load_rooms(&rooms_dir())
        .expect("rooms")
        .into_iter()
        .filter(|room| ["harbor", "hall"].contains(&room.id().as_str()))
        .map(|room| if room.id().as_str() == "harbor" { room.start() } else { room })
        .collect();
    let game = Game::new(Player::new("tester", Utc::now()), rooms).expect("graph");
    let mut engine = engine(game, root.path());
    let intro = engine.start();
    assert!(intro.success, "{}", intro.message);

    let origin = engine
        .sandbox()
        .and_then(|paths| paths.auxiliary("origin"))
        .expect("origin sandbox")
        .display()
        .to_string();
    let early = run(&mut engine, "git push origin main");
    assert!(!early.success);

    let added = run(&mut engine, &format!("git remote add origin {}", quote_arg(&origin)));
    assert!(added.message.contains("1/3"), "{}", added.message);
    let pushed = run(&mut engine, "git push origin main");
    assert!(pushed.message.contains("Challenge complete!"), "{}", pushed.message);
    assert!(run(&mut engine, "forward").success);
    assert!(engine.game().is_completed());
}
