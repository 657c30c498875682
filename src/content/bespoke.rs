//! Named setup/validate callbacks for rooms that outgrow the rule list.
//!
//! Room files refer to these with `custom = "<name>"`. Each entry may supply
//! a setup callback, a validate callback, or both; the validate callback adds
//! its criteria to the same checklist as the room's declarative rules.

use std::sync::Arc;

use crate::challenge::{ChallengeContext, Checklist, SetupFn, ValidateFn};
use crate::error::EnvironmentError;

/// A registered pair of callbacks.
#[derive(Clone)]
pub struct Bespoke {
    pub setup: Option<SetupFn>,
    pub validate: Option<ValidateFn>,
}

impl std::fmt::Debug for Bespoke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bespoke")
            .field("setup", &self.setup.is_some())
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Every name [`lookup`] knows.
pub const NAMES: &[&str] = &["gauntlet", "remote_push"];

pub fn lookup(name: &str) -> Option<Bespoke> {
    match name {
        "gauntlet" => Some(Bespoke {
            setup: Some(Arc::new(gauntlet_setup)),
            validate: Some(Arc::new(gauntlet_validate)),
        }),
        "remote_push" => Some(Bespoke {
            setup: Some(Arc::new(remote_push_setup)),
            validate: Some(Arc::new(remote_push_validate)),
        }),
        _ => None,
    }
}

/// `main` and `hotfix` both edit README.md from the same base, and notes.txt
/// is left modified so nothing can be switched or picked until it is stashed.
fn gauntlet_setup(ctx: &ChallengeContext<'_>) -> Result<(), EnvironmentError> {
    ctx.run("git init")?;
    ctx.run("git symbolic-ref HEAD refs/heads/main")?;
    ctx.write_file("README.md", "gate: closed\n")?;
    ctx.write_file("notes.txt", "torches: 3\n")?;
    ctx.run("git add README.md notes.txt")?;
    ctx.run("git commit -m \"Build the gate\"")?;

    ctx.run("git checkout -b hotfix")?;
    ctx.write_file("README.md", "gate: open\n")?;
    ctx.run("git commit -am \"Fix the portcullis\"")?;

    ctx.run("git checkout main")?;
    ctx.write_file("README.md", "gate: sealed\n")?;
    ctx.run("git commit -am \"Seal the gate\"")?;

    ctx.write_file("notes.txt", "torches: 2\n")
}

fn gauntlet_validate(
    ctx: &ChallengeContext<'_>,
    list: &mut Checklist,
) -> Result<(), EnvironmentError> {
    let git = ctx.git();
    let stashes = git.stash_count()?;
    let subjects = git.log_subjects()?;
    let conflicted = git.has_conflicts()?;
    let in_progress = git.operation_in_progress();
    let readme = ctx.read_file("README.md").unwrap_or_default();
    let clean = git.is_clean()?;
    let branch = git.current_branch()?;
    let tagged = git.resolve("v1.0")?;
    let head = git.head_commit()?;

    list.check_with_hint(
        "your uncommitted notes are stashed",
        stashes >= 1,
        Some("`git stash` puts notes.txt aside.".to_string()),
    )
    .check_with_hint(
        "the portcullis fix from 'hotfix' is on main",
        subjects.iter().any(|s| s == "Fix the portcullis"),
        Some("`git cherry-pick hotfix` brings that one commit over.".to_string()),
    )
    .check_with_hint(
        "no file is left in conflict",
        !conflicted,
        Some("Edit README.md, then `git add README.md`.".to_string()),
    )
    .check_with_hint(
        "no cherry-pick, merge or rebase is half done",
        !in_progress,
        Some("Finish with `git cherry-pick --continue` or `git commit`.".to_string()),
    )
    .check(
        "README.md has no conflict markers",
        !readme.contains("<<<<<<<") && !readme.contains(">>>>>>>"),
    )
    .check("the working tree is clean", clean)
    .check_with_hint(
        "'main' is checked out",
        branch.as_deref() == Some("main"),
        Some("`git checkout main`".to_string()),
    )
    .check_with_hint(
        "tag 'v1.0' exists",
        tagged.is_some(),
        Some("`git tag v1.0` marks the release.".to_string()),
    )
    .check(
        "tag 'v1.0' points at the latest commit",
        tagged.is_some() && tagged == head,
    );
    Ok(())
}

/// A bare `origin` repository next to a working repository with one commit.
fn remote_push_setup(ctx: &ChallengeContext<'_>) -> Result<(), EnvironmentError> {
    ctx.run_in("origin", "git init --bare")?;
    ctx.run("git init")?;
    ctx.run("git symbolic-ref HEAD refs/heads/main")?;
    ctx.write_file("treasure.txt", "one gold coin\n")?;
    ctx.run("git add treasure.txt")?;
    ctx.run("git commit -m \"Claim the treasure\"")?;
    Ok(())
}

fn remote_push_validate(
    ctx: &ChallengeContext<'_>,
    list: &mut Checklist,
) -> Result<(), EnvironmentError> {
    let local = ctx.git();
    let origin = ctx.git_in("origin")?;
    let has_remote = local.remotes()?.iter().any(|r| r == "origin");
    let pushed = origin.resolve("refs/heads/main")?;
    let head = local.head_commit()?;

    list.check_with_hint(
        "remote 'origin' is configured",
        has_remote,
        Some(format!(
            "`git remote add origin {}`",
            ctx.expand("{aux:origin}")
        )),
    )
    .check_with_hint(
        "origin has a 'main' branch",
        pushed.is_some(),
        Some("`git push origin main`".to_string()),
    )
    .check(
        "origin's main matches your latest commit",
        pushed.is_some() && pushed == head,
    );
    Ok(())
}
