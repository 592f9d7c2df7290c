use failure::{Error, Fail, ResultExt};
use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};
use std::path::Path;

use crate::config::Config;
use crate::git::{Outcome, Vcs};
use crate::{Provider, Repo};

#[derive(Debug, Clone)]
pub struct Driver {
    config: Config,
}

impl Driver {
    pub fn with_config(config: Config) -> Driver {
        Driver { config }
    }

    /// Fetch the list of repositories from a `Provider` then sync each of
    /// them, writing a progress report to `out`.
    ///
    /// Individual repositories failing to sync is not an error unless the
    /// driver was configured to be strict.
    pub fn run<P, V, W>(
        &self,
        provider: &P,
        vcs: &V,
        out: &mut W,
    ) -> Result<Vec<SyncResult>, Error>
    where
        P: Provider + ?Sized,
        V: Vcs + ?Sized,
        W: Write + ?Sized,
    {
        info!("Fetching repositories from {}", provider.name());
        let repos = provider
            .repositories()
            .context("Unable to fetch repositories")?;
        info!("Found {} repos from {}", repos.len(), provider.name());

        let account = provider
            .account()
            .context("Unable to get the name of the current user")?;

        writeln!(out, "Syncing all repos for user: {}", account)?;
        writeln!(out, "Found: {} repos", repos.len())?;

        let results = reconcile(&repos, &self.config.dest_dir, vcs, out)?;

        let failures: Vec<SyncResult> = results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .cloned()
            .collect();

        if !failures.is_empty() {
            warn!("{} of {} repos failed to sync", failures.len(), results.len());

            if self.config.strict {
                return Err(UpdateFailure { failures }.into());
            }
        }

        Ok(results)
    }
}

/// Make sure every repository has an up-to-date working copy inside
/// `dest_dir`, cloning the ones which don't exist yet and pulling the rest.
///
/// Repositories are handled one at a time, in order. A failure is reported
/// and then the next repository is processed.
pub fn reconcile<V, W>(
    repos: &[Repo],
    dest_dir: &Path,
    vcs: &V,
    out: &mut W,
) -> io::Result<Vec<SyncResult>>
where
    V: Vcs + ?Sized,
    W: Write + ?Sized,
{
    info!("Updating repositories");
    let total = repos.len();
    let width = total.to_string().len();
    let mut results = Vec::with_capacity(total);

    for (i, repo) in repos.iter().enumerate() {
        let result = sync_repo(repo, dest_dir, vcs);

        let icon = if result.outcome.is_success() { "✅" } else { "❌" };
        writeln!(
            out,
            "[ {:0width$} / {} ] {} {}: {}",
            i + 1,
            total,
            icon,
            result.action,
            repo.name,
            width = width
        )?;

        if let Outcome::Failure(ref msg) = result.outcome {
            warn!("{} {} failed", result.action.gerund(), repo.name);
            writeln!(
                out,
                "Error {} repository {}: {}",
                result.action.gerund(),
                repo.name,
                msg
            )?;
        }

        results.push(result);
    }

    Ok(results)
}

fn sync_repo<V: Vcs + ?Sized>(repo: &Repo, dest_dir: &Path, vcs: &V) -> SyncResult {
    let location = dest_dir.join(&repo.name);

    let (action, outcome) = if location.exists() {
        debug!("Updating {} ({})", repo.name, location.display());
        (Action::Updated, vcs.update(&location))
    } else {
        debug!("Cloning {} into {}", repo.url, location.display());
        (Action::Cloned, vcs.clone_repo(&repo.url, &location))
    };

    SyncResult {
        repo: repo.clone(),
        action,
        outcome,
    }
}

/// Which operation was used to sync a repository.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Cloned,
    Updated,
}

impl Action {
    fn gerund(&self) -> &'static str {
        match *self {
            Action::Cloned => "cloning",
            Action::Updated => "updating",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Action::Cloned => write!(f, "clone"),
            Action::Updated => write!(f, "update"),
        }
    }
}

/// The result of syncing a single repository.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub repo: Repo,
    pub action: Action,
    pub outcome: Outcome,
}

#[derive(Debug, Fail)]
#[fail(display = "One or more errors encountered while syncing repos")]
pub struct UpdateFailure {
    failures: Vec<SyncResult>,
}

impl UpdateFailure {
    pub fn failures(&self) -> &[SyncResult] {
        &self.failures
    }

    pub fn display<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writeln!(
            writer,
            "There were {} errors syncing repositories",
            self.failures.len()
        )?;

        for failure in &self.failures {
            writeln!(
                writer,
                "Error: {} ({}) failed",
                failure.repo.name, failure.action
            )?;

            if let Outcome::Failure(ref msg) = failure.outcome {
                for line in msg.lines() {
                    writeln!(writer, "\tCaused By: {}", line)?;
                }
            }
        }

        Ok(())
    }
}
