//! Keep a local copy of every repository an account owns on GitHub.
//!
//! The [`Provider`] lists repositories, the [`Driver`] walks that list and
//! either clones or updates each one using a [`Vcs`] (normally [`Git`]).

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod config;
mod driver;
mod git;
mod github;
mod pagination;

pub use crate::config::{Config, MissingToken, RepoType};
pub use crate::driver::{reconcile, Action, Driver, SyncResult, UpdateFailure};
pub use crate::git::{Git, Outcome, Vcs};
pub use crate::github::{
    ApiResponse, AuthenticationError, FailedRequest, GitHub, HttpTransport,
    RateLimited, Transport,
};
pub use crate::pagination::{Page, Paginated};

use failure::Error;

/// A repository on the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    /// The repository's name, also used as the name of its local directory.
    pub name: String,
    /// Where to clone the repository from.
    pub url: String,
}

impl Repo {
    pub fn new<N, U>(name: N, url: U) -> Repo
    where
        N: Into<String>,
        U: Into<String>,
    {
        Repo {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Something which can retrieve the repositories we want to sync.
pub trait Provider {
    fn name(&self) -> &str;

    /// The name of the account whose repositories are being listed.
    fn account(&self) -> Result<String, Error>;

    /// Every repository, in the order the remote service returned them.
    fn repositories(&self) -> Result<Vec<Repo>, Error>;
}
