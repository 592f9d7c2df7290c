use failure::{Error, Fail, ResultExt};
use sec::Secret;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Everything needed for a single sync run.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: Secret<String>,
    /// The top-level directory all repositories are placed in.
    pub dest_dir: PathBuf,
    pub api_root: String,
    pub repo_type: RepoType,
    pub page_size: usize,
    /// Stop following pagination links after this many pages.
    pub max_pages: Option<usize>,
    /// Treat any repository which couldn't be synced as a failed run.
    pub strict: bool,
}

impl Config {
    pub const TOKEN_VAR: &'static str = "GITHUB_TOKEN";
    pub const DEFAULT_DEST_DIR: &'static str = "./repos";
    pub const DEFAULT_API_ROOT: &'static str = "https://api.github.com";
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Create a config with default settings, failing if no usable token
    /// was provided.
    pub fn new<P: Into<PathBuf>>(
        token: Option<String>,
        dest_dir: P,
    ) -> Result<Config, MissingToken> {
        let token = match token {
            Some(ref tok) if !tok.trim().is_empty() => tok.trim().to_string(),
            _ => return Err(MissingToken),
        };

        Ok(Config {
            token: Secret::new(token),
            dest_dir: dest_dir.into(),
            api_root: Config::DEFAULT_API_ROOT.to_string(),
            repo_type: RepoType::default(),
            page_size: Config::DEFAULT_PAGE_SIZE,
            max_pages: None,
            strict: false,
        })
    }

    /// Make sure the destination directory exists, failing if something
    /// other than a directory is already there.
    pub fn ensure_dest_dir(&self) -> Result<(), Error> {
        debug!("Making sure {} exists", self.dest_dir.display());

        fs::create_dir_all(&self.dest_dir).with_context(|_| {
            format!(
                "Unable to create the destination directory ({})",
                self.dest_dir.display()
            )
        })?;

        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Fail)]
#[fail(display = "GITHUB_TOKEN environment variable not set.")]
pub struct MissingToken;

/// Which of the account's repositories should be listed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RepoType {
    All,
    Owner,
    Public,
    Private,
    Member,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            RepoType::All => "all",
            RepoType::Owner => "owner",
            RepoType::Public => "public",
            RepoType::Private => "private",
            RepoType::Member => "member",
        }
    }
}

impl Default for RepoType {
    fn default() -> RepoType {
        RepoType::Owner
    }
}

impl Display for RepoType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = UnknownRepoType;

    fn from_str(s: &str) -> Result<RepoType, UnknownRepoType> {
        match s.to_lowercase().as_str() {
            "all" => Ok(RepoType::All),
            "owner" => Ok(RepoType::Owner),
            "public" => Ok(RepoType::Public),
            "private" => Ok(RepoType::Private),
            "member" => Ok(RepoType::Member),
            _ => Err(UnknownRepoType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(
    display = "\"{}\" isn't a repository type (expected all, owner, public, private or member)",
    _0
)]
pub struct UnknownRepoType(String);
