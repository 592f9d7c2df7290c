use failure::{Error, Fail, ResultExt};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK};
use reqwest::StatusCode;
use sec::Secret;
use serde_json::{self, Value};
use std::fmt::{self, Debug, Formatter};

use crate::config::{Config, RepoType};
use crate::pagination::{self, Page, Paginated};
use crate::{Provider, Repo};

const USER_AGENT: &str = concat!("repo-sync/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// A decoded response from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub body: Value,
    /// The `rel="next"` link, if the response is one page of many.
    pub next: Option<String>,
}

/// Something which can send an authenticated `GET` request to the API.
pub trait Transport {
    fn get(&self, url: &str) -> Result<ApiResponse, Error>;
}

/// The real [`Transport`], talking HTTP to GitHub.
pub struct HttpTransport {
    client: Client,
    token: Secret<String>,
}

impl HttpTransport {
    pub fn new(token: Secret<String>) -> Result<HttpTransport, Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Unable to create the HTTP client")?;

        Ok(HttpTransport { client, token })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<ApiResponse, Error> {
        debug!("Sending request to {:?}", url);

        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(AUTHORIZATION, format!("token {}", self.token.reveal()))
            .build()
            .context("Generated invalid request. This is a bug.")?;

        if log_enabled!(::log::Level::Trace) {
            let redacted_header =
                format!("Request Headers {:#?}", request.headers())
                    .replace(self.token.reveal().as_str(), "XXXXXXXXXX");

            for line in redacted_header.lines() {
                trace!("{}", line);
            }
        }

        let response = self
            .client
            .execute(request)
            .context("Unable to send request")?;

        let status = response.status();
        debug!("Received response ({})", status);

        let next = response
            .headers()
            .get(LINK)
            .and_then(|link| link.to_str().ok())
            .and_then(pagination::next_link)
            .map(String::from);

        check_status(status, response.headers(), url)?;

        let body: Value =
            response.json().context("Unable to read the response body")?;

        if log_enabled!(::log::Level::Trace) {
            trace!("Body:");
            for line in format!("{:#}", body).lines() {
                trace!("{}", line);
            }
        }

        Ok(ApiResponse { body, next })
    }
}

/// Turn an unsuccessful response into the matching error.
///
/// GitHub answers with `403 Forbidden` both for bad credentials and for an
/// exhausted rate limit, the `X-RateLimit-Remaining` header tells them apart.
fn check_status(
    status: StatusCode,
    headers: &HeaderMap,
    url: &str,
) -> Result<(), Error> {
    if status.is_success() {
        return Ok(());
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };

    if status == StatusCode::FORBIDDEN && header(RATE_LIMIT_REMAINING) == Some(0)
    {
        warn!("Ran out of API requests ({})", status);
        return Err(RateLimited {
            reset: header(RATE_LIMIT_RESET),
        }
        .into());
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!("The API rejected our credentials ({})", status);
        return Err(AuthenticationError {
            status: status.as_u16(),
        }
        .into());
    }

    warn!("Request failed with {}", status);
    Err(FailedRequest {
        status: status.as_u16(),
        url: url.to_string(),
    }
    .into())
}

impl Debug for HttpTransport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("HttpTransport").finish()
    }
}

#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "The access token was rejected ({})", status)]
pub struct AuthenticationError {
    pub status: u16,
}

/// The API's rate limit ran out. `reset` is when it refills, in seconds
/// since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "The API rate limit has been exceeded")]
pub struct RateLimited {
    pub reset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request to {} failed with {}", url, status)]
pub struct FailedRequest {
    pub status: u16,
    pub url: String,
}

/// An interface to the repositories stored on GitHub.
#[derive(Debug)]
pub struct GitHub<T = HttpTransport> {
    transport: T,
    api_root: String,
    repo_type: RepoType,
    page_size: usize,
    max_pages: Option<usize>,
}

impl GitHub<HttpTransport> {
    /// Create a new `GitHub` which talks to the API configured in `cfg`.
    pub fn with_config(cfg: &Config) -> Result<GitHub, Error> {
        let transport = HttpTransport::new(cfg.token.clone())?;
        Ok(GitHub::new(transport, cfg))
    }
}

impl<T: Transport> GitHub<T> {
    pub fn new(transport: T, cfg: &Config) -> GitHub<T> {
        GitHub {
            transport,
            api_root: cfg.api_root.trim_end_matches('/').to_string(),
            repo_type: cfg.repo_type,
            page_size: cfg.page_size,
            max_pages: cfg.max_pages,
        }
    }

    fn owned_endpoint(&self) -> String {
        format!(
            "{}/user/repos?type={}&per_page={}",
            self.api_root, self.repo_type, self.page_size
        )
    }

    fn get_owned(&self) -> Result<Vec<Repo>, Error> {
        debug!("Fetching owned repositories");

        let fetch = |url: &str| -> Result<Page<RawRepo>, Error> {
            let ApiResponse { body, next } = self.transport.get(url)?;
            let items = serde_json::from_value(body)
                .context("Unable to deserialize response")?;

            Ok(Page { items, next })
        };

        let mut owned = Vec::new();

        for repo in Paginated::new(&self.owned_endpoint(), fetch)
            .with_max_pages(self.max_pages)
        {
            let repo: RawRepo = repo?;
            owned.push(Repo::from(repo));
        }

        debug!("{} owned repos", owned.len());
        Ok(owned)
    }
}

impl<T: Transport> Provider for GitHub<T> {
    fn name(&self) -> &str {
        "github"
    }

    fn account(&self) -> Result<String, Error> {
        let url = format!("{}/user", self.api_root);
        let response = self.transport.get(&url)?;
        let user: RawUser = serde_json::from_value(response.body)
            .context("Unable to deserialize the current user")?;

        trace!("Current GitHub user is {}", user.login);
        Ok(user.login)
    }

    fn repositories(&self) -> Result<Vec<Repo>, Error> {
        let owned = self
            .get_owned()
            .context("Unable to fetch owned repositories")?;

        Ok(owned)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawRepo {
    name: String,
    clone_url: String,
}

impl From<RawRepo> for Repo {
    fn from(raw: RawRepo) -> Repo {
        Repo {
            name: raw.name,
            url: raw.clone_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawUser {
    login: String,
}
