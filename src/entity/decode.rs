//! Entry points for turning strings into entities.

use url::Url;

use super::{github, gitlab, trello, Entity, Provider, GITHUB_API_HOST, GITHUB_HOST, GITLAB_HOST, TRELLO_HOST};
use crate::error::{DepgraphError, Result};

/// Pieces of a reference, before any provider grammar is applied.
#[derive(Debug, Default)]
pub(super) struct Location {
    /// Lowercased scheme, empty when absent.
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub fragment: String,
}

impl Location {
    pub fn parse(input: &str) -> Self {
        if let Some((scheme, rest)) = input.split_once("://") {
            let scheme = scheme.to_ascii_lowercase();
            if scheme == "http" || scheme == "https" {
                if let Ok(url) = Url::parse(input) {
                    return Self {
                        host: url.host_str().unwrap_or_default().to_string(),
                        path: url.path().to_string(),
                        fragment: url.fragment().unwrap_or_default().to_string(),
                        scheme,
                    };
                }
            }
            return Self {
                scheme,
                ..Self::parse_bare(rest)
            };
        }
        Self::parse_bare(input)
    }

    fn parse_bare(input: &str) -> Self {
        let (rest, fragment) = input.split_once('#').unwrap_or((input, ""));
        let path = rest.split('?').next().unwrap_or_default();
        Self {
            path: path.to_string(),
            fragment: fragment.to_string(),
            ..Self::default()
        }
    }

    /// `github.com/moul/depviz` carries its host as the first path segment.
    pub fn take_host_from_path(&mut self) {
        if !self.host.is_empty() {
            return;
        }
        let trimmed = self.path.trim_start_matches('/');
        let first = trimmed.split('/').next().unwrap_or_default();
        if first.contains('.') {
            self.host = first.to_ascii_lowercase();
            self.path = trimmed[first.len()..].to_string();
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Scheme names a forge (`github://`), not a transport.
    pub fn has_provider_scheme(&self) -> bool {
        Provider::from_scheme(&self.scheme).is_some()
    }

    pub fn has_web_scheme(&self) -> bool {
        matches!(self.scheme.as_str(), "" | "http" | "https")
    }
}

pub(super) fn ambiguous(input: &str) -> DepgraphError {
    DepgraphError::AmbiguousUri(input.to_string())
}

pub(super) fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Decode a reference. With a context, short forms (`#42`, `@owner`,
/// `owner/repo#42`) resolve against it; without one, absolute forms are
/// tried first and short forms fall back to the public GitHub service.
pub fn decode(input: &str, context: Option<&Entity>) -> Result<Entity> {
    match context {
        Some(context) => decode_relative(input, context),
        None => match decode_unknown(input) {
            Err(DepgraphError::AmbiguousUri(_)) => {
                decode_relative(input, &Entity::github_service()).map_err(|_| ambiguous(input))
            }
            other => other,
        },
    }
}

/// Decode `input` relative to `context`, using the context's provider grammar.
pub fn decode_relative(input: &str, context: &Entity) -> Result<Entity> {
    let input = input.trim();
    match context.provider() {
        Provider::GitHub => github::decode(input, context, false),
        Provider::GitLab => gitlab::decode(input, context, false),
        Provider::Trello => trello::decode(input, context, false),
        Provider::Jira | Provider::Unknown => decode_unknown(input),
    }
}

/// Decode an absolute reference with no context at all.
pub fn decode_unknown(input: &str) -> Result<Entity> {
    let input = input.trim();
    let ssh;
    let input = match input.strip_prefix("git@github.com:") {
        Some(rest) => {
            ssh = format!("https://{}/{}", GITHUB_HOST, rest.trim_end_matches(".git"));
            ssh.as_str()
        }
        None => input,
    };

    let mut location = Location::parse(input);
    if let Some(provider) = Provider::from_scheme(&location.scheme) {
        let rest = &input[location.scheme.len() + 3..];
        let mut inner = Location::parse(rest);
        inner.take_host_from_path();
        return match provider {
            Provider::GitHub => {
                let host = non_empty_or(&inner.host, GITHUB_HOST);
                github::decode(rest, &Entity::service(Provider::GitHub, host), true)
            }
            Provider::GitLab => {
                let host = non_empty_or(&inner.host, GITLAB_HOST);
                gitlab::decode(rest, &Entity::service(Provider::GitLab, host), true)
            }
            _ => Err(ambiguous(input)),
        };
    }
    if !location.has_web_scheme() {
        return Err(ambiguous(input));
    }

    location.take_host_from_path();
    match location.host.as_str() {
        GITHUB_HOST | GITHUB_API_HOST => github::decode(input, &Entity::github_service(), false),
        GITLAB_HOST => gitlab::decode(input, &Entity::gitlab_service(), false),
        TRELLO_HOST => trello::decode(input, &Entity::trello_service(), false),
        _ => Err(ambiguous(input)),
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
