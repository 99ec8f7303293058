//! GitHub grammar: web URLs, `owner/repo#N` shorthand and REST API URLs.

use super::decode::{ambiguous, decode_unknown, is_number, Location};
use super::{Entity, Provider, Repo, GITHUB_API_HOST, GITHUB_HOST};
use crate::error::Result;

/// Decode `input` against a GitHub context. `force` keeps an explicit host
/// that differs from the context's (enterprise hosts reached via `github://`).
pub(super) fn decode(input: &str, context: &Entity, force: bool) -> Result<Entity> {
    let mut location = Location::parse(input);
    if location.has_provider_scheme() || !location.has_web_scheme() {
        return decode_unknown(input);
    }

    let context_host = match context.provider() {
        Provider::GitHub => context.hostname(),
        _ => GITHUB_HOST,
    };

    location.take_host_from_path();
    if location.host == GITHUB_API_HOST {
        return decode_api(input, &location);
    }
    if !location.host.is_empty() && location.host != context_host && !force {
        return decode_unknown(input);
    }
    let explicit_host = !location.host.is_empty();
    let host = if explicit_host {
        location.host.as_str()
    } else {
        context_host
    };

    let fragment = location.fragment.as_str();
    let mut parts = location.segments();
    if parts.is_empty() {
        if fragment.is_empty() {
            return Ok(Entity::service(Provider::GitHub, host));
        }
        let repo = context
            .repo_entity()
            .filter(|r| r.provider() == Provider::GitHub && r.hostname() == host);
        return match (repo, is_number(fragment)) {
            (Some(Entity::Repo(repo)), true) => Ok(repo.issue_or_merge_request(fragment)),
            _ => Err(ambiguous(input)),
        };
    }
    if is_number(fragment) && parts.len() <= 2 {
        parts.push("issue-or-pull-request");
        parts.push(fragment);
    }

    let repo = |owner: &str, name: &str| Repo::new(Provider::GitHub, host, owner, name);
    match parts.as_slice() {
        [owner, name, "labels", label @ ..] if !label.is_empty() => {
            Ok(repo(owner, name).label(&label.join("/")))
        }
        [single] => match single.strip_prefix('@') {
            Some(owner) if !owner.is_empty() => Ok(Entity::owner(Provider::GitHub, host, owner)),
            None if explicit_host && !single.contains('@') => {
                Ok(Entity::owner(Provider::GitHub, host, single))
            }
            _ => Err(ambiguous(input)),
        },
        [owner, name] => Ok(Entity::Repo(repo(owner, name))),
        [owner, name, "issues", id] => Ok(repo(owner, name).issue(id)),
        [owner, name, "pull" | "pulls", id] => Ok(repo(owner, name).merge_request(id)),
        [owner, name, "milestone" | "milestones", id] => Ok(repo(owner, name).milestone(id)),
        [owner, name, "issue-or-pull-request", id] => {
            Ok(repo(owner, name).issue_or_merge_request(id))
        }
        _ => Err(ambiguous(input)),
    }
}

/// `https://api.github.com/...` paths, mapped back onto github.com.
fn decode_api(input: &str, location: &Location) -> Result<Entity> {
    let repo = |owner: &str, name: &str| Repo::new(Provider::GitHub, GITHUB_HOST, owner, name);
    match location.segments().as_slice() {
        ["users", login] => Ok(Entity::github_owner(GITHUB_HOST, login)),
        ["repos", owner, name] => Ok(Entity::Repo(repo(owner, name))),
        ["repos", owner, name, "issues" | "pulls", id] => {
            Ok(repo(owner, name).issue_or_merge_request(id))
        }
        ["repos", owner, name, "milestones", id] => Ok(repo(owner, name).milestone(id)),
        ["repos", owner, name, "labels", label @ ..] if !label.is_empty() => {
            Ok(repo(owner, name).label(&label.join("/")))
        }
        _ => Err(ambiguous(input)),
    }
}
