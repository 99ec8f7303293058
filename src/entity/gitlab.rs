//! GitLab grammar. Groups nest, so the project is always the segment right
//! before the resource marker and everything before it is the owner path.

use super::decode::{ambiguous, decode_unknown, is_number, Location};
use super::{Entity, Provider, Repo, GITLAB_HOST};
use crate::error::Result;

pub(super) fn decode(input: &str, context: &Entity, force: bool) -> Result<Entity> {
    let mut location = Location::parse(input);
    if location.has_provider_scheme() || !location.has_web_scheme() {
        return decode_unknown(input);
    }

    let context_host = match context.provider() {
        Provider::GitLab => context.hostname(),
        _ => GITLAB_HOST,
    };

    location.take_host_from_path();
    if !location.host.is_empty() && location.host != context_host && !force {
        return decode_unknown(input);
    }
    let host = if location.host.is_empty() {
        context_host
    } else {
        location.host.as_str()
    };

    let fragment = location.fragment.as_str();
    let path = location.path.trim_matches('/');

    // `#42`, `!42`: only meaningful inside a project
    if path.is_empty() || path.starts_with('!') {
        let (id, merge_request) = match path.strip_prefix('!') {
            Some(id) => (id, true),
            None if fragment.is_empty() => return Ok(Entity::service(Provider::GitLab, host)),
            None => (fragment, false),
        };
        let repo = context
            .repo_entity()
            .filter(|r| r.provider() == Provider::GitLab && r.hostname() == host);
        return match (repo, is_number(id)) {
            (Some(Entity::Repo(repo)), true) | (Some(Entity::OwnerOrRepo(repo)), true) => {
                Ok(if merge_request {
                    repo.merge_request(id)
                } else {
                    repo.issue(id)
                })
            }
            _ => Err(ambiguous(input)),
        };
    }

    let mut path = path.to_string();
    if path.contains('!') {
        path = path.replacen('!', "/merge_requests/", 1);
    } else if is_number(fragment) {
        path.push_str("/issues/");
        path.push_str(fragment);
    }
    let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(marker) = parts
        .windows(2)
        .position(|w| w[0] == "-" && w[1] == "labels")
    {
        if marker >= 2 && parts.len() > marker + 2 {
            let repo = Repo::new(Provider::GitLab, host, &parts[..marker - 1].join("/"), parts[marker - 1]);
            return Ok(repo.label(&parts[marker + 2..].join("/")));
        }
        return Err(ambiguous(input));
    }

    let n = parts.len();
    if n >= 5 && parts[n - 3] == "-" && matches!(parts[n - 2], "issues" | "merge_requests") {
        parts.remove(n - 3);
    }

    let n = parts.len();
    let repo_at = |owner_end: usize| Repo::new(Provider::GitLab, host, &parts[..owner_end].join("/"), parts[owner_end]);
    match n {
        1 => match parts[0].trim_start_matches('@') {
            "" => Err(ambiguous(input)),
            owner => Ok(Entity::owner(Provider::GitLab, host, owner)),
        },
        2 => Ok(Entity::gitlab_owner_or_repo(host, parts[0], parts[1])),
        _ => match parts[n - 2] {
            "issues" if n >= 4 => Ok(repo_at(n - 3).issue(parts[n - 1])),
            "merge_requests" if n >= 4 => Ok(repo_at(n - 3).merge_request(parts[n - 1])),
            "milestones" if n >= 5 && parts[n - 3] == "-" => Ok(repo_at(n - 4).milestone(parts[n - 1])),
            _ => Ok(Entity::Repo(repo_at(n - 1))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{decode, decode_relative, Kind};

    fn resolve(context: &Entity, input: &str) -> (String, Kind) {
        let entity = decode_relative(input, context).unwrap();
        (entity.canonical_string(), entity.kind())
    }

    #[test]
    fn test_relative_to_issue() {
        let issue = Entity::gitlab_issue(GITLAB_HOST, "moul", "depviz", "42");
        let cases = [
            ("@moul", "https://gitlab.com/moul"),
            ("#4242", "https://gitlab.com/moul/depviz/issues/4242"),
            ("!12", "https://gitlab.com/moul/depviz/merge_requests/12"),
            ("moul2/depviz2#43", "https://gitlab.com/moul2/depviz2/issues/43"),
            ("gitlab.com/moul2/depviz2#42", "https://gitlab.com/moul2/depviz2/issues/42"),
            ("https://gitlab.com/moul2/depviz2#42", "https://gitlab.com/moul2/depviz2/issues/42"),
            ("https://gitlab.com/moul/depviz/issues/42", "https://gitlab.com/moul/depviz/issues/42"),
            ("https://github.com/moul/depviz/issues/1", "https://github.com/moul/depviz/issues/1"),
        ];
        for (input, expected) in cases {
            assert_eq!(resolve(&issue, input).0, expected, "{}", input);
        }
        assert!(decode_relative("https://example.com/a/b#42", &issue).is_err());
        assert_eq!(issue.repo_entity().unwrap().canonical_string(), "https://gitlab.com/moul/depviz");
    }

    #[test]
    fn test_relative_to_service() {
        let service = Entity::gitlab_service();
        let cases = [
            ("https://gitlab.com", "https://gitlab.com/", Kind::Service),
            ("gitlab.com", "https://gitlab.com/", Kind::Service),
            ("gitlab.com/moul", "https://gitlab.com/moul", Kind::UserOrOrganization),
            ("@moul", "https://gitlab.com/moul", Kind::UserOrOrganization),
            ("gitlab.com/moul/depviz", "https://gitlab.com/moul/depviz", Kind::OrganizationOrProject),
            ("moul/depviz", "https://gitlab.com/moul/depviz", Kind::OrganizationOrProject),
            ("moul/depviz/-/milestones/1", "https://gitlab.com/moul/depviz/-/milestones/1", Kind::Milestone),
            ("moul/depviz#1", "https://gitlab.com/moul/depviz/issues/1", Kind::Issue),
            ("gitlab.com/moul/depviz/issues/2", "https://gitlab.com/moul/depviz/issues/2", Kind::Issue),
            ("gitlab.com/moul/depviz/merge_requests/1", "https://gitlab.com/moul/depviz/merge_requests/1", Kind::MergeRequest),
            ("https://gitlab.com/moul/depviz#1", "https://gitlab.com/moul/depviz/issues/1", Kind::Issue),
            ("gitlab://gitlab.com/moul/depviz#1", "https://gitlab.com/moul/depviz/issues/1", Kind::Issue),
            ("gitlab.com/a/b/c/d/e/f", "https://gitlab.com/a/b/c/d/e/f", Kind::Project),
            ("gitlab.com/a/b/c/d/e/f#1", "https://gitlab.com/a/b/c/d/e/f/issues/1", Kind::Issue),
            ("gitlab.com/a/b/c/d/e/f!1", "https://gitlab.com/a/b/c/d/e/f/merge_requests/1", Kind::MergeRequest),
            ("a/b/c/d/e/f!1", "https://gitlab.com/a/b/c/d/e/f/merge_requests/1", Kind::MergeRequest),
            ("a/b/c/d/e/f#1", "https://gitlab.com/a/b/c/d/e/f/issues/1", Kind::Issue),
            ("a/b#1", "https://gitlab.com/a/b/issues/1", Kind::Issue),
            ("a/b!1", "https://gitlab.com/a/b/merge_requests/1", Kind::MergeRequest),
        ];
        for (input, canonical, kind) in cases {
            assert_eq!(resolve(&service, input), (canonical.to_string(), kind), "{}", input);
        }
    }

    #[test]
    fn test_nested_group_coordinates() {
        let entity = decode("https://gitlab.com/a/b/c/d/e/f!1", None).unwrap();
        assert_eq!(entity.owner_id(), Some("a/b/c/d/e"));
        assert_eq!(entity.repo_id(), Some("f"));
        assert_eq!(entity.id(), Some("1"));
        assert_eq!(entity.local_id(), "a/b/c/d/e/f!1");
    }

    #[test]
    fn test_dash_scoped_paths() {
        let service = Entity::gitlab_service();
        assert_eq!(
            resolve(&service, "https://gitlab.com/a/b/-/issues/7"),
            ("https://gitlab.com/a/b/issues/7".to_string(), Kind::Issue)
        );
        assert_eq!(
            resolve(&service, "https://gitlab.com/a/b/-/merge_requests/8"),
            ("https://gitlab.com/a/b/merge_requests/8".to_string(), Kind::MergeRequest)
        );
        assert_eq!(
            resolve(&service, "https://gitlab.com/g/a/b/-/labels/needs review"),
            ("https://gitlab.com/g/a/b/-/labels/needs%20review".to_string(), Kind::Label)
        );
        assert!(decode_relative("https://gitlab.com/-/labels/x", &service).is_err());
    }

    #[test]
    fn test_enterprise_context_keeps_host() {
        let service = Entity::service(Provider::GitLab, "ge.company.com");
        assert_eq!(resolve(&service, "@moul").0, "https://ge.company.com/moul");
        assert_eq!(resolve(&service, "moul/depviz#1").0, "https://ge.company.com/moul/depviz/issues/1");
        assert_eq!(
            resolve(&service, "moul/depviz/-/milestones/1").0,
            "https://ge.company.com/moul/depviz/-/milestones/1"
        );
        assert_eq!(resolve(&service, "gitlab.com/moul").0, "https://gitlab.com/moul");
    }

    #[test]
    fn test_bare_reference_needs_project_context() {
        let service = Entity::gitlab_service();
        assert!(decode_relative("#1", &service).is_err());
        assert!(decode_relative("!1", &service).is_err());
    }
}
