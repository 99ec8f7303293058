//! Canonical forge entities.
//!
//! An [`Entity`] identifies one resource on a forge (a service, an owner, a
//! project, an issue, a merge request, a milestone or a label). Every entity
//! has exactly one absolute URL form, [`Entity::canonical_string`], which is
//! the primary key used everywhere else in the crate. Parsing lives in
//! [`decode`] and the per-provider grammar modules.

mod decode;
mod github;
mod gitlab;
mod trello;

pub use decode::{decode, decode_relative, decode_unknown};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

pub const GITHUB_HOST: &str = "github.com";
pub const GITHUB_API_HOST: &str = "api.github.com";
pub const GITLAB_HOST: &str = "gitlab.com";
pub const TRELLO_HOST: &str = "trello.com";

/// Forge a resource lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
    Trello,
    Jira,
    Unknown,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
            Provider::Trello => "trello",
            Provider::Jira => "jira",
            Provider::Unknown => "unknown",
        }
    }

    /// Provider named by a `<provider>://` scheme prefix.
    pub fn from_scheme(scheme: &str) -> Option<Provider> {
        match scheme.to_ascii_lowercase().as_str() {
            "github" => Some(Provider::GitHub),
            "gitlab" => Some(Provider::GitLab),
            "trello" => Some(Provider::Trello),
            "jira" => Some(Provider::Jira),
            _ => None,
        }
    }

    /// Public SaaS host, when the provider has one.
    pub fn default_hostname(&self) -> Option<&'static str> {
        match self {
            Provider::GitHub => Some(GITHUB_HOST),
            Provider::GitLab => Some(GITLAB_HOST),
            Provider::Trello => Some(TRELLO_HOST),
            Provider::Jira | Provider::Unknown => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an entity, independent of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Service,
    UserOrOrganization,
    OrganizationOrProject,
    Project,
    Issue,
    MergeRequest,
    IssueOrMergeRequest,
    Milestone,
    Label,
    Unknown,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Service => "service",
            Kind::UserOrOrganization => "user-or-organization",
            Kind::OrganizationOrProject => "organization-or-project",
            Kind::Project => "project",
            Kind::Issue => "issue",
            Kind::MergeRequest => "merge-request",
            Kind::IssueOrMergeRequest => "issue-or-merge-request",
            Kind::Milestone => "milestone",
            Kind::Label => "label",
            Kind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Service {
    pub provider: Provider,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    pub provider: Provider,
    pub hostname: String,
    pub owner: String,
}

/// A project. Trello boards are repos with an empty owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    pub provider: Provider,
    pub hostname: String,
    pub owner: String,
    pub repo: String,
}

/// Anything addressed by an id inside a repo: issues, merge requests,
/// milestones and labels. Trello cards carry an empty repo.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub repo: Repo,
    pub id: String,
}

impl Repo {
    pub fn new(provider: Provider, hostname: &str, owner: &str, repo: &str) -> Self {
        Self {
            provider,
            hostname: hostname.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    fn item(&self, id: &str) -> Item {
        Item {
            repo: self.clone(),
            id: id.to_string(),
        }
    }

    pub fn issue(&self, id: &str) -> Entity {
        Entity::Issue(self.item(id))
    }

    pub fn merge_request(&self, id: &str) -> Entity {
        Entity::MergeRequest(self.item(id))
    }

    pub fn issue_or_merge_request(&self, id: &str) -> Entity {
        Entity::IssueOrMergeRequest(self.item(id))
    }

    pub fn milestone(&self, id: &str) -> Entity {
        Entity::Milestone(self.item(id))
    }

    /// Label names are kept in their URL path form (`t/epic`, `good%20first%20issue`).
    pub fn label(&self, name: &str) -> Entity {
        Entity::Label(self.item(&path_form(name)))
    }

    fn base_url(&self) -> String {
        match self.provider {
            Provider::Trello => format!("https://{}/b/{}", self.hostname, self.repo),
            _ => format!("https://{}/{}/{}", self.hostname, self.owner, self.repo),
        }
    }

    fn local_id(&self) -> String {
        match self.provider {
            Provider::Trello => format!("b/{}", self.repo),
            _ => format!("{}/{}", self.owner, self.repo),
        }
    }
}

/// A forge resource, identified by its coordinates.
///
/// Equality follows the canonical string, so a GitHub issue, pull request
/// and "issue or pull request" with the same number compare equal, as do a
/// GitLab project and the ambiguous organization-or-project with the same path.
#[derive(Debug, Clone)]
pub enum Entity {
    Service(Service),
    Owner(Owner),
    Repo(Repo),
    OwnerOrRepo(Repo),
    Issue(Item),
    MergeRequest(Item),
    IssueOrMergeRequest(Item),
    Milestone(Item),
    Label(Item),
}

/// Equality classes for kinds that may name the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Role {
    Service,
    Owner,
    Repo,
    IssueLike,
    Milestone,
    Label,
}

impl Entity {
    pub fn service(provider: Provider, hostname: &str) -> Self {
        Entity::Service(Service {
            provider,
            hostname: hostname.to_string(),
        })
    }

    pub fn owner(provider: Provider, hostname: &str, owner: &str) -> Self {
        Entity::Owner(Owner {
            provider,
            hostname: hostname.to_string(),
            owner: owner.to_string(),
        })
    }

    pub fn repo(provider: Provider, hostname: &str, owner: &str, repo: &str) -> Self {
        Entity::Repo(Repo::new(provider, hostname, owner, repo))
    }

    pub fn github_service() -> Self {
        Self::service(Provider::GitHub, GITHUB_HOST)
    }

    pub fn github_owner(hostname: &str, owner: &str) -> Self {
        Self::owner(Provider::GitHub, hostname, owner)
    }

    pub fn github_repo(hostname: &str, owner: &str, repo: &str) -> Self {
        Self::repo(Provider::GitHub, hostname, owner, repo)
    }

    pub fn github_issue(hostname: &str, owner: &str, repo: &str, id: &str) -> Self {
        Repo::new(Provider::GitHub, hostname, owner, repo).issue(id)
    }

    pub fn github_pull_request(hostname: &str, owner: &str, repo: &str, id: &str) -> Self {
        Repo::new(Provider::GitHub, hostname, owner, repo).merge_request(id)
    }

    pub fn github_milestone(hostname: &str, owner: &str, repo: &str, id: &str) -> Self {
        Repo::new(Provider::GitHub, hostname, owner, repo).milestone(id)
    }

    pub fn github_label(hostname: &str, owner: &str, repo: &str, name: &str) -> Self {
        Repo::new(Provider::GitHub, hostname, owner, repo).label(name)
    }

    pub fn gitlab_service() -> Self {
        Self::service(Provider::GitLab, GITLAB_HOST)
    }

    pub fn gitlab_repo(hostname: &str, owner: &str, repo: &str) -> Self {
        Self::repo(Provider::GitLab, hostname, owner, repo)
    }

    pub fn gitlab_owner_or_repo(hostname: &str, owner: &str, repo: &str) -> Self {
        Entity::OwnerOrRepo(Repo::new(Provider::GitLab, hostname, owner, repo))
    }

    pub fn gitlab_issue(hostname: &str, owner: &str, repo: &str, id: &str) -> Self {
        Repo::new(Provider::GitLab, hostname, owner, repo).issue(id)
    }

    pub fn gitlab_merge_request(hostname: &str, owner: &str, repo: &str, id: &str) -> Self {
        Repo::new(Provider::GitLab, hostname, owner, repo).merge_request(id)
    }

    pub fn gitlab_milestone(hostname: &str, owner: &str, repo: &str, id: &str) -> Self {
        Repo::new(Provider::GitLab, hostname, owner, repo).milestone(id)
    }

    pub fn trello_service() -> Self {
        Self::service(Provider::Trello, TRELLO_HOST)
    }

    pub fn trello_card(id: &str) -> Self {
        Repo::new(Provider::Trello, TRELLO_HOST, "", "").issue(id)
    }

    pub fn trello_board(id: &str) -> Self {
        Self::repo(Provider::Trello, TRELLO_HOST, "", id)
    }

    pub fn trello_user(id: &str) -> Self {
        Self::owner(Provider::Trello, TRELLO_HOST, id)
    }

    pub fn provider(&self) -> Provider {
        match self {
            Entity::Service(s) => s.provider,
            Entity::Owner(o) => o.provider,
            Entity::Repo(r) | Entity::OwnerOrRepo(r) => r.provider,
            Entity::Issue(i)
            | Entity::MergeRequest(i)
            | Entity::IssueOrMergeRequest(i)
            | Entity::Milestone(i)
            | Entity::Label(i) => i.repo.provider,
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            Entity::Service(s) => &s.hostname,
            Entity::Owner(o) => &o.hostname,
            Entity::Repo(r) | Entity::OwnerOrRepo(r) => &r.hostname,
            Entity::Issue(i)
            | Entity::MergeRequest(i)
            | Entity::IssueOrMergeRequest(i)
            | Entity::Milestone(i)
            | Entity::Label(i) => &i.repo.hostname,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Entity::Service(_) => Kind::Service,
            Entity::Owner(_) => Kind::UserOrOrganization,
            Entity::Repo(_) => Kind::Project,
            Entity::OwnerOrRepo(_) => Kind::OrganizationOrProject,
            Entity::Issue(_) => Kind::Issue,
            Entity::MergeRequest(_) => Kind::MergeRequest,
            Entity::IssueOrMergeRequest(_) => Kind::IssueOrMergeRequest,
            Entity::Milestone(_) => Kind::Milestone,
            Entity::Label(_) => Kind::Label,
        }
    }

    fn role(&self) -> Role {
        match self {
            Entity::Service(_) => Role::Service,
            Entity::Owner(_) => Role::Owner,
            Entity::Repo(_) | Entity::OwnerOrRepo(_) => Role::Repo,
            Entity::Issue(_) | Entity::MergeRequest(_) | Entity::IssueOrMergeRequest(_) => {
                Role::IssueLike
            }
            Entity::Milestone(_) => Role::Milestone,
            Entity::Label(_) => Role::Label,
        }
    }

    fn item(&self) -> Option<&Item> {
        match self {
            Entity::Issue(i)
            | Entity::MergeRequest(i)
            | Entity::IssueOrMergeRequest(i)
            | Entity::Milestone(i)
            | Entity::Label(i) => Some(i),
            _ => None,
        }
    }

    fn repo_coordinates(&self) -> Option<&Repo> {
        match self {
            Entity::Repo(r) | Entity::OwnerOrRepo(r) => Some(r),
            other => other.item().map(|i| &i.repo),
        }
    }

    /// Owner path, when the entity lives under one.
    pub fn owner_id(&self) -> Option<&str> {
        let owner = match self {
            Entity::Service(_) => return None,
            Entity::Owner(o) => o.owner.as_str(),
            other => other.repo_coordinates()?.owner.as_str(),
        };
        (!owner.is_empty()).then_some(owner)
    }

    pub fn repo_id(&self) -> Option<&str> {
        let repo = self.repo_coordinates()?.repo.as_str();
        (!repo.is_empty()).then_some(repo)
    }

    /// Issue number, milestone number, label name or card id.
    pub fn id(&self) -> Option<&str> {
        self.item().map(|i| i.id.as_str())
    }

    /// The one absolute URL form of this entity.
    pub fn canonical_string(&self) -> String {
        match self {
            Entity::Service(s) => format!("https://{}/", s.hostname),
            Entity::Owner(o) => format!("https://{}/{}", o.hostname, o.owner),
            Entity::Repo(r) | Entity::OwnerOrRepo(r) => r.base_url(),
            Entity::Issue(i) | Entity::IssueOrMergeRequest(i) => match i.repo.provider {
                Provider::Trello => format!("https://{}/c/{}", i.repo.hostname, i.id),
                _ => format!("{}/issues/{}", i.repo.base_url(), i.id),
            },
            Entity::MergeRequest(i) => match i.repo.provider {
                Provider::GitLab => format!("{}/merge_requests/{}", i.repo.base_url(), i.id),
                _ => format!("{}/issues/{}", i.repo.base_url(), i.id),
            },
            Entity::Milestone(i) => match i.repo.provider {
                Provider::GitLab => format!("{}/-/milestones/{}", i.repo.base_url(), i.id),
                _ => format!("{}/milestone/{}", i.repo.base_url(), i.id),
            },
            Entity::Label(i) => match i.repo.provider {
                Provider::GitLab => format!("{}/-/labels/{}", i.repo.base_url(), i.id),
                _ => format!("{}/labels/{}", i.repo.base_url(), i.id),
            },
        }
    }

    /// Canonical string, prefixed with `<provider>://` instead of `https://`
    /// when the host is not the provider's public one, so that decoding it
    /// without a context gives the same entity back.
    pub fn portable_string(&self) -> String {
        let canonical = self.canonical_string();
        match self.provider() {
            Provider::GitHub | Provider::GitLab
                if self.provider().default_hostname() != Some(self.hostname()) =>
            {
                let rest = canonical.strip_prefix("https://").unwrap_or(&canonical);
                format!("{}://{}", self.provider().as_str(), rest)
            }
            _ => canonical,
        }
    }

    /// Short human form, e.g. `owner/repo#42`.
    pub fn local_id(&self) -> String {
        match self {
            Entity::Service(s) => s.hostname.clone(),
            Entity::Owner(o) => format!("@{}", o.owner),
            Entity::Repo(r) | Entity::OwnerOrRepo(r) => r.local_id(),
            Entity::Issue(i) | Entity::IssueOrMergeRequest(i) => match i.repo.provider {
                Provider::Trello => format!("c/{}", i.id),
                _ => format!("{}#{}", i.repo.local_id(), i.id),
            },
            Entity::MergeRequest(i) => match i.repo.provider {
                Provider::GitLab => format!("{}!{}", i.repo.local_id(), i.id),
                _ => format!("{}#{}", i.repo.local_id(), i.id),
            },
            Entity::Milestone(i) => format!("{}/milestone/{}", i.repo.local_id(), i.id),
            Entity::Label(i) => format!("{}/labels/{}", i.repo.local_id(), i.id),
        }
    }

    /// The service hosting this entity. A service is its own service entity.
    pub fn service_entity(&self) -> Entity {
        Entity::service(self.provider(), self.hostname())
    }

    /// The enclosing owner. An owner is its own owner entity.
    pub fn owner_entity(&self) -> Option<Entity> {
        match self {
            Entity::Owner(_) => Some(self.clone()),
            _ => {
                let owner = self.owner_id()?;
                Some(Entity::owner(self.provider(), self.hostname(), owner))
            }
        }
    }

    /// The enclosing project. A project is its own repo entity.
    pub fn repo_entity(&self) -> Option<Entity> {
        match self {
            Entity::Repo(_) | Entity::OwnerOrRepo(_) => Some(self.clone()),
            _ => {
                let item = self.item()?;
                if item.repo.repo.is_empty() {
                    return None;
                }
                Some(Entity::Repo(item.repo.clone()))
            }
        }
    }

    /// Hierarchical "is ancestor of". Never reflexive; leaves contain nothing.
    pub fn contains(&self, other: &Entity) -> bool {
        if self.provider() != other.provider() || self.hostname() != other.hostname() {
            return false;
        }
        match self {
            Entity::Service(_) => !matches!(other, Entity::Service(_)),
            Entity::Owner(o) => match other {
                Entity::Service(_) | Entity::Owner(_) => false,
                _ => other
                    .repo_coordinates()
                    .map(|r| owner_covers(o.provider, &o.owner, &r.owner))
                    .unwrap_or(false),
            },
            Entity::Repo(r) => match other.item() {
                Some(i) => i.repo == *r,
                None => false,
            },
            Entity::OwnerOrRepo(r) => match other {
                // may be a GitLab group with nested projects
                Entity::Repo(inner) | Entity::OwnerOrRepo(inner) => {
                    owner_covers(r.provider, &format!("{}/{}", r.owner, r.repo), &inner.owner)
                }
                _ => other
                    .item()
                    .map(|i| {
                        i.repo == *r
                            || owner_covers(
                                r.provider,
                                &format!("{}/{}", r.owner, r.repo),
                                &i.repo.owner,
                            )
                    })
                    .unwrap_or(false),
            },
            _ => false,
        }
    }
}

/// GitLab groups nest, so a group also covers its subgroups.
fn owner_covers(provider: Provider, owner: &str, candidate: &str) -> bool {
    if owner.is_empty() {
        return false;
    }
    if owner == candidate {
        return true;
    }
    provider == Provider::GitLab
        && candidate.len() > owner.len()
        && candidate.starts_with(owner)
        && candidate.as_bytes()[owner.len()] == b'/'
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.provider() == other.provider()
            && self.role() == other.role()
            && self.canonical_string() == other.canonical_string()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider().hash(state);
        self.canonical_string().hash(state);
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_string()
            .cmp(&other.canonical_string())
            .then_with(|| self.provider().cmp(&other.provider()))
            .then_with(|| self.role().cmp(&other.role()))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.portable_string())
    }
}

impl<'de> Deserialize<'de> for Entity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode(&raw, None).map_err(serde::de::Error::custom)
    }
}

/// Percent-encode `raw` the way a URL parser stores a path, keeping `/` and
/// existing escapes.
fn path_form(raw: &str) -> String {
    match Url::parse("https://localhost/") {
        Ok(mut url) => {
            url.set_path(raw);
            url.path().trim_start_matches('/').to_string()
        }
        Err(_) => raw.to_string(),
    }
}
