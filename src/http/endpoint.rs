/// Endpoints of the review service exercised by the workload.
use crate::http::client::HttpMethod;
use std::fmt;

/// Which bearer token a call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// No `Authorization` header.
    Anonymous,
    /// Ordinary user token.
    User,
    /// Administrative token.
    Admin,
}

/// A single endpoint of the service under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Health,
    Stats,
    CreateTeam,
    CreatePullRequest,
    DeactivateTeam,
}

impl Endpoint {
    /// All endpoints in workflow order.
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Health,
        Endpoint::Stats,
        Endpoint::CreateTeam,
        Endpoint::CreatePullRequest,
        Endpoint::DeactivateTeam,
    ];

    /// Tag value used to attribute metrics to this endpoint.
    pub fn tag(&self) -> &'static str {
        match self {
            Endpoint::Health => "health",
            Endpoint::Stats => "stats",
            Endpoint::CreateTeam => "create_team",
            Endpoint::CreatePullRequest => "create_pr",
            Endpoint::DeactivateTeam => "deactivate_team",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Health => "/health",
            Endpoint::Stats => "/stats",
            Endpoint::CreateTeam => "/team/add",
            Endpoint::CreatePullRequest => "/pullRequest/create",
            Endpoint::DeactivateTeam => "/team/deactivateUsers",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Endpoint::Health | Endpoint::Stats => HttpMethod::Get,
            Endpoint::CreateTeam | Endpoint::CreatePullRequest | Endpoint::DeactivateTeam => {
                HttpMethod::Post
            }
        }
    }

    /// Status code the workflow treats as success.
    pub fn expected_status(&self) -> u16 {
        match self {
            Endpoint::CreateTeam | Endpoint::CreatePullRequest => 201,
            Endpoint::Health | Endpoint::Stats | Endpoint::DeactivateTeam => 200,
        }
    }

    pub fn credential(&self) -> Credential {
        match self {
            Endpoint::Health => Credential::Anonymous,
            Endpoint::Stats => Credential::User,
            Endpoint::CreateTeam | Endpoint::CreatePullRequest | Endpoint::DeactivateTeam => {
                Credential::Admin
            }
        }
    }

    /// Resolve an endpoint from its metric tag.
    pub fn from_tag(tag: &str) -> Option<Endpoint> {
        Self::ALL.into_iter().find(|endpoint| endpoint.tag() == tag)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
