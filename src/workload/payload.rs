/// Request bodies sent by the workload.
use serde::{Deserialize, Serialize};

const MEMBER_NAMES: [&str; 3] = ["Alice", "Bob", "Charlie"];

/// Member of a team as sent to `/team/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

/// Body of `/team/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPayload {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

impl TeamPayload {
    /// Team number `seq`, named after the creation time in unix millis.
    pub fn new(now_millis: i64, seq: u64) -> Self {
        let members = MEMBER_NAMES
            .iter()
            .enumerate()
            .map(|(index, name)| TeamMember {
                user_id: format!("user{}-{}", index + 1, seq),
                username: (*name).to_string(),
                is_active: true,
            })
            .collect();

        Self {
            team_name: format!("team-{}-{}", now_millis, seq),
            members,
        }
    }

    /// Member that authors the team's pull requests.
    pub fn author(&self) -> Option<&TeamMember> {
        self.members.first()
    }
}

/// Body of `/pullRequest/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestPayload {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

impl PullRequestPayload {
    pub fn new(now_millis: i64, seq: u64, author_id: impl Into<String>) -> Self {
        Self {
            pull_request_id: format!("pr-{}-{}", now_millis, seq),
            pull_request_name: format!("Feature {}", seq),
            author_id: author_id.into(),
        }
    }
}

/// Body of `/team/deactivateUsers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivatePayload {
    pub team_name: String,
}
