//! Team and user management

use super::{require, ReviewEngine};
use crate::error::Result;
use crate::models::{Team, TeamMember, User};

impl ReviewEngine {
    /// Create a team and upsert its members
    ///
    /// A member already known under another team moves into this one with
    /// the supplied name and active flag.
    pub async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<Team> {
        require(name, "team_name")?;
        for member in members {
            require(&member.user_id, "user_id")?;
        }

        let team = self.directory.create_team(name, members).await?;
        tracing::info!(team = name, members = team.members.len(), "Team created");
        Ok(team)
    }

    pub async fn get_team(&self, name: &str) -> Result<Team> {
        require(name, "team_name")?;
        self.directory.get_team(name).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        require(user_id, "user_id")?;
        self.directory.get_user(user_id).await
    }

    /// Flip one user's active flag
    ///
    /// Open reviews are left as they are; only
    /// [`deactivate_team_users`](ReviewEngine::deactivate_team_users) repairs them.
    pub async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        require(user_id, "user_id")?;

        let user = self.directory.set_user_active(user_id, is_active).await?;
        tracing::info!(user_id, is_active, "User activity updated");
        Ok(user)
    }
}
