//! Boundary to the client-facing message channel.
//!
//! The surrounding application owns the actual pub/sub transport (STOMP over
//! WebSocket upstream); this crate only addresses destinations and hands off
//! payloads. Delivery is fire-and-forget — a dropped subscriber is the
//! transport's problem, not ours.

use async_trait::async_trait;

/// Publish one payload to one destination. Implementations must be cheap to
/// call from terminal reader loops (every output chunk goes through here).
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, destination: &str, payload: &str);
}

/// Destination string builders, kept in one place so the client and server
/// sides cannot drift apart.
pub mod destinations {
    /// Raw terminal output for one interactive session.
    pub fn terminal(group_id: i32, project_id: i32, terminal_id: &str) -> String {
        format!("/sub/groups/{group_id}/projects/{project_id}/terminal/{terminal_id}")
    }

    /// Directory results addressed to the requesting user only.
    pub fn directory_user(group_id: i32, project_id: i32, user_id: i32) -> String {
        format!("/sub/groups/{group_id}/projects/{project_id}/users/{user_id}/directory")
    }

    /// Directory mutations broadcast to every user of the project.
    pub fn directory_all(group_id: i32, project_id: i32) -> String {
        format!("/sub/groups/{group_id}/projects/{project_id}/users/all/directory")
    }
}
