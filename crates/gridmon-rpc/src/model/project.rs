use serde::{Deserialize, Serialize};

/// An attached project, as reported by the daemon.
///
/// Projects are identified by their master URL everywhere in the RPC
/// surface; the name is display-only and may be empty before the first
/// scheduler contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Project {
    pub url: String,
    pub name: String,
    pub user_name: String,
    pub team_name: String,
    pub user_total_credit: f64,
    pub user_avg_credit: f64,
    pub host_total_credit: f64,
    pub host_avg_credit: f64,
    /// Suspended by an explicit user command (as opposed to preferences).
    pub suspended_via_gui: bool,
    pub dont_request_more_work: bool,
    pub attached_via_acct_mgr: bool,
    /// Scheduler RPC in progress right now.
    pub scheduler_rpc_in_progress: bool,
}

impl Project {
    /// Display name, falling back to the URL until the project reports one.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_url() {
        let mut project = Project {
            url: "https://grid.example.org/".into(),
            ..Project::default()
        };
        assert_eq!(project.display_name(), "https://grid.example.org/");

        project.name = "Example Grid".into();
        assert_eq!(project.display_name(), "Example Grid");
    }
}
