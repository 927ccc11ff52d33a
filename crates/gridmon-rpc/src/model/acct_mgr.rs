use serde::{Deserialize, Serialize};

/// Account-manager attachment state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcctMgrInfo {
    pub url: String,
    pub name: String,
    pub have_credentials: bool,
}

impl AcctMgrInfo {
    pub fn is_attached(&self) -> bool {
        !self.url.is_empty()
    }
}
