//! Resources shared by every handler of one invocation.

use crate::cmd::format::Sink;
use crate::cmd::input::Input;
use crate::config::Config;
use crate::error::Error;
use crate::github::{Api, Repo, RepoInfo};

/// Built once in `main`, read-only for the rest of the run.
pub struct RunContext {
    pub api: Box<dyn Api>,
    pub repository: Option<RepoInfo>,
    pub sink: Sink,
    pub input: Input,
    pub config: Config,
}

impl RunContext {
    pub fn api(&self) -> &dyn Api {
        self.api.as_ref()
    }

    /// The run's repository, or an error for handlers that need one.
    pub fn repo(&self) -> Result<Repo<'_>, Error> {
        let info = self.repository.as_ref().ok_or_else(|| {
            Error::RepositoryResolution(
                "no repository: pass --repo OWNER/NAME or run inside a clone with a GitHub 'origin' remote"
                    .into(),
            )
        })?;
        Ok(Repo {
            api: self.api(),
            info,
        })
    }
}
