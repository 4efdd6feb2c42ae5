use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{Command, ShellState};
use crate::vfs::VirtualPath;

pub struct CdCommand;

#[async_trait]
impl Command for CdCommand {
    fn name(&self) -> &str {
        "cd"
    }

    fn usage(&self) -> &str {
        "cd PATH - Change current directory"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let Some(path_str) = args.first() else {
            // cd with no args goes to root
            state.set_current_path(VirtualPath::root());
            return Ok(());
        };

        let target = state.resolve_arg(path_str);
        let entry = state.router().resolve(&target).await?;
        if !entry.is_directory {
            return Err(anyhow!("Not a directory: {path_str}"));
        }

        state.set_current_path(target);
        Ok(())
    }
}
