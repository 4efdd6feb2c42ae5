use anyhow::{Result, anyhow};
use async_trait::async_trait;
use colored::*;

use super::output::print_line;
use super::{Command, ShellState};

pub struct UnlockCommand;

#[async_trait]
impl Command for UnlockCommand {
    fn name(&self) -> &str {
        "unlock"
    }

    fn usage(&self) -> &str {
        "unlock PATH PASSWORD - Unlock the encrypted volume rooted at PATH"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let [path_str, password] = args else {
            return Err(anyhow!("Usage: unlock PATH PASSWORD"));
        };

        let root = state.resolve_arg(path_str);
        let entry = state.router().resolve(&root).await?;
        if !entry.is_directory {
            return Err(anyhow!("Not a directory: {path_str}"));
        }

        state.router().unlock(&root, password).await?;
        print_line!("{} {root}", "Unlocked".green());
        Ok(())
    }
}
