use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

use super::output::{print_line, print_str};
use super::{Command, ShellState};
use crate::storage::collect_bytes;

/// Bytes shown as hex when a file is not valid UTF-8
const HEX_PREVIEW_LEN: usize = 1024;

pub struct CatCommand;

#[async_trait]
impl Command for CatCommand {
    fn name(&self) -> &str {
        "cat"
    }

    fn usage(&self) -> &str {
        "cat FILE - Display file contents"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let Some(path_str) = args.first() else {
            return Err(anyhow!("Usage: cat FILE"));
        };

        let path = state.resolve_arg(path_str);
        let stream = state.router().open_read(&path).await?;
        let bytes = collect_bytes(stream)
            .await
            .with_context(|| format!("Failed to read {path}"))?;

        match std::str::from_utf8(&bytes) {
            Ok(text) => print_str!("{text}"),
            Err(_) => {
                eprintln!("Warning: File contains binary data");
                let display_len = bytes.len().min(HEX_PREVIEW_LEN);
                for (i, byte) in bytes[..display_len].iter().enumerate() {
                    if i % 16 == 0 {
                        print_str!("\n{i:08x}: ");
                    }
                    print_str!("{byte:02x} ");
                }
                print_line!();
                if bytes.len() > HEX_PREVIEW_LEN {
                    eprintln!("... ({} more bytes)", bytes.len() - HEX_PREVIEW_LEN);
                }
            }
        }

        Ok(())
    }
}
