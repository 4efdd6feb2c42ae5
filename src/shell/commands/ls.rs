use anyhow::{Result, anyhow};
use async_trait::async_trait;
use colored::*;

use super::output::print_line;
use super::{Command, ShellState};
use crate::vfs::{CacheEntry, PathRouter, VirtualPath};

pub struct LsCommand;

#[async_trait]
impl Command for LsCommand {
    fn name(&self) -> &str {
        "ls"
    }

    fn usage(&self) -> &str {
        "ls [-l] [PATH] - List directory contents"
    }

    async fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let mut long_format = false;
        let mut path_arg: Option<&str> = None;

        for arg in args {
            if arg == "-l" {
                long_format = true;
            } else if arg.starts_with('-') {
                return Err(anyhow!("ls: unknown option {arg}"));
            } else if path_arg.is_none() {
                path_arg = Some(arg.as_str());
            }
        }

        // Wildcards apply to the last segment only
        let (dir, filter_pattern) = match path_arg {
            Some(path) if path.contains('*') || path.contains('?') => {
                let (parent, pattern) = match path.rfind('/') {
                    Some(pos) => (&path[..pos.max(1)], &path[pos + 1..]),
                    None => ("", path),
                };
                (state.resolve_arg(parent), Some(pattern.to_string()))
            }
            Some(path) => (state.resolve_arg(path), None),
            None => (state.current_path().clone(), None),
        };

        let router = state.router();
        let children = router.list(&dir).await?;

        if Self::volume_state(router, &dir) == Some(false) {
            print_line!(
                "{}",
                format!("{dir} is a locked encrypted volume; use `unlock {dir} PASSWORD`").yellow()
            );
        }

        if long_format {
            print_line!("{:<50} {:>12} MODIFIED", "NAME", "SIZE");
            print_line!("{}", "-".repeat(80));
        }

        for child in &children {
            let name = child.name().unwrap_or("/");
            if !Self::should_display(name, &filter_pattern) {
                continue;
            }
            // A listing that raced an unlock is returned without its entries cached
            let entry = match router.cached(child) {
                Some(entry) => entry,
                None => router.resolve(child).await?,
            };

            let display = Self::display_name(router, &entry, name);
            if long_format {
                let size = if entry.is_directory {
                    "-".to_string()
                } else {
                    humansize::format_size(entry.size, humansize::BINARY)
                };
                let modified = entry
                    .last_modified
                    .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                print_line!("{:<50} {:>12} {}", display, size, modified);
            } else {
                print_line!("{display}");
            }
        }

        Ok(())
    }
}

impl LsCommand {
    /// Name with a trailing `/` for directories and a tag for known volume roots
    fn display_name(router: &PathRouter, entry: &CacheEntry, name: &str) -> String {
        if !entry.is_directory {
            return name.to_string();
        }

        let dir = format!("{name}/").blue().bold().to_string();
        match Self::volume_state(router, &entry.path) {
            Some(true) => format!("{dir} {}", "[unlocked]".green()),
            Some(false) => format!("{dir} {}", "[locked]".yellow()),
            None => dir,
        }
    }

    /// `Some(unlocked)` for directories known to be volume roots
    fn volume_state(router: &PathRouter, path: &VirtualPath) -> Option<bool> {
        if router.is_volume_unlocked(path) {
            return Some(true);
        }
        match router.is_encrypted_root(path) {
            Ok(Some(true)) => Some(false),
            _ => None,
        }
    }

    fn should_display(filename: &str, filter_pattern: &Option<String>) -> bool {
        match filter_pattern {
            Some(pattern) => Self::matches_pattern(filename, pattern),
            None => true,
        }
    }

    /// Match a filename against a simple wildcard pattern (* and ?)
    fn matches_pattern(filename: &str, pattern: &str) -> bool {
        let name: Vec<char> = filename.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();

        // Backtracking over the most recent `*`
        let (mut n, mut p) = (0, 0);
        let mut star: Option<(usize, usize)> = None;

        while n < name.len() {
            match pattern.get(p) {
                Some('*') => {
                    star = Some((p, n));
                    p += 1;
                }
                Some('?') => {
                    n += 1;
                    p += 1;
                }
                Some(c) if *c == name[n] => {
                    n += 1;
                    p += 1;
                }
                _ => match star {
                    Some((star_p, star_n)) => {
                        p = star_p + 1;
                        n = star_n + 1;
                        star = Some((star_p, star_n + 1));
                    }
                    None => return false,
                },
            }
        }

        pattern[p..].iter().all(|c| *c == '*')
    }
}
