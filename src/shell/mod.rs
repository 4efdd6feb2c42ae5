pub mod commands;

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;

use crate::vfs::{PathRouter, VirtualPath};
use commands::Command;

/// Shell state - tracks the working directory and dispatches commands
pub struct ShellState {
    router: PathRouter,
    /// Current working directory in the unified view
    current_path: VirtualPath,
    commands: HashMap<String, Arc<dyn Command>>,
}

impl ShellState {
    /// Shell over `router` with the built-in commands, starting at `/`
    pub fn new(router: PathRouter) -> Self {
        let mut state = Self::from_components(router, VirtualPath::root());

        state.register_command(Arc::new(commands::ls::LsCommand));
        state.register_command(Arc::new(commands::cd::CdCommand));
        state.register_command(Arc::new(commands::cat::CatCommand));
        state.register_command(Arc::new(commands::unlock::UnlockCommand));

        state
    }

    /// Shell with no commands registered (useful for testing)
    pub fn from_components(router: PathRouter, current_path: VirtualPath) -> Self {
        ShellState {
            router,
            current_path,
            commands: HashMap::new(),
        }
    }

    pub fn register_command(&mut self, command: Arc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Execute a command line
    ///
    /// `exit` and `quit` are reported as an error whose message is `exit`.
    pub async fn execute(&mut self, line: &str) -> Result<()> {
        let parts = Self::parse_command_line(line.trim())?;

        let Some((cmd_name, args)) = parts.split_first() else {
            return Ok(());
        };

        match cmd_name.as_str() {
            "exit" | "quit" => {
                return Err(anyhow!("exit"));
            }
            "help" => {
                self.print_help();
                return Ok(());
            }
            "pwd" => {
                println!("{}", self.current_path);
                return Ok(());
            }
            _ => {}
        }

        if let Some(command) = self.commands.get(cmd_name) {
            let cmd = Arc::clone(command);
            cmd.execute(self, args).await
        } else {
            Err(anyhow!("Unknown command: {cmd_name}"))
        }
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    pub fn current_path(&self) -> &VirtualPath {
        &self.current_path
    }

    pub fn set_current_path(&mut self, path: VirtualPath) {
        self.current_path = path;
    }

    /// Absolute path for a command argument
    pub fn resolve_arg(&self, arg: &str) -> VirtualPath {
        if arg.starts_with('/') {
            VirtualPath::parse(arg)
        } else {
            self.current_path.join(arg)
        }
    }

    fn print_help(&self) {
        println!("Available commands:");
        let mut names: Vec<&String> = self.commands.keys().collect();
        names.sort();
        for name in names {
            if let Some(command) = self.commands.get(name) {
                println!("  {}", command.usage());
            }
        }
        println!("  pwd - Print working directory");
        println!("  help - Show this help");
        println!("  exit/quit - Exit the shell");
    }

    /// Get the prompt string
    pub fn prompt(&self) -> String {
        format!("vaultsh:{} $ ", self.current_path)
    }

    /// Parse command line respecting quotes (both single and double)
    fn parse_command_line(line: &str) -> Result<Vec<String>> {
        let mut args = Vec::new();
        let mut current_arg = String::new();
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut escape_next = false;
        // Tracks quoted empty strings such as ''
        let mut quoted = false;

        for ch in line.chars() {
            if escape_next {
                current_arg.push(ch);
                escape_next = false;
                continue;
            }

            match ch {
                '\\' if !in_single_quote => {
                    escape_next = true;
                }
                '\'' if !in_double_quote => {
                    in_single_quote = !in_single_quote;
                    quoted = true;
                }
                '"' if !in_single_quote => {
                    in_double_quote = !in_double_quote;
                    quoted = true;
                }
                ' ' | '\t' if !in_single_quote && !in_double_quote => {
                    if !current_arg.is_empty() || quoted {
                        args.push(std::mem::take(&mut current_arg));
                        quoted = false;
                    }
                }
                _ => {
                    current_arg.push(ch);
                }
            }
        }

        if !current_arg.is_empty() || quoted {
            args.push(current_arg);
        }

        if in_single_quote {
            return Err(anyhow!("Unclosed single quote"));
        }
        if in_double_quote {
            return Err(anyhow!("Unclosed double quote"));
        }

        Ok(args)
    }
}
