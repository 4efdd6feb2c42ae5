//! Output helpers for shell commands.
//!
//! Output piped into something like `head` may have its reader go away
//! early. A BrokenPipe ends the command with `Ok(())`; other I/O errors
//! propagate.

/// Print with newline, returning `Ok(())` from the caller on BrokenPipe
macro_rules! print_line {
    ($($arg:tt)*) => {{
        use std::io::Write;
        match writeln!(std::io::stdout(), $($arg)*) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }};
}

/// Print without newline, returning `Ok(())` from the caller on BrokenPipe
macro_rules! print_str {
    ($($arg:tt)*) => {{
        use std::io::Write;
        match write!(std::io::stdout(), $($arg)*) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }};
}

pub(crate) use print_line;
pub(crate) use print_str;
