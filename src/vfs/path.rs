use std::fmt;
use std::str::FromStr;

/// An absolute, slash-separated path in the unified view.
///
/// Paths are stored as parsed segments so that ancestor checks compare whole
/// segments: `/docs2` is not inside `/doc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VirtualPath {
    /// Path segments (e.g., ["docs", "notes", "todo.txt"])
    segments: Vec<String>,
}

impl VirtualPath {
    /// The root path `/`
    pub fn root() -> Self {
        VirtualPath {
            segments: Vec::new(),
        }
    }

    /// Parse a path string into a VirtualPath
    ///
    /// Leading, trailing and repeated slashes are ignored, `.` segments are
    /// dropped and `..` removes the previous segment. Relative input is read
    /// as relative to the root.
    pub fn parse(path: &str) -> Self {
        VirtualPath::root().join(path)
    }

    /// Get the path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments below the root
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Get the parent path (`None` for the root)
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            let mut parent_segments = self.segments.clone();
            parent_segments.pop();
            Some(VirtualPath {
                segments: parent_segments,
            })
        }
    }

    /// Get the last segment (file name)
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Join this path with a relative path string
    pub fn join(&self, other: &str) -> Self {
        let mut new_segments = self.segments.clone();

        for segment in other.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            } else if segment == ".." {
                new_segments.pop();
            } else {
                new_segments.push(segment.to_string());
            }
        }

        VirtualPath {
            segments: new_segments,
        }
    }

    /// Append every segment of `relative` to this path
    pub fn concat(&self, relative: &VirtualPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        VirtualPath { segments }
    }

    /// Whether `ancestor` is this path or one of its ancestors
    pub fn starts_with(&self, ancestor: &VirtualPath) -> bool {
        self.segments.len() >= ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    /// Strip `ancestor` off the front of this path
    ///
    /// Returns the remainder as a path relative to `ancestor`, which is `/`
    /// when both are equal, or `None` when `ancestor` does not contain this
    /// path.
    pub fn strip_prefix(&self, ancestor: &VirtualPath) -> Option<VirtualPath> {
        if !self.starts_with(ancestor) {
            return None;
        }
        Some(VirtualPath {
            segments: self.segments[ancestor.segments.len()..].to_vec(),
        })
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "/")
        } else {
            for segment in &self.segments {
                write!(f, "/{segment}")?;
            }
            Ok(())
        }
    }
}

impl FromStr for VirtualPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VirtualPath::parse(s))
    }
}

impl From<&str> for VirtualPath {
    fn from(s: &str) -> Self {
        VirtualPath::parse(s)
    }
}
