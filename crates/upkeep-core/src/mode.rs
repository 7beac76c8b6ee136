use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    Stable,
    Beta,
    Repository,
}

impl UpdateMode {
    pub const ALL: [UpdateMode; 3] = [Self::Stable, Self::Beta, Self::Repository];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Repository => "repository",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "stable" => Some(Self::Stable),
            "beta" => Some(Self::Beta),
            "repository" => Some(Self::Repository),
            _ => None,
        }
    }
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform-specific release line: the branch name used by the beta feed and
/// the codename directory used by the stable feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub codename: String,
}

impl Branch {
    pub fn new(name: impl Into<String>, codename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codename: codename.into(),
        }
    }

    pub fn for_host_major(major: u32) -> Self {
        if major > 18 {
            Self::new("develop_kodi21", "matrix")
        } else {
            Self::new("addon_kodi18", "leia")
        }
    }
}
