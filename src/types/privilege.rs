use std::fmt;

use serde::{Deserialize, Serialize};

/// A server privilege issued as its own `GRANT` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Privilege {
    All,
    Insert,
    Update,
    Select,
}

impl Privilege {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Privilege::All => "ALL",
            Privilege::Insert => "INSERT",
            Privilege::Update => "UPDATE",
            Privilege::Select => "SELECT",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_displays_as_keyword() {
        assert_eq!(Privilege::Select.to_string(), "SELECT");
        assert_eq!(Privilege::All.to_string(), "ALL");
    }
}
