//! The fixed set of departments a transfer can be scoped to.
//!
//! Each department maps 1:1 to a storage directory under the depot root and
//! to an authorization group in the identity directory; both carry the
//! department's name. The set is static configuration and never changes at
//! runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    Manufacturing,
    Distribution,
}

impl Department {
    /// All departments, in priority order. A user belonging to more than one
    /// department group is assigned the first matching entry.
    pub const ALL: [Department; 2] = [Department::Manufacturing, Department::Distribution];

    pub fn name(self) -> &'static str {
        match self {
            Department::Manufacturing => "Manufacturing",
            Department::Distribution => "Distribution",
        }
    }

    /// Authorization group controlling membership of this department.
    pub fn group(self) -> &'static str {
        self.name()
    }

    /// Directory name under the depot root.
    pub fn dir_name(self) -> &'static str {
        self.name()
    }

    /// Stable index into per-department tables (lock table, etc.).
    pub fn index(self) -> usize {
        match self {
            Department::Manufacturing => 0,
            Department::Distribution => 1,
        }
    }

    pub fn from_name(s: &str) -> Option<Department> {
        Department::ALL.iter().copied().find(|d| d.name() == s)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Department {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::from_name(s).ok_or(())
    }
}
