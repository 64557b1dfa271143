//! Kinds of units of work that own a log channel

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoggingObjectType {
    /// Top of a hierarchy, e.g. the executing engine or a server process
    Root,
    /// Free-standing subject such as a plain string
    #[default]
    General,
    Job,
    JobEntry,
    Trans,
    Step,
    Database,
    Repository,
    Server,
    Servlet,
}

impl LoggingObjectType {
    pub fn to_str(&self) -> &'static str {
        match self {
            LoggingObjectType::Root => "ROOT",
            LoggingObjectType::General => "GENERAL",
            LoggingObjectType::Job => "JOB",
            LoggingObjectType::JobEntry => "JOBENTRY",
            LoggingObjectType::Trans => "TRANS",
            LoggingObjectType::Step => "STEP",
            LoggingObjectType::Database => "DATABASE",
            LoggingObjectType::Repository => "REPOSITORY",
            LoggingObjectType::Server => "SERVER",
            LoggingObjectType::Servlet => "SERVLET",
        }
    }
}

impl fmt::Display for LoggingObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}
