//! Command-line arguments.

use anyhow::{bail, Result};

pub const USAGE: &str = "usage: encoder <source-path> [resource-id]";

/// What to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Location of the source video within input storage.
    pub source_path: String,
    /// External reference stored with the video record.
    pub resource_id: String,
}

impl Args {
    /// Parse arguments, excluding the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let source_path = match args.next() {
            Some(path) if !path.trim().is_empty() => path,
            _ => bail!("missing source path\n{}", USAGE),
        };
        let resource_id = args.next().unwrap_or_default();
        if let Some(extra) = args.next() {
            bail!("unexpected argument {:?}\n{}", extra, USAGE);
        }
        Ok(Self {
            source_path,
            resource_id,
        })
    }
}
