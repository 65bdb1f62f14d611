//! Command Mapper
//!
//! Turns structured tool parameters into a kubectl command line (without the
//! binary name). The mapper performs no authorization; its output always
//! goes through the validator before anything runs.

use super::catalog::{self, UnknownOperation};
use crate::policy::Classification;

/// Command line built from a structured call, with the catalog classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedCommand {
    pub command_line: String,
    pub classification: Classification,
}

/// Build `<template> [resource] [args]`, joined by single spaces
///
/// Empty segments are omitted. The resource is dropped for operations that
/// consume it as a sub-command or that take no resource.
pub fn build_command(
    group: &str,
    operation: &str,
    resource: &str,
    args: &str,
) -> Result<MappedCommand, UnknownOperation> {
    let entry = catalog::lookup(group, operation, resource)?;

    let resource = if entry.takes_resource { resource.trim() } else { "" };
    let command_line = [entry.template.as_str(), resource, args.trim()]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(MappedCommand {
        command_line,
        classification: entry.classification,
    })
}

/// Unified mode passes the agent's argument string through untouched
pub fn unified(args: &str) -> String {
    args.to_string()
}
