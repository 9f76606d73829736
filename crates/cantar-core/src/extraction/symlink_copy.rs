//! Copy-mode symlink materialization.
//!
//! When symlinks cannot (or should not) be created, each symlink entry is
//! replaced by a copy of whatever its target resolves to. Targets are
//! resolved purely against the known-path map, never the live filesystem,
//! so a hostile archive cannot redirect the copies. Unresolvable, cyclic
//! or escaping links are dropped with a warning rather than failing the
//! extraction.

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::host::{sys_path, Host};
use crate::report::ExtractReport;
use crate::types::KnownPaths;

/// Symlink chains longer than this are treated as unresolvable.
const MAX_LINK_DEPTH: usize = 40;

/// Copies every deferred symlink's resolved target into place.
///
/// Copies are emitted in dependency order: a link whose target directory
/// still contains another pending link is postponed until that inner link
/// has been materialized, so nested copies see complete trees.
pub(crate) fn materialize(
    root: &Path,
    host: &dyn Host,
    known: &KnownPaths,
    links: &[String],
    report: &mut ExtractReport,
) -> Result<()> {
    let mut pending: Vec<(String, String)> = Vec::new();
    for path in links {
        // A later archive entry may have replaced the symlink entirely.
        let Some(target) = known.symlink_target(path) else {
            continue;
        };
        match resolve_chain(path, target, known) {
            Ok(resolved) => pending.push((path.clone(), resolved)),
            Err(reason) => report
                .warnings
                .push(format!("dropping symlink {path:?}: {reason}")),
        }
    }

    while !pending.is_empty() {
        let ready = pending.iter().position(|(_, target)| {
            !pending
                .iter()
                .any(|(other, _)| other == target || is_under(other, target))
        });
        let Some(idx) = ready else {
            for (path, _) in &pending {
                report
                    .warnings
                    .push(format!("dropping symlink {path:?}: mutually nested targets"));
            }
            break;
        };
        let (path, target) = pending.remove(idx);
        host.copy_recursive(&sys_path(root, &target), &sys_path(root, &path))?;
        report.symlinks_created += 1;
    }
    Ok(())
}

fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Resolves a symlink all the way to a concrete archive path.
fn resolve_chain(path: &str, target: &str, known: &KnownPaths) -> std::result::Result<String, String> {
    let mut current = resolve_location(path, target, known, MAX_LINK_DEPTH)?;

    let mut visited: HashSet<String> = HashSet::new();
    while let Some(next_target) = known.symlink_target(&current) {
        if !visited.insert(current.clone()) {
            return Err("cyclic symlink chain".to_string());
        }
        current = resolve_location(&current, next_target, known, MAX_LINK_DEPTH)?;
    }

    let wants_directory = target.ends_with('/') || target == ".";
    if wants_directory && !known.is_directory(&current) {
        return Err("target does not resolve to a directory".to_string());
    }
    if known.get(&current).is_none() {
        return Err(format!("target {current:?} is not in the archive"));
    }
    if current == path || is_under(path, &current) || is_under(&current, path) {
        return Err("self-referential target".to_string());
    }
    Ok(current)
}

/// Walks `target` as a POSIX path relative to the link's directory,
/// substituting intermediate components that are themselves symlinks.
fn resolve_location(
    link_path: &str,
    target: &str,
    known: &KnownPaths,
    depth: usize,
) -> std::result::Result<String, String> {
    if depth == 0 {
        return Err("too many levels of symlinks".to_string());
    }
    if target.starts_with('/') {
        return Err("absolute target".to_string());
    }

    let mut stack: Vec<String> = match link_path.rfind('/') {
        Some(idx) => link_path[..idx].split('/').map(String::from).collect(),
        None => Vec::new(),
    };
    let comps: Vec<&str> = target
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    for (idx, comp) in comps.iter().enumerate() {
        if *comp == ".." {
            if stack.pop().is_none() {
                return Err("target escapes the extraction root".to_string());
            }
            continue;
        }
        stack.push((*comp).to_string());
        if idx + 1 < comps.len() {
            let current = stack.join("/");
            if let Some(next) = known.symlink_target(&current) {
                let resolved = resolve_location(&current, next, known, depth - 1)?;
                stack = resolved.split('/').map(String::from).collect();
            }
        }
    }

    if stack.is_empty() {
        return Err("target resolves to the extraction root".to_string());
    }
    Ok(stack.join("/"))
}
