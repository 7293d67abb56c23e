//! Commit history tooling: conventional-commit reporting and a
//! message suggestion for the staged diff.

use std::collections::BTreeMap;

use anyhow::Result;
use colored::Colorize;
use regex::Regex;

use crate::git;

use super::GlobalOpts;

/// `commit report`: count recent commit subjects by conventional
/// type.
pub async fn report(_opts: &GlobalOpts) -> Result<()> {
    let subjects = git::recent_subjects(200)?;
    if subjects.is_empty() {
        println!("No commits found");
        return Ok(());
    }

    let pattern = conventional_pattern();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut unconventional = 0usize;
    for subject in &subjects {
        match pattern.captures(subject) {
            Some(captures) => {
                *by_type.entry(captures[1].to_string()).or_default() += 1;
            }
            None => unconventional += 1,
        }
    }

    println!("Last {} commits:", subjects.len());
    for (commit_type, count) in &by_type {
        println!("   {:<10} {}", commit_type.cyan(), count);
    }
    if unconventional > 0 {
        println!("   {:<10} {}", "other".dimmed(), unconventional);
    }
    Ok(())
}

/// `commit suggest`: infer a conventional prefix from the staged
/// paths.
pub async fn suggest(_opts: &GlobalOpts) -> Result<()> {
    let staged = git::staged_files()?;
    if staged.is_empty() {
        println!("Nothing staged; stage changes first");
        return Ok(());
    }

    let suggestion = suggest_for(&staged);
    println!("{suggestion}");
    Ok(())
}

fn conventional_pattern() -> Regex {
    Regex::new(r"^(\w+)(\([^)]+\))?(!)?:\s").expect("static pattern")
}

fn suggest_for(staged: &[String]) -> String {
    let all = |predicate: fn(&str) -> bool| staged.iter().all(|p| predicate(p));

    let commit_type = if all(|p| p.ends_with(".md")) {
        "docs"
    } else if all(|p| p.contains("test")) {
        "test"
    } else if all(|p| {
        p.ends_with(".yml") || p.ends_with(".yaml") || p.ends_with(".toml")
    }) {
        "chore"
    } else {
        "feat"
    };

    // Scope from the most common top-level directory.
    let mut dirs: BTreeMap<&str, usize> = BTreeMap::new();
    for path in staged {
        if let Some((dir, _)) = path.split_once('/') {
            *dirs.entry(dir).or_default() += 1;
        }
    }
    let scope = dirs
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(dir, _)| *dir);

    match scope {
        Some(scope) => format!("{commit_type}({scope}): "),
        None => format!("{commit_type}: "),
    }
}
