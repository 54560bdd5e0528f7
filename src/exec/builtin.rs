// src/exec/builtin.rs

//! Builtin file actions: `clean`, `copy`, `concat`.
//!
//! These run in-process on a [`FileSystem`] (blocking; the collaborator
//! moves them onto the blocking pool). Paths and globs are relative to the
//! project root.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use crate::action::{Action, CleanOptions, ConcatOptions, CopyOptions};
use crate::fs::FileSystem;
use crate::output::OutputSink;
use crate::types::OutputStream;
use crate::watch::rules::build_globset;

pub fn run_builtin(
    fs: &dyn FileSystem,
    root: &Path,
    action: &Action,
    sink: &dyn OutputSink,
    label: &str,
) -> Result<()> {
    let report = |msg: String| sink.line(label, OutputStream::Stdout, &msg);
    match action {
        Action::Clean(opts) => clean(fs, root, opts, &report),
        Action::Copy(opts) => copy(fs, root, opts, &report),
        Action::Concat(opts) => concat(fs, root, opts, &report),
        other => Err(anyhow!("'{}' is not a builtin action", other.kind_name())),
    }
}

fn clean(fs: &dyn FileSystem, root: &Path, opts: &CleanOptions, report: &dyn Fn(String)) -> Result<()> {
    let mut removed = 0usize;
    for pattern in &opts.paths {
        for path in expand(fs, root, pattern)? {
            // A parent removed earlier in this loop takes its children along.
            if !fs.exists(&path) {
                continue;
            }
            fs.remove(&path)
                .with_context(|| format!("cleaning {}", display_rel(root, &path)))?;
            report(format!("Cleaning {}...", display_rel(root, &path)));
            removed += 1;
        }
    }
    debug!(removed, "clean finished");
    report(format!("{removed} path(s) cleaned."));
    Ok(())
}

fn copy(fs: &dyn FileSystem, root: &Path, opts: &CopyOptions, report: &dyn Fn(String)) -> Result<()> {
    let mut copied = 0usize;
    for mapping in &opts.files {
        let sources = expand_files(fs, root, &mapping.src)?;
        if sources.is_empty() {
            bail!("no files match {:?} (copy to '{}')", mapping.src, mapping.dest);
        }

        let dest = root.join(&mapping.dest);
        if mapping.dest_is_dir() {
            for src in &sources {
                let name = src
                    .file_name()
                    .ok_or_else(|| anyhow!("source {:?} has no file name", src))?;
                copy_file(fs, src, &dest.join(name))?;
                copied += 1;
            }
        } else {
            if sources.len() > 1 {
                bail!(
                    "{} files match {:?} but dest '{}' is a file; end it with '/' to copy into a directory",
                    sources.len(),
                    mapping.src,
                    mapping.dest
                );
            }
            copy_file(fs, &sources[0], &dest)?;
            copied += 1;
        }
    }
    report(format!("Copied {copied} file(s)."));
    Ok(())
}

fn copy_file(fs: &dyn FileSystem, src: &Path, dest: &Path) -> Result<()> {
    let contents = fs.read(src)?;
    fs.write(dest, &contents)
        .with_context(|| format!("copying {:?} to {:?}", src, dest))
}

fn concat(fs: &dyn FileSystem, root: &Path, opts: &ConcatOptions, report: &dyn Fn(String)) -> Result<()> {
    let sources = expand_files(fs, root, &opts.src)?;
    if sources.is_empty() {
        bail!("no files match {:?} (concat to '{}')", opts.src, opts.dest);
    }

    let mut out: Vec<u8> = Vec::new();
    for (i, src) in sources.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(opts.separator.as_bytes());
        }
        out.extend_from_slice(&fs.read(src)?);
    }

    let dest = root.join(&opts.dest);
    fs.write(&dest, &out)?;
    report(format!("File {} created.", opts.dest));
    Ok(())
}

/// Files matched by `patterns`, in pattern order, without duplicates.
fn expand_files(fs: &dyn FileSystem, root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        for path in expand(fs, root, pattern)? {
            if fs.is_file(&path) && !files.contains(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Existing paths (files or directories) named by one pattern.
///
/// A pattern without glob metacharacters is a literal path. A matching
/// directory is returned as a whole; its contents are not listed.
fn expand(fs: &dyn FileSystem, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !pattern.contains(['*', '?', '[', '{']) {
        let path = root.join(pattern);
        return Ok(if fs.exists(&path) { vec![path] } else { Vec::new() });
    }

    let set = build_globset(&[pattern.to_string()])?;
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            let rel = display_rel(root, &path);
            if set.is_match(&rel) {
                found.push(path);
            } else if fs.is_dir(&path) {
                stack.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn display_rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
