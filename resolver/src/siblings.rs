use grouptabs_groups::Link;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

/// Direct file children of a directory, sorted by file name. Subdirectories
/// are never descended into.
pub fn list_dir_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
    Ok(files)
}

/// All files in the directory of `file`, the current file first.
pub fn folder_links(file: &Path) -> io::Result<Vec<Link>> {
    let siblings = siblings_of(file)?;
    Ok(current_first(file, siblings))
}

/// Files sharing the name of `file` ignoring the final extension
/// (`foo.ts` and `foo.css`), the current file first.
pub fn same_name_links(file: &Path) -> io::Result<Vec<Link>> {
    let stem = match file.file_stem() {
        Some(stem) => stem.to_os_string(),
        None => return Ok(vec![Link::new(file)]),
    };
    let matching = siblings_of(file)?
        .into_iter()
        .filter(|candidate| candidate.file_stem() == Some(stem.as_os_str()))
        .collect();
    Ok(current_first(file, matching))
}

/// Files sharing the first-dot-delimited stem of `file`
/// (`user.service.ts` and `user.component.html` share feature `user`),
/// the current file first.
pub fn same_feature_links(file: &Path) -> io::Result<Vec<Link>> {
    let feature = match feature_stem(file) {
        Some(feature) => feature,
        None => return Ok(vec![Link::new(file)]),
    };
    let matching = siblings_of(file)?
        .into_iter()
        .filter(|candidate| feature_stem(candidate).as_deref() == Some(feature.as_str()))
        .collect();
    Ok(current_first(file, matching))
}

fn siblings_of(file: &Path) -> io::Result<Vec<PathBuf>> {
    match file.parent() {
        Some(parent) => list_dir_files(parent),
        None => Ok(vec![file.to_path_buf()]),
    }
}

fn feature_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let feature = name.split('.').next().unwrap_or(&name);
    if feature.is_empty() {
        return None;
    }
    Some(feature.to_string())
}

fn current_first(file: &Path, paths: Vec<PathBuf>) -> Vec<Link> {
    let mut links: Vec<Link> = Vec::with_capacity(paths.len() + 1);
    links.push(Link::new(file));
    for path in paths {
        if path != file {
            links.push(Link::new(path));
        }
    }
    links
}
