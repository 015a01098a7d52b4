use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Ensure the output directory exists, creating parents as needed.
pub fn ensure_directory(base_path: &Path) -> io::Result<()> {
    if !base_path.exists() {
        fs::create_dir_all(base_path)?;
        tracing::info!("Created directory: {}", base_path.display());
    }
    Ok(())
}

/// File name an image is stored under: the last path segment of its URL.
pub fn image_file_name(image_url: &str) -> Option<String> {
    let segment = match Url::parse(image_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => image_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    }?;
    let segment = urlencoding::decode(&segment).ok()?.into_owned();

    // Names come from a remote page; never let one climb out of the output directory.
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return None;
    }
    Some(segment)
}

pub fn destination_path(output_dir: &Path, file_name: &str) -> PathBuf {
    output_dir.join(file_name)
}
