//! Stage 4: docset layout and archive.
//!
//! ```text
//! <Name>.docset/
//!   icon.png, icon@2x.png
//!   Contents/
//!     Info.plist
//!     Resources/
//!       LICENSE
//!       docSet.dsidx
//!       Documents/**
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use poshdocset_shared::paths::to_slash_path;
use poshdocset_shared::{DocsetError, Result, RunConfig};

use crate::tree;

const INFO_PLIST: &str = "Info.plist";
const LICENSE_SOURCE: &str = "DASH_LICENSE";
const ICONS: &[&str] = &["icon.png", "icon@2x.png"];

/// The finished archive on disk.
#[derive(Debug, Clone)]
pub struct ArchiveMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Reset the packaged checkpoint, copy `enriched` into `Documents/`, and
/// place the static files. Returns the number of documents copied.
#[instrument(skip_all, fields(docset = %config.docset_dir().display()))]
pub fn lay_out_docset(config: &RunConfig, enriched: &Path) -> Result<usize> {
    tree::reset_dir(&config.packaged_dir())?;

    let documents = config.documents_dir();
    std::fs::create_dir_all(&documents).map_err(|e| DocsetError::io(&documents, e))?;
    let copied = tree::copy_tree(enriched, &documents)?;

    let contents = config.docset_dir().join("Contents");
    let plist_source = config.static_dir.join(INFO_PLIST);
    if plist_source.is_file() {
        copy_file(&plist_source, &contents.join(INFO_PLIST))?;
    } else {
        warn!(path = %plist_source.display(), "no static Info.plist, generating one");
        let plist = contents.join(INFO_PLIST);
        std::fs::write(&plist, info_plist(config)).map_err(|e| DocsetError::io(&plist, e))?;
    }

    let license = config.static_dir.join(LICENSE_SOURCE);
    if license.is_file() {
        copy_file(&license, &config.resources_dir().join("LICENSE"))?;
    } else {
        warn!(path = %license.display(), "no license file, skipped");
    }

    for icon in ICONS {
        let source = config.static_dir.join(icon);
        if source.is_file() {
            copy_file(&source, &config.docset_dir().join(icon))?;
        } else {
            warn!(path = %source.display(), "icon missing, skipped");
        }
    }

    info!(documents = copied, "docset laid out");
    Ok(copied)
}

/// Property list for a docset whose static directory ships none.
pub fn info_plist(config: &RunConfig) -> String {
    let name = &config.docset_name;
    let identifier = name.to_lowercase();
    let index = to_slash_path(&config.start_page_rel());

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleIdentifier</key>
	<string>{identifier}</string>
	<key>CFBundleName</key>
	<string>{name}</string>
	<key>DocSetPlatformFamily</key>
	<string>{identifier}</string>
	<key>dashIndexFilePath</key>
	<string>{index}</string>
	<key>isDashDocset</key>
	<true/>
</dict>
</plist>
"#
    )
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocsetError::io(parent, e))?;
    }
    std::fs::copy(source, dest).map_err(|e| DocsetError::io(dest, e))?;
    debug!(from = %source.display(), to = %dest.display(), "copied static file");
    Ok(())
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Compress the docset directory into `<archive_dir>/<Name>.<ext>`.
///
/// The archive is written as `<Name>.tar`, renamed to `.tar.gz`, then to the
/// configured extension. Its only top-level entry is `<Name>.docset`.
#[instrument(skip_all, fields(archive_dir = %config.archive_dir().display()))]
pub fn write_archive(config: &RunConfig) -> Result<ArchiveMeta> {
    let archive_dir = config.archive_dir();
    std::fs::create_dir_all(&archive_dir).map_err(|e| DocsetError::io(&archive_dir, e))?;

    let name = &config.docset_name;
    let tar_path = archive_dir.join(format!("{name}.tar"));
    let targz_path = archive_dir.join(format!("{name}.tar.gz"));
    let final_path = archive_dir.join(format!("{name}.{}", config.archive_extension));

    let docset_dir = config.docset_dir();
    let file = File::create(&tar_path).map_err(|e| DocsetError::io(&tar_path, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder
        .append_dir_all(format!("{name}.docset"), &docset_dir)
        .map_err(|e| DocsetError::Archive(format!("{}: {e}", docset_dir.display())))?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| DocsetError::Archive(format!("{}: {e}", tar_path.display())))?;

    std::fs::rename(&tar_path, &targz_path).map_err(|e| DocsetError::io(&targz_path, e))?;
    if final_path != targz_path {
        std::fs::rename(&targz_path, &final_path).map_err(|e| DocsetError::io(&final_path, e))?;
    }

    let (sha256, size_bytes) = digest(&final_path)?;
    info!(path = %final_path.display(), size_bytes, %sha256, "archive written");

    Ok(ArchiveMeta {
        path: final_path,
        sha256,
        size_bytes,
    })
}

fn digest(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path).map_err(|e| DocsetError::io(path, e))?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut file, &mut hasher).map_err(|e| DocsetError::io(path, e))?;
    Ok((format!("{:x}", hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{run_config, temp_root};
    use flate2::read::GzDecoder;
    use std::collections::BTreeSet;

    fn seed_enriched(root: &Path) -> PathBuf {
        let enriched = root.join("enriched");
        let page = enriched.join("docs.microsoft.com/en-us/powershell/module/Core/Get-Help.html");
        std::fs::create_dir_all(page.parent().unwrap()).unwrap();
        std::fs::write(&page, "<html></html>").unwrap();
        enriched
    }

    fn seed_static(root: &Path) -> PathBuf {
        let dir = root.join("static");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Info.plist"), "<plist/>").unwrap();
        std::fs::write(dir.join("DASH_LICENSE"), "license").unwrap();
        std::fs::write(dir.join("icon.png"), b"png").unwrap();
        std::fs::write(dir.join("icon@2x.png"), b"png2").unwrap();
        dir
    }

    #[test]
    fn layout_places_static_files() {
        let root = temp_root("package_layout");
        let config = run_config("http://127.0.0.1:1", &root, &seed_static(&root));

        let copied = lay_out_docset(&config, &seed_enriched(&root)).unwrap();
        assert_eq!(copied, 1);

        let docset = config.docset_dir();
        assert_eq!(
            std::fs::read_to_string(docset.join("Contents/Info.plist")).unwrap(),
            "<plist/>"
        );
        assert_eq!(
            std::fs::read_to_string(config.resources_dir().join("LICENSE")).unwrap(),
            "license"
        );
        assert!(docset.join("icon.png").is_file());
        assert!(docset.join("icon@2x.png").is_file());
        assert!(config
            .documents_dir()
            .join("docs.microsoft.com/en-us/powershell/module/Core/Get-Help.html")
            .is_file());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_plist_is_generated() {
        let root = temp_root("package_plist");
        let config = run_config("http://127.0.0.1:1", &root, &root.join("no-static"));

        lay_out_docset(&config, &seed_enriched(&root)).unwrap();
        let plist =
            std::fs::read_to_string(config.docset_dir().join("Contents/Info.plist")).unwrap();
        assert!(plist.contains("<string>Powershell</string>"));
        assert!(plist.contains("<string>127.0.0.1/en-us/index.html</string>"));
        assert!(plist.contains("<key>isDashDocset</key>"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn archive_has_single_docset_root() {
        let root = temp_root("package_archive");
        let config = run_config("http://127.0.0.1:1", &root, &seed_static(&root));
        lay_out_docset(&config, &seed_enriched(&root)).unwrap();

        let meta = write_archive(&config).unwrap();
        assert_eq!(meta.path, config.archive_dir().join("Powershell.tgz"));
        assert_eq!(meta.sha256.len(), 64);
        assert!(!config.archive_dir().join("Powershell.tar").exists());
        assert!(!config.archive_dir().join("Powershell.tar.gz").exists());

        let file = File::open(&meta.path).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let roots: BTreeSet<String> = archive
            .entries()
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                let path = entry.path().unwrap().into_owned();
                path.components()
                    .next()
                    .unwrap()
                    .as_os_str()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(roots, BTreeSet::from(["Powershell.docset".to_string()]));

        let _ = std::fs::remove_dir_all(&root);
    }
}
