//! BagIt bag assembly and compression.

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::config::PackagingConfig;
use super::error::PackageError;
use crate::checksum::{file_checksums, sha256_file, ChecksumAlgorithm};
use crate::derivative::{ArtifactClass, DerivativeArtifact, WorkArea};
use crate::locator::{Bundle, BundleFormat};
use crate::registrar::ArchivalDescription;

const BAGIT_TXT: &str = "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n";

/// Builds the archival package for a bundle's source files.
#[derive(Debug, Clone)]
pub struct ArchivalPackager {
    config: PackagingConfig,
}

/// Descriptive fields written to bag-info.txt.
#[derive(Debug, Clone)]
pub struct BagMetadata {
    pub format: BundleFormat,
    pub description: ArchivalDescription,
}

struct PayloadEntry {
    /// Path relative to the bag root, `data/...`.
    relative: String,
    digests: Vec<String>,
    size: u64,
}

impl ArchivalPackager {
    pub fn new(config: PackagingConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Assembles the bag in the work area and compresses it to `<id>.tar.gz`.
    pub async fn build(
        &self,
        bundle: &Bundle,
        metadata: &BagMetadata,
        work_area: &WorkArea,
    ) -> Result<DerivativeArtifact, PackageError> {
        if self.config.algorithms.is_empty() {
            return Err(PackageError::NoAlgorithms);
        }
        let sources = bundle.source_files();
        if sources.is_empty() {
            return Err(PackageError::EmptyPayload);
        }

        let bag_dir = work_area.file(&bundle.id);
        let data_dir = bag_dir.join("data");
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| PackageError::io(&data_dir, e))?;

        let mut payload = Vec::with_capacity(sources.len());
        for source in &sources {
            let Some(name) = source.file_name() else {
                continue;
            };
            let target = data_dir.join(name);
            link_or_copy(source, &target).await?;

            let (digests, size) = file_checksums(&target, &self.config.algorithms)
                .await
                .map_err(|e| PackageError::io(&target, e))?;
            payload.push(PayloadEntry {
                relative: format!("data/{}", name.to_string_lossy()),
                digests,
                size,
            });
        }
        payload.sort_by(|a, b| a.relative.cmp(&b.relative));

        self.write_tag_files(bundle, metadata, &bag_dir, &payload).await?;
        debug!("Bag for {} assembled at {}", bundle.id, bag_dir.display());

        let output = work_area.file(&format!("{}.tar.gz", bundle.id));
        compress(bag_dir.clone(), bundle.id.clone(), output.clone()).await?;
        fs::remove_dir_all(&bag_dir)
            .await
            .map_err(|e| PackageError::io(&bag_dir, e))?;

        let size_bytes = fs::metadata(&output)
            .await
            .map_err(|e| PackageError::io(&output, e))?
            .len();
        let sha256 = sha256_file(&output)
            .await
            .map_err(|e| PackageError::io(&output, e))?;

        info!(
            "Packaged {} ({} payload files, {} bytes compressed)",
            bundle.id,
            payload.len(),
            size_bytes
        );

        let class = ArtifactClass::Package;
        Ok(DerivativeArtifact {
            bundle_id: bundle.id.clone(),
            class,
            local_path: output,
            remote_key: class.remote_key(&bundle.id),
            content_type: class.content_type().to_string(),
            size_bytes,
            sha256,
        })
    }

    async fn write_tag_files(
        &self,
        bundle: &Bundle,
        metadata: &BagMetadata,
        bag_dir: &Path,
        payload: &[PayloadEntry],
    ) -> Result<(), PackageError> {
        let mut tag_files = vec!["bagit.txt".to_string(), "bag-info.txt".to_string()];
        write_file(&bag_dir.join("bagit.txt"), BAGIT_TXT).await?;
        write_file(
            &bag_dir.join("bag-info.txt"),
            &self.bag_info(bundle, metadata, payload),
        )
        .await?;

        for (index, algorithm) in self.config.algorithms.iter().enumerate() {
            let manifest: String = payload
                .iter()
                .map(|entry| format!("{}  {}\n", entry.digests[index], entry.relative))
                .collect();
            let name = format!("manifest-{}.txt", algorithm);
            write_file(&bag_dir.join(&name), &manifest).await?;
            tag_files.push(name);
        }

        let mut tagmanifest = String::new();
        for name in &tag_files {
            let path = bag_dir.join(name);
            let (digests, _) = file_checksums(&path, &[ChecksumAlgorithm::Sha256])
                .await
                .map_err(|e| PackageError::io(&path, e))?;
            tagmanifest.push_str(&format!("{}  {}\n", digests[0], name));
        }
        write_file(&bag_dir.join("tagmanifest-sha256.txt"), &tagmanifest).await
    }

    fn bag_info(&self, bundle: &Bundle, metadata: &BagMetadata, payload: &[PayloadEntry]) -> String {
        let octets: u64 = payload.iter().map(|entry| entry.size).sum();
        let mut info = format!(
            "Bagging-Date: {}\nPayload-Oxum: {}.{}\nInternal-Sender-Identifier: {}\n",
            Utc::now().format("%Y-%m-%d"),
            octets,
            payload.len(),
            bundle.id
        );
        info.push_str(&format!("ArchivesSpace-URI: {}\n", metadata.description.uri));
        match &metadata.description.dates {
            Some(dates) => info.push_str(&format!(
                "Start-Date: {}\nEnd-Date: {}\n",
                dates.start.format("%Y-%m-%d"),
                dates.end.format("%Y-%m-%d")
            )),
            None => warn!("Bag for {} carries no dates", bundle.id),
        }
        info.push_str(&format!("Origin: av_digitization_{}\n", metadata.format));
        for rights_id in &self.config.rights_ids {
            info.push_str(&format!("Rights-ID: {}\n", rights_id));
        }
        info
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<(), PackageError> {
    fs::write(path, contents)
        .await
        .map_err(|e| PackageError::io(path, e))
}

/// Hard-links `source` to `target`, copying when linking is not possible.
async fn link_or_copy(source: &Path, target: &Path) -> Result<(), PackageError> {
    if fs::hard_link(source, target).await.is_ok() {
        return Ok(());
    }
    fs::copy(source, target)
        .await
        .map(|_| ())
        .map_err(|e| PackageError::io(source, e))
}

async fn compress(bag_dir: PathBuf, top: String, output: PathBuf) -> Result<(), PackageError> {
    tokio::task::spawn_blocking(move || {
        let file = File::create(&output).map_err(|e| PackageError::io(&output, e))?;
        let mut archive = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        archive
            .append_dir_all(&top, &bag_dir)
            .map_err(|e| PackageError::io(&bag_dir, e))?;
        archive
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map(|_| ())
            .map_err(|e| PackageError::io(&output, e))
    })
    .await
    .map_err(|e| PackageError::Task(e.to_string()))?
}
