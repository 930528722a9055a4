//! Archive codec: a gzip-compressed tar holding one JSON file per resource
//! followed by `manifest.json`.
//!
//! Every header timestamp is taken from the manifest's creation time, so the
//! same manifest always encodes to the same bytes.

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

use crate::manifest::{BackupManifest, MANIFEST_FILE};
use crate::models::KubernetesResource;
use crate::{Error, Result};

/// Decoded archive contents
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    /// Manifest embedded in the archive (its checksum field is empty)
    pub manifest: BackupManifest,
    /// Resources decoded from the per-resource entries, in archive order
    pub resources: Vec<KubernetesResource>,
}

/// Archive entry name for the `index`-th resource
pub fn entry_name(resource: &KubernetesResource, index: usize) -> String {
    format!(
        "{}/{}_{}_{}.json",
        resource.kind, resource.namespace, resource.name, index
    )
}

/// Encode a manifest into archive bytes and return them with their checksum.
///
/// The embedded manifest always has an empty checksum; the returned checksum
/// is the one to store beside the archive.
pub fn build_archive(manifest: &BackupManifest) -> Result<(Vec<u8>, String)> {
    let mtime = manifest.created_at.timestamp().max(0) as u64;

    let mut embedded = manifest.clone();
    embedded.checksum.clear();

    let mut buffer = Vec::new();
    {
        let encoder = GzBuilder::new()
            .mtime(u32::try_from(mtime).unwrap_or(u32::MAX))
            .comment(format!("Aegis backup {}", manifest.backup_id))
            .write(&mut buffer, Compression::default());
        let mut tar = tar::Builder::new(encoder);

        for (i, resource) in embedded.resources.iter().enumerate() {
            let data = serde_json::to_vec_pretty(resource)?;
            append_entry(&mut tar, &entry_name(resource, i), &data, mtime).map_err(|e| {
                Error::Archive(format!(
                    "failed to add {} to archive: {}",
                    resource.display_name(),
                    e
                ))
            })?;
        }

        let manifest_bytes = embedded.to_json()?;
        append_entry(&mut tar, MANIFEST_FILE, &manifest_bytes, mtime)
            .map_err(|e| Error::Archive(format!("failed to add manifest to archive: {}", e)))?;

        tar.into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| Error::Archive(format!("failed to finish archive: {}", e)))?;
    }

    let digest = checksum(&buffer);
    Ok((buffer, digest))
}

fn append_entry<W: Write>(
    tar: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
    mtime: u64,
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    tar.append_data(&mut header, path, data)
}

/// Decode archive bytes back into the embedded manifest and resources
pub fn read_archive(data: &[u8]) -> Result<ArchiveContents> {
    let decoder = GzDecoder::new(data);
    let mut archive = tar::Archive::new(decoder);

    let mut manifest = None;
    let mut resources = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| Error::Archive(format!("failed to read archive: {}", e)))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::Archive(format!("failed to read archive entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| Error::Archive(format!("invalid archive entry path: {}", e)))?
            .to_string_lossy()
            .to_string();

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| Error::Archive(format!("failed to read {}: {}", path, e)))?;

        if path == MANIFEST_FILE {
            manifest = Some(BackupManifest::from_json(&contents)?);
        } else {
            let resource: KubernetesResource = serde_json::from_slice(&contents).map_err(|e| {
                Error::Integrity(format!("malformed resource entry {}: {}", path, e))
            })?;
            resources.push(resource);
        }
    }

    let manifest = manifest
        .ok_or_else(|| Error::Integrity(format!("archive has no {}", MANIFEST_FILE)))?;

    Ok(ArchiveContents {
        manifest,
        resources,
    })
}

/// SHA-256 of `data`, lowercase hex
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
