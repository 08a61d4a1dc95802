//! Offline copy of local objects into the remote backend.
//!
//! Already uploaded names are skipped, so the migration can be interrupted
//! and re-run at any time.

use std::collections::BTreeMap;

use bytes::BytesMut;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

use super::{ObjectBackend, Prefix, StoreError};

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    /// Re-upload objects whose remote etag differs from the local MD5.
    pub verify_checksums: bool,
    /// Report what would happen without writing anything.
    pub dry_run: bool,
}

/// Counters for one prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefixReport {
    pub total: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub prefixes: BTreeMap<String, PrefixReport>,
    pub dry_run: bool,
}

impl MigrationReport {
    pub fn totals(&self) -> PrefixReport {
        self.prefixes
            .values()
            .fold(PrefixReport::default(), |mut acc, p| {
                acc.total += p.total;
                acc.uploaded += p.uploaded;
                acc.skipped += p.skipped;
                acc.refreshed += p.refreshed;
                acc.failed += p.failed;
                acc
            })
    }
}

async fn read_object(
    backend: &dyn ObjectBackend,
    prefix: Prefix,
    name: &str,
) -> Result<(bytes::Bytes, String), StoreError> {
    let (mut stream, metadata) = backend.get(prefix, name).await?;
    let mut buf = BytesMut::with_capacity(metadata.size as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok((buf.freeze(), metadata.content_type))
}

/// Copy every object of `prefixes` from `local` to `remote`.
///
/// Listing failures abort the run; single object failures are counted and
/// the migration continues.
pub async fn migrate_local_to_remote(
    local: &dyn ObjectBackend,
    remote: &dyn ObjectBackend,
    prefixes: &[Prefix],
    options: MigrationOptions,
) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    for &prefix in prefixes {
        let names = local.list(prefix).await?;
        let mut counts = PrefixReport {
            total: names.len(),
            ..Default::default()
        };
        info!(prefix = %prefix, count = names.len(), "Migrating prefix");

        for name in &names {
            let refresh = match remote.exists(prefix, name).await {
                Ok(false) => false,
                Ok(true) if !options.verify_checksums => {
                    counts.skipped += 1;
                    continue;
                }
                Ok(true) => match checksum_matches(local, remote, prefix, name).await {
                    Ok(true) => {
                        counts.skipped += 1;
                        continue;
                    }
                    Ok(false) => true,
                    Err(e) => {
                        warn!(prefix = %prefix, name, error = %e, "Checksum comparison failed");
                        counts.failed += 1;
                        continue;
                    }
                },
                Err(e) => {
                    error!(prefix = %prefix, name, error = %e, "Remote existence check failed");
                    counts.failed += 1;
                    continue;
                }
            };

            if options.dry_run {
                if refresh {
                    counts.refreshed += 1;
                } else {
                    counts.uploaded += 1;
                }
                continue;
            }

            let upload = async {
                let (data, content_type) = read_object(local, prefix, name).await?;
                remote.put(prefix, name, data, &content_type).await
            }
            .await;

            match upload {
                Ok(()) if refresh => {
                    debug!(prefix = %prefix, name, "Refreshed remote object");
                    counts.refreshed += 1;
                }
                Ok(()) => {
                    debug!(prefix = %prefix, name, "Uploaded object");
                    counts.uploaded += 1;
                }
                Err(e) => {
                    error!(prefix = %prefix, name, error = %e, "Upload failed");
                    counts.failed += 1;
                }
            }
        }

        info!(
            prefix = %prefix,
            total = counts.total,
            uploaded = counts.uploaded,
            skipped = counts.skipped,
            refreshed = counts.refreshed,
            failed = counts.failed,
            "Prefix migrated"
        );
        report.prefixes.insert(prefix.dir_name().to_string(), counts);
    }

    Ok(report)
}

async fn checksum_matches(
    local: &dyn ObjectBackend,
    remote: &dyn ObjectBackend,
    prefix: Prefix,
    name: &str,
) -> Result<bool, StoreError> {
    let remote_meta = remote.stat(prefix, name).await?;
    // Multipart uploads carry a composite etag that cannot be compared.
    let Some(etag) = remote_meta.etag.filter(|e| !e.contains('-')) else {
        return Ok(true);
    };
    let (data, _) = read_object(local, prefix, name).await?;
    let digest = format!("{:x}", md5::compute(&data));
    Ok(digest.eq_ignore_ascii_case(&etag))
}
