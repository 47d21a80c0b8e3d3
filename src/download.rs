use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::client::DataApi;
use crate::error::{Error, Result};
use crate::model::FileRecord;
use crate::util::basename_from_url;

/// What to do when one file fails to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run at the first failed file.
    #[default]
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub files: u64,
    pub bytes: u64,
}

/// Writes each listed file under a destination directory, optionally grouped
/// into one subdirectory per partition key.
#[derive(Debug, Clone)]
pub struct Downloader {
    dest: PathBuf,
    partition: bool,
    progress: bool,
    on_failure: FailurePolicy,
}

impl Downloader {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            partition: true,
            progress: false,
            on_failure: FailurePolicy::Abort,
        }
    }

    pub fn with_partition(mut self, partition: bool) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Path a record is written to: `dest/[partition_key/]basename`.
    ///
    /// Records without a partition key land directly in `dest` even when
    /// partitioning is enabled. Flattened records sharing a basename overwrite
    /// each other in listing order.
    pub fn target_path(&self, record: &FileRecord) -> Result<PathBuf> {
        let name = basename_from_url(&record.url)
            .or_else(|| record.file_name.clone().filter(|n| !n.trim().is_empty()))
            .ok_or_else(|| Error::InvalidPath {
                value: record.url.clone(),
                reason: "no file name in url",
            })?;
        check_component(&name)?;

        let mut path = self.dest.clone();
        if self.partition {
            if let Some(key) = record.partition() {
                check_component(key)?;
                path.push(key);
            }
        }
        path.push(name);
        Ok(path)
    }

    /// Downloads every record in order, overwriting existing files.
    ///
    /// `on_record` sees each record once its download has been attempted,
    /// including the one that failed; the failure is returned afterwards and
    /// no later record is touched. A listing error ends the run the same way.
    pub fn download_all<A, I, F>(
        &self,
        api: &A,
        records: I,
        mut on_record: F,
    ) -> Result<DownloadSummary>
    where
        A: DataApi + ?Sized,
        I: IntoIterator<Item = Result<FileRecord>>,
        F: FnMut(&FileRecord) -> Result<()>,
    {
        std::fs::create_dir_all(&self.dest).map_err(|e| Error::io(&self.dest, e))?;
        let mut summary = DownloadSummary::default();

        for record in records {
            let record = record?;
            let outcome = self.download_one(api, &record);
            on_record(&record)?;

            match (outcome, self.on_failure) {
                (Ok(bytes), _) => {
                    summary.files += 1;
                    summary.bytes += bytes;
                }
                (Err(e), FailurePolicy::Abort) => return Err(e),
            }
        }

        info!(
            dest = %self.dest.display(),
            files = summary.files,
            bytes = summary.bytes,
            "download complete"
        );
        Ok(summary)
    }

    /// Streams one record to its target path and returns the bytes written.
    pub fn download_one<A: DataApi + ?Sized>(&self, api: &A, record: &FileRecord) -> Result<u64> {
        let target = self.target_path(record)?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        debug!(url = %record.url, target = %target.display(), size = record.size, "downloading");
        let mut body = api.stream_file(&record.url)?;

        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&target)
            .map_err(|e| Error::io(&target, e))?;

        let pb = self.progress.then(|| {
            let pb = ProgressBar::new(record.size);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {msg} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            pb.set_message(
                target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            pb
        });

        let mut written: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport(&record.url, e)),
            };
            out.write_all(&buf[..n]).map_err(|e| Error::io(&target, e))?;
            written += n as u64;
            if let Some(pb) = &pb {
                pb.inc(n as u64);
            }
        }
        out.flush().map_err(|e| Error::io(&target, e))?;

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        debug!(target = %target.display(), bytes = written, "downloaded");
        Ok(written)
    }
}

fn check_component(value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(()),
        _ => Err(Error::InvalidPath {
            value: value.to_string(),
            reason: "not a single path component",
        }),
    }
}
