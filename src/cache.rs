use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::compile::{compile_template, CompileOutput};
use crate::error::CompilerError;
use crate::options::CompileOptions;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub output: CompileOutput,
}

/// On-disk cache of compile outputs. Entries are addressed by the file path
/// and validated against a hash of the source and every output-affecting
/// option, so a stale entry is never returned.
pub struct CompileCache {
    cache_dir: PathBuf,
}

impl CompileCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn compute_hash(source: &str, options: &CompileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(options.fingerprint().as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, source: &str, options: &CompileOptions) -> Option<CompileOutput> {
        let path = self.entry_path(&options.file_path);
        let data = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(file = %options.file_path, error = %e, "discarding corrupt compile cache entry");
                fs::remove_file(path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source, options) {
            Some(entry.output)
        } else {
            None
        }
    }

    pub fn set(&self, source: &str, options: &CompileOptions, output: &CompileOutput) {
        let hash = Self::compute_hash(source, options);
        let entry = CacheEntry {
            hash,
            output: output.clone(),
        };
        if let Ok(data) = serde_json::to_string(&entry) {
            if let Err(e) = fs::write(self.entry_path(&options.file_path), data) {
                warn!(file = %options.file_path, error = %e, "failed to write compile cache entry");
            }
        }
    }

    /// Cached output for `source`, compiling and storing it on a miss.
    pub fn compile(&self, source: &str, options: &CompileOptions) -> Result<CompileOutput, CompilerError> {
        if let Some(output) = self.get(source, options) {
            debug!(file = %options.file_path, "compile cache hit");
            return Ok(output);
        }
        let output = compile_template(source, options)?;
        self.set(source, options, &output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_covers_options() {
        let source = "<div v-lazy-if=\"ok\"></div>";
        let client = CompileCache::compute_hash(source, &CompileOptions::default());
        let server = CompileCache::compute_hash(source, &CompileOptions::server());
        assert_ne!(client, server);
        assert_eq!(client, CompileCache::compute_hash(source, &CompileOptions::default()));
    }

    #[test]
    fn test_entry_path_is_flat() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CompileCache::new(dir.path());
        let path = cache.entry_path("src/pages/a.vue");
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.ends_with("src_pages_a.vue.json"));
    }
}
