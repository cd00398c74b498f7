use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Result;
use zip::ZipArchive;

/// Where the GTFS text files live: a zip archive (as published by agencies) or an unpacked
/// directory.
pub enum Source {
    Zip(ZipArchive<File>),
    Dir(PathBuf),
}

impl Source {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Source::Dir(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|err| anyhow!("{}: {err}", path.display()))?;
        let archive = ZipArchive::new(file).map_err(|err| anyhow!("{}: {err}", path.display()))?;
        Ok(Source::Zip(archive))
    }

    /// Reads one file, like `stops.txt`. Archives sometimes nest everything in a folder, so files
    /// are matched by their base name. Returns `None` if the file is absent or empty. A leading
    /// UTF-8 byte order mark is stripped.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut bytes = Vec::new();
        match self {
            Source::Dir(dir) => {
                let path = dir.join(name);
                if !path.exists() {
                    return Ok(None);
                }
                File::open(&path)
                    .and_then(|mut f| f.read_to_end(&mut bytes))
                    .map_err(|err| anyhow!("{}: {err}", path.display()))?;
            }
            Source::Zip(archive) => {
                let full_name = match archive
                    .file_names()
                    .find(|x| x.rsplit('/').next() == Some(name))
                {
                    Some(x) => x.to_string(),
                    None => {
                        return Ok(None);
                    }
                };
                let mut file = archive
                    .by_name(&full_name)
                    .map_err(|err| anyhow!("{full_name}: {err}"))?;
                file.read_to_end(&mut bytes)
                    .map_err(|err| anyhow!("{full_name}: {err}"))?;
            }
        }

        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            bytes.drain(0..3);
        }
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        Ok(Some(bytes))
    }

    /// Like `read`, but the file must exist.
    pub fn read_required(&mut self, name: &str) -> Result<Vec<u8>> {
        match self.read(name)? {
            Some(bytes) => Ok(bytes),
            None => bail!("{name} is missing or empty"),
        }
    }
}
