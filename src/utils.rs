use log::info;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "precip_loader";
pub(crate) const DATA_DIR_ENV: &str = "PRECIP_DATA_DIR";
pub(crate) const ARCHIVE_URL_ENV: &str = "PRECIP_ARCHIVE_URL";

/// `$PRECIP_DATA_DIR` when set, else the platform data directory joined with `precip_loader`.
pub fn get_data_dir() -> io::Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system data directory",
            )
        })
        .map(|p| p.join(DATA_DIR_NAME))
}

pub fn ensure_data_dir_exists(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Data path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating data directory: {}", path.display());
            std::fs::create_dir_all(path)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_data_dir_creates_nested() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        ensure_data_dir_exists(&nested)?;
        assert!(nested.is_dir());
        ensure_data_dir_exists(&nested)?;
        Ok(())
    }

    #[test]
    fn test_ensure_data_dir_rejects_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x")?;
        assert!(ensure_data_dir_exists(&file).is_err());
        Ok(())
    }
}
