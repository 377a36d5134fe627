use std::{
    fs, io,
    path::{Path, PathBuf},
};

use super::Configuration;
use crate::error::{ConnectionError, ValidationError, ValidationFailure};

/// Core settings, including `fs.defaultFS`.
pub const CORE_SITE: &str = "core-site.xml";
/// Filesystem client settings.
pub const HDFS_SITE: &str = "hdfs-site.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Directory,
    File,
}

/// A configuration directory whose two site files have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    dir: PathBuf,
    core_site: PathBuf,
    hdfs_site: PathBuf,
}

impl ConfigLocation {
    /// Validates `dir` and the site files inside it.
    ///
    /// Checks run in a fixed order and the first failure is returned: the
    /// directory must exist, be a directory and be readable, then each of
    /// [`CORE_SITE`] and [`HDFS_SITE`] must exist, be a regular file and be
    /// readable.
    pub fn resolve<P: AsRef<Path>>(dir: P) -> Result<Self, ValidationError> {
        let dir = dir.as_ref();
        check(dir, Kind::Directory)?;

        let core_site = dir.join(CORE_SITE);
        check(&core_site, Kind::File)?;

        let hdfs_site = dir.join(HDFS_SITE);
        check(&hdfs_site, Kind::File)?;

        Ok(Self {
            dir: dir.to_owned(),
            core_site,
            hdfs_site,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn core_site(&self) -> &Path {
        &self.core_site
    }

    pub fn hdfs_site(&self) -> &Path {
        &self.hdfs_site
    }

    /// Loads the core file, then the filesystem file on top of it.
    pub fn load(&self) -> Result<Configuration, ConnectionError> {
        let mut conf = Configuration::new();
        conf.add_resource(&self.core_site)?;
        conf.add_resource(&self.hdfs_site)?;
        Ok(conf)
    }
}

fn check(path: &Path, kind: Kind) -> Result<(), ValidationError> {
    let fail = |failure| {
        debug!("{} {failure}", path.display());
        ValidationError::new(path, failure)
    };

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(fail(ValidationFailure::Missing))
        }
        Err(_) => return Err(fail(ValidationFailure::Unreadable)),
    };

    let readable = match kind {
        Kind::Directory if !metadata.is_dir() => return Err(fail(ValidationFailure::NotADirectory)),
        Kind::File if !metadata.is_file() => return Err(fail(ValidationFailure::NotAFile)),
        Kind::Directory => fs::read_dir(path).is_ok(),
        Kind::File => fs::File::open(path).is_ok(),
    };

    if !readable {
        return Err(fail(ValidationFailure::Unreadable));
    }

    debug!("{} is a readable {kind:?}", path.display());
    Ok(())
}
