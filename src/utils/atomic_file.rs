use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// The sibling file a new version of `path` is written to before the rename.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `tmp`'s target.  A rename within one directory is atomic, readers
/// see either the old or the new file.
pub fn commit(tmp: &Path, path: &Path) -> io::Result<()> {
    fs::rename(tmp, path)
}

/// Write a new version of `path` to its temporary sibling and return the
/// sibling's path.  Nothing is renamed, call [`commit`] once every file of a
/// multi-file save is staged.  On error the temporary file is removed.
pub fn stage<F, E>(path: &Path, write: F) -> Result<PathBuf, E>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), E>,
    E: From<io::Error>,
{
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(path);
    let result = (|| -> Result<(), E> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();
    match result {
        Ok(()) => Ok(tmp),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Write a file through a temporary sibling, then rename it over `path`.
/// On error the temporary file is removed and `path` is left untouched.
pub fn write_atomic<F, E>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), E>,
    E: From<io::Error>,
{
    let tmp = stage(path, write)?;
    Ok(commit(&tmp, path)?)
}
