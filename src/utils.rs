use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SEPARATOR: char = '/';

/// The part of `path` after its last separator.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once(SEPARATOR).map_or(path, |(_, name)| name)
}

/// Builds the remote path an upload of `source` into `dest` lands on.
///
/// `dest` names a directory with or without a trailing separator; an empty
/// `dest` keeps the file name relative.
pub fn upload_destination(source: &str, dest: &str) -> String {
    let name = file_name(source);

    if dest.is_empty() {
        name.to_owned()
    } else if dest.ends_with(SEPARATOR) {
        format!("{dest}{name}")
    } else {
        format!("{dest}{SEPARATOR}{name}")
    }
}

/// Joins a child name onto a remote directory path.
pub fn join(parent: &str, child: &str) -> String {
    if parent.ends_with(SEPARATOR) {
        format!("{parent}{child}")
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// Every proper ancestor of `path` followed by `path` itself, shortest first.
///
/// `"/a/b/c"` yields `["/a", "/a/b", "/a/b/c"]`.
pub fn ancestors_and_self(path: &str) -> Vec<String> {
    let absolute = path.starts_with(SEPARATOR);
    let mut current = String::new();
    let mut result = Vec::new();

    for part in path.split(SEPARATOR).filter(|p| !p.is_empty() && *p != ".") {
        if absolute || !current.is_empty() {
            current.push(SEPARATOR);
        }
        current.push_str(part);
        result.push(current.clone());
    }

    result
}

/// Streams `reader` into `writer` through a `buffer_size` byte buffer.
///
/// Neither stream is closed here.
pub async fn copy<R, W>(reader: &mut R, writer: &mut W, buffer_size: usize) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0; buffer_size.max(1)];
    let mut total = 0;

    loop {
        let len = reader.read(&mut buf).await?;
        if len == 0 {
            break;
        }

        writer.write_all(&buf[..len]).await?;
        total += len as u64;
    }

    Ok(total)
}
