use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::readers::{ParseError, Reader, Transactions};

const LOCAL_FILE_HEADER: &[u8] = b"PK\x03\x04";
const EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

pub fn is_zip(body: &[u8]) -> bool {
    body.starts_with(LOCAL_FILE_HEADER) || body.starts_with(EMPTY_ARCHIVE)
}

/// Parse `body` with `reader`. Zip archives are expanded recursively and the
/// transactions of their entries are chained in archive order.
pub fn unwrap<R: Reader + ?Sized>(reader: &R, body: Vec<u8>) -> Result<Transactions<'_>, ParseError> {
    let Some(entries) = archive_entries(&body)? else {
        let text = reader.decode(&body)?;
        return reader.read_transactions(text);
    };
    Ok(Box::new(entries.into_iter().flat_map(move |entry| {
        match unwrap(reader, entry) {
            Ok(transactions) => transactions,
            Err(e) => Box::new(std::iter::once(Err(e))) as Transactions<'_>,
        }
    })))
}

/// Contents of every file entry, or `None` when `body` is not a zip archive.
fn archive_entries(body: &[u8]) -> Result<Option<Vec<Vec<u8>>>, ParseError> {
    if !is_zip(body) {
        return Ok(None);
    }
    // The body is in memory, so any failure to open is a framing problem.
    let mut archive = match ZipArchive::new(Cursor::new(body)) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("not a zip archive ({e}), reading as plain statement");
            return Ok(None);
        }
    };

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        debug!(entry = file.name(), size = file.size(), "unpacking archive entry");
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entries.push(data);
    }
    Ok(Some(entries))
}
