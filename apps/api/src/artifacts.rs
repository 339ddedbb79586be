//! Request-scoped on-disk copies of finished cards.

use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::CardImage;

pub fn card_file_name(request_id: Uuid) -> String {
    format!("card-{request_id}.png")
}

/// Writes `card` to `dir/card-<request_id>.png`.
///
/// The bytes go to a temp file in `dir` first and are renamed into place, so a
/// reader never sees a partial file. Blocking; call from `spawn_blocking`.
pub fn persist_card(dir: &Path, request_id: Uuid, card: &CardImage) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".card-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(&card.png)?;
    tmp.as_file().sync_all()?;

    let path = dir.join(card_file_name(request_id));
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}
