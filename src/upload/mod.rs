use actix_multipart::{Field, Multipart, MultipartError};
use chrono::NaiveDateTime;
use futures_util::TryStreamExt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::KEY_TIMESTAMP_FORMAT;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// True when the filename carries an allowed image extension (case-insensitive).
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Non-ASCII is dropped, path separators and whitespace runs become `_`,
/// anything outside `[A-Za-z0-9_.-]` is removed and leading/trailing
/// dots and underscores are trimmed. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `{username}_{YYYYMMDD_HHMMSS}`, the key of an image record.
pub fn image_id(username: &str, at: NaiveDateTime) -> String {
    format!("{}_{}", username, at.format(KEY_TIMESTAMP_FORMAT))
}

/// On-disk name for an upload made by `username` at `at`.
pub fn upload_filename(username: &str, at: NaiveDateTime, original: &str) -> String {
    let mut user = secure_filename(username);
    if user.is_empty() {
        user = "visitor".to_string();
    }
    let mut name = secure_filename(original);
    if name.is_empty() {
        name = "upload".to_string();
    }
    format!("{}_{}_{}", user, at.format(KEY_TIMESTAMP_FORMAT), name)
}

/// An accepted image held in a temp file until it is given its final name.
pub struct StagedImage {
    pub original_name: String,
    pub size: usize,
    file: NamedTempFile,
}

/// The parsed upload form. `image` is `None` when the file part was
/// missing, unnamed, or had a disallowed extension.
pub struct UploadForm {
    pub image: Option<StagedImage>,
    pub description: String,
}

/// Directory that receives uploaded images.
pub struct UploadDir {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadDir {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_bytes })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Read the `image` and `description` fields of a multipart body.
    /// The whole body is capped at `max_bytes`.
    pub async fn receive(&self, mut payload: Multipart) -> Result<UploadForm, UploadError> {
        let mut image = None;
        let mut seen_image = false;
        let mut description = String::new();
        let mut received = 0usize;

        while let Some(mut field) = payload.try_next().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" if !seen_image => {
                    seen_image = true;
                    let filename = field
                        .content_disposition()
                        .and_then(|cd| cd.get_filename())
                        .unwrap_or_default()
                        .to_string();

                    if filename.is_empty() {
                        log::info!("Upload rejected: empty filename");
                        self.drain(&mut field, &mut received).await?;
                    } else if !allowed_file(&filename) {
                        log::info!("Upload rejected: extension not allowed for '{}'", filename);
                        self.drain(&mut field, &mut received).await?;
                    } else {
                        image = Some(self.stage(&mut field, filename, &mut received).await?);
                    }
                }
                "description" => {
                    let mut buf = Vec::new();
                    while let Some(chunk) = field.try_next().await? {
                        self.count(&mut received, chunk.len())?;
                        buf.extend_from_slice(&chunk);
                    }
                    description = String::from_utf8_lossy(&buf).trim().to_string();
                }
                _ => self.drain(&mut field, &mut received).await?,
            }
        }

        if !seen_image {
            log::info!("Upload rejected: no image part");
        }
        Ok(UploadForm { image, description })
    }

    /// Move a staged image to `filename` inside the upload directory.
    pub fn persist(&self, staged: StagedImage, filename: &str) -> Result<PathBuf, UploadError> {
        let path = self.dir.join(filename);
        staged.file.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    async fn stage(
        &self,
        field: &mut Field,
        original_name: String,
        received: &mut usize,
    ) -> Result<StagedImage, UploadError> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        let mut size = 0;
        while let Some(chunk) = field.try_next().await? {
            self.count(received, chunk.len())?;
            size += chunk.len();
            file.write_all(&chunk)?;
        }
        file.flush()?;
        Ok(StagedImage {
            original_name,
            size,
            file,
        })
    }

    async fn drain(&self, field: &mut Field, received: &mut usize) -> Result<(), UploadError> {
        while let Some(chunk) = field.try_next().await? {
            self.count(received, chunk.len())?;
        }
        Ok(())
    }

    fn count(&self, received: &mut usize, len: usize) -> Result<(), UploadError> {
        *received += len;
        if *received > self.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("photo.png"));
        assert!(allowed_file("PHOTO.JPG"));
        assert!(allowed_file("archive.tar.jpeg"));
        assert!(allowed_file("anim.Gif"));
        assert!(!allowed_file("notes.txt"));
        assert!(!allowed_file("png"));
        assert!(!allowed_file("photo.png.exe"));
        assert!(!allowed_file(""));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("..\\evil.png"), "evil.png");
        assert_eq!(secure_filename("___"), "");
    }

    #[test]
    fn test_names_share_one_instant() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap();

        assert_eq!(image_id("Ada", at), "Ada_20240501_093005");
        assert_eq!(
            upload_filename("Ada", at, "my photo.png"),
            "Ada_20240501_093005_my_photo.png"
        );
        // Names with separators cannot escape the upload directory
        assert_eq!(
            upload_filename("../Ada", at, "x.png"),
            "Ada_20240501_093005_x.png"
        );
        assert_eq!(upload_filename("\u{1f600}", at, "\u{1f600}.png"), "visitor_20240501_093005_png");
    }
}
