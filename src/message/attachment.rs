use std::{fs, io, path::Path};

use crate::message::{
    body::Body,
    header::{ContentDisposition, ContentType},
    mimebody::SinglePart,
};

/// Reads attachment contents
///
/// Tests swap in an in-memory source; [`FsAttachmentSource`] is the default.
pub trait AttachmentSource {
    /// Whole content of the file at `path`
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads attachments from the file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAttachmentSource;

impl AttachmentSource for FsAttachmentSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

impl<F> AttachmentSource for F
where
    F: Fn(&Path) -> io::Result<Vec<u8>>,
{
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self(path)
    }
}

/// Builds the part for a file
///
/// The content type is guessed from the extension and the body is always
/// base64 encoded.
pub(crate) fn attachment_part(path: &Path, content: &[u8]) -> SinglePart {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    SinglePart::new(ContentType::attachment(mime, &filename), Body::base64(content))
        .header(ContentDisposition::attachment(&filename))
}
