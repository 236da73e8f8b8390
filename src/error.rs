use thiserror::Error;

/// Why an image fetch did not produce a usable picture.
///
/// The gallery never treats these as fatal: the affected slide is dropped and
/// the remaining slides are renumbered.
#[derive(Debug, Error)]
pub enum LoadFailure {
    /// The fetch was cancelled or its worker died before reporting.
    #[error("image fetch aborted")]
    Aborted,

    /// The image could not be read from storage.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The bytes were read but are not a decodable image.
    #[error(transparent)]
    Decode(#[from] image::ImageError),
}

impl LoadFailure {
    /// `abort` vs `error` in host terms.
    pub fn is_abort(&self) -> bool {
        matches!(self, LoadFailure::Aborted)
    }
}
