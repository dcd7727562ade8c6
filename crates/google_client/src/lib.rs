//! Thin clients for the two Google services the onboarding tracker talks to:
//! the OAuth userinfo endpoint used at sign-in and the Drive multipart upload
//! endpoint used to attach hiring documents.

pub mod drive;
pub mod identity;

pub use drive::{DriveClient, DriveConfig, UploadError, UploadRequest, UploadedFile};
pub use identity::{IdentityClient, IdentityError};
