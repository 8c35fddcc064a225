#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown memory kind '{0}': expected TEXT, VOICE, IMAGE, VIDEO_DESC or OCR")]
    UnknownMemoryKind(String),

    #[error("Memory '{0}' cannot link to itself")]
    SelfLink(String),
}
