/// Result alias that carries the custom [`ShapeAudioError`] type.
pub type Result<T> = std::result::Result<T, ShapeAudioError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ShapeAudioError {
    /// A shape key that is not registered in the catalog was requested.
    /// Shape selection is constrained to the catalog's key set, so hitting
    /// this at runtime indicates a programmer error upstream.
    #[error("unknown shape kind `{0}`")]
    UnknownShapeKind(String),
    /// The audio backend could not decode the supplied bytes. Recovered
    /// locally: the previously active source keeps playing.
    #[error("failed to decode audio data: {0}")]
    Decode(String),
    /// The audio output is suspended and could not be resumed. Recovered by
    /// attempting another resume on the next user-initiated play action.
    #[error("audio output is suspended and could not be resumed")]
    AudioBlocked,
    /// Free-form message used by the application layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ShapeAudioError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for ShapeAudioError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ShapeAudioError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
