use thiserror::Error;

/// Failure raised by a component while it renders.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("component `{component}` failed to render: {message}")]
    Component {
        component: &'static str,
        message: String,
    },
    #[error("invalid markup: {message}")]
    InvalidMarkup { message: String },
}

impl RenderError {
    pub fn component(component: &'static str, message: impl Into<String>) -> Self {
        Self::Component {
            component,
            message: message.into(),
        }
    }

    pub fn invalid_markup(message: impl Into<String>) -> Self {
        Self::InvalidMarkup {
            message: message.into(),
        }
    }
}
