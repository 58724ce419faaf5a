use thiserror::Error;

/// Errors raised while loading or rendering a docx template
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Invalid docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Not a docx template: missing {0}")]
    MissingPart(String),

    #[error("Malformed XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more placeholder tokens could not be rendered
    #[error("Docx render error: {message}{}", join_details(.details))]
    Render {
        message: String,
        details: Vec<String>,
    },
}

fn join_details(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" :: {}", details.join(" || "))
    }
}
