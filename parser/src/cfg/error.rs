use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use super::sexpr::{SExpr, Span, Spanned};

pub type MResult<T> = miette::Result<T>;
pub type Result<T> = std::result::Result<T, CfgError>;

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("Error in configuration file")]
#[diagnostic()]
pub struct CfgError {
    #[label("Error here")]
    pub err_span: Option<SourceSpan>,
    #[help]
    pub help_msg: String,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
}

impl CfgError {
    pub(super) fn at(span: &Span, msg: impl AsRef<str>) -> Self {
        Self {
            err_span: Some(SourceSpan::new(span.start.into(), span.len().into())),
            help_msg: msg.as_ref().to_string(),
            file_name: Some(span.file_name()),
            file_content: Some(span.file_content()),
        }
    }

    pub(super) fn expr(expr: &SExpr, msg: impl AsRef<str>) -> Self {
        Self::at(expr.span(), msg)
    }

    /// Attach the file content so the rendered report shows the offending snippet.
    pub fn into_report(self) -> miette::Error {
        let named = self
            .file_name
            .clone()
            .zip(self.file_content.clone())
            .map(|(name, content)| NamedSource::new(name, content));
        let report: miette::Error = self.into();
        match named {
            Some(src) => report.with_source_code(src),
            None => report,
        }
    }
}

impl From<Spanned<String>> for CfgError {
    fn from(e: Spanned<String>) -> Self {
        Self::at(&e.span, e.t)
    }
}

macro_rules! bail_expr {
    ($expr:expr, $fmt:expr $(,)?) => {
        return Err(CfgError::expr($expr, format!($fmt)))
    };
    ($expr:expr, $fmt:expr, $($arg:tt)*) => {
        return Err(CfgError::expr($expr, format!($fmt, $($arg)*)))
    };
}

pub(super) use bail_expr;
