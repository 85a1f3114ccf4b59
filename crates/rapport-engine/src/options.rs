//! Caller-facing configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ReportError;
use crate::value::Value;

/// Default command delimiter (both open and close).
pub const DEFAULT_CMD_DELIMITER: &str = "+++";

/// Default literal-XML delimiter understood by the serializer.
pub const DEFAULT_LITERAL_XML_DELIMITER: &str = "||";

/// Default cap on walker iterations.
pub const DEFAULT_MAXIMUM_WALKING_DEPTH: usize = 1_000_000;

/// The pair of strings that fence a command inside visible text. Open and
/// close may be equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            open: DEFAULT_CMD_DELIMITER.to_string(),
            close: DEFAULT_CMD_DELIMITER.to_string(),
        }
    }
}

/// A host function callable from template expressions.
pub type Function = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Function table: name to callable.
pub type Functions = HashMap<String, Function>;

/// Handler invoked when an expression fails to resolve a key; its return
/// value substitutes for the expression.
pub type ErrorHandler = Arc<dyn Fn(&ReportError, &str) -> Value + Send + Sync>;

/// Options controlling report generation.
#[derive(Clone)]
pub struct CreateReportOptions {
    /// Command delimiter pair.
    pub cmd_delimiter: Delimiters,
    /// Token toggling raw-XML emission in the serializer.
    pub literal_xml_delimiter: String,
    /// Translate newlines in inserted values into line breaks.
    pub process_line_breaks: bool,
    /// Translate newlines by closing and reopening the text element instead
    /// of inserting `w:br`.
    pub process_line_breaks_as_new_text: bool,
    /// Abort on the first error instead of aggregating.
    pub fail_fast: bool,
    /// Reserved.
    pub reject_nullish: bool,
    /// Fold Unicode smart quotes in commands to straight quotes.
    pub fix_smart_quotes: bool,
    /// Cap on walker iterations, guarding against pathological templates.
    pub maximum_walking_depth: usize,
    /// Host functions callable from expressions. Entries here shadow the
    /// built-ins of the same name.
    pub functions: Functions,
    /// Substitution hook for unresolved keys.
    pub error_handler: Option<ErrorHandler>,
}

impl Default for CreateReportOptions {
    fn default() -> Self {
        CreateReportOptions {
            cmd_delimiter: Delimiters::default(),
            literal_xml_delimiter: DEFAULT_LITERAL_XML_DELIMITER.to_string(),
            process_line_breaks: false,
            process_line_breaks_as_new_text: false,
            fail_fast: false,
            reject_nullish: false,
            fix_smart_quotes: false,
            maximum_walking_depth: DEFAULT_MAXIMUM_WALKING_DEPTH,
            functions: Functions::new(),
            error_handler: None,
        }
    }
}

impl std::fmt::Debug for CreateReportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateReportOptions")
            .field("cmd_delimiter", &self.cmd_delimiter)
            .field("literal_xml_delimiter", &self.literal_xml_delimiter)
            .field("process_line_breaks", &self.process_line_breaks)
            .field(
                "process_line_breaks_as_new_text",
                &self.process_line_breaks_as_new_text,
            )
            .field("fail_fast", &self.fail_fast)
            .field("reject_nullish", &self.reject_nullish)
            .field("fix_smart_quotes", &self.fix_smart_quotes)
            .field("maximum_walking_depth", &self.maximum_walking_depth)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
