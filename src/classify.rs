use serde::Serialize;
use strum::{
    Display,
    EnumString,
};

/// Coarse origin of a query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The server rejected the statement itself: syntax, unknown command,
    /// missing table or column.
    Programming,
    /// The server failed while running an otherwise valid statement.
    Operational,
    /// I/O, TLS, protocol framing or a timeout on the session.
    Connection,
    /// A column or value did not have the expected type.
    Decode,
    /// Any other driver failure.
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Abort the batch and drop the connection.
    Critical,
    /// Drop only the offending query.
    Prunable,
}

/// Operational errors that still only concern the statement at hand.
const STATEMENT_SCOPED_MARKERS: &[&str] = &[
    "denied",
    "unknown column",
    "unknown local",
    "not supported",
    "unsupported",
];

pub fn classify(class: ErrorClass, text: &str) -> Severity {
    match class {
        ErrorClass::Programming => Severity::Prunable,
        ErrorClass::Operational => {
            let text = text.to_lowercase();
            if STATEMENT_SCOPED_MARKERS.iter().any(|marker| text.contains(marker)) {
                Severity::Prunable
            } else {
                Severity::Critical
            }
        }
        ErrorClass::Connection | ErrorClass::Decode | ErrorClass::Interface => Severity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn programming_errors_are_prunable() {
        assert_eq!(
            classify(ErrorClass::Programming, "unsupported command 'show index'"),
            Severity::Prunable
        );
        assert_eq!(
            classify(ErrorClass::Programming, "sphinxql: syntax error, unexpected IDENT"),
            Severity::Prunable
        );
    }

    #[test]
    fn operational_errors_depend_on_text() {
        assert_eq!(
            classify(ErrorClass::Operational, "SHOW command denied to user 'monitor'"),
            Severity::Prunable
        );
        assert_eq!(
            classify(ErrorClass::Operational, "Unknown column 'foo' in 'field list'"),
            Severity::Prunable
        );
        assert_eq!(
            classify(ErrorClass::Operational, "unknown local table 'logs' in search request"),
            Severity::Prunable
        );
        assert_eq!(
            classify(ErrorClass::Operational, "Lost connection to server during query"),
            Severity::Critical
        );
    }

    #[test]
    fn transport_and_type_errors_are_critical() {
        for class in [ErrorClass::Connection, ErrorClass::Decode, ErrorClass::Interface] {
            assert_eq!(classify(class, "unsupported"), Severity::Critical, "{class}");
        }
    }
}
