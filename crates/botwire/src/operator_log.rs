//! Operator-facing log for failures that are not returned to the caller

/// Receives problems an operator should see
pub trait OperatorLog: Send + Sync {
    fn error(&self, message: &str);
}

/// Forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl OperatorLog for TracingLog {
    fn error(&self, message: &str) {
        tracing::error!(target: "botwire::operator", "{}", message);
    }
}
