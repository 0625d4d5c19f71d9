//! Profiling records and their tabular encoding.

use std::any::type_name;
use std::fmt::{self, Debug, Display};

/// Column names of the record file, written once as the first row.
pub const HEADER: [&str; 10] = [
    "id",
    "time",
    "pid",
    "ppid",
    "process_name",
    "parent_process_name",
    "broken",
    "error_type",
    "error_value",
    "traceback",
];

/// Terminates every row of the record file.
pub(crate) const ROW_TERMINATOR: &str = "\r\n";

/// Describes the error that a measured region exited with.
///
/// This is plain data captured for the record file. The original error value stays with the
/// caller and is never replaced by this description.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionError {
    error_type: String,
    error_value: String,
    traceback: Option<String>,
}

impl RegionError {
    /// Creates a region error description from its parts.
    #[must_use]
    pub fn new(
        error_type: impl Into<String>,
        error_value: impl Into<String>,
        traceback: Option<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            error_value: error_value.into(),
            traceback,
        }
    }

    /// Describes an error value returned by a measured region.
    ///
    /// The type name identifies the error, its `Display` output is the value and its
    /// alternate `Debug` output (which includes source chains and backtraces for most
    /// error types) serves as the traceback.
    #[must_use]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: Debug + Display + ?Sized,
    {
        Self {
            error_type: type_name::<E>().to_string(),
            error_value: error.to_string(),
            traceback: Some(format!("{error:#?}")),
        }
    }

    /// Describes a panic that unwound through a measured region.
    #[must_use]
    pub(crate) fn from_panic(message: impl Into<String>, backtrace: Option<String>) -> Self {
        Self {
            error_type: "panic".to_string(),
            error_value: message.into(),
            traceback: backtrace,
        }
    }

    /// Name of the error type.
    #[must_use]
    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    /// Human-readable error message.
    #[must_use]
    pub fn error_value(&self) -> &str {
        &self.error_value
    }

    /// Detailed rendering of the error, if one was available.
    #[must_use]
    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }
}

impl Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_value)
    }
}

/// One completed measurement, as appended to the record file.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileRecord {
    id: String,
    elapsed_seconds: f64,
    process_id: u32,
    parent_process_id: Option<u32>,
    process_name: String,
    parent_process_name: String,
    error: Option<RegionError>,
}

impl ProfileRecord {
    #[must_use]
    pub(crate) fn new(
        id: String,
        elapsed_seconds: f64,
        process_id: u32,
        parent_process_id: Option<u32>,
        process_name: String,
        parent_process_name: String,
        error: Option<RegionError>,
    ) -> Self {
        Self {
            id,
            elapsed_seconds,
            process_id,
            parent_process_id,
            process_name,
            parent_process_name,
            error,
        }
    }

    /// The identifier of the measured region.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wall-clock seconds spent in the region, excluding paused intervals.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// The OS identifier of the process that took the measurement.
    #[must_use]
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// The OS identifier of the parent process, if the platform could tell.
    #[must_use]
    pub fn parent_process_id(&self) -> Option<u32> {
        self.parent_process_id
    }

    /// Best-effort name of the process that took the measurement.
    #[must_use]
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Best-effort name of the parent process.
    #[must_use]
    pub fn parent_process_name(&self) -> &str {
        &self.parent_process_name
    }

    /// Whether the region exited with an error or a panic.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.error.is_some()
    }

    /// The error the region exited with, if it is broken.
    #[must_use]
    pub fn error(&self) -> Option<&RegionError> {
        self.error.as_ref()
    }

    /// Encodes the record as one terminated row of the record file.
    #[must_use]
    pub(crate) fn to_row(&self) -> String {
        let elapsed = format!("{:?}", self.elapsed_seconds);
        let pid = self.process_id.to_string();
        let ppid = self
            .parent_process_id
            .map(|ppid| ppid.to_string())
            .unwrap_or_default();
        let broken = if self.is_broken() { "True" } else { "False" };

        let (error_type, error_value, traceback) = self.error.as_ref().map_or(("", "", ""), |e| {
            (
                e.error_type.as_str(),
                e.error_value.as_str(),
                e.traceback.as_deref().unwrap_or_default(),
            )
        });

        encode_row(&[
            &self.id,
            &elapsed,
            &pid,
            &ppid,
            &self.process_name,
            &self.parent_process_name,
            broken,
            error_type,
            error_value,
            traceback,
        ])
    }
}

/// Encodes the header as one terminated row of the record file.
#[must_use]
pub(crate) fn header_row() -> String {
    encode_row(&HEADER)
}

fn encode_row(fields: &[&str]) -> String {
    let mut row = String::new();

    for (index, field) in fields.iter().enumerate() {
        if index != 0 {
            row.push(',');
        }

        push_field(&mut row, field);
    }

    row.push_str(ROW_TERMINATOR);
    row
}

/// Appends a field, quoting it only if it contains a separator, a quote or a line break.
fn push_field(row: &mut String, field: &str) {
    if !field.contains([',', '"', '\r', '\n']) {
        row.push_str(field);
        return;
    }

    row.push('"');
    for c in field.chars() {
        if c == '"' {
            row.push('"');
        }
        row.push(c);
    }
    row.push('"');
}

impl Display for ProfileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} took {:.5} seconds in {}/{}",
            self.id, self.elapsed_seconds, self.process_name, self.process_id
        )?;

        if let Some(error) = &self.error {
            write!(f, " (broken: {error})")?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io;

    use super::*;

    fn record(id: &str, error: Option<RegionError>) -> ProfileRecord {
        ProfileRecord::new(
            id.to_string(),
            1.5,
            100,
            Some(1),
            "worker".to_string(),
            "init".to_string(),
            error,
        )
    }

    #[test]
    fn header_has_fixed_columns() {
        assert_eq!(
            header_row(),
            "id,time,pid,ppid,process_name,parent_process_name,broken,error_type,error_value,traceback\r\n"
        );
    }

    #[test]
    fn whole_seconds_keep_decimal_point() {
        let record = ProfileRecord::new(
            "load".to_string(),
            3.0,
            100,
            Some(1),
            "worker".to_string(),
            "init".to_string(),
            None,
        );

        assert_eq!(record.to_row(), "load,3.0,100,1,worker,init,False,,,\r\n");
    }

    #[test]
    fn successful_record_has_empty_error_columns() {
        assert_eq!(
            record("load", None).to_row(),
            "load,1.5,100,1,worker,init,False,,,\r\n"
        );
    }

    #[test]
    fn unknown_parent_is_empty_column() {
        let record = ProfileRecord::new(
            "load".to_string(),
            0.25,
            7,
            None,
            "worker".to_string(),
            "unknown".to_string(),
            None,
        );

        assert_eq!(record.to_row(), "load,0.25,7,,worker,unknown,False,,,\r\n");
    }

    #[test]
    fn broken_record_fills_error_columns() {
        let error = RegionError::new("io::Error", "disk gone", Some("trace".to_string()));

        assert_eq!(
            record("save", Some(error)).to_row(),
            "save,1.5,100,1,worker,init,True,io::Error,disk gone,trace\r\n"
        );
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        let error = RegionError::new(
            "E",
            "said \"no\", twice",
            Some("line 1\nline 2".to_string()),
        );

        assert_eq!(
            record("a,b", Some(error)).to_row(),
            "\"a,b\",1.5,100,1,worker,init,True,E,\"said \"\"no\"\", twice\",\"line 1\nline 2\"\r\n"
        );
    }

    #[test]
    fn region_error_from_error_value() {
        let error = io::Error::new(io::ErrorKind::NotFound, "missing input");
        let region_error = RegionError::from_error(&error);

        assert!(region_error.error_type().ends_with("Error"));
        assert_eq!(region_error.error_value(), "missing input");
        assert!(
            region_error
                .traceback()
                .is_some_and(|trace| trace.contains("NotFound"))
        );
    }

    #[test]
    fn broken_follows_error_presence() {
        assert!(!record("ok", None).is_broken());
        assert!(record("bad", Some(RegionError::from_panic("boom", None))).is_broken());
    }

    #[test]
    fn display_mentions_breakage() {
        let text = record("bad", Some(RegionError::new("E", "boom", None))).to_string();

        assert_eq!(text, "bad took 1.50000 seconds in worker/100 (broken: E: boom)");
    }
}
