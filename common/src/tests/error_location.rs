use crate::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line,
/// and column from the caller.
///
/// **WHY THIS MATTERS**: ErrorLocation is the foundation of the error
/// tracking system. If it fails to capture accurate location data, every
/// error message in the workspace loses its debugging value.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `Location::caller()` stops being propagated correctly
/// - File path extraction breaks
/// - Line/column capture fails
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN: Current caller location
    // WHEN: Creating ErrorLocation from caller
    let location = ErrorLocation::from(Location::caller());

    // THEN: Should capture file, line, and column
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert!(location.line > 0, "Should capture line number");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies that Display produces the "[file:line:column]"
/// format.
///
/// **WHY THIS MATTERS**: The location string is appended to every error
/// Display in the workspace; if the format breaks, error messages lose
/// their origin information.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Display changes format (e.g., removes brackets)
/// - File path, line, or column are missing from output
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting as string
    let formatted = format!("{location}");

    // THEN: Should produce "[file:line:column]" format
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(
        formatted.contains("error_location.rs"),
        "Should include filename"
    );
    assert!(
        formatted.contains(&location.line.to_string()),
        "Should include line number"
    );
}

/// **VALUE**: Verifies that ErrorLocation serializes to JSON.
///
/// **WHY THIS MATTERS**: Errors cross crate boundaries and may be rendered
/// into structured payloads; the location must survive serialization.
///
/// **BUG THIS CATCHES**: Would catch the `Serialize` derive being removed
/// or a field becoming non-serializable.
#[test]
fn given_error_location_when_serialized_then_contains_all_fields() {
    let location = ErrorLocation::from(Location::caller());

    let json = serde_json::to_string(&location).expect("location should serialize");

    assert!(json.contains("\"file\""), "JSON should contain file field");
    assert!(json.contains("\"line\""), "JSON should contain line field");
    assert!(
        json.contains("\"column\""),
        "JSON should contain column field"
    );
}
