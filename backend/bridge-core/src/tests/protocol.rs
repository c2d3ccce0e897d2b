// Unit tests for wire framing, envelope parsing, and error taxonomy

use crate::rpc::protocol::{
    INVALID_REQUEST, PARSE_ERROR, PROTOCOL_VERSION, RpcError, RpcRequest, RpcResponse,
    UNKNOWN_REQUEST_ID, parse_request, to_frame,
};

use serde_json::json;

/// **VALUE**: Verifies that a well-formed request frame parses losslessly.
///
/// **WHY THIS MATTERS**: This is the happy path for every single call the
/// bridge ever makes; the field names here are the wire contract.
///
/// **BUG THIS CATCHES**: Would catch a serde rename or field-type change
/// that silently breaks compatibility with deployed daemons.
#[test]
fn given_valid_request_frame_when_parsed_then_all_fields_recovered() {
    // GIVEN: A frame as the client emits it
    let frame = r#"{"version": 1, "id": 7, "method": "env.create", "params": {"name": "staging"}}"#;

    // WHEN: Parsing
    let request = parse_request(frame).expect("valid frame should parse");

    // THEN: Every field survives
    assert_eq!(request.version, PROTOCOL_VERSION);
    assert_eq!(request.id, 7);
    assert_eq!(request.method, "env.create");
    assert_eq!(request.params, json!({"name": "staging"}));
}

/// **VALUE**: Verifies that omitted `params` defaults to null rather than
/// failing the parse.
///
/// **WHY THIS MATTERS**: Zero-argument methods like `ping` are the common
/// case; forcing callers to send an empty object is wire-level friction.
#[test]
fn given_request_without_params_when_parsed_then_params_default_to_null() {
    let request =
        parse_request(r#"{"version": 1, "id": 1, "method": "ping"}"#).expect("should parse");

    assert_eq!(request.params, serde_json::Value::Null);
}

/// **VALUE**: Verifies that non-JSON bytes produce a parse error tagged
/// with the unknown request id.
///
/// **WHY THIS MATTERS**: The server must answer even unparsable frames so
/// clients are not left hanging; id 0 marks the response as unroutable.
///
/// **BUG THIS CATCHES**: Would catch parse failures being conflated with
/// invalid-envelope failures (distinct codes, distinct client handling).
#[test]
fn given_non_json_bytes_when_parsed_then_parse_error_with_unknown_id() {
    let (id, error) = parse_request("this is not json{{{").expect_err("must not parse");

    assert_eq!(id, UNKNOWN_REQUEST_ID);
    assert_eq!(error.code, PARSE_ERROR);
}

/// **VALUE**: Verifies that valid JSON with a malformed envelope yields an
/// invalid-request error and recovers the id when one is present.
///
/// **WHY THIS MATTERS**: Recovering the id lets the client fail exactly the
/// call that was malformed instead of timing out.
///
/// **BUG THIS CATCHES**: Would catch the id recovery reading the envelope
/// after the typed parse already consumed it.
#[test]
fn given_malformed_envelope_when_parsed_then_invalid_request_with_recovered_id() {
    // GIVEN: Valid JSON, wrong shape, but a recoverable id
    let frame = r#"{"version": 1, "id": 42, "method": 99}"#;

    // WHEN: Parsing
    let (id, error) = parse_request(frame).expect_err("must not parse");

    // THEN: Invalid request, tagged with the envelope's id
    assert_eq!(id, 42);
    assert_eq!(error.code, INVALID_REQUEST);

    // AND: Without an id field, the unknown id is used
    let (id, error) = parse_request(r#"{"hello": "world"}"#).expect_err("must not parse");
    assert_eq!(id, UNKNOWN_REQUEST_ID);
    assert_eq!(error.code, INVALID_REQUEST);
}

/// **VALUE**: Verifies that version mismatches are rejected as invalid
/// requests.
///
/// **WHY THIS MATTERS**: Version skew between a UI and its daemon must fail
/// loudly at the envelope, never by silently misinterpreting payloads.
#[test]
fn given_wrong_protocol_version_when_parsed_then_invalid_request() {
    let frame = r#"{"version": 2, "id": 3, "method": "ping", "params": null}"#;

    let (id, error) = parse_request(frame).expect_err("must not parse");

    assert_eq!(id, 3);
    assert_eq!(error.code, INVALID_REQUEST);
    assert!(
        error.message.contains("version"),
        "Error should mention the version: {}",
        error.message
    );
}

/// **VALUE**: Verifies frames are newline-terminated and single-line.
///
/// **WHY THIS MATTERS**: The newline IS the message boundary; a frame with
/// an interior newline would be read as two garbage frames by the peer.
#[test]
fn given_message_when_framed_then_single_line_with_trailing_newline() {
    let request = RpcRequest::new(5, "ping", json!({"note": "multi word value"}));

    let frame = to_frame(&request);

    assert!(frame.ends_with('\n'), "Frame must end with newline");
    assert_eq!(
        frame.matches('\n').count(),
        1,
        "Frame must contain exactly one newline"
    );
}

/// **VALUE**: Verifies success responses omit `error` and error responses
/// omit `result` on the wire.
///
/// **WHY THIS MATTERS**: The exactly-one-of contract is what clients branch
/// on; emitting explicit nulls would break strict peers.
#[test]
fn given_responses_when_serialized_then_absent_field_is_omitted() {
    let success = to_frame(&RpcResponse::success(1, json!({"pong": true})));
    assert!(!success.contains("error"), "Success frame: {success}");

    let failure = to_frame(&RpcResponse::failure(1, RpcError::method_not_found("nope")));
    assert!(!failure.contains("result"), "Failure frame: {failure}");
}

/// **VALUE**: Verifies `into_outcome` collapses the response pair correctly,
/// including the neither-field protocol violation.
///
/// **WHY THIS MATTERS**: A peer bug producing an empty response must surface
/// as an error; treating it as a null result would report phantom success.
#[test]
fn given_each_response_shape_when_collapsed_then_outcome_matches() {
    // Success carries the result through
    let outcome = RpcResponse::success(1, json!({"ok": 1})).into_outcome();
    assert_eq!(outcome.unwrap(), json!({"ok": 1}));

    // Error wins, even if a result is also present
    let mut both = RpcResponse::failure(1, RpcError::handler_error("failed"));
    both.result = Some(json!({"ok": 1}));
    assert!(both.into_outcome().is_err());

    // Neither field is a protocol violation, reported as invalid request
    let empty = RpcResponse {
        version: PROTOCOL_VERSION,
        id: 1,
        result: None,
        error: None,
    };
    let error = empty.into_outcome().expect_err("must be an error");
    assert_eq!(error.code, INVALID_REQUEST);
}

/// **VALUE**: Verifies the canonical error constructors carry the right
/// codes and that `data` round-trips when present.
#[test]
fn given_error_constructors_when_built_then_codes_match_convention() {
    assert_eq!(RpcError::parse_error("x").code, -32700);
    assert_eq!(RpcError::invalid_request("x").code, -32600);
    assert_eq!(RpcError::method_not_found("x").code, -32601);
    assert_eq!(RpcError::handler_error("x").code, -32000);

    let with_data = RpcError {
        code: -32000,
        message: "failed".to_string(),
        data: Some(json!({"attempt": 3})),
    };
    let frame = to_frame(&RpcResponse::failure(9, with_data));
    let parsed: RpcResponse = serde_json::from_str(frame.trim()).unwrap();
    assert_eq!(parsed.error.unwrap().data, Some(json!({"attempt": 3})));
}
