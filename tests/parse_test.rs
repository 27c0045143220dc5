//! Defensive parsing of provider output.

use leasegen::error::Error;
use leasegen::parse::ResultParser;
use serde_json::json;

#[test]
fn fenced_and_bare_output_parse_identically() {
    let parser = ResultParser::new();
    let bare = parser.parse("{\"a\":1}").unwrap();
    let fenced = parser.parse("```json\n{\"a\":1}\n```").unwrap();
    let untagged = parser.parse("```\n{\"a\":1}\n```").unwrap();

    assert_eq!(bare, json!({"a": 1}));
    assert_eq!(fenced, bare);
    assert_eq!(untagged, bare);
}

#[test]
fn repairs_trailing_commas() {
    let parser = ResultParser::new();
    let value = parser
        .parse("```json\n{\n  \"Question\": \"Q\",\n  \"Tags\": [\"a\", \"b\",],\n}\n```")
        .unwrap();
    assert_eq!(value, json!({"Question": "Q", "Tags": ["a", "b"]}));
}

#[test]
fn commas_inside_strings_survive() {
    let value = ResultParser::new().parse("{\"Answer\": \"x,}\"}").unwrap();
    assert_eq!(value, json!({"Answer": "x,}"}));
}

#[test]
fn arrays_are_accepted() {
    let value = ResultParser::new().parse("[{\"q\":1},{\"q\":2},]").unwrap();
    assert_eq!(value, json!([{"q": 1}, {"q": 2}]));
}

#[test]
fn prose_is_malformed() {
    let err = ResultParser::new()
        .parse("Sure! Here is your question: what is X?")
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResult(_)));
}

#[test]
fn scalars_are_malformed() {
    assert!(matches!(
        ResultParser::new().parse("42"),
        Err(Error::MalformedResult(_))
    ));
    assert!(matches!(
        ResultParser::new().parse("\"just a string\""),
        Err(Error::MalformedResult(_))
    ));
}

#[test]
fn required_keys_are_enforced_on_objects() {
    let parser = ResultParser::new().with_required_keys(["Question", "Answer"]);

    assert!(parser.parse("{\"Question\":\"Q\",\"Answer\":\"A\"}").is_ok());

    let err = parser.parse("{\"Question\":\"Q\"}").unwrap_err();
    match err {
        Error::MalformedResult(message) => assert!(message.contains("Answer"), "{message}"),
        other => panic!("expected MalformedResult, got {other:?}"),
    }
}
