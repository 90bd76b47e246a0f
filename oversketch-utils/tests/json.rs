use oversketch_utils::{dejsonify, jsonify, load_json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Example {
    zeta: u32,
    alpha: Vec<f64>,
    nested: HashMap<String, u32>,
}

#[test]
fn test_jsonify_sorts_keys() {
    let mut nested = HashMap::new();
    nested.insert("b".to_string(), 2);
    nested.insert("a".to_string(), 1);
    let obj = Example {
        zeta: 3,
        alpha: vec![0.5],
        nested,
    };
    assert_eq!(
        jsonify(&obj),
        r#"{"alpha":[0.5],"nested":{"a":1,"b":2},"zeta":3}"#
    );
    assert_eq!(dejsonify::<Example>(&jsonify(&obj)).unwrap(), obj);
}

#[test]
fn test_load_json_inline_and_file() {
    let inline = r#"{"zeta":1,"alpha":[],"nested":{}}"#;
    let obj: Example = load_json(inline).unwrap();
    assert_eq!(obj.zeta, 1);

    let path = std::env::temp_dir().join("oversketch_utils_load_json_test.json");
    std::fs::write(&path, inline).unwrap();
    let obj: Example = load_json(path.to_str().unwrap()).unwrap();
    assert_eq!(obj.zeta, 1);
    let _ = std::fs::remove_file(path);

    assert!(load_json::<Example>("not json").is_err());
    assert!(load_json::<Example>("/does/not/exist.json").is_err());
}
