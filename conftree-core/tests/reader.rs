use conftree_core::{
    read_block, BlockBody, Cursor, ParseWarning, ReadError, ReadStrategy, ReaderOptions, Value,
};
use pretty_assertions::assert_eq;

const MIXED: &str = r#"config system sdwan
    set status enable
    config zone
        edit "virtual-wan-link"
        next
    end
    config members
        edit 1
            set interface "wan1"
            set gateway 203.0.113.1
        next
        edit 2
            set interface "wan2"
            bogus line here
            config health
                set interval 500
                next
            end
        edit 3
            set interface "lte"
    end
    edit "stray"
    append allowaccess ping
    append allowaccess https ssh
end
"#;

fn run(
    text: &str,
    strategy: ReadStrategy,
    depth_limit: usize,
) -> (Result<BlockBody, ReadError>, usize, Vec<ParseWarning>) {
    let mut cursor = Cursor::new(text);
    cursor.advance();
    let result = read_block(
        &mut cursor,
        "system sdwan",
        &ReaderOptions {
            strategy,
            depth_limit,
        },
    );
    let position = cursor.position();
    (result, position, cursor.into_warnings())
}

#[test]
fn recursive_and_iterative_agree_on_mixed_input() {
    let recursive = run(MIXED, ReadStrategy::Recursive, 1000);
    let iterative = run(MIXED, ReadStrategy::Iterative, 1000);
    assert_eq!(recursive, iterative);

    let (result, _, warnings) = recursive;
    let BlockBody::Settings(fields) = result.expect("read") else {
        panic!("expected settings");
    };
    assert_eq!(fields.get_str("status"), Some("enable"));
    assert_eq!(fields.get_list("allowaccess"), vec!["ping", "https", "ssh"]);
    let members = fields.get_entries("members");
    assert_eq!(members.len(), 3);
    assert_eq!(members[1].fields.get_object("health").map(|h| h.len()), Some(1));
    assert_eq!(warnings.len(), 5);
}

#[test]
fn fallback_mid_block_matches_pure_traversals() {
    let reference = run(MIXED, ReadStrategy::Iterative, 1000);
    for limit in 1..4 {
        assert_eq!(run(MIXED, ReadStrategy::Auto, limit), reference, "limit {limit}");
    }
}

#[test]
fn deeply_nested_input_does_not_exhaust_the_stack() {
    let depth = 1_000;
    let mut text = String::from("config root\n");
    for level in 0..depth {
        text.push_str(&format!("config level-{level}\n"));
    }
    text.push_str("set leaf yes\n");
    for _ in 0..=depth {
        text.push_str("end\n");
    }

    let (result, position, warnings) = run(&text, ReadStrategy::Auto, 64);
    assert!(warnings.is_empty());
    assert_eq!(position, 2 * depth + 3);

    let body = result.expect("read");
    let BlockBody::Settings(root) = &body else {
        panic!("expected settings");
    };
    let mut current = root;
    let mut seen = 0;
    loop {
        let next = current.iter().find_map(|(key, value)| match value {
            Value::Object(inner) if key.starts_with("level_") => Some(inner),
            _ => None,
        });
        match next {
            Some(inner) => {
                seen += 1;
                current = inner;
            }
            None => break,
        }
    }
    assert_eq!(seen, depth);
    assert_eq!(current.get_str("leaf"), Some("yes"));
}

#[test]
fn unterminated_block_reports_its_header() {
    let (result, _, _) = run("config system global\n    set hostname fw\n", ReadStrategy::Auto, 64);
    assert_eq!(
        result,
        Err(ReadError::UnexpectedEof {
            section: "system sdwan".to_string(),
            line: 1
        })
    );
}
