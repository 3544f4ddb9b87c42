//! Parser for the subset of the `go.mod` grammar the crawler needs.
//!
//! Only the `module` directive and `require` entries (single-line or block
//! form, with `// indirect` markers) are extracted. Every other directive is
//! skipped, including its parenthesized block.
use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::{DependencyManifest, ModuleIdentity, Requirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Require,
    Ignored,
}

pub fn parse_manifest(data: &str) -> Result<DependencyManifest> {
    let mut manifest = DependencyManifest::default();
    let mut block: Option<(Block, usize)> = None;

    for (index, raw_line) in data.lines().enumerate() {
        let line_number = index + 1;
        let (code, comment) = split_comment(raw_line);
        let tokens = tokenize(code);
        if tokens.is_empty() {
            continue;
        }

        if let Some((kind, _)) = block {
            if tokens == [")"] {
                block = None;
                continue;
            }
            if kind == Block::Require {
                manifest
                    .requirements
                    .push(parse_requirement(&tokens, comment, line_number)?);
            }
            continue;
        }

        let verb = tokens[0].as_str();
        let args = &tokens[1..];
        let opens_block = args == ["("];

        match verb {
            "module" => {
                let path = match args {
                    [path] => unquote(path),
                    _ => {
                        return Err(invalid(line_number, "module directive expects one path"));
                    }
                };
                if path.is_empty() {
                    return Err(invalid(line_number, "empty module path"));
                }
                manifest.module = Some(ModuleIdentity::unresolved(path));
            }
            "require" if opens_block => block = Some((Block::Require, line_number)),
            "require" => manifest
                .requirements
                .push(parse_requirement(args, comment, line_number)?),
            ")" | "(" => return Err(invalid(line_number, "unexpected parenthesis")),
            _ if opens_block => block = Some((Block::Ignored, line_number)),
            _ => {}
        }
    }

    if let Some((_, opened_at)) = block {
        return Err(invalid(opened_at, "block is never closed"));
    }

    Ok(manifest)
}

fn parse_requirement(tokens: &[String], comment: Option<&str>, line_number: usize) -> Result<Requirement> {
    match tokens {
        [path, version] => {
            let path = unquote(path);
            let version = unquote(version);
            if path.is_empty() || version.is_empty() {
                return Err(invalid(line_number, "empty requirement path or version"));
            }
            Ok(Requirement {
                module: ModuleIdentity::new(path, version),
                indirect: is_indirect(comment),
            })
        }
        _ => Err(invalid(
            line_number,
            &format!("requirement expects 'path version', got '{}'", tokens.join(" ")),
        )),
    }
}

fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.find("//") {
        Some(at) => (&line[..at], Some(line[at + 2..].trim())),
        None => (line, None),
    }
}

fn is_indirect(comment: Option<&str>) -> bool {
    comment.is_some_and(|c| c == "indirect" || c.starts_with("indirect;"))
}

fn tokenize(code: &str) -> Vec<String> {
    code.replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn unquote(token: &str) -> String {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| token.strip_prefix('`').and_then(|t| t.strip_suffix('`')))
        .unwrap_or(token)
        .to_string()
}

fn invalid(line_number: usize, message: &str) -> ModgraphError {
    ModgraphError::InvalidManifest(format!("go.mod:{line_number}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COBRA_MOD: &str = r#"module github.com/spf13/cobra

go 1.15

require (
	github.com/cpuguy83/go-md2man/v2 v2.0.3
	github.com/inconshreveable/mousetrap v1.1.0
	github.com/spf13/pflag v1.0.5
	gopkg.in/yaml.v3 v3.0.1
)

require github.com/russross/blackfriday/v2 v2.1.0 // indirect
"#;

    #[test]
    fn parses_module_and_requirements() {
        let manifest = parse_manifest(COBRA_MOD).unwrap();
        assert_eq!(
            manifest.module,
            Some(ModuleIdentity::unresolved("github.com/spf13/cobra"))
        );
        assert_eq!(manifest.requirements.len(), 5);
        assert_eq!(manifest.direct_requirements().count(), 4);
        let last = manifest.requirements.last().unwrap();
        assert!(last.indirect);
        assert_eq!(last.module.path, "github.com/russross/blackfriday/v2");
    }

    #[test]
    fn indirect_marker_inside_block() {
        let data = "module example.com/a\nrequire (\n\texample.com/b v1.0.0\n\texample.com/c v0.1.0 // indirect\n)\n";
        let manifest = parse_manifest(data).unwrap();
        let flags: Vec<bool> = manifest.requirements.iter().map(|r| r.indirect).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn other_directives_and_blocks_are_ignored() {
        let data = r#"// leading comment
module "example.com/a"

go 1.22
toolchain go1.22.1

replace (
	example.com/b => ../b
	example.com/c v1.0.0 => example.com/c v1.0.1
)

exclude example.com/d v0.0.1
retract [v1.0.0, v1.0.5]

require example.com/e v1.2.3
"#;
        let manifest = parse_manifest(data).unwrap();
        assert_eq!(manifest.module.unwrap().path, "example.com/a");
        assert_eq!(
            manifest.requirements,
            vec![Requirement {
                module: ModuleIdentity::new("example.com/e", "v1.2.3"),
                indirect: false,
            }]
        );
    }

    #[test]
    fn manifest_without_module_directive() {
        let manifest = parse_manifest("require example.com/b v1.0.0\n").unwrap();
        assert!(manifest.module.is_none());
        assert_eq!(manifest.requirements.len(), 1);
    }

    #[test]
    fn malformed_requirement_is_invalid() {
        let err = parse_manifest("module example.com/a\nrequire example.com/b\n").unwrap_err();
        assert!(matches!(err, ModgraphError::InvalidManifest(_)));
    }

    #[test]
    fn unterminated_block_is_invalid() {
        let err = parse_manifest("module example.com/a\nrequire (\n\texample.com/b v1.0.0\n")
            .unwrap_err();
        assert!(matches!(err, ModgraphError::InvalidManifest(_)));
    }

    #[test]
    fn empty_input_has_no_module() {
        let manifest = parse_manifest("").unwrap();
        assert!(manifest.module.is_none());
        assert!(manifest.requirements.is_empty());
    }
}
