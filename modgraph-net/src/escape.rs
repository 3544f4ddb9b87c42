// modgraph-net/src/escape.rs
// Case-encoding of module paths and versions for proxy URLs: every uppercase
// letter becomes '!' followed by its lowercase form.

pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

pub fn escape_version(version: &str) -> String {
    escape_path(version)
}
