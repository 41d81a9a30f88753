//! Helpers for qualified C++ names (`ns::Class::method<Args>`).

/// Byte offset of `operator` when it starts a name segment.
pub fn operator_start(name: &str) -> Option<usize> {
    let mut search = 0;
    while let Some(found) = name[search..].find("operator") {
        let pos = search + found;
        let boundary = pos == 0 || name[..pos].ends_with("::");
        let after = name[pos + "operator".len()..].chars().next();
        let is_ident_tail = after.is_some_and(|c| c.is_alphanumeric() || c == '_');
        if boundary && !is_ident_tail {
            return Some(pos);
        }
        search = pos + "operator".len();
    }
    None
}

/// Removes every balanced `<...>` group. Operator spellings such as
/// `operator<` or `operator<<` are left untouched.
pub fn strip_template_args(name: &str) -> String {
    if let Some(pos) = operator_start(name) {
        let (head, tail) = name.split_at(pos);
        return format!("{}{}", strip_template_args(head), tail);
    }
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Splits a qualified name at its last top-level `::`.
///
/// `geo::Shape::area` gives `(Some("geo::Shape"), "area")`;
/// `ns::process<std::string>` gives `(Some("ns"), "process<std::string>")`.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    let limit = operator_start(name).unwrap_or(name.len());
    let bytes = name.as_bytes();
    let mut depth = 0usize;
    let mut split = None;
    let mut i = 0;
    while i < limit {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if depth > 0 => depth -= 1,
            b':' if depth == 0 && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    match split {
        Some(pos) if pos > 0 => (Some(&name[..pos]), &name[pos + 2..]),
        Some(pos) => (None, &name[pos + 2..]),
        None => (None, name),
    }
}

/// Qualifier (everything before the last segment), if any.
pub fn qualifier(name: &str) -> Option<&str> {
    split_qualified(name).0
}

/// Last segment with template arguments removed: `templates::process<int>`
/// becomes `process`.
pub fn base_name(name: &str) -> String {
    strip_template_args(split_qualified(name).1)
}

/// Top-level template arguments of the last segment:
/// `ns::is_same<T, pair<A, B>>` gives `["T", "pair<A, B>"]`.
pub fn template_args(name: &str) -> Option<Vec<String>> {
    let last = split_qualified(name).1;
    if operator_start(last).is_some() {
        return None;
    }
    let open = last.find('<')?;
    let close = last.rfind('>')?;
    if close <= open {
        return None;
    }
    let inner = &last[open + 1..close];
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = inner[start..].trim();
    if !tail.is_empty() || !args.is_empty() {
        args.push(tail.to_string());
    }
    Some(args)
}

/// Joins a scope and a name, skipping an empty scope.
pub fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}::{name}")
    }
}

/// `a::b::c` yields `a::b::c`, `a::b`, `a`.
pub fn scope_chain(scope: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(scope.to_string());
    while let Some(s) = current {
        if s.is_empty() {
            break;
        }
        let parent = qualifier(&s).map(str::to_string);
        chain.push(s);
        current = parent;
    }
    chain
}

/// Collapses runs of whitespace to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduces a spelled type to a comparable token: drops cv-qualifiers,
/// references, pointers, `std::` and elaborated keywords.
/// `const std::string &` becomes `string`.
pub fn normalize_type_token(spelled: &str) -> String {
    let mut words = Vec::new();
    for word in spelled
        .replace(['&', '*'], " ")
        .split_whitespace()
    {
        match word {
            "const" | "volatile" | "struct" | "class" | "typename" | "enum" | "mutable" => {}
            w => words.push(w.trim_start_matches("std::").to_string()),
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_scope_and_template_args() {
        assert_eq!(base_name("templates::process<int>"), "process");
        assert_eq!(base_name("geo::Shape::area"), "area");
        assert_eq!(base_name("add"), "add");
        assert_eq!(base_name("ns::wrap<std::vector<int>>"), "wrap");
    }

    #[test]
    fn template_args_split_at_top_level() {
        assert_eq!(
            template_args("ns::is_same<T, pair<A, B>>"),
            Some(vec!["T".to_string(), "pair<A, B>".to_string()])
        );
        assert_eq!(template_args("process<int>"), Some(vec!["int".to_string()]));
        assert_eq!(template_args("X<>"), Some(Vec::new()));
        assert_eq!(template_args("plain"), None);
        assert_eq!(template_args("operator<"), None);
    }

    #[test]
    fn operator_names_survive_stripping() {
        assert_eq!(base_name("Vec::operator<"), "operator<");
        assert_eq!(base_name("operator<<"), "operator<<");
        assert_eq!(split_qualified("Vec::operator<<"), (Some("Vec"), "operator<<"));
        assert_eq!(base_name("Matrix::operator()"), "operator()");
        assert_eq!(base_name("cooperator::run"), "run");
    }

    #[test]
    fn split_ignores_scopes_inside_template_args() {
        assert_eq!(
            split_qualified("ns::process<std::string>"),
            (Some("ns"), "process<std::string>")
        );
        assert_eq!(split_qualified("::global"), (None, "global"));
        assert_eq!(qualifier("a::b::c"), Some("a::b"));
    }

    #[test]
    fn scope_chain_walks_outwards() {
        assert_eq!(scope_chain("a::b::c"), vec!["a::b::c", "a::b", "a"]);
        assert!(scope_chain("").is_empty());
    }

    #[test]
    fn type_tokens_normalize() {
        assert_eq!(normalize_type_token("const std::string &"), "string");
        assert_eq!(normalize_type_token("int"), "int");
        assert_eq!(normalize_type_token("Shape*"), "Shape");
        assert_eq!(normalize_type_token("unsigned long"), "unsigned long");
    }
}
