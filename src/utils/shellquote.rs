/// Quote a single value for a POSIX shell. Everything goes inside single
/// quotes, with embedded single quotes spliced as `'\''`; the empty string
/// becomes `''`. Remote command lines are built exclusively through this
/// function so the quoting behavior stays in one place.
pub fn quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Quote each argument individually and join with single spaces.
pub fn join(args: &[String]) -> String {
    args.iter()
        .map(|a| quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_word() {
        assert_eq!(quote("gateway"), "'gateway'");
    }

    #[test]
    fn embedded_space() {
        assert_eq!(quote("Demo Gateway"), "'Demo Gateway'");
    }

    #[test]
    fn empty_string() {
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn single_quote() {
        assert_eq!(quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn only_single_quotes() {
        assert_eq!(quote("''"), "''\\'''\\'''");
    }

    #[test]
    fn double_quotes_pass_through() {
        assert_eq!(quote(r#"say "hi""#), r#"'say "hi"'"#);
    }

    #[test]
    fn dollar_and_backtick_are_inert() {
        assert_eq!(quote("$HOME `id`"), "'$HOME `id`'");
    }

    #[test]
    fn newline_and_tab() {
        assert_eq!(quote("a\nb\tc"), "'a\nb\tc'");
    }

    #[test]
    fn backslashes() {
        assert_eq!(quote(r"a\b"), r"'a\b'");
    }

    #[test]
    fn semicolons_and_ampersands() {
        assert_eq!(quote("a; rm -rf / &"), "'a; rm -rf / &'");
    }

    #[test]
    fn unicode() {
        assert_eq!(quote("héllo wörld"), "'héllo wörld'");
    }

    #[test]
    fn join_quotes_each_argument() {
        let args = vec![
            "/opt/app/bin/server".to_string(),
            "-name".to_string(),
            "Demo Gateway".to_string(),
            "".to_string(),
        ];
        assert_eq!(
            join(&args),
            "'/opt/app/bin/server' '-name' 'Demo Gateway' ''"
        );
    }

    #[test]
    fn join_empty_list() {
        assert_eq!(join(&[]), "");
    }
}
