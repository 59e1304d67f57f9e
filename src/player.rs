//! Locates the player script and its signature-decoding function.
//!
//! Nothing here executes the script. The results only tell an external descrambler where to look.

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_ESCAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\/s\\/player\\/([^"]+?)\.js"#).unwrap());
static SCRIPT_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/s/player/([^"]+?)\.js"#).unwrap());
static DECIPHER_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\b|[^a-zA-Z0-9$])([a-zA-Z0-9$]{1,4})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
    )
    .unwrap()
});

/// Finds the player script referenced by the watch page and returns its absolute URL on `host`.
pub fn find_script_url(markup: &str, host: &str) -> Option<String> {
    let path = SCRIPT_ESCAPED
        .captures(markup)
        .or_else(|| SCRIPT_PLAIN.captures(markup))
        .map(|captures| captures[1].replace("\\/", "/"))?;

    Some(format!("https://{}/s/player/{}.js", host, path))
}

/// Finds the name of the candidate signature-decoding function in a player script.
pub fn find_decipher_function(script: &str) -> Option<String> {
    DECIPHER_FUNCTION
        .captures(script)
        .map(|captures| captures[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_escaped_script_reference() {
        let markup = r#"{"jsUrl":"\/s\/player\/4fcd6e4a\/player_ias.vflset\/en_US\/base.js","other":1}"#;
        assert_eq!(
            find_script_url(markup, "www.youtube.com").as_deref(),
            Some("https://www.youtube.com/s/player/4fcd6e4a/player_ias.vflset/en_US/base.js")
        );
    }

    #[test]
    fn finds_plain_script_reference() {
        let markup = r#"<script src="/s/player/4fcd6e4a/player_ias.vflset/en_US/base.js" nonce="x"></script>"#;
        assert_eq!(
            find_script_url(markup, "www.youtube.com").as_deref(),
            Some("https://www.youtube.com/s/player/4fcd6e4a/player_ias.vflset/en_US/base.js")
        );
    }

    #[test]
    fn no_script_reference() {
        assert!(find_script_url("<html></html>", "www.youtube.com").is_none());
    }

    #[test]
    fn finds_decipher_function_name() {
        let script = r#"var x=1;Xy=function(a){a=a.split("");Wq.Ab(a,3);return a.join("")};"#;
        assert_eq!(find_decipher_function(script).as_deref(), Some("Xy"));

        let spaced = r#";$a1 = function( a ) { a = a.split( "" ); return a}"#;
        assert_eq!(find_decipher_function(spaced).as_deref(), Some("$a1"));
    }

    #[test]
    fn no_decipher_function() {
        assert!(find_decipher_function("function f(b){return b}").is_none());
    }
}
