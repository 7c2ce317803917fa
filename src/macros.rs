#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a full category path from its three segments, inserting the `<that>`
/// and `<topic>` separators.
///
/// Each item is anything convertible into a [`PathToken`](crate::PathToken):
/// a `&str` is classified by its text, and `PathToken::set("name")` makes a
/// set reference.
///
/// ```
/// use graphmaster::{PathToken, path};
///
/// let tokens = path!["HELLO", PathToken::set("name"); "*"; "*"];
/// assert_eq!(tokens.len(), 6);
/// ```
#[macro_export]
macro_rules! path {
    ( $($pattern:expr),* ; $($that:expr),* ; $($topic:expr),* $(;)? ) => {{
        #[allow(unused_mut)]
        let mut tokens: Vec<$crate::PathToken> = Vec::new();
        $( tokens.push($crate::PathToken::from($pattern)); )*
        tokens.push($crate::PathToken::that_separator());
        $( tokens.push($crate::PathToken::from($that)); )*
        tokens.push($crate::PathToken::topic_separator());
        $( tokens.push($crate::PathToken::from($topic)); )*
        tokens
    }};
}
