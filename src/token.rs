//! The token definition for the entity query language.

/// Words and symbols that always carry grammatical meaning and can never be used as a
/// field name or a bare value.
const KEYWORDS: &[&str] = &[
    "!=", "<>", "=", ">", ">=", "<", "<=", "contains", "and", "or", "not", "in", "like", "ilike",
    "is",
];

/// A token is a single unit of the language, tagged with the position of its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The raw text of the token. Quoted literals keep their delimiters.
    pub text: &'a str,
    /// Character offset of the first character in the original input.
    pub position: usize,
}

impl<'a> Token<'a> {
    pub fn new(text: &'a str, position: usize) -> Self {
        Self { text, position }
    }

    /// Character offset directly after this token.
    pub fn next_position(&self) -> usize {
        self.position + self.text.chars().count()
    }

    /// Case-insensitive comparison of the token text.
    pub fn is(&self, text: &str) -> bool {
        self.text.eq_ignore_ascii_case(text)
    }

    pub fn is_keyword(&self) -> bool {
        KEYWORDS.iter().any(|keyword| self.is(keyword))
    }

    /// A reserved token cannot start a field or a value. The opening parenthesis is only
    /// reserved where a group is not allowed.
    pub fn is_reserved(&self, allow_group: bool) -> bool {
        self.text == ")"
            || self.text == ","
            || (!allow_group && self.text == "(")
            || self.is_keyword()
    }

    /// The quote character if the token starts a string literal.
    pub fn quote(&self) -> Option<char> {
        self.text.chars().next().filter(|c| *c == '\'' || *c == '"')
    }
}
