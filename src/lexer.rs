//! EQL 的词法分析器

use crate::token::Token;
use tracing::trace;

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 当前位置对应的字符偏移，用于错误定位
    offset: usize,
}

/// 将输入拆分为带位置信息的 token 序列
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let tokens: Vec<_> = Lexer::new(input).collect();
    trace!(count = tokens.len(), "tokenized query");
    tokens
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            offset: 0,
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
            self.offset += 1;
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取引号包围的字符串字面量，保留两端引号
    /// 注意：开始的引号已经被调用者消费；未闭合时读到输入末尾
    fn read_literal(&mut self, quote: char) {
        while let Some(c) = self.bump() {
            if c == '\\' {
                // 转义字符，跳过下一个字符
                self.bump();
            } else if c == quote {
                break;
            }
        }
    }

    /// 读取普通单词（字段名、数字、占位符、关键字）
    fn read_word(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_delimiter(c) {
                break;
            }
            self.bump();
        }
    }
}

/// 单词的分隔字符
fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | ',' | '\'' | '"' | '=' | '!' | '<' | '>')
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;
        let offset = self.offset;

        let c = self.bump()?;

        match c {
            '(' | ')' | ',' | '=' => {}
            '\'' | '"' => self.read_literal(c),
            '!' | '<' | '>' => {
                // 贪婪匹配双字符运算符
                let pair = matches!(
                    (c, self.peek()),
                    ('!', Some('=')) | ('<', Some('>')) | ('<', Some('=')) | ('>', Some('='))
                );
                if pair {
                    self.bump();
                }
            }
            _ => self.read_word(),
        }

        Some(Token::new(&self.input[start..self.position], offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<&str> {
        tokenize(input).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_simple_condition() {
        let tokens = tokenize("name = 'john'");
        assert_eq!(
            tokens,
            vec![
                Token::new("name", 0),
                Token::new("=", 5),
                Token::new("'john'", 7),
            ]
        );
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(texts("a=1"), texts("  a  =  1 "));
        assert_eq!(texts("a=1"), vec!["a", "=", "1"]);
    }

    #[test]
    fn test_multi_character_operators() {
        assert_eq!(texts("a!=1"), vec!["a", "!=", "1"]);
        assert_eq!(texts("a<>1"), vec!["a", "<>", "1"]);
        assert_eq!(texts("a>=1 and b<=2"), vec!["a", ">=", "1", "and", "b", "<=", "2"]);
        assert_eq!(texts("a>1 or b<2"), vec!["a", ">", "1", "or", "b", "<", "2"]);
    }

    #[test]
    fn test_parentheses_and_commas() {
        assert_eq!(
            texts("city in(A,B,'C')"),
            vec!["city", "in", "(", "A", ",", "B", ",", "'C'", ")"]
        );
        assert_eq!(
            texts("year = years(2017,currentYear())"),
            vec!["year", "=", "years", "(", "2017", ",", "currentYear", "(", ")", ")"]
        );
    }

    #[test]
    fn test_quoted_literals() {
        assert_eq!(texts(r#"a = 'x y' or b = "z""#), vec!["a", "=", "'x y'", "or", "b", "=", "\"z\""]);
        assert_eq!(texts("a = ''"), vec!["a", "=", "''"]);
        assert_eq!(texts(r"a = 'it\'s' and b"), vec!["a", "=", r"'it\'s'", "and", "b"]);
    }

    #[test]
    fn test_unterminated_literal_consumes_rest() {
        let tokens = tokenize("c contains ( 'test )");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[3], Token::new("'test )", 13));
        assert_eq!(tokens[3].next_position(), 20);
    }

    #[test]
    fn test_positions_are_character_offsets() {
        let tokens = tokenize("naam = 'é' and x = 1");
        assert_eq!(tokens[3], Token::new("and", 11));
    }

    #[test]
    fn test_grouped_sample() {
        let tokens = tokenize(
            "(name = 'someName' and city != 217 and (email contains 'emailOne' or email = 'emailTwo'))",
        );
        assert_eq!(tokens.len(), 19);
        assert_eq!(tokens[0].text, "(");
        assert_eq!(tokens[18].text, ")");
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }
}
