use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected next token to be {expected:?}, got {got:?} instead")]
    UnexpectedToken {
        expected: monkey_lexer::TokenKind,
        got: monkey_lexer::TokenKind,
    },

    #[error("no prefix parse function for {0:?} found")]
    NoPrefixParseFn(monkey_lexer::TokenKind),

    #[error("could not parse {0:?} as integer")]
    InvalidInteger(String),
}
